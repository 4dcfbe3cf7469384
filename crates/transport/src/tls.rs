// SPDX-License-Identifier: MIT

//! TLS material generation and `rustls` server/client configuration,
//! grounded in the corpus's ephemeral self-signed daemon-TLS pattern
//! (install the ring provider once, generate via `rcgen`, load via
//! `rustls-pemfile`).

use mrd_core::{MrdError, TlsMaterial};
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use std::io::Cursor;
use std::sync::Arc;

pub type TlsServerConfig = Arc<rustls::ServerConfig>;
pub type TlsClientConfig = Arc<rustls::ClientConfig>;

fn ensure_crypto_provider() {
    // Idempotent: a profile reset+configure cycle may call this more than
    // once per process, and `install_default` errors (not panics) if a
    // provider is already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Generate a fresh self-signed certificate/key pair for one daemon
/// roster (spec.md §5: "the auto-generated pair is single-use").
pub fn generate_ephemeral_material(subject_alt_names: Vec<String>) -> Result<TlsMaterial, MrdError> {
    ensure_crypto_provider();
    let names = if subject_alt_names.is_empty() {
        vec!["localhost".to_string()]
    } else {
        subject_alt_names
    };
    let rcgen::CertifiedKey { cert, signing_key } =
        rcgen::generate_simple_self_signed(names).map_err(|e| MrdError::Tls(e.to_string()))?;
    Ok(TlsMaterial {
        cert_pem: cert.pem().into_bytes(),
        key_pem: signing_key.serialize_pem().into_bytes(),
        password: None,
    })
}

fn parse_cert_chain(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, MrdError> {
    rustls_pemfile::certs(&mut Cursor::new(pem))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| MrdError::Tls(format!("invalid certificate PEM: {e}")))
}

fn parse_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>, MrdError> {
    rustls_pemfile::private_key(&mut Cursor::new(pem))
        .map_err(|e| MrdError::Tls(format!("invalid key PEM: {e}")))?
        .ok_or_else(|| MrdError::Tls("no private key found in PEM".into()))
}

/// Build a server-side TLS config from generated or supplied material.
pub fn build_server_config(material: &TlsMaterial) -> Result<TlsServerConfig, MrdError> {
    ensure_crypto_provider();
    let certs = parse_cert_chain(&material.cert_pem)?;
    let key = parse_private_key(&material.key_pem)?;
    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| MrdError::Tls(e.to_string()))?;
    Ok(Arc::new(config))
}

/// Build a client-side TLS config that trusts exactly the daemon's
/// self-signed certificate (no system trust store — dial-in peers are
/// pinned to the certificate handed out at handshake time).
pub fn build_client_config(peer_cert_pem: &[u8]) -> Result<TlsClientConfig, MrdError> {
    ensure_crypto_provider();
    let certs = parse_cert_chain(peer_cert_pem)?;
    let mut roots = rustls::RootCertStore::empty();
    for cert in certs {
        roots.add(cert).map_err(|e| MrdError::Tls(e.to_string()))?;
    }
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_material_parses_as_a_valid_cert_chain_and_key() {
        let material = generate_ephemeral_material(vec!["localhost".into()]).expect("generates");
        assert!(parse_cert_chain(&material.cert_pem).is_ok());
        assert!(parse_private_key(&material.key_pem).is_ok());
    }

    #[test]
    fn server_config_builds_from_generated_material() {
        let material = generate_ephemeral_material(vec!["localhost".into()]).expect("generates");
        assert!(build_server_config(&material).is_ok());
    }

    #[test]
    fn client_config_trusts_the_generated_cert() {
        let material = generate_ephemeral_material(vec!["localhost".into()]).expect("generates");
        assert!(build_client_config(&material.cert_pem).is_ok());
    }
}
