// SPDX-License-Identifier: MIT

//! TLS credential material (spec.md §3 "TLS client credentials").
//!
//! This module only carries the bytes; generating and validating them is
//! `mrd-transport`'s job (it owns the `rustls`/`rcgen` dependency).

use serde::{Deserialize, Serialize};

/// PEM-encoded certificate + private key pair, plus an optional password
/// callback placeholder (spec.md §6 handshake 4-tuple: `tls_password`).
///
/// The auto-generated pair is single-use (SPEC_FULL.md §5.1 / spec.md §5:
/// "a subsequent reset+configure regenerates") — this type carries no
/// caching, a fresh `TlsMaterial` is produced by every `configure()` call
/// that needs one.
#[derive(Clone, Serialize, Deserialize)]
pub struct TlsMaterial {
    pub cert_pem: Vec<u8>,
    pub key_pem: Vec<u8>,
    pub password: Option<String>,
}

impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("cert_pem", &format!("<{} bytes>", self.cert_pem.len()))
            .field("key_pem", &"<redacted>")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
