// SPDX-License-Identifier: MIT

//! Dial-in listeners for the four supported schemes, grounded in the
//! corpus's dual Unix+TCP accept loop (`Listener::run_dual`/`run_unix_only`)
//! generalised to also cover TLS-over-TCP and Linux abstract sockets.

use crate::dial::{DialAddr, DialUrl};
use crate::stream::Stream;
use crate::tls::TlsServerConfig;
use mrd_core::MrdError;
use tokio::net::{TcpListener, UnixListener};
use tokio_rustls::TlsAcceptor;
use tracing::debug;

/// A bound listener for one of the dial-in schemes.
pub enum Listener {
    Tcp(TcpListener),
    Tls(TcpListener, TlsAcceptor),
    Unix(UnixListener),
}

impl Listener {
    /// Bind a listener for `url`, returning the listener alongside the URL
    /// with any ephemeral port (`:0`) resolved to the bound port.
    pub async fn bind(url: &DialUrl, tls_config: Option<TlsServerConfig>) -> Result<(Self, DialUrl), MrdError> {
        match &url.addr {
            DialAddr::Tcp(addr) => {
                let listener = TcpListener::bind(addr).await?;
                let bound_port = listener.local_addr()?.port();
                Ok((Listener::Tcp(listener), url.clone().with_resolved_port(bound_port)))
            }
            DialAddr::TlsTcp(addr) => {
                let config = tls_config
                    .ok_or_else(|| MrdError::Tls("tls+tcp:// requires server TLS material".into()))?;
                let listener = TcpListener::bind(addr).await?;
                let bound_port = listener.local_addr()?.port();
                let acceptor = TlsAcceptor::from(config);
                Ok((Listener::Tls(listener, acceptor), url.clone().with_resolved_port(bound_port)))
            }
            DialAddr::Ipc(path) => {
                if path.exists() {
                    std::fs::remove_file(path)?;
                }
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let listener = UnixListener::bind(path)?;
                Ok((Listener::Unix(listener), url.clone()))
            }
            DialAddr::Abstract(name) => {
                let listener = bind_abstract(name)?;
                Ok((Listener::Unix(listener), url.clone()))
            }
        }
    }

    /// Accept one connection, returning a type-erased duplex stream.
    pub async fn accept(&self) -> Result<Stream, MrdError> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, addr) = listener.accept().await?;
                debug!(peer = %addr, "tcp accept");
                Ok(Box::pin(stream))
            }
            Listener::Tls(listener, acceptor) => {
                let (stream, addr) = listener.accept().await?;
                debug!(peer = %addr, "tls+tcp accept");
                let tls_stream = acceptor
                    .accept(stream)
                    .await
                    .map_err(|e| MrdError::Tls(e.to_string()))?;
                Ok(Box::pin(tls_stream))
            }
            Listener::Unix(listener) => {
                let (stream, _addr) = listener.accept().await?;
                debug!("unix/abstract accept");
                Ok(Box::pin(stream))
            }
        }
    }

    pub fn local_port(&self) -> Option<u16> {
        match self {
            Listener::Tcp(listener) | Listener::Tls(listener, _) => {
                listener.local_addr().ok().map(|a| a.port())
            }
            Listener::Unix(_) => None,
        }
    }
}

#[cfg(target_os = "linux")]
fn bind_abstract(name: &str) -> Result<UnixListener, MrdError> {
    use std::os::linux::net::SocketAddrExt;
    use std::os::unix::net::{SocketAddr, UnixListener as StdUnixListener};

    let addr = SocketAddr::from_abstract_name(name.as_bytes())
        .map_err(|e| MrdError::InvalidArgument(format!("invalid abstract socket name: {e}")))?;
    let std_listener = StdUnixListener::bind_addr(&addr)?;
    std_listener.set_nonblocking(true)?;
    UnixListener::from_std(std_listener).map_err(MrdError::Transport)
}

#[cfg(not(target_os = "linux"))]
fn bind_abstract(_name: &str) -> Result<UnixListener, MrdError> {
    Err(MrdError::InvalidArgument(
        "abstract:// sockets are only supported on Linux".into(),
    ))
}
