// SPDX-License-Identifier: MIT

//! Client-side dialing: a daemon connecting back to its profile's socket.

use crate::dial::{DialAddr, DialUrl};
use crate::stream::Stream;
use crate::tls::TlsClientConfig;
use mrd_core::MrdError;
use rustls_pki_types::ServerName;
use tokio::net::{TcpStream, UnixStream};
use tokio_rustls::TlsConnector;

/// Dial `url`, returning a type-erased duplex stream once connected.
///
/// `tls_config` is required for `tls+tcp://` URLs and ignored otherwise.
pub async fn dial(url: &DialUrl, tls_config: Option<TlsClientConfig>) -> Result<Stream, MrdError> {
    match &url.addr {
        DialAddr::Tcp(addr) => {
            let stream = TcpStream::connect(addr).await?;
            Ok(Box::pin(stream))
        }
        DialAddr::TlsTcp(addr) => {
            let config = tls_config
                .ok_or_else(|| MrdError::Tls("tls+tcp:// requires client TLS material".into()))?;
            let tcp = TcpStream::connect(addr).await?;
            let connector = TlsConnector::from(config);
            let server_name = ServerName::try_from("localhost")
                .map_err(|e| MrdError::Tls(e.to_string()))?
                .to_owned();
            let tls = connector
                .connect(server_name, tcp)
                .await
                .map_err(|e| MrdError::Tls(e.to_string()))?;
            Ok(Box::pin(tls))
        }
        DialAddr::Ipc(path) => {
            let stream = UnixStream::connect(path).await?;
            Ok(Box::pin(stream))
        }
        DialAddr::Abstract(name) => {
            let stream = connect_abstract(name).await?;
            Ok(Box::pin(stream))
        }
    }
}

#[cfg(target_os = "linux")]
async fn connect_abstract(name: &str) -> Result<UnixStream, MrdError> {
    use std::os::linux::net::SocketAddrExt;
    use std::os::unix::net::{SocketAddr, UnixStream as StdUnixStream};

    let addr = SocketAddr::from_abstract_name(name.as_bytes())
        .map_err(|e| MrdError::InvalidArgument(format!("invalid abstract socket name: {e}")))?;
    let std_stream = StdUnixStream::connect_addr(&addr)?;
    std_stream.set_nonblocking(true)?;
    UnixStream::from_std(std_stream).map_err(MrdError::Transport)
}

#[cfg(not(target_os = "linux"))]
async fn connect_abstract(_name: &str) -> Result<UnixStream, MrdError> {
    Err(MrdError::InvalidArgument(
        "abstract:// sockets are only supported on Linux".into(),
    ))
}
