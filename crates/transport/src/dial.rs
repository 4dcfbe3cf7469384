// SPDX-License-Identifier: MIT

//! Dial-in URL parsing (spec.md §6): `tcp://host:port`, `tls+tcp://host:port`,
//! `ipc:///path`, `abstract://name`. Port `0` requests an ephemeral port;
//! [`DialUrl::with_resolved_port`] substitutes the bound port back in once
//! the listener reports it.

use mrd_core::MrdError;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

/// A parsed dial-in destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialAddr {
    Tcp(SocketAddr),
    TlsTcp(SocketAddr),
    Ipc(PathBuf),
    Abstract(String),
}

impl DialAddr {
    pub fn is_tls(&self) -> bool {
        matches!(self, DialAddr::TlsTcp(_))
    }

    pub fn port(&self) -> Option<u16> {
        match self {
            DialAddr::Tcp(addr) | DialAddr::TlsTcp(addr) => Some(addr.port()),
            DialAddr::Ipc(_) | DialAddr::Abstract(_) => None,
        }
    }
}

/// A dial-in URL, parsed from and reproducible back to its string form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialUrl {
    pub addr: DialAddr,
}

impl DialUrl {
    /// Parse one of the four supported schemes.
    pub fn parse(url: &str) -> Result<Self, MrdError> {
        if let Some(rest) = url.strip_prefix("tls+tcp://") {
            let addr = parse_socket_addr(rest)?;
            return Ok(Self { addr: DialAddr::TlsTcp(addr) });
        }
        if let Some(rest) = url.strip_prefix("tcp://") {
            let addr = parse_socket_addr(rest)?;
            return Ok(Self { addr: DialAddr::Tcp(addr) });
        }
        if let Some(rest) = url.strip_prefix("ipc://") {
            if rest.is_empty() {
                return Err(MrdError::InvalidArgument("ipc:// requires a path".into()));
            }
            return Ok(Self { addr: DialAddr::Ipc(PathBuf::from(rest)) });
        }
        if let Some(rest) = url.strip_prefix("abstract://") {
            if rest.is_empty() {
                return Err(MrdError::InvalidArgument("abstract:// requires a name".into()));
            }
            return Ok(Self { addr: DialAddr::Abstract(rest.to_string()) });
        }
        Err(MrdError::InvalidArgument(format!("unrecognised dial-in scheme: {url}")))
    }

    /// Rewrite an ephemeral-port (`:0`) URL to the port a listener actually
    /// bound (spec.md §6: "the actually bound port is substituted into the
    /// stored URL by querying the listener").
    #[must_use]
    pub fn with_resolved_port(self, bound_port: u16) -> Self {
        match self.addr {
            DialAddr::Tcp(mut addr) => {
                addr.set_port(bound_port);
                Self { addr: DialAddr::Tcp(addr) }
            }
            DialAddr::TlsTcp(mut addr) => {
                addr.set_port(bound_port);
                Self { addr: DialAddr::TlsTcp(addr) }
            }
            other => Self { addr: other },
        }
    }
}

impl fmt::Display for DialUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.addr {
            DialAddr::Tcp(addr) => write!(f, "tcp://{}", format_socket_addr(addr)),
            DialAddr::TlsTcp(addr) => write!(f, "tls+tcp://{}", format_socket_addr(addr)),
            DialAddr::Ipc(path) => write!(f, "ipc://{}", path.display()),
            DialAddr::Abstract(name) => write!(f, "abstract://{name}"),
        }
    }
}

fn format_socket_addr(addr: &SocketAddr) -> String {
    match addr {
        SocketAddr::V4(v4) => format!("{}:{}", v4.ip(), v4.port()),
        SocketAddr::V6(v6) => format!("[{}]:{}", v6.ip(), v6.port()),
    }
}

/// Parse `host:port`, requiring IPv6 hosts to be bracketed
/// (spec.md §6: "IPv6 addresses must be enclosed in brackets").
fn parse_socket_addr(hostport: &str) -> Result<SocketAddr, MrdError> {
    hostport
        .parse::<SocketAddr>()
        .map_err(|_| MrdError::InvalidArgument(format!("invalid host:port `{hostport}`")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tcp_url() {
        let url = DialUrl::parse("tcp://127.0.0.1:5555").expect("parses");
        assert_eq!(url.addr, DialAddr::Tcp("127.0.0.1:5555".parse().unwrap()));
        assert!(!url.addr.is_tls());
    }

    #[test]
    fn parses_tls_tcp_url() {
        let url = DialUrl::parse("tls+tcp://127.0.0.1:5555").expect("parses");
        assert!(url.addr.is_tls());
    }

    #[test]
    fn parses_ipv6_bracketed_host() {
        let url = DialUrl::parse("tcp://[::1]:5555").expect("parses");
        assert_eq!(url.addr.port(), Some(5555));
    }

    #[test]
    fn rejects_unbracketed_ipv6_host() {
        assert!(DialUrl::parse("tcp://::1:5555").is_err());
    }

    #[test]
    fn parses_ipc_path() {
        let url = DialUrl::parse("ipc:///tmp/mrd.sock").expect("parses");
        assert_eq!(url.addr, DialAddr::Ipc(PathBuf::from("/tmp/mrd.sock")));
    }

    #[test]
    fn parses_abstract_name() {
        let url = DialUrl::parse("abstract://mrd-5f3").expect("parses");
        assert_eq!(url.addr, DialAddr::Abstract("mrd-5f3".to_string()));
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(DialUrl::parse("udp://127.0.0.1:1").is_err());
    }

    #[test]
    fn ephemeral_port_is_substituted() {
        let url = DialUrl::parse("tcp://127.0.0.1:0").expect("parses");
        let resolved = url.with_resolved_port(48291);
        assert_eq!(resolved.addr.port(), Some(48291));
        assert_eq!(resolved.to_string(), "tcp://127.0.0.1:48291");
    }

    #[test]
    fn display_round_trips_ipv6() {
        let url = DialUrl::parse("tls+tcp://[::1]:9").expect("parses");
        assert_eq!(url.to_string(), "tls+tcp://[::1]:9");
    }
}
