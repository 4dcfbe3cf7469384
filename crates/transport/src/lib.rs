// SPDX-License-Identifier: MIT

//! mrd-transport: dial-in URL parsing, listeners, and dialers for the
//! `tcp://`, `tls+tcp://`, `ipc://`, and `abstract://` schemes
//! (SPEC_FULL.md §5.3, spec.md §6 "Dial-in URLs").

pub mod dial;
pub mod dialer;
pub mod listener;
pub mod stream;
pub mod tls;

pub use dial::{DialAddr, DialUrl};
pub use dialer::dial;
pub use listener::Listener;
pub use stream::Stream;
pub use tls::{build_client_config, build_server_config, generate_ephemeral_material, TlsClientConfig, TlsServerConfig};
