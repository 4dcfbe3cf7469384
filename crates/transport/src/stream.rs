// SPDX-License-Identifier: MIT

//! A type-erased duplex byte stream, so `mrd-wire`'s framing functions can
//! be handed one concrete type regardless of which transport produced it
//! (plain TCP, TLS-over-TCP, or a Unix domain socket).

use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite};

pub trait DuplexStream: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> DuplexStream for T {}

pub type Stream = Pin<Box<dyn DuplexStream>>;
