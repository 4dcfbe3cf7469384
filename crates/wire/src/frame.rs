// SPDX-License-Identifier: MIT

//! Length-prefixed JSON framing, grounded verbatim in the teacher's
//! `oj-daemon::protocol::wire` (4-byte big-endian length + JSON payload).

use mrd_core::ProtocolViolation;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Frames larger than this are rejected outright rather than causing an
/// unbounded allocation from a hostile or corrupted length prefix.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Serialize a value to its raw JSON bytes (no length prefix).
pub fn encode<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(value)
}

/// Deserialize a value from raw JSON bytes.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> serde_json::Result<T> {
    serde_json::from_slice(bytes)
}

/// Write a length-prefixed message: 4-byte big-endian length, then `data`.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolViolation> {
    if data.len() > MAX_FRAME_LEN {
        return Err(ProtocolViolation::FrameTooLarge);
    }
    let len = data.len() as u32;
    writer.write_all(&len.to_be_bytes()).await.map_err(|e| ProtocolViolation::Malformed(e.to_string()))?;
    writer.write_all(data).await.map_err(|e| ProtocolViolation::Malformed(e.to_string()))?;
    writer.flush().await.map_err(|e| ProtocolViolation::Malformed(e.to_string()))?;
    Ok(())
}

/// Read a length-prefixed message written by [`write_message`].
pub async fn read_message<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Vec<u8>, ProtocolViolation> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolViolation::ConnectionClosed
        } else {
            ProtocolViolation::Malformed(e.to_string())
        }
    })?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolViolation::FrameTooLarge);
    }
    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .await
        .map_err(|e| ProtocolViolation::Malformed(e.to_string()))?;
    Ok(buf)
}

/// Encode a value and write it as a length-prefixed frame.
pub async fn write_frame<W: AsyncWrite + Unpin, T: Serialize>(
    writer: &mut W,
    value: &T,
) -> Result<(), ProtocolViolation> {
    let bytes = encode(value).map_err(|e| ProtocolViolation::Malformed(e.to_string()))?;
    write_message(writer, &bytes).await
}

/// Read a length-prefixed frame and decode it.
pub async fn read_frame<R: AsyncRead + Unpin, T: DeserializeOwned>(
    reader: &mut R,
) -> Result<T, ProtocolViolation> {
    let bytes = read_message(reader).await?;
    decode(&bytes).map_err(|e| ProtocolViolation::Malformed(e.to_string()))
}
