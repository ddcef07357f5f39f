//! Length-prefixed framing.
//!
//! Every message is a 4-byte big-endian length followed by exactly that
//! many body bytes:
//!
//! ```text
//! ┌──────────────┬──────────────────────────┐
//! │ len: u32 (BE)│ body: [u8; len]          │
//! └──────────────┴──────────────────────────┘
//! ```
//!
//! The helpers are generic over any tokio reader/writer so they work on
//! whole sockets, split halves, and in-memory duplex pipes alike.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::TransportError;

/// Upper bound on a single frame body (1 MiB).
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Reads one frame.
///
/// Returns `Ok(None)` if the peer closed the stream cleanly on a frame
/// boundary. A close in the middle of a frame is an error.
pub async fn read_frame<R>(
    reader: &mut R,
) -> Result<Option<Vec<u8>>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        let n = reader
            .read(&mut len_buf[filled..])
            .await
            .map_err(TransportError::ReceiveFailed)?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(TransportError::ConnectionClosed(
                "stream ended inside a frame header".into(),
            ));
        }
        filled += n;
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            TransportError::ConnectionClosed(
                "stream ended inside a frame body".into(),
            )
        } else {
            TransportError::ReceiveFailed(e)
        }
    })?;
    Ok(Some(body))
}

/// Writes one frame and flushes it.
pub async fn write_frame<W>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    if data.len() > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge(data.len()));
    }
    let mut buf = Vec::with_capacity(4 + data.len());
    buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
    buf.extend_from_slice(data);
    writer
        .write_all(&buf)
        .await
        .map_err(TransportError::SendFailed)?;
    writer.flush().await.map_err(TransportError::SendFailed)
}
