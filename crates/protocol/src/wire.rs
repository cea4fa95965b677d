//! TCP framing for envelopes.
//!
//! # Wire format
//!
//! ```text
//! FRAME (either direction):
//!   [4 bytes BE: body_len]
//!   [body_len bytes: JSON envelope, UTF-8]
//! ```
//!
//! A connection carries strictly alternating request/reply frames. A peer
//! closing the socket between frames is a clean end of session.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::constants::MAX_FRAME_SIZE;
use crate::envelope::Message;

/// Errors produced while reading or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("connection closed mid-frame")]
    UnexpectedEof,
}

/// Encodes one envelope as a complete frame, length prefix included.
///
/// Fails with [`WireError::FrameTooLarge`] if the body exceeds `max_size`.
/// Nothing has been written anywhere at that point, so the caller's
/// connection is still usable.
pub fn encode_frame(message: &Message, max_size: usize) -> Result<Vec<u8>, WireError> {
    let mut frame = vec![0u8; 4];
    serde_json::to_writer(&mut frame, message)?;

    let body_len = frame.len() - 4;
    if body_len > max_size {
        return Err(WireError::FrameTooLarge {
            size: body_len,
            max: max_size,
        });
    }

    frame[..4].copy_from_slice(&(body_len as u32).to_be_bytes());
    Ok(frame)
}

/// Writes one envelope as a length-prefixed frame and flushes.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &Message,
) -> Result<(), WireError> {
    let frame = encode_frame(message, MAX_FRAME_SIZE)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one length-prefixed envelope.
///
/// Returns `None` if the peer closed the connection before the next frame.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<Message>, WireError> {
    let mut len_buf = [0u8; 4];
    match read_full(reader, &mut len_buf).await? {
        0 => return Ok(None),
        n if n < len_buf.len() => return Err(WireError::UnexpectedEof),
        _ => {}
    }

    let body_len = u32::from_be_bytes(len_buf) as usize;
    if body_len > MAX_FRAME_SIZE {
        return Err(WireError::FrameTooLarge {
            size: body_len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut body = vec![0u8; body_len];
    if read_full(reader, &mut body).await? < body_len {
        return Err(WireError::UnexpectedEof);
    }

    Ok(Some(serde_json::from_slice(&body)?))
}

/// Fills `buf` unless EOF arrives first; returns the number of bytes read.
async fn read_full<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> Result<usize, std::io::Error> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
