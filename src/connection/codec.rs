//! # `Content-Length` framing.
//!
//! The server speaks JSON-RPC messages framed as
//! ```text
//! Content-Length: <n>\r\n
//! [other headers]\r\n
//! \r\n
//! <n bytes of UTF-8 JSON>
//! ```
//!
//! [`read_frame`] separates the two failure classes the supervisor cares about:
//! - [`FrameError::Malformed`]: the frame was consumed but its content is bad.
//!   The stream is still in sync, so the session continues (protocol fault).
//! - [`FrameError::Io`]: the stream itself failed; the session is over.
//!
//! A clean EOF between frames is `Ok(None)`.

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const CONTENT_LENGTH: &str = "content-length";

/// Frames above this size are treated as a broken stream.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Errors produced while reading one frame.
#[derive(Error, Debug)]
pub enum FrameError {
    /// The frame was read completely but is not a usable message.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// The underlying stream failed or ended mid-frame.
    #[error("channel error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            FrameError::Malformed(_) => "frame_malformed",
            FrameError::Io(_) => "frame_io",
        }
    }
}

/// Reads one frame. `Ok(None)` on clean EOF before any header byte.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Value>, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut bad_header: Option<String> = None;
    let mut saw_header = false;

    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            if saw_header {
                return Err(FrameError::Io(std::io::ErrorKind::UnexpectedEof.into()));
            }
            return Ok(None);
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            if saw_header {
                break;
            }
            // Stray blank line between frames.
            continue;
        }
        saw_header = true;

        let Some((name, value)) = line.split_once(':') else {
            bad_header.get_or_insert_with(|| format!("invalid header line {line:?}"));
            continue;
        };
        if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
            match value.trim().parse::<usize>() {
                Ok(len) => content_length = Some(len),
                Err(e) => {
                    bad_header.get_or_insert_with(|| format!("invalid Content-Length: {e}"));
                }
            }
        }
    }

    let Some(len) = content_length else {
        // Without a length the body boundary is unknown; nothing to resync on.
        let detail = bad_header.unwrap_or_else(|| "missing Content-Length header".to_string());
        return Err(FrameError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            detail,
        )));
    };
    if len > MAX_FRAME_LEN {
        return Err(FrameError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds limit"),
        )));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;

    if let Some(detail) = bad_header {
        return Err(FrameError::Malformed(detail));
    }
    let message: Value =
        serde_json::from_slice(&body).map_err(|e| FrameError::Malformed(e.to_string()))?;
    if !message.is_object() {
        return Err(FrameError::Malformed("message is not a JSON object".to_string()));
    }
    Ok(Some(message))
}

/// Writes one frame and flushes.
pub async fn write_frame<W>(writer: &mut W, message: &Value) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(message)?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await
}
