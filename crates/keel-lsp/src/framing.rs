//! LSP base-protocol framing (`Content-Length` header transport).
//!
//! The child process side of a bridge speaks this framing over stdio;
//! WebSocket frames carry the bare JSON body. Headers are parsed
//! case-insensitively and unknown headers (`Content-Type`) are ignored.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::ProxyError;

/// Read one framed message body.
///
/// Returns `Ok(None)` on a clean end-of-stream at a message boundary;
/// end-of-stream inside a frame is a protocol error.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<String>, ProxyError>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut line = String::new();

    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return if content_length.is_none() {
                Ok(None)
            } else {
                Err(ProxyError::Protocol("end of stream inside header".into()))
            };
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }

        if let Some((name, value)) = trimmed.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                let parsed = value.trim().parse().map_err(|_| {
                    ProxyError::Protocol(format!("bad content-length: {}", value.trim()))
                })?;
                content_length = Some(parsed);
            }
        }
    }

    let len =
        content_length.ok_or_else(|| ProxyError::Protocol("missing content-length header".into()))?;

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;

    String::from_utf8(body)
        .map(Some)
        .map_err(|e| ProxyError::Protocol(format!("message body is not utf-8: {e}")))
}

/// Write one message body with its framing header.
pub async fn write_message<W>(writer: &mut W, body: &str) -> Result<(), ProxyError>
where
    W: AsyncWrite + Unpin,
{
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(body.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
