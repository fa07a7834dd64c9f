//! MJPEG wire framing (`multipart/x-mixed-replace`)
//!
//! A viewer response is one unbounded multipart body:
//!
//! ```text
//! HTTP/1.1 200 OK
//! Content-Type: multipart/x-mixed-replace; boundary=frame
//! Cache-Control: no-cache
//! Connection: keep-alive
//! Pragma: no-cache
//!
//! --frame
//! Content-Type: image/jpeg
//! Content-Length: <N>
//!
//! <N bytes of JPEG>
//! --frame
//! ...
//! ```
//!
//! Browsers render this natively from an `<img src="/video">` tag,
//! replacing the image on every part. All line endings emitted here are
//! CRLF; multipart parsers are not required to accept bare `\n`.

use bytes::{BufMut, Bytes, BytesMut};

use crate::registry::Frame;

use super::http::head_end;

/// Multipart boundary token
pub const BOUNDARY: &str = "frame";

/// Response head written to every viewer before the first part
pub const PREAMBLE: &[u8] = b"HTTP/1.1 200 OK\r\n\
    Content-Type: multipart/x-mixed-replace; boundary=frame\r\n\
    Cache-Control: no-cache\r\n\
    Connection: keep-alive\r\n\
    Pragma: no-cache\r\n\
    \r\n";

/// Error type for part parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultipartError {
    /// Part does not start with the boundary line
    InvalidBoundary,
    /// Part head carries no Content-Length
    MissingContentLength,
    /// Content-Length is not a valid number
    InvalidContentLength,
    /// Payload is not followed by CRLF
    MissingTerminator,
}

impl std::fmt::Display for MultipartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MultipartError::InvalidBoundary => write!(f, "part does not start with boundary"),
            MultipartError::MissingContentLength => write!(f, "part missing Content-Length"),
            MultipartError::InvalidContentLength => write!(f, "part has invalid Content-Length"),
            MultipartError::MissingTerminator => write!(f, "part payload not CRLF-terminated"),
        }
    }
}

impl std::error::Error for MultipartError {}

/// Encode one frame as a complete multipart part
///
/// Produces a single contiguous buffer (head + payload + terminator) so
/// each frame costs the viewer socket exactly one write.
pub fn encode_part(frame: &Frame) -> Bytes {
    let head = format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        BOUNDARY,
        frame.len()
    );

    let mut buf = BytesMut::with_capacity(head.len() + frame.len() + 2);
    buf.put_slice(head.as_bytes());
    buf.put_slice(&frame.data);
    buf.put_slice(b"\r\n");
    buf.freeze()
}

/// Parse one part from the front of `buf`
///
/// Returns the JPEG payload and the number of bytes consumed, or
/// `Ok(None)` if `buf` does not yet hold a complete part. The payload
/// length is taken from the part's `Content-Length` header.
pub fn parse_part(buf: &[u8]) -> Result<Option<(Bytes, usize)>, MultipartError> {
    let head_len = match head_end(buf) {
        Some(n) => n,
        None => return Ok(None),
    };

    let head = std::str::from_utf8(&buf[..head_len]).map_err(|_| MultipartError::InvalidBoundary)?;
    let mut lines = head.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));

    let boundary_line = lines.next().unwrap_or("");
    if boundary_line != format!("--{}", BOUNDARY) {
        return Err(MultipartError::InvalidBoundary);
    }

    let mut length: Option<usize> = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                length = Some(
                    value
                        .trim()
                        .parse()
                        .map_err(|_| MultipartError::InvalidContentLength)?,
                );
            }
        }
    }
    let length = length.ok_or(MultipartError::MissingContentLength)?;

    let total = head_len + length + 2;
    if buf.len() < total {
        return Ok(None);
    }
    if &buf[head_len + length..total] != b"\r\n" {
        return Err(MultipartError::MissingTerminator);
    }

    let payload = Bytes::copy_from_slice(&buf[head_len..head_len + length]);
    Ok(Some((payload, total)))
}
