//! Minimal HTTP/1.1 request handling for the two stream endpoints
//!
//! The server speaks just enough HTTP for its job: `POST /stream[/{id}]`
//! and `GET /video[/{id}]`. Parsing operates on a buffered request head;
//! all socket I/O stays in the connection layer.
//!
//! Request heads are accepted with bare `\n` line endings as well as
//! CRLF — some legacy producers emit the former — but everything the
//! server writes back uses CRLF.

use bytes::{BufMut, Bytes, BytesMut};

use crate::registry::ChannelId;

/// Upper bound on a request head (request line + headers)
pub const MAX_HEAD_SIZE: usize = 8 * 1024;

/// Error type for request parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    /// Request line is not `METHOD TARGET HTTP/x.y`
    MalformedRequestLine,
    /// A header line is not `Name: value` (or head is not ASCII/UTF-8)
    MalformedHeader,
    /// Content-Length header is present but not a valid number
    InvalidContentLength,
    /// POST without a Content-Length header
    MissingContentLength,
    /// Head exceeded [`MAX_HEAD_SIZE`] without terminating
    HeadTooLarge,
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestError::MalformedRequestLine => write!(f, "malformed request line"),
            RequestError::MalformedHeader => write!(f, "malformed header"),
            RequestError::InvalidContentLength => write!(f, "invalid Content-Length"),
            RequestError::MissingContentLength => write!(f, "missing Content-Length"),
            RequestError::HeadTooLarge => write!(f, "request head too large"),
        }
    }
}

impl std::error::Error for RequestError {}

/// Request method (only the two we route on are distinguished)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Other,
}

impl Method {
    fn from_token(token: &str) -> Self {
        match token {
            "GET" => Method::Get,
            "POST" => Method::Post,
            _ => Method::Other,
        }
    }
}

/// Where a request is routed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `POST /stream` or `POST /stream/{channel}`
    Ingest(ChannelId),
    /// `GET /video` or `GET /video/{channel}`
    View(ChannelId),
    /// Known path, wrong method
    MethodNotAllowed,
    /// Everything else
    NotFound,
}

/// A parsed request head
#[derive(Debug)]
pub struct Request {
    /// Request method
    pub method: Method,
    /// Request target as sent (path + optional query)
    pub target: String,
    /// Headers with lowercased names
    headers: Vec<(String, String)>,
    /// False only for HTTP/1.0
    http_11: bool,
}

impl Request {
    /// Parse a complete request head (everything before the body)
    pub fn parse(head: &[u8]) -> Result<Request, RequestError> {
        let text = std::str::from_utf8(head).map_err(|_| RequestError::MalformedHeader)?;
        let mut lines = text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));

        let request_line = lines.next().ok_or(RequestError::MalformedRequestLine)?;
        let mut parts = request_line.split_ascii_whitespace();
        let method = parts.next().ok_or(RequestError::MalformedRequestLine)?;
        let target = parts.next().ok_or(RequestError::MalformedRequestLine)?;
        let version = parts.next().ok_or(RequestError::MalformedRequestLine)?;
        if !version.starts_with("HTTP/") || parts.next().is_some() {
            return Err(RequestError::MalformedRequestLine);
        }

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            let (name, value) = line.split_once(':').ok_or(RequestError::MalformedHeader)?;
            if name.is_empty() {
                return Err(RequestError::MalformedHeader);
            }
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }

        Ok(Request {
            method: Method::from_token(method),
            target: target.to_string(),
            headers,
            http_11: version != "HTTP/1.0",
        })
    }

    /// Look up a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// The declared body length, if any
    pub fn content_length(&self) -> Result<Option<usize>, RequestError> {
        match self.header("content-length") {
            None => Ok(None),
            Some(v) => v
                .parse::<usize>()
                .map(Some)
                .map_err(|_| RequestError::InvalidContentLength),
        }
    }

    /// The declared content type, if any
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Whether the connection should stay open after the response
    pub fn keep_alive(&self) -> bool {
        match self.header("connection") {
            Some(v) if v.eq_ignore_ascii_case("close") => false,
            Some(v) if v.eq_ignore_ascii_case("keep-alive") => true,
            _ => self.http_11,
        }
    }

    /// Route the request to an endpoint
    pub fn route(&self) -> Route {
        let path = self.target.split('?').next().unwrap_or("");

        let (is_ingest, channel) = if let Some(rest) = strip_endpoint(path, "/stream") {
            (true, rest)
        } else if let Some(rest) = strip_endpoint(path, "/video") {
            (false, rest)
        } else {
            return Route::NotFound;
        };

        let channel = match channel {
            None => ChannelId::single(),
            Some(token) if token.is_empty() || token.contains('/') => return Route::NotFound,
            Some(token) => ChannelId::new(token),
        };

        match (is_ingest, self.method) {
            (true, Method::Post) => Route::Ingest(channel),
            (false, Method::Get) => Route::View(channel),
            _ => Route::MethodNotAllowed,
        }
    }
}

/// Match `prefix` or `prefix/{segment}`, returning the segment
fn strip_endpoint<'a>(path: &'a str, prefix: &str) -> Option<Option<&'a str>> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some(None)
    } else {
        rest.strip_prefix('/').map(Some)
    }
}

/// Find the end of a request head in `buf`
///
/// Returns the index one past the blank line. Accepts CRLF and bare-LF
/// terminators.
pub fn head_end(buf: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i < buf.len() {
        if buf[i] == b'\n' {
            if buf.get(i + 1) == Some(&b'\n') {
                return Some(i + 2);
            }
            if buf.get(i + 1) == Some(&b'\r') && buf.get(i + 2) == Some(&b'\n') {
                return Some(i + 3);
            }
        }
        i += 1;
    }
    None
}

/// Build a plain-text status response
pub fn plain_response(status: u16, reason: &str, body: &str, close: bool) -> Bytes {
    let mut buf = BytesMut::with_capacity(128 + body.len());
    buf.put_slice(format!("HTTP/1.1 {} {}\r\n", status, reason).as_bytes());
    buf.put_slice(b"Content-Type: text/plain\r\n");
    buf.put_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    if close {
        buf.put_slice(b"Connection: close\r\n");
    }
    buf.put_slice(b"\r\n");
    buf.put_slice(body.as_bytes());
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_post() {
        let head = b"POST /stream/cam-1 HTTP/1.1\r\nHost: relay\r\nContent-Type: image/jpeg\r\nContent-Length: 500\r\n\r\n";
        let req = Request::parse(head).unwrap();

        assert_eq!(req.method, Method::Post);
        assert_eq!(req.content_length().unwrap(), Some(500));
        assert_eq!(req.content_type(), Some("image/jpeg"));
        assert!(req.keep_alive());
        assert_eq!(req.route(), Route::Ingest(ChannelId::new("cam-1")));
    }

    #[test]
    fn test_parse_bare_lf() {
        // Legacy producers terminate head lines with bare \n
        let head = b"POST /stream HTTP/1.1\nContent-Length: 4\n\n";
        let req = Request::parse(head).unwrap();

        assert_eq!(req.content_length().unwrap(), Some(4));
        assert_eq!(req.route(), Route::Ingest(ChannelId::single()));
    }

    #[test]
    fn test_routes() {
        let req = |line: &str| Request::parse(format!("{}\r\n\r\n", line).as_bytes()).unwrap();

        assert_eq!(
            req("GET /video HTTP/1.1").route(),
            Route::View(ChannelId::single())
        );
        assert_eq!(
            req("GET /video/abc HTTP/1.1").route(),
            Route::View(ChannelId::new("abc"))
        );
        assert_eq!(req("GET /stream/abc HTTP/1.1").route(), Route::MethodNotAllowed);
        assert_eq!(req("POST /video/abc HTTP/1.1").route(), Route::MethodNotAllowed);
        assert_eq!(req("GET / HTTP/1.1").route(), Route::NotFound);
        assert_eq!(req("GET /video/a/b HTTP/1.1").route(), Route::NotFound);
        assert_eq!(req("GET /video/ HTTP/1.1").route(), Route::NotFound);
        assert_eq!(
            req("GET /video?t=1 HTTP/1.1").route(),
            Route::View(ChannelId::single())
        );
    }

    #[test]
    fn test_keep_alive() {
        let req = |s: &str| Request::parse(s.as_bytes()).unwrap();

        assert!(req("GET /video HTTP/1.1\r\n\r\n").keep_alive());
        assert!(!req("GET /video HTTP/1.1\r\nConnection: close\r\n\r\n").keep_alive());
        assert!(!req("GET /video HTTP/1.0\r\n\r\n").keep_alive());
        assert!(req("GET /video HTTP/1.0\r\nConnection: Keep-Alive\r\n\r\n").keep_alive());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Request::parse(b"POST\r\n\r\n").unwrap_err(),
            RequestError::MalformedRequestLine
        );
        assert_eq!(
            Request::parse(b"POST /stream HTTP/1.1\r\nno-colon-here\r\n\r\n").unwrap_err(),
            RequestError::MalformedHeader
        );

        let req = Request::parse(b"POST /stream HTTP/1.1\r\nContent-Length: abc\r\n\r\n").unwrap();
        assert_eq!(
            req.content_length().unwrap_err(),
            RequestError::InvalidContentLength
        );
    }

    #[test]
    fn test_head_end() {
        assert_eq!(head_end(b"GET / HTTP/1.1\r\n\r\nrest"), Some(18));
        assert_eq!(head_end(b"GET / HTTP/1.1\n\nrest"), Some(16));
        assert_eq!(head_end(b"GET / HTTP/1.1\r\n"), None);
        assert_eq!(head_end(b""), None);
    }

    #[test]
    fn test_plain_response() {
        let bytes = plain_response(200, "OK", "OK", false);
        let text = std::str::from_utf8(&bytes).unwrap();

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 2\r\n"));
        assert!(!text.contains("Connection: close"));
        assert!(text.ends_with("\r\n\r\nOK"));

        let closing = plain_response(404, "Not Found", "not found\n", true);
        assert!(std::str::from_utf8(&closing)
            .unwrap()
            .contains("Connection: close\r\n"));
    }
}
