use std::collections::HashMap;
use std::sync::Arc;

use crate::http::connection::Connection;
use crate::http::request::{Method, Request};
use crate::http::status::StatusCode;

/// The only protocol version the server speaks.
pub const SUPPORTED_VERSION: &str = "HTTP/1.1";

/// Request heads larger than this without a terminator are rejected.
pub const MAX_HEAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The blank line ending the head has not arrived yet.
    Incomplete,
    /// Request line with fewer than three tokens, or a non-UTF-8 head.
    InvalidRequest,
    /// No terminator within `MAX_HEAD_BYTES`.
    HeadTooLarge,
    /// Method token outside the supported set.
    UnsupportedMethod(String),
    /// Version token other than `HTTP/1.1`.
    UnsupportedVersion(String),
}

impl ParseError {
    /// Status sent back for a rejected head, `None` while more bytes are needed.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ParseError::Incomplete => None,
            ParseError::InvalidRequest | ParseError::HeadTooLarge => Some(StatusCode::BAD_REQUEST),
            ParseError::UnsupportedMethod(_) => Some(StatusCode::NOT_IMPLEMENTED),
            ParseError::UnsupportedVersion(_) => Some(StatusCode::HTTP_VERSION_NOT_SUPPORTED),
        }
    }

    /// Human-readable body for the rejection response.
    pub fn message(&self) -> &'static str {
        match self {
            ParseError::Incomplete => "Incomplete request",
            ParseError::InvalidRequest => "Bad Request",
            ParseError::HeadTooLarge => "Request head too large",
            ParseError::UnsupportedMethod(_) => "Method not implemented",
            ParseError::UnsupportedVersion(_) => "HTTP Version not supported",
        }
    }
}

/// A validated request line plus headers.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub path: String,
    pub version: String,
    pub headers: HashMap<String, String>,
    /// Bytes consumed by the head, including the terminating blank line.
    pub head_len: usize,
}

impl RequestHead {
    /// The declared body length, if any.
    pub fn content_length(&self) -> Option<usize> {
        self.headers
            .get("Content-Length")
            .and_then(|v| v.trim().parse().ok())
    }

    pub fn expects_continue(&self) -> bool {
        self.headers.contains_key("Expect")
    }

    pub fn into_request(self, body: &[u8], connection: Option<Arc<Connection>>) -> Request {
        Request {
            method: self.method,
            path: self.path,
            version: self.version,
            headers: self.headers,
            body: String::from_utf8_lossy(body).into_owned(),
            connection,
        }
    }
}

/// Parses and validates a request head.
///
/// Validation order: request-line shape (400), version (505), method (501).
pub fn parse_head(buf: &[u8]) -> Result<RequestHead, ParseError> {
    let Some(headers_end) = find_headers_end(buf) else {
        if buf.len() > MAX_HEAD_BYTES {
            return Err(ParseError::HeadTooLarge);
        }
        return Err(ParseError::Incomplete);
    };

    let headers_str =
        std::str::from_utf8(&buf[..headers_end]).map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = headers_str.split("\r\n");

    // Request line
    let request_line = lines.next().ok_or(ParseError::InvalidRequest)?;
    let mut parts = request_line.split_whitespace();

    let (Some(method_str), Some(path), Some(version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(ParseError::InvalidRequest);
    };

    if version != SUPPORTED_VERSION {
        return Err(ParseError::UnsupportedVersion(version.to_string()));
    }

    let method = Method::from_str(method_str)
        .ok_or_else(|| ParseError::UnsupportedMethod(method_str.to_string()))?;

    // Headers; lines without a ": " separator are skipped
    let mut headers = HashMap::new();

    for line in lines {
        if let Some((key, value)) = line.split_once(": ") {
            headers.insert(key.to_string(), value.to_string());
        }
    }

    Ok(RequestHead {
        method,
        path: path.to_string(),
        version: version.to_string(),
        headers,
        head_len: headers_end + 4,
    })
}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}
