use std::collections::HashMap;

use crate::http::status::StatusCode;

/// Content type used when a caller does not name one.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Represents a complete HTTP response ready to be sent to a client.
///
/// Contains the HTTP status code, headers, and response body.
#[derive(Debug, Clone)]
pub struct Response {
    /// The HTTP status code
    pub status: StatusCode,
    /// HTTP headers as key-value pairs
    pub headers: HashMap<String, String>,
    /// Response body as bytes
    pub body: Vec<u8>,
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// # Example
///
/// ```
/// # use switchyard::http::response::ResponseBuilder;
/// # use switchyard::http::status::StatusCode;
/// let response = ResponseBuilder::new(StatusCode::FOUND)
///     .header("Location", "http://example.com")
///     .body(b"Found: http://example.com".to_vec())
///     .build();
/// assert_eq!(response.headers["Content-Length"], "25");
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl ResponseBuilder {
    /// Creates a new response builder with the specified status code.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Adds or replaces a header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Sets the response body.
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Builds the final Response.
    ///
    /// Adds a Content-Length header matching the body unless one is present.
    pub fn build(mut self) -> Response {
        self.headers
            .entry("Content-Length".to_string())
            .or_insert_with(|| self.body.len().to_string());

        Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}

impl Response {
    /// A terminal response whose wire body is `<code>: <reason>\r\n<body>`.
    ///
    /// Content-Length counts the framed bytes, prefix included.
    ///
    /// ```
    /// # use switchyard::http::response::Response;
    /// # use switchyard::http::status::StatusCode;
    /// let response = Response::text(StatusCode::OK, "Hello, World!", "text/plain");
    /// assert_eq!(response.body, b"200: OK\r\nHello, World!".to_vec());
    /// assert_eq!(response.headers["Content-Length"], "22");
    /// ```
    pub fn text(status: StatusCode, body: &str, content_type: &str) -> Self {
        ResponseBuilder::new(status)
            .header("Content-Type", content_type)
            .body(frame_body(status, body))
            .build()
    }
}

fn frame_body(status: StatusCode, body: &str) -> Vec<u8> {
    format!("{}: {}\r\n{}", status.as_u16(), status.reason_phrase(), body).into_bytes()
}
