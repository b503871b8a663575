use std::collections::HashMap;
use std::sync::Arc;

use crate::http::connection::Connection;

/// HTTP request methods understood by the server.
///
/// Any other method token on the request line is answered with
/// 501 Not Implemented before routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// PATCH - Partial modification of a resource
    PATCH,
    /// DELETE - Delete a resource
    DELETE,
}

/// Represents a parsed HTTP request from a client.
///
/// The request is immutable once framed. It keeps a handle to the connection
/// it arrived on so that handlers which need more bytes (the continue
/// handshake) or raw framing can reach the socket.
#[derive(Debug, Clone)]
pub struct Request {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The raw request target, possibly carrying a query string
    pub path: String,
    /// HTTP version (always "HTTP/1.1" once validated)
    pub version: String,
    /// Request headers; the last occurrence of a repeated name wins
    pub headers: HashMap<String, String>,
    /// Request body as received with the head
    pub body: String,
    /// The connection the request was read from
    pub connection: Option<Arc<Connection>>,
}

/// Builder for constructing Request objects.
pub struct RequestBuilder {
    method: Option<Method>,
    path: Option<String>,
    version: Option<String>,
    headers: HashMap<String, String>,
    body: String,
    connection: Option<Arc<Connection>>,
}

impl Method {
    /// Parses an HTTP method from a string.
    ///
    /// # Returns
    ///
    /// `Some(Method)` if the string matches a supported method, `None` otherwise.
    ///
    /// # Example
    ///
    /// ```
    /// # use switchyard::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("get"), None);
    /// assert_eq!(Method::from_str("OPTIONS"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "PATCH" => Some(Method::PATCH),
            "DELETE" => Some(Method::DELETE),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::PATCH => "PATCH",
            Method::DELETE => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            method: None,
            path: None,
            version: None,
            headers: HashMap::new(),
            body: String::new(),
            connection: None,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn connection(mut self, connection: Arc<Connection>) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn build(self) -> Result<Request, &'static str> {
        Ok(Request {
            method: self.method.ok_or("method missing")?,
            path: self.path.ok_or("path missing")?,
            version: self.version.unwrap_or_else(|| "HTTP/1.1".to_string()),
            headers: self.headers,
            body: self.body,
            connection: self.connection,
        })
    }
}

impl Request {
    /// Retrieves a header value by its exact name.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|v| v.as_str())
    }

    /// Retrieves the Content-Length header value and parses it as a usize.
    ///
    /// Returns 0 if the header is missing or not a valid number.
    pub fn content_length(&self) -> usize {
        self.header("Content-Length")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// The path with any query string removed; this is the routing key.
    pub fn route_path(&self) -> &str {
        self.path
            .split_once('?')
            .map(|(p, _)| p)
            .unwrap_or(&self.path)
    }

    /// Query parameters derived from the path.
    ///
    /// Pairs are split on `&` then `=`; a pair without exactly one `=` is
    /// dropped.
    ///
    /// ```
    /// # use switchyard::http::request::{Method, RequestBuilder};
    /// let req = RequestBuilder::new()
    ///     .method(Method::GET)
    ///     .path("/data?a=1&broken&b=2=3&c=")
    ///     .build()
    ///     .unwrap();
    /// let params = req.query_params();
    /// assert_eq!(params.get("a").map(String::as_str), Some("1"));
    /// assert_eq!(params.get("c").map(String::as_str), Some(""));
    /// assert_eq!(params.len(), 2);
    /// ```
    pub fn query_params(&self) -> HashMap<String, String> {
        let Some((_, query)) = self.path.split_once('?') else {
            return HashMap::new();
        };

        query
            .split('&')
            .filter_map(|pair| {
                let mut pieces = pair.split('=');
                match (pieces.next(), pieces.next(), pieces.next()) {
                    (Some(k), Some(v), None) => Some((k.to_string(), v.to_string())),
                    _ => None,
                }
            })
            .collect()
    }

    /// Whether the client asked for the two-phase continue handshake.
    pub fn expects_continue(&self) -> bool {
        self.header("Expect").is_some()
    }
}
