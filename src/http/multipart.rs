//! `multipart/form-data` body decoding.
//!
//! The decoder is line oriented: a line equal to `--<boundary>` opens a part,
//! the lines up to the first blank one are its headers, everything after is
//! its body, and `--<boundary>--` ends the whole body.

use std::collections::HashMap;
use std::io::{self, BufRead};

/// One decoded part, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Part {
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl Part {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|v| v.as_str())
    }

    /// The `filename` parameter of `Content-Disposition`, unquoted.
    pub fn filename(&self) -> Option<&str> {
        self.disposition_param("filename")
    }

    /// The form field `name` from `Content-Disposition`, unquoted.
    pub fn name(&self) -> Option<&str> {
        self.disposition_param("name")
    }

    fn disposition_param(&self, param: &str) -> Option<&str> {
        self.header("Content-Disposition")?
            .split(';')
            .map(str::trim)
            .find_map(|item| item.strip_prefix(param)?.strip_prefix('='))
            .map(|value| value.trim_matches('"'))
    }
}

#[derive(Debug)]
pub enum MultipartError {
    /// The content type carries no `boundary=` parameter.
    MissingBoundary,
    /// Reading the underlying body failed.
    Io(io::Error),
}

impl std::fmt::Display for MultipartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MultipartError::MissingBoundary => {
                f.write_str("multipart content type has no boundary")
            }
            MultipartError::Io(e) => write!(f, "failed to read multipart body: {e}"),
        }
    }
}

impl std::error::Error for MultipartError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MultipartError::Io(e) => Some(e),
            MultipartError::MissingBoundary => None,
        }
    }
}

impl From<io::Error> for MultipartError {
    fn from(e: io::Error) -> Self {
        MultipartError::Io(e)
    }
}

pub struct MultipartDecoder {
    boundary: String,
}

struct OpenPart {
    headers: HashMap<String, String>,
    body_lines: Vec<String>,
    in_headers: bool,
}

impl OpenPart {
    fn new() -> Self {
        Self {
            headers: HashMap::new(),
            body_lines: Vec::new(),
            in_headers: true,
        }
    }

    fn finish(self) -> Part {
        let body = self.body_lines.join("\r\n");
        Part {
            headers: self.headers,
            body: body.trim_end().to_string(),
        }
    }
}

impl MultipartDecoder {
    /// Builds a decoder from a `Content-Type` value; the boundary is
    /// everything after `boundary=`.
    pub fn from_content_type(content_type: &str) -> Result<Self, MultipartError> {
        let (_, boundary) = content_type
            .split_once("boundary=")
            .ok_or(MultipartError::MissingBoundary)?;
        if boundary.is_empty() {
            return Err(MultipartError::MissingBoundary);
        }
        Ok(Self {
            boundary: boundary.to_string(),
        })
    }

    /// Decodes every part of `reader`. A body without boundary markers
    /// yields no parts.
    pub fn decode<R: BufRead>(&self, reader: R) -> Result<Vec<Part>, MultipartError> {
        let delimiter = format!("--{}", self.boundary);
        let terminator = format!("--{}--", self.boundary);

        let mut parts = Vec::new();
        let mut current: Option<OpenPart> = None;

        for line in reader.lines() {
            let line = line?;
            let line = line.strip_suffix('\r').unwrap_or(&line);

            if line == terminator {
                parts.extend(current.take().map(OpenPart::finish));
                tracing::trace!(parts = parts.len(), "Multipart terminator reached");
                return Ok(parts);
            }

            if line == delimiter {
                parts.extend(current.take().map(OpenPart::finish));
                current = Some(OpenPart::new());
                continue;
            }

            // Preamble before the first delimiter is ignored.
            let Some(part) = current.as_mut() else {
                continue;
            };

            if part.in_headers {
                if line.is_empty() {
                    part.in_headers = false;
                } else {
                    let mut pieces = line.split(": ");
                    if let (Some(key), Some(value), None) =
                        (pieces.next(), pieces.next(), pieces.next())
                    {
                        part.headers.insert(key.to_string(), value.to_string());
                    }
                }
            } else {
                part.body_lines.push(line.to_string());
            }
        }

        parts.extend(current.take().map(OpenPart::finish));
        Ok(parts)
    }
}
