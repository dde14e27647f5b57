//! Request template built from ASCII art.
//!
//! Every line of the art becomes one pipelined `HEAD` request whose query
//! string carries the line, so a server's access log renders the picture.
//! The `Host` header holds a placeholder that is replaced per connection.

use bytes::{Bytes, BytesMut};

/// Placeholder replaced with the destination address.
pub const HOST_PLACEHOLDER: &[u8] = b"%IP%";

/// Marks the end of each request line; one per request block.
const REQUEST_DELIMITER: &[u8] = b"HTTP/1.1\r\n";

/// Wraps every art line on both sides.
const SEGMENT_MARKER: &str = "...";

/// Replaces spaces so the segment survives as a single path token.
const FILLER: char = '.';

/// Immutable set of pipelined request blocks.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    data: Bytes,
    request_count: usize,
}

impl RequestTemplate {
    /// Build a template from multi-line art.
    pub fn from_art(art: &str) -> Result<Self, TemplateError> {
        let mut lines: Vec<&str> = art.split('\n').collect();
        if lines.last() == Some(&"") {
            lines.pop();
        }
        if lines.is_empty() {
            return Err(TemplateError::Empty);
        }

        let width = lines
            .iter()
            .map(|line| line.trim_end().chars().count())
            .max()
            .unwrap_or(0);

        let mut message = String::new();
        for line in lines {
            let line = line.replace('\r', "");
            let padded = format!("{SEGMENT_MARKER}{line:<width$}{SEGMENT_MARKER}");
            let segment = padded.replace(' ', &FILLER.to_string());
            message.push_str(&format!(
                "HEAD /?q{segment} HTTP/1.1\r\nHost: %IP%\r\n\r\n"
            ));
        }

        Ok(Self::from_bytes(Bytes::from(message)))
    }

    /// Wrap pre-built request bytes.
    pub fn from_bytes(data: Bytes) -> Self {
        let request_count = count_requests(&data);
        Self {
            data,
            request_count,
        }
    }

    /// Number of pipelined request blocks.
    pub fn request_count(&self) -> usize {
        self.request_count
    }

    /// Raw template bytes, placeholder included.
    #[cfg(test)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Substitute every placeholder with `host`.
    pub fn render(&self, host: &str) -> Bytes {
        let mut out = BytesMut::with_capacity(self.data.len() + host.len() * self.request_count);
        let mut rest = &self.data[..];

        while let Some(pos) = find(rest, HOST_PLACEHOLDER) {
            out.extend_from_slice(&rest[..pos]);
            out.extend_from_slice(host.as_bytes());
            rest = &rest[pos + HOST_PLACEHOLDER.len()..];
        }
        out.extend_from_slice(rest);

        out.freeze()
    }
}

/// Count request blocks in rendered or raw request bytes.
pub fn count_requests(data: &[u8]) -> usize {
    let mut count = 0;
    let mut rest = data;
    while let Some(pos) = find(rest, REQUEST_DELIMITER) {
        count += 1;
        rest = &rest[pos + REQUEST_DELIMITER.len()..];
    }
    count
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Template construction errors
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateError {
    /// The art contained no lines.
    Empty,
}

impl std::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateError::Empty => write!(f, "art is empty, no requests to build"),
        }
    }
}

impl std::error::Error for TemplateError {}
