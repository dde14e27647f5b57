//! Endpoint list parsing.
//!
//! The list holds one `host:port` per line. Lines that do not split into
//! exactly two non-empty parts are dropped without a diagnostic.

use std::fmt;

const SEPARATOR: char = ':';

/// A destination endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    /// Kept textual; the connector rejects ports it cannot use.
    pub port: String,
}

impl Target {
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
        }
    }

    /// Parse one endpoint line.
    ///
    /// Returns `None` for blank lines and for lines with zero or several
    /// separators or an empty side.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let mut parts = line.split(SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(host), Some(port), None) if !host.is_empty() && !port.is_empty() => {
                Some(Self::new(host, port))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.host, self.port)
    }
}

/// Non-blank lines of an endpoint list.
pub fn endpoint_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().filter(|line| !line.trim().is_empty())
}

/// Count non-blank lines, used as the progress total.
pub fn count_endpoints(text: &str) -> usize {
    endpoint_lines(text).count()
}
