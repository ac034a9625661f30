//! Human-readable renderings of HTTP messages.
//!
//! Output is HTTP/1 shaped (start line, headers, blank line, body) but is
//! meant for reading, not for parsing back.

use std::fmt::{self, Write as _};

use axum::http::{header, request, response, HeaderMap};
use bytes::Bytes;

use super::BodySnapshot;

/// Rendered head and display body of one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendering {
    head: String,
    body: Bytes,
}

impl Rendering {
    /// Start line and headers, each line terminated by CRLF.
    pub fn head(&self) -> &str {
        &self.head
    }

    /// Display body, possibly decoded and truncated.
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

impl fmt::Display for Rendering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.head)?;
        f.write_str("\r\n")?;
        f.write_str(&String::from_utf8_lossy(&self.body))
    }
}

/// Render an outgoing request.
pub fn render_request(parts: &request::Parts, snapshot: &BodySnapshot) -> Rendering {
    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let mut head = format!("{} {} {:?}\r\n", parts.method, target, parts.version);

    if !parts.headers.contains_key(header::HOST) {
        if let Some(authority) = parts.uri.authority() {
            let _ = write!(head, "host: {authority}\r\n");
        }
    }
    write_headers(&mut head, &parts.headers, snapshot);

    Rendering {
        head,
        body: snapshot.as_bytes().clone(),
    }
}

/// Render an incoming response.
pub fn render_response(parts: &response::Parts, snapshot: &BodySnapshot) -> Rendering {
    let mut head = format!(
        "{:?} {}{}\r\n",
        parts.version,
        parts.status.as_u16(),
        parts
            .status
            .canonical_reason()
            .map(|r| format!(" {r}"))
            .unwrap_or_default(),
    );
    write_headers(&mut head, &parts.headers, snapshot);

    Rendering {
        head,
        body: snapshot.as_bytes().clone(),
    }
}

// The rendered content-length is the display length, so a truncated body
// reports 804 rather than its length on the wire.
fn write_headers(out: &mut String, headers: &HeaderMap, snapshot: &BodySnapshot) {
    let declared = headers.contains_key(header::CONTENT_LENGTH);

    for (name, value) in headers {
        if name == header::CONTENT_LENGTH
            || (name == header::TRANSFER_ENCODING && !snapshot.is_empty())
        {
            continue;
        }
        let _ = write!(out, "{}: {}\r\n", name, String::from_utf8_lossy(value.as_bytes()));
    }

    if declared || !snapshot.is_empty() {
        let _ = write!(out, "content-length: {}\r\n", snapshot.len());
    }
}
