//! Body buffering and display snapshots.
//!
//! # Responsibilities
//! - Drain a one-shot body into memory exactly once
//! - Decode gzip bodies for display only
//! - Bound the display copy with a head/tail window

use std::io::{self, Read};

use axum::body::Body;
use axum::http::{header, HeaderMap};
use bytes::{Bytes, BytesMut};
use flate2::read::MultiGzDecoder;
use http_body::Body as HttpBody;
use http_body_util::BodyExt;
use tower::BoxError;

use super::{delivered_body, CaptureError, ELLIPSIS, HEAD_LEN, TAIL_LEN, TRUNCATE_THRESHOLD};

/// Display view of a message body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodySnapshot {
    display: Bytes,
    decoded_len: usize,
}

impl BodySnapshot {
    fn new(decoded: Bytes) -> Self {
        let decoded_len = decoded.len();
        Self {
            display: head_tail(decoded),
            decoded_len,
        }
    }

    /// Bytes shown in a rendering.
    pub fn as_bytes(&self) -> &Bytes {
        &self.display
    }

    /// Length of the display bytes; this is what a rendering reports.
    pub fn len(&self) -> usize {
        self.display.len()
    }

    pub fn is_empty(&self) -> bool {
        self.display.is_empty()
    }

    /// Length of the body after decoding, before truncation.
    pub fn decoded_len(&self) -> usize {
        self.decoded_len
    }

    pub fn is_truncated(&self) -> bool {
        self.decoded_len > TRUNCATE_THRESHOLD
    }
}

/// A drained body: the copy to deliver plus its display snapshot.
#[derive(Debug)]
pub struct Captured {
    pub body: Body,
    pub snapshot: BodySnapshot,
}

/// Drain `body` into memory.
///
/// Returns `None` without polling the stream when the body is already at its
/// end or the headers declare `Content-Length: 0`.
pub async fn buffer<B>(headers: &HeaderMap, body: B) -> Result<Option<Bytes>, CaptureError>
where
    B: HttpBody<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    if body.is_end_stream() || declared_length(headers) == Some(0) {
        return Ok(None);
    }

    let collected = body
        .collect()
        .await
        .map_err(|e| CaptureError::Read(e.into()))?;

    Ok(Some(collected.to_bytes()))
}

/// Build the display snapshot of buffered bytes.
///
/// `raw` is never modified; decoding works on a separate buffer.
pub fn snapshot(headers: &HeaderMap, raw: &Bytes) -> Result<BodySnapshot, CaptureError> {
    let decoded = if is_gzip(headers) {
        gunzip(raw)?
    } else {
        raw.clone()
    };

    Ok(BodySnapshot::new(decoded))
}

/// Buffer a body and snapshot it in one step.
pub async fn capture<B>(headers: &HeaderMap, body: B) -> Result<Captured, CaptureError>
where
    B: HttpBody<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let raw = buffer(headers, body).await?;
    let view = match &raw {
        Some(raw) => snapshot(headers, raw)?,
        None => BodySnapshot::default(),
    };

    Ok(Captured {
        body: delivered_body(raw.as_ref()),
        snapshot: view,
    })
}

/// Keep the first 400 and last 401 bytes of anything longer than 800 bytes.
pub fn head_tail(decoded: Bytes) -> Bytes {
    let len = decoded.len();
    if len <= TRUNCATE_THRESHOLD {
        return decoded;
    }

    let mut out = BytesMut::with_capacity(HEAD_LEN + ELLIPSIS.len() + TAIL_LEN);
    out.extend_from_slice(&decoded[..HEAD_LEN]);
    out.extend_from_slice(ELLIPSIS);
    out.extend_from_slice(&decoded[len - TAIL_LEN..]);
    out.freeze()
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn is_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("gzip"))
}

/// Decode every gzip member. An empty stream has no header and is malformed.
fn gunzip(raw: &[u8]) -> Result<Bytes, CaptureError> {
    if raw.is_empty() {
        return Err(CaptureError::Decompress(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "empty gzip stream",
        )));
    }

    let mut decoded = Vec::new();
    MultiGzDecoder::new(raw)
        .read_to_end(&mut decoded)
        .map_err(CaptureError::Decompress)?;
    Ok(Bytes::from(decoded))
}
