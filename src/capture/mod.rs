//! Body capture and rendering subsystem.
//!
//! # Data Flow
//! ```text
//! message body (one-shot stream)
//!     → body.rs::buffer (drain fully into memory, drop the stream)
//!     → Bytes shared by two views:
//!         → delivered copy (reattached to the message)
//!         → body.rs::snapshot (gunzip if declared, head/tail truncate)
//!     → render.rs (start line + headers + display body)
//! ```
//!
//! # Design Decisions
//! - Buffer fully, then fan out: the stream is read exactly once
//! - Delivered copy is always the raw bytes, never the decoded ones
//! - Declared empty bodies are never polled
//! - No upper bound on buffered size; large bodies cost memory and latency

pub mod body;
pub mod render;

use axum::body::Body;
use tower::BoxError;

pub use body::{buffer, capture, head_tail, snapshot, BodySnapshot, Captured};
pub use render::{render_request, render_response, Rendering};

/// Bodies longer than this many bytes are truncated for display.
pub const TRUNCATE_THRESHOLD: usize = 800;

/// Bytes kept from the start of a truncated body.
pub const HEAD_LEN: usize = 400;

/// Bytes kept from the end of a truncated body.
pub const TAIL_LEN: usize = 401;

/// Marker inserted between head and tail.
pub const ELLIPSIS: &[u8] = b"...";

/// Error raised while capturing a message body.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The original body stream failed mid-read.
    #[error("failed to read body: {0}")]
    Read(#[source] BoxError),

    /// The body declared `Content-Encoding: gzip` but did not decode.
    #[error("failed to decompress gzip body: {0}")]
    Decompress(#[source] std::io::Error),
}

impl CaptureError {
    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureError::Read(_) => "read",
            CaptureError::Decompress(_) => "decompress",
        }
    }
}

/// Build the body handed downstream from what [`buffer`] produced.
pub fn delivered_body(raw: Option<&bytes::Bytes>) -> Body {
    match raw {
        Some(raw) => Body::from(raw.clone()),
        None => Body::empty(),
    }
}
