//! Observing transport subsystem.
//!
//! # Data Flow
//! ```text
//! proxy handler
//!     → observing.rs (mint sequence id, capture request)
//!     → upstream.rs (real network round trip)
//!     → observing.rs (capture response, reattach delivered body)
//!     → sink.rs (emit transcript)
//!     → proxy handler (untouched response)
//! ```
//!
//! # Design Decisions
//! - The sequence counter is the only shared mutable state
//! - Transcripts are emitted in completion order, not id order
//! - A failed upstream call emits no transcript

pub mod counter;
pub mod error;
pub mod observing;
pub mod sink;
pub mod transcript;
pub mod upstream;

pub use counter::SequenceCounter;
pub use error::RoundTripError;
pub use observing::{CapturePolicy, ObservingLayer, ObservingTransport};
pub use sink::{ConsoleSink, LogSink, MemorySink, TranscriptSink};
pub use transcript::Transcript;
pub use upstream::Upstream;
