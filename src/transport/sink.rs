//! Transcript output sinks.
//!
//! # Design Decisions
//! - One `emit` call writes one whole record; records never interleave
//! - Sinks swallow their own I/O errors; output never affects the round trip
//! - No ordering between records beyond their sequence ids

use std::io::Write;
use std::sync::{Arc, Mutex};

use super::Transcript;

/// Destination for transcripts.
pub trait TranscriptSink: Send + Sync + 'static {
    fn emit(&self, transcript: &Transcript);
}

impl<F> TranscriptSink for F
where
    F: Fn(&Transcript) + Send + Sync + 'static,
{
    fn emit(&self, transcript: &Transcript) {
        self(transcript)
    }
}

/// Emits each transcript as a single `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl TranscriptSink for LogSink {
    fn emit(&self, transcript: &Transcript) {
        tracing::info!(
            target: "transcript",
            sequence = transcript.sequence,
            elapsed_ms = transcript.elapsed.as_secs_f64() * 1000.0,
            "\n{transcript}"
        );
    }
}

/// Writes demarcated, timestamped transcripts to a writer (stdout by default).
#[derive(Debug)]
pub struct ConsoleSink<W = std::io::Stdout> {
    writer: Mutex<W>,
}

impl ConsoleSink {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send + 'static> TranscriptSink for ConsoleSink<W> {
    fn emit(&self, transcript: &Transcript) {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f %z");
        let rule = "-".repeat(32);
        let record = format!("\n{rule} {now} {rule}\n{transcript}\n{rule} {now} {rule}\n\n");

        let mut writer = match self.writer.lock() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        };
        let written = writer.write_all(record.as_bytes());
        if let Err(e) = written.and_then(|()| writer.flush()) {
            tracing::warn!(sequence = transcript.sequence, error = %e, "Failed to write transcript");
        }
    }
}

/// Keeps transcripts in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<Transcript>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far, in emission order.
    pub fn transcripts(&self) -> Vec<Transcript> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl TranscriptSink for MemorySink {
    fn emit(&self, transcript: &Transcript) {
        let mut records = match self.records.lock() {
            Ok(r) => r,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.push(transcript.clone());
    }
}
