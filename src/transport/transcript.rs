use std::fmt;
use std::time::Duration;

use crate::capture::Rendering;

/// Everything recorded for one observed round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub sequence: u64,
    pub request: Rendering,
    pub response: Rendering,
    pub elapsed: Duration,
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "# REQUEST {seq}\n\n{req}\n\n# RESPONSE {seq}\n\nRoundtrip: {elapsed:?}\n{res}\n",
            seq = self.sequence,
            req = self.request,
            elapsed = self.elapsed,
            res = self.response,
        )
    }
}
