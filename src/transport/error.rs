use tower::BoxError;

use crate::capture::CaptureError;

/// Error returned by an observed round trip.
#[derive(Debug, thiserror::Error)]
pub enum RoundTripError {
    /// The upstream service failed; the inner error is kept as-is.
    #[error("upstream round trip failed: {0}")]
    Upstream(#[source] BoxError),

    /// A body could not be captured, so nothing was delivered.
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

impl RoundTripError {
    /// The upstream error, if that is what failed.
    pub fn upstream(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            RoundTripError::Upstream(e) => Some(e.as_ref()),
            RoundTripError::Capture(_) => None,
        }
    }
}
