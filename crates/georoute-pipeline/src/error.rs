use georoute_geo::Cancelled;
use georoute_trace::StartError;
use thiserror::Error;

/// Errors that end a trace without a route.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("traceroute could not be started: {0}")]
    Startup(#[from] StartError),

    /// Only raised when strict exit checking is enabled.
    #[error("traceroute exited with status {status}")]
    ProbeExited { status: i32 },

    #[error("trace cancelled")]
    Cancelled,
}

impl From<Cancelled> for TraceError {
    fn from(_: Cancelled) -> Self {
        TraceError::Cancelled
    }
}
