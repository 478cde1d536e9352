//! Per-request orchestration: hop source, collection, enrichment, assembly.

pub mod error;
pub mod pipeline;
pub mod session;

pub use error::TraceError;
pub use pipeline::{Pipeline, PipelineSettings, TraceOutcome, DEFAULT_TARGET};
pub use session::{SessionState, TraceSession};
