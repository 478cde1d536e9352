use crate::error::TraceError;
use crate::session::TraceSession;
use georoute_geo::GeoEnricher;
use georoute_model::RouteEntry;
use georoute_route::assemble;
use georoute_trace::{HopSource, TraceEvent};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_TARGET: &str = "google.com";

/// Unknown status reported when a source goes away without a terminal signal.
const UNKNOWN_STATUS: i32 = -1;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub default_target: String,
    /// Treat a non-zero prober exit status as a failed trace.
    pub strict_exit: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            default_target: DEFAULT_TARGET.to_string(),
            strict_exit: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceOutcome {
    pub target: String,
    /// Distinct hops collected before enrichment.
    pub collected: usize,
    pub route: Vec<RouteEntry>,
}

/// Process-wide trace entry point. Each call to [`Pipeline::trace`] runs in
/// its own [`TraceSession`]; only the source and enricher are shared.
#[derive(Clone)]
pub struct Pipeline {
    source: Arc<dyn HopSource>,
    enricher: GeoEnricher,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(source: Arc<dyn HopSource>, enricher: GeoEnricher, settings: PipelineSettings) -> Self {
        Self {
            source,
            enricher,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Requested target, or the default when absent or blank.
    pub fn resolve_target(&self, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|target| !target.is_empty())
            .unwrap_or(self.settings.default_target.as_str())
            .to_string()
    }

    pub async fn trace(
        &self,
        requested: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<TraceOutcome, TraceError> {
        let mut session = TraceSession::new(self.resolve_target(requested));
        tracing::info!(session = session.id(), destination = %session.target(), "starting trace");

        let mut events = match self.source.start(session.target(), cancel.clone()) {
            Ok(events) => events,
            Err(err) => {
                tracing::warn!(session = session.id(), error = %err, "trace failed to start");
                session.fail();
                return Err(err.into());
            }
        };
        session.begin();

        let status = loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    session.fail();
                    return Err(TraceError::Cancelled);
                }
                event = events.recv() => event,
            };

            match event {
                Some(TraceEvent::Hop(hop)) => {
                    session.record(&hop);
                }
                Some(TraceEvent::Diagnostic { message }) => {
                    tracing::warn!(session = session.id(), %message, "prober diagnostic");
                }
                Some(TraceEvent::Done { status }) => break status,
                None => {
                    tracing::debug!(session = session.id(), "hop source closed without terminal signal");
                    break UNKNOWN_STATUS;
                }
            }
        };
        drop(events);

        let hops = session.complete(status, self.settings.strict_exit)?;

        let enriched = match self.enricher.enrich_all(&hops, &cancel).await {
            Ok(enriched) => enriched,
            Err(cancelled) => {
                session.fail();
                return Err(cancelled.into());
            }
        };
        let route = assemble(enriched);
        session.finish();

        tracing::info!(
            session = session.id(),
            destination = %session.target(),
            hops = hops.len(),
            route = route.len(),
            "trace complete"
        );

        Ok(TraceOutcome {
            target: session.target().to_string(),
            collected: hops.len(),
            route,
        })
    }
}
