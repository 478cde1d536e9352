use crate::error::TraceError;
use georoute_model::{CollectedHop, HopEvent};
use georoute_trace::HopCollector;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Tracing,
    Completing,
    Done,
    Failed,
}

impl SessionState {
    pub fn can_advance_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Tracing)
                | (Tracing, Completing)
                | (Completing, Done)
                | (Idle, Failed)
                | (Tracing, Failed)
                | (Completing, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Done | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Tracing => "tracing",
            SessionState::Completing => "completing",
            SessionState::Done => "done",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// State of one trace request. Nothing in here is shared with other traces.
#[derive(Debug)]
pub struct TraceSession {
    id: u64,
    target: String,
    state: SessionState,
    collector: HopCollector,
}

impl TraceSession {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            target: target.into(),
            state: SessionState::Idle,
            collector: HopCollector::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn collected(&self) -> &[CollectedHop] {
        self.collector.hops()
    }

    pub fn begin(&mut self) {
        self.advance(SessionState::Tracing);
    }

    /// Feeds one hop event; returns whether it was kept.
    pub fn record(&mut self, event: &HopEvent) -> bool {
        debug_assert_eq!(self.state, SessionState::Tracing);

        match self.collector.push(event) {
            Some(hop) => {
                tracing::info!(
                    session = self.id,
                    ttl = event.ttl,
                    address = %hop.address,
                    latency = %hop.latency,
                    "hop"
                );
                true
            }
            None => {
                tracing::trace!(session = self.id, address = %event.address, "hop ignored");
                false
            }
        }
    }

    /// Handles the terminal signal and hands over the collected hops.
    ///
    /// Without `strict_exit` the status is only logged.
    pub fn complete(
        &mut self,
        status: i32,
        strict_exit: bool,
    ) -> Result<Vec<CollectedHop>, TraceError> {
        if status != 0 {
            if strict_exit {
                self.fail();
                return Err(TraceError::ProbeExited { status });
            }
            tracing::debug!(session = self.id, status, "prober exited abnormally");
        }

        self.advance(SessionState::Completing);
        Ok(std::mem::take(&mut self.collector).finish())
    }

    pub fn finish(&mut self) {
        self.advance(SessionState::Done);
    }

    pub fn fail(&mut self) {
        self.advance(SessionState::Failed);
    }

    fn advance(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "invalid session transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!(session = self.id, from = %self.state, to = %next, "session state");
        self.state = next;
    }
}
