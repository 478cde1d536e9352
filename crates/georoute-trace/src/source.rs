use crate::parser::parse_traceroute_n_with_target;
use georoute_model::HopEvent;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Capacity of the channel between a hop source and its consumer.
pub const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    Hop(HopEvent),
    /// Diagnostic output from the prober (stderr); never terminal.
    Diagnostic { message: String },
    /// Terminal signal. `-1` when the exit status is unknown.
    Done { status: i32 },
}

#[derive(Debug, Error)]
pub enum StartError {
    #[error("invalid trace target {target:?}: {reason}")]
    InvalidTarget { target: String, reason: &'static str },

    #[error("failed to spawn {program} for {target}: {source}")]
    Spawn {
        program: String,
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("missing {0} pipe from prober")]
    MissingPipe(&'static str),
}

#[derive(Debug, Clone)]
pub struct TraceSettings {
    pub program: String,
    pub max_hops: u32,
    pub probes: u32,
    pub timeout_ms: u64,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            program: "traceroute".to_string(),
            max_hops: 30,
            probes: 3,
            timeout_ms: 2000,
        }
    }
}

/// Producer of hop events for one target.
///
/// `start` must be called from within a tokio runtime. Failing to start is
/// the only error a source reports; everything after that arrives as events,
/// ending with [`TraceEvent::Done`].
pub trait HopSource: Send + Sync {
    fn start(
        &self,
        target: &str,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<TraceEvent>, StartError>;
}

/// Rejects targets the prober would misread: blanks, control characters and
/// anything that looks like a command-line flag.
pub fn validate_target(target: &str) -> Result<(), StartError> {
    let reason = if target.is_empty() {
        Some("target is empty")
    } else if target.starts_with('-') {
        Some("target must not start with '-'")
    } else if target.chars().any(|c| c.is_whitespace() || c.is_control()) {
        Some("target must not contain whitespace or control characters")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StartError::InvalidTarget {
            target: target.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Replays captured `traceroute -n` output instead of probing.
#[derive(Debug, Clone)]
pub struct ReplayHopSource {
    target: Option<String>,
    hops: Vec<HopEvent>,
}

impl ReplayHopSource {
    pub fn new(hops: Vec<HopEvent>) -> Self {
        Self { target: None, hops }
    }

    /// Parses captured output; `fallback` stands in for a missing header.
    pub fn from_output(text: &str, fallback: &str) -> anyhow::Result<Self> {
        let parsed = parse_traceroute_n_with_target(text, fallback)?;
        Ok(Self {
            target: Some(parsed.target),
            hops: parsed.hops,
        })
    }

    /// Destination named by the captured output, if it was parsed from text.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }
}

impl HopSource for ReplayHopSource {
    fn start(
        &self,
        target: &str,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<TraceEvent>, StartError> {
        validate_target(target)?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let hops = self.hops.clone();
        tokio::spawn(async move {
            for hop in hops {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    sent = tx.send(TraceEvent::Hop(hop)) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
            let _ = tx.send(TraceEvent::Done { status: 0 }).await;
        });

        Ok(rx)
    }
}
