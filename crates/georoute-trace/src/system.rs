use crate::parser::HopLineParser;
use crate::source::{validate_target, HopSource, StartError, TraceEvent, TraceSettings, EVENT_BUFFER};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::mpsc::{self, Sender};
use tokio_util::sync::CancellationToken;

/// Hop source backed by the system `traceroute` binary in numeric mode.
#[derive(Debug, Clone, Default)]
pub struct SystemHopSource {
    settings: TraceSettings,
}

impl SystemHopSource {
    pub fn new(settings: TraceSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &TraceSettings {
        &self.settings
    }

    fn command(&self, target: &str) -> Command {
        let settings = &self.settings;
        let timeout_secs = settings.timeout_ms.div_ceil(1000).max(1);

        let mut cmd = Command::new(&settings.program);
        cmd.arg("-n")
            .arg("-q")
            .arg(settings.probes.to_string())
            .arg("-m")
            .arg(settings.max_hops.to_string())
            .arg("-w")
            .arg(timeout_secs.to_string())
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl HopSource for SystemHopSource {
    fn start(
        &self,
        target: &str,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<TraceEvent>, StartError> {
        validate_target(target)?;

        let mut child = self
            .command(target)
            .spawn()
            .map_err(|source| StartError::Spawn {
                program: self.settings.program.clone(),
                target: target.to_string(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or(StartError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(StartError::MissingPipe("stderr"))?;

        tracing::debug!(destination = %target, program = %self.settings.program, "prober started");

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(forward_events(child, stdout, stderr, tx, cancel));
        Ok(rx)
    }
}

// Single writer: every hop is sent before the diagnostic and terminal events.
async fn forward_events(
    mut child: Child,
    stdout: ChildStdout,
    stderr: ChildStderr,
    tx: Sender<TraceEvent>,
    cancel: CancellationToken,
) {
    let diagnostics = tokio::spawn(read_diagnostics(stderr));
    let mut lines = BufReader::new(stdout).lines();
    let mut parser = HopLineParser::new();

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("prober cancelled");
                stop(&mut child).await;
                return;
            }
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(line)) => {
                if let Some(hop) = parser.feed(&line) {
                    if tx.send(TraceEvent::Hop(hop)).await.is_err() {
                        stop(&mut child).await;
                        return;
                    }
                }
            }
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read prober output");
                break;
            }
        }
    }

    if let Some(hop) = parser.finish() {
        if tx.send(TraceEvent::Hop(hop)).await.is_err() {
            stop(&mut child).await;
            return;
        }
    }

    if let Ok(message) = diagnostics.await {
        if !message.is_empty() {
            let _ = tx.send(TraceEvent::Diagnostic { message }).await;
        }
    }

    let status = tokio::select! {
        _ = cancel.cancelled() => {
            stop(&mut child).await;
            return;
        }
        status = child.wait() => status.ok().and_then(|s| s.code()).unwrap_or(-1),
    };

    let _ = tx.send(TraceEvent::Done { status }).await;
}

async fn read_diagnostics(stderr: ChildStderr) -> String {
    let mut lines = BufReader::new(stderr).lines();
    let mut buf = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        if !buf.is_empty() {
            buf.push(' ');
        }
        buf.push_str(line.trim());
    }
    buf
}

async fn stop(child: &mut Child) {
    if let Err(err) = child.kill().await {
        tracing::debug!(error = %err, "failed to kill prober");
    }
}
