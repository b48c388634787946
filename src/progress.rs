//! Install progress reporting.
//!
//! The installer emits a sequence of [`InstallEvent`]s into a
//! [`ProgressSink`]. Sinks are called inline on the install task and must
//! not block: [`ChannelProgress`] forwards events into an unbounded queue
//! for a UI loop to drain, the stderr sinks write one line per event.

use serde::Serialize;
use std::io::Write;
use tokio::sync::mpsc;

/// Phase of the install pipeline.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallPhase {
    Downloading,
    Processing,
    Indexing,
    Done,
}

impl InstallPhase {
    pub fn label(&self) -> &'static str {
        match self {
            InstallPhase::Downloading => "Downloading",
            InstallPhase::Processing => "Processing",
            InstallPhase::Indexing => "Indexing",
            InstallPhase::Done => "Done",
        }
    }
}

/// A single progress event for one install.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InstallEvent {
    /// Entered a new phase. `total` is the advertised bundle size.
    Phase { phase: InstallPhase, total: i64 },
    /// Bytes received so far. `total` is 0 when the server sent no length.
    Downloading { downloaded: u64, total: u64 },
    /// The docset is indexed and searchable.
    Finished { slug: String, entry_count: usize },
}

/// Receives install events.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: InstallEvent);
}

/// Discards everything; used for silent batch updates.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _event: InstallEvent) {}
}

/// Human-friendly progress on stderr.
pub struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn report(&self, event: InstallEvent) {
        let line = match &event {
            InstallEvent::Phase { phase, .. } => format!("{}...\n", phase.label()),
            InstallEvent::Downloading { downloaded, total } if *total > 0 => {
                let pct = *downloaded as f64 / *total as f64 * 100.0;
                format!(
                    "\rDownloading {:.1}% ({} / {} bytes)",
                    pct,
                    format_number(*downloaded),
                    format_number(*total)
                )
            }
            InstallEvent::Downloading { downloaded, .. } => {
                format!("\rDownloading {} bytes", format_number(*downloaded))
            }
            InstallEvent::Finished { slug, entry_count } => {
                format!("Installed {} ({} entries)\n", slug, format_number(*entry_count as u64))
            }
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressSink for JsonProgress {
    fn report(&self, event: InstallEvent) {
        if let Ok(line) = serde_json::to_string(&event) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// Forwards events into a channel. A dropped receiver is ignored.
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<InstallEvent>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<InstallEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&self, event: InstallEvent) {
        let _ = self.tx.send(event);
    }
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn sink(&self) -> Box<dyn ProgressSink> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
