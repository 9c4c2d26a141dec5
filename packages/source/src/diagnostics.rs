//! Diagnostics channel for adapter failures and dropped records.
//!
//! Adapter-level errors never reach the caller of a query. They are logged
//! and pushed onto this channel instead, so "fewer markers than expected"
//! can always be traced back to a source and a reason.

use chrono::{DateTime, Utc};
use strum_macros::{AsRefStr, Display};
use tokio::sync::mpsc;

/// Classification of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum DiagnosticKind {
    /// The request failed or returned a non-success status.
    Transport,
    /// The response body did not match the expected schema.
    Parse,
    /// A record had no usable point geometry and was dropped.
    Geometry,
    /// A category was missing from the icon vocabulary.
    LookupMiss,
}

/// A single reported problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Source the problem came from.
    pub source_id: String,
    /// What went wrong.
    pub kind: DiagnosticKind,
    /// Human-readable detail.
    pub message: String,
    /// When it was reported.
    pub at: DateTime<Utc>,
}

/// Cloneable sink for [`Diagnostic`]s.
///
/// Every report is logged. When created through [`Diagnostics::channel`]
/// the report is also forwarded to the paired receiver.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    tx: Option<mpsc::UnboundedSender<Diagnostic>>,
}

impl Diagnostics {
    /// Creates a sink and the receiver that observes it.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Diagnostic>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Creates a sink that only logs.
    #[must_use]
    pub const fn log_only() -> Self {
        Self { tx: None }
    }

    /// Reports a problem for `source_id`.
    pub fn report(&self, source_id: &str, kind: DiagnosticKind, message: impl Into<String>) {
        let message = message.into();

        match kind {
            DiagnosticKind::Transport | DiagnosticKind::Parse => {
                log::error!("{source_id}: {kind} error: {message}");
            }
            DiagnosticKind::Geometry | DiagnosticKind::LookupMiss => {
                log::warn!("{source_id}: {kind}: {message}");
            }
        }

        if let Some(tx) = &self.tx {
            // The receiver going away just means nobody is listening anymore.
            let _ = tx.send(Diagnostic {
                source_id: source_id.to_string(),
                kind,
                message,
                at: Utc::now(),
            });
        }
    }
}

/// Drains everything currently buffered on a diagnostics receiver.
#[must_use]
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Diagnostic>) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    while let Ok(diagnostic) = rx.try_recv() {
        out.push(diagnostic);
    }
    out
}
