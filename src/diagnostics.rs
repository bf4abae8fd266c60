//! Structured diagnostics shared by the pipeline components.
//!
//! Components receive a sink at construction instead of logging through
//! global state, so tests can assert on the exact events a run produced.
//! The production sink forwards everything to `tracing`.

use std::sync::Mutex;

/// Severity of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// What happened, independent of the human-readable detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticCode {
    /// Scanner skip filter dropped a directory entry.
    EntrySkipped,
    /// Series directory had no qualifying season subdirectories.
    EmptySeries,
    /// Season directory had no qualifying episode files.
    EmptySeason,
    /// Episode filename could not be split into stem and extension.
    EpisodeParseFailed,
    /// Season folder name yielded no season number.
    SeasonUnnumbered,
    /// One per-season catalog call failed; the season was skipped.
    SeasonFetchFailed,
    /// Fetched season count differs from the declared count.
    SeasonCountMismatch,
    /// Summed episode count differs from the declared count.
    EpisodeCountMismatch,
    /// Store records were re-keyed to a new search string.
    SearchStringRewritten,
    /// Insert was a no-op because the record id already exists.
    DuplicateRecord,
    /// Series reached the Resolved state.
    SeriesResolved,
    /// Series reached the Failed state.
    SeriesFailed,
    /// Series was skipped by the resume-from-letter filter.
    SeriesSkipped,
    /// Season hit the unmatched-episode threshold and was aborted.
    SeasonAborted,
    /// No catalog record matched a local episode.
    EpisodeUnmatched,
}

/// A single structured event emitted by a component.
#[derive(Debug, Clone)]
pub struct DiagnosticEvent {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub detail: String,
}

impl DiagnosticEvent {
    pub fn info(code: DiagnosticCode, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            code,
            detail: detail.into(),
        }
    }

    pub fn warning(code: DiagnosticCode, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            detail: detail.into(),
        }
    }

    pub fn error(code: DiagnosticCode, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            detail: detail.into(),
        }
    }
}

/// Receives diagnostic events from pipeline components.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, event: DiagnosticEvent);
}

/// Forwards events to the active `tracing` subscriber.
#[derive(Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, event: DiagnosticEvent) {
        match event.severity {
            Severity::Info => tracing::info!(code = ?event.code, "{}", event.detail),
            Severity::Warning => tracing::warn!(code = ?event.code, "{}", event.detail),
            Severity::Error => tracing::error!(code = ?event.code, "{}", event.detail),
        }
    }
}

/// Collects events in memory so tests can assert on them.
///
/// Not gated behind `#[cfg(test)]` so integration tests can use it too.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn contains(&self, code: DiagnosticCode) -> bool {
        self.events.lock().unwrap().iter().any(|e| e.code == code)
    }

    pub fn count(&self, code: DiagnosticCode) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.code == code)
            .count()
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, event: DiagnosticEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_collects_events() {
        let sink = MemorySink::new();
        sink.emit(DiagnosticEvent::info(
            DiagnosticCode::EntrySkipped,
            "skipping extras",
        ));
        sink.emit(DiagnosticEvent::warning(
            DiagnosticCode::DuplicateRecord,
            "1-2-3 already present",
        ));
        sink.emit(DiagnosticEvent::warning(
            DiagnosticCode::DuplicateRecord,
            "1-2-4 already present",
        ));

        assert_eq!(sink.events().len(), 3);
        assert!(sink.contains(DiagnosticCode::EntrySkipped));
        assert_eq!(sink.count(DiagnosticCode::DuplicateRecord), 2);
        assert!(!sink.contains(DiagnosticCode::SeriesFailed));
    }

    #[test]
    fn constructors_set_severity() {
        let event = DiagnosticEvent::error(DiagnosticCode::SeriesFailed, "boom");
        assert_eq!(event.severity, Severity::Error);
        assert_eq!(event.code, DiagnosticCode::SeriesFailed);
    }
}
