//! Core domain types for mdigest runs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// SourceItem
// ---------------------------------------------------------------------------

/// One identifier (usually a URL) from the input list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceItem {
    /// Position in the original input. Stable for the item's lifetime.
    pub index: usize,
    /// Free-text identifier sent to the generation service.
    pub identifier: String,
}

impl SourceItem {
    pub fn new(index: usize, identifier: impl Into<String>) -> Self {
        Self {
            index,
            identifier: identifier.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// FetchOutcome
// ---------------------------------------------------------------------------

/// Result of one generation call: either Markdown content or an error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum FetchStatus {
    Content(String),
    Failed(String),
}

/// Outcome for a single [`SourceItem`]. Produced once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOutcome {
    /// Index of the originating item.
    pub index: usize,
    /// Identifier of the originating item, kept for reporting.
    pub identifier: String,
    /// Content or error.
    pub status: FetchStatus,
}

impl FetchOutcome {
    pub fn content(index: usize, identifier: impl Into<String>, markdown: String) -> Self {
        Self {
            index,
            identifier: identifier.into(),
            status: FetchStatus::Content(markdown),
        }
    }

    pub fn failed(index: usize, identifier: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            index,
            identifier: identifier.into(),
            status: FetchStatus::Failed(error.into()),
        }
    }

    /// The generated Markdown, if the call succeeded.
    pub fn markdown(&self) -> Option<&str> {
        match &self.status {
            FetchStatus::Content(md) => Some(md),
            FetchStatus::Failed(_) => None,
        }
    }

    /// The error message, if the call failed.
    pub fn error(&self) -> Option<&str> {
        match &self.status {
            FetchStatus::Content(_) => None,
            FetchStatus::Failed(err) => Some(err),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, FetchStatus::Content(_))
    }
}

// ---------------------------------------------------------------------------
// TaskId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for progress task identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Generate a new time-sortable task identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// ProgressEvent
// ---------------------------------------------------------------------------

/// A progress notification for one task. A task's stream ends with exactly
/// one `Completed` or `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Free-text status line.
    Message(String),
    /// Terminal success, carrying a reference to the produced output.
    Completed(String),
    /// Terminal failure, carrying a human-readable message.
    Failed(String),
}

impl ProgressEvent {
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message(text.into())
    }

    /// Whether this event ends the task's stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_roundtrip() {
        let id = TaskId::new();
        let s = id.to_string();
        let parsed: TaskId = s.parse().expect("parse TaskId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn outcome_accessors() {
        let ok = FetchOutcome::content(0, "u1", "# A".into());
        assert_eq!(ok.markdown(), Some("# A"));
        assert_eq!(ok.error(), None);
        assert!(ok.is_success());

        let err = FetchOutcome::failed(1, "u2", "HTTP 500");
        assert_eq!(err.markdown(), None);
        assert_eq!(err.error(), Some("HTTP 500"));
        assert!(!err.is_success());
    }

    #[test]
    fn outcome_serialization() {
        let outcome = FetchOutcome::failed(2, "u3", "quota exceeded");
        let json = serde_json::to_string(&outcome).expect("serialize");
        assert!(json.contains(r#""status":"failed""#));
        let parsed: FetchOutcome = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, outcome);
    }

    #[test]
    fn terminal_events() {
        assert!(!ProgressEvent::message("batch 1").is_terminal());
        assert!(ProgressEvent::Completed("out.md".into()).is_terminal());
        assert!(ProgressEvent::Failed("boom".into()).is_terminal());
    }
}
