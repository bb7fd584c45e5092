//! Change events emitted when consecutive article versions are diffed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Removed => "removed",
        }
    }
}

/// One observed transition between two versions of an article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Id of the newer article node.
    pub article_id: String,
    pub kind: ChangeKind,
    /// Norm id that introduced the older version.
    pub from_version: Option<String>,
    /// Norm id that introduced the newer version.
    pub to_version: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Per-document accumulator. Events are advisory output: logged and carried
/// in the pipeline result, not persisted as graph edges.
#[derive(Debug, Clone)]
pub struct ChangeLog {
    document_id: String,
    events: Vec<ChangeEvent>,
}

impl ChangeLog {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            events: Vec::new(),
        }
    }

    pub fn push(&mut self, event: ChangeEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[ChangeEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<ChangeEvent> {
        self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Log a one-line summary of the accumulated events.
    pub fn log_summary(&self) {
        let (mut added, mut modified, mut removed) = (0usize, 0usize, 0usize);
        for event in &self.events {
            match event.kind {
                ChangeKind::Added => added += 1,
                ChangeKind::Modified => modified += 1,
                ChangeKind::Removed => removed += 1,
            }
        }
        info!(
            document_id = %self.document_id,
            added, modified, removed,
            "version changes detected"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_log_accumulates() {
        let mut log = ChangeLog::new("BOE-A-2000-1");
        assert!(log.is_empty());

        log.push(ChangeEvent {
            article_id: "BOE-A-2000-1-n3".to_string(),
            kind: ChangeKind::Modified,
            from_version: Some("BOE-A-1999-9".to_string()),
            to_version: Some("BOE-A-2000-1".to_string()),
            timestamp: Utc::now(),
        });

        assert_eq!(log.len(), 1);
        assert_eq!(log.events()[0].kind.as_str(), "modified");
    }
}
