//! Pending Changes
//!
//! Edits accumulate here, keyed by the path they were first recorded
//! against, until they are committed. `before` always holds the state the
//! token had before the first edit in a sequence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::path;
use crate::tokens::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
    Rename,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub id: Uuid,
    pub kind: ChangeKind,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
    #[serde(default)]
    pub before: Option<Token>,
    #[serde(default)]
    pub after: Option<Token>,
    pub source_file: String,
    pub recorded_at: DateTime<Utc>,
}

impl Change {
    fn new(kind: ChangeKind, path: &str, source_file: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            path: path::normalize(path),
            new_path: None,
            before: None,
            after: None,
            source_file: source_file.to_string(),
            recorded_at: Utc::now(),
        }
    }

    pub fn create(token: Token) -> Self {
        let mut change = Self::new(ChangeKind::Create, &token.path, &token.source_file);
        change.after = Some(token);
        change
    }

    pub fn update(before: Token, after: Token) -> Self {
        let mut change = Self::new(ChangeKind::Update, &before.path, &before.source_file);
        change.before = Some(before);
        change.after = Some(after);
        change
    }

    pub fn delete(token: Token) -> Self {
        let mut change = Self::new(ChangeKind::Delete, &token.path, &token.source_file);
        change.before = Some(token);
        change
    }

    /// Move `token` to `new_path`, keeping its content and source file.
    pub fn rename(token: Token, new_path: &str) -> Self {
        let new_path = path::normalize(new_path);
        let mut change = Self::new(ChangeKind::Rename, &token.path, &token.source_file);
        let mut after = token.clone();
        after.path = new_path.clone();
        change.new_path = Some(new_path);
        change.before = Some(token);
        change.after = Some(after);
        change
    }

    /// Path the token lives at once this change is applied.
    pub fn target_path(&self) -> &str {
        self.new_path.as_deref().unwrap_or(&self.path)
    }
}

/// Ordered pending-change log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingChanges {
    changes: Vec<Change>,
}

impl PendingChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_changes(changes: Vec<Change>) -> Self {
        let mut pending = Self::new();
        for change in changes {
            pending.record(change);
        }
        pending
    }

    /// Record an edit, merging with any pending change for the same path.
    ///
    /// - create then update stays a create with the newer content
    /// - create then delete cancels out
    /// - anything else replaces, keeping the first `before`
    pub fn record(&mut self, change: Change) {
        let Some(i) = self.changes.iter().position(|c| c.path == change.path) else {
            self.changes.push(change);
            return;
        };

        let existing = &self.changes[i];
        match (existing.kind, change.kind) {
            (ChangeKind::Create, ChangeKind::Delete) => {
                self.changes.remove(i);
            }
            (ChangeKind::Create, ChangeKind::Update) => {
                self.changes[i] = Change {
                    kind: ChangeKind::Create,
                    before: None,
                    ..change
                };
            }
            _ => {
                let before = existing.before.clone();
                self.changes[i] = Change { before, ..change };
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<&Change> {
        self.changes.iter().find(|c| c.path == path)
    }

    /// Drop the pending change for `path`, returning it.
    pub fn discard(&mut self, path: &str) -> Option<Change> {
        let i = self.changes.iter().position(|c| c.path == path)?;
        Some(self.changes.remove(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }

    pub fn as_slice(&self) -> &[Change] {
        &self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }

    /// Changes grouped by the document they belong to, in recording order.
    pub fn by_source_file(&self) -> BTreeMap<&str, Vec<&Change>> {
        let mut groups: BTreeMap<&str, Vec<&Change>> = BTreeMap::new();
        for change in &self.changes {
            groups.entry(change.source_file.as_str()).or_default().push(change);
        }
        groups
    }
}
