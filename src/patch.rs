//! Patch Engine - Replay Pending Changes onto Raw Documents
//!
//! Works on the nested JSON exactly as stored. Writes create intermediate
//! groups, deletes prune groups left empty, and every affected document is
//! rewritten once with all of its changes.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

use crate::changes::{Change, ChangeKind, PendingChanges};
use crate::hashing::document_hash;
use crate::tokens::{is_leaf, Token};

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("Invalid JSON in {file}: {source}")]
    InvalidJson {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Document {file} root is not an object")]
    NotAnObject { file: String },

    #[error("Cannot write {path}: {segment} is not a group")]
    PathConflict { path: String, segment: String },

    #[error("{kind:?} change for {path} has no after state")]
    MissingSnapshot { path: String, kind: ChangeKind },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Spelling of leaf fields: `value` or `$value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStyle {
    Plain,
    Dtcg,
}

impl KeyStyle {
    /// DTCG if the document already has any `$value` leaf.
    pub fn detect(doc: &Value) -> Self {
        fn has_dtcg(v: &Value) -> bool {
            match v {
                Value::Object(map) => map.contains_key("$value") || map.values().any(has_dtcg),
                _ => false,
            }
        }
        if has_dtcg(doc) { KeyStyle::Dtcg } else { KeyStyle::Plain }
    }

    fn of_leaf(map: &Map<String, Value>) -> Option<Self> {
        if map.contains_key("$value") {
            Some(KeyStyle::Dtcg)
        } else if map.contains_key("value") {
            Some(KeyStyle::Plain)
        } else {
            None
        }
    }

    fn key(self, field: &str) -> String {
        match self {
            KeyStyle::Plain => field.to_string(),
            KeyStyle::Dtcg => format!("${}", field),
        }
    }
}

/// Apply changes, in order, to one parsed document.
pub fn apply_changes(file: &str, doc: &mut Value, changes: &[&Change]) -> Result<(), PatchError> {
    let style = KeyStyle::detect(doc);
    let root = doc
        .as_object_mut()
        .ok_or_else(|| PatchError::NotAnObject { file: file.to_string() })?;

    for change in changes {
        match change.kind {
            ChangeKind::Create | ChangeKind::Update => {
                write_token(root, change.target_path(), after_of(change)?, style)?;
            }
            ChangeKind::Delete => {
                if !remove_token(root, &change.path) {
                    warn!(file, path = %change.path, "Delete target not present in document");
                }
            }
            ChangeKind::Rename => {
                let after = after_of(change)?;
                if !remove_token(root, &change.path) {
                    warn!(file, path = %change.path, "Rename source not present in document");
                }
                write_token(root, change.target_path(), after, style)?;
            }
        }
    }
    Ok(())
}

fn after_of(change: &Change) -> Result<&Token, PatchError> {
    change.after.as_ref().ok_or_else(|| PatchError::MissingSnapshot {
        path: change.path.clone(),
        kind: change.kind,
    })
}

/// Write a token leaf at `path`, creating groups on the way and merging into
/// an existing leaf. Unknown leaf keys such as `$extensions` survive.
pub fn write_token(
    root: &mut Map<String, Value>,
    path: &str,
    token: &Token,
    style: KeyStyle,
) -> Result<(), PatchError> {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return Err(PatchError::PathConflict { path: path.to_string(), segment: String::new() });
    };
    let conflict = |segment: &str| PatchError::PathConflict {
        path: path.to_string(),
        segment: segment.to_string(),
    };

    let mut current = root;
    for segment in parents {
        let next = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        match next {
            Value::Object(group) if !is_leaf(group) => current = group,
            _ => return Err(conflict(segment)),
        }
    }

    let slot = current
        .entry(last.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    let leaf = match slot {
        Value::Object(leaf) if is_leaf(leaf) || leaf.keys().all(|k| k.starts_with('$')) => leaf,
        _ => return Err(conflict(last)),
    };

    let style = KeyStyle::of_leaf(leaf).unwrap_or(style);
    set_field(leaf, style, "value", Some(token.value.clone()));
    set_field(leaf, style, "type", token.token_type.clone().map(|t| Value::String(t.into())));
    set_field(leaf, style, "description", token.description.clone().map(Value::String));
    Ok(())
}

fn set_field(leaf: &mut Map<String, Value>, style: KeyStyle, field: &str, value: Option<Value>) {
    let plain = KeyStyle::Plain.key(field);
    let dtcg = KeyStyle::Dtcg.key(field);
    match value {
        Some(v) => {
            let (keep, drop) = match style {
                KeyStyle::Plain => (plain, dtcg),
                KeyStyle::Dtcg => (dtcg, plain),
            };
            leaf.shift_remove(&drop);
            leaf.insert(keep, v);
        }
        None => {
            leaf.shift_remove(&plain);
            leaf.shift_remove(&dtcg);
        }
    }
}

/// Remove the leaf at `path`, pruning groups left without children.
/// Returns false if no leaf was there.
pub fn remove_token(root: &mut Map<String, Value>, path: &str) -> bool {
    let segments: Vec<&str> = path.split('.').collect();
    remove_at(root, &segments)
}

fn remove_at(map: &mut Map<String, Value>, segments: &[&str]) -> bool {
    match segments {
        [] => false,
        [last] => {
            let is_token = matches!(map.get(*last), Some(Value::Object(leaf)) if is_leaf(leaf));
            is_token && map.shift_remove(*last).is_some()
        }
        [head, rest @ ..] => {
            let Some(Value::Object(child)) = map.get_mut(*head) else {
                return false;
            };
            if is_leaf(child) {
                return false;
            }
            let removed = remove_at(child, rest);
            if removed && child.keys().all(|k| k.starts_with('$')) {
                map.shift_remove(*head);
            }
            removed
        }
    }
}

/// Parse, patch and re-serialize one document. `None` or blank content
/// starts a new document.
pub fn apply_to_source(file: &str, content: Option<&str>, changes: &[&Change]) -> Result<String, PatchError> {
    let mut doc = match content {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw).map_err(|source| {
            PatchError::InvalidJson { file: file.to_string(), source }
        })?,
        _ => Value::Object(Map::new()),
    };
    apply_changes(file, &mut doc, changes)?;
    let mut out = serde_json::to_string_pretty(&doc)?;
    out.push('\n');
    Ok(out)
}

/// New content for one document, ready for the remote store's write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePatch {
    pub source_file: String,
    /// Hash of the content this patch was built from; `None` for a new file.
    pub base_hash: Option<String>,
    pub content: String,
    pub content_hash: String,
}

impl FilePatch {
    pub fn prepare(file: &str, current: Option<&str>, changes: &[&Change]) -> Result<Self, PatchError> {
        let content = apply_to_source(file, current, changes)?;
        Ok(Self {
            source_file: file.to_string(),
            base_hash: current.map(document_hash),
            content_hash: document_hash(&content),
            content,
        })
    }

    pub fn content_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.content.as_bytes())
    }
}

/// One patch per affected document. `sources` holds the current content of
/// each document; a missing entry is a new file.
pub fn build_patches(
    pending: &PendingChanges,
    sources: &BTreeMap<String, String>,
) -> Result<Vec<FilePatch>, PatchError> {
    pending
        .by_source_file()
        .into_iter()
        .map(|(file, changes)| FilePatch::prepare(file, sources.get(file).map(String::as_str), &changes))
        .collect()
}
