//! Impact Analyzer
//!
//! One-hop scan: only tokens whose value is exactly `{path}` count. Anything
//! further up the chain is flagged by validation once its direct target breaks.

use serde::{Deserialize, Serialize};

use crate::path::format_as_reference;
use crate::store::TokenStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionImpact {
    pub path: String,
    pub direct_dependents: Vec<String>,
    pub affected_count: usize,
    pub would_break_tokens: bool,
}

pub fn analyze_deletion(path: &str, store: &TokenStore) -> DeletionImpact {
    let reference = format_as_reference(path);
    let direct_dependents: Vec<String> = store
        .iter()
        .filter(|t| t.value.as_str() == Some(reference.as_str()))
        .map(|t| t.path.clone())
        .collect();

    DeletionImpact {
        path: path.to_string(),
        affected_count: direct_dependents.len(),
        would_break_tokens: !direct_dependents.is_empty(),
        direct_dependents,
    }
}
