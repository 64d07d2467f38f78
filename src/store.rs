//! Token Store - Immutable Snapshot of a Loaded Token Set
//!
//! Built wholesale from source documents. Later documents overwrite earlier
//! definitions at the same path; iteration order is first-insertion order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::tokens::{Node, Token};

/// Content skipped during a load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadIssue {
    pub source_file: String,
    #[serde(default)]
    pub path: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub documents_loaded: usize,
    pub tokens_loaded: usize,
    pub skipped: Vec<LoadIssue>,
}

#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    tokens: Vec<Token>,
    index: HashMap<String, usize>,
    report: LoadReport,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from already-parsed documents keyed by source file.
    pub fn load<I, S>(documents: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let mut store = Self::new();
        for (source, doc) in documents {
            store.add_document(&source.into(), &doc);
        }
        info!(
            documents = store.report.documents_loaded,
            tokens = store.tokens.len(),
            skipped = store.report.skipped.len(),
            "Token store loaded"
        );
        store
    }

    /// Build a store from raw document text. Unparseable documents are skipped.
    pub fn load_sources<I, S, C>(sources: I) -> Self
    where
        I: IntoIterator<Item = (S, C)>,
        S: Into<String>,
        C: AsRef<str>,
    {
        let mut store = Self::new();
        for (source, content) in sources {
            let source = source.into();
            match serde_json::from_str::<Value>(content.as_ref()) {
                Ok(doc) => store.add_document(&source, &doc),
                Err(e) => store.skip(&source, None, format!("invalid JSON: {}", e)),
            }
        }
        store
    }

    /// Merge one document into the store.
    pub fn add_document(&mut self, source_file: &str, doc: &Value) {
        let (root, issues) = match Node::parse_document(doc) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.skip(source_file, None, e.to_string());
                return;
            }
        };

        for issue in issues {
            self.skip(source_file, Some(issue.path), issue.message);
        }

        for (path, def) in root.flatten() {
            self.insert(Token {
                path,
                value: def.value.clone(),
                token_type: def.token_type.clone(),
                description: def.description.clone(),
                source_file: source_file.to_string(),
            });
            self.report.tokens_loaded += 1;
        }
        self.report.documents_loaded += 1;
    }

    /// Insert or overwrite; an overwrite keeps the original position.
    pub fn insert(&mut self, token: Token) {
        match self.index.get(&token.path) {
            Some(&i) => self.tokens[i] = token,
            None => {
                self.index.insert(token.path.clone(), self.tokens.len());
                self.tokens.push(token);
            }
        }
    }

    fn skip(&mut self, source_file: &str, path: Option<String>, message: String) {
        warn!(source_file, path = path.as_deref().unwrap_or(""), %message, "Skipping malformed token content");
        self.report.skipped.push(LoadIssue {
            source_file: source_file.to_string(),
            path,
            message,
        });
    }

    pub fn get(&self, path: &str) -> Option<&Token> {
        self.index.get(path).map(|&i| &self.tokens[i])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    pub fn source_files(&self) -> Vec<&str> {
        let mut files: Vec<&str> = self.tokens.iter().map(|t| t.source_file.as_str()).collect();
        files.sort_unstable();
        files.dedup();
        files
    }
}

impl FromIterator<Token> for TokenStore {
    fn from_iter<T: IntoIterator<Item = Token>>(iter: T) -> Self {
        let mut store = Self::new();
        for token in iter {
            store.insert(token);
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_walks_nested_groups() {
        let store = TokenStore::load([(
            "tokens/core/colors.json",
            json!({
                "$metadata": { "tokenSetOrder": ["core"] },
                "core": { "colors": { "color": { "brand": {
                    "brand-300": { "value": "#f96302", "type": "color" }
                }}}}
            }),
        )]);
        let token = store.get("core.colors.color.brand.brand-300").unwrap();
        assert_eq!(token.value, json!("#f96302"));
        assert_eq!(token.source_file, "tokens/core/colors.json");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_later_documents_win() {
        let store = TokenStore::load([
            ("a.json", json!({ "x": { "value": 1 }, "y": { "value": 2 } })),
            ("b.json", json!({ "x": { "value": 10 }, "z": { "value": 3 } })),
        ]);
        assert_eq!(store.get("x").unwrap().value, json!(10));
        assert_eq!(store.get("x").unwrap().source_file, "b.json");
        let order: Vec<_> = store.iter().map(|t| t.path.as_str()).collect();
        assert_eq!(order, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_malformed_documents_are_skipped() {
        let store = TokenStore::load_sources([
            ("good.json", r##"{ "a": { "value": "#fff" } }"##),
            ("broken.json", "{ not json"),
            ("array.json", "[1, 2]"),
        ]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.report().documents_loaded, 1);
        assert_eq!(store.report().skipped.len(), 2);
        assert_eq!(store.report().skipped[0].source_file, "broken.json");
    }

    #[test]
    fn test_source_files_deduplicated() {
        let store: TokenStore = vec![
            Token::new("a", json!(1)).in_file("x.json"),
            Token::new("b", json!(2)).in_file("x.json"),
            Token::new("c", json!(3)).in_file("w.json"),
        ]
        .into_iter()
        .collect();
        assert_eq!(store.source_files(), vec!["w.json", "x.json"]);
    }
}
