//! Reference Resolver
//!
//! Follows `{...}` references to a terminal literal. When a reference does
//! not name a token exactly, an ordered table of path rewrites is tried and
//! the first hit wins. The table order is part of the contract: changing it
//! changes which references are accepted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

use crate::path;
use crate::store::TokenStore;
use crate::tokens::Token;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Token not found: {path}")]
    NotFound { path: String },

    #[error("Unresolved reference {{{reference}}} in {from}")]
    UnresolvedReference { from: String, reference: String },

    #[error("Circular reference: {}", .chain.join(" -> "))]
    CircularReference { chain: Vec<String> },
}

/// One alternate-path heuristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PathRewrite {
    /// The reference as written.
    Exact,
    /// `<prefix><reference>`.
    Prefix { prefix: Cow<'static, str> },
    /// Replace a leading `segment` with `replacement`.
    FirstSegment {
        segment: Cow<'static, str>,
        replacement: Cow<'static, str>,
    },
    /// Any token whose path ends with `.<reference>`, first in store order.
    SuffixMatch,
}

const fn prefix(p: &'static str) -> PathRewrite {
    PathRewrite::Prefix { prefix: Cow::Borrowed(p) }
}

const fn first_segment(segment: &'static str, replacement: &'static str) -> PathRewrite {
    PathRewrite::FirstSegment {
        segment: Cow::Borrowed(segment),
        replacement: Cow::Borrowed(replacement),
    }
}

/// Lookup order for references. Do not reorder.
pub const DEFAULT_HEURISTICS: &[PathRewrite] = &[
    PathRewrite::Exact,
    // layer prefixes
    prefix("core."),
    prefix("semantic."),
    prefix("component."),
    // nested category prefixes of the source schema
    prefix("core.colors.color."),
    prefix("core.spacing.spacing."),
    prefix("semantic.light."),
    prefix("semantic.dark."),
    // legacy category names exported with spaces
    prefix("core.Base Colors."),
    prefix("core.Neutral Colors."),
    // type buckets
    first_segment("color", "core.colors.color"),
    first_segment("color", "core.neutrals.color"),
    first_segment("spacing", "core.spacing.spacing"),
    first_segment("border", "core.border.border"),
    PathRewrite::SuffixMatch,
];

pub fn default_heuristics() -> Vec<PathRewrite> {
    DEFAULT_HEURISTICS.to_vec()
}

impl PathRewrite {
    /// The single candidate path this rewrite proposes for `reference`.
    /// `None` when the rewrite does not apply or is a scan.
    pub fn candidate(&self, reference: &str) -> Option<String> {
        match self {
            PathRewrite::Exact => Some(reference.to_string()),
            PathRewrite::Prefix { prefix } => Some(format!("{}{}", prefix, reference)),
            PathRewrite::FirstSegment { segment, replacement } => match path::split_first(reference) {
                (head, Some(rest)) if head == segment.as_ref() => Some(format!("{}.{}", replacement, rest)),
                _ => None,
            },
            PathRewrite::SuffixMatch => None,
        }
    }

    fn locate<'s>(&self, reference: &str, store: &'s TokenStore) -> Option<&'s Token> {
        match self {
            PathRewrite::SuffixMatch => {
                let suffix = format!(".{}", reference);
                store.iter().find(|t| t.path.ends_with(&suffix))
            }
            rewrite => rewrite.candidate(reference).and_then(|p| store.get(&p)),
        }
    }
}

/// A token together with the terminal value its reference chain ends at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedToken {
    pub token: Token,
    pub resolved_value: Value,
    pub is_reference: bool,
    /// Path actually matched for the direct reference, which may differ
    /// from the text inside the braces.
    pub reference_path: Option<String>,
    /// Every path visited, origin first.
    pub chain: Vec<String>,
}

pub struct ReferenceResolver<'a> {
    store: &'a TokenStore,
    heuristics: &'a [PathRewrite],
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(store: &'a TokenStore) -> Self {
        Self::with_heuristics(store, DEFAULT_HEURISTICS)
    }

    pub fn with_heuristics(store: &'a TokenStore, heuristics: &'a [PathRewrite]) -> Self {
        Self { store, heuristics }
    }

    /// Resolve the token stored at `path`.
    pub fn resolve(&self, path: &str) -> Result<ResolvedToken, ResolveError> {
        let path = path::normalize(path);
        let token = self
            .store
            .get(&path)
            .ok_or(ResolveError::NotFound { path: path.clone() })?;
        self.resolve_token(token)
    }

    /// Resolve a token that need not be in the store, such as a draft edit.
    /// The draft's own path seeds the cycle guard.
    pub fn resolve_token(&self, token: &Token) -> Result<ResolvedToken, ResolveError> {
        let mut visited: HashSet<&str> = HashSet::from([token.path.as_str()]);
        let mut chain = vec![token.path.clone()];
        let mut reference_path = None;
        let mut current = token;

        while let Some(reference) = current.reference_target() {
            let next = self.locate(&reference).ok_or_else(|| ResolveError::UnresolvedReference {
                from: current.path.clone(),
                reference: reference.clone(),
            })?;

            chain.push(next.path.clone());
            if !visited.insert(next.path.as_str()) {
                return Err(ResolveError::CircularReference { chain });
            }
            if reference_path.is_none() {
                reference_path = Some(next.path.clone());
            }
            current = next;
        }

        Ok(ResolvedToken {
            token: token.clone(),
            resolved_value: current.value.clone(),
            is_reference: reference_path.is_some(),
            reference_path,
            chain,
        })
    }

    /// Find the token a reference names, trying each heuristic in order.
    pub fn locate(&self, reference: &str) -> Option<&'a Token> {
        let reference = path::normalize(reference);
        self.heuristics.iter().find_map(|rewrite| {
            let found = rewrite.locate(&reference, self.store)?;
            if *rewrite != PathRewrite::Exact {
                debug!(reference = %reference, matched = %found.path, heuristic = ?rewrite, "Reference matched by heuristic");
            }
            Some(found)
        })
    }
}
