//! Token Workspace - Single Entry Point
//!
//! CRITICAL: every stage_* call that produces a token validates it first.
//! A change whose result has errors is never recorded.

use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::changelog::{ChangeLogError, ChangeLogStore};
use crate::changes::{Change, ChangeKind, PendingChanges};
use crate::config::EngineConfig;
use crate::impact::{analyze_deletion, DeletionImpact};
use crate::patch::{FilePatch, PatchError};
use crate::path;
use crate::remote::{CommitRef, DocumentStore, StoreError};
use crate::resolver::{ReferenceResolver, ResolveError, ResolvedToken};
use crate::store::{LoadReport, TokenStore};
use crate::tokens::Token;
use crate::validation::{ValidationReport, ValidationResult, Validator};

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Token not found: {0}")]
    TokenNotFound(String),

    #[error("Token already exists: {0}")]
    PathTaken(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Nothing to commit")]
    NothingToCommit,

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    ChangeLog(#[from] ChangeLogError),
}

pub struct TokenWorkspace {
    config: EngineConfig,
    validator: Validator,
    store: TokenStore,
    pending: PendingChanges,
}

impl TokenWorkspace {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            validator: Validator::from_config(&config),
            config,
            store: TokenStore::new(),
            pending: PendingChanges::new(),
        }
    }

    /// Replace the whole snapshot. Pending changes are kept.
    pub fn load_store(&mut self, store: TokenStore) -> &LoadReport {
        self.store = store;
        self.store.report()
    }

    /// Load every document under `prefix` from a document store.
    pub fn load_from(&mut self, remote: &dyn DocumentStore, prefix: &str) -> Result<&LoadReport, WorkspaceError> {
        let mut sources = Vec::new();
        for entry in remote.list_files(prefix)? {
            match remote.read_file(&entry.path)? {
                Some(content) => sources.push((entry.path, content)),
                None => warn!(file = %entry.path, "Listed document disappeared before read"),
            }
        }
        Ok(self.load_store(TokenStore::load_sources(sources)))
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolver(&self) -> ReferenceResolver<'_> {
        ReferenceResolver::with_heuristics(&self.store, &self.config.resolver.heuristics)
    }

    pub fn resolve(&self, path: &str) -> Result<ResolvedToken, ResolveError> {
        self.resolver().resolve(path)
    }

    pub fn validate_token(&self, token: &Token) -> ValidationResult {
        self.validator.validate(token, &self.store)
    }

    pub fn validate_all(&self) -> ValidationReport {
        self.validator.validate_all(&self.store)
    }

    pub fn analyze_deletion(&self, path: &str) -> DeletionImpact {
        analyze_deletion(&path::normalize(path), &self.store)
    }

    pub fn pending(&self) -> &PendingChanges {
        &self.pending
    }

    pub fn restore_pending(&mut self, log: &dyn ChangeLogStore) -> Result<(), WorkspaceError> {
        self.pending = log.load_log()?;
        Ok(())
    }

    pub fn save_pending(&self, log: &mut dyn ChangeLogStore) -> Result<(), WorkspaceError> {
        log.save_log(&self.pending)?;
        Ok(())
    }

    pub fn discard(&mut self, path: &str) -> Option<Change> {
        self.pending.discard(&path::normalize(path))
    }

    /// The token at `path` as it will be once pending changes apply.
    pub fn current_token(&self, path: &str) -> Option<Token> {
        match self.pending.get(path) {
            Some(change) if matches!(change.kind, ChangeKind::Delete | ChangeKind::Rename) => None,
            Some(change) => change.after.clone(),
            None => self
                .pending
                .iter()
                .find(|c| c.kind == ChangeKind::Rename && c.target_path() == path)
                .and_then(|c| c.after.clone())
                .or_else(|| self.store.get(path).cloned()),
        }
    }

    pub fn stage_create(&mut self, token: Token) -> Result<ValidationResult, WorkspaceError> {
        if self.current_token(&token.path).is_some() {
            return Err(WorkspaceError::PathTaken(token.path));
        }
        let result = self.require_valid(&token)?;
        self.pending.record(Change::create(token));
        Ok(result)
    }

    /// Update the token at `token.path`. An empty `source_file` inherits the
    /// existing one.
    pub fn stage_update(&mut self, mut token: Token) -> Result<ValidationResult, WorkspaceError> {
        let before = self
            .current_token(&token.path)
            .ok_or_else(|| WorkspaceError::TokenNotFound(token.path.clone()))?;
        if token.source_file.is_empty() {
            token.source_file = before.source_file.clone();
        }
        let result = self.require_valid(&token)?;
        self.pending.record(Change::update(before, token));
        Ok(result)
    }

    /// Deletion is never blocked; the impact is returned for the caller to show.
    pub fn stage_delete(&mut self, path: &str) -> Result<DeletionImpact, WorkspaceError> {
        let path = path::normalize(path);
        let before = self
            .current_token(&path)
            .ok_or_else(|| WorkspaceError::TokenNotFound(path.clone()))?;
        let impact = analyze_deletion(&path, &self.store);
        if impact.would_break_tokens {
            warn!(path = %path, dependents = impact.affected_count, "Deleting a referenced token");
        }
        self.pending.record(Change::delete(before));
        Ok(impact)
    }

    pub fn stage_rename(&mut self, path: &str, new_path: &str) -> Result<ValidationResult, WorkspaceError> {
        let path = path::normalize(path);
        let new_path = path::normalize(new_path);
        let before = self
            .current_token(&path)
            .ok_or_else(|| WorkspaceError::TokenNotFound(path.clone()))?;
        if self.current_token(&new_path).is_some() {
            return Err(WorkspaceError::PathTaken(new_path));
        }
        let mut renamed = before.clone();
        renamed.path = new_path.clone();
        let result = self.require_valid(&renamed)?;
        self.pending.record(Change::rename(before, &new_path));
        Ok(result)
    }

    fn require_valid(&self, token: &Token) -> Result<ValidationResult, WorkspaceError> {
        let result = self.validate_token(token);
        if !result.valid {
            let messages: Vec<_> = result
                .errors()
                .map(|i| format!("{}: {}", i.rule, i.message))
                .collect();
            return Err(WorkspaceError::ValidationFailed(messages.join("; ")));
        }
        Ok(result)
    }

    /// Build one patch per affected document against the store's current content.
    pub fn prepare_commit(&self, remote: &dyn DocumentStore) -> Result<Vec<FilePatch>, WorkspaceError> {
        let mut sources = BTreeMap::new();
        for file in self.pending.by_source_file().keys() {
            if let Some(content) = remote.read_file(file)? {
                sources.insert(file.to_string(), content);
            }
        }
        Ok(crate::patch::build_patches(&self.pending, &sources)?)
    }

    /// Write all pending changes as one batch. The pending log is cleared
    /// only once the write succeeds.
    pub fn commit(&mut self, remote: &mut dyn DocumentStore, message: &str) -> Result<CommitRef, WorkspaceError> {
        if self.pending.is_empty() {
            return Err(WorkspaceError::NothingToCommit);
        }
        let patches = self.prepare_commit(remote)?;
        let commit = remote.write_files(&patches, message)?;
        info!(commit = %commit.id, changes = self.pending.len(), "Committed pending token changes");
        self.pending.clear();
        Ok(commit)
    }
}

impl Default for TokenWorkspace {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
