//! TokenGuard Core - Design Token Governance Engine
//!
//! # The Rules (Non-Negotiable)
//! 1. The Layer Policy Is Defined Once
//! 2. Resolution Always Terminates
//! 3. Heuristics Are Tried In A Fixed Order
//! 4. Policy Findings Are Data, Not Errors
//! 5. Staged Changes Are Validated First
//! 6. Each Document Is Rewritten Once Per Batch

pub mod path;
pub mod tokens;
pub mod store;
pub mod resolver;
pub mod layers;
pub mod config;
pub mod validation;
pub mod changes;
pub mod changelog;
pub mod patch;
pub mod impact;
pub mod hashing;
pub mod remote;
pub mod workspace;

pub use tokens::{Node, Token, TokenDef, TokenType};
pub use store::{LoadReport, TokenStore};
pub use resolver::{PathRewrite, ReferenceResolver, ResolveError, ResolvedToken, DEFAULT_HEURISTICS};
pub use layers::{allows_literals, can_reference, classify_file, classify_token_path, Layer, LAYER_POLICY};
pub use config::EngineConfig;
pub use validation::{Severity, ValidationIssue, ValidationReport, ValidationResult, Validator};
pub use changes::{Change, ChangeKind, PendingChanges};
pub use changelog::{ChangeLogStore, JsonFileChangeLog, MemoryChangeLog};
pub use patch::{apply_changes, build_patches, FilePatch, PatchError};
pub use impact::{analyze_deletion, DeletionImpact};
pub use hashing::{canonical_json, document_hash};
pub use remote::{CommitRef, DocumentStore, LocalDirStore, StoreError};
pub use workspace::{TokenWorkspace, WorkspaceError};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
