//! Validation System - Rule/Policy Separation
//!
//! Rules produce structured issues.
//! Severity decides what blocks: a result is valid iff it has no errors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{EngineConfig, RulesConfig};
use crate::layers::{allows_literals, can_reference, Layer};
use crate::path;
use crate::resolver::{PathRewrite, ReferenceResolver, ResolveError, DEFAULT_HEURISTICS};
use crate::store::TokenStore;
use crate::tokens::Token;

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static VALIDATION_CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_validation_call_count() -> u32 {
    VALIDATION_CALL_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_validation_call_count() {
    VALIDATION_CALL_COUNT.store(0, Ordering::SeqCst);
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub rule: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    fn new(severity: Severity, rule: &str, message: impl Into<String>) -> Self {
        Self {
            severity,
            rule: rule.to_string(),
            message: message.into(),
            suggestion: None,
        }
    }

    fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationResult {
    pub path: String,
    pub layer: Layer,
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn from_issues(path: &str, layer: Layer, issues: Vec<ValidationIssue>) -> Self {
        Self {
            path: path.to_string(),
            layer,
            valid: !issues.iter().any(|i| i.severity == Severity::Error),
            issues,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.valid
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn has_rule(&self, rule: &str) -> bool {
        self.issues.iter().any(|i| i.rule == rule)
    }
}

/// Per-token results of validating a whole snapshot, keyed by path.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ValidationReport {
    pub results: BTreeMap<String, ValidationResult>,
}

impl ValidationReport {
    pub fn all_valid(&self) -> bool {
        self.results.values().all(|r| r.valid)
    }

    /// Every error-severity issue, paired with the token path it belongs to.
    pub fn errors(&self) -> Vec<(&str, &ValidationIssue)> {
        self.results
            .iter()
            .flat_map(|(path, r)| r.errors().map(move |i| (path.as_str(), i)))
            .collect()
    }

    pub fn error_count(&self) -> usize {
        self.results.values().map(|r| r.errors().count()).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.results.values().map(|r| r.warnings().count()).sum()
    }

    pub fn get(&self, path: &str) -> Option<&ValidationResult> {
        self.results.get(path)
    }
}

/// Everything a rule may look at. Rules never mutate the store.
pub struct RuleContext<'a> {
    pub token: &'a Token,
    pub layer: Layer,
    pub store: &'a TokenStore,
    pub resolver: &'a ReferenceResolver<'a>,
    pub config: &'a RulesConfig,
}

/// Validation rule trait - produces issues
pub trait ValidationRule {
    fn name(&self) -> &'static str;
    fn validate(&self, ctx: &RuleContext<'_>) -> Vec<ValidationIssue>;
}

// --- Concrete Rules ---

pub struct DtcgSchemaRule;

impl ValidationRule for DtcgSchemaRule {
    fn name(&self) -> &'static str { "dtcg-schema" }

    fn validate(&self, ctx: &RuleContext<'_>) -> Vec<ValidationIssue> {
        let mut issues = vec![];

        if !ctx.token.has_value() {
            issues.push(
                ValidationIssue::new(Severity::Error, self.name(), format!("Token {} has no value", ctx.token.path))
                    .suggest("Provide a literal value or a {reference}"),
            );
        }

        if ctx.config.missing_type.enabled && ctx.token.token_type.is_none() {
            issues.push(
                ValidationIssue::new(Severity::Warning, self.name(), format!("Token {} has no type", ctx.token.path))
                    .suggest("Set a type such as color, dimension or typography"),
            );
        }

        issues
    }
}

pub struct ReferenceRule;

impl ValidationRule for ReferenceRule {
    fn name(&self) -> &'static str { "reference" }

    fn validate(&self, ctx: &RuleContext<'_>) -> Vec<ValidationIssue> {
        let Some(target) = ctx.token.reference_target() else {
            return vec![];
        };

        if target == ctx.token.path {
            return vec![ValidationIssue::new(
                Severity::Error,
                "circular-reference",
                format!("Token {} references itself", ctx.token.path),
            )
            .suggest("Point the reference at a different token")];
        }

        let resolved = match ctx.resolver.resolve_token(ctx.token) {
            Ok(resolved) => resolved,
            Err(e @ ResolveError::CircularReference { .. }) => {
                return vec![ValidationIssue::new(Severity::Error, "circular-reference", e.to_string())
                    .suggest("Break the cycle by making one token in the chain a literal")];
            }
            Err(e) => {
                return vec![ValidationIssue::new(Severity::Error, "invalid-reference", e.to_string())
                    .suggest(missing_reference_hint(&target, ctx.layer))];
            }
        };

        let target_layer = resolved
            .reference_path
            .as_deref()
            .and_then(|p| ctx.store.get(p))
            .map(Layer::of_token);

        match target_layer {
            Some(target_layer) if !can_reference(ctx.layer, target_layer) => {
                vec![ValidationIssue::new(
                    Severity::Error,
                    "layer-violation",
                    format!(
                        "{} token {} may not reference {} token {}",
                        ctx.layer,
                        ctx.token.path,
                        target_layer,
                        resolved.reference_path.as_deref().unwrap_or(&target)
                    ),
                )
                .suggest(allowed_targets_hint(ctx.layer))]
            }
            _ => vec![],
        }
    }
}

pub struct LiteralValueRule;

impl ValidationRule for LiteralValueRule {
    fn name(&self) -> &'static str { "literal-value" }

    fn validate(&self, ctx: &RuleContext<'_>) -> Vec<ValidationIssue> {
        if !ctx.config.literal_value.enabled
            || !ctx.token.has_value()
            || ctx.token.is_reference()
            || allows_literals(ctx.layer)
        {
            return vec![];
        }

        vec![ValidationIssue::new(
            Severity::Warning,
            self.name(),
            format!("{} token {} uses a literal value", ctx.layer, ctx.token.path),
        )
        .suggest(allowed_targets_hint(ctx.layer))]
    }
}

pub struct NamingConventionRule;

impl ValidationRule for NamingConventionRule {
    fn name(&self) -> &'static str { "naming-convention" }

    fn validate(&self, ctx: &RuleContext<'_>) -> Vec<ValidationIssue> {
        if !ctx.config.naming_convention.enabled || path::is_canonical(&ctx.token.path) {
            return vec![];
        }

        vec![ValidationIssue::new(
            Severity::Warning,
            self.name(),
            format!("Path {} is not dot-separated [A-Za-z][A-Za-z0-9_-]* segments", ctx.token.path),
        )
        .suggest("Start each segment with a letter and avoid spaces or other punctuation")]
    }
}

fn allowed_targets_hint(layer: Layer) -> String {
    let allowed = layer.policy().may_reference;
    if allowed.is_empty() {
        format!("{} tokens hold literal values and may not reference other tokens", layer)
    } else {
        let names: Vec<String> = allowed.iter().map(|l| l.to_string()).collect();
        format!("{} tokens should reference {} tokens", layer, names.join(" or "))
    }
}

fn missing_reference_hint(target: &str, layer: Layer) -> String {
    match layer.policy().may_reference.first() {
        Some(first) => format!("Check the path {} exists, e.g. under {}.", target, first),
        None => format!("Check the path {} exists", target),
    }
}

/// Validator orchestrates rules
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
    config: RulesConfig,
    heuristics: Vec<PathRewrite>,
}

impl Validator {
    pub fn new() -> Self {
        Self::from_parts(RulesConfig::default(), DEFAULT_HEURISTICS.to_vec())
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::from_parts(config.rules.clone(), config.resolver.heuristics.clone())
    }

    fn from_parts(config: RulesConfig, heuristics: Vec<PathRewrite>) -> Self {
        Self {
            rules: vec![
                Box::new(DtcgSchemaRule),
                Box::new(ReferenceRule),
                Box::new(LiteralValueRule),
                Box::new(NamingConventionRule),
            ],
            config,
            heuristics,
        }
    }

    /// Validate one token against the current store. Pure: the store is
    /// only read.
    pub fn validate(&self, token: &Token, store: &TokenStore) -> ValidationResult {
        #[cfg(feature = "test-hooks")]
        VALIDATION_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

        let resolver = ReferenceResolver::with_heuristics(store, &self.heuristics);
        let ctx = RuleContext {
            token,
            layer: Layer::of_token(token),
            store,
            resolver: &resolver,
            config: &self.config,
        };

        let mut issues = vec![];
        for rule in &self.rules {
            issues.extend(rule.validate(&ctx));
        }

        ValidationResult::from_issues(&token.path, ctx.layer, issues)
    }

    pub fn validate_all(&self, store: &TokenStore) -> ValidationReport {
        ValidationReport {
            results: store
                .iter()
                .map(|t| (t.path.clone(), self.validate(t, store)))
                .collect(),
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    const CORE: &str = "tokens/core/base.json";
    const SEMANTIC: &str = "tokens/semantic/light.json";
    const COMPONENT: &str = "tokens/component/button.json";

    fn tok(path: &str, value: Value, file: &str) -> Token {
        Token::new(path, value).with_type("color").in_file(file)
    }

    fn fixture() -> TokenStore {
        vec![
            tok("core.red", json!("#f00"), CORE),
            tok("semantic.danger", json!("{core.red}"), SEMANTIC),
            tok("component.alert.bg", json!("{semantic.danger}"), COMPONENT),
        ]
        .into_iter()
        .collect()
    }

    fn rules(result: &ValidationResult) -> Vec<&str> {
        result.issues.iter().map(|i| i.rule.as_str()).collect()
    }

    #[test]
    fn test_clean_fixture_is_valid() {
        let store = fixture();
        let report = Validator::new().validate_all(&store);
        assert!(report.all_valid(), "{:?}", report.errors());
        assert_eq!(report.warning_count(), 0);
    }

    #[test]
    fn test_missing_value_is_error_missing_type_is_warning() {
        let store = fixture();
        let token = Token::new("core.blank", Value::Null).in_file(CORE);
        let result = Validator::new().validate(&token, &store);
        assert!(!result.valid);
        assert_eq!(result.errors().count(), 1);
        assert_eq!(result.warnings().count(), 1);
        assert!(result.issues.iter().all(|i| i.rule == "dtcg-schema"));
    }

    #[test]
    fn test_core_referencing_semantic_is_layer_violation() {
        let store = fixture();
        let token = tok("core.alias", json!("{semantic.danger}"), CORE);
        let result = Validator::new().validate(&token, &store);
        assert!(!result.valid);
        assert_eq!(rules(&result), vec!["layer-violation"]);
        assert!(result.issues[0].message.contains("core"));
        assert!(result.issues[0].message.contains("semantic"));
    }

    #[test]
    fn test_semantic_literal_is_warning_only() {
        let store = fixture();
        let token = tok("semantic.info", json!("#00f"), SEMANTIC);
        let result = Validator::new().validate(&token, &store);
        assert!(result.valid);
        assert_eq!(rules(&result), vec!["literal-value"]);
        assert_eq!(result.issues[0].severity, Severity::Warning);
    }

    #[test]
    fn test_self_reference() {
        let store = fixture();
        let token = tok("semantic.loop", json!("{semantic.loop}"), SEMANTIC);
        let result = Validator::new().validate(&token, &store);
        assert_eq!(rules(&result), vec!["circular-reference"]);
    }

    #[test]
    fn test_unresolved_reference_has_suggestion() {
        let store = fixture();
        let token = tok("semantic.ghost", json!("{core.nope}"), SEMANTIC);
        let result = Validator::new().validate(&token, &store);
        assert_eq!(rules(&result), vec!["invalid-reference"]);
        assert!(result.issues[0].suggestion.is_some());
    }

    #[test]
    fn test_naming_convention_warns() {
        let store = fixture();
        let token = tok("core.Base Colors.red", json!("#f00"), CORE);
        let result = Validator::new().validate(&token, &store);
        assert!(result.valid);
        assert_eq!(rules(&result), vec!["naming-convention"]);
    }

    #[test]
    fn test_disabled_rules_are_silent() {
        let store = fixture();
        let config = EngineConfig::from_json_str(
            r#"{ "rules": { "literalValue": { "enabled": false }, "missingType": { "enabled": false } } }"#,
        )
        .unwrap();
        let token = Token::new("semantic.info", json!("#00f")).in_file(SEMANTIC);
        let result = Validator::from_config(&config).validate(&token, &store);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_indirect_cycle_does_not_affect_other_tokens() {
        let mut store = fixture();
        store.insert(tok("component.a", json!("{component.b}"), COMPONENT));
        store.insert(tok("component.b", json!("{component.a}"), COMPONENT));
        let report = Validator::new().validate_all(&store);
        assert!(report.get("component.a").unwrap().has_rule("circular-reference"));
        assert!(report.get("component.b").unwrap().has_rule("circular-reference"));
        assert!(report.get("component.alert.bg").unwrap().valid);
        assert_eq!(report.error_count(), 2);
    }
}
