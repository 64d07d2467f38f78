//! Contract Invariant Tests
//!
//! These tests verify the non-negotiable guarantees end to end.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Value};
use tokenguard_core::{
    analyze_deletion, build_patches,
    changelog::MemoryChangeLog,
    Change, ChangeKind, DocumentStore, Layer, LocalDirStore, PendingChanges, ReferenceResolver,
    ResolveError, Severity, StoreError, Token, TokenStore, TokenWorkspace, Validator, WorkspaceError,
};

const CORE: &str = "tokens/core/colors.json";
const SEMANTIC: &str = "tokens/semantic/light.json";
const COMPONENT: &str = "tokens/component/button.json";

fn create_test_store() -> TokenStore {
    TokenStore::load([
        (
            CORE,
            json!({
                "core": {
                    "colors": { "color": { "brand": {
                        "brand-300": { "value": "#f96302", "type": "color" }
                    }}},
                    "spacing": { "spacing": { "md": { "value": "16px", "type": "dimension" } } }
                }
            }),
        ),
        (
            SEMANTIC,
            json!({
                "semantic": {
                    "color": { "x": { "value": "{core.colors.color.brand.brand-300}", "type": "color" } },
                    "action": { "value": "{color.brand.brand-300}", "type": "color" }
                }
            }),
        ),
        (
            COMPONENT,
            json!({
                "component": { "button": {
                    "bg": { "value": "{semantic.action}", "type": "color" },
                    "padding": { "value": "{spacing.md}", "type": "dimension" }
                }}
            }),
        ),
    ])
}

fn token(path: &str, value: Value, file: &str) -> Token {
    Token::new(path, value).with_type("color").in_file(file)
}

fn layer_violations(result: &tokenguard_core::ValidationResult) -> usize {
    result.issues.iter().filter(|i| i.rule == "layer-violation").count()
}

#[test]
fn invariant_terminal_resolution_is_identity() {
    let store = create_test_store();
    let resolver = ReferenceResolver::new(&store);
    let r = resolver.resolve("core.colors.color.brand.brand-300").unwrap();
    assert!(!r.is_reference);
    assert_eq!(r.resolved_value, r.token.value);
    assert_eq!(r.token, *store.get("core.colors.color.brand.brand-300").unwrap());
}

#[test]
fn invariant_resolution_is_repeatable() {
    let store = create_test_store();
    let resolver = ReferenceResolver::new(&store);
    let first = resolver.resolve("component.button.bg").unwrap();
    let second = resolver.resolve("component.button.bg").unwrap();
    assert_eq!(first, second);
    assert_eq!(first.resolved_value, json!("#f96302"));
}

#[test]
fn invariant_cycles_fail_cleanly() {
    let store = TokenStore::load([(
        CORE,
        json!({
            "a": { "b": { "value": "{a.b}" } },
            "p": { "value": "{q}" },
            "q": { "value": "{r}" },
            "r": { "value": "{p}" }
        }),
    )]);
    let resolver = ReferenceResolver::new(&store);
    for path in ["a.b", "p", "q", "r"] {
        assert!(
            matches!(resolver.resolve(path), Err(ResolveError::CircularReference { .. })),
            "expected cycle for {}",
            path
        );
    }
}

#[test]
fn invariant_heuristic_first_segment_rewrite() {
    let store = create_test_store();
    let r = ReferenceResolver::new(&store)
        .resolve_token(&token("semantic.probe", json!("{color.brand.brand-300}"), SEMANTIC))
        .unwrap();
    assert_eq!(r.resolved_value, json!("#f96302"));
    assert_eq!(r.reference_path.as_deref(), Some("core.colors.color.brand.brand-300"));
}

#[test]
fn invariant_layer_policy_enforced_for_every_pair() {
    let files = [(Layer::Core, CORE), (Layer::Semantic, SEMANTIC), (Layer::Component, COMPONENT)];
    let validator = Validator::new();

    for (source_layer, source_file) in files {
        for (target_layer, target_file) in files {
            let mut store = TokenStore::new();
            store.insert(token("target.value", json!("#abc"), target_file));
            let probe = token("probe.alias", json!("{target.value}"), source_file);

            let result = validator.validate(&probe, &store);
            let expected = if tokenguard_core::can_reference(source_layer, target_layer) { 0 } else { 1 };
            assert_eq!(
                layer_violations(&result),
                expected,
                "{} -> {}: {:?}",
                source_layer,
                target_layer,
                result.issues
            );
        }
    }
}

#[test]
fn invariant_core_may_not_reference_semantic() {
    let store = create_test_store();
    let probe = token("core.alias", json!("{semantic.color.x}"), CORE);
    let result = Validator::new().validate(&probe, &store);
    assert!(!result.valid);
    assert_eq!(layer_violations(&result), 1);
}

#[test]
fn invariant_literal_permission() {
    let store = create_test_store();
    let validator = Validator::new();

    for file in [SEMANTIC, COMPONENT] {
        let result = validator.validate(&token("x.literal", json!("#123"), file), &store);
        let literal: Vec<_> = result.issues.iter().filter(|i| i.rule == "literal-value").collect();
        assert_eq!(literal.len(), 1);
        assert_eq!(literal[0].severity, Severity::Warning);
        assert!(result.valid);
    }

    let core = validator.validate(&token("core.literal", json!("#123"), CORE), &store);
    assert!(!core.has_rule("literal-value"));
}

#[test]
fn invariant_store_fixture_is_valid() {
    let store = create_test_store();
    let report = Validator::new().validate_all(&store);
    assert!(report.all_valid(), "{:?}", report.errors());
}

#[test]
fn invariant_deletion_impact_is_one_hop() {
    let store = TokenStore::load([(
        CORE,
        json!({
            "t": { "value": "#fff" },
            "x": { "value": "{t}" },
            "y": { "value": "{t}" },
            "z": { "value": "{x}" }
        }),
    )]);
    let impact = analyze_deletion("t", &store);
    let dependents: BTreeSet<_> = impact.direct_dependents.iter().map(String::as_str).collect();
    assert_eq!(dependents, BTreeSet::from(["x", "y"]));
    assert_eq!(impact.affected_count, 2);
    assert!(impact.would_break_tokens);
}

#[test]
fn invariant_change_merge_semantics() {
    let v0 = token("core.p", json!("#000"), CORE);
    let v1 = token("core.p", json!("#111"), CORE);
    let v2 = token("core.p", json!("#222"), CORE);

    let mut pending = PendingChanges::new();
    pending.record(Change::update(v0.clone(), v1.clone()));
    pending.record(Change::update(v1, v2.clone()));
    assert_eq!(pending.len(), 1);
    let change = pending.get("core.p").unwrap();
    assert_eq!(change.after.as_ref(), Some(&v2));
    assert_eq!(change.before.as_ref(), Some(&v0));

    let mut pending = PendingChanges::new();
    pending.record(Change::create(v0.clone()));
    pending.record(Change::delete(v0));
    assert!(pending.get("core.p").is_none());
}

#[test]
fn invariant_patch_round_trip() {
    let original = json!({
        "core": {
            "red": { "value": "#f00", "type": "color" },
            "old": { "value": "#999", "type": "color" },
            "gone": { "group": { "value": "1px", "type": "dimension" } }
        }
    });
    let source = serde_json::to_string_pretty(&original).unwrap();

    let mut pending = PendingChanges::new();
    pending.record(Change::update(
        token("core.red", json!("#f00"), CORE),
        token("core.red", json!("#e00"), CORE).with_description("alert"),
    ));
    pending.record(Change::create(token("core.blue.500", json!("#00f"), CORE)));
    pending.record(Change::rename(token("core.old", json!("#999"), CORE), "core.legacy"));
    pending.record(Change::delete(Token::new("core.gone.group", json!("1px")).in_file(CORE)));

    let sources = BTreeMap::from([(CORE.to_string(), source)]);
    let patches = build_patches(&pending, &sources).unwrap();
    assert_eq!(patches.len(), 1);

    let reloaded = TokenStore::load_sources([(CORE, patches[0].content.as_str())]);
    let paths: BTreeSet<_> = reloaded.iter().map(|t| t.path.as_str()).collect();
    assert_eq!(paths, BTreeSet::from(["core.red", "core.blue.500", "core.legacy"]));

    for change in pending.iter().filter(|c| c.kind != ChangeKind::Delete) {
        let after = change.after.as_ref().unwrap();
        let got = reloaded.get(change.target_path()).unwrap();
        assert_eq!(got.value, after.value);
        assert_eq!(got.token_type, after.token_type);
        assert_eq!(got.description, after.description);
    }

    let doc: Value = serde_json::from_str(&patches[0].content).unwrap();
    assert!(doc["core"].get("gone").is_none(), "empty group must be pruned");
    assert!(doc["core"].get("old").is_none());
}

#[test]
fn invariant_patch_keeps_authored_types() {
    let source = json!({
        "shadow": { "card": { "value": { "x": 0, "y": 2, "blur": 4, "color": "#0003" }, "type": "boxShadow" } },
        "font": {
            "body": { "value": "Inter", "type": "fontFamilies" },
            "bold": { "value": 700, "type": "fontWeights" }
        }
    });
    let store = TokenStore::load([(CORE, source.clone())]);
    let card = store.get("shadow.card").unwrap().clone();
    let body = store.get("font.body").unwrap().clone();

    let mut pending = PendingChanges::new();
    let mut raised = card.clone();
    raised.value = json!({ "x": 0, "y": 4, "blur": 8, "color": "#0003" });
    pending.record(Change::update(card, raised));
    pending.record(Change::update(body.clone(), body.with_description("Body copy")));

    let sources = BTreeMap::from([(CORE.to_string(), serde_json::to_string_pretty(&source).unwrap())]);
    let patches = build_patches(&pending, &sources).unwrap();
    let doc: Value = serde_json::from_str(&patches[0].content).unwrap();

    assert_eq!(doc["shadow"]["card"]["type"], json!("boxShadow"));
    assert_eq!(doc["font"]["body"]["type"], json!("fontFamilies"));
    assert_eq!(doc["font"]["body"]["description"], json!("Body copy"));
    assert_eq!(doc["font"]["bold"], source["font"]["bold"]);
}

#[test]
fn invariant_empty_group_pruning() {
    let source = r#"{ "a": { "b": { "c": { "d": { "value": 1 } } } } }"#;
    let mut pending = PendingChanges::new();
    pending.record(Change::delete(Token::new("a.b.c.d", json!(1)).in_file("x.json")));
    let sources = BTreeMap::from([("x.json".to_string(), source.to_string())]);
    let patches = build_patches(&pending, &sources).unwrap();
    let doc: Value = serde_json::from_str(&patches[0].content).unwrap();
    assert_eq!(doc, json!({}));
}

#[test]
fn invariant_commit_through_local_store() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("tokens/core")).unwrap();
    std::fs::write(
        dir.path().join(CORE),
        r##"{ "core": { "red": { "value": "#f00", "type": "color" } } }"##,
    )
    .unwrap();

    let mut remote = LocalDirStore::new(dir.path());
    let mut ws = TokenWorkspace::default();
    ws.load_from(&remote, "tokens").unwrap();
    assert_eq!(ws.store().len(), 1);

    ws.stage_update(token("core.red", json!("#c00"), CORE)).unwrap();
    ws.stage_create(token("core.green", json!("#0c0"), CORE)).unwrap();

    let mut log = MemoryChangeLog::new();
    ws.save_pending(&mut log).unwrap();
    let prepared_early = ws.prepare_commit(&remote).unwrap();

    let commit = ws.commit(&mut remote, "Adjust core colors").unwrap();
    assert_eq!(commit.files, vec![CORE.to_string()]);
    assert!(ws.pending().is_empty());

    ws.load_from(&remote, "tokens").unwrap();
    assert_eq!(ws.resolve("core.red").unwrap().resolved_value, json!("#c00"));
    assert_eq!(ws.resolve("core/green").unwrap().resolved_value, json!("#0c0"));

    // a batch built before the commit no longer matches the document
    assert!(matches!(
        remote.write_files(&prepared_early, "again"),
        Err(StoreError::StaleDocument { .. })
    ));

    ws.restore_pending(&log).unwrap();
    assert_eq!(ws.pending().len(), 2);
}

#[test]
fn invariant_staging_rejects_errors() {
    let mut ws = TokenWorkspace::default();
    ws.load_store(create_test_store());
    let err = ws
        .stage_create(token("semantic.broken", json!("{does.not.exist}"), SEMANTIC))
        .unwrap_err();
    assert!(matches!(err, WorkspaceError::ValidationFailed(ref m) if m.contains("invalid-reference")));
    assert!(ws.pending().is_empty());
}

#[cfg(feature = "test-hooks")]
#[test]
fn invariant_staging_calls_validate() {
    use tokenguard_core::validation::{get_validation_call_count, reset_validation_call_count};

    reset_validation_call_count();
    let mut ws = TokenWorkspace::default();
    ws.load_store(create_test_store());
    ws.stage_create(token("core.new", json!("#010"), CORE)).unwrap();
    assert!(get_validation_call_count() >= 1);
}
