//! Layer Classifier & Policy
//!
//! Every token belongs to exactly one architectural layer. The policy table
//! below is the only place reference directions and literal permissions are
//! defined; everything else asks it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::path;
use crate::tokens::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Raw primitives
    Core,
    /// Intent mapped onto primitives
    Semantic,
    /// Element-specific styling
    Component,
}

impl Default for Layer {
    fn default() -> Self {
        Self::Semantic
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Layer::Core => "core",
            Layer::Semantic => "semantic",
            Layer::Component => "component",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerRule {
    pub layer: Layer,
    pub may_reference: &'static [Layer],
    pub literals_allowed: bool,
}

/// Allowed reference directions and literal permissions, indexed by layer.
pub const LAYER_POLICY: [LayerRule; 3] = [
    LayerRule { layer: Layer::Core, may_reference: &[], literals_allowed: true },
    LayerRule { layer: Layer::Semantic, may_reference: &[Layer::Core], literals_allowed: false },
    LayerRule {
        layer: Layer::Component,
        may_reference: &[Layer::Semantic, Layer::Core],
        literals_allowed: false,
    },
];

/// Directory markers, checked in order against the directories holding the file.
const FILE_MARKERS: &[(&str, Layer)] = &[
    ("/core/", Layer::Core),
    ("/primitives/", Layer::Core),
    ("/semantic/", Layer::Semantic),
    ("/component/", Layer::Component),
];

/// Token-set names used by older exports that never had layer directories.
/// These may name the set itself, so they also see the file stem.
const LEGACY_MARKERS: &[(&str, Layer)] = &[
    ("/components/", Layer::Component),
    ("/global/", Layer::Core),
    ("/base/", Layer::Core),
    ("/color/default/", Layer::Semantic),
    ("/color/light/", Layer::Semantic),
    ("/color/dark/", Layer::Semantic),
];

impl Layer {
    pub fn policy(self) -> &'static LayerRule {
        &LAYER_POLICY[self as usize]
    }

    /// Layer of a token: from its source file when known, else from its path.
    pub fn of_token(token: &Token) -> Layer {
        if token.source_file.trim().is_empty() {
            classify_token_path(&token.path)
        } else {
            classify_file(&token.source_file)
        }
    }
}

/// Classify by the directories containing the source file. Defaults to semantic.
pub fn classify_file(source_file: &str) -> Layer {
    let lowered = source_file.trim().to_lowercase();
    let mut segments: Vec<&str> = lowered.split(['/', '\\']).filter(|s| !s.is_empty()).collect();
    let Some(file_name) = segments.pop() else {
        return Layer::default();
    };
    let stem = file_name.strip_suffix(".json").unwrap_or(file_name);

    if let Some(layer) = match_marker(FILE_MARKERS, &segments) {
        return layer;
    }
    segments.push(stem);
    match_marker(LEGACY_MARKERS, &segments).unwrap_or_default()
}

fn match_marker(markers: &[(&str, Layer)], segments: &[&str]) -> Option<Layer> {
    let haystack = format!("/{}/", segments.join("/"));
    markers
        .iter()
        .find(|(marker, _)| haystack.contains(marker))
        .map(|(_, layer)| *layer)
}

/// Classify by token path prefix when no file is available. Defaults to core.
pub fn classify_token_path(token_path: &str) -> Layer {
    match path::split_first(&path::normalize(token_path)).0 {
        "system" | "semantic" => Layer::Semantic,
        "component" | "components" => Layer::Component,
        _ => Layer::Core,
    }
}

pub fn can_reference(source: Layer, target: Layer) -> bool {
    source.policy().may_reference.contains(&target)
}

pub fn allows_literals(layer: Layer) -> bool {
    layer.policy().literals_allowed
}
