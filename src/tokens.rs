//! Token Model - Parsed Once, Typed Forever
//!
//! A document node is either a token leaf or a group of named children.
//! The shape is decided when the document is parsed; nothing downstream
//! probes JSON objects for value keys again.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::path;

/// Token type as authored. Tokens Studio spellings such as `boxShadow`
/// stay in `Other` so they are written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TokenType {
    Color,
    Dimension,
    Number,
    FontFamily,
    FontWeight,
    Duration,
    CubicBezier,
    Shadow,
    Border,
    Typography,
    Other(String),
}

impl TokenType {
    pub fn as_str(&self) -> &str {
        match self {
            TokenType::Color => "color",
            TokenType::Dimension => "dimension",
            TokenType::Number => "number",
            TokenType::FontFamily => "fontFamily",
            TokenType::FontWeight => "fontWeight",
            TokenType::Duration => "duration",
            TokenType::CubicBezier => "cubicBezier",
            TokenType::Shadow => "shadow",
            TokenType::Border => "border",
            TokenType::Typography => "typography",
            TokenType::Other(s) => s,
        }
    }
}

impl From<String> for TokenType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "color" => TokenType::Color,
            "dimension" => TokenType::Dimension,
            "number" => TokenType::Number,
            "fontFamily" => TokenType::FontFamily,
            "fontWeight" => TokenType::FontWeight,
            "duration" => TokenType::Duration,
            "cubicBezier" => TokenType::CubicBezier,
            "shadow" => TokenType::Shadow,
            "border" => TokenType::Border,
            "typography" => TokenType::Typography,
            _ => TokenType::Other(s),
        }
    }
}

impl From<&str> for TokenType {
    fn from(s: &str) -> Self {
        TokenType::from(s.to_string())
    }
}

impl From<TokenType> for String {
    fn from(t: TokenType) -> Self {
        match t {
            TokenType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A token as authored, addressed by its canonical path.
///
/// `value` is `Value::Null` when the author left it out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub path: String,
    #[serde(default)]
    pub value: Value,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<TokenType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub source_file: String,
}

impl Token {
    pub fn new(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path::normalize(&path.into()),
            value,
            token_type: None,
            description: None,
            source_file: String::new(),
        }
    }

    pub fn with_type(mut self, token_type: impl Into<TokenType>) -> Self {
        self.token_type = Some(token_type.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn in_file(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = source_file.into();
        self
    }

    pub fn is_reference(&self) -> bool {
        path::reference_target(&self.value).is_some()
    }

    pub fn reference_target(&self) -> Option<String> {
        path::reference_target(&self.value)
    }

    pub fn has_value(&self) -> bool {
        match &self.value {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        }
    }
}

/// Fields of a token leaf inside a document.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenDef {
    pub value: Value,
    pub token_type: Option<TokenType>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Token(TokenDef),
    Group(Vec<(String, Node)>),
}

/// A node skipped while parsing, with the path it was found at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeIssue {
    pub path: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NodeError {
    #[error("document root must be a JSON object, found {0}")]
    RootNotObject(&'static str),
}

/// Either spelling of a leaf field: plain (`value`) or DTCG (`$value`).
pub(crate) fn leaf_field<'a>(map: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    map.get(name).or_else(|| map.get(&format!("${}", name)))
}

pub(crate) fn is_leaf(map: &Map<String, Value>) -> bool {
    map.contains_key("value") || map.contains_key("$value")
}

impl Node {
    /// Parse a whole document. Malformed children are skipped and reported.
    pub fn parse_document(doc: &Value) -> Result<(Node, Vec<NodeIssue>), NodeError> {
        let map = doc.as_object().ok_or(NodeError::RootNotObject(json_kind(doc)))?;
        let mut issues = Vec::new();
        let children = parse_group(map, "", &mut issues);
        Ok((Node::Group(children), issues))
    }

    /// Depth-first `(path, leaf)` pairs in document order.
    pub fn flatten(&self) -> Vec<(String, &TokenDef)> {
        let mut out = Vec::new();
        self.collect("", &mut out);
        out
    }

    fn collect<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a TokenDef)>) {
        match self {
            Node::Token(def) => out.push((prefix.to_string(), def)),
            Node::Group(children) => {
                for (name, child) in children {
                    child.collect(&join(prefix, name), out);
                }
            }
        }
    }
}

fn parse_group(
    map: &Map<String, Value>,
    prefix: &str,
    issues: &mut Vec<NodeIssue>,
) -> Vec<(String, Node)> {
    let mut children = Vec::new();
    for (key, value) in map {
        if key.starts_with('$') {
            continue;
        }
        let here = join(prefix, key);
        match value {
            Value::Object(child) if is_leaf(child) => match parse_leaf(child) {
                Ok(def) => children.push((key.clone(), Node::Token(def))),
                Err(message) => issues.push(NodeIssue { path: here, message }),
            },
            Value::Object(child) => {
                children.push((key.clone(), Node::Group(parse_group(child, &here, issues))));
            }
            other => issues.push(NodeIssue {
                path: here,
                message: format!("expected a token or group object, found {}", json_kind(other)),
            }),
        }
    }
    children
}

fn parse_leaf(map: &Map<String, Value>) -> Result<TokenDef, String> {
    let value = leaf_field(map, "value").cloned().unwrap_or(Value::Null);
    let token_type = match leaf_field(map, "type") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(TokenType::from(s.as_str())),
        Some(other) => return Err(format!("token type must be a string, found {}", json_kind(other))),
    };
    let description = match leaf_field(map, "description") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            return Err(format!("token description must be a string, found {}", json_kind(other)))
        }
    };
    Ok(TokenDef { value, token_type, description })
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

pub(crate) fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
