//! Uniform read-only view over the tokenized YAML/JSON tree.
//!
//! Every node carries the JSON pointer it was reached by, so a wrong shape
//! turns into a diagnosable [`ParseError::NodeKind`] instead of a panic.

use std::borrow::Cow;
use std::fmt;

use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

use crate::any::AnyValue;
use crate::context::ParsingContext;
use crate::error::ParseError;

/// The key that turns a mapping into a reference placeholder.
pub const REFERENCE_KEY: &str = "$ref";

/// Shape of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Null,
    Scalar,
    Sequence,
    Mapping,
}

impl NodeKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => NodeKind::Null,
            Value::Bool(_) | Value::Number(_) | Value::String(_) => NodeKind::Scalar,
            Value::Sequence(_) => NodeKind::Sequence,
            Value::Mapping(_) => NodeKind::Mapping,
            Value::Tagged(tagged) => NodeKind::of(&tagged.value),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeKind::Null => "null",
            NodeKind::Scalar => "scalar",
            NodeKind::Sequence => "sequence",
            NodeKind::Mapping => "mapping",
        })
    }
}

/// Escape one pointer segment (`~` → `~0`, `/` → `~1`).
pub fn escape_segment(segment: &str) -> Cow<'_, str> {
    if segment.contains(['~', '/']) {
        Cow::Owned(segment.replace('~', "~0").replace('/', "~1"))
    } else {
        Cow::Borrowed(segment)
    }
}

/// Reverse of [`escape_segment`].
pub fn unescape_segment(segment: &str) -> Cow<'_, str> {
    if segment.contains('~') {
        Cow::Owned(segment.replace("~1", "/").replace("~0", "~"))
    } else {
        Cow::Borrowed(segment)
    }
}

/// Growable pointer used by traversals that do not hold parse nodes.
#[derive(Debug, Clone, Default)]
pub struct PointerBuf {
    segments: Vec<String>,
}

impl PointerBuf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, segment: &str) {
        self.segments.push(escape_segment(segment).into_owned());
    }

    pub fn pop(&mut self) {
        self.segments.pop();
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for PointerBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("#")?;
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

/// Render a mapping key as text; YAML allows numeric and boolean keys.
fn key_text(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Tagged(tagged) => key_text(&tagged.value),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn untag(value: &Value) -> &Value {
    match value {
        Value::Tagged(tagged) => untag(&tagged.value),
        other => other,
    }
}

/// One node of the tree plus its pointer.
#[derive(Debug, Clone)]
pub struct ParseNode<'a> {
    value: &'a Value,
    pointer: String,
}

impl<'a> ParseNode<'a> {
    /// The document root, at pointer `#`.
    pub fn root(value: &'a Value) -> Self {
        Self {
            value: untag(value),
            pointer: "#".to_string(),
        }
    }

    fn child(&self, segment: &str, value: &'a Value) -> ParseNode<'a> {
        ParseNode {
            value: untag(value),
            pointer: format!("{}/{}", self.pointer, escape_segment(segment)),
        }
    }

    pub fn value(&self) -> &'a Value {
        self.value
    }

    pub fn pointer(&self) -> &str {
        &self.pointer
    }

    pub fn kind(&self) -> NodeKind {
        NodeKind::of(self.value)
    }

    pub fn is_null(&self) -> bool {
        self.kind() == NodeKind::Null
    }

    fn mismatch(&self, expected: NodeKind) -> ParseError {
        ParseError::NodeKind {
            expected,
            actual: self.kind(),
            pointer: self.pointer.clone(),
        }
    }

    fn scalar_error(&self, text: String, target: &'static str) -> ParseError {
        ParseError::Scalar {
            text,
            target,
            pointer: self.pointer.clone(),
        }
    }

    pub fn as_mapping(&self) -> Result<MapNode<'a>, ParseError> {
        match self.value {
            Value::Mapping(mapping) => Ok(MapNode {
                node: self.clone(),
                mapping,
            }),
            _ => Err(self.mismatch(NodeKind::Mapping)),
        }
    }

    pub fn as_sequence(&self) -> Result<SeqNode<'a>, ParseError> {
        match self.value {
            Value::Sequence(items) => Ok(SeqNode {
                node: self.clone(),
                items,
            }),
            _ => Err(self.mismatch(NodeKind::Sequence)),
        }
    }

    /// Scalar text; numbers and booleans are rendered back to their text.
    pub fn as_scalar(&self) -> Result<String, ParseError> {
        match self.value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            _ => Err(self.mismatch(NodeKind::Scalar)),
        }
    }

    pub fn as_bool(&self) -> Result<bool, ParseError> {
        match self.value {
            Value::Bool(b) => Ok(*b),
            Value::String(s) => s
                .parse::<bool>()
                .map_err(|_| self.scalar_error(s.clone(), "boolean")),
            _ => Err(self.scalar_error(self.as_scalar()?, "boolean")),
        }
    }

    pub fn as_f64(&self) -> Result<f64, ParseError> {
        match self.value {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| self.scalar_error(n.to_string(), "number")),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| self.scalar_error(s.clone(), "number")),
            _ => Err(self.scalar_error(self.as_scalar()?, "number")),
        }
    }

    pub fn as_u64(&self) -> Result<u64, ParseError> {
        match self.value {
            Value::Number(n) => n
                .as_u64()
                .ok_or_else(|| self.scalar_error(n.to_string(), "non-negative integer")),
            Value::String(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| self.scalar_error(s.clone(), "non-negative integer")),
            _ => Err(self.scalar_error(self.as_scalar()?, "non-negative integer")),
        }
    }

    /// Untyped view of this node; never fails.
    pub fn as_any(&self) -> AnyValue {
        AnyValue::from_yaml(self.value)
    }

    /// The `$ref` text of a mapping node, without dispatching its fields.
    pub fn get_reference_pointer(&self) -> Option<String> {
        let Value::Mapping(mapping) = self.value else {
            return None;
        };
        match mapping.get(REFERENCE_KEY).map(untag) {
            Some(Value::String(pointer)) => Some(pointer.clone()),
            _ => None,
        }
    }

    /// Apply an object loader to every item of a sequence.
    ///
    /// Object loaders degrade internally, so only a non-sequence node fails.
    pub fn create_list<T>(
        &self,
        ctx: &mut ParsingContext,
        mut loader: impl FnMut(&ParseNode<'a>, &mut ParsingContext) -> T,
    ) -> Result<Vec<T>, ParseError> {
        let sequence = self.as_sequence()?;
        Ok(sequence.items().map(|item| loader(&item, ctx)).collect())
    }

    /// Apply a fallible loader to every item of a sequence.
    ///
    /// Every item is visited. The first failure is returned; later failures
    /// are recorded in the context so one pass reports all of them.
    pub fn create_simple_list<T>(
        &self,
        ctx: &mut ParsingContext,
        mut loader: impl FnMut(&ParseNode<'a>) -> Result<T, ParseError>,
    ) -> Result<Vec<T>, ParseError> {
        let sequence = self.as_sequence()?;
        let mut first_error = None;
        let mut values = Vec::with_capacity(sequence.len());
        for item in sequence.items() {
            match loader(&item) {
                Ok(value) => values.push(value),
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(e) => ctx.record(&e, item.pointer()),
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(values),
        }
    }

    /// Apply an object loader to every value of a mapping, keyed in document order.
    pub fn create_map<T>(
        &self,
        ctx: &mut ParsingContext,
        mut loader: impl FnMut(&ParseNode<'a>, &mut ParsingContext) -> T,
    ) -> Result<IndexMap<String, T>, ParseError> {
        let mapping = self.as_mapping()?;
        let mut values = IndexMap::with_capacity(mapping.len());
        for (key, child) in mapping.entries() {
            let value = loader(&child, ctx);
            values.insert(key, value);
        }
        Ok(values)
    }

    /// Fallible counterpart of [`create_map`](Self::create_map).
    pub fn create_simple_map<T>(
        &self,
        ctx: &mut ParsingContext,
        mut loader: impl FnMut(&ParseNode<'a>) -> Result<T, ParseError>,
    ) -> Result<IndexMap<String, T>, ParseError> {
        let mapping = self.as_mapping()?;
        let mut first_error = None;
        let mut values = IndexMap::with_capacity(mapping.len());
        for (key, child) in mapping.entries() {
            match loader(&child) {
                Ok(value) => {
                    values.insert(key, value);
                }
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(e) => ctx.record(&e, child.pointer()),
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(values),
        }
    }
}

/// A mapping node.
#[derive(Debug, Clone)]
pub struct MapNode<'a> {
    node: ParseNode<'a>,
    mapping: &'a Mapping,
}

impl<'a> MapNode<'a> {
    pub fn pointer(&self) -> &str {
        self.node.pointer()
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Entries in document order.
    pub fn entries(&self) -> impl Iterator<Item = (String, ParseNode<'a>)> + '_ {
        self.mapping.iter().map(|(key, value)| {
            let key = key_text(key);
            let child = self.node.child(&key, value);
            (key, child)
        })
    }

    pub fn get(&self, key: &str) -> Option<ParseNode<'a>> {
        self.mapping
            .iter()
            .find(|(k, _)| key_text(k) == key)
            .map(|(_, value)| self.node.child(key, value))
    }
}

/// A sequence node.
#[derive(Debug, Clone)]
pub struct SeqNode<'a> {
    node: ParseNode<'a>,
    items: &'a [Value],
}

impl<'a> SeqNode<'a> {
    pub fn pointer(&self) -> &str {
        self.node.pointer()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> impl Iterator<Item = ParseNode<'a>> + '_ {
        self.items
            .iter()
            .enumerate()
            .map(|(index, value)| self.node.child(&index.to_string(), value))
    }
}
