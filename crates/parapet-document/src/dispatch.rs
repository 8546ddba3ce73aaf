//! Declarative field dispatch.
//!
//! A [`FieldTable`] maps mapping keys to plain `fn` handlers. [`parse_map`]
//! walks a mapping in document order: exact keys first, then patterns in
//! declaration order; keys matching neither are ignored so newer AsyncAPI drafts
//! still load.

use tracing::trace;

use crate::context::ParsingContext;
use crate::error::ParseError;
use crate::model::{Extensible, Referenceable};
use crate::reference::{parse_reference, Slot};
use crate::tree::{MapNode, ParseNode, REFERENCE_KEY};

/// Handler for an exact key.
pub type FixedHandler<T> =
    fn(&mut T, &ParseNode<'_>, &mut ParsingContext) -> Result<(), ParseError>;

/// Handler for a key matched by predicate; receives the key itself.
pub type PatternHandler<T> =
    fn(&mut T, &str, &ParseNode<'_>, &mut ParsingContext) -> Result<(), ParseError>;

pub type KeyPredicate = fn(&str) -> bool;

/// Per-object dispatch table.
pub struct FieldTable<T> {
    fixed: Vec<(&'static str, FixedHandler<T>)>,
    patterns: Vec<(KeyPredicate, PatternHandler<T>)>,
}

impl<T> Default for FieldTable<T> {
    fn default() -> Self {
        Self {
            fixed: Vec::new(),
            patterns: Vec::new(),
        }
    }
}

impl<T> FieldTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an exact-key entry. Keys must be unique within a table.
    pub fn field(mut self, key: &'static str, handler: FixedHandler<T>) -> Self {
        debug_assert!(
            self.fixed.iter().all(|(k, _)| *k != key),
            "duplicate field '{key}'"
        );
        self.fixed.push((key, handler));
        self
    }

    /// Add a pattern entry; earlier patterns win.
    pub fn pattern(mut self, predicate: KeyPredicate, handler: PatternHandler<T>) -> Self {
        self.patterns.push((predicate, handler));
        self
    }

    pub fn fixed_handler(&self, key: &str) -> Option<FixedHandler<T>> {
        self.fixed
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, handler)| *handler)
    }

    pub fn pattern_handler(&self, key: &str) -> Option<PatternHandler<T>> {
        self.patterns
            .iter()
            .find(|(predicate, _)| predicate(key))
            .map(|(_, handler)| *handler)
    }

    pub fn len(&self) -> usize {
        self.fixed.len() + self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Specification extension keys.
pub fn is_extension(key: &str) -> bool {
    key.starts_with("x-")
}

impl<T: Extensible> FieldTable<T> {
    /// Route `x-*` keys into the object's extension bucket.
    pub fn with_extensions(self) -> Self {
        self.pattern(is_extension, |target, key, node, _| {
            target
                .extensions_mut()
                .insert(key.to_string(), node.as_any());
            Ok(())
        })
    }
}

/// Dispatch every entry of `mapping` onto `target`.
///
/// A failing handler leaves its field untouched; the error is recorded at the
/// child's pointer and dispatch moves on to the next key. Null values of fixed
/// fields are skipped.
pub fn parse_map<T>(
    mapping: &MapNode<'_>,
    target: &mut T,
    table: &FieldTable<T>,
    ctx: &mut ParsingContext,
) {
    for (key, child) in mapping.entries() {
        let outcome = if let Some(handler) = table.fixed_handler(&key) {
            if child.is_null() {
                continue;
            }
            handler(target, &child, ctx)
        } else if let Some(handler) = table.pattern_handler(&key) {
            handler(target, &key, &child, ctx)
        } else {
            trace!(key = %key, pointer = %child.pointer(), "ignoring unknown field");
            continue;
        };
        if let Err(e) = outcome {
            ctx.record(&e, child.pointer());
        }
    }
}

/// Objects built from a mapping by a field table.
pub trait Loadable: Default + 'static {
    fn field_table() -> &'static FieldTable<Self>;

    /// Hook run after dispatch, with every field in place.
    fn finish(&mut self, _node: &ParseNode<'_>, _ctx: &mut ParsingContext) {}
}

/// Object loader boundary: always returns an object, partial on error.
pub fn load<T: Loadable>(node: &ParseNode<'_>, ctx: &mut ParsingContext) -> T {
    let mut target = T::default();
    match node.as_mapping() {
        Ok(mapping) => {
            parse_map(&mapping, &mut target, T::field_table(), ctx);
            target.finish(node, ctx);
        }
        Err(e) => ctx.record(&e, node.pointer()),
    }
    target
}

/// Load a position that may hold a `$ref`.
///
/// A `$ref` short-circuits into a placeholder before any field is dispatched;
/// sibling keys are ignored.
pub fn load_slot<T: Loadable + Referenceable>(
    node: &ParseNode<'_>,
    ctx: &mut ParsingContext,
) -> Slot<T> {
    let Some(pointer) = node.get_reference_pointer() else {
        return Slot::inline(load(node, ctx));
    };
    match parse_reference(&pointer, Some(T::KIND)) {
        Ok(reference) => Slot::Unresolved(reference),
        Err(e) => {
            ctx.record(&ParseError::from(e), &format!("{}/{}", node.pointer(), REFERENCE_KEY));
            Slot::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::any::AnyValue;
    use crate::model::Extensions;
    use serde_yaml::Value;

    #[derive(Default, Debug)]
    struct Sample {
        kind: Option<String>,
        named: Vec<String>,
        limit: Option<f64>,
        label: Option<String>,
        extensions: Extensions,
    }

    impl Extensible for Sample {
        fn extensions(&self) -> &Extensions {
            &self.extensions
        }

        fn extensions_mut(&mut self) -> &mut Extensions {
            &mut self.extensions
        }
    }

    fn table() -> FieldTable<Sample> {
        FieldTable::<Sample>::new()
            .field("type", |p, n, _| {
                p.kind = Some(n.as_scalar()?);
                Ok(())
            })
            .field("limit", |p, n, _| {
                p.limit = Some(n.as_f64()?);
                Ok(())
            })
            .field("label", |p, n, _| {
                p.label = Some(n.as_scalar()?);
                Ok(())
            })
            .with_extensions()
            .pattern(
                |key| key.starts_with("x-") || key.starts_with("on"),
                |p, key, _, _| {
                    p.named.push(key.to_string());
                    Ok(())
                },
            )
    }

    fn run(text: &str) -> (Sample, ParsingContext) {
        let value: Value = serde_yaml::from_str(text).unwrap();
        let root = ParseNode::root(&value);
        let mut ctx = ParsingContext::new();
        let mut sample = Sample::default();
        parse_map(&root.as_mapping().unwrap(), &mut sample, &table(), &mut ctx);
        (sample, ctx)
    }

    #[test]
    fn fixed_keys_never_fall_into_patterns() {
        let (sample, ctx) = run("{ type: object, x-type: vendor, onEvent: 1, unknown: 2 }");
        assert_eq!(sample.kind.as_deref(), Some("object"));
        assert_eq!(sample.extensions.len(), 1);
        assert_eq!(sample.extensions["x-type"], AnyValue::string("vendor"));
        // The first matching pattern wins: x-type went to extensions only.
        assert_eq!(sample.named, vec!["onEvent".to_string()]);
        assert!(ctx.diagnostic().errors.is_empty());
    }

    #[test]
    fn failing_handler_is_recorded_and_dispatch_continues() {
        let (sample, ctx) = run("{ limit: not-a-number, type: string, label: kept }");
        assert_eq!(sample.limit, None);
        assert_eq!(sample.kind.as_deref(), Some("string"));
        assert_eq!(sample.label.as_deref(), Some("kept"));

        let errors = &ctx.diagnostic().errors;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].pointer, "#/limit");
    }

    #[test]
    fn handlers_are_looked_up_by_exact_key() {
        let table = table();
        assert!(table.fixed_handler("type").is_some());
        assert!(table.fixed_handler("Type").is_none());
        assert!(table.pattern_handler("x-foo").is_some());
        assert!(table.pattern_handler("type").is_none());
        assert_eq!(table.len(), 5);
    }
}
