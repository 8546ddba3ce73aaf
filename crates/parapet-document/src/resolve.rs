//! Second-pass reference resolution.
//!
//! Resolution runs in two steps so the graph is never borrowed mutably while
//! it is being searched: [`Resolution::collect`] walks the document with a
//! [`ReferenceResolver`] and records a target key per unresolved slot pointer,
//! then [`Resolution::bind_references`] revisits the slots mutably and swaps
//! each placeholder for its handle. Slots that are already resolved are left
//! alone, so running both steps again is a no-op.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::debug;

use crate::context::AsyncApiError;
use crate::error::ResolutionError;
use crate::model::{
    Channel, Components, CorrelationId, Document, Message, Operation, Parameter, Referenceable,
    Schema, SecurityRequirement, SecurityScheme, Server, Tag,
};
use crate::reference::{AsyncApiReference, ComponentKey, ReferenceKind, Slot};
use crate::tree::PointerBuf;
use crate::walker::{Graph, Visitor, Walker};
use crate::workspace::Workspace;

/// Bind a local reference against `document`.
pub fn resolve_local(
    reference: &AsyncApiReference,
    document: &Document,
) -> Result<ComponentKey, ResolutionError> {
    let (Some(kind), Some(id)) = (reference.kind, reference.id.as_deref()) else {
        return Err(ResolutionError::Unsupported {
            pointer: reference.pointer(),
        });
    };
    if kind == ReferenceKind::Tag {
        return match Tag::lookup(document, id) {
            Some(_) => Ok(ComponentKey::local(kind, id)),
            None => Err(ResolutionError::NotFound {
                kind,
                id: id.to_string(),
            }),
        };
    }
    let components =
        document
            .components
            .as_ref()
            .ok_or_else(|| ResolutionError::MissingComponents {
                pointer: reference.pointer(),
            })?;
    match components.contains(kind, id) {
        Some(true) => Ok(ComponentKey::local(kind, id)),
        _ => Err(ResolutionError::InvalidReferenceId {
            kind,
            id: id.to_string(),
        }),
    }
}

/// Bind `reference`, found in `document`.
///
/// External references go through `workspace`. With `allow_external` unset
/// they are skipped and `Ok(None)` is returned.
pub fn resolve(
    reference: &AsyncApiReference,
    document: &Document,
    workspace: Option<&dyn Workspace>,
    allow_external: bool,
) -> Result<Option<ComponentKey>, ResolutionError> {
    let Some(resource) = reference.external_resource.as_deref() else {
        return resolve_local(reference, document).map(Some);
    };
    if !allow_external {
        return Ok(None);
    }
    match workspace {
        Some(workspace) => workspace.resolve(reference).map(Some),
        None => Err(ResolutionError::WorkspaceRequired {
            resource: resource.to_string(),
        }),
    }
}

/// Visitor that resolves every unresolved slot it meets.
pub struct ReferenceResolver<'d> {
    document: &'d Document,
    workspace: Option<&'d dyn Workspace>,
    allow_external: bool,
    resolution: Resolution,
}

impl<'d> ReferenceResolver<'d> {
    pub fn new(
        document: &'d Document,
        workspace: Option<&'d dyn Workspace>,
        allow_external: bool,
    ) -> Self {
        Self {
            document,
            workspace,
            allow_external,
            resolution: Resolution::default(),
        }
    }

    pub fn into_resolution(self) -> Resolution {
        self.resolution
    }
}

impl Visitor for ReferenceResolver<'_> {
    fn visit_reference(
        &mut self,
        reference: &AsyncApiReference,
        expected: ReferenceKind,
        target: Option<&ComponentKey>,
        pointer: &PointerBuf,
    ) {
        if target.is_some() {
            return;
        }
        if let Some(found) = reference.kind.filter(|kind| *kind != expected) {
            self.resolution.errors.push(AsyncApiError::new(
                pointer.to_string(),
                ResolutionError::KindMismatch { expected, found },
            ));
            return;
        }
        match resolve(reference, self.document, self.workspace, self.allow_external) {
            Ok(Some(key)) => {
                self.resolution.bindings.insert(pointer.to_string(), key);
            }
            Ok(None) => debug!(reference = %reference, "external reference left unresolved"),
            Err(e) => self
                .resolution
                .errors
                .push(AsyncApiError::new(pointer.to_string(), e)),
        }
    }
}

/// Outcome of resolving one document: target keys by slot pointer, plus the
/// references that could not be bound.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub bindings: HashMap<String, ComponentKey>,
    pub errors: Vec<AsyncApiError>,
}

impl Resolution {
    /// Resolve every unresolved slot of `document` without modifying it.
    pub fn collect(
        document: &Document,
        workspace: Option<&dyn Workspace>,
        allow_external: bool,
    ) -> Resolution {
        let mut resolver = ReferenceResolver::new(document, workspace, allow_external);
        Walker::new(Graph::new(document), &mut resolver).walk();
        resolver.into_resolution()
    }

    /// Swap placeholders for handles. Returns the number of slots bound.
    pub fn bind_references(&self, document: &mut Document) -> usize {
        if self.bindings.is_empty() {
            return 0;
        }
        let mut binder = Binder {
            pointer: PointerBuf::new(),
            bindings: &self.bindings,
            bound: 0,
        };
        binder.document(document);
        binder.bound
    }
}

/// Resolve and bind in place; returns the resolution failures.
pub fn resolve_references(
    document: &mut Document,
    workspace: Option<&dyn Workspace>,
    allow_external: bool,
) -> Vec<AsyncApiError> {
    let resolution = Resolution::collect(document, workspace, allow_external);
    let bound = resolution.bind_references(document);
    debug!(
        bound,
        failed = resolution.errors.len(),
        "references resolved"
    );
    resolution.errors
}

/// Mutable counterpart of the walker; must produce the same slot pointers.
struct Binder<'b> {
    pointer: PointerBuf,
    bindings: &'b HashMap<String, ComponentKey>,
    bound: usize,
}

trait Bind {
    fn bind_children(&mut self, binder: &mut Binder<'_>);
}

impl Binder<'_> {
    fn at(&mut self, segment: &str, f: impl FnOnce(&mut Self)) {
        self.pointer.push(segment);
        f(self);
        self.pointer.pop();
    }

    fn document(&mut self, document: &mut Document) {
        self.at("servers", |b| b.slot_map(&mut document.servers));
        self.at("channels", |b| b.slot_map(&mut document.channels));
        if let Some(components) = &mut document.components {
            self.at("components", |b| b.components(components));
        }
        self.at("tags", |b| b.slot_list(&mut document.tags));
    }

    fn components(&mut self, components: &mut Components) {
        self.component_map(&mut components.schemas);
        self.component_map(&mut components.servers);
        self.component_map(&mut components.channels);
        self.component_map(&mut components.messages);
        self.component_map(&mut components.security_schemes);
        self.component_map(&mut components.parameters);
        self.component_map(&mut components.correlation_ids);
    }

    fn component_map<T: Bind + Referenceable>(&mut self, entries: &mut IndexMap<String, Slot<T>>) {
        if let Some(segment) = T::KIND.segment() {
            self.at(segment, |b| b.slot_map(entries));
        }
    }

    fn operation(&mut self, operation: &mut Operation) {
        self.at("tags", |b| b.slot_list(&mut operation.tags));
        self.security(&mut operation.security);
        self.optional_slot("message", &mut operation.message);
    }

    fn security(&mut self, requirements: &mut [SecurityRequirement]) {
        if requirements.is_empty() {
            return;
        }
        self.at("security", |b| {
            for (index, requirement) in requirements.iter_mut().enumerate() {
                b.at(&index.to_string(), |b| {
                    for (slot, _) in &mut requirement.schemes {
                        let name = slot
                            .reference()
                            .and_then(|r| r.id.clone())
                            .unwrap_or_default();
                        b.at(&name, |b| b.slot(slot));
                    }
                });
            }
        });
    }

    fn slot_list<T: Bind>(&mut self, slots: &mut [Slot<T>]) {
        for (index, slot) in slots.iter_mut().enumerate() {
            self.at(&index.to_string(), |b| b.slot(slot));
        }
    }

    fn slot_map<T: Bind>(&mut self, slots: &mut IndexMap<String, Slot<T>>) {
        for (name, slot) in slots.iter_mut() {
            self.at(name, |b| b.slot(slot));
        }
    }

    fn optional_slot<T: Bind>(&mut self, segment: &str, slot: &mut Option<Slot<T>>) {
        if let Some(slot) = slot {
            self.at(segment, |b| b.slot(slot));
        }
    }

    fn slot<T: Bind>(&mut self, slot: &mut Slot<T>) {
        match slot {
            Slot::Inline(value) => value.bind_children(self),
            Slot::Unresolved(_) => {
                if let Some(key) = self.bindings.get(&self.pointer.to_string()) {
                    if slot.bind(key.clone()) {
                        self.bound += 1;
                    }
                }
            }
            Slot::Resolved(_) => {}
        }
    }
}

impl Bind for Schema {
    fn bind_children(&mut self, b: &mut Binder<'_>) {
        b.at("properties", |b| b.slot_map(&mut self.properties));
        b.optional_slot("additionalProperties", &mut self.additional_properties);
        b.optional_slot("items", &mut self.items);
        b.at("allOf", |b| b.slot_list(&mut self.all_of));
        b.at("oneOf", |b| b.slot_list(&mut self.one_of));
        b.at("anyOf", |b| b.slot_list(&mut self.any_of));
        b.optional_slot("not", &mut self.not);
    }
}

impl Bind for Server {
    fn bind_children(&mut self, b: &mut Binder<'_>) {
        b.security(&mut self.security);
    }
}

impl Bind for Channel {
    fn bind_children(&mut self, b: &mut Binder<'_>) {
        if let Some(operation) = &mut self.subscribe {
            b.at("subscribe", |b| b.operation(operation));
        }
        if let Some(operation) = &mut self.publish {
            b.at("publish", |b| b.operation(operation));
        }
        b.at("parameters", |b| b.slot_map(&mut self.parameters));
    }
}

impl Bind for Message {
    fn bind_children(&mut self, b: &mut Binder<'_>) {
        b.optional_slot("headers", &mut self.headers);
        b.optional_slot("payload", &mut self.payload);
        b.optional_slot("correlationId", &mut self.correlation_id);
        b.at("tags", |b| b.slot_list(&mut self.tags));
    }
}

impl Bind for Parameter {
    fn bind_children(&mut self, b: &mut Binder<'_>) {
        b.optional_slot("schema", &mut self.schema);
    }
}

impl Bind for CorrelationId {
    fn bind_children(&mut self, _: &mut Binder<'_>) {}
}

impl Bind for SecurityScheme {
    fn bind_children(&mut self, _: &mut Binder<'_>) {}
}

impl Bind for Tag {
    fn bind_children(&mut self, _: &mut Binder<'_>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ParsingContext;
    use crate::dispatch::load;
    use crate::tree::ParseNode;
    use crate::workspace::InMemoryWorkspace;

    fn parse(text: &str) -> Document {
        let value: serde_yaml::Value = serde_yaml::from_str(text).unwrap();
        let mut ctx = ParsingContext::new();
        let document = load(&ParseNode::root(&value), &mut ctx);
        assert!(ctx.diagnostic().is_valid(), "{:?}", ctx.diagnostic());
        document
    }

    const USERS: &str = r##"
asyncapi: 2.6.0
info: { title: Users, version: 1.0.0 }
tags:
  - name: user
channels:
  user/signedup:
    subscribe:
      tags: [user]
      message:
        $ref: '#/components/messages/UserSignedUp'
components:
  messages:
    UserSignedUp:
      payload:
        $ref: '#/components/schemas/User'
  schemas:
    User:
      type: object
      properties:
        manager:
          $ref: '#/components/schemas/User'
"##;

    #[test]
    fn local_references_are_bound_in_place() {
        let mut document = parse(USERS);
        let errors = resolve_references(&mut document, None, false);
        assert!(errors.is_empty(), "{errors:?}");

        let channel = document.channels["user/signedup"].as_inline().unwrap();
        let operation = channel.subscribe.as_ref().unwrap();
        assert_eq!(
            operation.message.as_ref().unwrap().target(),
            Some(&ComponentKey::local(ReferenceKind::Message, "UserSignedUp"))
        );
        assert_eq!(
            operation.tags[0].target(),
            Some(&ComponentKey::local(ReferenceKind::Tag, "user"))
        );

        let user = document.component::<Schema>("User").unwrap().as_inline().unwrap();
        assert_eq!(
            user.properties["manager"].target(),
            Some(&ComponentKey::local(ReferenceKind::Schema, "User"))
        );
    }

    #[test]
    fn resolution_is_idempotent() {
        let mut document = parse(USERS);
        resolve_references(&mut document, None, false);
        let once = document.clone();

        let again = Resolution::collect(&document, None, false);
        assert!(again.bindings.is_empty());
        assert!(again.errors.is_empty());
        assert_eq!(again.bind_references(&mut document), 0);
        assert_eq!(document, once);
    }

    #[test]
    fn dangling_ids_and_missing_components_are_reported() {
        let mut document = parse(
            r##"
asyncapi: 2.6.0
channels:
  a:
    publish:
      message:
        $ref: '#/components/messages/Missing'
"##,
        );
        let errors = resolve_references(&mut document, None, false);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].pointer, "#/channels/a/publish/message");
        assert!(errors[0].message.contains("no components"));

        let mut document = parse(
            r##"
asyncapi: 2.6.0
channels:
  a:
    publish:
      message:
        $ref: '#/components/messages/Missing'
components:
  schemas: {}
"##,
        );
        let errors = resolve_references(&mut document, None, false);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].message,
            ResolutionError::InvalidReferenceId {
                kind: ReferenceKind::Message,
                id: "Missing".into()
            }
            .to_string()
        );
        let channel = document.channels["a"].as_inline().unwrap();
        assert!(channel.publish.as_ref().unwrap().message.as_ref().unwrap().is_unresolved());
    }

    #[test]
    fn unknown_tag_names_are_not_found() {
        let mut document = parse(
            r#"
asyncapi: 2.6.0
channels:
  a:
    subscribe:
      tags: [billing]
"#,
        );
        let errors = resolve_references(&mut document, None, false);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].pointer, "#/channels/a/subscribe/tags/0");
        assert_eq!(errors[0].message, "tag 'billing' not found");
    }

    #[test]
    fn kind_mismatch_is_reported() {
        let mut document = parse(
            r##"
asyncapi: 2.6.0
channels:
  a:
    subscribe:
      message:
        $ref: '#/components/schemas/User'
components:
  schemas:
    User: { type: object }
"##,
        );
        let errors = resolve_references(&mut document, None, false);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].message,
            "expected a message reference, found schema"
        );
    }

    #[test]
    fn external_references_need_a_workspace() {
        const SIGNUP: &str = r##"
asyncapi: 2.6.0
channels:
  user/signedup:
    subscribe:
      message:
        $ref: 'common.yaml#/components/messages/UserSignedUp'
"##;
        let mut document = parse(SIGNUP);
        assert!(resolve_references(&mut document, None, false).is_empty());

        let errors = resolve_references(&mut document, None, true);
        assert_eq!(
            errors[0].message,
            ResolutionError::WorkspaceRequired {
                resource: "common.yaml".into()
            }
            .to_string()
        );

        let mut workspace = InMemoryWorkspace::new();
        workspace.insert(
            "common.yaml",
            parse(
                r#"
asyncapi: 2.6.0
components:
  messages:
    UserSignedUp: { name: userSignedUp }
"#,
            ),
        );
        let errors = resolve_references(&mut document, Some(&workspace), true);
        assert!(errors.is_empty(), "{errors:?}");
        let channel = document.channels["user/signedup"].as_inline().unwrap();
        let target = channel.subscribe.as_ref().unwrap().message.as_ref().unwrap().target();
        assert_eq!(
            target.and_then(|key| key.document.as_deref()),
            Some("common.yaml")
        );
    }
}
