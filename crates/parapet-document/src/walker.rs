//! Cycle-safe traversal of the typed graph.
//!
//! [`Walker`] visits objects depth-first, pre-order, handing each one to a
//! [`Visitor`] as a [`Node`]. Referenceable objects are tracked on a
//! [`LoopDetector`] so a reference back into an ancestor is reported through
//! [`Visitor::visit_cycle`] instead of being descended into again.

use std::collections::HashMap;
use std::hash::Hash;

use indexmap::{IndexMap, IndexSet};
use tracing::trace;

use crate::model::{
    Channel, Components, CorrelationId, Document, Info, Message, Operation, Parameter,
    Referenceable, Schema, SecurityRequirement, SecurityScheme, Server, Tag,
};
use crate::reference::{AsyncApiReference, ComponentKey, ReferenceKind, Slot};
use crate::tree::{unescape_segment, PointerBuf};
use crate::workspace::Workspace;

/// Alias chains (`A: {$ref: B}`, `B: {$ref: C}`) longer than this are treated as broken.
const MAX_ALIAS_DEPTH: usize = 32;

/// One object of the graph, as seen by a visitor.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Document(&'a Document),
    Info(&'a Info),
    Server(&'a Server),
    Channel(&'a Channel),
    Operation(&'a Operation),
    Message(&'a Message),
    Parameter(&'a Parameter),
    CorrelationId(&'a CorrelationId),
    SecurityScheme(&'a SecurityScheme),
    Schema(&'a Schema),
    Tag(&'a Tag),
    Components(&'a Components),
}

/// Callbacks invoked by the [`Walker`]. Every method defaults to a no-op.
pub trait Visitor {
    /// A referenceable object, before [`visit`](Self::visit) and before its
    /// children. `key` is set for component entries and followed references.
    fn visit_referenceable(
        &mut self,
        _node: Node<'_>,
        _key: Option<&ComponentKey>,
        _pointer: &PointerBuf,
    ) {
    }

    fn visit(&mut self, _node: Node<'_>, _pointer: &PointerBuf) {}

    /// A reference slot. `target` is `None` while the slot is unresolved.
    fn visit_reference(
        &mut self,
        _reference: &AsyncApiReference,
        _expected: ReferenceKind,
        _target: Option<&ComponentKey>,
        _pointer: &PointerBuf,
    ) {
    }

    /// A followed reference led back to an ancestor. `cycle` lists the keys
    /// from the repeated object down to the current position.
    fn visit_cycle(&mut self, _cycle: &[ComponentKey], _pointer: &PointerBuf) {}
}

/// Identity-based repeat detection for one traversal.
#[derive(Debug)]
pub struct LoopDetector<K> {
    depth: HashMap<K, usize>,
    stack: Vec<K>,
}

impl<K> Default for LoopDetector<K> {
    fn default() -> Self {
        Self {
            depth: HashMap::new(),
            stack: Vec::new(),
        }
    }
}

impl<K: Hash + Eq + Clone> LoopDetector<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter `key`. Returns `false`, and does not push, when `key` is already
    /// on the stack.
    pub fn push(&mut self, key: K) -> bool {
        if self.contains(&key) {
            return false;
        }
        *self.depth.entry(key.clone()).or_insert(0) += 1;
        self.stack.push(key);
        true
    }

    pub fn pop(&mut self) -> Option<K> {
        let key = self.stack.pop()?;
        if let Some(count) = self.depth.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                self.depth.remove(&key);
            }
        }
        Some(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.depth.contains_key(key)
    }

    /// Stack index of `key`, counted from the outermost entry.
    pub fn position(&self, key: &K) -> Option<usize> {
        if !self.contains(key) {
            return None;
        }
        self.stack.iter().position(|k| k == key)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

/// A dereferenced slot.
#[derive(Debug)]
pub struct Target<'a, T> {
    pub value: &'a T,
    /// Key of the entry that holds `value` inline, made absolute.
    pub key: ComponentKey,
}

/// The root document plus the workspace its references may lead into.
#[derive(Clone, Copy)]
pub struct Graph<'a> {
    pub root: &'a Document,
    pub workspace: Option<&'a dyn Workspace>,
}

impl<'a> Graph<'a> {
    pub fn new(root: &'a Document) -> Self {
        Self {
            root,
            workspace: None,
        }
    }

    pub fn with_workspace(mut self, workspace: &'a dyn Workspace) -> Self {
        self.workspace = Some(workspace);
        self
    }

    /// `None` names the root document.
    pub fn document(&self, name: Option<&str>) -> Option<&'a Document> {
        match name {
            None => Some(self.root),
            Some(name) => self.workspace?.document(name),
        }
    }

    /// Follow `target`, seen from document `base`, through alias entries
    /// until an inline object is found.
    pub fn deref<T: Referenceable>(
        &self,
        target: &ComponentKey,
        base: Option<&str>,
    ) -> Option<Target<'a, T>> {
        let mut key = target.absolute(base);
        for _ in 0..MAX_ALIAS_DEPTH {
            if key.kind != T::KIND {
                return None;
            }
            let document = self.document(key.document.as_deref())?;
            match T::lookup(document, &key.id)? {
                Slot::Inline(value) => return Some(Target { value: &**value, key }),
                Slot::Resolved(resolved) => key = resolved.target.absolute(key.document.as_deref()),
                Slot::Unresolved(_) => return None,
            }
        }
        trace!(key = %key, "alias chain too deep");
        None
    }
}

/// Objects the walker can descend into once entered.
pub(crate) trait Walk: Referenceable {
    fn walk_children<'a>(&'a self, walker: &mut Walker<'a, '_>);
}

/// Depth-first, pre-order traversal.
pub struct Walker<'a, 'v> {
    graph: Graph<'a>,
    visitor: &'v mut dyn Visitor,
    pointer: PointerBuf,
    loops: LoopDetector<(ReferenceKind, usize)>,
    keys: Vec<Option<ComponentKey>>,
    documents: Vec<Option<String>>,
    follow_references: bool,
}

impl<'a, 'v> Walker<'a, 'v> {
    pub fn new(graph: Graph<'a>, visitor: &'v mut dyn Visitor) -> Self {
        Self {
            graph,
            visitor,
            pointer: PointerBuf::new(),
            loops: LoopDetector::new(),
            keys: Vec::new(),
            documents: Vec::new(),
            follow_references: false,
        }
    }

    /// Descend through resolved references into their targets.
    pub fn follow_references(mut self, follow: bool) -> Self {
        self.follow_references = follow;
        self
    }

    /// Walk the root document.
    pub fn walk(mut self) {
        let root = self.graph.root;
        self.document(root);
    }

    fn current_document(&self) -> Option<String> {
        self.documents.last().cloned().flatten()
    }

    fn at(&mut self, segment: &str, f: impl FnOnce(&mut Self)) {
        self.pointer.push(segment);
        f(self);
        self.pointer.pop();
    }

    fn document(&mut self, document: &'a Document) {
        self.visitor.visit(Node::Document(document), &self.pointer);
        self.at("info", |w| w.visitor.visit(Node::Info(&document.info), &w.pointer));
        self.at("servers", |w| {
            for (name, slot) in &document.servers {
                w.at(name, |w| w.slot(slot, None));
            }
        });
        self.at("channels", |w| {
            for (name, slot) in &document.channels {
                w.at(name, |w| w.slot(slot, None));
            }
        });
        if let Some(components) = &document.components {
            self.at("components", |w| w.components(components));
        }
        self.at("tags", |w| w.slot_list(&document.tags));
    }

    fn components(&mut self, components: &'a Components) {
        self.visitor
            .visit(Node::Components(components), &self.pointer);
        self.component_map(&components.schemas);
        self.component_map(&components.servers);
        self.component_map(&components.channels);
        self.component_map(&components.messages);
        self.component_map(&components.security_schemes);
        self.component_map(&components.parameters);
        self.component_map(&components.correlation_ids);
    }

    fn component_map<T: Walk>(&mut self, entries: &'a IndexMap<String, Slot<T>>) {
        let Some(segment) = T::KIND.segment() else {
            return;
        };
        self.at(segment, |w| {
            for (id, slot) in entries {
                let key = ComponentKey {
                    document: w.current_document(),
                    kind: T::KIND,
                    id: id.clone(),
                };
                w.at(id, |w| w.slot(slot, Some(key)));
            }
        });
    }

    pub(crate) fn operation(&mut self, operation: &'a Operation) {
        self.visitor.visit(Node::Operation(operation), &self.pointer);
        self.at("tags", |w| w.slot_list(&operation.tags));
        self.security(&operation.security);
        if let Some(message) = &operation.message {
            self.at("message", |w| w.slot(message, None));
        }
    }

    pub(crate) fn security(&mut self, requirements: &'a [SecurityRequirement]) {
        if requirements.is_empty() {
            return;
        }
        self.at("security", |w| {
            for (index, requirement) in requirements.iter().enumerate() {
                w.at(&index.to_string(), |w| {
                    for (slot, _) in &requirement.schemes {
                        let name = slot
                            .reference()
                            .and_then(|r| r.id.clone())
                            .unwrap_or_default();
                        w.at(&name, |w| w.slot(slot, None));
                    }
                });
            }
        });
    }

    pub(crate) fn slot_list<T: Walk>(&mut self, slots: &'a [Slot<T>]) {
        for (index, slot) in slots.iter().enumerate() {
            self.at(&index.to_string(), |w| w.slot(slot, None));
        }
    }

    pub(crate) fn slot_map<T: Walk>(&mut self, slots: &'a IndexMap<String, Slot<T>>) {
        for (name, slot) in slots {
            self.at(name, |w| w.slot(slot, None));
        }
    }

    pub(crate) fn optional_slot<T: Walk>(&mut self, segment: &str, slot: &'a Option<Slot<T>>) {
        if let Some(slot) = slot {
            self.at(segment, |w| w.slot(slot, None));
        }
    }

    pub(crate) fn slot<T: Walk>(&mut self, slot: &'a Slot<T>, key: Option<ComponentKey>) {
        match slot {
            Slot::Inline(value) => self.enter(&**value, key),
            Slot::Unresolved(reference) => {
                self.visitor
                    .visit_reference(reference, T::KIND, None, &self.pointer);
            }
            Slot::Resolved(resolved) => {
                self.visitor.visit_reference(
                    &resolved.reference,
                    T::KIND,
                    Some(&resolved.target),
                    &self.pointer,
                );
                if self.follow_references {
                    self.follow::<T>(&resolved.target);
                }
            }
        }
    }

    fn follow<T: Walk + 'a>(&mut self, target: &ComponentKey) {
        let base = self.current_document();
        let Some(found) = self.graph.deref::<T>(target, base.as_deref()) else {
            trace!(target = %target, "reference target not reachable");
            return;
        };
        self.documents.push(found.key.document.clone());
        self.enter(found.value, Some(found.key));
        self.documents.pop();
    }

    fn enter<T: Walk>(&mut self, value: &'a T, key: Option<ComponentKey>) {
        let identity = (T::KIND, value as *const T as usize);
        if let Some(position) = self.loops.position(&identity) {
            let mut cycle: Vec<ComponentKey> =
                self.keys[position..].iter().flatten().cloned().collect();
            if cycle.is_empty() {
                cycle.extend(key);
            }
            self.visitor.visit_cycle(&cycle, &self.pointer);
            return;
        }
        self.loops.push(identity);
        self.keys.push(key);
        let node = value.node();
        self.visitor
            .visit_referenceable(node, self.keys.last().and_then(Option::as_ref), &self.pointer);
        self.visitor.visit(node, &self.pointer);
        value.walk_children(self);
        self.keys.pop();
        self.loops.pop();
    }
}

impl Walk for Schema {
    fn walk_children<'a>(&'a self, w: &mut Walker<'a, '_>) {
        w.at("properties", |w| w.slot_map(&self.properties));
        w.optional_slot("additionalProperties", &self.additional_properties);
        w.optional_slot("items", &self.items);
        w.at("allOf", |w| w.slot_list(&self.all_of));
        w.at("oneOf", |w| w.slot_list(&self.one_of));
        w.at("anyOf", |w| w.slot_list(&self.any_of));
        w.optional_slot("not", &self.not);
    }
}

impl Walk for Server {
    fn walk_children<'a>(&'a self, w: &mut Walker<'a, '_>) {
        w.security(&self.security);
    }
}

impl Walk for Channel {
    fn walk_children<'a>(&'a self, w: &mut Walker<'a, '_>) {
        if let Some(operation) = &self.subscribe {
            w.at("subscribe", |w| w.operation(operation));
        }
        if let Some(operation) = &self.publish {
            w.at("publish", |w| w.operation(operation));
        }
        w.at("parameters", |w| w.slot_map(&self.parameters));
    }
}

impl Walk for Message {
    fn walk_children<'a>(&'a self, w: &mut Walker<'a, '_>) {
        w.optional_slot("headers", &self.headers);
        w.optional_slot("payload", &self.payload);
        w.optional_slot("correlationId", &self.correlation_id);
        w.at("tags", |w| w.slot_list(&self.tags));
    }
}

impl Walk for Parameter {
    fn walk_children<'a>(&'a self, w: &mut Walker<'a, '_>) {
        w.optional_slot("schema", &self.schema);
    }
}

impl Walk for CorrelationId {
    fn walk_children<'a>(&'a self, _: &mut Walker<'a, '_>) {}
}

impl Walk for SecurityScheme {
    fn walk_children<'a>(&'a self, _: &mut Walker<'a, '_>) {}
}

impl Walk for Tag {
    fn walk_children<'a>(&'a self, _: &mut Walker<'a, '_>) {}
}

/// Gathers the schema reference graph of a document and of every workspace
/// document its references lead into.
///
/// An edge runs from a schema component to each schema component referenced
/// anywhere inside it, inline subschemas included. Alias entries
/// (`A: {$ref: B}`) are edges too.
#[derive(Debug, Default)]
pub struct SchemaCollector {
    document: Option<String>,
    edges: IndexMap<ComponentKey, Vec<ComponentKey>>,
    documents: IndexSet<String>,
}

impl SchemaCollector {
    /// Walk `graph.root`, then each workspace document reached, once.
    pub fn collect(graph: Graph<'_>) -> Self {
        let mut collector = SchemaCollector::default();
        Walker::new(graph, &mut collector).walk();

        let mut next = 0;
        while let Some(name) = collector.documents.get_index(next).cloned() {
            next += 1;
            let Some(document) = graph.document(Some(name.as_str())) else {
                trace!(document = %name, "referenced document not in workspace");
                continue;
            };
            let mut inner = Graph::new(document);
            if let Some(workspace) = graph.workspace {
                inner = inner.with_workspace(workspace);
            }
            collector.document = Some(name);
            Walker::new(inner, &mut collector).walk();
        }
        collector
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    /// Schema keys on at least one cycle, in discovery order: members of a
    /// strongly connected component with more than one key, or keys that
    /// reference themselves.
    pub fn cyclic(&self) -> IndexSet<ComponentKey> {
        let mut nodes: IndexSet<&ComponentKey> = IndexSet::new();
        for (from, targets) in &self.edges {
            nodes.insert(from);
            nodes.extend(targets);
        }
        let successors: Vec<Vec<usize>> = nodes
            .iter()
            .map(|key| match self.edges.get(*key) {
                Some(targets) => targets
                    .iter()
                    .filter_map(|target| nodes.get_index_of(target))
                    .collect(),
                None => Vec::new(),
            })
            .collect();

        let mut on_cycle = vec![false; nodes.len()];
        for component in strongly_connected(&successors) {
            let looped = match component.as_slice() {
                [single] => successors[*single].contains(single),
                _ => true,
            };
            if looped {
                for member in component {
                    on_cycle[member] = true;
                }
            }
        }
        nodes
            .into_iter()
            .zip(on_cycle)
            .filter(|(_, looped)| *looped)
            .map(|(key, _)| key.clone())
            .collect()
    }
}

impl Visitor for SchemaCollector {
    fn visit_reference(
        &mut self,
        _reference: &AsyncApiReference,
        expected: ReferenceKind,
        target: Option<&ComponentKey>,
        pointer: &PointerBuf,
    ) {
        let Some(target) = target else {
            return;
        };
        let target = target.absolute(self.document.as_deref());
        if let Some(name) = &target.document {
            if self.document.as_ref() != Some(name) {
                self.documents.insert(name.clone());
            }
        }
        if expected != ReferenceKind::Schema {
            return;
        }
        let Some(owner) = schema_component(&pointer.to_string()) else {
            return;
        };
        let owner = ComponentKey {
            document: self.document.clone(),
            kind: ReferenceKind::Schema,
            id: owner,
        };
        self.edges.entry(owner).or_default().push(target);
    }
}

/// Id of the schema component a pointer lies in, if any.
fn schema_component(pointer: &str) -> Option<String> {
    let rest = pointer.strip_prefix("#/components/schemas/")?;
    let segment = rest.split('/').next()?;
    Some(unescape_segment(segment).into_owned())
}

/// Tarjan's algorithm, iterative. Components come out in reverse
/// topological order.
fn strongly_connected(successors: &[Vec<usize>]) -> Vec<Vec<usize>> {
    const UNVISITED: usize = usize::MAX;
    let count = successors.len();
    let mut index = vec![UNVISITED; count];
    let mut low = vec![0; count];
    let mut on_stack = vec![false; count];
    let mut stack = Vec::new();
    let mut components = Vec::new();
    let mut next = 0;

    for root in 0..count {
        if index[root] != UNVISITED {
            continue;
        }
        index[root] = next;
        low[root] = next;
        next += 1;
        stack.push(root);
        on_stack[root] = true;
        // (node, next successor to look at)
        let mut work = vec![(root, 0usize)];

        while let Some((node, child)) = work.last().copied() {
            if let Some(&successor) = successors[node].get(child) {
                if let Some(top) = work.last_mut() {
                    top.1 += 1;
                }
                if index[successor] == UNVISITED {
                    index[successor] = next;
                    low[successor] = next;
                    next += 1;
                    stack.push(successor);
                    on_stack[successor] = true;
                    work.push((successor, 0));
                } else if on_stack[successor] {
                    low[node] = low[node].min(index[successor]);
                }
                continue;
            }

            work.pop();
            if let Some(&(parent, _)) = work.last() {
                low[parent] = low[parent].min(low[node]);
            }
            if low[node] == index[node] {
                let mut component = Vec::new();
                while let Some(member) = stack.pop() {
                    on_stack[member] = false;
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                components.push(component);
            }
        }
    }
    components
}

/// Schema keys that participate in a cycle reachable from `graph.root`.
pub fn collect_cyclic_schemas(graph: Graph<'_>) -> IndexSet<ComponentKey> {
    SchemaCollector::collect(graph).cyclic()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{AsyncApiReference, ResolvedReference};

    fn schema_ref(id: &str) -> Slot<Schema> {
        Slot::Resolved(ResolvedReference {
            reference: AsyncApiReference::local(ReferenceKind::Schema, id),
            target: ComponentKey::local(ReferenceKind::Schema, id),
        })
    }

    fn document_with(schemas: Vec<(&str, Slot<Schema>)>) -> Document {
        let mut components = Components::default();
        for (id, slot) in schemas {
            components.schemas.insert(id.to_string(), slot);
        }
        Document {
            components: Some(components),
            ..Document::default()
        }
    }

    #[derive(Default)]
    struct Recorder {
        pointers: Vec<String>,
        references: Vec<(String, bool)>,
        cycles: Vec<Vec<String>>,
    }

    impl Visitor for Recorder {
        fn visit(&mut self, node: Node<'_>, pointer: &PointerBuf) {
            if let Node::Schema(_) = node {
                self.pointers.push(pointer.to_string());
            }
        }

        fn visit_reference(
            &mut self,
            reference: &AsyncApiReference,
            _expected: ReferenceKind,
            target: Option<&ComponentKey>,
            _pointer: &PointerBuf,
        ) {
            self.references.push((reference.pointer(), target.is_some()));
        }

        fn visit_cycle(&mut self, cycle: &[ComponentKey], _pointer: &PointerBuf) {
            self.cycles
                .push(cycle.iter().map(|k| k.id.clone()).collect());
        }
    }

    #[test]
    fn loop_detector_reports_repeats() {
        let mut loops = LoopDetector::new();
        assert!(loops.push("a"));
        assert!(loops.push("b"));
        assert!(!loops.push("a"));
        assert_eq!(loops.position(&"b"), Some(1));
        assert_eq!(loops.pop(), Some("b"));
        assert!(!loops.contains(&"b"));
        assert!(loops.push("b"));
        assert_eq!(loops.depth(), 2);
    }

    #[test]
    fn self_referencing_schema_is_walked_once() {
        let mut node = Schema::default();
        node.properties.insert("next".into(), schema_ref("Node"));
        let document = document_with(vec![("Node", Slot::inline(node))]);

        let mut recorder = Recorder::default();
        Walker::new(Graph::new(&document), &mut recorder)
            .follow_references(true)
            .walk();

        assert_eq!(recorder.pointers, vec!["#/components/schemas/Node"]);
        assert_eq!(recorder.cycles, vec![vec!["Node".to_string()]]);
    }

    #[test]
    fn without_following_references_are_only_reported() {
        let mut node = Schema::default();
        node.properties.insert("next".into(), schema_ref("Node"));
        node.properties.insert(
            "other".into(),
            Slot::Unresolved(AsyncApiReference::local(ReferenceKind::Schema, "Other")),
        );
        let document = document_with(vec![("Node", Slot::inline(node))]);

        let mut recorder = Recorder::default();
        Walker::new(Graph::new(&document), &mut recorder).walk();

        assert!(recorder.cycles.is_empty());
        assert_eq!(
            recorder.references,
            vec![
                ("#/components/schemas/Node".to_string(), true),
                ("#/components/schemas/Other".to_string(), false),
            ]
        );
    }

    #[test]
    fn mutual_recursion_marks_both_schemas() {
        let mut a = Schema::default();
        a.properties.insert("b".into(), schema_ref("B"));
        let mut b = Schema::default();
        b.items = Some(schema_ref("A"));
        let leaf = Schema::default();
        let document = document_with(vec![
            ("A", Slot::inline(a)),
            ("B", Slot::inline(b)),
            ("Leaf", Slot::inline(leaf)),
        ]);

        let cyclic = collect_cyclic_schemas(Graph::new(&document));
        assert!(cyclic.contains(&ComponentKey::local(ReferenceKind::Schema, "A")));
        assert!(cyclic.contains(&ComponentKey::local(ReferenceKind::Schema, "B")));
        assert!(!cyclic.contains(&ComponentKey::local(ReferenceKind::Schema, "Leaf")));
    }

    #[test]
    fn deref_follows_alias_entries() {
        let document = document_with(vec![
            ("Alias", schema_ref("Target")),
            (
                "Target",
                Slot::inline(Schema {
                    title: Some("target".into()),
                    ..Schema::default()
                }),
            ),
        ]);
        let graph = Graph::new(&document);
        let found = graph
            .deref::<Schema>(&ComponentKey::local(ReferenceKind::Schema, "Alias"), None)
            .unwrap();
        assert_eq!(found.value.title.as_deref(), Some("target"));
        assert_eq!(found.key.id, "Target");

        assert!(graph
            .deref::<Message>(&ComponentKey::local(ReferenceKind::Schema, "Alias"), None)
            .is_none());
    }

    #[test]
    fn alias_onto_a_cycle_is_not_itself_cyclic() {
        let mut node = Schema::default();
        node.items = Some(Slot::inline(Schema {
            not: Some(schema_ref("Node")),
            ..Schema::default()
        }));
        let document = document_with(vec![
            ("Alias", schema_ref("Node")),
            ("Node", Slot::inline(node)),
        ]);

        let collector = SchemaCollector::collect(Graph::new(&document));
        assert_eq!(collector.edge_count(), 2);
        assert_eq!(
            collector.cyclic().into_iter().collect::<Vec<_>>(),
            vec![ComponentKey::local(ReferenceKind::Schema, "Node")]
        );
    }

    #[test]
    fn densely_connected_schemas_are_collected_in_linear_passes() {
        let ids: Vec<String> = (0..40).map(|i| format!("S{i}")).collect();
        let schemas = ids
            .iter()
            .map(|id| {
                let mut schema = Schema::default();
                for other in ids.iter().filter(|other| *other != id) {
                    schema.properties.insert(other.clone(), schema_ref(other));
                }
                (id.as_str(), Slot::inline(schema))
            })
            .collect();
        let document = document_with(schemas);

        let started = std::time::Instant::now();
        let collector = SchemaCollector::collect(Graph::new(&document));
        let cyclic = collector.cyclic();
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        assert_eq!(collector.edge_count(), 40 * 39);
        assert_eq!(cyclic.len(), 40);
    }

    #[test]
    fn cycles_inside_workspace_documents_are_found() {
        use crate::workspace::InMemoryWorkspace;

        let mut tree = Schema::default();
        tree.properties.insert("parent".into(), schema_ref("Tree"));
        let mut workspace = InMemoryWorkspace::new();
        workspace.insert("common.yaml", document_with(vec![("Tree", Slot::inline(tree))]));

        let mut root = Schema::default();
        root.properties.insert(
            "tree".into(),
            Slot::Resolved(ResolvedReference {
                reference: AsyncApiReference::local(ReferenceKind::Schema, "Tree"),
                target: ComponentKey {
                    document: Some("common.yaml".into()),
                    kind: ReferenceKind::Schema,
                    id: "Tree".into(),
                },
            }),
        );
        let document = document_with(vec![("Root", Slot::inline(root))]);

        let cyclic = collect_cyclic_schemas(Graph::new(&document).with_workspace(&workspace));
        assert_eq!(cyclic.len(), 1);
        let key = cyclic.first().unwrap();
        assert_eq!(key.document.as_deref(), Some("common.yaml"));
        assert_eq!(key.id, "Tree");
    }
}
