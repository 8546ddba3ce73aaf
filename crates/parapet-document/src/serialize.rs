//! Writing the typed graph back out.
//!
//! Resolved references are written as `$ref` pointers unless the settings ask
//! for them to be inlined. Inlining never expands a schema that sits on a
//! cycle, and a [`LoopDetector`] keyed by component guards every expansion, so
//! the output is always finite.

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, warn};

use crate::any::AnyValue;
use crate::error::WriteError;
use crate::model::{
    Channel, Components, Contact, CorrelationId, Document, Extensions, Info, License, Message,
    Operation, Parameter, Referenceable, Schema, SecurityRequirement, SecurityScheme, Server, Tag,
};
use crate::reference::{AsyncApiReference, ComponentKey, ReferenceKind, Slot};
use crate::tree::REFERENCE_KEY;
use crate::walker::{Graph, LoopDetector, SchemaCollector};
use crate::workspace::Workspace;
use crate::writer::{OutputFormat, SpecWriter, ValueWriter};

/// Output options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterSettings {
    pub format: OutputFormat,
    /// Expand `#/components/...` references at their use sites.
    pub inline_local_references: bool,
    /// Expand references into other workspace documents.
    pub inline_external_references: bool,
}

impl WriterSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_inline_local_references(mut self, inline: bool) -> Self {
        self.inline_local_references = inline;
        self
    }

    pub fn with_inline_external_references(mut self, inline: bool) -> Self {
        self.inline_external_references = inline;
        self
    }

    fn inlines_anything(&self) -> bool {
        self.inline_local_references || self.inline_external_references
    }
}

/// Objects that know how to write themselves.
pub trait WriteSpec {
    fn write_spec(&self, ctx: &mut SerializeContext<'_, '_>);
}

/// Per-write state: the sink, the graph for dereferencing, and loop tracking.
pub struct SerializeContext<'a, 'w> {
    graph: Graph<'a>,
    settings: WriterSettings,
    writer: &'w mut dyn SpecWriter,
    cyclic: IndexSet<ComponentKey>,
    loops: LoopDetector<ComponentKey>,
    documents: Vec<Option<String>>,
}

impl<'a, 'w> SerializeContext<'a, 'w> {
    fn new(graph: Graph<'a>, settings: WriterSettings, writer: &'w mut dyn SpecWriter) -> Self {
        let cyclic = if settings.inlines_anything() {
            let collector = SchemaCollector::collect(graph);
            let cyclic = collector.cyclic();
            debug!(
                edges = collector.edge_count(),
                cyclic = cyclic.len(),
                "schema reference graph collected"
            );
            cyclic
        } else {
            IndexSet::new()
        };
        Self {
            graph,
            settings,
            writer,
            cyclic,
            loops: LoopDetector::new(),
            documents: Vec::new(),
        }
    }

    fn current_document(&self) -> Option<String> {
        self.documents.last().cloned().flatten()
    }

    pub fn writer(&mut self) -> &mut dyn SpecWriter {
        &mut *self.writer
    }

    pub fn start_object(&mut self) {
        self.writer.write_start_object();
    }

    pub fn end_object(&mut self) {
        self.writer.write_end_object();
    }

    pub fn property(&mut self, name: &str) {
        self.writer.write_property_name(name);
    }

    /// Skipped when empty.
    pub fn string(&mut self, name: &str, value: &str) {
        if !value.is_empty() {
            self.property(name);
            self.writer.write_string(value);
        }
    }

    pub fn optional_string(&mut self, name: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.property(name);
            self.writer.write_string(value);
        }
    }

    /// Skipped when false.
    pub fn flag(&mut self, name: &str, value: bool) {
        if value {
            self.property(name);
            self.writer.write_bool(true);
        }
    }

    /// Integral values are written without a fraction.
    pub fn number(&mut self, name: &str, value: Option<f64>) {
        let Some(value) = value else {
            return;
        };
        self.property(name);
        if value.fract() == 0.0 && value.abs() < 9.0e15 {
            self.writer.write_i64(value as i64);
        } else {
            self.writer.write_f64(value);
        }
    }

    pub fn count(&mut self, name: &str, value: Option<u64>) {
        if let Some(value) = value {
            self.property(name);
            self.writer.write_u64(value);
        }
    }

    pub fn strings(&mut self, name: &str, values: &[String]) {
        if values.is_empty() {
            return;
        }
        self.property(name);
        self.writer.write_start_array();
        for value in values {
            self.writer.write_string(value);
        }
        self.writer.write_end_array();
    }

    pub fn any(&mut self, name: &str, value: Option<&AnyValue>) {
        if let Some(value) = value {
            self.property(name);
            value.write(&mut *self.writer);
        }
    }

    pub fn any_list(&mut self, name: &str, values: &[AnyValue]) {
        if values.is_empty() {
            return;
        }
        self.property(name);
        self.writer.write_start_array();
        for value in values {
            value.write(&mut *self.writer);
        }
        self.writer.write_end_array();
    }

    pub fn extensions(&mut self, extensions: &Extensions) {
        for (name, value) in extensions {
            self.property(name);
            value.write(&mut *self.writer);
        }
    }

    pub fn object<T: WriteSpec>(&mut self, name: &str, value: Option<&T>) {
        if let Some(value) = value {
            self.property(name);
            value.write_spec(self);
        }
    }

    pub fn slot_field<T: WriteSpec + Referenceable>(&mut self, name: &str, slot: Option<&Slot<T>>) {
        if let Some(slot) = slot {
            self.property(name);
            self.slot(slot);
        }
    }

    pub fn slot_list<T: WriteSpec + Referenceable>(&mut self, name: &str, slots: &[Slot<T>]) {
        if slots.is_empty() {
            return;
        }
        self.property(name);
        self.writer.write_start_array();
        for slot in slots {
            self.slot(slot);
        }
        self.writer.write_end_array();
    }

    pub fn slot_map<T: WriteSpec + Referenceable>(
        &mut self,
        name: &str,
        slots: &IndexMap<String, Slot<T>>,
    ) {
        if slots.is_empty() {
            return;
        }
        self.property(name);
        self.writer.write_start_object();
        for (key, slot) in slots {
            self.property(key);
            self.slot(slot);
        }
        self.writer.write_end_object();
    }

    pub fn security(&mut self, name: &str, requirements: &[SecurityRequirement]) {
        if requirements.is_empty() {
            return;
        }
        self.property(name);
        self.writer.write_start_array();
        for requirement in requirements {
            self.writer.write_start_object();
            for (slot, scopes) in &requirement.schemes {
                let scheme = slot
                    .reference()
                    .and_then(|r| r.id.clone())
                    .unwrap_or_default();
                self.property(&scheme);
                self.writer.write_start_array();
                for scope in scopes {
                    self.writer.write_string(scope);
                }
                self.writer.write_end_array();
            }
            self.writer.write_end_object();
        }
        self.writer.write_end_array();
    }

    /// Write one slot: its object, a `$ref`, or the expanded target.
    pub fn slot<T: WriteSpec + Referenceable>(&mut self, slot: &Slot<T>) {
        match slot {
            Slot::Inline(value) => value.write_spec(self),
            Slot::Unresolved(reference) => self.reference(reference),
            Slot::Resolved(resolved) => {
                if !self.try_inline::<T>(&resolved.reference, &resolved.target) {
                    self.reference(&resolved.reference);
                }
            }
        }
    }

    fn try_inline<T: WriteSpec + Referenceable>(
        &mut self,
        reference: &AsyncApiReference,
        target: &ComponentKey,
    ) -> bool {
        let base = self.current_document();
        // A bare name only resolves against the root document, so names
        // bound inside another document are always written as objects.
        let foreign_name = base.is_some()
            && !reference.is_external()
            && reference.kind.is_some_and(ReferenceKind::allows_name_reference);
        let allowed = foreign_name
            || if reference.is_external() {
                self.settings.inline_external_references
            } else {
                self.settings.inline_local_references
            };
        if !allowed {
            return false;
        }
        let key = target.absolute(base.as_deref());
        if self.is_cyclic(&key) {
            return false;
        }
        let Some(found) = self.graph.deref::<T>(target, base.as_deref()) else {
            return false;
        };
        if self.is_cyclic(&found.key) || !self.loops.push(found.key.clone()) {
            return false;
        }
        self.documents.push(found.key.document.clone());
        found.value.write_spec(self);
        self.documents.pop();
        self.loops.pop();
        true
    }

    fn is_cyclic(&self, key: &ComponentKey) -> bool {
        key.kind == ReferenceKind::Schema && self.cyclic.contains(key)
    }

    fn reference(&mut self, reference: &AsyncApiReference) {
        let base = self.current_document();
        let pointer = reference.relative_to(base.as_deref()).pointer();
        if reference.kind.is_some_and(ReferenceKind::allows_name_reference)
            && !reference.is_external()
            && base.is_none()
        {
            // Name references are written back as bare names.
            self.writer.write_string(&pointer);
            return;
        }
        if base.is_some() && reference.kind.is_some_and(ReferenceKind::allows_name_reference) {
            warn!(reference = %reference, "name reference from another document written as a pointer");
        }
        self.writer.write_start_object();
        self.property(REFERENCE_KEY);
        self.writer.write_string(&pointer);
        self.writer.write_end_object();
    }
}

impl WriteSpec for Document {
    fn write_spec(&self, ctx: &mut SerializeContext<'_, '_>) {
        ctx.start_object();
        ctx.string("asyncapi", &self.asyncapi);
        ctx.optional_string("id", self.id.as_deref());
        ctx.object("info", Some(&self.info));
        ctx.optional_string("defaultContentType", self.default_content_type.as_deref());
        ctx.slot_map("servers", &self.servers);
        ctx.slot_map("channels", &self.channels);
        ctx.object("components", self.components.as_ref());
        ctx.slot_list("tags", &self.tags);
        ctx.extensions(&self.extensions);
        ctx.end_object();
    }
}

impl WriteSpec for Info {
    fn write_spec(&self, ctx: &mut SerializeContext<'_, '_>) {
        ctx.start_object();
        ctx.string("title", &self.title);
        ctx.string("version", &self.version);
        ctx.optional_string("description", self.description.as_deref());
        ctx.optional_string("termsOfService", self.terms_of_service.as_deref());
        ctx.object("contact", self.contact.as_ref());
        ctx.object("license", self.license.as_ref());
        ctx.extensions(&self.extensions);
        ctx.end_object();
    }
}

impl WriteSpec for Contact {
    fn write_spec(&self, ctx: &mut SerializeContext<'_, '_>) {
        ctx.start_object();
        ctx.optional_string("name", self.name.as_deref());
        ctx.optional_string("url", self.url.as_deref());
        ctx.optional_string("email", self.email.as_deref());
        ctx.extensions(&self.extensions);
        ctx.end_object();
    }
}

impl WriteSpec for License {
    fn write_spec(&self, ctx: &mut SerializeContext<'_, '_>) {
        ctx.start_object();
        ctx.string("name", &self.name);
        ctx.optional_string("url", self.url.as_deref());
        ctx.extensions(&self.extensions);
        ctx.end_object();
    }
}

impl WriteSpec for Server {
    fn write_spec(&self, ctx: &mut SerializeContext<'_, '_>) {
        ctx.start_object();
        ctx.string("url", &self.url);
        ctx.string("protocol", &self.protocol);
        ctx.optional_string("protocolVersion", self.protocol_version.as_deref());
        ctx.optional_string("description", self.description.as_deref());
        ctx.security("security", &self.security);
        ctx.extensions(&self.extensions);
        ctx.end_object();
    }
}

impl WriteSpec for Channel {
    fn write_spec(&self, ctx: &mut SerializeContext<'_, '_>) {
        ctx.start_object();
        ctx.optional_string("description", self.description.as_deref());
        ctx.strings("servers", &self.servers);
        ctx.object("subscribe", self.subscribe.as_ref());
        ctx.object("publish", self.publish.as_ref());
        ctx.slot_map("parameters", &self.parameters);
        ctx.extensions(&self.extensions);
        ctx.end_object();
    }
}

impl WriteSpec for Operation {
    fn write_spec(&self, ctx: &mut SerializeContext<'_, '_>) {
        ctx.start_object();
        ctx.optional_string("operationId", self.operation_id.as_deref());
        ctx.optional_string("summary", self.summary.as_deref());
        ctx.optional_string("description", self.description.as_deref());
        ctx.slot_list("tags", &self.tags);
        ctx.security("security", &self.security);
        ctx.slot_field("message", self.message.as_ref());
        ctx.extensions(&self.extensions);
        ctx.end_object();
    }
}

impl WriteSpec for Message {
    fn write_spec(&self, ctx: &mut SerializeContext<'_, '_>) {
        ctx.start_object();
        ctx.optional_string("name", self.name.as_deref());
        ctx.optional_string("title", self.title.as_deref());
        ctx.optional_string("summary", self.summary.as_deref());
        ctx.optional_string("description", self.description.as_deref());
        ctx.optional_string("contentType", self.content_type.as_deref());
        ctx.slot_field("headers", self.headers.as_ref());
        ctx.slot_field("payload", self.payload.as_ref());
        ctx.slot_field("correlationId", self.correlation_id.as_ref());
        ctx.slot_list("tags", &self.tags);
        ctx.extensions(&self.extensions);
        ctx.end_object();
    }
}

impl WriteSpec for Parameter {
    fn write_spec(&self, ctx: &mut SerializeContext<'_, '_>) {
        ctx.start_object();
        ctx.optional_string("description", self.description.as_deref());
        ctx.slot_field("schema", self.schema.as_ref());
        ctx.optional_string("location", self.location.as_deref());
        ctx.extensions(&self.extensions);
        ctx.end_object();
    }
}

impl WriteSpec for CorrelationId {
    fn write_spec(&self, ctx: &mut SerializeContext<'_, '_>) {
        ctx.start_object();
        ctx.optional_string("description", self.description.as_deref());
        ctx.string("location", &self.location);
        ctx.extensions(&self.extensions);
        ctx.end_object();
    }
}

impl WriteSpec for SecurityScheme {
    fn write_spec(&self, ctx: &mut SerializeContext<'_, '_>) {
        ctx.start_object();
        ctx.optional_string("type", self.scheme_type.display_name());
        ctx.optional_string("description", self.description.as_deref());
        ctx.optional_string("name", self.name.as_deref());
        ctx.optional_string("in", self.location.as_deref());
        ctx.optional_string("scheme", self.scheme.as_deref());
        ctx.optional_string("bearerFormat", self.bearer_format.as_deref());
        ctx.optional_string("openIdConnectUrl", self.open_id_connect_url.as_deref());
        ctx.extensions(&self.extensions);
        ctx.end_object();
    }
}

impl WriteSpec for Tag {
    fn write_spec(&self, ctx: &mut SerializeContext<'_, '_>) {
        ctx.start_object();
        ctx.string("name", &self.name);
        ctx.optional_string("description", self.description.as_deref());
        ctx.extensions(&self.extensions);
        ctx.end_object();
    }
}

impl WriteSpec for Schema {
    fn write_spec(&self, ctx: &mut SerializeContext<'_, '_>) {
        ctx.start_object();
        ctx.optional_string("title", self.title.as_deref());
        if self.type_union.is_empty() {
            ctx.optional_string("type", self.schema_type.map(|t| t.display_name()));
        } else {
            ctx.property("type");
            let writer = ctx.writer();
            writer.write_start_array();
            for schema_type in &self.type_union {
                writer.write_string(schema_type.display_name());
            }
            writer.write_end_array();
        }
        ctx.optional_string("format", self.format.as_deref());
        ctx.optional_string("description", self.description.as_deref());
        ctx.number("maximum", self.maximum);
        ctx.number("exclusiveMaximum", self.exclusive_maximum);
        ctx.number("minimum", self.minimum);
        ctx.number("exclusiveMinimum", self.exclusive_minimum);
        ctx.count("maxLength", self.max_length);
        ctx.count("minLength", self.min_length);
        ctx.optional_string("pattern", self.pattern.as_deref());
        ctx.count("maxItems", self.max_items);
        ctx.count("minItems", self.min_items);
        ctx.flag("uniqueItems", self.unique_items);
        ctx.strings("required", &self.required);
        ctx.any_list("enum", &self.enum_values);
        ctx.any("const", self.const_value.as_ref());
        ctx.any("default", self.default.as_ref());
        ctx.any_list("examples", &self.examples);
        ctx.slot_map("properties", &self.properties);
        match self.additional_properties_allowed {
            Some(allowed) => {
                ctx.property("additionalProperties");
                ctx.writer().write_bool(allowed);
            }
            None => ctx.slot_field("additionalProperties", self.additional_properties.as_ref()),
        }
        ctx.slot_field("items", self.items.as_ref());
        ctx.slot_list("allOf", &self.all_of);
        ctx.slot_list("oneOf", &self.one_of);
        ctx.slot_list("anyOf", &self.any_of);
        ctx.slot_field("not", self.not.as_ref());
        ctx.optional_string("discriminator", self.discriminator.as_deref());
        ctx.flag("deprecated", self.deprecated);
        ctx.flag("readOnly", self.read_only);
        ctx.flag("writeOnly", self.write_only);
        ctx.extensions(&self.extensions);
        ctx.end_object();
    }
}

impl WriteSpec for Components {
    fn write_spec(&self, ctx: &mut SerializeContext<'_, '_>) {
        ctx.start_object();
        ctx.slot_map("schemas", &self.schemas);
        ctx.slot_map("servers", &self.servers);
        ctx.slot_map("channels", &self.channels);
        ctx.slot_map("messages", &self.messages);
        ctx.slot_map("securitySchemes", &self.security_schemes);
        ctx.slot_map("parameters", &self.parameters);
        ctx.slot_map("correlationIds", &self.correlation_ids);
        ctx.extensions(&self.extensions);
        ctx.end_object();
    }
}

/// Writes documents, or single objects, as YAML or JSON text.
#[derive(Debug, Clone, Default)]
pub struct DocumentWriter {
    settings: WriterSettings,
}

impl DocumentWriter {
    pub fn new(settings: WriterSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &WriterSettings {
        &self.settings
    }

    /// Render `document`. References into `workspace` documents are
    /// inlined when the settings allow it.
    pub fn write(
        &self,
        document: &Document,
        workspace: Option<&dyn Workspace>,
    ) -> Result<String, WriteError> {
        let mut writer = ValueWriter::new();
        self.write_to(document, workspace, &mut writer);
        self.settings.format.render(&writer.finish())
    }

    /// Stream `document` into any [`SpecWriter`].
    pub fn write_to(
        &self,
        document: &Document,
        workspace: Option<&dyn Workspace>,
        writer: &mut dyn SpecWriter,
    ) {
        let mut graph = Graph::new(document);
        if let Some(workspace) = workspace {
            graph = graph.with_workspace(workspace);
        }
        let mut ctx = SerializeContext::new(graph, self.settings, writer);
        document.write_spec(&mut ctx);
    }

    /// Render one object that belongs to `document`, such as a single schema.
    pub fn write_element<T: WriteSpec>(
        &self,
        element: &T,
        document: &Document,
        workspace: Option<&dyn Workspace>,
    ) -> Result<String, WriteError> {
        let mut graph = Graph::new(document);
        if let Some(workspace) = workspace {
            graph = graph.with_workspace(workspace);
        }
        let mut writer = ValueWriter::new();
        {
            let mut ctx = SerializeContext::new(graph, self.settings, &mut writer);
            element.write_spec(&mut ctx);
        }
        self.settings.format.render(&writer.finish())
    }
}
