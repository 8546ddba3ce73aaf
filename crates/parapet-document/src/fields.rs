//! AsyncAPI 2.x field tables.
//!
//! One lazily built, immutable [`FieldTable`] per object type. Handlers are
//! non-capturing closures coerced to `fn` pointers.

use std::sync::OnceLock;

use indexmap::IndexMap;

use crate::any::coerce;
use crate::context::ParsingContext;
use crate::dispatch::{load, load_slot, FieldTable, Loadable};
use crate::error::ParseError;
use crate::model::{
    Channel, Components, Contact, CorrelationId, Document, Info, License, Message, Operation,
    Parameter, Referenceable, Schema, SchemaType, SecurityRequirement, SecurityScheme,
    SecuritySchemeType, Server, Tag,
};
use crate::reference::{parse_reference, ReferenceKind, Slot};
use crate::tree::ParseNode;

fn string_list(node: &ParseNode<'_>, ctx: &mut ParsingContext) -> Result<Vec<String>, ParseError> {
    node.create_simple_list(ctx, |item| item.as_scalar())
}

fn slot_list<T: Loadable + Referenceable>(
    node: &ParseNode<'_>,
    ctx: &mut ParsingContext,
) -> Result<Vec<Slot<T>>, ParseError> {
    node.create_list(ctx, |item, ctx| load_slot(item, ctx))
}

fn slot_map<T: Loadable + Referenceable>(
    node: &ParseNode<'_>,
    ctx: &mut ParsingContext,
) -> Result<IndexMap<String, Slot<T>>, ParseError> {
    node.create_map(ctx, |item, ctx| load_slot(item, ctx))
}

/// Operation and message tags: inline objects or bare tag names.
fn tag_list(node: &ParseNode<'_>, ctx: &mut ParsingContext) -> Result<Vec<Slot<Tag>>, ParseError> {
    node.create_list(ctx, |item, ctx| match item.value() {
        serde_yaml::Value::String(name) => match parse_reference(name, Some(ReferenceKind::Tag)) {
            Ok(reference) => Slot::Unresolved(reference),
            Err(e) => {
                ctx.record(&ParseError::from(e), item.pointer());
                Slot::default()
            }
        },
        _ => load_slot(item, ctx),
    })
}

/// `security: [{scheme_name: [scope, ...]}, ...]`
fn security_requirements(
    node: &ParseNode<'_>,
    ctx: &mut ParsingContext,
) -> Result<Vec<SecurityRequirement>, ParseError> {
    node.create_simple_list(ctx, |item| {
        let mut requirement = SecurityRequirement::default();
        for (name, scopes) in item.as_mapping()?.entries() {
            let reference = parse_reference(&name, Some(ReferenceKind::SecurityScheme))?;
            let scopes = if scopes.is_null() {
                Vec::new()
            } else {
                scopes
                    .as_sequence()?
                    .items()
                    .map(|scope| scope.as_scalar())
                    .collect::<Result<Vec<_>, _>>()?
            };
            requirement.schemes.push((Slot::Unresolved(reference), scopes));
        }
        Ok(requirement)
    })
}

impl Loadable for Document {
    fn field_table() -> &'static FieldTable<Self> {
        static TABLE: OnceLock<FieldTable<Document>> = OnceLock::new();
        TABLE.get_or_init(|| {
            FieldTable::<Document>::new()
                .field("asyncapi", |d, n, _| {
                    d.asyncapi = n.as_scalar()?;
                    Ok(())
                })
                .field("id", |d, n, _| {
                    d.id = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("info", |d, n, ctx| {
                    d.info = load(n, ctx);
                    Ok(())
                })
                .field("defaultContentType", |d, n, _| {
                    d.default_content_type = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("servers", |d, n, ctx| {
                    d.servers = slot_map(n, ctx)?;
                    Ok(())
                })
                .field("channels", |d, n, ctx| {
                    d.channels = slot_map(n, ctx)?;
                    Ok(())
                })
                .field("components", |d, n, ctx| {
                    d.components = Some(load(n, ctx));
                    Ok(())
                })
                .field("tags", |d, n, ctx| {
                    d.tags = slot_list(n, ctx)?;
                    Ok(())
                })
                .with_extensions()
        })
    }
}

impl Loadable for Info {
    fn field_table() -> &'static FieldTable<Self> {
        static TABLE: OnceLock<FieldTable<Info>> = OnceLock::new();
        TABLE.get_or_init(|| {
            FieldTable::<Info>::new()
                .field("title", |i, n, _| {
                    i.title = n.as_scalar()?;
                    Ok(())
                })
                .field("version", |i, n, _| {
                    i.version = n.as_scalar()?;
                    Ok(())
                })
                .field("description", |i, n, _| {
                    i.description = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("termsOfService", |i, n, _| {
                    i.terms_of_service = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("contact", |i, n, ctx| {
                    i.contact = Some(load(n, ctx));
                    Ok(())
                })
                .field("license", |i, n, ctx| {
                    i.license = Some(load(n, ctx));
                    Ok(())
                })
                .with_extensions()
        })
    }
}

impl Loadable for Contact {
    fn field_table() -> &'static FieldTable<Self> {
        static TABLE: OnceLock<FieldTable<Contact>> = OnceLock::new();
        TABLE.get_or_init(|| {
            FieldTable::<Contact>::new()
                .field("name", |c, n, _| {
                    c.name = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("url", |c, n, _| {
                    c.url = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("email", |c, n, _| {
                    c.email = Some(n.as_scalar()?);
                    Ok(())
                })
                .with_extensions()
        })
    }
}

impl Loadable for License {
    fn field_table() -> &'static FieldTable<Self> {
        static TABLE: OnceLock<FieldTable<License>> = OnceLock::new();
        TABLE.get_or_init(|| {
            FieldTable::<License>::new()
                .field("name", |l, n, _| {
                    l.name = n.as_scalar()?;
                    Ok(())
                })
                .field("url", |l, n, _| {
                    l.url = Some(n.as_scalar()?);
                    Ok(())
                })
                .with_extensions()
        })
    }
}

impl Loadable for Server {
    fn field_table() -> &'static FieldTable<Self> {
        static TABLE: OnceLock<FieldTable<Server>> = OnceLock::new();
        TABLE.get_or_init(|| {
            FieldTable::<Server>::new()
                .field("url", |s, n, _| {
                    s.url = n.as_scalar()?;
                    Ok(())
                })
                .field("protocol", |s, n, _| {
                    s.protocol = n.as_scalar()?;
                    Ok(())
                })
                .field("protocolVersion", |s, n, _| {
                    s.protocol_version = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("description", |s, n, _| {
                    s.description = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("security", |s, n, ctx| {
                    s.security = security_requirements(n, ctx)?;
                    Ok(())
                })
                .with_extensions()
        })
    }
}

impl Loadable for Channel {
    fn field_table() -> &'static FieldTable<Self> {
        static TABLE: OnceLock<FieldTable<Channel>> = OnceLock::new();
        TABLE.get_or_init(|| {
            FieldTable::<Channel>::new()
                .field("description", |c, n, _| {
                    c.description = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("servers", |c, n, ctx| {
                    c.servers = string_list(n, ctx)?;
                    Ok(())
                })
                .field("subscribe", |c, n, ctx| {
                    c.subscribe = Some(load(n, ctx));
                    Ok(())
                })
                .field("publish", |c, n, ctx| {
                    c.publish = Some(load(n, ctx));
                    Ok(())
                })
                .field("parameters", |c, n, ctx| {
                    c.parameters = slot_map(n, ctx)?;
                    Ok(())
                })
                .with_extensions()
        })
    }
}

impl Loadable for Operation {
    fn field_table() -> &'static FieldTable<Self> {
        static TABLE: OnceLock<FieldTable<Operation>> = OnceLock::new();
        TABLE.get_or_init(|| {
            FieldTable::<Operation>::new()
                .field("operationId", |o, n, _| {
                    o.operation_id = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("summary", |o, n, _| {
                    o.summary = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("description", |o, n, _| {
                    o.description = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("tags", |o, n, ctx| {
                    o.tags = tag_list(n, ctx)?;
                    Ok(())
                })
                .field("security", |o, n, ctx| {
                    o.security = security_requirements(n, ctx)?;
                    Ok(())
                })
                .field("message", |o, n, ctx| {
                    o.message = Some(load_slot(n, ctx));
                    Ok(())
                })
                .with_extensions()
        })
    }
}

impl Loadable for Message {
    fn field_table() -> &'static FieldTable<Self> {
        static TABLE: OnceLock<FieldTable<Message>> = OnceLock::new();
        TABLE.get_or_init(|| {
            FieldTable::<Message>::new()
                .field("name", |m, n, _| {
                    m.name = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("title", |m, n, _| {
                    m.title = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("summary", |m, n, _| {
                    m.summary = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("description", |m, n, _| {
                    m.description = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("contentType", |m, n, _| {
                    m.content_type = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("headers", |m, n, ctx| {
                    m.headers = Some(load_slot(n, ctx));
                    Ok(())
                })
                .field("payload", |m, n, ctx| {
                    m.payload = Some(load_slot(n, ctx));
                    Ok(())
                })
                .field("correlationId", |m, n, ctx| {
                    m.correlation_id = Some(load_slot(n, ctx));
                    Ok(())
                })
                .field("tags", |m, n, ctx| {
                    m.tags = tag_list(n, ctx)?;
                    Ok(())
                })
                .with_extensions()
        })
    }
}

impl Loadable for Parameter {
    fn field_table() -> &'static FieldTable<Self> {
        static TABLE: OnceLock<FieldTable<Parameter>> = OnceLock::new();
        TABLE.get_or_init(|| {
            FieldTable::<Parameter>::new()
                .field("description", |p, n, _| {
                    p.description = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("schema", |p, n, ctx| {
                    p.schema = Some(load_slot(n, ctx));
                    Ok(())
                })
                .field("location", |p, n, _| {
                    p.location = Some(n.as_scalar()?);
                    Ok(())
                })
                .with_extensions()
        })
    }
}

impl Loadable for CorrelationId {
    fn field_table() -> &'static FieldTable<Self> {
        static TABLE: OnceLock<FieldTable<CorrelationId>> = OnceLock::new();
        TABLE.get_or_init(|| {
            FieldTable::<CorrelationId>::new()
                .field("description", |c, n, _| {
                    c.description = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("location", |c, n, _| {
                    c.location = n.as_scalar()?;
                    Ok(())
                })
                .with_extensions()
        })
    }
}

impl Loadable for SecurityScheme {
    fn field_table() -> &'static FieldTable<Self> {
        static TABLE: OnceLock<FieldTable<SecurityScheme>> = OnceLock::new();
        TABLE.get_or_init(|| {
            FieldTable::<SecurityScheme>::new()
                .field("type", |s, n, _| {
                    s.scheme_type = SecuritySchemeType::from_display_name(&n.as_scalar()?);
                    Ok(())
                })
                .field("description", |s, n, _| {
                    s.description = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("name", |s, n, _| {
                    s.name = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("in", |s, n, _| {
                    s.location = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("scheme", |s, n, _| {
                    s.scheme = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("bearerFormat", |s, n, _| {
                    s.bearer_format = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("openIdConnectUrl", |s, n, _| {
                    s.open_id_connect_url = Some(n.as_scalar()?);
                    Ok(())
                })
                .with_extensions()
        })
    }
}

impl Loadable for Tag {
    fn field_table() -> &'static FieldTable<Self> {
        static TABLE: OnceLock<FieldTable<Tag>> = OnceLock::new();
        TABLE.get_or_init(|| {
            FieldTable::<Tag>::new()
                .field("name", |t, n, _| {
                    t.name = n.as_scalar()?;
                    Ok(())
                })
                .field("description", |t, n, _| {
                    t.description = Some(n.as_scalar()?);
                    Ok(())
                })
                .with_extensions()
        })
    }
}

impl Loadable for Schema {
    fn field_table() -> &'static FieldTable<Self> {
        static TABLE: OnceLock<FieldTable<Schema>> = OnceLock::new();
        TABLE.get_or_init(|| {
            FieldTable::<Schema>::new()
                .field("title", |s, n, _| {
                    s.title = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("type", |s, n, ctx| {
                    if let serde_yaml::Value::Sequence(_) = n.value() {
                        s.type_union = n.create_simple_list(ctx, |item| {
                            Ok(SchemaType::from_display_name(&item.as_scalar()?))
                        })?
                        .into_iter()
                        .flatten()
                        .collect();
                        s.schema_type = s
                            .type_union
                            .iter()
                            .copied()
                            .find(|t| *t != SchemaType::Null)
                            .or_else(|| s.type_union.first().copied());
                    } else {
                        s.schema_type = SchemaType::from_display_name(&n.as_scalar()?);
                    }
                    Ok(())
                })
                .field("format", |s, n, _| {
                    s.format = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("description", |s, n, _| {
                    s.description = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("maximum", |s, n, _| {
                    s.maximum = Some(n.as_f64()?);
                    Ok(())
                })
                .field("exclusiveMaximum", |s, n, _| {
                    s.exclusive_maximum = Some(n.as_f64()?);
                    Ok(())
                })
                .field("minimum", |s, n, _| {
                    s.minimum = Some(n.as_f64()?);
                    Ok(())
                })
                .field("exclusiveMinimum", |s, n, _| {
                    s.exclusive_minimum = Some(n.as_f64()?);
                    Ok(())
                })
                .field("maxLength", |s, n, _| {
                    s.max_length = Some(n.as_u64()?);
                    Ok(())
                })
                .field("minLength", |s, n, _| {
                    s.min_length = Some(n.as_u64()?);
                    Ok(())
                })
                .field("pattern", |s, n, _| {
                    s.pattern = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("maxItems", |s, n, _| {
                    s.max_items = Some(n.as_u64()?);
                    Ok(())
                })
                .field("minItems", |s, n, _| {
                    s.min_items = Some(n.as_u64()?);
                    Ok(())
                })
                .field("uniqueItems", |s, n, _| {
                    s.unique_items = n.as_bool()?;
                    Ok(())
                })
                .field("required", |s, n, ctx| {
                    s.required = string_list(n, ctx)?;
                    Ok(())
                })
                .field("enum", |s, n, _| {
                    s.enum_values = n.as_sequence()?.items().map(|item| item.as_any()).collect();
                    Ok(())
                })
                .field("const", |s, n, _| {
                    s.const_value = Some(n.as_any());
                    Ok(())
                })
                .field("default", |s, n, _| {
                    s.default = Some(n.as_any());
                    Ok(())
                })
                .field("examples", |s, n, _| {
                    s.examples = n.as_sequence()?.items().map(|item| item.as_any()).collect();
                    Ok(())
                })
                .field("properties", |s, n, ctx| {
                    s.properties = slot_map(n, ctx)?;
                    Ok(())
                })
                .field("additionalProperties", |s, n, ctx| {
                    match n.value() {
                        serde_yaml::Value::Bool(allowed) => {
                            s.additional_properties_allowed = Some(*allowed)
                        }
                        _ => s.additional_properties = Some(load_slot(n, ctx)),
                    }
                    Ok(())
                })
                .field("items", |s, n, ctx| {
                    s.items = Some(load_slot(n, ctx));
                    Ok(())
                })
                .field("allOf", |s, n, ctx| {
                    s.all_of = slot_list(n, ctx)?;
                    Ok(())
                })
                .field("oneOf", |s, n, ctx| {
                    s.one_of = slot_list(n, ctx)?;
                    Ok(())
                })
                .field("anyOf", |s, n, ctx| {
                    s.any_of = slot_list(n, ctx)?;
                    Ok(())
                })
                .field("not", |s, n, ctx| {
                    s.not = Some(load_slot(n, ctx));
                    Ok(())
                })
                .field("discriminator", |s, n, _| {
                    s.discriminator = Some(n.as_scalar()?);
                    Ok(())
                })
                .field("deprecated", |s, n, _| {
                    s.deprecated = n.as_bool()?;
                    Ok(())
                })
                .field("readOnly", |s, n, _| {
                    s.read_only = n.as_bool()?;
                    Ok(())
                })
                .field("writeOnly", |s, n, _| {
                    s.write_only = n.as_bool()?;
                    Ok(())
                })
                .with_extensions()
        })
    }

    /// Narrow `default`, `examples`, `enum` and `const` to this schema's type.
    fn finish(&mut self, node: &ParseNode<'_>, ctx: &mut ParsingContext) {
        let pointer = node.pointer();
        if let Some(value) = self.default.take() {
            let value = coerce(value, Some(&*self), &format!("{pointer}/default"), ctx.diagnostic_mut());
            self.default = Some(value);
        }
        if let Some(value) = self.const_value.take() {
            let value = coerce(value, Some(&*self), &format!("{pointer}/const"), ctx.diagnostic_mut());
            self.const_value = Some(value);
        }
        let examples = std::mem::take(&mut self.examples);
        self.examples = examples
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                coerce(value, Some(&*self), &format!("{pointer}/examples/{i}"), ctx.diagnostic_mut())
            })
            .collect();
        let values = std::mem::take(&mut self.enum_values);
        self.enum_values = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                coerce(value, Some(&*self), &format!("{pointer}/enum/{i}"), ctx.diagnostic_mut())
            })
            .collect();
    }
}

impl Loadable for Components {
    fn field_table() -> &'static FieldTable<Self> {
        static TABLE: OnceLock<FieldTable<Components>> = OnceLock::new();
        TABLE.get_or_init(|| {
            FieldTable::<Components>::new()
                .field("schemas", |c, n, ctx| {
                    c.schemas = slot_map(n, ctx)?;
                    Ok(())
                })
                .field("servers", |c, n, ctx| {
                    c.servers = slot_map(n, ctx)?;
                    Ok(())
                })
                .field("channels", |c, n, ctx| {
                    c.channels = slot_map(n, ctx)?;
                    Ok(())
                })
                .field("messages", |c, n, ctx| {
                    c.messages = slot_map(n, ctx)?;
                    Ok(())
                })
                .field("securitySchemes", |c, n, ctx| {
                    c.security_schemes = slot_map(n, ctx)?;
                    Ok(())
                })
                .field("parameters", |c, n, ctx| {
                    c.parameters = slot_map(n, ctx)?;
                    Ok(())
                })
                .field("correlationIds", |c, n, ctx| {
                    c.correlation_ids = slot_map(n, ctx)?;
                    Ok(())
                })
                .with_extensions()
        })
    }
}
