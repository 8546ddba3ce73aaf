//! Typed AsyncAPI 2.x object graph.
//!
//! Every position that may hold a `$ref` is a [`Slot`]. Reusable objects live
//! once in [`Components`] and are addressed by [`ComponentKey`](crate::ComponentKey),
//! so cyclic schemas are just repeated keys.

use indexmap::IndexMap;

use crate::any::AnyValue;
use crate::reference::{ReferenceKind, Slot};
use crate::walker::Node;

/// `x-*` entries of an object.
pub type Extensions = IndexMap<String, AnyValue>;

/// Objects that carry an extension bucket.
pub trait Extensible {
    fn extensions(&self) -> &Extensions;
    fn extensions_mut(&mut self) -> &mut Extensions;
}

/// Objects that can be the target of a reference.
pub trait Referenceable: Sized + 'static {
    const KIND: ReferenceKind;

    /// Look up the entry with `id` in `document`.
    fn lookup<'d>(document: &'d Document, id: &str) -> Option<&'d Slot<Self>>;

    fn node(&self) -> Node<'_>;
}

/// Root of an AsyncAPI document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub asyncapi: String,
    pub id: Option<String>,
    pub info: Info,
    pub default_content_type: Option<String>,
    pub servers: IndexMap<String, Slot<Server>>,
    pub channels: IndexMap<String, Slot<Channel>>,
    pub components: Option<Components>,
    pub tags: Vec<Slot<Tag>>,
    pub extensions: Extensions,
}

impl Document {
    /// Component entry by kind and id, without following aliases.
    pub fn component<T: Referenceable>(&self, id: &str) -> Option<&Slot<T>> {
        T::lookup(self, id)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Info {
    pub title: String,
    pub version: String,
    pub description: Option<String>,
    pub terms_of_service: Option<String>,
    pub contact: Option<Contact>,
    pub license: Option<License>,
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contact {
    pub name: Option<String>,
    pub url: Option<String>,
    pub email: Option<String>,
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct License {
    pub name: String,
    pub url: Option<String>,
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Server {
    pub url: String,
    pub protocol: String,
    pub protocol_version: Option<String>,
    pub description: Option<String>,
    pub security: Vec<SecurityRequirement>,
    pub extensions: Extensions,
}

/// A channel item: the operations available on one address.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Channel {
    pub description: Option<String>,
    pub servers: Vec<String>,
    pub subscribe: Option<Operation>,
    pub publish: Option<Operation>,
    pub parameters: IndexMap<String, Slot<Parameter>>,
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Operation {
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<Slot<Tag>>,
    pub security: Vec<SecurityRequirement>,
    pub message: Option<Slot<Message>>,
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub name: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub content_type: Option<String>,
    pub headers: Option<Slot<Schema>>,
    pub payload: Option<Slot<Schema>>,
    pub correlation_id: Option<Slot<CorrelationId>>,
    pub tags: Vec<Slot<Tag>>,
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameter {
    pub description: Option<String>,
    pub schema: Option<Slot<Schema>>,
    pub location: Option<String>,
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrelationId {
    pub description: Option<String>,
    pub location: String,
    pub extensions: Extensions,
}

/// Security scheme `type`. Unrecognized names map to `Unknown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SecuritySchemeType {
    UserPassword,
    ApiKey,
    X509,
    SymmetricEncryption,
    AsymmetricEncryption,
    HttpApiKey,
    Http,
    OAuth2,
    OpenIdConnect,
    Plain,
    ScramSha256,
    ScramSha512,
    Gssapi,
    #[default]
    Unknown,
}

const SECURITY_SCHEME_TYPES: &[(&str, SecuritySchemeType)] = &[
    ("userPassword", SecuritySchemeType::UserPassword),
    ("apiKey", SecuritySchemeType::ApiKey),
    ("X509", SecuritySchemeType::X509),
    ("symmetricEncryption", SecuritySchemeType::SymmetricEncryption),
    ("asymmetricEncryption", SecuritySchemeType::AsymmetricEncryption),
    ("httpApiKey", SecuritySchemeType::HttpApiKey),
    ("http", SecuritySchemeType::Http),
    ("oauth2", SecuritySchemeType::OAuth2),
    ("openIdConnect", SecuritySchemeType::OpenIdConnect),
    ("plain", SecuritySchemeType::Plain),
    ("scramSha256", SecuritySchemeType::ScramSha256),
    ("scramSha512", SecuritySchemeType::ScramSha512),
    ("gssapi", SecuritySchemeType::Gssapi),
];

impl SecuritySchemeType {
    pub fn from_display_name(name: &str) -> Self {
        SECURITY_SCHEME_TYPES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, t)| *t)
            .unwrap_or_default()
    }

    pub fn display_name(self) -> Option<&'static str> {
        SECURITY_SCHEME_TYPES
            .iter()
            .find(|(_, t)| *t == self)
            .map(|(n, _)| *n)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecurityScheme {
    pub scheme_type: SecuritySchemeType,
    pub description: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub scheme: Option<String>,
    pub bearer_format: Option<String>,
    pub open_id_connect_url: Option<String>,
    pub extensions: Extensions,
}

/// One alternative of a `security` list: scheme name references and their scopes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecurityRequirement {
    pub schemes: Vec<(Slot<SecurityScheme>, Vec<String>)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tag {
    pub name: String,
    pub description: Option<String>,
    pub extensions: Extensions,
}

/// JSON Schema `type` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Null,
}

impl SchemaType {
    pub fn from_display_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(SchemaType::String),
            "number" => Some(SchemaType::Number),
            "integer" => Some(SchemaType::Integer),
            "boolean" => Some(SchemaType::Boolean),
            "array" => Some(SchemaType::Array),
            "object" => Some(SchemaType::Object),
            "null" => Some(SchemaType::Null),
            _ => None,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Number => "number",
            SchemaType::Integer => "integer",
            SchemaType::Boolean => "boolean",
            SchemaType::Array => "array",
            SchemaType::Object => "object",
            SchemaType::Null => "null",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub title: Option<String>,
    /// The single `type`, or the first non-null member of a union.
    pub schema_type: Option<SchemaType>,
    /// Every member of a `type: [string, "null"]` union; empty for a single name.
    pub type_union: Vec<SchemaType>,
    pub format: Option<String>,
    pub description: Option<String>,
    pub maximum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub minimum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub max_length: Option<u64>,
    pub min_length: Option<u64>,
    pub pattern: Option<String>,
    pub max_items: Option<u64>,
    pub min_items: Option<u64>,
    pub unique_items: bool,
    pub required: Vec<String>,
    pub enum_values: Vec<AnyValue>,
    pub const_value: Option<AnyValue>,
    pub default: Option<AnyValue>,
    pub examples: Vec<AnyValue>,
    pub properties: IndexMap<String, Slot<Schema>>,
    /// Schema form of `additionalProperties`.
    pub additional_properties: Option<Slot<Schema>>,
    /// Boolean form of `additionalProperties`.
    pub additional_properties_allowed: Option<bool>,
    pub items: Option<Slot<Schema>>,
    pub all_of: Vec<Slot<Schema>>,
    pub one_of: Vec<Slot<Schema>>,
    pub any_of: Vec<Slot<Schema>>,
    pub not: Option<Slot<Schema>>,
    pub discriminator: Option<String>,
    pub deprecated: bool,
    pub read_only: bool,
    pub write_only: bool,
    pub extensions: Extensions,
}

/// Arena of reusable objects, keyed by kind then id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Components {
    pub schemas: IndexMap<String, Slot<Schema>>,
    pub servers: IndexMap<String, Slot<Server>>,
    pub channels: IndexMap<String, Slot<Channel>>,
    pub messages: IndexMap<String, Slot<Message>>,
    pub security_schemes: IndexMap<String, Slot<SecurityScheme>>,
    pub parameters: IndexMap<String, Slot<Parameter>>,
    pub correlation_ids: IndexMap<String, Slot<CorrelationId>>,
    pub extensions: Extensions,
}

impl Components {
    /// `None` when `kind` has no sub-map here.
    pub fn contains(&self, kind: ReferenceKind, id: &str) -> Option<bool> {
        let found = match kind {
            ReferenceKind::Schema => self.schemas.contains_key(id),
            ReferenceKind::Server => self.servers.contains_key(id),
            ReferenceKind::Channel => self.channels.contains_key(id),
            ReferenceKind::Message => self.messages.contains_key(id),
            ReferenceKind::SecurityScheme => self.security_schemes.contains_key(id),
            ReferenceKind::Parameter => self.parameters.contains_key(id),
            ReferenceKind::CorrelationId => self.correlation_ids.contains_key(id),
            ReferenceKind::Tag => return None,
        };
        Some(found)
    }
}

macro_rules! extensible {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Extensible for $ty {
                fn extensions(&self) -> &Extensions {
                    &self.extensions
                }

                fn extensions_mut(&mut self) -> &mut Extensions {
                    &mut self.extensions
                }
            }
        )*
    };
}

extensible!(
    Document,
    Info,
    Contact,
    License,
    Server,
    Channel,
    Operation,
    Message,
    Parameter,
    CorrelationId,
    SecurityScheme,
    Tag,
    Schema,
    Components,
);

macro_rules! component {
    ($ty:ident, $kind:ident, $field:ident) => {
        impl Referenceable for $ty {
            const KIND: ReferenceKind = ReferenceKind::$kind;

            fn lookup<'d>(document: &'d Document, id: &str) -> Option<&'d Slot<Self>> {
                document.components.as_ref()?.$field.get(id)
            }

            fn node(&self) -> Node<'_> {
                Node::$ty(self)
            }
        }
    };
}

component!(Schema, Schema, schemas);
component!(Server, Server, servers);
component!(Channel, Channel, channels);
component!(Message, Message, messages);
component!(SecurityScheme, SecurityScheme, security_schemes);
component!(Parameter, Parameter, parameters);
component!(CorrelationId, CorrelationId, correlation_ids);

impl Referenceable for Tag {
    const KIND: ReferenceKind = ReferenceKind::Tag;

    /// Tags are a list on the document, matched by name.
    fn lookup<'d>(document: &'d Document, id: &str) -> Option<&'d Slot<Self>> {
        document
            .tags
            .iter()
            .find(|slot| slot.as_inline().is_some_and(|tag| tag.name == id))
    }

    fn node(&self) -> Node<'_> {
        Node::Tag(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_lookups_fall_back_to_sentinels() {
        assert_eq!(
            SecuritySchemeType::from_display_name("oauth2"),
            SecuritySchemeType::OAuth2
        );
        assert_eq!(
            SecuritySchemeType::from_display_name("kerberos"),
            SecuritySchemeType::Unknown
        );
        assert_eq!(SecuritySchemeType::Unknown.display_name(), None);
        assert_eq!(SchemaType::from_display_name("integer"), Some(SchemaType::Integer));
        assert_eq!(SchemaType::from_display_name("int"), None);
    }

    #[test]
    fn tags_are_found_by_name() {
        let document = Document {
            tags: vec![Slot::inline(Tag {
                name: "user".into(),
                ..Tag::default()
            })],
            ..Document::default()
        };
        assert!(document.component::<Tag>("user").is_some());
        assert!(document.component::<Tag>("admin").is_none());
        assert!(document.component::<Schema>("user").is_none());
    }

    #[test]
    fn components_contains_by_kind() {
        let mut components = Components::default();
        components
            .schemas
            .insert("Pet".into(), Slot::inline(Schema::default()));
        assert_eq!(components.contains(ReferenceKind::Schema, "Pet"), Some(true));
        assert_eq!(components.contains(ReferenceKind::Message, "Pet"), Some(false));
        assert_eq!(components.contains(ReferenceKind::Tag, "Pet"), None);
    }
}
