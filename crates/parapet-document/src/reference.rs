//! Reference pointers and the slots that carry them.
//!
//! First-pass parsing stores a [`Slot::Unresolved`] wherever a `$ref` appears.
//! Resolution later swaps it for a [`Slot::Resolved`] handle addressing the
//! target component by [`ComponentKey`]; targets are never copied into the slot.

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;

use crate::error::ReferenceError;
use crate::tree::{escape_segment, unescape_segment};

/// Component categories a reference can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ReferenceKind {
    Schema,
    Server,
    Channel,
    Message,
    SecurityScheme,
    Parameter,
    CorrelationId,
    Tag,
}

/// `components` sub-map names. Tags are addressed by name and have none.
const KIND_SEGMENTS: &[(&str, ReferenceKind)] = &[
    ("schemas", ReferenceKind::Schema),
    ("servers", ReferenceKind::Server),
    ("channels", ReferenceKind::Channel),
    ("messages", ReferenceKind::Message),
    ("securitySchemes", ReferenceKind::SecurityScheme),
    ("parameters", ReferenceKind::Parameter),
    ("correlationIds", ReferenceKind::CorrelationId),
];

impl ReferenceKind {
    pub fn from_segment(segment: &str) -> Option<Self> {
        KIND_SEGMENTS
            .iter()
            .find(|(name, _)| *name == segment)
            .map(|(_, kind)| *kind)
    }

    pub fn segment(self) -> Option<&'static str> {
        KIND_SEGMENTS
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(name, _)| *name)
    }

    /// Kinds that may be referenced by bare name (`security: [{petstore_auth: []}]`).
    pub fn allows_name_reference(self) -> bool {
        matches!(self, ReferenceKind::Tag | ReferenceKind::SecurityScheme)
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReferenceKind::Schema => "schema",
            ReferenceKind::Server => "server",
            ReferenceKind::Channel => "channel",
            ReferenceKind::Message => "message",
            ReferenceKind::SecurityScheme => "security scheme",
            ReferenceKind::Parameter => "parameter",
            ReferenceKind::CorrelationId => "correlation id",
            ReferenceKind::Tag => "tag",
        })
    }
}

/// A parsed pointer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AsyncApiReference {
    pub kind: Option<ReferenceKind>,
    pub id: Option<String>,
    /// File or URL of another document; `None` for local pointers.
    pub external_resource: Option<String>,
    /// Raw fragment of an external pointer, kept so it can be written back verbatim.
    pub fragment: Option<String>,
}

impl AsyncApiReference {
    /// A local `#/components/{kind}/{id}` (or bare-name) reference.
    pub fn local(kind: ReferenceKind, id: impl Into<String>) -> Self {
        Self {
            kind: Some(kind),
            id: Some(id.into()),
            external_resource: None,
            fragment: None,
        }
    }

    pub fn is_external(&self) -> bool {
        self.external_resource.is_some()
    }

    /// Pointer text for this reference.
    pub fn pointer(&self) -> String {
        if let Some(resource) = &self.external_resource {
            return match &self.fragment {
                Some(fragment) => format!("{}#{}", resource, fragment),
                None => resource.clone(),
            };
        }
        match (self.kind, self.id.as_deref()) {
            (Some(kind), Some(id)) => match kind.segment() {
                Some(segment) => format!("#/components/{}/{}", segment, escape_segment(id)),
                None => id.to_string(),
            },
            (None, Some(id)) => id.to_string(),
            _ => "#".to_string(),
        }
    }

    /// The same target, as seen from inside its own document.
    pub(crate) fn localized(&self) -> AsyncApiReference {
        AsyncApiReference {
            kind: self.kind,
            id: self.id.clone(),
            external_resource: None,
            fragment: None,
        }
    }

    /// Re-anchor a local component pointer to `base` when it is written from
    /// outside its own document.
    pub(crate) fn relative_to(&self, base: Option<&str>) -> Cow<'_, AsyncApiReference> {
        let (Some(base), None) = (base, &self.external_resource) else {
            return Cow::Borrowed(self);
        };
        match (self.kind.and_then(ReferenceKind::segment), &self.id) {
            (Some(segment), Some(id)) => Cow::Owned(AsyncApiReference {
                kind: self.kind,
                id: Some(id.clone()),
                external_resource: Some(base.to_string()),
                fragment: Some(format!("/components/{}/{}", segment, escape_segment(id))),
            }),
            _ => Cow::Borrowed(self),
        }
    }
}

impl fmt::Display for AsyncApiReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pointer())
    }
}

/// Parse pointer text.
///
/// - `Pet.yaml`: whole external document, or a bare name when `expected`
///   is a tag or security scheme.
/// - `#/components/schemas/Pet`: local component.
/// - `common.yaml#/components/schemas/Pet`: component of another document;
///   kind and id are the 3rd and 4th fragment segments.
/// - `common.yaml#/Pet`: external anchor; id is the fragment text.
pub fn parse_reference(
    pointer: &str,
    expected: Option<ReferenceKind>,
) -> Result<AsyncApiReference, ReferenceError> {
    let segments: Vec<&str> = pointer.split('#').collect();
    match segments.as_slice() {
        [whole] => {
            if whole.is_empty() {
                return Err(ReferenceError::invalid(pointer, "empty pointer"));
            }
            if let Some(kind) = expected.filter(|k| k.allows_name_reference()) {
                return Ok(AsyncApiReference::local(kind, *whole));
            }
            Ok(AsyncApiReference {
                external_resource: Some(whole.to_string()),
                ..AsyncApiReference::default()
            })
        }
        ["", fragment] => parse_local(pointer, fragment),
        [resource, fragment] => parse_external(pointer, resource, fragment, expected),
        _ => Err(ReferenceError::invalid(pointer, "more than one '#'")),
    }
}

fn parse_local(pointer: &str, fragment: &str) -> Result<AsyncApiReference, ReferenceError> {
    let parts: Vec<&str> = fragment.split('/').collect();
    match parts.as_slice() {
        ["", "components", segment, id] if !id.is_empty() => {
            let kind = ReferenceKind::from_segment(segment)
                .ok_or_else(|| ReferenceError::invalid(pointer, "unknown component kind"))?;
            Ok(AsyncApiReference::local(kind, unescape_segment(id)))
        }
        _ => Err(ReferenceError::invalid(
            pointer,
            "expected '#/components/{kind}/{id}'",
        )),
    }
}

fn parse_external(
    pointer: &str,
    resource: &str,
    fragment: &str,
    expected: Option<ReferenceKind>,
) -> Result<AsyncApiReference, ReferenceError> {
    if fragment.starts_with("/components/") {
        let parts: Vec<&str> = fragment.split('/').collect();
        let kind = parts
            .get(2)
            .and_then(|segment| ReferenceKind::from_segment(segment))
            .ok_or_else(|| ReferenceError::invalid(pointer, "unknown component kind"))?;
        let id = parts
            .get(3)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ReferenceError::invalid(pointer, "missing component id"))?;
        return Ok(AsyncApiReference {
            kind: Some(kind),
            id: Some(unescape_segment(id).into_owned()),
            external_resource: Some(resource.to_string()),
            fragment: Some(fragment.to_string()),
        });
    }

    let id = fragment.strip_prefix('/').unwrap_or(fragment);
    Ok(AsyncApiReference {
        kind: expected,
        id: (!id.is_empty()).then(|| id.to_string()),
        external_resource: Some(resource.to_string()),
        fragment: Some(fragment.to_string()),
    })
}

/// Address of a component: which document, which sub-map, which entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ComponentKey {
    /// `None` means the document the key was bound in.
    pub document: Option<String>,
    pub kind: ReferenceKind,
    pub id: String,
}

impl ComponentKey {
    pub fn local(kind: ReferenceKind, id: impl Into<String>) -> Self {
        Self {
            document: None,
            kind,
            id: id.into(),
        }
    }

    /// Fill in the document from `base` when the key is relative.
    pub fn absolute(&self, base: Option<&str>) -> ComponentKey {
        ComponentKey {
            document: self.document.clone().or_else(|| base.map(str::to_string)),
            kind: self.kind,
            id: self.id.clone(),
        }
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(document) = &self.document {
            write!(f, "{}:", document)?;
        }
        write!(f, "{} '{}'", self.kind, self.id)
    }
}

/// A reference that has been bound to its target.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedReference {
    pub reference: AsyncApiReference,
    pub target: ComponentKey,
}

/// Any position in the model that may hold a `$ref`.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot<T> {
    Inline(Box<T>),
    Unresolved(AsyncApiReference),
    Resolved(ResolvedReference),
}

impl<T: Default> Default for Slot<T> {
    fn default() -> Self {
        Slot::Inline(Box::default())
    }
}

impl<T> Slot<T> {
    pub fn inline(value: T) -> Self {
        Slot::Inline(Box::new(value))
    }

    pub fn as_inline(&self) -> Option<&T> {
        match self {
            Slot::Inline(value) => Some(&**value),
            _ => None,
        }
    }

    pub fn reference(&self) -> Option<&AsyncApiReference> {
        match self {
            Slot::Inline(_) => None,
            Slot::Unresolved(reference) => Some(reference),
            Slot::Resolved(resolved) => Some(&resolved.reference),
        }
    }

    pub fn target(&self) -> Option<&ComponentKey> {
        match self {
            Slot::Resolved(resolved) => Some(&resolved.target),
            _ => None,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, Slot::Unresolved(_))
    }

    /// Replace an unresolved placeholder with a handle. Other states are kept.
    pub fn bind(&mut self, target: ComponentKey) -> bool {
        let Slot::Unresolved(reference) = self else {
            return false;
        };
        let reference = std::mem::take(reference);
        *self = Slot::Resolved(ResolvedReference { reference, target });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_component_pointer() {
        let r = parse_reference("#/components/schemas/Pet", Some(ReferenceKind::Schema)).unwrap();
        assert_eq!(r, AsyncApiReference::local(ReferenceKind::Schema, "Pet"));
        assert_eq!(r.pointer(), "#/components/schemas/Pet");
    }

    #[test]
    fn bare_file_is_whole_document_reference() {
        let r = parse_reference("Pet.json", None).unwrap();
        assert_eq!(r.kind, None);
        assert_eq!(r.id, None);
        assert_eq!(r.external_resource.as_deref(), Some("Pet.json"));
        assert_eq!(r.pointer(), "Pet.json");
    }

    #[test]
    fn external_anchor_keeps_fragment_text() {
        let r = parse_reference("external.yaml#/Pet", Some(ReferenceKind::Schema)).unwrap();
        assert_eq!(r.kind, Some(ReferenceKind::Schema));
        assert_eq!(r.id.as_deref(), Some("Pet"));
        assert_eq!(r.external_resource.as_deref(), Some("external.yaml"));
        assert_eq!(r.pointer(), "external.yaml#/Pet");
    }

    #[test]
    fn external_component_takes_kind_from_fragment() {
        let r = parse_reference(
            "common.yaml#/components/messages/UserSignedUp",
            Some(ReferenceKind::Schema),
        )
        .unwrap();
        assert_eq!(r.kind, Some(ReferenceKind::Message));
        assert_eq!(r.id.as_deref(), Some("UserSignedUp"));
        assert_eq!(r.external_resource.as_deref(), Some("common.yaml"));
        assert_eq!(r.pointer(), "common.yaml#/components/messages/UserSignedUp");
    }

    #[test]
    fn name_references_for_tags_and_security_schemes() {
        let r = parse_reference("tagName", Some(ReferenceKind::Tag)).unwrap();
        assert_eq!(r, AsyncApiReference::local(ReferenceKind::Tag, "tagName"));
        assert_eq!(r.pointer(), "tagName");

        let r = parse_reference("petstore_auth", Some(ReferenceKind::SecurityScheme)).unwrap();
        assert_eq!(r.kind, Some(ReferenceKind::SecurityScheme));
        assert_eq!(r.id.as_deref(), Some("petstore_auth"));
        assert!(!r.is_external());
    }

    #[test]
    fn malformed_pointers_are_rejected() {
        for pointer in [
            "a#b#c",
            "#/components/widgets/Pet",
            "#/definitions/Pet",
            "#/components/schemas",
            "#/components/schemas/",
            "",
            "other.yaml#/components/widgets/Pet",
        ] {
            assert!(
                matches!(
                    parse_reference(pointer, Some(ReferenceKind::Schema)),
                    Err(ReferenceError::InvalidReferenceFormat { .. })
                ),
                "{pointer} should be rejected"
            );
        }
    }

    #[test]
    fn escaped_ids_round_trip() {
        let r = parse_reference("#/components/schemas/a~1b", None).unwrap();
        assert_eq!(r.id.as_deref(), Some("a/b"));
        assert_eq!(r.pointer(), "#/components/schemas/a~1b");
    }

    #[test]
    fn relative_to_reanchors_local_pointers() {
        let r = AsyncApiReference::local(ReferenceKind::Schema, "Pet");
        assert_eq!(r.relative_to(None).pointer(), "#/components/schemas/Pet");
        assert_eq!(
            r.relative_to(Some("common.yaml")).pointer(),
            "common.yaml#/components/schemas/Pet"
        );
    }

    #[test]
    fn bind_only_touches_placeholders() {
        let mut slot: Slot<String> =
            Slot::Unresolved(AsyncApiReference::local(ReferenceKind::Schema, "Pet"));
        assert!(slot.bind(ComponentKey::local(ReferenceKind::Schema, "Pet")));
        assert!(!slot.bind(ComponentKey::local(ReferenceKind::Schema, "Other")));
        assert_eq!(
            slot.target(),
            Some(&ComponentKey::local(ReferenceKind::Schema, "Pet"))
        );
        assert_eq!(slot.reference().unwrap().pointer(), "#/components/schemas/Pet");

        let mut inline = Slot::inline("value".to_string());
        assert!(!inline.bind(ComponentKey::local(ReferenceKind::Schema, "Pet")));
        assert_eq!(inline.as_inline().map(String::as_str), Some("value"));
    }
}
