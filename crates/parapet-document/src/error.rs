use thiserror::Error;

use crate::reference::ReferenceKind;
use crate::tree::NodeKind;

/// Errors raised while turning parse-tree nodes into model objects.
///
/// These never escape a read: the field dispatcher and the object loaders
/// record them as diagnostics and keep the partially built object.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// The node has the wrong YAML shape for the field.
    #[error("expected {expected} node, found {actual}")]
    NodeKind {
        expected: NodeKind,
        actual: NodeKind,
        pointer: String,
    },

    /// A scalar could not be read as the required type.
    #[error("cannot read '{text}' as {target}")]
    Scalar {
        text: String,
        target: &'static str,
        pointer: String,
    },

    /// A `$ref` value does not follow the pointer grammar.
    #[error(transparent)]
    Reference(#[from] ReferenceError),
}

impl ParseError {
    /// The pointer of the offending node, when the error knows it.
    pub fn pointer(&self) -> Option<&str> {
        match self {
            ParseError::NodeKind { pointer, .. } | ParseError::Scalar { pointer, .. } => {
                Some(pointer.as_str())
            }
            ParseError::Reference(_) => None,
        }
    }
}

/// Malformed reference pointer text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("invalid reference format '{pointer}': {reason}")]
    InvalidReferenceFormat {
        pointer: String,
        reason: &'static str,
    },
}

impl ReferenceError {
    pub(crate) fn invalid(pointer: &str, reason: &'static str) -> Self {
        ReferenceError::InvalidReferenceFormat {
            pointer: pointer.to_string(),
            reason,
        }
    }
}

/// Reasons a parsed reference cannot be bound to a target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// Name-addressed target (a tag) is absent from the document.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: ReferenceKind, id: String },

    /// The document has no `components` table to index into.
    #[error("cannot resolve '{pointer}': document has no components")]
    MissingComponents { pointer: String },

    /// The components sub-map has no entry with this id.
    #[error("{kind} '{id}' is not defined in components")]
    InvalidReferenceId { kind: ReferenceKind, id: String },

    /// External reference met without a workspace to look it up in.
    #[error("reference to '{resource}' requires a workspace")]
    WorkspaceRequired { resource: String },

    /// The workspace has no document for the resource.
    #[error("document '{resource}' is not loaded in the workspace")]
    UnknownDocument { resource: String },

    /// The pointer names a different component kind than the field holds.
    #[error("expected a {expected} reference, found {found}")]
    KindMismatch {
        expected: ReferenceKind,
        found: ReferenceKind,
    },

    /// Whole-document or kind-less references cannot be bound to a component.
    #[error("reference '{pointer}' does not address a component")]
    Unsupported { pointer: String },
}

/// Fatal read failure: the text could not be tokenized at all.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("syntax error: {0}")]
    Syntax(#[from] serde_yaml::Error),
}

/// Rendering failure after the graph has been written.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// NaN and infinities have no JSON spelling; YAML output keeps them.
    #[error("JSON cannot represent the number {0}")]
    NonFinite(f64),
}
