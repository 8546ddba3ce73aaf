//! Text in, typed graph and diagnostics out.

use serde_yaml::Value;
use tracing::{debug, warn};

use crate::context::{AsyncApiError, Diagnostic, ParsingContext, SpecVersion};
use crate::dispatch::{load, Loadable};
use crate::error::ReadError;
use crate::model::Document;
use crate::resolve::resolve_references;
use crate::tree::ParseNode;
use crate::workspace::Workspace;

/// How far [`DocumentReader::read`] resolves references.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReferenceResolution {
    /// Leave every `$ref` as a placeholder.
    DoNotResolve,
    /// Bind `#/components/...` and name references; leave external ones.
    #[default]
    ResolveLocal,
    /// Also bind references into other documents of the workspace.
    ResolveAll,
}

impl ReferenceResolution {
    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(Self::DoNotResolve),
            "local" => Some(Self::ResolveLocal),
            "all" => Some(Self::ResolveAll),
            _ => None,
        }
    }
}

/// Reader options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderSettings {
    pub reference_resolution: ReferenceResolution,
}

impl ReaderSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reference_resolution(mut self, resolution: ReferenceResolution) -> Self {
        self.reference_resolution = resolution;
        self
    }
}

/// A document and everything reported while reading it.
#[derive(Debug, Clone)]
pub struct ReadResult {
    pub document: Document,
    pub diagnostic: Diagnostic,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentReader {
    settings: ReaderSettings,
}

impl DocumentReader {
    pub fn new(settings: ReaderSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ReaderSettings {
        &self.settings
    }

    /// Read a document. Only text that cannot be tokenized is an `Err`; every
    /// other problem is reported in the diagnostic.
    pub fn read(&self, text: &str) -> Result<ReadResult, ReadError> {
        self.read_with(text, None)
    }

    /// Read a document whose external references may point into `workspace`.
    pub fn read_with(
        &self,
        text: &str,
        workspace: Option<&dyn Workspace>,
    ) -> Result<ReadResult, ReadError> {
        let value: Value = serde_yaml::from_str(text)?;
        let root = ParseNode::root(&value);
        let mut ctx = ParsingContext::new();

        detect_version(&root, &mut ctx);
        let mut document: Document = load(&root, &mut ctx);
        debug!(
            channels = document.channels.len(),
            errors = ctx.diagnostic().errors.len(),
            "document parsed"
        );

        let errors = match self.settings.reference_resolution {
            ReferenceResolution::DoNotResolve => Vec::new(),
            ReferenceResolution::ResolveLocal => resolve_references(&mut document, workspace, false),
            ReferenceResolution::ResolveAll => resolve_references(&mut document, workspace, true),
        };
        ctx.diagnostic_mut().errors.extend(errors);

        Ok(ReadResult {
            document,
            diagnostic: ctx.into_diagnostic(),
        })
    }

    /// Bind every reference of an already read document, including those into
    /// `workspace`.
    pub fn resolve_with(
        &self,
        document: &mut Document,
        workspace: &dyn Workspace,
    ) -> Vec<AsyncApiError> {
        resolve_references(document, Some(workspace), true)
    }

    /// Read one object on its own, e.g. a schema kept in a separate file.
    /// References inside it are left unresolved.
    pub fn read_fragment<T: Loadable>(&self, text: &str) -> Result<(T, Diagnostic), ReadError> {
        let value: Value = serde_yaml::from_str(text)?;
        let mut ctx = ParsingContext::new();
        let fragment = load(&ParseNode::root(&value), &mut ctx);
        Ok((fragment, ctx.into_diagnostic()))
    }
}

/// Record the declared version; anything but `asyncapi: 2.x` is reported.
fn detect_version(root: &ParseNode<'_>, ctx: &mut ParsingContext) {
    let Ok(mapping) = root.as_mapping() else {
        return;
    };
    if let Some(node) = mapping.get("asyncapi") {
        let text = node.as_scalar().unwrap_or_default();
        match SpecVersion::parse(&text) {
            Some(version) if version.is_supported() => {
                debug!(version = %version, "asyncapi version detected");
                ctx.set_version(version);
            }
            Some(version) => {
                warn!(version = %version, "unsupported asyncapi version; reading with 2.x rules");
                ctx.error(
                    node.pointer(),
                    format!("unsupported asyncapi version '{version}', expected 2.x"),
                );
                ctx.set_version(version);
            }
            None => ctx.error(node.pointer(), format!("invalid asyncapi version '{text}'")),
        }
        return;
    }
    for dialect in ["openapi", "swagger"] {
        if let Some(node) = mapping.get(dialect) {
            ctx.error(
                node.pointer(),
                format!("'{dialect}' documents are not supported; expected an asyncapi document"),
            );
            return;
        }
    }
    ctx.error(root.pointer(), "missing 'asyncapi' version field");
}
