//! Parsing context and diagnostics.

use std::fmt;

use serde::Serialize;

use crate::error::ParseError;

/// One diagnostic record: where in the document, and what went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AsyncApiError {
    /// JSON-pointer-like location, rooted at `#`.
    pub pointer: String,
    pub message: String,
}

impl AsyncApiError {
    pub fn new(pointer: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            pointer: pointer.into(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for AsyncApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.pointer, self.message)
    }
}

/// Spec version declared by the document root (`asyncapi: "2.6.0"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SpecVersion {
    /// Parse `major.minor[.patch]`; pre-release suffixes are ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let core = text.split(['-', '+']).next()?;
        let mut parts = core.split('.').map(|p| p.parse::<u32>());
        let major = parts.next()?.ok()?;
        let minor = parts.next()?.ok()?;
        let patch = match parts.next() {
            Some(p) => p.ok()?,
            None => 0,
        };
        Some(Self {
            major,
            minor,
            patch,
        })
    }

    /// Whether the 2.x field tables apply to this version.
    pub fn is_supported(&self) -> bool {
        self.major == 2
    }
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Everything a read produced besides the document itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostic {
    pub errors: Vec<AsyncApiError>,
    pub warnings: Vec<AsyncApiError>,
    pub spec_version: Option<SpecVersion>,
}

impl Diagnostic {
    pub fn error(&mut self, pointer: impl Into<String>, message: impl fmt::Display) {
        self.errors.push(AsyncApiError::new(pointer, message));
    }

    pub fn warning(&mut self, pointer: impl Into<String>, message: impl fmt::Display) {
        self.warnings.push(AsyncApiError::new(pointer, message));
    }

    /// No errors (warnings allowed).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Mutable state shared by every loader during one read.
///
/// Owned by a single [`DocumentReader::read`](crate::DocumentReader::read)
/// call and passed down the recursion by reference.
#[derive(Debug, Default)]
pub struct ParsingContext {
    diagnostic: Diagnostic,
}

impl ParsingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> Option<&SpecVersion> {
        self.diagnostic.spec_version.as_ref()
    }

    pub fn set_version(&mut self, version: SpecVersion) {
        self.diagnostic.spec_version = Some(version);
    }

    /// Record a parse error, preferring the pointer carried by the error.
    pub fn record(&mut self, error: &ParseError, fallback_pointer: &str) {
        let pointer = error.pointer().unwrap_or(fallback_pointer).to_string();
        self.diagnostic.error(pointer, error);
    }

    pub fn error(&mut self, pointer: impl Into<String>, message: impl fmt::Display) {
        self.diagnostic.error(pointer, message);
    }

    pub fn warning(&mut self, pointer: impl Into<String>, message: impl fmt::Display) {
        self.diagnostic.warning(pointer, message);
    }

    pub fn diagnostic(&self) -> &Diagnostic {
        &self.diagnostic
    }

    pub fn diagnostic_mut(&mut self) -> &mut Diagnostic {
        &mut self.diagnostic
    }

    pub fn into_diagnostic(self) -> Diagnostic {
        self.diagnostic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_spec_versions() {
        let v = SpecVersion::parse("2.6.0").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (2, 6, 0));
        assert!(v.is_supported());

        let v = SpecVersion::parse("3.0").unwrap();
        assert_eq!(v.patch, 0);
        assert!(!v.is_supported());

        assert_eq!(SpecVersion::parse("2.1.0-rc1").unwrap().minor, 1);
        assert!(SpecVersion::parse("two").is_none());
        assert!(SpecVersion::parse("2").is_none());
    }

    #[test]
    fn record_prefers_error_pointer() {
        let mut ctx = ParsingContext::new();
        let err = ParseError::Scalar {
            text: "abc".into(),
            target: "number",
            pointer: "#/components/schemas/Pet/maximum".into(),
        };
        ctx.record(&err, "#/components/schemas/Pet");
        let diagnostic = ctx.into_diagnostic();
        assert_eq!(diagnostic.errors.len(), 1);
        assert_eq!(
            diagnostic.errors[0].pointer,
            "#/components/schemas/Pet/maximum"
        );
        assert!(!diagnostic.is_valid());
    }
}
