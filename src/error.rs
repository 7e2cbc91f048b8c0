//! Error taxonomy.
//!
//! Two families, never mixed:
//! - [`SchemaError`]: the document cannot be compiled. Raised by the loader,
//!   the format registry and the synthesizer; always fatal.
//! - [`ValidationErrors`]: an instance does not fit a compiled model. Every
//!   offending field is collected before reporting.
use std::fmt;

use thiserror::Error;

use crate::schema::PrimitiveType;

// ————————————————————————————————————————————————————————————————————————————
// SCHEMA (COMPILE TIME)
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("failed to parse schema document at {path}: {message}")]
    Parse { path: String, message: String },

    #[error("unsupported document: {0}")]
    UnsupportedDocument(String),

    #[error("unresolved reference `{reference}`")]
    UnresolvedReference { reference: String },

    #[error("schema `{identity}` declares unknown type `{tag}`")]
    UnknownType { identity: String, tag: String },

    #[error("format registry has no `{ty}` entry for format {format:?} and no default entry")]
    MalformedRegistry { ty: PrimitiveType, format: Option<String> },

    #[error("`{ty}` is not a scalar type")]
    NotScalar { ty: PrimitiveType },

    #[error("array schema `{identity}` has no items")]
    MissingItems { identity: String },

    #[error("discriminator `{property}` has no mapping entry covering [{path}]")]
    UncoveredDiscriminator { property: String, path: String },

    #[error("allOf of `{model}` redefines field `{field}` with a different type")]
    ConflictingField { model: String, field: String },

    #[error("allOf of `{identity}` includes itself")]
    CyclicAllOf { identity: String },

    #[error("union `{identity}` reaches itself without passing through an object or array")]
    CyclicUnion { identity: String },

    #[error("allOf of `{identity}` cannot merge member `{member}`: only object schemas contribute fields")]
    UnmergeableMember { identity: String, member: String },

    #[error("no schema named `{name}`")]
    UnknownSchema { name: String },

    #[error("synthesis of `{identity}` did not complete")]
    Incomplete { identity: String },
}

// ————————————————————————————————————————————————————————————————————————————
// INSTANCE (DECODE / CONSTRUCT TIME)
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// Location of a violation inside an instance, rendered as `$.tags[0].name`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(pub Vec<PathSegment>);

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }
    pub fn push_field(&mut self, name: &str) {
        self.0.push(PathSegment::Field(name.to_string()));
    }
    pub fn push_index(&mut self, index: usize) {
        self.0.push(PathSegment::Index(index));
    }
    pub fn pop(&mut self) {
        self.0.pop();
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.0 {
            match segment {
                PathSegment::Field(name) => write!(f, ".{name}")?,
                PathSegment::Index(i) => write!(f, "[{i}]")?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViolationKind {
    #[error("field required")]
    MissingField,

    #[error("extra field not permitted by `{model}`")]
    UnexpectedField { model: String },

    #[error("expected {expected}, found {found}")]
    WrongType { expected: String, found: &'static str },

    #[error("invalid {expected}: {reason}")]
    InvalidFormat { expected: String, reason: String },

    #[error("unexpected value {value}; permitted: {permitted}")]
    NotInEnum { value: String, permitted: String },

    #[error("expected literal {expected:?}, found {found}")]
    LiteralMismatch { expected: String, found: String },

    #[error("discriminator property `{property}` is missing")]
    MissingDiscriminator { property: String },

    #[error("discriminator value {value:?} is not covered by the mapping of `{union}`")]
    UncoveredDiscriminator { union: String, value: String },

    #[error("none of the {attempts} alternatives of `{union}` accepts the value")]
    NoMatchingAlternative { union: String, attempts: usize },

    #[error("`{anchor}` has no concrete variant to resolve through")]
    NoVariant { anchor: String },
}

impl ViolationKind {
    /// Failures of variant selection rather than of a single field.
    pub fn is_union_failure(&self) -> bool {
        matches!(
            self,
            ViolationKind::MissingDiscriminator { .. }
                | ViolationKind::UncoveredDiscriminator { .. }
                | ViolationKind::NoMatchingAlternative { .. }
                | ViolationKind::NoVariant { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: FieldPath,
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    pub target: String,
    pub violations: Vec<Violation>,
}

impl ValidationErrors {
    pub fn len(&self) -> usize {
        self.violations.len()
    }
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }
    pub fn is_union_failure(&self) -> bool {
        self.violations.iter().any(|v| v.kind.is_union_failure())
    }
    /// Violations reported at exactly `path` (e.g. `"$.status"`).
    pub fn at(&self, path: &str) -> Vec<&ViolationKind> {
        self.violations
            .iter()
            .filter(|v| v.path.to_string() == path)
            .map(|v| &v.kind)
            .collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.violations.len();
        let noun = if n == 1 { "error" } else { "errors" };
        write!(f, "{n} validation {noun} for {}", self.target)?;
        for v in &self.violations {
            write!(f, "\n  {}: {}", v.path, v.kind)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_path_renders_fields_and_indices() {
        let mut path = FieldPath::root();
        path.push_field("tags");
        path.push_index(0);
        path.push_field("name");
        assert_eq!(path.to_string(), "$.tags[0].name");
        path.pop();
        path.pop();
        assert_eq!(path.to_string(), "$.tags");
    }

    #[test]
    fn display_lists_every_violation() {
        let errors = ValidationErrors {
            target: "Pet".into(),
            violations: vec![
                Violation { path: FieldPath(vec![PathSegment::Field("name".into())]), kind: ViolationKind::MissingField },
                Violation {
                    path: FieldPath(vec![PathSegment::Field("status".into())]),
                    kind: ViolationKind::NotInEnum { value: "\"invalid\"".into(), permitted: "\"sold\"".into() },
                },
            ],
        };
        let text = errors.to_string();
        assert!(text.starts_with("2 validation errors for Pet"));
        assert!(text.contains("$.name: field required"));
        assert!(text.contains("$.status: unexpected value"));
        assert!(!errors.is_union_failure());
    }
}
