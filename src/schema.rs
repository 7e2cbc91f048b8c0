//! Read-only schema abstraction consumed by the synthesizer.
//!
//! Schemas live in a [`SchemaDocument`] arena and point at each other through
//! [`SchemaRef`] edges, so recursive and mutually recursive definitions are
//! plain index cycles. The synthesizer never mutates a document.
use std::fmt;
use std::ops::Index;

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(pub(crate) usize);

/// Which document flavour produced a schema. Decides where required-ness lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Swagger 2.0: each property edge carries its own required flag.
    Swagger2,
    /// OpenAPI 3.0: the owning object declares a `required` name-set.
    OpenApi30,
    /// OpenAPI 3.1: same required semantics as 3.0.
    OpenApi31,
}

impl Dialect {
    pub fn is_legacy(self) -> bool {
        matches!(self, Dialect::Swagger2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl PrimitiveType {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
    pub fn is_scalar(self) -> bool {
        matches!(self, Self::String | Self::Integer | Self::Number | Self::Boolean)
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An edge from a schema to a child schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRef {
    pub id: SchemaId,
    /// `$ref` text when the child was referenced rather than inlined.
    pub reference: Option<String>,
    /// Legacy (Swagger 2.0) per-property required flag. Unused for current dialects.
    pub required: bool,
}

impl SchemaRef {
    pub fn inline(id: SchemaId) -> Self {
        Self { id, reference: None, required: false }
    }
    pub fn referenced(id: SchemaId, reference: impl Into<String>) -> Self {
        Self { id, reference: Some(reference.into()), required: false }
    }
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discriminator {
    pub property_name: String,
    /// Tag value → variant reference (`#/components/schemas/Dog` or bare `Dog`).
    pub mapping: Option<IndexMap<String, String>>,
}

impl Discriminator {
    pub fn untagged(property_name: impl Into<String>) -> Self {
        Self { property_name: property_name.into(), mapping: None }
    }
    pub fn tagged<I, K, V>(property_name: impl Into<String>, mapping: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mapping = mapping.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { property_name: property_name.into(), mapping: Some(mapping) }
    }
    pub fn is_tagged(&self) -> bool {
        self.mapping.is_some()
    }

    /// First mapping entry whose target appears on the traversal path.
    pub fn tag_for_path(&self, path: &[String]) -> Option<&str> {
        let mapping = self.mapping.as_ref()?;
        mapping
            .iter()
            .find(|(_, target)| path.iter().any(|step| reference_matches(target, step)))
            .map(|(tag, _)| tag.as_str())
    }
}

/// A mapping target matches a reference when equal, or when the target is a
/// bare component name equal to the reference's last segment.
pub fn reference_matches(target: &str, reference: &str) -> bool {
    if target == reference {
        return true;
    }
    !target.contains('/') && reference.rsplit('/').next() == Some(target)
}

/// Which combination keyword defines a schema, if any.
#[derive(Debug, Clone, Copy)]
pub enum Combination<'a> {
    AllOf(&'a [SchemaRef]),
    AnyOf(&'a [SchemaRef]),
    OneOf(&'a [SchemaRef]),
    None,
}

#[derive(Debug, Clone)]
pub struct Schema {
    pub dialect: Dialect,
    /// Stable identity: component name or schema path. Used for naming.
    pub identity: Option<String>,
    pub title: Option<String>,
    /// `None` marks a pure discriminator anchor when nothing else is declared.
    pub ty: Option<PrimitiveType>,
    pub format: Option<String>,
    pub properties: IndexMap<String, SchemaRef>,
    /// Current-dialect required name-set.
    pub required: IndexSet<String>,
    pub items: Option<SchemaRef>,
    pub all_of: Vec<SchemaRef>,
    pub any_of: Vec<SchemaRef>,
    pub one_of: Vec<SchemaRef>,
    pub discriminator: Option<Discriminator>,
    pub enum_: Option<Vec<Value>>,
    pub default: Option<Value>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Schema {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            identity: None,
            title: None,
            ty: None,
            format: None,
            properties: IndexMap::new(),
            required: IndexSet::new(),
            items: None,
            all_of: Vec::new(),
            any_of: Vec::new(),
            one_of: Vec::new(),
            discriminator: None,
            enum_: None,
            default: None,
        }
    }
    pub fn typed(dialect: Dialect, ty: PrimitiveType) -> Self {
        Self { ty: Some(ty), ..Self::new(dialect) }
    }
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
    pub fn with_property(mut self, name: impl Into<String>, child: SchemaRef) -> Self {
        self.properties.insert(name.into(), child);
        self
    }
    pub fn with_required<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(names.into_iter().map(Into::into));
        self
    }
    pub fn with_items(mut self, items: SchemaRef) -> Self {
        self.items = Some(items);
        self
    }
    pub fn with_discriminator(mut self, discriminator: Discriminator) -> Self {
        self.discriminator = Some(discriminator);
        self
    }

    /// Precedence: allOf, then anyOf, then oneOf.
    pub fn combination(&self) -> Combination<'_> {
        if !self.all_of.is_empty() {
            Combination::AllOf(&self.all_of)
        } else if !self.any_of.is_empty() {
            Combination::AnyOf(&self.any_of)
        } else if !self.one_of.is_empty() {
            Combination::OneOf(&self.one_of)
        } else {
            Combination::None
        }
    }

    /// No type, no combination, no properties: exists only to anchor variants.
    pub fn is_anchor(&self) -> bool {
        self.ty.is_none() && matches!(self.combination(), Combination::None) && self.properties.is_empty()
    }

    /// Required-ness of `name`, answered the way this schema's dialect defines it.
    pub fn is_required(&self, name: &str, edge: &SchemaRef) -> bool {
        if self.dialect.is_legacy() {
            edge.required
        } else {
            self.required.contains(name)
        }
    }

    pub fn label(&self) -> &str {
        self.title.as_deref().or(self.identity.as_deref()).unwrap_or("<anonymous>")
    }
}

/// Arena of schemas for one loaded document.
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    dialect: Dialect,
    schemas: Vec<Schema>,
    named: IndexMap<String, SchemaId>,
}

impl SchemaDocument {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect, schemas: Vec::new(), named: IndexMap::new() }
    }
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }
    pub fn insert(&mut self, schema: Schema) -> SchemaId {
        let id = SchemaId(self.schemas.len());
        self.schemas.push(schema);
        id
    }
    /// Reserve a slot to be filled by [`SchemaDocument::replace`]; lets forward references resolve.
    pub fn reserve(&mut self) -> SchemaId {
        self.insert(Schema::new(self.dialect))
    }
    pub fn replace(&mut self, id: SchemaId, schema: Schema) {
        self.schemas[id.0] = schema;
    }
    pub fn name(&mut self, name: impl Into<String>, id: SchemaId) {
        self.named.insert(name.into(), id);
    }
    pub fn lookup(&self, name: &str) -> Option<SchemaId> {
        self.named.get(name).copied()
    }
    pub fn named(&self) -> impl Iterator<Item = (&str, SchemaId)> {
        self.named.iter().map(|(k, v)| (k.as_str(), *v))
    }
    pub fn len(&self) -> usize {
        self.schemas.len()
    }
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Resolve a local reference: `#/definitions/X`, `#/components/schemas/X` or bare `X`.
    pub fn resolve_reference(&self, reference: &str) -> Option<SchemaId> {
        let name = reference
            .strip_prefix("#/components/schemas/")
            .or_else(|| reference.strip_prefix("#/definitions/"))
            .unwrap_or(reference);
        self.lookup(name)
    }

    /// Edge to a named schema, carrying the reference text a loader would record.
    pub fn reference(&self, name: &str) -> Option<SchemaRef> {
        let id = self.lookup(name)?;
        let prefix = if self.dialect.is_legacy() { "#/definitions/" } else { "#/components/schemas/" };
        Some(SchemaRef::referenced(id, format!("{prefix}{name}")))
    }
}

impl Index<SchemaId> for SchemaDocument {
    type Output = Schema;
    fn index(&self, id: SchemaId) -> &Schema {
        &self.schemas[id.0]
    }
}
