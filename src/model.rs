// Strongly-typed model table produced by the synthesizer. Immutable once built.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::Value;

use crate::format::ScalarType;
use crate::schema::{Discriminator, SchemaId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(pub(crate) usize);

/// Element type of a field, an array, a union alternative or a root schema.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Scalar(ScalarType),
    Array(Box<TypeRef>),
    Model(ModelId),
    /// Discriminator field narrowed to the one tag valid at this position.
    Literal(String),
    /// Reference to a none-typed anchor; resolves through its registered variants.
    Anchor(SchemaId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: TypeRef,
    pub required: bool,
    pub default: Option<Value>,
    pub enum_: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelKind {
    Object {
        fields: Vec<Field>, // declaration order
    },
    Union {
        alternatives: Vec<TypeRef>, // declaration order is the untagged tie-break
        discriminator: Option<Discriminator>,
        /// Tag value → index into `alternatives`, present when the mapping is explicit.
        tags: IndexMap<String, usize>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub name: String,
    pub schema: SchemaId,
    pub kind: ModelKind,
}

impl Model {
    pub fn field(&self, name: &str) -> Option<&Field> {
        match &self.kind {
            ModelKind::Object { fields } => fields.iter().find(|f| f.name == name),
            ModelKind::Union { .. } => None,
        }
    }
    pub fn fields(&self) -> &[Field] {
        match &self.kind {
            ModelKind::Object { fields } => fields,
            ModelKind::Union { .. } => &[],
        }
    }
    /// Union discriminator, only when dispatch is by tag.
    pub fn tagged_by(&self) -> Option<&Discriminator> {
        match &self.kind {
            ModelKind::Union { discriminator: Some(d), .. } if d.is_tagged() => Some(d),
            _ => None,
        }
    }
}

/// Variants registered by a none-typed anchor schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Anchor {
    pub name: String,
    pub variants: Vec<ModelId>,
}

/// Output of one compilation pass: the model arena plus lookup tables.
///
/// Shared read-only across threads for instance validation.
#[derive(Debug, Clone, Default)]
pub struct ModelSet {
    pub(crate) models: Vec<Model>,
    pub(crate) by_schema: HashMap<SchemaId, ModelId>,
    /// Resolved type of each named schema; `None` for pure anchors.
    pub(crate) roots: IndexMap<String, Option<TypeRef>>,
    pub(crate) anchors: HashMap<SchemaId, Anchor>,
}

impl ModelSet {
    pub fn model(&self, id: ModelId) -> &Model {
        &self.models[id.0]
    }
    pub fn models(&self) -> impl Iterator<Item = (ModelId, &Model)> {
        self.models.iter().enumerate().map(|(i, m)| (ModelId(i), m))
    }
    pub fn len(&self) -> usize {
        self.models.len()
    }
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
    /// Model memoized for a schema identity.
    pub fn for_schema(&self, schema: SchemaId) -> Option<ModelId> {
        self.by_schema.get(&schema).copied()
    }
    /// First model with this name. Names are not deduplicated.
    pub fn find(&self, name: &str) -> Option<ModelId> {
        self.models.iter().position(|m| m.name == name).map(ModelId)
    }
    pub fn root(&self, name: &str) -> Option<&TypeRef> {
        self.roots.get(name).and_then(Option::as_ref)
    }
    pub fn anchor(&self, schema: SchemaId) -> Option<&Anchor> {
        self.anchors.get(&schema)
    }
    /// Registered anchors, ordered by name.
    pub fn anchors(&self) -> Vec<&Anchor> {
        let mut anchors: Vec<&Anchor> = self.anchors.values().collect();
        anchors.sort_by(|a, b| a.name.cmp(&b.name));
        anchors
    }
    pub fn roots(&self) -> impl Iterator<Item = (&str, Option<&TypeRef>)> {
        self.roots.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn type_name(&self, ty: &TypeRef) -> String {
        match ty {
            TypeRef::Scalar(s) => s.name().to_string(),
            TypeRef::Array(item) => format!("list[{}]", self.type_name(item)),
            TypeRef::Model(id) => self.model(*id).name.clone(),
            TypeRef::Literal(tag) => format!("literal {tag:?}"),
            TypeRef::Anchor(schema) => match self.anchor(*schema) {
                Some(anchor) => anchor.name.clone(),
                None => "<anchor>".to_string(),
            },
        }
    }
}
