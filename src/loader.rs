//! Schema document loader: Swagger 2.0 / OpenAPI 3.x JSON → [`SchemaDocument`].
//!
//! Named schemas are reserved before any body is converted, so forward and
//! recursive `$ref`s resolve to arena ids. Inline children are inserted as
//! anonymous arena entries whose identity is their dotted location
//! (`Pet.tags.items`, `Cat.allOf.1`).
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::SchemaError;
use crate::schema::{Dialect, Discriminator, PrimitiveType, Schema, SchemaDocument, SchemaRef};

// ————————————————————————————————————————————————————————————————————————————
// WIRE TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Deserialize)]
struct RawDocument {
    swagger: Option<String>,
    openapi: Option<String>,
    #[serde(default)]
    definitions: IndexMap<String, RawSchema>,
    #[serde(default)]
    components: RawComponents,
}

#[derive(Debug, Default, Deserialize)]
struct RawComponents {
    #[serde(default)]
    schemas: IndexMap<String, RawSchema>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSchema {
    #[serde(rename = "$ref")]
    reference: Option<String>,
    #[serde(rename = "type")]
    ty: Option<RawType>,
    format: Option<String>,
    title: Option<String>,
    #[serde(default)]
    properties: IndexMap<String, RawSchema>,
    required: Option<RawRequired>,
    items: Option<Box<RawSchema>>,
    #[serde(default)]
    all_of: Vec<RawSchema>,
    #[serde(default)]
    any_of: Vec<RawSchema>,
    #[serde(default)]
    one_of: Vec<RawSchema>,
    discriminator: Option<RawDiscriminator>,
    #[serde(rename = "enum")]
    enum_: Option<Vec<Value>>,
    default: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawType {
    One(String),
    Many(Vec<String>),
}

/// Object-level name list, or a per-property flag in older documents.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRequired {
    Flag(bool),
    Names(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDiscriminator {
    /// Swagger 2.0 form: the property name alone.
    Name(String),
    Object {
        #[serde(rename = "propertyName")]
        property_name: String,
        mapping: Option<IndexMap<String, String>>,
    },
}

// ————————————————————————————————————————————————————————————————————————————
// FRONT API
// ————————————————————————————————————————————————————————————————————————————

pub fn load_str(src: &str) -> Result<SchemaDocument, SchemaError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    let raw: RawDocument = serde_path_to_error::deserialize(de).map_err(parse_error)?;
    build(raw)
}

pub fn load_value(value: &Value) -> Result<SchemaDocument, SchemaError> {
    let raw: RawDocument = serde_path_to_error::deserialize(value).map_err(parse_error)?;
    build(raw)
}

fn parse_error<E: std::fmt::Display>(err: serde_path_to_error::Error<E>) -> SchemaError {
    SchemaError::Parse { path: err.path().to_string(), message: err.inner().to_string() }
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

fn detect(raw: &RawDocument) -> Result<Dialect, SchemaError> {
    match (raw.swagger.as_deref(), raw.openapi.as_deref()) {
        (Some(_), Some(_)) => Err(SchemaError::UnsupportedDocument("declares both `swagger` and `openapi`".into())),
        (Some("2.0"), None) => Ok(Dialect::Swagger2),
        (None, Some(v)) if v.starts_with("3.0") => Ok(Dialect::OpenApi30),
        (None, Some(v)) if v.starts_with("3.1") => Ok(Dialect::OpenApi31),
        (Some(v), None) | (None, Some(v)) => Err(SchemaError::UnsupportedDocument(format!("version {v}"))),
        (None, None) => Err(SchemaError::UnsupportedDocument("neither `swagger` nor `openapi` is declared".into())),
    }
}

fn build(raw: RawDocument) -> Result<SchemaDocument, SchemaError> {
    let dialect = detect(&raw)?;
    let named = match dialect {
        Dialect::Swagger2 => raw.definitions,
        Dialect::OpenApi30 | Dialect::OpenApi31 => raw.components.schemas,
    };

    let mut doc = SchemaDocument::new(dialect);

    // 1) reserve every named body; top-level `$ref`s are aliases
    let mut aliases: Vec<(String, String)> = Vec::new();
    for (name, schema) in &named {
        match &schema.reference {
            Some(target) => aliases.push((name.clone(), target.clone())),
            None => {
                let id = doc.reserve();
                doc.name(name.clone(), id);
            }
        }
    }

    // 2) aliases may chain; each pass must make progress
    while !aliases.is_empty() {
        let before = aliases.len();
        aliases.retain(|(name, target)| match doc.resolve_reference(target) {
            Some(id) => {
                doc.name(name.clone(), id);
                false
            }
            None => true,
        });
        if aliases.len() == before {
            return Err(SchemaError::UnresolvedReference { reference: aliases[0].1.clone() });
        }
    }

    // 3) convert bodies
    for (name, schema) in &named {
        if schema.reference.is_some() {
            continue;
        }
        let Some(id) = doc.lookup(name) else { continue };
        let converted = convert(&mut doc, schema, name)?;
        doc.replace(id, converted);
    }

    debug!(?dialect, named = named.len(), schemas = doc.len(), "loaded schema document");
    Ok(doc)
}

fn convert(doc: &mut SchemaDocument, raw: &RawSchema, identity: &str) -> Result<Schema, SchemaError> {
    let dialect = doc.dialect();
    let mut schema = Schema::new(dialect).with_identity(identity);
    schema.ty = match &raw.ty {
        None => None,
        Some(RawType::One(tag)) => Some(
            PrimitiveType::parse(tag)
                .ok_or_else(|| SchemaError::UnknownType { identity: identity.to_string(), tag: tag.clone() })?,
        ),
        Some(RawType::Many(tags)) => {
            return Err(SchemaError::UnsupportedDocument(format!(
                "schema `{identity}` declares a list of types [{}]",
                tags.join(", ")
            )));
        }
    };
    schema.title = raw.title.clone();
    schema.format = raw.format.clone();
    schema.enum_ = raw.enum_.clone();
    schema.default = raw.default.clone();

    let required: Vec<String> = match &raw.required {
        Some(RawRequired::Names(names)) => names.clone(),
        _ => Vec::new(),
    };
    for (name, child) in &raw.properties {
        let mut edge = edge(doc, child, &format!("{identity}.{name}"))?;
        if dialect.is_legacy() {
            let flagged = matches!(child.required, Some(RawRequired::Flag(true)));
            edge.required = flagged || required.contains(name);
        }
        schema.properties.insert(name.clone(), edge);
    }
    schema.required = required.into_iter().collect();

    if let Some(items) = &raw.items {
        schema.items = Some(edge(doc, items, &format!("{identity}.items"))?);
    }
    schema.all_of = members(doc, &raw.all_of, identity, "allOf")?;
    schema.any_of = members(doc, &raw.any_of, identity, "anyOf")?;
    schema.one_of = members(doc, &raw.one_of, identity, "oneOf")?;

    schema.discriminator = raw.discriminator.as_ref().map(|d| match d {
        RawDiscriminator::Name(property) => Discriminator::untagged(property.clone()),
        RawDiscriminator::Object { property_name, mapping } => {
            Discriminator { property_name: property_name.clone(), mapping: mapping.clone() }
        }
    });
    Ok(schema)
}

fn members(doc: &mut SchemaDocument, raw: &[RawSchema], identity: &str, keyword: &str) -> Result<Vec<SchemaRef>, SchemaError> {
    raw.iter()
        .enumerate()
        .map(|(i, member)| edge(doc, member, &format!("{identity}.{keyword}.{i}")))
        .collect()
}

fn edge(doc: &mut SchemaDocument, raw: &RawSchema, identity: &str) -> Result<SchemaRef, SchemaError> {
    if let Some(reference) = &raw.reference {
        let id = doc
            .resolve_reference(reference)
            .ok_or_else(|| SchemaError::UnresolvedReference { reference: reference.clone() })?;
        return Ok(SchemaRef::referenced(id, reference.clone()));
    }
    let schema = convert(doc, raw, identity)?;
    Ok(SchemaRef::inline(doc.insert(schema)))
}

// ------------------------------- Tests ------------------------------------ //
