//! JSON-Schema-ish view of a compiled [`ModelSet`], used by `inspect`.
//!
//! Models are emitted once each, in arena order; references between them are
//! `{"$model": <index>}` links so recursive models stay finite.

use serde_json::{json, Map, Value};

use crate::format::ScalarType;
use crate::model::{Field, Model, ModelId, ModelKind, ModelSet, TypeRef};

pub fn emit_model_set(models: &ModelSet) -> Value {
    let mut roots = Map::new();
    for (name, ty) in models.roots() {
        let view = match ty {
            Some(ty) => emit_type(models, ty),
            None => Value::Null,
        };
        roots.insert(name.to_string(), view);
    }

    let emitted: Vec<Value> = models.models().map(|(id, m)| emit_model(models, id, m)).collect();

    let mut anchors = Map::new();
    for anchor in models.anchors() {
        anchors.insert(anchor.name.clone(), Value::Array(anchor.variants.iter().map(|v| link(models, *v)).collect()));
    }

    json!({ "roots": roots, "models": emitted, "anchors": anchors })
}

pub fn emit_model(models: &ModelSet, id: ModelId, model: &Model) -> Value {
    let mut o = match &model.kind {
        ModelKind::Object { fields } => emit_object(models, fields),
        ModelKind::Union { alternatives, discriminator, tags } => {
            let mut o = json!({ "oneOf": alternatives.iter().map(|t| emit_type(models, t)).collect::<Vec<_>>() });
            if let Some(d) = discriminator {
                let mut disc = json!({ "propertyName": d.property_name });
                if !tags.is_empty() {
                    disc["mapping"] = Value::Object(tags.iter().map(|(tag, i)| (tag.clone(), Value::from(*i))).collect());
                }
                o["discriminator"] = disc;
            }
            o
        }
    };
    o["title"] = Value::from(model.name.clone());
    o["$id"] = Value::from(id.0);
    o
}

fn emit_object(models: &ModelSet, fields: &[Field]) -> Value {
    let mut props = Map::new();
    let mut required: Vec<Value> = Vec::new();
    for f in fields {
        let mut p = emit_type(models, &f.ty);
        if let Some(values) = &f.enum_ {
            p["enum"] = Value::Array(values.clone());
        }
        if let Some(default) = &f.default {
            p["default"] = default.clone();
        }
        props.insert(f.name.clone(), p);
        if f.required {
            required.push(Value::from(f.name.clone()));
        }
    }
    let mut o = json!({ "type": "object", "properties": props });
    if !required.is_empty() {
        o["required"] = Value::Array(required);
    }
    o
}

pub fn emit_type(models: &ModelSet, ty: &TypeRef) -> Value {
    match ty {
        TypeRef::Scalar(s) => emit_scalar(*s),
        TypeRef::Array(item) => json!({ "type": "array", "items": emit_type(models, item) }),
        TypeRef::Model(id) => link(models, *id),
        TypeRef::Literal(tag) => json!({ "type": "string", "const": tag }),
        TypeRef::Anchor(schema) => match models.anchor(*schema) {
            Some(anchor) => json!({
                "anchor": anchor.name,
                "oneOf": anchor.variants.iter().map(|v| link(models, *v)).collect::<Vec<_>>()
            }),
            None => json!({ "type": "any" }),
        },
    }
}

fn emit_scalar(s: ScalarType) -> Value {
    let mut o = json!({ "type": s.primitive().as_str() });
    if !matches!(s, ScalarType::Boolean | ScalarType::Integer | ScalarType::Float | ScalarType::Text) {
        o["format"] = Value::from(s.name());
    }
    o
}

fn link(models: &ModelSet, id: ModelId) -> Value {
    json!({ "$model": id.0, "title": models.model(id).name })
}
