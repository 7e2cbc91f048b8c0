//! Instance validation against a compiled [`ModelSet`].
//!
//! Contract:
//! - required fields must be present and valid; optional fields may be absent
//!   or `null`, and an absent optional field takes its default when one exists;
//! - enum-constrained fields must equal one of the listed literals;
//! - fields the model does not declare are rejected;
//! - tagged unions dispatch on the discriminator value, untagged unions take
//!   the first alternative that accepts the value, in declaration order.
//!
//! Every violation of an instance is collected before the error is returned.
pub mod instance;

use serde_json::{Map, Value};
use tracing::{trace, warn};

pub use instance::{Instance, ObjectInstance};

use crate::error::{FieldPath, ValidationErrors, Violation, ViolationKind};
use crate::format::scalar::json_kind;
use crate::format::Scalar;
use crate::model::{Field, ModelId, ModelKind, ModelSet, TypeRef};
use crate::schema::SchemaId;

// ————————————————————————————————————————————————————————————————————————————
// FRONT API
// ————————————————————————————————————————————————————————————————————————————

impl ModelSet {
    /// Decode an already-parsed JSON value as an instance of `ty`.
    pub fn decode(&self, ty: &TypeRef, value: &Value) -> Result<Instance, ValidationErrors> {
        let mut violations = Vec::new();
        let mut path = FieldPath::root();
        match self.check(ty, value, &mut path, &mut violations) {
            Some(instance) if violations.is_empty() => Ok(instance),
            _ => Err(ValidationErrors { target: self.type_name(ty), violations }),
        }
    }

    pub fn decode_model(&self, model: ModelId, value: &Value) -> Result<Instance, ValidationErrors> {
        self.decode(&TypeRef::Model(model), value)
    }

    /// Build an instance from field name → value pairs.
    pub fn construct<I, K>(&self, model: ModelId, fields: I) -> Result<Instance, ValidationErrors>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let map: Map<String, Value> = fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.decode_model(model, &Value::Object(map))
    }

    // ————————————————————————————————————————————————————————————————————————
    // CHECKS
    // ————————————————————————————————————————————————————————————————————————

    // `None` exactly when violations were pushed for this subtree.
    fn check(&self, ty: &TypeRef, value: &Value, path: &mut FieldPath, out: &mut Vec<Violation>) -> Option<Instance> {
        match ty {
            TypeRef::Scalar(scalar) => match scalar.decode(value) {
                Ok(s) => Some(Instance::Scalar(s)),
                Err(kind) => {
                    out.push(violation(path, kind));
                    None
                }
            },
            TypeRef::Literal(tag) => match value {
                Value::String(s) if s == tag => Some(Instance::Scalar(Scalar::Text(s.clone()))),
                other => {
                    let kind = ViolationKind::LiteralMismatch { expected: tag.clone(), found: other.to_string() };
                    out.push(violation(path, kind));
                    None
                }
            },
            TypeRef::Array(item) => {
                let Value::Array(xs) = value else {
                    out.push(wrong_type(path, self.type_name(ty), value));
                    return None;
                };
                let before = out.len();
                let mut items = Vec::with_capacity(xs.len());
                for (i, x) in xs.iter().enumerate() {
                    path.push_index(i);
                    if let Some(v) = self.check(item, x, path, out) {
                        items.push(v);
                    }
                    path.pop();
                }
                (out.len() == before).then_some(Instance::Array(items))
            }
            TypeRef::Model(id) => match &self.model(*id).kind {
                ModelKind::Object { fields } => self.check_object(*id, fields, value, path, out),
                ModelKind::Union { .. } => self.check_union(*id, value, path, out),
            },
            TypeRef::Anchor(schema) => self.check_anchor(*schema, value, path, out),
        }
    }

    fn check_object(
        &self,
        id: ModelId,
        fields: &[Field],
        value: &Value,
        path: &mut FieldPath,
        out: &mut Vec<Violation>,
    ) -> Option<Instance> {
        let model = self.model(id);
        let Value::Object(map) = value else {
            out.push(wrong_type(path, model.name.clone(), value));
            return None;
        };

        let before = out.len();
        let mut present = indexmap::IndexMap::with_capacity(fields.len());
        for field in fields {
            path.push_field(&field.name);
            match map.get(&field.name) {
                None if field.required => out.push(violation(path, ViolationKind::MissingField)),
                None => {
                    if let Some(default) = &field.default {
                        let mut scratch = Vec::new();
                        match self.check(&field.ty, default, path, &mut scratch) {
                            Some(v) => {
                                present.insert(field.name.clone(), v);
                            }
                            None => warn!(model = %model.name, field = %field.name, "default does not fit its field type"),
                        }
                    }
                }
                Some(Value::Null) if !field.required => {
                    present.insert(field.name.clone(), Instance::Null);
                }
                Some(v) => {
                    if let Some(instance) = self.check_field(field, v, path, out) {
                        present.insert(field.name.clone(), instance);
                    }
                }
            }
            path.pop();
        }

        for key in map.keys() {
            if !fields.iter().any(|f| &f.name == key) {
                path.push_field(key);
                out.push(violation(path, ViolationKind::UnexpectedField { model: model.name.clone() }));
                path.pop();
            }
        }

        (out.len() == before).then(|| Instance::Object(ObjectInstance { model: id, fields: present }))
    }

    fn check_field(&self, field: &Field, value: &Value, path: &mut FieldPath, out: &mut Vec<Violation>) -> Option<Instance> {
        if let Some(permitted) = &field.enum_ {
            if !permitted.contains(value) {
                let permitted = permitted.iter().map(Value::to_string).collect::<Vec<_>>().join(", ");
                out.push(violation(path, ViolationKind::NotInEnum { value: value.to_string(), permitted }));
                return None;
            }
        }
        self.check(&field.ty, value, path, out)
    }

    fn check_union(&self, id: ModelId, value: &Value, path: &mut FieldPath, out: &mut Vec<Violation>) -> Option<Instance> {
        let model = self.model(id);
        let ModelKind::Union { alternatives, tags, .. } = &model.kind else {
            return None;
        };

        // tagged: the discriminator value picks the alternative
        if let Some(discriminator) = model.tagged_by() {
            let Value::Object(map) = value else {
                out.push(wrong_type(path, model.name.clone(), value));
                return None;
            };
            let property = &discriminator.property_name;
            path.push_field(property);
            let selected = match map.get(property) {
                None => Err(ViolationKind::MissingDiscriminator { property: property.clone() }),
                Some(Value::String(tag)) => tags
                    .get(tag.as_str())
                    .copied()
                    .ok_or_else(|| ViolationKind::UncoveredDiscriminator { union: model.name.clone(), value: tag.clone() }),
                Some(other) => Err(ViolationKind::WrongType { expected: "discriminator string".into(), found: json_kind(other) }),
            };
            let index = match selected {
                Ok(index) => index,
                Err(kind) => {
                    out.push(violation(path, kind));
                    path.pop();
                    return None;
                }
            };
            path.pop();
            let value = self.check(&alternatives[index], value, path, out)?;
            return Some(Instance::Variant { union: id, index, value: Box::new(value) });
        }

        // untagged: first structural match, declaration order
        for (index, alternative) in alternatives.iter().enumerate() {
            let mut scratch = Vec::new();
            match self.check(alternative, value, path, &mut scratch) {
                Some(v) if scratch.is_empty() => {
                    return Some(Instance::Variant { union: id, index, value: Box::new(v) });
                }
                _ => trace!(union = %model.name, index, rejected = scratch.len(), "alternative rejected"),
            }
        }
        let kind = ViolationKind::NoMatchingAlternative { union: model.name.clone(), attempts: alternatives.len() };
        out.push(violation(path, kind));
        None
    }

    fn check_anchor(&self, schema: SchemaId, value: &Value, path: &mut FieldPath, out: &mut Vec<Violation>) -> Option<Instance> {
        let anchor = match self.anchor(schema) {
            Some(anchor) if !anchor.variants.is_empty() => anchor,
            other => {
                let name = other.map(|a| a.name.clone()).unwrap_or_else(|| "<anchor>".to_string());
                out.push(violation(path, ViolationKind::NoVariant { anchor: name }));
                return None;
            }
        };
        for variant in &anchor.variants {
            let mut scratch = Vec::new();
            if let Some(v) = self.check(&TypeRef::Model(*variant), value, path, &mut scratch) {
                if scratch.is_empty() {
                    return Some(v);
                }
            }
        }
        let kind = ViolationKind::NoMatchingAlternative { union: anchor.name.clone(), attempts: anchor.variants.len() };
        out.push(violation(path, kind));
        None
    }
}

fn violation(path: &FieldPath, kind: ViolationKind) -> Violation {
    Violation { path: path.clone(), kind }
}

fn wrong_type(path: &FieldPath, expected: String, found: &Value) -> Violation {
    violation(path, ViolationKind::WrongType { expected, found: json_kind(found) })
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_value;
    use crate::synth::compile;
    use serde_json::json;

    fn models(doc: Value) -> ModelSet {
        compile(&load_value(&doc).unwrap()).unwrap()
    }

    fn oas(schemas: Value) -> ModelSet {
        models(json!({ "openapi": "3.0.3", "components": { "schemas": schemas } }))
    }

    fn root<'m>(models: &'m ModelSet, name: &str) -> &'m TypeRef {
        models.root(name).unwrap()
    }

    #[test]
    fn missing_required_field_fails_missing_optional_is_absent() {
        let m = oas(json!({
            "Obj": {
                "type": "object",
                "required": ["a"],
                "properties": { "a": { "type": "string" }, "b": { "type": "string" } }
            }
        }));
        let ty = root(&m, "Obj");

        let err = m.decode(ty, &json!({ "b": "x" })).unwrap_err();
        assert_eq!(err.at("$.a"), vec![&ViolationKind::MissingField]);

        let ok = m.decode(ty, &json!({ "a": "x" })).unwrap();
        let obj = ok.as_object().unwrap();
        assert!(obj.get("b").is_none());
        assert_eq!(obj.get("a").unwrap().to_json(), json!("x"));
    }

    #[test]
    fn all_of_merge_accepts_union_of_fields() {
        let m = oas(json!({
            "X": { "type": "object", "required": ["a"], "properties": { "a": { "type": "integer" } } },
            "Y": { "type": "object", "properties": { "b": { "type": "string" } } },
            "XY": { "allOf": [ { "$ref": "#/components/schemas/X" }, { "$ref": "#/components/schemas/Y" } ] }
        }));
        let ty = root(&m, "XY");
        assert!(m.decode(ty, &json!({ "a": 1, "b": "x" })).is_ok());
        let err = m.decode(ty, &json!({ "b": "x" })).unwrap_err();
        assert_eq!(err.at("$.a"), vec![&ViolationKind::MissingField]);
    }

    fn pets() -> ModelSet {
        oas(json!({
            "Dog": {
                "type": "object",
                "required": ["kind"],
                "properties": { "kind": { "type": "string" }, "bark": { "type": "boolean" } }
            },
            "Cat": {
                "type": "object",
                "required": ["kind"],
                "properties": { "kind": { "type": "string" }, "lives": { "type": "integer" } }
            },
            "Pet": {
                "oneOf": [ { "$ref": "#/components/schemas/Dog" }, { "$ref": "#/components/schemas/Cat" } ],
                "discriminator": {
                    "propertyName": "kind",
                    "mapping": { "dog": "#/components/schemas/Dog", "cat": "#/components/schemas/Cat" }
                }
            }
        }))
    }

    #[test]
    fn tagged_union_dispatches_on_discriminator() {
        let m = pets();
        let ty = root(&m, "Pet");
        let dog = m.decode(ty, &json!({ "kind": "dog", "bark": true })).unwrap();
        assert_eq!(dog.variant_index(), Some(0));
        assert_eq!(m.model(dog.as_object().unwrap().model).name, "Dog");

        let cat = m.decode(ty, &json!({ "kind": "cat", "lives": 9 })).unwrap();
        assert_eq!(m.model(cat.as_object().unwrap().model).name, "Cat");
    }

    #[test]
    fn tagged_union_rejects_uncovered_tag() {
        let m = pets();
        let err = m.decode(root(&m, "Pet"), &json!({ "kind": "fish" })).unwrap_err();
        assert!(err.is_union_failure());
        assert_eq!(
            err.at("$.kind"),
            vec![&ViolationKind::UncoveredDiscriminator { union: "Pet".into(), value: "fish".into() }]
        );
    }

    #[test]
    fn tagged_union_reports_missing_tag() {
        let m = pets();
        let err = m.decode(root(&m, "Pet"), &json!({ "bark": true })).unwrap_err();
        assert_eq!(err.at("$.kind"), vec![&ViolationKind::MissingDiscriminator { property: "kind".into() }]);
    }

    #[test]
    fn tagged_variant_still_validates_its_fields() {
        let m = pets();
        let err = m.decode(root(&m, "Pet"), &json!({ "kind": "dog", "bark": "loud", "lives": 9 })).unwrap_err();
        assert_eq!(err.len(), 2);
        assert!(matches!(err.at("$.bark")[0], ViolationKind::WrongType { .. }));
        assert!(matches!(err.at("$.lives")[0], ViolationKind::UnexpectedField { .. }));
    }

    #[test]
    fn untagged_union_takes_first_structural_match() {
        let m = oas(json!({
            "A": { "type": "object", "properties": { "x": { "type": "string" } } },
            "B": { "type": "object", "properties": { "x": { "type": "string" } } },
            "AB": { "oneOf": [ { "$ref": "#/components/schemas/A" }, { "$ref": "#/components/schemas/B" } ] }
        }));
        let value = m.decode(root(&m, "AB"), &json!({ "x": "both" })).unwrap();
        assert_eq!(value.variant_index(), Some(0));
        assert_eq!(m.model(value.as_object().unwrap().model).name, "A");
    }

    #[test]
    fn untagged_union_with_no_match_is_reported_as_union_failure() {
        let m = oas(json!({
            "Id": { "anyOf": [ { "type": "integer" }, { "type": "string", "format": "uuid" } ] }
        }));
        let ty = root(&m, "Id");
        assert_eq!(m.decode(ty, &json!(7)).unwrap().variant_index(), Some(0));
        assert_eq!(m.decode(ty, &json!("123e4567-e89b-12d3-a456-426614174000")).unwrap().variant_index(), Some(1));
        let err = m.decode(ty, &json!("nope")).unwrap_err();
        assert!(err.is_union_failure());
        assert_eq!(err.violations[0].kind, ViolationKind::NoMatchingAlternative { union: "Id".into(), attempts: 2 });
    }

    #[test]
    fn undeclared_fields_are_rejected() {
        let m = oas(json!({
            "Tag": { "type": "object", "properties": { "id": { "type": "integer" }, "name": { "type": "string" } } }
        }));
        let err = m.decode(root(&m, "Tag"), &json!({ "id": 1, "name": "x", "colour": "red" })).unwrap_err();
        assert_eq!(err.at("$.colour"), vec![&ViolationKind::UnexpectedField { model: "Tag".into() }]);
    }

    #[test]
    fn enum_rejects_unlisted_value() {
        let m = oas(json!({
            "Pet": {
                "type": "object",
                "properties": { "status": { "type": "string", "enum": ["available", "pending", "sold"] } }
            }
        }));
        let ty = root(&m, "Pet");
        assert!(m.decode(ty, &json!({ "status": "sold" })).is_ok());
        let err = m.decode(ty, &json!({ "status": "invalid" })).unwrap_err();
        assert!(matches!(err.at("$.status")[0], ViolationKind::NotInEnum { .. }));
    }

    #[test]
    fn violations_are_collected_exhaustively_with_paths() {
        let m = oas(json!({
            "Tag": { "type": "object", "required": ["name"], "properties": { "name": { "type": "string" } } },
            "Pet": {
                "type": "object",
                "required": ["name", "tags"],
                "properties": {
                    "name": { "type": "string" },
                    "tags": { "type": "array", "items": { "$ref": "#/components/schemas/Tag" } }
                }
            }
        }));
        let err = m
            .decode(root(&m, "Pet"), &json!({ "tags": [ { "name": "ok" }, { "name": 3 }, {} ], "extra": 1 }))
            .unwrap_err();
        let paths: Vec<String> = err.violations.iter().map(|v| v.path.to_string()).collect();
        assert_eq!(paths, ["$.name", "$.tags[1].name", "$.tags[2].name", "$.extra"]);
        assert!(!err.is_union_failure());
    }

    #[test]
    fn optional_fields_take_defaults_and_accept_null() {
        let m = oas(json!({
            "Order": {
                "type": "object",
                "required": ["id"],
                "properties": {
                    "id": { "type": "integer" },
                    "complete": { "type": "boolean", "default": false },
                    "shipDate": { "type": "string", "format": "date-time" }
                }
            }
        }));
        let ty = root(&m, "Order");
        let order = m.decode(ty, &json!({ "id": 1, "shipDate": null })).unwrap();
        assert_eq!(order.to_json(), json!({ "id": 1, "complete": false, "shipDate": null }));

        let err = m.decode(ty, &json!({ "id": null })).unwrap_err();
        assert!(matches!(err.at("$.id")[0], ViolationKind::WrongType { found: "null", .. }));
    }

    #[test]
    fn decoded_instances_round_trip() {
        let m = oas(json!({
            "Order": {
                "type": "object",
                "properties": {
                    "id": { "type": "integer" },
                    "shipDate": { "type": "string", "format": "date-time" },
                    "weights": { "type": "array", "items": { "type": "number" } }
                }
            }
        }));
        let input = json!({ "id": 3, "shipDate": "2024-01-02T03:04:05+00:00", "weights": [1.5, 2.25] });
        let order = m.decode(root(&m, "Order"), &input).unwrap();
        assert_eq!(order.to_json(), input);
        assert_eq!(serde_json::to_value(&order).unwrap(), input);
    }

    #[test]
    fn round_trip_keeps_number_and_zone_spelling() {
        let m = oas(json!({
            "Reading": {
                "type": "object",
                "properties": {
                    "w": { "type": "number" },
                    "samples": { "type": "array", "items": { "type": "number", "format": "double" } },
                    "t": { "type": "string", "format": "time" },
                    "d": { "type": "string", "format": "date-time" },
                    "local": { "type": "string", "format": "date-time" }
                }
            }
        }));
        let input = json!({
            "w": 3,
            "samples": [0, 1.5, -2],
            "t": "23:59:01Z",
            "d": "2024-01-02T03:04:05Z",
            "local": "2024-01-02T03:04:05"
        });
        let reading = m.decode(root(&m, "Reading"), &input).unwrap();
        assert_eq!(reading.to_json(), input);
    }

    #[test]
    fn construct_validates_like_decode() {
        let m = oas(json!({
            "Category": {
                "type": "object",
                "required": ["name"],
                "properties": { "id": { "type": "integer" }, "name": { "type": "string" } }
            }
        }));
        let id = m.find("Category").unwrap();
        let ok = m.construct(id, [("id", json!(101)), ("name", json!("dogz"))]).unwrap();
        assert_eq!(ok.to_json(), json!({ "id": 101, "name": "dogz" }));
        let err = m.construct(id, [("id", json!(101))]).unwrap_err();
        assert_eq!(err.target, "Category");
        assert_eq!(err.at("$.name"), vec![&ViolationKind::MissingField]);
    }

    #[test]
    fn anchor_fields_resolve_through_variants() {
        let m = oas(json!({
            "Pet": {
                "discriminator": { "propertyName": "petType", "mapping": { "cat": "Cat", "lizard": "Lizard" } }
            },
            "Cat": {
                "allOf": [
                    { "$ref": "#/components/schemas/Pet" },
                    { "type": "object", "required": ["petType"], "properties": { "petType": { "type": "string" }, "lives": { "type": "integer" } } }
                ]
            },
            "Lizard": {
                "allOf": [
                    { "$ref": "#/components/schemas/Pet" },
                    { "type": "object", "required": ["petType"], "properties": { "petType": { "type": "string" }, "scales": { "type": "boolean" } } }
                ]
            },
            "Owner": { "type": "object", "properties": { "pet": { "$ref": "#/components/schemas/Pet" } } }
        }));
        let ty = root(&m, "Owner");
        let owner = m.decode(ty, &json!({ "pet": { "petType": "lizard", "scales": true } })).unwrap();
        let pet = owner.as_object().unwrap().get("pet").unwrap().as_object().unwrap();
        assert_eq!(m.model(pet.model).name, "Lizard");

        let err = m.decode(ty, &json!({ "pet": { "petType": "dog" } })).unwrap_err();
        assert!(err.is_union_failure());
        assert_eq!(err.violations[0].path.to_string(), "$.pet");
    }

    #[test]
    fn unions_looping_through_unions_never_reach_decoding() {
        let doc = load_value(&json!({
            "openapi": "3.0.3",
            "components": { "schemas": {
                "Loop": { "anyOf": [ { "$ref": "#/components/schemas/Loop2" } ] },
                "Loop2": { "anyOf": [ { "$ref": "#/components/schemas/Loop" }, { "type": "integer" } ] }
            }}
        }))
        .unwrap();
        assert!(matches!(compile(&doc), Err(crate::error::SchemaError::CyclicUnion { .. })));

        let nested = oas(json!({
            "Nested": { "anyOf": [ { "type": "integer" }, { "type": "array", "items": { "$ref": "#/components/schemas/Nested" } } ] }
        }));
        let ty = root(&nested, "Nested");
        assert!(nested.decode(ty, &json!([1, [2, [3]]])).is_ok());
        assert!(nested.decode(ty, &json!("x")).unwrap_err().is_union_failure());
    }

    #[test]
    fn model_set_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ModelSet>();
    }
}
