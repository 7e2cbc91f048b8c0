use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::format::Scalar;
use crate::model::ModelId;

/// A validated instance of a compiled type.
#[derive(Debug, Clone, PartialEq)]
pub enum Instance {
    /// Explicit `null` in an optional slot.
    Null,
    Scalar(Scalar),
    Array(Vec<Instance>),
    Object(ObjectInstance),
    /// The alternative a union selected, by index into its alternatives.
    Variant { union: ModelId, index: usize, value: Box<Instance> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInstance {
    pub model: ModelId,
    /// Present fields only; absent optional fields have no entry.
    pub fields: IndexMap<String, Instance>,
}

impl ObjectInstance {
    pub fn get(&self, name: &str) -> Option<&Instance> {
        self.fields.get(name)
    }
}

impl Instance {
    /// Object payload, looking through union selections.
    pub fn as_object(&self) -> Option<&ObjectInstance> {
        match self {
            Instance::Object(o) => Some(o),
            Instance::Variant { value, .. } => value.as_object(),
            _ => None,
        }
    }
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Instance::Scalar(s) => Some(s),
            Instance::Variant { value, .. } => value.as_scalar(),
            _ => None,
        }
    }
    /// Index of the outermost union alternative selected, if any.
    pub fn variant_index(&self) -> Option<usize> {
        match self {
            Instance::Variant { index, .. } => Some(*index),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Instance::Null => Value::Null,
            Instance::Scalar(s) => s.to_json(),
            Instance::Array(xs) => Value::Array(xs.iter().map(Instance::to_json).collect()),
            Instance::Object(o) => {
                let map: Map<String, Value> = o.fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
                Value::Object(map)
            }
            Instance::Variant { value, .. } => value.to_json(),
        }
    }
}

impl Serialize for Instance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
