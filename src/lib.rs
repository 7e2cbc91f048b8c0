//! Compile Swagger 2.0 / OpenAPI 3.x schema documents into strict, typed
//! models and validate JSON instances against them.
//!
//! Pipeline: [`loader`] (JSON → schema arena) → [`synth::compile`]
//! (schema arena → [`model::ModelSet`]) → [`ModelSet::decode`](model::ModelSet::decode).
pub mod cli;
pub mod emit;
pub mod error;
pub mod format;
pub mod loader;
pub mod model;
pub mod schema;
pub mod synth;
pub mod validate;

pub use error::{SchemaError, ValidationErrors};
pub use loader::{load_str, load_value};
pub use model::{ModelSet, TypeRef};
pub use synth::compile;
pub use validate::Instance;
