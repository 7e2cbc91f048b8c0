//! Format registry: `(primitive type, format)` → scalar implementation.
//!
//! Built once from a static catalog, grouped by type then by format, with the
//! absent format stored under the `None` key. The process-wide instance lives
//! in a one-time cell; call [`FormatRegistry::init`] at startup to populate it
//! eagerly, otherwise the first [`FormatRegistry::global`] call does. It is
//! read-only afterwards.
pub mod scalar;

use std::collections::HashMap;

use once_cell::sync::OnceCell;

pub use scalar::{Scalar, ScalarType, Zone};

use crate::error::SchemaError;
use crate::schema::PrimitiveType;

// ------------------------------- Catalog ---------------------------------- //

#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub ty: PrimitiveType,
    pub format: Option<&'static str>,
    pub scalar: ScalarType,
}

const fn entry(ty: PrimitiveType, format: Option<&'static str>, scalar: ScalarType) -> CatalogEntry {
    CatalogEntry { ty, format, scalar }
}

/// Every known type/format combination. Rows for types other than string and
/// number are listed for completeness and skipped when the registry is built.
pub const CATALOG: &[CatalogEntry] = &[
    entry(PrimitiveType::String, None, ScalarType::Text),
    entry(PrimitiveType::String, Some("password"), ScalarType::Password),
    entry(PrimitiveType::String, Some("binary"), ScalarType::Binary),
    entry(PrimitiveType::String, Some("byte"), ScalarType::Byte),
    entry(PrimitiveType::String, Some("date"), ScalarType::Date),
    entry(PrimitiveType::String, Some("date-time"), ScalarType::DateTime),
    entry(PrimitiveType::String, Some("time"), ScalarType::Time),
    entry(PrimitiveType::String, Some("email"), ScalarType::Email),
    entry(PrimitiveType::String, Some("name-email"), ScalarType::NameEmail),
    entry(PrimitiveType::String, Some("uri"), ScalarType::Uri),
    entry(PrimitiveType::String, Some("uuid"), ScalarType::Uuid),
    entry(PrimitiveType::String, Some("ipv4"), ScalarType::Ipv4),
    entry(PrimitiveType::String, Some("ipv6"), ScalarType::Ipv6),
    entry(PrimitiveType::String, Some("ipvanyaddress"), ScalarType::IpAny),
    entry(PrimitiveType::String, Some("ipv4network"), ScalarType::Ipv4Network),
    entry(PrimitiveType::String, Some("ipv6network"), ScalarType::Ipv6Network),
    entry(PrimitiveType::String, Some("ipvanynetwork"), ScalarType::IpAnyNetwork),
    entry(PrimitiveType::String, Some("regex"), ScalarType::Regex),
    entry(PrimitiveType::String, Some("path"), ScalarType::Path),
    entry(PrimitiveType::Number, None, ScalarType::Float),
    entry(PrimitiveType::Number, Some("time-delta"), ScalarType::TimeDelta),
    entry(PrimitiveType::Integer, None, ScalarType::Integer),
    entry(PrimitiveType::Boolean, None, ScalarType::Boolean),
];

// ------------------------------- Registry --------------------------------- //

static GLOBAL: OnceCell<FormatRegistry> = OnceCell::new();

#[derive(Debug, Clone, Default)]
pub struct FormatRegistry {
    table: HashMap<PrimitiveType, HashMap<Option<String>, ScalarType>>,
}

impl FormatRegistry {
    /// Group catalog rows by type, then format. The first row for a key wins.
    pub fn from_catalog(catalog: &[CatalogEntry]) -> Self {
        let mut table: HashMap<PrimitiveType, HashMap<Option<String>, ScalarType>> = HashMap::new();
        for row in catalog {
            if !matches!(row.ty, PrimitiveType::String | PrimitiveType::Number) {
                continue;
            }
            table
                .entry(row.ty)
                .or_default()
                .entry(row.format.map(str::to_string))
                .or_insert(row.scalar);
        }
        Self { table }
    }

    /// Populate the process-wide registry. Idempotent.
    pub fn init() -> &'static FormatRegistry {
        Self::global()
    }

    pub fn global() -> &'static FormatRegistry {
        GLOBAL.get_or_init(|| {
            let registry = Self::from_catalog(CATALOG);
            tracing::debug!(types = registry.table.len(), "format registry populated");
            registry
        })
    }

    /// Exact `(ty, format)` entry, else the `(ty, absent)` entry.
    /// Integer and boolean never consult the table.
    pub fn resolve(&self, ty: PrimitiveType, format: Option<&str>) -> Result<ScalarType, SchemaError> {
        match ty {
            PrimitiveType::Integer => return Ok(ScalarType::Integer),
            PrimitiveType::Boolean => return Ok(ScalarType::Boolean),
            PrimitiveType::Array | PrimitiveType::Object => return Err(SchemaError::NotScalar { ty }),
            PrimitiveType::String | PrimitiveType::Number => {}
        }
        let malformed = || SchemaError::MalformedRegistry { ty, format: format.map(str::to_string) };
        let formats = self.table.get(&ty).ok_or_else(malformed)?;
        format
            .and_then(|f| formats.get(&Some(f.to_string())))
            .or_else(|| formats.get(&None))
            .copied()
            .ok_or_else(malformed)
    }
}
