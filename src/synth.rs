//! Model synthesizer: schema arena in, model arena out.
//!
//! Resolution order for one schema:
//! 1. scalar types go through the format registry; arrays wrap their items;
//! 2. a memo hit returns the model already reserved for this schema identity;
//! 3. a pure anchor registers the variants its discriminator maps to and
//!    yields no type of its own;
//! 4. allOf merges member fields into one flat object;
//! 5. anyOf / oneOf become a union of the member types;
//! 6. anything else is a plain object.
//!
//! A model slot is reserved before its body is built, so a schema reaching
//! itself again (directly or through other schemas) resolves to the reserved
//! id instead of recursing forever.
//!
//! Two pieces of context travel down through unions only: the path of
//! references taken to reach a member, and the stack of enclosing
//! discriminators. A property named by an enclosing discriminator narrows to
//! the single tag whose mapping target lies on that path.
use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace, warn};

use crate::error::SchemaError;
use crate::format::FormatRegistry;
use crate::model::{Anchor, Field, Model, ModelId, ModelKind, ModelSet, TypeRef};
use crate::schema::{
    reference_matches, Combination, Discriminator, PrimitiveType, Schema, SchemaDocument, SchemaId, SchemaRef,
};

// ————————————————————————————————————————————————————————————————————————————
// FRONT API
// ————————————————————————————————————————————————————————————————————————————

/// Compile every named schema of a document into one [`ModelSet`].
///
/// Schemas carrying a discriminator go first, so variants reached through a
/// tagged hierarchy are memoized with their narrowed tag fields.
pub fn compile(doc: &SchemaDocument) -> Result<ModelSet, SchemaError> {
    let mut synth = Synthesizer::new(doc);
    let hierarchy_roots = doc.named().filter(|(_, id)| doc[*id].discriminator.is_some());
    for (_, id) in hierarchy_roots.collect::<Vec<_>>() {
        synth.synthesize(id)?;
    }
    let names = doc.named().map(|(name, _)| name.to_string()).collect::<Vec<_>>();
    for name in names {
        synth.synthesize_named(&name)?;
    }
    synth.finish()
}

/// One compilation pass. The memo is scoped to this value; nothing leaks
/// between documents.
pub struct Synthesizer<'a> {
    doc: &'a SchemaDocument,
    registry: &'a FormatRegistry,
    slots: Vec<Option<Model>>,
    memo: HashMap<SchemaId, ModelId>,
    anchors: HashMap<SchemaId, Anchor>,
    roots: IndexMap<String, Option<TypeRef>>,
    merging: HashSet<SchemaId>,
    /// Unions under construction since the last object field or array item.
    union_chain: Vec<SchemaId>,
    anonymous: usize,
}

impl<'a> Synthesizer<'a> {
    pub fn new(doc: &'a SchemaDocument) -> Self {
        Self::with_registry(doc, FormatRegistry::global())
    }

    pub fn with_registry(doc: &'a SchemaDocument, registry: &'a FormatRegistry) -> Self {
        Self {
            doc,
            registry,
            slots: Vec::new(),
            memo: HashMap::new(),
            anchors: HashMap::new(),
            roots: IndexMap::new(),
            merging: HashSet::new(),
            union_chain: Vec::new(),
            anonymous: 0,
        }
    }

    /// `None` means the schema is a pure anchor.
    pub fn synthesize(&mut self, id: SchemaId) -> Result<Option<TypeRef>, SchemaError> {
        self.synthesize_in(id, &[], &[])
    }

    /// Synthesize a named schema and record it as a root of the model set.
    pub fn synthesize_named(&mut self, name: &str) -> Result<Option<TypeRef>, SchemaError> {
        let id = self
            .doc
            .lookup(name)
            .ok_or_else(|| SchemaError::UnknownSchema { name: name.to_string() })?;
        let ty = self.synthesize(id)?;
        self.roots.insert(name.to_string(), ty.clone());
        Ok(ty)
    }

    pub fn finish(self) -> Result<ModelSet, SchemaError> {
        let Synthesizer { doc, slots, memo, anchors, roots, .. } = self;
        let mut models = Vec::with_capacity(slots.len());
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(model) => models.push(model),
                None => {
                    let identity = memo
                        .iter()
                        .find(|(_, m)| m.0 == index)
                        .map(|(schema, _)| doc[*schema].label().to_string())
                        .unwrap_or_default();
                    return Err(SchemaError::Incomplete { identity });
                }
            }
        }
        Ok(ModelSet { models, by_schema: memo, roots, anchors })
    }

    // ————————————————————————————————————————————————————————————————————————
    // CORE
    // ————————————————————————————————————————————————————————————————————————

    fn synthesize_in(
        &mut self,
        id: SchemaId,
        path: &[String],
        stack: &[&'a Discriminator],
    ) -> Result<Option<TypeRef>, SchemaError> {
        let doc = self.doc;
        let schema = &doc[id];

        // 1) scalars and arrays never become models
        match schema.ty {
            Some(ty) if ty.is_scalar() => {
                let scalar = self.registry.resolve(ty, schema.format.as_deref())?;
                return Ok(Some(TypeRef::Scalar(scalar)));
            }
            Some(PrimitiveType::Array) => {
                let items = schema
                    .items
                    .as_ref()
                    .ok_or_else(|| SchemaError::MissingItems { identity: schema.label().to_string() })?;
                let item = self.element_type(items)?;
                return Ok(Some(TypeRef::Array(Box::new(item))));
            }
            _ => {}
        }

        // 2) memo
        if let Some(&model) = self.memo.get(&id) {
            if self.union_chain.contains(&id) {
                return Err(SchemaError::CyclicUnion { identity: schema.label().to_string() });
            }
            trace!(schema = schema.label(), "memo hit");
            return Ok(Some(TypeRef::Model(model)));
        }

        // 3) anchors
        if schema.is_anchor() {
            self.register_anchor(id, path, stack)?;
            return Ok(None);
        }

        let name = self.model_name(schema);
        let model = self.reserve(id);
        let kind = match schema.combination() {
            Combination::AllOf(_) => ModelKind::Object { fields: self.merged_fields(id, &name, path, stack)? },
            Combination::AnyOf(members) | Combination::OneOf(members) => self.union(id, members, path, stack)?,
            Combination::None => ModelKind::Object { fields: self.fields_of(schema, path, stack)? },
        };
        debug!(model = %name, schema = schema.label(), union = matches!(kind, ModelKind::Union { .. }), "synthesized model");
        self.slots[model.0] = Some(Model { name, schema: id, kind });
        Ok(Some(TypeRef::Model(model)))
    }

    /// Type of a property or array item. Context does not cross into children.
    fn element_type(&mut self, edge: &SchemaRef) -> Result<TypeRef, SchemaError> {
        let chain = std::mem::take(&mut self.union_chain);
        let ty = self.synthesize_in(edge.id, &[], &[]);
        self.union_chain = chain;
        Ok(ty?.unwrap_or(TypeRef::Anchor(edge.id)))
    }

    fn fields_of(
        &mut self,
        schema: &'a Schema,
        path: &[String],
        stack: &[&'a Discriminator],
    ) -> Result<Vec<Field>, SchemaError> {
        let doc = self.doc;
        let mut fields = Vec::with_capacity(schema.properties.len());
        for (name, edge) in &schema.properties {
            let ty = match narrow(name, path, stack)? {
                Some(tag) => TypeRef::Literal(tag),
                None => self.element_type(edge)?,
            };
            let child = &doc[edge.id];
            fields.push(Field {
                name: name.clone(),
                ty,
                required: schema.is_required(name, edge),
                default: child.default.clone(),
                enum_: child.enum_.clone(),
            });
        }
        Ok(fields)
    }

    // -------------------------------- allOf ------------------------------- //

    fn merged_fields(
        &mut self,
        id: SchemaId,
        model: &str,
        path: &[String],
        stack: &[&'a Discriminator],
    ) -> Result<Vec<Field>, SchemaError> {
        let doc = self.doc;
        let schema = &doc[id];
        if !self.merging.insert(id) {
            return Err(SchemaError::CyclicAllOf { identity: schema.label().to_string() });
        }
        let merged = self.merge_members(schema, model, path, stack);
        self.merging.remove(&id);
        merged
    }

    fn merge_members(
        &mut self,
        schema: &'a Schema,
        model: &str,
        path: &[String],
        stack: &[&'a Discriminator],
    ) -> Result<Vec<Field>, SchemaError> {
        let doc = self.doc;
        let mut merged: IndexMap<String, Field> = IndexMap::new();
        for member in &schema.all_of {
            let part = &doc[member.id];
            let contributed = match part.combination() {
                Combination::AllOf(_) => self.merged_fields(member.id, model, path, stack)?,
                Combination::None if matches!(part.ty, None | Some(PrimitiveType::Object)) => {
                    self.fields_of(part, path, stack)?
                }
                _ => {
                    return Err(SchemaError::UnmergeableMember {
                        identity: schema.label().to_string(),
                        member: member.reference.clone().unwrap_or_else(|| part.label().to_string()),
                    });
                }
            };
            absorb(&mut merged, contributed, model)?;
        }
        let own = self.fields_of(schema, path, stack)?;
        absorb(&mut merged, own, model)?;

        // the owner may require fields its members only declare
        if !schema.dialect.is_legacy() {
            for name in &schema.required {
                if let Some(field) = merged.get_mut(name) {
                    field.required = true;
                }
            }
        }
        Ok(merged.into_values().collect())
    }

    // ---------------------------- anyOf / oneOf --------------------------- //

    fn union(
        &mut self,
        id: SchemaId,
        members: &'a [SchemaRef],
        path: &[String],
        stack: &[&'a Discriminator],
    ) -> Result<ModelKind, SchemaError> {
        let doc = self.doc;
        self.union_chain.push(id);
        let kind = self.union_members(&doc[id], members, path, stack);
        self.union_chain.pop();
        kind
    }

    fn union_members(
        &mut self,
        schema: &'a Schema,
        members: &'a [SchemaRef],
        path: &[String],
        stack: &[&'a Discriminator],
    ) -> Result<ModelKind, SchemaError> {
        let mut inner = stack.to_vec();
        if let Some(discriminator) = &schema.discriminator {
            inner.push(discriminator);
        }

        let mut alternatives = Vec::with_capacity(members.len());
        let mut origins: Vec<&SchemaRef> = Vec::with_capacity(members.len());
        for member in members {
            let mut member_path = path.to_vec();
            member_path.push(self.step(member));
            match self.synthesize_in(member.id, &member_path, &inner)? {
                Some(ty) => {
                    alternatives.push(ty);
                    origins.push(member);
                }
                None => trace!(member = self.doc[member.id].label(), "anchor member adds no alternative"),
            }
        }

        let mut tags = IndexMap::new();
        if let Some(mapping) = schema.discriminator.as_ref().and_then(|d| d.mapping.as_ref()) {
            for (tag, target) in mapping {
                match origins.iter().position(|m| self.member_matches(m, target)) {
                    Some(index) => {
                        tags.insert(tag.clone(), index);
                    }
                    None => warn!(union = schema.label(), %tag, %target, "discriminator mapping names no member"),
                }
            }
        }

        Ok(ModelKind::Union { alternatives, discriminator: schema.discriminator.clone(), tags })
    }

    // ------------------------------- anchors ------------------------------ //

    fn register_anchor(
        &mut self,
        id: SchemaId,
        path: &[String],
        stack: &[&'a Discriminator],
    ) -> Result<(), SchemaError> {
        if self.anchors.contains_key(&id) {
            return Ok(());
        }
        let doc = self.doc;
        let schema = &doc[id];
        self.anchors.insert(id, Anchor { name: schema.label().to_string(), variants: Vec::new() });

        let Some(discriminator) = &schema.discriminator else {
            return Ok(());
        };
        let Some(mapping) = &discriminator.mapping else {
            return Ok(());
        };
        let mut inner = stack.to_vec();
        inner.push(discriminator);

        let mut variants: IndexSet<ModelId> = IndexSet::new();
        for target in mapping.values() {
            let variant = doc
                .resolve_reference(target)
                .ok_or_else(|| SchemaError::UnresolvedReference { reference: target.clone() })?;
            let mut variant_path = path.to_vec();
            variant_path.push(target.clone());
            if let Some(TypeRef::Model(model)) = self.synthesize_in(variant, &variant_path, &inner)? {
                variants.insert(model);
            }
        }
        debug!(anchor = schema.label(), variants = variants.len(), "registered anchor variants");
        if let Some(anchor) = self.anchors.get_mut(&id) {
            anchor.variants = variants.into_iter().collect();
        }
        Ok(())
    }

    // ------------------------------- helpers ------------------------------ //

    fn reserve(&mut self, id: SchemaId) -> ModelId {
        let model = ModelId(self.slots.len());
        self.slots.push(None);
        self.memo.insert(id, model);
        model
    }

    fn model_name(&mut self, schema: &Schema) -> String {
        if let Some(name) = schema.title.as_ref().or(schema.identity.as_ref()) {
            return name.clone();
        }
        self.anonymous += 1;
        format!("Anonymous{}", self.anonymous)
    }

    /// Path step recorded when descending into a union member.
    fn step(&self, member: &SchemaRef) -> String {
        member
            .reference
            .clone()
            .unwrap_or_else(|| self.doc[member.id].label().to_string())
    }

    fn member_matches(&self, member: &SchemaRef, target: &str) -> bool {
        self.doc.resolve_reference(target) == Some(member.id)
            || member.reference.as_deref().is_some_and(|r| reference_matches(target, r))
    }
}

/// Tag a discriminated property narrows to, if an enclosing discriminator names it.
fn narrow(name: &str, path: &[String], stack: &[&Discriminator]) -> Result<Option<String>, SchemaError> {
    let Some(discriminator) = stack.iter().find(|d| d.property_name == name) else {
        return Ok(None);
    };
    if !discriminator.is_tagged() {
        return Ok(None);
    }
    match discriminator.tag_for_path(path) {
        Some(tag) => Ok(Some(tag.to_string())),
        None => Err(SchemaError::UncoveredDiscriminator { property: name.to_string(), path: path.join(", ") }),
    }
}

/// First writer wins for identical redefinitions; differing types are an error.
fn absorb(merged: &mut IndexMap<String, Field>, fields: Vec<Field>, model: &str) -> Result<(), SchemaError> {
    for field in fields {
        match merged.get_mut(&field.name) {
            None => {
                merged.insert(field.name.clone(), field);
            }
            Some(existing) if existing.ty == field.ty => {
                existing.required |= field.required;
                if existing.default.is_none() {
                    existing.default = field.default;
                }
                if existing.enum_.is_none() {
                    existing.enum_ = field.enum_;
                }
            }
            Some(_) => {
                return Err(SchemaError::ConflictingField { model: model.to_string(), field: field.name });
            }
        }
    }
    Ok(())
}

// ------------------------------- Tests ------------------------------------ //
