//! The variant store and edge table.
//!
//! A [`VariantGraph`] owns every unit, every variant ever created (live or
//! obsolete), each variant's dependency list, and the alias registry. It
//! exposes the primitive operations the pass executor composes: adding
//! units, splitting a variant, renaming a unit, replacing and repointing
//! edges, and ordering variants for traversal.

pub mod edge;
pub mod unit;

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

use self::edge::{Dependency, DependencyTag, DependencyTarget};
use self::unit::{SplitRecord, Unit, UnitId, Variant, VariantId, VariantState};
use crate::alias::{Alias, AliasRegistry};
use crate::binder::BindError;
use crate::props::Properties;
use crate::resolved::{ResolvedEdge, ResolvedGraph, ResolvedVariant};
use crate::variation::{format_map, Variation, VariationList, VariationMap};

/// Errors from structural operations on the variant store.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unit not found: {0}")]
    UnitNotFound(UnitId),

    #[error("variant not found: {0}")]
    VariantNotFound(VariantId),

    #[error("duplicate unit name: {0}")]
    DuplicateUnit(String),

    #[error("variant {0} has already been split")]
    AlreadySplit(String),

    #[error("split of {variant} requested no variations")]
    EmptySplit { variant: String },

    #[error("split of {variant} repeats variation {variation}")]
    DuplicateVariation { variant: String, variation: String },

    #[error("dependency cycle involving {0}")]
    CycleDetected(String),

    #[error("{variant} has an unbound dependency on {target}")]
    UnboundDependency { variant: String, target: String },
}

/// One child to create in a split.
#[derive(Debug, Clone)]
pub struct ChildSpec<M> {
    /// Split name, recorded as the variation value.
    pub value: String,
    pub payload: M,
    pub properties: Properties,
}

/// The container for units, variants and their edges.
#[derive(Debug, Clone)]
pub struct VariantGraph<M> {
    units: Vec<Unit>,
    names: HashMap<String, UnitId>,
    variants: Vec<Variant<M>>,
    aliases: AliasRegistry,
    /// Incremented at the end of every pass.
    generation: u64,
}

impl<M> Default for VariantGraph<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> VariantGraph<M> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            units: Vec::new(),
            names: HashMap::new(),
            variants: Vec::new(),
            aliases: AliasRegistry::new(),
            generation: 0,
        }
    }

    /// Add a unit with a single unsplit variant.
    pub fn add_unit(
        &mut self,
        name: &str,
        payload: M,
        properties: Properties,
    ) -> Result<VariantId, GraphError> {
        if self.names.contains_key(name) {
            return Err(GraphError::DuplicateUnit(name.to_string()));
        }
        let unit_id = UnitId(self.units.len());
        let variant_id = VariantId(self.variants.len());
        self.variants.push(Variant {
            id: variant_id,
            unit: unit_id,
            variations: VariationList::new(),
            payload,
            properties,
            deps: Vec::new(),
            history: Vec::new(),
            debug_name: name.to_string(),
            default_variations: VariationMap::new(),
            dependency_variation: None,
            state: VariantState::Live,
        });
        self.units.push(Unit {
            id: unit_id,
            name: name.to_string(),
            variants: vec![variant_id],
            split_generation: None,
        });
        self.names.insert(name.to_string(), unit_id);
        Ok(variant_id)
    }

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(id.0)
    }

    pub fn unit_id(&self, name: &str) -> Option<UnitId> {
        self.names.get(name).copied()
    }

    pub fn unit_by_name(&self, name: &str) -> Option<&Unit> {
        self.unit_id(name).and_then(|id| self.unit(id))
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter()
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn variant(&self, id: VariantId) -> Option<&Variant<M>> {
        self.variants.get(id.0)
    }

    pub fn variant_mut(&mut self, id: VariantId) -> Option<&mut Variant<M>> {
        self.variants.get_mut(id.0)
    }

    /// Live variants in id (creation) order.
    pub fn live_variants(&self) -> impl Iterator<Item = &Variant<M>> {
        self.variants.iter().filter(|v| v.is_live())
    }

    pub fn live_variant_count(&self) -> usize {
        self.live_variants().count()
    }

    /// Live variants of the named unit, in the unit's order.
    pub fn variants_of(&self, name: &str) -> Vec<&Variant<M>> {
        self.unit_by_name(name)
            .map(|unit| unit.variants.iter().map(|id| &self.variants[id.0]).collect())
            .unwrap_or_default()
    }

    /// Name of the unit owning a variant.
    pub fn unit_name_of(&self, id: VariantId) -> Option<&str> {
        self.variant(id)
            .and_then(|v| self.unit(v.unit))
            .map(|u| u.name.as_str())
    }

    /// Diagnostic name of a variant: `unit` or `unit#value_value`.
    pub fn describe(&self, id: VariantId) -> String {
        match self.variant(id) {
            Some(v) => {
                let name = &self.units[v.unit.0].name;
                if v.variations.is_empty() {
                    name.clone()
                } else {
                    format!("{name}#{}", v.variations.variant_name())
                }
            }
            None => id.to_string(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn aliases(&self) -> &AliasRegistry {
        &self.aliases
    }

    /// Replace the alias set of a unit (an empty set clears it).
    pub fn set_aliases(&mut self, unit: UnitId, aliases: Vec<Alias>) {
        self.aliases.replace(unit, aliases);
    }

    /// Append a dependency to a variant's list.
    pub fn add_dependency(&mut self, from: VariantId, dep: Dependency) -> Result<(), GraphError> {
        let variant = self
            .variants
            .get_mut(from.0)
            .ok_or(GraphError::VariantNotFound(from))?;
        variant.deps.push(dep);
        Ok(())
    }

    pub(crate) fn set_dependency_target(
        &mut self,
        variant: VariantId,
        index: usize,
        target: VariantId,
    ) {
        if let Some(dep) = self
            .variants
            .get_mut(variant.0)
            .and_then(|v| v.deps.get_mut(index))
        {
            dep.target = DependencyTarget::Resolved(target);
        }
    }

    /// Split a live variant into one child per [`ChildSpec`], in order.
    ///
    /// Each child gets the parent's variations plus `(axis, value)`, a copy
    /// of the parent's dependency list, and the parent's history extended by
    /// the split. The children take the parent's place in the unit's variant
    /// list and the parent becomes obsolete.
    pub fn split(
        &mut self,
        parent: VariantId,
        axis: &str,
        children: Vec<ChildSpec<M>>,
        local: bool,
    ) -> Result<Vec<VariantId>, GraphError> {
        let template = self
            .variants
            .get(parent.0)
            .ok_or(GraphError::VariantNotFound(parent))?;
        if !template.is_live() {
            return Err(GraphError::AlreadySplit(self.describe(parent)));
        }
        if children.is_empty() {
            return Err(GraphError::EmptySplit {
                variant: self.describe(parent),
            });
        }
        let mut seen = BTreeSet::new();
        for child in &children {
            if !seen.insert(child.value.as_str()) {
                return Err(GraphError::DuplicateVariation {
                    variant: self.describe(parent),
                    variation: child.value.clone(),
                });
            }
        }

        let unit = template.unit;
        let base = template.variations.clone();
        let deps: Vec<Dependency> = template.deps.clone();
        let history = template.history.clone();
        let debug_name = template.debug_name.clone();
        let default_variations = template.default_variations.clone();
        let dependency_variation = template.dependency_variation.clone();

        let mut ids = Vec::with_capacity(children.len());
        for child in children {
            let id = VariantId(self.variants.len());
            let variation = if local {
                Variation::local(axis, child.value.clone())
            } else {
                Variation::new(axis, child.value.clone())
            };
            let mut child_history = history.clone();
            child_history.push(SplitRecord {
                mutator: axis.to_string(),
                variation: child.value,
            });
            self.variants.push(Variant {
                id,
                unit,
                variations: base.extended(variation),
                payload: child.payload,
                properties: child.properties,
                deps: deps.iter().map(Dependency::duplicate).collect(),
                history: child_history,
                debug_name: debug_name.clone(),
                default_variations: default_variations.clone(),
                dependency_variation: dependency_variation.clone(),
                state: VariantState::Live,
            });
            ids.push(id);
        }

        let owner = &mut self.units[unit.0];
        if let Some(pos) = owner.variants.iter().position(|v| *v == parent) {
            owner.variants.splice(pos..=pos, ids.iter().copied());
        }
        owner.split_generation = Some(self.generation);
        self.variants[parent.0].state = VariantState::Split {
            axis: axis.to_string(),
            local,
            children: ids.clone(),
            generation: self.generation,
        };
        Ok(ids)
    }

    /// Rename a unit. All of its variants pick up the new debug name.
    pub fn rename_unit(&mut self, unit: UnitId, new_name: &str) -> Result<(), GraphError> {
        let old = self
            .units
            .get(unit.0)
            .ok_or(GraphError::UnitNotFound(unit))?
            .name
            .clone();
        if old == new_name {
            return Ok(());
        }
        if self.names.contains_key(new_name) {
            return Err(GraphError::DuplicateUnit(new_name.to_string()));
        }
        self.names.remove(&old);
        self.names.insert(new_name.to_string(), unit);
        self.units[unit.0].name = new_name.to_string();
        for variant in self.variants.iter_mut().filter(|v| v.unit == unit) {
            variant.debug_name = new_name.to_string();
        }
        Ok(())
    }

    /// The variant of `unit` whose full variation list equals `variations`.
    /// Live variants are preferred; an obsolete one is returned only when no
    /// live variant matches.
    pub fn find_identical(&self, unit: UnitId, variations: &VariationList) -> Option<VariantId> {
        let wanted = variations.to_map();
        let owner = self.unit(unit)?;
        owner
            .variants
            .iter()
            .copied()
            .find(|id| self.variants[id.0].variations.to_map() == wanted)
            .or_else(|| {
                self.variants
                    .iter()
                    .filter(|v| v.unit == unit && !v.is_live())
                    .find(|v| v.variations.to_map() == wanted)
                    .map(|v| v.id)
            })
    }

    /// Variants of `unit` that were live when pass `generation` began and
    /// were split during it, in creation order.
    pub fn split_during(
        &self,
        unit: UnitId,
        generation: u64,
    ) -> impl Iterator<Item = &Variant<M>> {
        self.variants.iter().filter(move |v| {
            v.unit == unit
                && matches!(v.state, VariantState::Split { generation: g, .. } if g == generation)
        })
    }

    /// Redirect every resolved edge pointing at `old` to `new`, when
    /// `predicate(source, tag, old)` allows it. `new` never gains an edge to
    /// itself. Returns the number of edges replaced.
    pub fn replace_edges(
        &mut self,
        old: VariantId,
        new: VariantId,
        predicate: impl Fn(&Variant<M>, &DependencyTag, &Variant<M>) -> bool,
    ) -> usize {
        let Some(old_variant) = self.variants.get(old.0) else {
            return 0;
        };
        let mut hits = Vec::new();
        for variant in self.variants.iter().filter(|v| v.is_live() && v.id != new) {
            for (index, dep) in variant.deps.iter().enumerate() {
                if dep.resolved_target() == Some(old) && predicate(variant, &dep.tag, old_variant) {
                    hits.push((variant.id, index));
                }
            }
        }
        for &(variant, index) in &hits {
            self.set_dependency_target(variant, index, new);
        }
        hits.len()
    }

    /// Repoint resolved edges whose target has been split.
    ///
    /// For each such edge, in order of preference: the child carrying the
    /// dependent's own value on the split axis (or the dependent's default
    /// for that axis); the child named by the dependent's pass-scoped
    /// dependency variation; the first child, unless the split was local.
    pub fn repoint_split_edges(&mut self) -> Result<usize, BindError> {
        let mut updates = Vec::new();
        for variant in self.live_variants() {
            for (index, dep) in variant.deps.iter().enumerate() {
                let Some(original) = dep.resolved_target() else {
                    continue;
                };
                let mut target = original;
                while let VariantState::Split {
                    axis,
                    local,
                    children,
                    ..
                } = &self.variants[target.0].state
                {
                    target = self
                        .split_child_for(variant, axis, *local, children)
                        .map_err(|wanted| BindError {
                            dependent: self.describe(variant.id),
                            target: self.unit_name_of(original).unwrap_or_default().to_string(),
                            constraints: format_map(&wanted),
                            available: children.iter().map(|c| self.describe(*c)).collect(),
                        })?;
                }
                if target != original {
                    updates.push((variant.id, index, target));
                }
            }
        }
        for &(variant, index, target) in &updates {
            self.set_dependency_target(variant, index, target);
        }
        Ok(updates.len())
    }

    fn split_child_for(
        &self,
        dependent: &Variant<M>,
        axis: &str,
        local: bool,
        children: &[VariantId],
    ) -> Result<VariantId, VariationMap> {
        let named = |value: &str| {
            children
                .iter()
                .copied()
                .find(|c| self.variants[c.0].variations.get(axis) == Some(value))
        };
        let wanted = |value: &str| VariationMap::from([(axis.to_string(), value.to_string())]);

        if let Some(value) = dependent.variations.get(axis) {
            return named(value)
                .or_else(|| {
                    dependent
                        .default_variations
                        .get(axis)
                        .and_then(|d| named(d))
                })
                .ok_or_else(|| wanted(value));
        }
        if let Some(value) = dependent.dependency_variation.as_deref() {
            return named(value).ok_or_else(|| wanted(value));
        }
        if !local {
            if let Some(first) = children.first() {
                return Ok(*first);
            }
        }
        Err(VariationMap::new())
    }

    /// Live variants ordered so that every variant comes after the live
    /// variants it depends on. Ties are broken by variant id.
    pub fn topological_order(&self) -> Result<Vec<VariantId>, GraphError> {
        let mut remaining: HashMap<VariantId, usize> = HashMap::new();
        let mut dependents: HashMap<VariantId, Vec<VariantId>> = HashMap::new();
        for variant in self.live_variants() {
            let mut count = 0;
            for target in variant.deps.iter().filter_map(Dependency::resolved_target) {
                if self.variants[target.0].is_live() {
                    count += 1;
                    dependents.entry(target).or_default().push(variant.id);
                }
            }
            remaining.insert(variant.id, count);
        }

        let mut ready: BTreeSet<VariantId> = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(remaining.len());
        while let Some(id) = ready.pop_first() {
            order.push(id);
            for dependent in dependents.get(&id).into_iter().flatten() {
                if let Some(count) = remaining.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }

        if order.len() < remaining.len() {
            let stuck = remaining
                .iter()
                .filter(|(_, count)| **count > 0)
                .map(|(id, _)| *id)
                .min()
                .unwrap_or(VariantId(0));
            return Err(GraphError::CycleDetected(self.describe(stuck)));
        }
        Ok(order)
    }

    /// Close the current pass: drop pass-scoped state and advance the generation.
    pub fn end_pass(&mut self) {
        for variant in &mut self.variants {
            variant.dependency_variation = None;
        }
        self.generation += 1;
    }

    /// Number of dependencies still waiting for the binder.
    pub fn deferred_count(&self) -> usize {
        self.live_variants()
            .flat_map(|v| v.deps.iter())
            .filter(|d| d.is_deferred())
            .count()
    }

    /// Snapshot of the fully bound graph, ordered by unit name then variant order.
    pub fn resolve(&self) -> Result<ResolvedGraph, GraphError> {
        let mut units: Vec<&Unit> = self.units.iter().collect();
        units.sort_by(|a, b| a.name.cmp(&b.name));

        let mut variants = Vec::with_capacity(self.variants.len());
        for unit in units {
            for &id in &unit.variants {
                let variant = &self.variants[id.0];
                let mut deps = Vec::with_capacity(variant.deps.len());
                for dep in &variant.deps {
                    match &dep.target {
                        DependencyTarget::Resolved(target) if self.variants[target.0].is_live() => {
                            let target_variant = &self.variants[target.0];
                            deps.push(ResolvedEdge {
                                tag: dep.tag.clone(),
                                unit: self.units[target_variant.unit.0].name.clone(),
                                variant: target_variant.variations.variant_name(),
                            });
                        }
                        DependencyTarget::Resolved(target) => {
                            return Err(GraphError::UnboundDependency {
                                variant: self.describe(id),
                                target: self.describe(*target),
                            });
                        }
                        DependencyTarget::Deferred(request) => {
                            return Err(GraphError::UnboundDependency {
                                variant: self.describe(id),
                                target: self
                                    .unit(request.unit)
                                    .map(|u| u.name.clone())
                                    .unwrap_or_else(|| request.unit.to_string()),
                            });
                        }
                    }
                }
                variants.push(ResolvedVariant {
                    unit: unit.name.clone(),
                    variant: variant.variations.variant_name(),
                    variations: variant.variations.clone(),
                    history: variant.history.clone(),
                    deps,
                });
            }
        }
        Ok(ResolvedGraph { variants })
    }
}
