//! Mutator contexts.
//!
//! A context gives one visit read access to the graph as it stood when the
//! pass began, plus a private [`VisitEffects`] buffer. Every mutation a
//! visit requests lands in that buffer and is applied by the single-threaded
//! merge at pass end, so visits never observe each other's effects.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use mutagraph_core::{
    Dependency, DependencyRequest, DependencyTag, GraphError, MatchMode, Properties, PropertyBag,
    PropertyError, UnitId, Variant, VariantId, VariationList, VariationMap,
};

use crate::error::{PipelineError, UnitError, UnitErrorKind};
use crate::factory::{self, NewUnit};
use crate::module::{ModuleFactory, ModuleGraph, ModuleRef};

/// Filter for [`BaseContext::replace_dependencies_if`]: called with the
/// edge's source variant, its tag and the old target.
pub type ReplacePredicate =
    Arc<dyn Fn(&Variant<ModuleRef>, &DependencyTag, &Variant<ModuleRef>) -> bool + Send + Sync>;

/// A requested split of the visited variant.
#[derive(Debug, Clone)]
pub(crate) struct SplitRequest {
    pub(crate) names: Vec<String>,
    pub(crate) local: bool,
    /// Per-child property overrides, by position.
    pub(crate) properties: Vec<Option<Properties>>,
}

/// An alias to register once the split commits.
#[derive(Debug, Clone)]
pub(crate) struct AliasRequest {
    /// `None` keys the alias on the parent's variations alone.
    pub(crate) from: Option<String>,
    pub(crate) to: String,
}

#[derive(Debug, Clone)]
pub(crate) struct InterVariantDependency {
    pub(crate) tag: DependencyTag,
    pub(crate) from: String,
    pub(crate) to: String,
}

#[derive(Clone)]
pub(crate) struct Replacement {
    pub(crate) unit: UnitId,
    pub(crate) predicate: Option<ReplacePredicate>,
}

impl std::fmt::Debug for Replacement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replacement")
            .field("unit", &self.unit)
            .field("filtered", &self.predicate.is_some())
            .finish()
    }
}

/// Everything one visit asked for.
#[derive(Debug)]
pub struct VisitEffects {
    pub(crate) variant: VariantId,
    pub(crate) properties: Option<Properties>,
    pub(crate) default_variations: Vec<(String, Option<String>)>,
    pub(crate) dependency_variation: Option<String>,
    pub(crate) deps: Vec<Dependency>,
    pub(crate) reverse_deps: Vec<(UnitId, DependencyTag)>,
    pub(crate) split: Option<SplitRequest>,
    pub(crate) aliases: Vec<AliasRequest>,
    pub(crate) inter_variant_deps: Vec<InterVariantDependency>,
    pub(crate) replacements: Vec<Replacement>,
    pub(crate) rename: Option<String>,
    pub(crate) created: Vec<NewUnit>,
    pub(crate) unit_errors: Vec<UnitError>,
    pub(crate) fatal: Option<PipelineError>,
}

impl VisitEffects {
    fn new(variant: VariantId) -> Self {
        Self {
            variant,
            properties: None,
            default_variations: Vec::new(),
            dependency_variation: None,
            deps: Vec::new(),
            reverse_deps: Vec::new(),
            split: None,
            aliases: Vec::new(),
            inter_variant_deps: Vec::new(),
            replacements: Vec::new(),
            rename: None,
            created: Vec::new(),
            unit_errors: Vec::new(),
            fatal: None,
        }
    }

    pub fn variant(&self) -> VariantId {
        self.variant
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_none()
            && self.default_variations.is_empty()
            && self.dependency_variation.is_none()
            && self.deps.is_empty()
            && self.reverse_deps.is_empty()
            && self.split.is_none()
            && self.aliases.is_empty()
            && self.inter_variant_deps.is_empty()
            && self.replacements.is_empty()
            && self.rename.is_none()
            && self.created.is_empty()
            && self.unit_errors.is_empty()
    }
}

/// Handle to one child of a split requested in the current visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitChild {
    index: usize,
    value: String,
}

impl SplitChild {
    /// The variation value this child will carry.
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Operations available to every mutator.
pub struct BaseContext<'g> {
    graph: &'g ModuleGraph,
    variant: &'g Variant<ModuleRef>,
    unit_name: &'g str,
    mutator: &'g str,
    final_phase: bool,
    effects: VisitEffects,
}

impl<'g> BaseContext<'g> {
    pub(crate) fn new(
        graph: &'g ModuleGraph,
        id: VariantId,
        mutator: &'g str,
        final_phase: bool,
    ) -> Result<Self, PipelineError> {
        let variant = graph
            .variant(id)
            .ok_or(GraphError::VariantNotFound(id))?;
        let unit_name = graph
            .unit(variant.unit())
            .map(|u| u.name())
            .ok_or(GraphError::UnitNotFound(variant.unit()))?;
        Ok(Self {
            graph,
            variant,
            unit_name,
            mutator,
            final_phase,
            effects: VisitEffects::new(id),
        })
    }

    /// Close the visit. A fatal error recorded by a split attempt fails the
    /// visit even if the mutator discarded it.
    pub(crate) fn finish(mut self) -> Result<VisitEffects, PipelineError> {
        match self.effects.fatal.take() {
            Some(err) => Err(err),
            None => Ok(self.effects),
        }
    }

    /// The graph as it stood when the pass began.
    pub fn graph(&self) -> &'g ModuleGraph {
        self.graph
    }

    pub fn mutator_name(&self) -> &'g str {
        self.mutator
    }

    pub fn is_final_phase(&self) -> bool {
        self.final_phase
    }

    pub fn variant_id(&self) -> VariantId {
        self.variant.id()
    }

    pub fn unit_name(&self) -> &'g str {
        self.unit_name
    }

    pub fn module(&self) -> &'g ModuleRef {
        self.variant.payload()
    }

    pub fn variations(&self) -> &'g VariationList {
        self.variant.variations()
    }

    /// This variant's value on `axis`.
    pub fn variation(&self, axis: &str) -> Option<&'g str> {
        self.variant.variations().get(axis)
    }

    /// The variant's properties, including changes made during this visit.
    pub fn properties(&self) -> &Properties {
        self.effects
            .properties
            .as_ref()
            .unwrap_or_else(|| self.variant.properties())
    }

    /// Mutable properties; written back at pass end.
    pub fn properties_mut(&mut self) -> &mut Properties {
        let current = self.variant.properties();
        self.effects
            .properties
            .get_or_insert_with(|| current.clone())
    }

    /// Append configuration values; field-level failures become unit errors.
    pub fn append_properties(&mut self, src: &PropertyBag) {
        let result = self.properties_mut().append(src);
        if let Err(errors) = result {
            self.config_errors(errors);
        }
    }

    /// Prepend configuration values; field-level failures become unit errors.
    pub fn prepend_properties(&mut self, src: &PropertyBag) {
        let result = self.properties_mut().prepend(src);
        if let Err(errors) = result {
            self.config_errors(errors);
        }
    }

    fn config_errors(&mut self, errors: Vec<PropertyError>) {
        for err in errors {
            self.unit_error(UnitErrorKind::ConfigurationValidation(err));
        }
    }

    fn unit_error(&mut self, kind: UnitErrorKind) {
        self.effects.unit_errors.push(UnitError {
            unit: self.unit_name.to_string(),
            mutator: self.mutator.to_string(),
            kind,
        });
    }

    /// Report a problem with one of this unit's properties. The pass still
    /// completes; the run stops after it.
    pub fn property_error(&mut self, property: &str, message: impl Into<String>) {
        self.unit_error(UnitErrorKind::Property {
            property: property.to_string(),
            message: message.into(),
        });
    }

    /// Build a free-form fatal error attributed to this visit.
    pub fn fail(&self, message: impl Into<String>) -> PipelineError {
        PipelineError::Mutator {
            mutator: self.mutator.to_string(),
            unit: self.graph.describe(self.variant.id()),
            message: message.into(),
        }
    }

    /// Rename the unit. Takes effect at pass end.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.effects.rename = Some(name.into());
    }

    /// Call `visit` for each resolved dependency of this variant, in order.
    pub fn visit_direct_deps(
        &self,
        mut visit: impl FnMut(&'g DependencyTag, &'g Variant<ModuleRef>),
    ) {
        for dep in self.variant.deps() {
            if let Some(target) = dep.resolved_target().and_then(|id| self.graph.variant(id)) {
                visit(&dep.tag, target);
            }
        }
    }

    fn lookup_unit(&self, name: &str) -> Result<UnitId, PipelineError> {
        self.graph
            .unit_id(name)
            .ok_or_else(|| PipelineError::UndefinedUnit {
                dependent: self.graph.describe(self.variant.id()),
                target: name.to_string(),
            })
    }

    /// Redirect every edge pointing at `unit`'s variant with this variant's
    /// variations to this variant.
    pub fn replace_dependencies(&mut self, unit: &str) -> Result<(), PipelineError> {
        let unit = self.lookup_unit(unit)?;
        self.effects.replacements.push(Replacement {
            unit,
            predicate: None,
        });
        Ok(())
    }

    /// Like [`replace_dependencies`](Self::replace_dependencies), for the
    /// edges `predicate` accepts.
    pub fn replace_dependencies_if<F>(
        &mut self,
        unit: &str,
        predicate: F,
    ) -> Result<(), PipelineError>
    where
        F: Fn(&Variant<ModuleRef>, &DependencyTag, &Variant<ModuleRef>) -> bool
            + Send
            + Sync
            + 'static,
    {
        let unit = self.lookup_unit(unit)?;
        self.effects.replacements.push(Replacement {
            unit,
            predicate: Some(Arc::new(predicate)),
        });
        Ok(())
    }
}

/// Context for bottom-up mutators: dependencies, splits and aliases.
pub struct BottomUpContext<'g> {
    base: BaseContext<'g>,
}

impl<'g> Deref for BottomUpContext<'g> {
    type Target = BaseContext<'g>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl<'g> DerefMut for BottomUpContext<'g> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.base
    }
}

impl<'g> BottomUpContext<'g> {
    pub(crate) fn new(base: BaseContext<'g>) -> Self {
        Self { base }
    }

    pub(crate) fn finish(self) -> Result<VisitEffects, PipelineError> {
        self.base.finish()
    }

    fn queue(
        &mut self,
        tag: &DependencyTag,
        constraints: &VariationMap,
        mode: MatchMode,
        names: &[&str],
    ) -> Result<(), PipelineError> {
        let queued_at = self.base.graph.generation();
        let requester = self.base.variant.variations().dependency_map();
        for name in names {
            let unit = self.base.lookup_unit(name)?;
            self.base.effects.deps.push(Dependency::deferred(
                tag.clone(),
                DependencyRequest {
                    unit,
                    constraints: constraints.clone(),
                    mode,
                    requester: requester.clone(),
                    queued_at,
                },
            ));
        }
        Ok(())
    }

    /// Depend on each named unit's variant with this variant's variations.
    pub fn add_dependency(
        &mut self,
        tag: &DependencyTag,
        names: &[&str],
    ) -> Result<(), PipelineError> {
        self.queue(tag, &VariationMap::new(), MatchMode::Exact, names)
    }

    /// Depend on each named unit's variant with this variant's variations
    /// overlaid by `variations`.
    pub fn add_variation_dependencies(
        &mut self,
        variations: &VariationMap,
        tag: &DependencyTag,
        names: &[&str],
    ) -> Result<(), PipelineError> {
        self.queue(tag, variations, MatchMode::Exact, names)
    }

    /// Depend on the first variant of each named unit that carries
    /// `variations`, whatever this variant's own variations are.
    pub fn add_far_variation_dependencies(
        &mut self,
        variations: &VariationMap,
        tag: &DependencyTag,
        names: &[&str],
    ) -> Result<(), PipelineError> {
        self.queue(tag, variations, MatchMode::Far, names)
    }

    /// Make the variant of `unit` with this variant's variations depend on
    /// this variant.
    pub fn add_reverse_dependency(
        &mut self,
        tag: &DependencyTag,
        unit: &str,
    ) -> Result<(), PipelineError> {
        let unit = self.base.lookup_unit(unit)?;
        self.base.effects.reverse_deps.push((unit, tag.clone()));
        Ok(())
    }

    /// Split this variant along this mutator's axis.
    pub fn create_variations(
        &mut self,
        names: &[&str],
    ) -> Result<Vec<SplitChild>, PipelineError> {
        self.split(names, false)
    }

    /// Split this variant along a local axis: dependents must name the
    /// variation explicitly to reach the children.
    pub fn create_local_variations(
        &mut self,
        names: &[&str],
    ) -> Result<Vec<SplitChild>, PipelineError> {
        self.split(names, true)
    }

    fn illegal_split(&self) -> PipelineError {
        PipelineError::IllegalSplit {
            mutator: self.base.mutator.to_string(),
            unit: self.base.graph.describe(self.base.variant.id()),
        }
    }

    fn split(&mut self, names: &[&str], local: bool) -> Result<Vec<SplitChild>, PipelineError> {
        if self.base.final_phase {
            let recorded = self.illegal_split();
            self.base.effects.fatal.get_or_insert(recorded);
            return Err(self.illegal_split());
        }
        if self.base.effects.split.is_some() {
            return Err(self.base.fail("variations were already created in this visit"));
        }
        self.base.effects.split = Some(SplitRequest {
            names: names.iter().map(|n| n.to_string()).collect(),
            local,
            properties: vec![None; names.len()],
        });
        Ok(names
            .iter()
            .enumerate()
            .map(|(index, value)| SplitChild {
                index,
                value: value.to_string(),
            })
            .collect())
    }

    /// Properties the child will start with; defaults to the parent's.
    pub fn child_properties_mut(&mut self, child: &SplitChild) -> Option<&mut Properties> {
        let parent = self.base.properties().clone();
        let split = self.base.effects.split.as_mut()?;
        let slot = split.properties.get_mut(child.index)?;
        Some(slot.get_or_insert(parent))
    }

    /// Add an edge from one child of this visit's split to another.
    pub fn add_inter_variant_dependency(
        &mut self,
        tag: &DependencyTag,
        from: &SplitChild,
        to: &SplitChild,
    ) {
        self.base.effects.inter_variant_deps.push(InterVariantDependency {
            tag: tag.clone(),
            from: from.value.clone(),
            to: to.value.clone(),
        });
    }

    /// Route requests that describe this variant's pre-split variations to
    /// the child `variation`.
    pub fn alias_variation(&mut self, variation: &str) {
        self.base.effects.aliases.push(AliasRequest {
            from: None,
            to: variation.to_string(),
        });
    }

    /// Route requests naming `from` on this mutator's axis to the child `to`.
    pub fn create_alias_variation(&mut self, from: &str, to: &str) {
        self.base.effects.aliases.push(AliasRequest {
            from: Some(from.to_string()),
            to: to.to_string(),
        });
    }

    /// For the rest of this pass, edges from this variant into variants
    /// split by this mutator go to the child named `variation`.
    pub fn set_dependency_variation(&mut self, variation: &str) {
        self.base.effects.dependency_variation = Some(variation.to_string());
    }

    /// Fallback value for this mutator's axis when a dependency of this
    /// variant fails to bind. `None` clears it.
    pub fn set_default_dependency_variation(&mut self, variation: Option<&str>) {
        let axis = self.base.mutator.to_string();
        self.base
            .effects
            .default_variations
            .push((axis, variation.map(str::to_string)));
    }
}

/// Context for top-down mutators: adds unit creation.
pub struct TopDownContext<'g> {
    base: BaseContext<'g>,
}

impl<'g> Deref for TopDownContext<'g> {
    type Target = BaseContext<'g>;

    fn deref(&self) -> &Self::Target {
        &self.base
    }
}

impl<'g> DerefMut for TopDownContext<'g> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.base
    }
}

impl<'g> TopDownContext<'g> {
    pub(crate) fn new(base: BaseContext<'g>) -> Self {
        Self { base }
    }

    pub(crate) fn finish(self) -> Result<VisitEffects, PipelineError> {
        self.base.finish()
    }

    /// Create a unit from `factory`, inheriting this unit's common
    /// properties and applying `extra` on top. The new unit's name comes
    /// from a `name` entry in `extra`. It joins the graph at pass end.
    ///
    /// Returns the new unit's name, or `None` if its properties could not be
    /// merged (the failures are reported as unit errors).
    pub fn create_module(
        &mut self,
        factory: &dyn ModuleFactory,
        extra: &[PropertyBag],
    ) -> Option<String> {
        let requester = self.base.properties().clone();
        match factory::instantiate(factory, &requester, extra) {
            Ok(unit) => {
                let name = unit.name.clone();
                self.base.effects.created.push(unit);
                Some(name)
            }
            Err(errors) => {
                for err in errors {
                    self.base.unit_error(UnitErrorKind::PropertyMerge(err));
                }
                None
            }
        }
    }
}
