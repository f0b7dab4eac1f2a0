//! Pass executor.
//!
//! A pass visits every live variant (dependencies first for bottom-up
//! mutators, dependents first for top-down ones), collecting one
//! [`VisitEffects`] per visit against the unchanged graph. Parallel
//! mutators visit on the worker pool. The effects are then merged into the
//! graph by a single thread, in variant-id order, so the result does not
//! depend on scheduling.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use mutagraph_core::{
    bind_deferred, format_map, Alias, BindError, ChildSpec, Dependency, DependencyTag, GraphError,
    UnitId, VariantId, VariationMap,
};
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, instrument, trace, warn};

use crate::context::{BaseContext, BottomUpContext, TopDownContext, VisitEffects};
use crate::error::{PipelineError, UnitError};
use crate::module::ModuleGraph;
use crate::phase::{MutatorKind, PlannedMutator};
use crate::report::PassStats;

/// Run one mutator over the graph and merge its effects.
#[instrument(skip_all, fields(mutator = %planned.descriptor.name(), phase = %planned.phase))]
pub(crate) fn run_pass(
    graph: &mut ModuleGraph,
    planned: &PlannedMutator,
    pending_axes: &BTreeSet<String>,
    pool: Option<&ThreadPool>,
) -> Result<PassStats, PipelineError> {
    let mut order = graph.topological_order()?;
    if planned.descriptor.is_top_down() {
        order.reverse();
    }

    let shared: &ModuleGraph = graph;
    let effects = match pool {
        Some(pool) if planned.descriptor.is_parallel() => pool.install(|| {
            order
                .par_iter()
                .map(|id| visit(shared, planned, *id))
                .collect::<Result<Vec<_>, _>>()
        })?,
        _ => order
            .iter()
            .map(|id| visit(shared, planned, *id))
            .collect::<Result<Vec<_>, _>>()?,
    };

    let mutator = planned.descriptor.name();
    let mut stats = PassStats::new(mutator, planned.phase);
    stats.visited = effects.len();
    let unit_errors = merge(graph, effects, mutator, pending_axes, &mut stats)?;
    if !unit_errors.is_empty() {
        for err in &unit_errors {
            warn!(unit = %err.unit, "{}", err.kind);
        }
        return Err(PipelineError::UnitErrors {
            mutator: mutator.to_string(),
            errors: unit_errors,
        });
    }

    debug!(
        visited = stats.visited,
        splits = stats.splits,
        bound = stats.bound,
        pending = stats.pending,
        repointed = stats.repointed,
        "pass complete"
    );
    Ok(stats)
}

fn visit(
    graph: &ModuleGraph,
    planned: &PlannedMutator,
    id: VariantId,
) -> Result<VisitEffects, PipelineError> {
    let base = BaseContext::new(graph, id, planned.descriptor.name(), planned.final_phase)?;
    match planned.descriptor.kind() {
        MutatorKind::BottomUp(visit) => {
            let mut ctx = BottomUpContext::new(base);
            visit(&mut ctx)?;
            ctx.finish()
        }
        MutatorKind::TopDown(visit) => {
            let mut ctx = TopDownContext::new(base);
            visit(&mut ctx)?;
            ctx.finish()
        }
    }
}

/// The live variant of `unit` whose variations are exactly `wanted`.
fn live_variant_with(
    graph: &ModuleGraph,
    unit: UnitId,
    wanted: &VariationMap,
) -> Option<VariantId> {
    graph.unit(unit)?.variants().iter().copied().find(|id| {
        graph
            .variant(*id)
            .is_some_and(|v| v.variations().to_map() == *wanted)
    })
}

/// Apply a pass's buffered effects. Returns the unit errors the visits reported.
pub(crate) fn merge(
    graph: &mut ModuleGraph,
    mut effects: Vec<VisitEffects>,
    mutator: &str,
    pending_axes: &BTreeSet<String>,
    stats: &mut PassStats,
) -> Result<Vec<UnitError>, PipelineError> {
    effects.sort_by_key(|e| e.variant);
    let mut unit_errors = Vec::new();

    // Each variant's own state.
    for e in &mut effects {
        let variant = graph
            .variant_mut(e.variant)
            .ok_or(GraphError::VariantNotFound(e.variant))?;
        if let Some(properties) = e.properties.take() {
            variant.set_properties(properties);
        }
        for (axis, value) in e.default_variations.drain(..) {
            variant.set_default_variation(&axis, value);
        }
        if let Some(variation) = e.dependency_variation.take() {
            variant.set_dependency_variation(Some(variation));
        }
        for dep in e.deps.drain(..) {
            graph.add_dependency(e.variant, dep)?;
        }
        unit_errors.append(&mut e.unit_errors);
    }

    // Reverse dependencies, before splits so that children inherit them.
    let mut reverse: Vec<(String, VariantId, UnitId, DependencyTag)> = Vec::new();
    for e in &mut effects {
        let name = graph.unit_name_of(e.variant).unwrap_or_default().to_string();
        for (unit, tag) in e.reverse_deps.drain(..) {
            reverse.push((name.clone(), e.variant, unit, tag));
        }
    }
    reverse.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
    for (requester_name, requester, unit, tag) in reverse {
        let wanted = graph
            .variant(requester)
            .map(|v| v.variations().to_map())
            .unwrap_or_default();
        let Some(destination) = live_variant_with(graph, unit, &wanted) else {
            let target = graph.unit(unit).ok_or(GraphError::UnitNotFound(unit))?;
            return Err(BindError {
                dependent: target.name().to_string(),
                target: requester_name,
                constraints: format_map(&wanted),
                available: target.variants().iter().map(|id| graph.describe(*id)).collect(),
            }
            .into());
        };
        trace!(from = %graph.describe(destination), to = %requester_name, "reverse dependency");
        graph.add_dependency(destination, Dependency::resolved(tag, requester))?;
        stats.direct_edges += 1;
    }

    // Splits, their aliases and edges between siblings.
    let mut split_units: BTreeMap<UnitId, Vec<Alias>> = BTreeMap::new();
    for e in &mut effects {
        let Some(split) = e.split.take() else {
            let stray = e
                .aliases
                .first()
                .map(|a| a.to.clone())
                .or_else(|| e.inter_variant_deps.first().map(|d| d.from.clone()));
            if let Some(variation) = stray {
                return Err(PipelineError::UnknownVariation {
                    mutator: mutator.to_string(),
                    unit: graph.describe(e.variant),
                    variation,
                });
            }
            continue;
        };

        let parent_name = graph.describe(e.variant);
        let position = |name: &str| -> Result<usize, PipelineError> {
            split
                .names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| PipelineError::UnknownVariation {
                    mutator: mutator.to_string(),
                    unit: parent_name.clone(),
                    variation: name.to_string(),
                })
        };
        for request in &e.aliases {
            position(&request.to)?;
        }
        for dep in &e.inter_variant_deps {
            position(&dep.from)?;
            position(&dep.to)?;
        }

        let parent = graph
            .variant(e.variant)
            .ok_or(GraphError::VariantNotFound(e.variant))?;
        let unit = parent.unit();
        let parent_key = parent.variations().to_map();
        let payload = Arc::clone(parent.payload());
        let properties = parent.properties().clone();

        let specs = split
            .names
            .iter()
            .zip(split.properties)
            .map(|(name, overrides)| ChildSpec {
                value: name.clone(),
                payload: Arc::clone(&payload),
                properties: overrides.unwrap_or_else(|| properties.clone()),
            })
            .collect();
        let children = graph.split(e.variant, mutator, specs, split.local)?;
        trace!(variant = %parent_name, names = ?split.names, local = split.local, "split");
        stats.splits += 1;
        stats.children += children.len();

        let aliases = split_units.entry(unit).or_default();
        for request in e.aliases.drain(..) {
            let target = children[position(&request.to)?];
            let mut key = parent_key.clone();
            if let Some(from) = request.from {
                key.insert(mutator.to_string(), from);
            }
            aliases.push(Alias { key, target });
        }
        for dep in e.inter_variant_deps.drain(..) {
            let from = children[position(&dep.from)?];
            let to = children[position(&dep.to)?];
            graph.add_dependency(from, Dependency::resolved(dep.tag, to))?;
            stats.direct_edges += 1;
        }
    }
    for (unit, aliases) in split_units {
        stats.aliases += aliases.len();
        graph.set_aliases(unit, aliases);
    }

    // Units from the module factory, in requester order.
    for e in &mut effects {
        for unit in e.created.drain(..) {
            trace!(unit = %unit.name, requester = %graph.describe(e.variant), "created unit");
            graph.add_unit(&unit.name, unit.payload, unit.properties)?;
            stats.created_units += 1;
        }
    }

    // Renames. Every request above already holds unit ids.
    let mut renames: BTreeMap<UnitId, String> = BTreeMap::new();
    for e in &effects {
        let Some(name) = &e.rename else { continue };
        let unit = graph
            .variant(e.variant)
            .ok_or(GraphError::VariantNotFound(e.variant))?
            .unit();
        match renames.entry(unit) {
            Entry::Vacant(slot) => {
                slot.insert(name.clone());
            }
            Entry::Occupied(slot) if slot.get() != name => {
                return Err(PipelineError::RenameConflict {
                    unit: graph.unit(unit).map(|u| u.name().to_string()).unwrap_or_default(),
                    first: slot.get().clone(),
                    second: name.clone(),
                });
            }
            Entry::Occupied(_) => {}
        }
    }
    for (unit, name) in renames {
        graph.rename_unit(unit, &name)?;
        stats.renames += 1;
    }

    let bind = bind_deferred(graph, pending_axes)?;
    stats.bound = bind.bound;
    stats.pending = bind.pending;

    // Replacements, after every addition of this pass.
    for e in &effects {
        for replacement in &e.replacements {
            let variations = graph
                .variant(e.variant)
                .ok_or(GraphError::VariantNotFound(e.variant))?
                .variations()
                .clone();
            let old = graph
                .find_identical(replacement.unit, &variations)
                .ok_or_else(|| PipelineError::MissingReplacementTarget {
                    replacer: graph.describe(e.variant),
                    target: graph
                        .unit(replacement.unit)
                        .map(|u| u.name().to_string())
                        .unwrap_or_default(),
                })?;
            stats.replaced += match &replacement.predicate {
                Some(predicate) => graph.replace_edges(old, e.variant, |source, tag, target| {
                    predicate(source, tag, target)
                }),
                None => graph.replace_edges(old, e.variant, |_, _, _| true),
            };
        }
    }

    stats.repointed = graph.repoint_split_edges()?;
    graph.end_pass();
    Ok(unit_errors)
}
