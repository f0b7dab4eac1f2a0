//! Dependency binder.
//!
//! Turns a deferred [`DependencyRequest`] into a concrete variant of the
//! target unit. Matching is exact (the target carries precisely the
//! requester's non-local variations overlaid with the constraints) or far
//! (the target carries the constraints and nothing forces the remaining
//! axes). Aliases take precedence over variants when the target unit was
//! split after the request was queued; default dependency variations are
//! tried once when nothing matches.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::graph::edge::{DependencyRequest, DependencyTarget, MatchMode};
use crate::graph::unit::{Unit, VariantId};
use crate::graph::VariantGraph;
use crate::variation::{format_map, VariationList, VariationMap};

/// A dependency that cannot be satisfied by any variant of its target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "{dependent} depends on {target} with variations {constraints}, \
     but no such variant exists (available: {})",
    .available.join(", ")
)]
pub struct BindError {
    pub dependent: String,
    pub target: String,
    pub constraints: String,
    pub available: Vec<String>,
}

/// Result of a single bind attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    Bound(VariantId),
    /// The request names an axis whose mutator has not run yet.
    Pending,
}

/// Counters from a [`bind_deferred`] sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindStats {
    pub bound: usize,
    pub pending: usize,
}

/// The variation map a request asks for.
pub fn desired_variations(request: &DependencyRequest) -> VariationMap {
    let mut desired = match request.mode {
        MatchMode::Exact => request.requester.clone(),
        MatchMode::Far => VariationMap::new(),
    };
    desired.extend(
        request
            .constraints
            .iter()
            .map(|(axis, value)| (axis.clone(), value.clone())),
    );
    desired
}

fn variant_matches(mode: MatchMode, desired: &VariationMap, candidate: &VariationList) -> bool {
    let map = candidate.to_map();
    match mode {
        MatchMode::Exact => map == *desired,
        MatchMode::Far => {
            desired.iter().all(|(axis, value)| map.get(axis) == Some(value))
                && candidate.local_axes().all(|axis| desired.contains_key(axis))
        }
    }
}

fn alias_matches(mode: MatchMode, desired: &VariationMap, key: &VariationMap) -> bool {
    match mode {
        MatchMode::Exact => key == desired,
        MatchMode::Far => desired.iter().all(|(axis, value)| key.get(axis) == Some(value)),
    }
}

fn find_variant<M>(
    graph: &VariantGraph<M>,
    unit: &Unit,
    mode: MatchMode,
    desired: &VariationMap,
    aliases_first: bool,
) -> Option<VariantId> {
    let by_alias = || {
        graph
            .aliases()
            .find(unit.id(), |key| alias_matches(mode, desired, key))
    };
    let by_variant = || {
        unit.variants().iter().copied().find(|id| {
            graph
                .variant(*id)
                .is_some_and(|v| variant_matches(mode, desired, v.variations()))
        })
    };
    if aliases_first {
        by_alias().or_else(by_variant)
    } else {
        by_variant().or_else(by_alias)
    }
}

/// Try to bind one request made by `requester`.
///
/// A request that fails to match is reported as [`BindOutcome::Pending`]
/// rather than an error when the variations it asks for include an axis in
/// `pending_axes`.
pub fn bind<M>(
    graph: &VariantGraph<M>,
    requester: VariantId,
    request: &DependencyRequest,
    pending_axes: &BTreeSet<String>,
) -> Result<BindOutcome, BindError> {
    let dependent = graph.describe(requester);
    let (Some(source), Some(unit)) = (graph.variant(requester), graph.unit(request.unit)) else {
        return Err(BindError {
            dependent,
            target: request.unit.to_string(),
            constraints: format_map(&request.constraints),
            available: Vec::new(),
        });
    };

    let aliases_first = unit
        .split_generation()
        .is_some_and(|generation| request.queued_at <= generation);
    let desired = desired_variations(request);
    let mut attempts = vec![desired.clone()];
    let mut fallback = desired.clone();
    for (axis, value) in source.default_variations() {
        if !request.constraints.contains_key(axis) {
            fallback.insert(axis.clone(), value.clone());
        }
    }
    if fallback != desired {
        attempts.push(fallback);
    }

    for wanted in &attempts {
        if let Some(found) = find_variant(graph, unit, request.mode, wanted, aliases_first) {
            return Ok(BindOutcome::Bound(found));
        }
    }

    // The target was split by the pass that queued the request: bind to the
    // variant the request matched when the pass began. Repointing then moves
    // the edge onto one of its children.
    let queued_this_pass = graph.generation() == request.queued_at;
    if queued_this_pass && unit.split_generation() == Some(request.queued_at) {
        for wanted in &attempts {
            let parent = graph
                .split_during(unit.id(), request.queued_at)
                .find(|v| variant_matches(request.mode, wanted, v.variations()));
            if let Some(parent) = parent {
                return Ok(BindOutcome::Bound(parent.id()));
            }
        }
    }

    if desired.keys().any(|axis| pending_axes.contains(axis)) {
        return Ok(BindOutcome::Pending);
    }

    Err(BindError {
        dependent,
        target: unit.name().to_string(),
        constraints: format_map(&desired),
        available: unit.variants().iter().map(|id| graph.describe(*id)).collect(),
    })
}

/// Bind every deferred dependency of every live variant.
///
/// Requests still waiting on a pending axis are left deferred and counted.
pub fn bind_deferred<M>(
    graph: &mut VariantGraph<M>,
    pending_axes: &BTreeSet<String>,
) -> Result<BindStats, BindError> {
    let mut stats = BindStats::default();
    let mut bindings = Vec::new();
    for variant in graph.live_variants() {
        for (index, dep) in variant.deps().iter().enumerate() {
            if let DependencyTarget::Deferred(request) = &dep.target {
                match bind(graph, variant.id(), request, pending_axes)? {
                    BindOutcome::Bound(target) => bindings.push((variant.id(), index, target)),
                    BindOutcome::Pending => stats.pending += 1,
                }
            }
        }
    }
    stats.bound = bindings.len();
    for (variant, index, target) in bindings {
        graph.set_dependency_target(variant, index, target);
    }
    Ok(stats)
}
