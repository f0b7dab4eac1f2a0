//! Phase scheduler: mutator registration and the immutable plan it produces.
//!
//! Mutators are registered per phase on a [`PipelineBuilder`]. `build`
//! inserts the built-in mutators in their slots, marks every FinalDeps
//! mutator as final-phase, rejects duplicate names, and returns a
//! [`MutatorPlan`] that the pipeline executes in order.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::builtin::{self, Axis, VariationPolicy};
use crate::context::{BottomUpContext, TopDownContext};
use crate::error::PipelineError;

/// Mutator phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    PreArch,
    /// Built-in os, image and arch splits.
    Arch,
    PreDeps,
    /// Built-in dependency declaration.
    Deps,
    PostDeps,
    /// Splitting is illegal here.
    FinalDeps,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::PreArch,
        Phase::Arch,
        Phase::PreDeps,
        Phase::Deps,
        Phase::PostDeps,
        Phase::FinalDeps,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Phase::PreArch => "pre-arch",
            Phase::Arch => "arch",
            Phase::PreDeps => "pre-deps",
            Phase::Deps => "deps",
            Phase::PostDeps => "post-deps",
            Phase::FinalDeps => "final-deps",
        }
    }

    /// Phases whose mutators are supplied by the engine.
    pub fn is_reserved(self) -> bool {
        matches!(self, Phase::Arch | Phase::Deps)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub type BottomUpFn =
    Arc<dyn Fn(&mut BottomUpContext<'_>) -> Result<(), PipelineError> + Send + Sync>;
pub type TopDownFn =
    Arc<dyn Fn(&mut TopDownContext<'_>) -> Result<(), PipelineError> + Send + Sync>;

/// Direction of a pass.
#[derive(Clone)]
pub enum MutatorKind {
    /// Visits dependencies before dependents.
    BottomUp(BottomUpFn),
    /// Visits dependents before dependencies.
    TopDown(TopDownFn),
}

impl fmt::Debug for MutatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutatorKind::BottomUp(_) => f.write_str("BottomUp"),
            MutatorKind::TopDown(_) => f.write_str("TopDown"),
        }
    }
}

/// A named graph-rewriting pass.
#[derive(Debug, Clone)]
pub struct MutatorDescriptor {
    name: String,
    kind: MutatorKind,
    parallel: bool,
}

impl MutatorDescriptor {
    pub fn bottom_up<F>(name: impl Into<String>, visit: F) -> Self
    where
        F: Fn(&mut BottomUpContext<'_>) -> Result<(), PipelineError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: MutatorKind::BottomUp(Arc::new(visit)),
            parallel: false,
        }
    }

    pub fn top_down<F>(name: impl Into<String>, visit: F) -> Self
    where
        F: Fn(&mut TopDownContext<'_>) -> Result<(), PipelineError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: MutatorKind::TopDown(Arc::new(visit)),
            parallel: false,
        }
    }

    /// Mark the mutator safe to visit variants concurrently.
    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &MutatorKind {
        &self.kind
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    pub fn is_top_down(&self) -> bool {
        matches!(self.kind, MutatorKind::TopDown(_))
    }
}

/// Collects mutator registrations before a run.
#[derive(Debug)]
pub struct PipelineBuilder {
    phases: BTreeMap<Phase, Vec<MutatorDescriptor>>,
    builtins: bool,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            phases: BTreeMap::new(),
            builtins: true,
        }
    }

    /// Leave out the built-in mutators. Arch and Deps then accept
    /// registrations like any other phase.
    pub fn without_builtins(mut self) -> Self {
        self.builtins = false;
        self
    }

    /// Append a mutator to `phase`.
    pub fn register(
        &mut self,
        phase: Phase,
        mutator: MutatorDescriptor,
    ) -> Result<&mut Self, PipelineError> {
        if self.builtins && phase.is_reserved() {
            return Err(PipelineError::ReservedPhase {
                phase,
                mutator: mutator.name,
            });
        }
        self.phases.entry(phase).or_default().push(mutator);
        Ok(self)
    }

    /// Append several mutators to `phase`, in order.
    pub fn register_all(
        &mut self,
        phase: Phase,
        mutators: impl IntoIterator<Item = MutatorDescriptor>,
    ) -> Result<&mut Self, PipelineError> {
        for mutator in mutators {
            self.register(phase, mutator)?;
        }
        Ok(self)
    }

    /// Freeze the registrations into an ordered plan.
    pub fn build(mut self, policy: Arc<dyn VariationPolicy>) -> Result<MutatorPlan, PipelineError> {
        if self.builtins {
            self.phases
                .entry(Phase::PreArch)
                .or_default()
                .push(builtin::component_deps_mutator());
            self.phases.insert(
                Phase::Arch,
                Axis::ALL
                    .into_iter()
                    .map(|axis| builtin::split_mutator(axis, Arc::clone(&policy)))
                    .collect(),
            );
            self.phases.insert(Phase::Deps, vec![builtin::deps_mutator()]);
        }

        let mut seen = HashSet::new();
        let mut mutators = Vec::new();
        for phase in Phase::ALL {
            for descriptor in self.phases.remove(&phase).unwrap_or_default() {
                if !seen.insert(descriptor.name.clone()) {
                    return Err(PipelineError::DuplicateMutator(descriptor.name));
                }
                mutators.push(PlannedMutator {
                    phase,
                    final_phase: phase == Phase::FinalDeps,
                    descriptor,
                });
            }
        }
        Ok(MutatorPlan { mutators })
    }
}

/// One entry of a plan.
#[derive(Debug, Clone)]
pub struct PlannedMutator {
    pub phase: Phase,
    pub descriptor: MutatorDescriptor,
    pub final_phase: bool,
}

/// The immutable, fully ordered list of passes.
#[derive(Debug, Clone)]
pub struct MutatorPlan {
    mutators: Vec<PlannedMutator>,
}

impl MutatorPlan {
    pub fn mutators(&self) -> &[PlannedMutator] {
        &self.mutators
    }

    pub fn len(&self) -> usize {
        self.mutators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutators.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.mutators.iter().map(|m| m.descriptor.name()).collect()
    }

    /// Axes of the mutators that run after position `index`.
    pub fn pending_axes(&self, index: usize) -> BTreeSet<String> {
        self.mutators
            .iter()
            .skip(index + 1)
            .map(|m| m.descriptor.name().to_string())
            .collect()
    }
}
