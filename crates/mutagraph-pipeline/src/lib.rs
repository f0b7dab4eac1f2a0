//! Pass scheduler for the mutagraph variant engine.
//!
//! Mutators are registered into ordered phases and frozen into a
//! [`MutatorPlan`]. [`Pipeline::run`] then executes one pass per mutator:
//! variants are visited in dependency order (leaves first for bottom-up
//! mutators), each visit records its effects through a context, and the
//! effects are merged into the graph in a deterministic order before the
//! next pass starts. Parallel-safe mutators run on a rayon pool.

pub mod builtin;
pub mod context;
pub mod error;
mod executor;
pub mod factory;
pub mod module;
pub mod phase;
pub mod pipeline;
pub mod report;

pub use builtin::{Axis, NoSplitPolicy, StaticPolicy, VariationPolicy};
pub use context::{BaseContext, BottomUpContext, ReplacePredicate, SplitChild, TopDownContext};
pub use error::{PipelineError, UnitError, UnitErrorKind};
pub use factory::NewUnit;
pub use module::{Module, ModuleFactory, ModuleGraph, ModuleRef, PlainModule};
pub use phase::{
    BottomUpFn, MutatorDescriptor, MutatorKind, MutatorPlan, Phase, PipelineBuilder,
    PlannedMutator, TopDownFn,
};
pub use pipeline::{Pipeline, PipelineConfig, PipelineOutput};
pub use report::{PassStats, PipelineReport};
