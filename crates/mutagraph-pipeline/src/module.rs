//! The behaviour object carried by every variant.

use std::fmt;
use std::sync::Arc;

use mutagraph_core::{Properties, VariantGraph};

use crate::context::BottomUpContext;
use crate::error::PipelineError;

/// Capabilities the engine invokes generically on a visited unit.
///
/// Implementations must be shareable across worker threads; per-variant
/// state belongs in the variant's [`Properties`], not in the module.
pub trait Module: fmt::Debug + Send + Sync {
    /// Short type name used in diagnostics.
    fn type_name(&self) -> &str;

    /// Whether the built-in dependency mutators should visit this unit.
    fn enabled(&self, properties: &Properties) -> bool {
        properties.enabled()
    }

    /// Declare dependencies on component units. Runs at the end of PreArch.
    fn component_deps(&self, _ctx: &mut BottomUpContext<'_>) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Declare ordinary dependencies. Runs in the Deps phase.
    fn deps(&self, _ctx: &mut BottomUpContext<'_>) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// Shared handle to a module; split children share their parent's.
pub type ModuleRef = Arc<dyn Module>;

/// The graph type the pipeline operates on.
pub type ModuleGraph = VariantGraph<ModuleRef>;

/// Produces a fresh module and its default properties for
/// [`TopDownContext::create_module`](crate::context::TopDownContext::create_module).
pub trait ModuleFactory: Send + Sync {
    fn create(&self) -> (ModuleRef, Properties);
}

impl<F> ModuleFactory for F
where
    F: Fn() -> (ModuleRef, Properties) + Send + Sync,
{
    fn create(&self) -> (ModuleRef, Properties) {
        self()
    }
}

/// A module with no dependencies of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainModule {
    type_name: String,
}

impl PlainModule {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
        }
    }

    pub fn shared(type_name: impl Into<String>) -> ModuleRef {
        Arc::new(Self::new(type_name))
    }
}

impl Module for PlainModule {
    fn type_name(&self) -> &str {
        &self.type_name
    }
}
