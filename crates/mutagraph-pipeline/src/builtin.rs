//! Built-in mutators.
//!
//! `component-deps` closes PreArch, `os`/`image`/`arch` make up the Arch
//! phase, and `deps` is the Deps phase. The split names for each axis come
//! from a [`VariationPolicy`].

use std::fmt;
use std::sync::Arc;

use mutagraph_core::Properties;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::phase::MutatorDescriptor;

/// The configuration axes the engine splits on by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Os,
    Image,
    Arch,
}

impl Axis {
    /// In execution order.
    pub const ALL: [Axis; 3] = [Axis::Os, Axis::Image, Axis::Arch];

    /// Mutator name, which is also the variation axis.
    pub fn name(self) -> &'static str {
        match self {
            Axis::Os => "os",
            Axis::Image => "image",
            Axis::Arch => "arch",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decides which variations a unit gets on each axis.
pub trait VariationPolicy: fmt::Debug + Send + Sync {
    /// Split names for `unit` on `axis`. Empty leaves the unit unsplit.
    fn variations(&self, axis: Axis, unit: &str, properties: &Properties) -> Vec<String>;
}

/// Never splits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSplitPolicy;

impl VariationPolicy for NoSplitPolicy {
    fn variations(&self, _axis: Axis, _unit: &str, _properties: &Properties) -> Vec<String> {
        Vec::new()
    }
}

/// A fixed table of variations per axis.
///
/// A unit overrides an axis with a custom list property of the same name
/// (`os`, `image` or `arch`); an empty list opts it out of that axis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticPolicy {
    pub os: Vec<String>,
    pub image: Vec<String>,
    pub arch: Vec<String>,
}

impl StaticPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_axis<I, S>(mut self, axis: Axis, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        match axis {
            Axis::Os => self.os = values,
            Axis::Image => self.image = values,
            Axis::Arch => self.arch = values,
        }
        self
    }

    fn table(&self, axis: Axis) -> &[String] {
        match axis {
            Axis::Os => &self.os,
            Axis::Image => &self.image,
            Axis::Arch => &self.arch,
        }
    }
}

impl VariationPolicy for StaticPolicy {
    fn variations(&self, axis: Axis, _unit: &str, properties: &Properties) -> Vec<String> {
        properties
            .custom
            .get_list(axis.name())
            .unwrap_or_else(|| self.table(axis))
            .to_vec()
    }
}

pub(crate) fn split_mutator(axis: Axis, policy: Arc<dyn VariationPolicy>) -> MutatorDescriptor {
    MutatorDescriptor::bottom_up(axis.name(), move |ctx| {
        let names = policy.variations(axis, ctx.unit_name(), ctx.properties());
        if names.is_empty() {
            return Ok(());
        }
        trace!(unit = ctx.unit_name(), %axis, ?names, "splitting");
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        ctx.create_variations(&names)?;
        Ok(())
    })
    .parallel()
}

pub(crate) fn component_deps_mutator() -> MutatorDescriptor {
    MutatorDescriptor::bottom_up("component-deps", |ctx| {
        let module = ctx.module();
        if module.enabled(ctx.properties()) {
            module.component_deps(ctx)?;
        }
        Ok(())
    })
    .parallel()
}

pub(crate) fn deps_mutator() -> MutatorDescriptor {
    MutatorDescriptor::bottom_up("deps", |ctx| {
        let module = ctx.module();
        if module.enabled(ctx.properties()) {
            module.deps(ctx)?;
        }
        Ok(())
    })
    .parallel()
}
