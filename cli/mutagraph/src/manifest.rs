//! Graph fixture files: a TOML description of units, their dependencies and
//! the variation policy to split them with.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use mutagraph_core::{DependencyTag, Properties, PropertyBag, VariationMap};
use mutagraph_pipeline::{
    Axis, BottomUpContext, Module, ModuleGraph, PipelineConfig, PipelineError, StaticPolicy,
};
use serde::{Deserialize, Serialize};

/// Tag on edges declared through `deps`.
pub const BUILD_TAG: &str = "build";
/// Tag on edges declared through `far_deps`.
pub const FAR_TAG: &str = "far";

/// The top-level fixture structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphFixture {
    /// Execution settings; command-line flags override them.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Variations per built-in axis.
    #[serde(default)]
    pub policy: StaticPolicy,
    /// Units, in creation order.
    #[serde(default, rename = "unit")]
    pub units: Vec<UnitSpec>,
}

/// One `[[unit]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitSpec {
    pub name: String,
    #[serde(rename = "type", default = "default_unit_type")]
    pub kind: String,
    /// Units depended on with this unit's own variations.
    #[serde(default)]
    pub deps: Vec<String>,
    /// Units depended on by explicit variations only.
    #[serde(default)]
    pub far_deps: Vec<FarDependency>,
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Per-axis overrides of the policy table. An empty list opts the unit
    /// out of that axis.
    #[serde(default)]
    pub os: Option<Vec<String>>,
    #[serde(default)]
    pub image: Option<Vec<String>>,
    #[serde(default)]
    pub arch: Option<Vec<String>>,
    /// Free-form properties stored in the unit's custom bag.
    #[serde(default)]
    pub properties: PropertyBag,
}

fn default_unit_type() -> String {
    "library".to_string()
}

/// A dependency on whichever variant of `unit` carries `variations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarDependency {
    pub unit: String,
    #[serde(default)]
    pub variations: VariationMap,
}

impl UnitSpec {
    fn properties(&self) -> Properties {
        let mut common = PropertyBag::new();
        if let Some(enabled) = self.enabled {
            common.set("enabled", enabled);
        }
        let mut custom = self.properties.clone();
        for axis in Axis::ALL {
            let values = match axis {
                Axis::Os => &self.os,
                Axis::Image => &self.image,
                Axis::Arch => &self.arch,
            };
            if let Some(values) = values {
                custom.set(axis.name(), values.clone());
            }
        }
        Properties::new(common, custom)
    }

    fn module(&self) -> FixtureModule {
        FixtureModule {
            kind: self.kind.clone(),
            deps: self.deps.clone(),
            far_deps: self.far_deps.clone(),
        }
    }
}

impl GraphFixture {
    /// Read and parse a fixture file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parse a fixture from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Build the initial graph: one variant per unit.
    pub fn build_graph(&self) -> Result<ModuleGraph> {
        let mut graph = ModuleGraph::new();
        for unit in &self.units {
            graph
                .add_unit(&unit.name, Arc::new(unit.module()), unit.properties())
                .with_context(|| format!("adding unit {}", unit.name))?;
        }
        Ok(graph)
    }

    /// The fixture written by `mutagraph init`.
    pub fn template(name: &str) -> String {
        format!(
            r#"[pipeline]
parallel = true

[policy]
os = ["android", "linux"]
arch = ["arm64", "x86_64"]

[[unit]]
name = "libc"

[[unit]]
name = "libbase"
deps = ["libc"]

[[unit]]
name = "{name}"
type = "binary"
deps = ["libbase", "libc"]

[[unit]]
name = "{name}-host"
type = "binary"
os = ["linux"]
deps = ["libc"]
far_deps = [{{ unit = "{name}", variations = {{ os = "android", arch = "arm64" }} }}]
"#
        )
    }
}

/// Module behind every fixture unit.
#[derive(Debug)]
pub struct FixtureModule {
    kind: String,
    deps: Vec<String>,
    far_deps: Vec<FarDependency>,
}

impl Module for FixtureModule {
    fn type_name(&self) -> &str {
        &self.kind
    }

    fn deps(&self, ctx: &mut BottomUpContext<'_>) -> Result<(), PipelineError> {
        let names: Vec<&str> = self.deps.iter().map(String::as_str).collect();
        ctx.add_dependency(&DependencyTag::new(BUILD_TAG), &names)?;
        for far in &self.far_deps {
            ctx.add_far_variation_dependencies(
                &far.variations,
                &DependencyTag::new(FAR_TAG),
                &[far.unit.as_str()],
            )?;
        }
        Ok(())
    }
}
