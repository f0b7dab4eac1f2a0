//! Units and their variants.
//!
//! A unit is a named logical build target. Each split replaces one of its
//! variants with a set of child variants; the replaced variant stays in the
//! store as an obsolete record so that edges still pointing at it can be
//! repointed at the end of the pass.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::edge::Dependency;
use crate::props::Properties;
use crate::variation::{VariationList, VariationMap};

/// Index of a unit in the variant store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub(crate) usize);

impl UnitId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// Index of a variant in the variant store. Ids grow with creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariantId(pub(crate) usize);

impl VariantId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// One entry of a variant's split history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitRecord {
    pub mutator: String,
    pub variation: String,
}

/// A named logical build target.
#[derive(Debug, Clone)]
pub struct Unit {
    pub(crate) id: UnitId,
    pub(crate) name: String,
    /// Live variants in creation order.
    pub(crate) variants: Vec<VariantId>,
    /// Generation of the most recent split, if any.
    pub(crate) split_generation: Option<u64>,
}

impl Unit {
    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variants(&self) -> &[VariantId] {
        &self.variants
    }

    pub fn split_generation(&self) -> Option<u64> {
        self.split_generation
    }
}

/// Whether a variant is still part of the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantState {
    Live,
    /// Replaced by `children` when split along `axis` in pass `generation`.
    Split {
        axis: String,
        local: bool,
        children: Vec<VariantId>,
        generation: u64,
    },
}

/// One concrete instance of a unit.
///
/// `M` is the payload carried by every variant; the pipeline stores the
/// unit's behaviour object there.
#[derive(Debug, Clone)]
pub struct Variant<M> {
    pub(crate) id: VariantId,
    pub(crate) unit: UnitId,
    pub(crate) variations: VariationList,
    pub(crate) payload: M,
    pub(crate) properties: Properties,
    pub(crate) deps: Vec<Dependency>,
    pub(crate) history: Vec<SplitRecord>,
    pub(crate) debug_name: String,
    /// Fallback values per axis used when binding fails.
    pub(crate) default_variations: VariationMap,
    /// Pass-scoped choice for edges into split dependencies.
    pub(crate) dependency_variation: Option<String>,
    pub(crate) state: VariantState,
}

impl<M> Variant<M> {
    pub fn id(&self) -> VariantId {
        self.id
    }

    pub fn unit(&self) -> UnitId {
        self.unit
    }

    pub fn variations(&self) -> &VariationList {
        &self.variations
    }

    pub fn payload(&self) -> &M {
        &self.payload
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn set_properties(&mut self, properties: Properties) {
        self.properties = properties;
    }

    /// Dependencies in declaration order.
    pub fn deps(&self) -> &[Dependency] {
        &self.deps
    }

    /// Mutators that split this variant's ancestry, with the value chosen each time.
    pub fn history(&self) -> &[SplitRecord] {
        &self.history
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    pub fn default_variations(&self) -> &VariationMap {
        &self.default_variations
    }

    /// Set or clear the default dependency variation for `axis`.
    pub fn set_default_variation(&mut self, axis: &str, value: Option<String>) {
        match value {
            Some(value) => {
                self.default_variations.insert(axis.to_string(), value);
            }
            None => {
                self.default_variations.remove(axis);
            }
        }
    }

    pub fn dependency_variation(&self) -> Option<&str> {
        self.dependency_variation.as_deref()
    }

    pub fn set_dependency_variation(&mut self, variation: Option<String>) {
        self.dependency_variation = variation;
    }

    pub fn state(&self) -> &VariantState {
        &self.state
    }

    pub fn is_live(&self) -> bool {
        matches!(self.state, VariantState::Live)
    }
}
