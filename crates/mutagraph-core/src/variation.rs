//! Variation axes and the ordered variation lists that identify variants.
//!
//! Every split appends one `(axis, value)` pair to the variation list of the
//! variants it creates. The axis is the name of the mutator that performed
//! the split, so a list never holds the same axis twice.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An unordered axis -> value map, used for dependency constraints and alias keys.
pub type VariationMap = BTreeMap<String, String>;

/// Build a [`VariationMap`] from `(axis, value)` pairs.
pub fn variation_map<I, A, V>(pairs: I) -> VariationMap
where
    I: IntoIterator<Item = (A, V)>,
    A: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(a, v)| (a.into(), v.into()))
        .collect()
}

/// Format a variation map for diagnostics: `{arch:arm, os:android}`.
pub fn format_map(map: &VariationMap) -> String {
    let parts: Vec<String> = map.iter().map(|(a, v)| format!("{a}:{v}")).collect();
    format!("{{{}}}", parts.join(", "))
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// A single `(axis, value)` pair in a variant's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variation {
    /// The splitting mutator's name.
    pub axis: String,
    /// The split name chosen for this variant.
    pub value: String,
    /// Local variations are excluded from automatic dependency matching.
    #[serde(default, skip_serializing_if = "is_false")]
    pub local: bool,
}

impl Variation {
    /// Create a regular (non-local) variation.
    pub fn new(axis: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            axis: axis.into(),
            value: value.into(),
            local: false,
        }
    }

    /// Create a local variation.
    pub fn local(axis: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            local: true,
            ..Self::new(axis, value)
        }
    }
}

/// The ordered list of variations a variant has accumulated across splits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariationList(Vec<Variation>);

impl VariationList {
    /// An empty list: the identity of a never-split unit.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variation> {
        self.0.iter()
    }

    /// Value of the given axis, if this list has been split along it.
    pub fn get(&self, axis: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|v| v.axis == axis)
            .map(|v| v.value.as_str())
    }

    /// A new list with `variation` appended.
    pub fn extended(&self, variation: Variation) -> Self {
        debug_assert!(
            self.get(&variation.axis).is_none(),
            "axis {} split twice",
            variation.axis
        );
        let mut list = self.0.clone();
        list.push(variation);
        Self(list)
    }

    /// All variations, local ones included.
    pub fn to_map(&self) -> VariationMap {
        self.0
            .iter()
            .map(|v| (v.axis.clone(), v.value.clone()))
            .collect()
    }

    /// Only the non-local variations: the part a dependent inherits in exact matching.
    pub fn dependency_map(&self) -> VariationMap {
        self.0
            .iter()
            .filter(|v| !v.local)
            .map(|v| (v.axis.clone(), v.value.clone()))
            .collect()
    }

    /// Axes of the local variations.
    pub fn local_axes(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter(|v| v.local).map(|v| v.axis.as_str())
    }

    /// Human-readable variant name: the values joined by `_` (empty when unsplit).
    pub fn variant_name(&self) -> String {
        let values: Vec<&str> = self.0.iter().map(|v| v.value.as_str()).collect();
        values.join("_")
    }
}

impl FromIterator<Variation> for VariationList {
    fn from_iter<T: IntoIterator<Item = Variation>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for VariationList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|v| {
                if v.local {
                    format!("{}:{} (local)", v.axis, v.value)
                } else {
                    format!("{}:{}", v.axis, v.value)
                }
            })
            .collect();
        write!(f, "[{}]", parts.join(", "))
    }
}
