//! Alias registry: redirects from a pre-split variation key to a post-split variant.
//!
//! Aliases let a dependency that still describes a unit by the variations it
//! had before a split land on one specific child. A unit's aliases are
//! replaced wholesale by the pass that next splits it; a split that declares
//! no aliases clears them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::graph::unit::{UnitId, VariantId};
use crate::variation::VariationMap;

/// A single redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    /// Variations a request must describe to hit this alias.
    pub key: VariationMap,
    /// The variant the alias stands for.
    pub target: VariantId,
}

/// Per-unit alias sets.
#[derive(Debug, Clone, Default)]
pub struct AliasRegistry {
    aliases: HashMap<UnitId, Vec<Alias>>,
}

impl AliasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aliases currently live for `unit`, in declaration order.
    pub fn aliases(&self, unit: UnitId) -> &[Alias] {
        self.aliases.get(&unit).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace the alias set of `unit`. An empty set clears it.
    pub fn replace(&mut self, unit: UnitId, aliases: Vec<Alias>) {
        if aliases.is_empty() {
            self.aliases.remove(&unit);
        } else {
            self.aliases.insert(unit, aliases);
        }
    }

    /// First alias of `unit` whose key satisfies `matches`.
    pub fn find(&self, unit: UnitId, matches: impl Fn(&VariationMap) -> bool) -> Option<VariantId> {
        self.aliases(unit)
            .iter()
            .find(|alias| matches(&alias.key))
            .map(|alias| alias.target)
    }

    /// Total number of live aliases.
    pub fn len(&self) -> usize {
        self.aliases.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
