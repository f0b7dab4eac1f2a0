//! Dependency edges between variants.
//!
//! A dependency is owned by the variant that depends on something. Its target
//! is either a concrete variant or a deferred request naming a unit plus the
//! variations wanted from it; the binder turns the latter into the former.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::unit::{UnitId, VariantId};
use crate::variation::{format_map, VariationMap};

/// Globally unique edge identifier.
pub type EdgeId = Uuid;

/// Opaque classifier distinguishing edge semantics (e.g. "runtime" vs "build").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyTag(String);

impl DependencyTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DependencyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a deferred request is matched against the target's variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchMode {
    /// The target must carry exactly the requester's non-local variations
    /// overlaid with the constraints.
    Exact,
    /// The target must carry the constraints; other axes are free and the
    /// requester's own variations are ignored.
    Far,
}

/// A dependency whose target variant is not yet known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRequest {
    /// The unit the dependency points at.
    pub unit: UnitId,
    /// Explicitly requested variations.
    pub constraints: VariationMap,
    pub mode: MatchMode,
    /// Non-local variations of the requesting variant when the request was
    /// queued. Exact matching starts from these, so a split of the
    /// requester later in the same pass does not change what it asked for.
    #[serde(default)]
    pub requester: VariationMap,
    /// Graph generation (pass index) at which the request was queued.
    pub queued_at: u64,
}

impl fmt::Display for DependencyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            MatchMode::Exact => "exact",
            MatchMode::Far => "far",
        };
        write!(f, "{} {mode} {}", self.unit, format_map(&self.constraints))
    }
}

/// Where a dependency points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyTarget {
    Resolved(VariantId),
    Deferred(DependencyRequest),
}

/// A directed edge from the owning variant to its target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    /// Unique edge identifier.
    pub id: EdgeId,
    pub tag: DependencyTag,
    pub target: DependencyTarget,
}

impl Dependency {
    /// A direct edge to a concrete variant.
    pub fn resolved(tag: DependencyTag, target: VariantId) -> Self {
        Self {
            id: Uuid::new_v4(),
            tag,
            target: DependencyTarget::Resolved(target),
        }
    }

    /// A deferred edge to be bound by the binder.
    pub fn deferred(tag: DependencyTag, request: DependencyRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            tag,
            target: DependencyTarget::Deferred(request),
        }
    }

    /// The concrete target, if bound.
    pub fn resolved_target(&self) -> Option<VariantId> {
        match self.target {
            DependencyTarget::Resolved(id) => Some(id),
            DependencyTarget::Deferred(_) => None,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self.target, DependencyTarget::Deferred(_))
    }

    /// A copy of this edge with a fresh identity, used when a split clones
    /// the parent's dependency list into each child.
    pub fn duplicate(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            tag: self.tag.clone(),
            target: self.target.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variation::variation_map;

    #[test]
    fn duplicate_gets_new_id() {
        let dep = Dependency::resolved(DependencyTag::new("runtime"), VariantId(3));
        let copy = dep.duplicate();
        assert_ne!(dep.id, copy.id);
        assert_eq!(copy.resolved_target(), Some(VariantId(3)));
        assert_eq!(copy.tag.as_str(), "runtime");
    }

    #[test]
    fn deferred_has_no_target() {
        let dep = Dependency::deferred(
            DependencyTag::new("build"),
            DependencyRequest {
                unit: UnitId(0),
                constraints: variation_map([("arch", "arm")]),
                mode: MatchMode::Far,
                requester: VariationMap::new(),
                queued_at: 2,
            },
        );
        assert!(dep.is_deferred());
        assert_eq!(dep.resolved_target(), None);
        if let DependencyTarget::Deferred(req) = &dep.target {
            assert_eq!(req.to_string(), "u0 far {arch:arm}");
        }
    }
}
