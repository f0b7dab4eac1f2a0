//! The fully bound graph handed to later build stages.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::edge::DependencyTag;
use crate::graph::unit::SplitRecord;
use crate::hash::{Fingerprint, Fingerprinter, RESOLVED_GRAPH_DOMAIN};
use crate::variation::VariationList;

/// An edge to a named variant of a named unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEdge {
    pub tag: DependencyTag,
    pub unit: String,
    /// Variant name of the target (empty for an unsplit unit).
    pub variant: String,
}

/// One live variant with its bound dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedVariant {
    pub unit: String,
    pub variant: String,
    pub variations: VariationList,
    pub history: Vec<SplitRecord>,
    pub deps: Vec<ResolvedEdge>,
}

impl ResolvedVariant {
    /// `unit` or `unit#variant`.
    pub fn display_name(&self) -> String {
        if self.variant.is_empty() {
            self.unit.clone()
        } else {
            format!("{}#{}", self.unit, self.variant)
        }
    }
}

/// Every live variant, ordered by unit name then the unit's variant order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedGraph {
    pub variants: Vec<ResolvedVariant>,
}

impl ResolvedGraph {
    /// Look up a variant by unit and variant name.
    pub fn find(&self, unit: &str, variant: &str) -> Option<&ResolvedVariant> {
        self.variants
            .iter()
            .find(|v| v.unit == unit && v.variant == variant)
    }

    /// All variants of a unit.
    pub fn variants_of<'a>(
        &'a self,
        unit: &'a str,
    ) -> impl Iterator<Item = &'a ResolvedVariant> + 'a {
        self.variants.iter().filter(move |v| v.unit == unit)
    }

    pub fn edge_count(&self) -> usize {
        self.variants.iter().map(|v| v.deps.len()).sum()
    }

    /// Fingerprint of every variant, in order.
    pub fn fingerprint(&self) -> Result<Fingerprint, serde_json::Error> {
        let mut fp = Fingerprinter::new(RESOLVED_GRAPH_DOMAIN);
        for variant in &self.variants {
            fp.record(variant)?;
        }
        Ok(fp.finish())
    }
}

impl fmt::Display for ResolvedGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for variant in &self.variants {
            writeln!(f, "{} {}", variant.display_name(), variant.variations)?;
            for dep in &variant.deps {
                if dep.variant.is_empty() {
                    writeln!(f, "  -> {} ({})", dep.unit, dep.tag)?;
                } else {
                    writeln!(f, "  -> {}#{} ({})", dep.unit, dep.variant, dep.tag)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variation::Variation;

    fn sample(value: &str) -> ResolvedGraph {
        ResolvedGraph {
            variants: vec![ResolvedVariant {
                unit: "lib".into(),
                variant: value.into(),
                variations: [Variation::new("arch", value)].into_iter().collect(),
                history: vec![SplitRecord {
                    mutator: "arch".into(),
                    variation: value.into(),
                }],
                deps: vec![ResolvedEdge {
                    tag: DependencyTag::new("build"),
                    unit: "base".into(),
                    variant: String::new(),
                }],
            }],
        }
    }

    #[test]
    fn fingerprint_tracks_content() {
        let arm = sample("arm").fingerprint().unwrap();
        assert_eq!(arm, sample("arm").fingerprint().unwrap());
        assert_ne!(arm, sample("x86").fingerprint().unwrap());
    }

    #[test]
    fn display_lists_edges() {
        let g = sample("arm");
        assert_eq!(g.to_string(), "lib#arm [arch:arm]\n  -> base (build)\n");
        assert!(g.find("lib", "arm").is_some());
        assert_eq!(g.edge_count(), 1);
    }
}
