//! Run report aggregating per-pass statistics.

use std::fmt;

use serde::Serialize;

use crate::phase::Phase;

/// What one pass did to the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassStats {
    pub mutator: String,
    pub phase: Option<Phase>,
    /// Variants visited.
    pub visited: usize,
    /// Variants split.
    pub splits: usize,
    /// Children created by those splits.
    pub children: usize,
    pub created_units: usize,
    pub renames: usize,
    /// Edges added directly (reverse and inter-variant).
    pub direct_edges: usize,
    /// Deferred dependencies bound at pass end.
    pub bound: usize,
    /// Deferred dependencies still waiting on a later axis.
    pub pending: usize,
    /// Edges redirected by replacements.
    pub replaced: usize,
    /// Edges moved off split variants.
    pub repointed: usize,
    pub aliases: usize,
}

impl PassStats {
    pub fn new(mutator: &str, phase: Phase) -> Self {
        Self {
            mutator: mutator.to_string(),
            phase: Some(phase),
            ..Self::default()
        }
    }

    /// Whether the pass left the graph unchanged.
    pub fn is_noop(&self) -> bool {
        self.splits == 0
            && self.created_units == 0
            && self.renames == 0
            && self.direct_edges == 0
            && self.bound == 0
            && self.replaced == 0
            && self.repointed == 0
            && self.aliases == 0
    }
}

/// Summary of a whole pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub duration_ms: u64,
    pub threads: usize,
    pub units: usize,
    pub variants: usize,
    pub edges: usize,
    /// Content hash of the resolved graph.
    pub fingerprint: String,
    pub passes: Vec<PassStats>,
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Pipeline Report ===")?;
        writeln!(f, "Duration: {} ms", self.duration_ms)?;
        if self.threads > 0 {
            writeln!(f, "Threads: {}", self.threads)?;
        } else {
            writeln!(f, "Threads: serial")?;
        }
        writeln!(f)?;

        writeln!(f, "--- Passes ({}) ---", self.passes.len())?;
        for pass in &self.passes {
            let phase = pass.phase.map(Phase::name).unwrap_or("-");
            if pass.is_noop() {
                writeln!(f, "  {:<16} [{phase}] no changes", pass.mutator)?;
                continue;
            }
            writeln!(
                f,
                "  {:<16} [{phase}] {} split (+{} variants), {} bound, {} pending, {} repointed",
                pass.mutator, pass.splits, pass.children, pass.bound, pass.pending, pass.repointed,
            )?;
            if pass.created_units + pass.renames + pass.replaced + pass.aliases > 0 {
                writeln!(
                    f,
                    "  {:<16}        {} created, {} renamed, {} replaced, {} aliases",
                    "", pass.created_units, pass.renames, pass.replaced, pass.aliases,
                )?;
            }
        }

        writeln!(f)?;
        writeln!(f, "--- Graph ---")?;
        writeln!(f, "  Units: {}", self.units)?;
        writeln!(f, "  Variants: {}", self.variants)?;
        writeln!(f, "  Edges: {}", self.edges)?;
        writeln!(f, "  Fingerprint: {}", self.fingerprint)?;
        Ok(())
    }
}
