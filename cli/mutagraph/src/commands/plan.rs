//! `mutagraph plan`: show the ordered mutator passes.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use mutagraph_pipeline::{Axis, MutatorPlan, PipelineBuilder, StaticPolicy};

use crate::manifest::GraphFixture;

/// Print the standard plan, with the fixture's policy when one is given.
pub fn run(fixture: Option<&Path>) -> Result<()> {
    let policy = match fixture {
        Some(path) => GraphFixture::load(path)?.policy,
        None => StaticPolicy::new(),
    };
    let plan = PipelineBuilder::new().build(Arc::new(policy.clone()))?;
    print!("{}", describe(&plan, &policy));
    Ok(())
}

fn describe(plan: &MutatorPlan, policy: &StaticPolicy) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Mutator Plan ({} passes) ===", plan.len());
    for (index, planned) in plan.mutators().iter().enumerate() {
        let descriptor = &planned.descriptor;
        let direction = if descriptor.is_top_down() { "top-down" } else { "bottom-up" };
        let mut flags = Vec::new();
        if descriptor.is_parallel() {
            flags.push("parallel");
        }
        if planned.final_phase {
            flags.push("final");
        }
        let _ = writeln!(
            out,
            "  {:>2}. {:<16} {:<10} {:<9} {}",
            index + 1,
            descriptor.name(),
            planned.phase.name(),
            direction,
            flags.join(" "),
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "--- Policy ---");
    for axis in Axis::ALL {
        let values = match axis {
            Axis::Os => &policy.os,
            Axis::Image => &policy.image,
            Axis::Arch => &policy.arch,
        };
        if values.is_empty() {
            let _ = writeln!(out, "  {axis}: (no split)");
        } else {
            let _ = writeln!(out, "  {axis}: {}", values.join(", "));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_lists_builtins_in_order() {
        let policy = StaticPolicy::new().with_axis(Axis::Arch, ["arm", "x86"]);
        let plan = PipelineBuilder::new().build(Arc::new(policy.clone())).unwrap();
        let text = describe(&plan, &policy);

        assert!(text.starts_with("=== Mutator Plan (5 passes) ==="));
        let order: Vec<usize> = ["component-deps", "os", "image", "arch", "deps"]
            .iter()
            .map(|name| text.find(&format!(". {name} ")).unwrap())
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
        assert!(text.contains("arch: arm, x86"));
        assert!(text.contains("os: (no split)"));
    }

    #[test]
    fn run_with_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.toml");
        std::fs::write(&path, GraphFixture::template("demo")).unwrap();
        run(Some(&path)).unwrap();
        run(None).unwrap();
    }
}
