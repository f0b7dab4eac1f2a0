//! `mutagraph run`: split and bind a fixture graph, print the result.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use mutagraph_core::ResolvedGraph;
use mutagraph_pipeline::{Pipeline, PipelineBuilder, PipelineConfig, PipelineOutput, PipelineReport};
use serde::Serialize;
use tracing::debug;

use crate::manifest::GraphFixture;

#[derive(Serialize)]
struct RunSummary<'a> {
    report: &'a PipelineReport,
    graph: &'a ResolvedGraph,
}

/// Run the standard plan over the fixture at `path`.
pub fn run(path: &Path, threads: Option<usize>, serial: bool, format: Option<&str>) -> Result<()> {
    let fixture = GraphFixture::load(path)?;
    let mut config = fixture.pipeline.clone();
    if let Some(threads) = threads {
        config.threads = threads;
    }
    if serial {
        config.parallel = false;
    }

    let output = execute(&fixture, config)
        .with_context(|| format!("running {}", path.display()))?;
    print!("{}", render(&output, format.unwrap_or("text"))?);
    Ok(())
}

/// Build the graph and plan from `fixture` and run them.
pub fn execute(fixture: &GraphFixture, config: PipelineConfig) -> Result<PipelineOutput> {
    let mut graph = fixture.build_graph()?;
    let plan = PipelineBuilder::new().build(Arc::new(fixture.policy.clone()))?;
    debug!(mutators = plan.len(), units = graph.unit_count(), "plan ready");
    Ok(Pipeline::new(plan, config).run(&mut graph)?)
}

fn render(output: &PipelineOutput, format: &str) -> Result<String> {
    match format {
        "text" => Ok(format!("{}\n{}", output.resolved, output.report)),
        "json" => {
            let summary = RunSummary {
                report: &output.report,
                graph: &output.resolved,
            };
            Ok(serde_json::to_string_pretty(&summary)? + "\n")
        }
        other => bail!("unknown format '{other}'. Use: text, json"),
    }
}
