//! Pipeline orchestrator.

use std::collections::BTreeSet;
use std::time::Instant;

use mutagraph_core::{bind_deferred, ResolvedGraph};
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PipelineError;
use crate::executor::run_pass;
use crate::module::ModuleGraph;
use crate::phase::{MutatorPlan, Phase};
use crate::report::PipelineReport;

/// Execution settings for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Worker threads for parallel mutators; 0 lets rayon decide.
    pub threads: usize,
    /// Run parallel-safe mutators on the worker pool. When false every
    /// mutator runs serially.
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            parallel: true,
        }
    }
}

impl PipelineConfig {
    pub fn serial() -> Self {
        Self {
            threads: 0,
            parallel: false,
        }
    }
}

/// Output of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Every live variant with its bound edges.
    pub resolved: ResolvedGraph,
    pub report: PipelineReport,
}

/// A plan bound to its execution settings.
#[derive(Debug, Clone)]
pub struct Pipeline {
    plan: MutatorPlan,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(plan: MutatorPlan, config: PipelineConfig) -> Self {
        Self { plan, config }
    }

    pub fn plan(&self) -> &MutatorPlan {
        &self.plan
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every planned mutator over `graph`, in order.
    ///
    /// Stops at the first failing pass. On success every dependency is bound
    /// to a live variant.
    pub fn run(&self, graph: &mut ModuleGraph) -> Result<PipelineOutput, PipelineError> {
        let start = Instant::now();
        let pool = if self.config.parallel {
            let pool = ThreadPoolBuilder::new()
                .num_threads(self.config.threads)
                .build()
                .map_err(|e| PipelineError::ThreadPool(e.to_string()))?;
            Some(pool)
        } else {
            None
        };
        let threads = pool.as_ref().map_or(0, |p| p.current_num_threads());
        info!(
            mutators = self.plan.len(),
            units = graph.unit_count(),
            threads,
            "starting pipeline"
        );

        let mut phase: Option<Phase> = None;
        let mut passes = Vec::with_capacity(self.plan.len());
        for (index, planned) in self.plan.mutators().iter().enumerate() {
            if phase != Some(planned.phase) {
                info!(phase = %planned.phase, "entering phase");
                phase = Some(planned.phase);
            }
            let pending = self.plan.pending_axes(index);
            passes.push(run_pass(graph, planned, &pending, pool.as_ref())?);
        }

        // Nothing is pending once the last mutator has run.
        bind_deferred(graph, &BTreeSet::new())?;
        let resolved = graph.resolve()?;
        let fingerprint = resolved
            .fingerprint()
            .map_err(|e| PipelineError::Fingerprint(e.to_string()))?
            .to_string();

        let report = PipelineReport {
            duration_ms: start.elapsed().as_millis() as u64,
            threads,
            units: graph.unit_count(),
            variants: resolved.variants.len(),
            edges: resolved.edge_count(),
            fingerprint,
            passes,
        };
        info!(
            variants = report.variants,
            edges = report.edges,
            duration_ms = report.duration_ms,
            "pipeline complete"
        );
        Ok(PipelineOutput { resolved, report })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mutagraph_core::{variation_map, DependencyTag, Properties, PropertyBag, VariationMap};

    use super::*;
    use crate::builtin::{Axis, NoSplitPolicy, StaticPolicy};
    use crate::context::BottomUpContext;
    use crate::module::{Module, ModuleRef, PlainModule};
    use crate::phase::{MutatorDescriptor, PipelineBuilder};

    fn tag() -> DependencyTag {
        DependencyTag::new("build")
    }

    fn graph(names: &[&str]) -> ModuleGraph {
        let mut g = ModuleGraph::new();
        for name in names {
            g.add_unit(name, PlainModule::shared("test"), Properties::default())
                .unwrap();
        }
        g
    }

    fn bare() -> PipelineBuilder {
        PipelineBuilder::new().without_builtins()
    }

    fn run(
        builder: PipelineBuilder,
        g: &mut ModuleGraph,
    ) -> Result<PipelineOutput, PipelineError> {
        let plan = builder.build(Arc::new(NoSplitPolicy))?;
        Pipeline::new(plan, PipelineConfig::serial()).run(g)
    }

    /// Splits `lib` along the mutator's axis.
    fn split_lib(name: &str, values: &'static [&'static str]) -> MutatorDescriptor {
        MutatorDescriptor::bottom_up(name, move |ctx| {
            if ctx.unit_name() == "lib" {
                ctx.create_variations(values)?;
            }
            Ok(())
        })
    }

    #[test]
    fn queued_request_binds_after_later_split() {
        let mut g = graph(&["lib", "app", "app2"]);
        let mut builder = bare();
        builder
            .register(
                Phase::PreArch,
                MutatorDescriptor::bottom_up("request", |ctx| match ctx.unit_name() {
                    "app" => ctx.add_variation_dependencies(
                        &variation_map([("arch", "arm")]),
                        &tag(),
                        &["lib"],
                    ),
                    "app2" => {
                        ctx.add_far_variation_dependencies(&VariationMap::new(), &tag(), &["lib"])
                    }
                    _ => Ok(()),
                }),
            )
            .unwrap()
            .register(Phase::Arch, split_lib("arch", &["arm", "x86"]))
            .unwrap();

        let out = run(builder, &mut g).unwrap();
        let app = out.resolved.find("app", "").unwrap();
        assert_eq!(app.deps[0].unit, "lib");
        assert_eq!(app.deps[0].variant, "arm");
        let app2 = out.resolved.find("app2", "").unwrap();
        assert_eq!(app2.deps[0].variant, "arm");
    }

    #[test]
    fn request_after_split_picks_named_child() {
        let mut g = graph(&["lib", "app"]);
        let mut builder = bare();
        builder
            .register(Phase::Arch, split_lib("arch", &["arm", "x86", "mips"]))
            .unwrap()
            .register(
                Phase::PreDeps,
                MutatorDescriptor::bottom_up("request", |ctx| {
                    if ctx.unit_name() == "app" {
                        let x86 = variation_map([("arch", "x86")]);
                        ctx.add_far_variation_dependencies(&x86, &tag(), &["lib"])?;
                    }
                    Ok(())
                }),
            )
            .unwrap();

        let out = run(builder, &mut g).unwrap();
        assert_eq!(out.resolved.find("app", "").unwrap().deps[0].variant, "x86");
    }

    #[test]
    fn far_mode_ignores_requester_variations() {
        let mut g = graph(&["lib", "app"]);
        let mut builder = bare();
        builder
            .register(
                Phase::Arch,
                MutatorDescriptor::bottom_up("arch", |ctx| {
                    ctx.create_variations(&["arm", "x86"])?;
                    Ok(())
                }),
            )
            .unwrap()
            .register(
                Phase::PreDeps,
                MutatorDescriptor::bottom_up("request", |ctx| {
                    if ctx.unit_name() == "app" {
                        let x86 = variation_map([("arch", "x86")]);
                        ctx.add_far_variation_dependencies(&x86, &tag(), &["lib"])?;
                    }
                    Ok(())
                }),
            )
            .unwrap();

        let out = run(builder, &mut g).unwrap();
        for variant in ["arm", "x86"] {
            let app = out.resolved.find("app", variant).unwrap();
            assert_eq!(app.deps[0].variant, "x86");
        }
    }

    #[test]
    fn default_applies_only_to_missing_axes() {
        let mut g = graph(&["lib", "app"]);
        let mut builder = bare();
        builder
            .register(
                Phase::Arch,
                MutatorDescriptor::bottom_up("arch", |ctx| {
                    if ctx.unit_name() == "lib" {
                        ctx.create_variations(&["arm", "x86"])?;
                    } else {
                        ctx.set_default_dependency_variation(Some("x86"));
                    }
                    Ok(())
                }),
            )
            .unwrap()
            .register(
                Phase::PreDeps,
                MutatorDescriptor::bottom_up("request", |ctx| {
                    if ctx.unit_name() == "app" {
                        ctx.add_dependency(&tag(), &["lib"])?;
                    }
                    Ok(())
                }),
            )
            .unwrap();
        let out = run(builder, &mut g).unwrap();
        assert_eq!(out.resolved.find("app", "").unwrap().deps[0].variant, "x86");

        let mut g = graph(&["lib", "app"]);
        let mut builder = bare();
        builder
            .register(
                Phase::Arch,
                MutatorDescriptor::bottom_up("arch", |ctx| {
                    if ctx.unit_name() == "lib" {
                        ctx.create_variations(&["arm", "x86"])?;
                    } else {
                        ctx.set_default_dependency_variation(Some("x86"));
                    }
                    Ok(())
                }),
            )
            .unwrap()
            .register(
                Phase::PreDeps,
                MutatorDescriptor::bottom_up("request", |ctx| {
                    if ctx.unit_name() == "app" {
                        let mips = variation_map([("arch", "mips")]);
                        ctx.add_variation_dependencies(&mips, &tag(), &["lib"])?;
                    }
                    Ok(())
                }),
            )
            .unwrap();
        let err = run(builder, &mut g).unwrap_err();
        match err {
            PipelineError::UnresolvedDependency(err) => {
                assert_eq!(err.dependent, "app");
                assert_eq!(err.constraints, "{arch:mips}");
                assert_eq!(err.available, vec!["lib#arm", "lib#x86"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn default_on_another_axis_keeps_explicit_values() {
        for (arch, expected) in [("arm", Some("android_arm")), ("mips", None)] {
            let mut g = graph(&["lib", "app"]);
            let mut builder = bare();
            builder
                .register(
                    Phase::Arch,
                    MutatorDescriptor::bottom_up("os", |ctx| {
                        ctx.create_variations(&["android", "linux"])?;
                        if ctx.unit_name() == "app" {
                            ctx.set_default_dependency_variation(Some("android"));
                        }
                        Ok(())
                    }),
                )
                .unwrap()
                .register(
                    Phase::Arch,
                    MutatorDescriptor::bottom_up("arch", |ctx| {
                        if ctx.unit_name() == "lib" {
                            match ctx.variation("os") {
                                Some("linux") => ctx.create_variations(&["x86"])?,
                                _ => ctx.create_variations(&["arm", "x86"])?,
                            };
                        }
                        Ok(())
                    }),
                )
                .unwrap()
                .register(
                    Phase::PreDeps,
                    MutatorDescriptor::bottom_up("request", move |ctx| {
                        if ctx.unit_name() == "app" {
                            let wanted = variation_map([("arch", arch)]);
                            ctx.add_variation_dependencies(&wanted, &tag(), &["lib"])?;
                        }
                        Ok(())
                    }),
                )
                .unwrap();

            match (run(builder, &mut g), expected) {
                (Ok(out), Some(variant)) => {
                    for os in ["android", "linux"] {
                        let app = out.resolved.find("app", os).unwrap();
                        assert_eq!(app.deps[0].variant, variant);
                    }
                }
                (Err(PipelineError::UnresolvedDependency(err)), None) => {
                    assert!(err.constraints.contains("arch:mips"));
                    assert_eq!(err.target, "lib");
                }
                (other, _) => panic!("arch {arch}: unexpected result {:?}", other.err()),
            }
        }
    }

    #[test]
    fn split_in_the_requesting_visit_keeps_its_requests() {
        for split_first in [false, true] {
            let mut g = graph(&["libc", "app"]);
            let mut builder = bare();
            builder
                .register(
                    Phase::PreArch,
                    MutatorDescriptor::bottom_up("link", move |ctx| {
                        if ctx.unit_name() != "app" {
                            return Ok(());
                        }
                        if split_first {
                            ctx.create_variations(&["shared", "static"])?;
                            ctx.add_dependency(&tag(), &["libc"])
                        } else {
                            ctx.add_dependency(&tag(), &["libc"])?;
                            ctx.create_variations(&["shared", "static"])?;
                            Ok(())
                        }
                    }),
                )
                .unwrap();

            let out = run(builder, &mut g).unwrap();
            for variant in ["shared", "static"] {
                let app = out.resolved.find("app", variant).unwrap();
                assert_eq!(app.deps.len(), 1);
                assert_eq!(app.deps[0].unit, "libc");
                assert_eq!(app.deps[0].variant, "");
            }
        }
    }

    #[test]
    fn target_split_in_the_requesting_pass_goes_to_first_child() {
        for queued_earlier in [false, true] {
            let mut g = graph(&["lib", "app"]);
            let mut builder = bare();
            if queued_earlier {
                builder
                    .register(
                        Phase::PreArch,
                        MutatorDescriptor::bottom_up("request", |ctx| {
                            if ctx.unit_name() == "app" {
                                ctx.add_dependency(&tag(), &["lib"])?;
                            }
                            Ok(())
                        }),
                    )
                    .unwrap();
            }
            builder
                .register(
                    Phase::Arch,
                    MutatorDescriptor::bottom_up("link", move |ctx| {
                        match ctx.unit_name() {
                            "lib" => {
                                ctx.create_variations(&["shared", "static"])?;
                            }
                            "app" if !queued_earlier => ctx.add_dependency(&tag(), &["lib"])?,
                            _ => {}
                        }
                        Ok(())
                    }),
                )
                .unwrap();

            let out = run(builder, &mut g).unwrap();
            let app = out.resolved.find("app", "").unwrap();
            assert_eq!(app.deps.len(), 1);
            assert_eq!(app.deps[0].unit, "lib");
            assert_eq!(app.deps[0].variant, "shared");
        }
    }

    #[test]
    fn replacement_redirects_edges_added_in_the_same_pass() {
        let mut g = graph(&["old", "new", "user"]);
        let mut builder = bare();
        builder
            .register(
                Phase::PostDeps,
                MutatorDescriptor::bottom_up("swap", |ctx| match ctx.unit_name() {
                    "new" => ctx.replace_dependencies("old"),
                    "user" => ctx.add_dependency(&tag(), &["old"]),
                    _ => Ok(()),
                }),
            )
            .unwrap();

        let out = run(builder, &mut g).unwrap();
        let user = out.resolved.find("user", "").unwrap();
        assert_eq!(user.deps[0].unit, "new");
        assert_eq!(out.report.passes[0].replaced, 1);
    }

    #[test]
    fn replacement_without_identical_variant_fails() {
        let mut g = graph(&["old", "new"]);
        let mut builder = bare();
        builder
            .register(
                Phase::Arch,
                MutatorDescriptor::bottom_up("arch", |ctx| {
                    if ctx.unit_name() == "new" {
                        ctx.create_variations(&["arm"])?;
                    }
                    Ok(())
                }),
            )
            .unwrap()
            .register(
                Phase::PostDeps,
                MutatorDescriptor::bottom_up("swap", |ctx| {
                    if ctx.unit_name() == "new" {
                        ctx.replace_dependencies("old")?;
                    }
                    Ok(())
                }),
            )
            .unwrap();
        let err = run(builder, &mut g).unwrap_err();
        assert!(matches!(err, PipelineError::MissingReplacementTarget { .. }));
    }

    #[test]
    fn predicate_replacement_filters_by_tag() {
        let mut g = graph(&["old", "new", "user"]);
        let mut builder = bare();
        builder
            .register(
                Phase::PostDeps,
                MutatorDescriptor::bottom_up("swap", |ctx| match ctx.unit_name() {
                    "new" => {
                        ctx.replace_dependencies_if("old", |_, tag, _| tag.as_str() == "runtime")
                    }
                    "user" => {
                        ctx.add_dependency(&DependencyTag::new("runtime"), &["old"])?;
                        ctx.add_dependency(&DependencyTag::new("header"), &["old"])
                    }
                    _ => Ok(()),
                }),
            )
            .unwrap();
        let out = run(builder, &mut g).unwrap();
        let targets: Vec<&str> = out
            .resolved
            .find("user", "")
            .unwrap()
            .deps
            .iter()
            .map(|d| d.unit.as_str())
            .collect();
        assert_eq!(targets, vec!["new", "old"]);
    }

    #[test]
    fn local_variations_need_explicit_requests() {
        let mut g = graph(&["lib", "app", "bin"]);
        let mut builder = bare();
        builder
            .register(
                Phase::PreArch,
                MutatorDescriptor::bottom_up("link", |ctx| {
                    if ctx.unit_name() == "lib" {
                        ctx.create_local_variations(&["shared", "static"])?;
                    }
                    Ok(())
                }),
            )
            .unwrap()
            .register(
                Phase::PreDeps,
                MutatorDescriptor::bottom_up("request", |ctx| match ctx.unit_name() {
                    "app" => ctx.add_variation_dependencies(
                        &variation_map([("link", "static")]),
                        &tag(),
                        &["lib"],
                    ),
                    _ => Ok(()),
                }),
            )
            .unwrap();
        let out = run(builder, &mut g).unwrap();
        assert_eq!(out.resolved.find("app", "").unwrap().deps[0].variant, "static");
        assert!(out.resolved.find("bin", "").unwrap().deps.is_empty());
    }

    #[test]
    fn alias_serves_requests_queued_before_split() {
        let mut g = graph(&["lib", "app"]);
        let mut builder = bare();
        builder
            .register(
                Phase::PreArch,
                MutatorDescriptor::bottom_up("request", |ctx| {
                    if ctx.unit_name() == "app" {
                        ctx.add_dependency(&tag(), &["lib"])?;
                    }
                    Ok(())
                }),
            )
            .unwrap()
            .register(
                Phase::PreDeps,
                MutatorDescriptor::bottom_up("link", |ctx| {
                    if ctx.unit_name() == "lib" {
                        ctx.create_local_variations(&["shared", "static"])?;
                        ctx.alias_variation("static");
                    }
                    Ok(())
                }),
            )
            .unwrap();
        // The request bound to the unsplit lib first and is repointed via the
        // edge rules, which need a name for local splits.
        let err = run(builder, &mut g).unwrap_err();
        assert!(matches!(err, PipelineError::UnresolvedDependency(_)));

        let mut g = graph(&["lib", "app"]);
        let mut builder = bare();
        builder
            .register(
                Phase::PreArch,
                MutatorDescriptor::bottom_up("link", |ctx| {
                    match ctx.unit_name() {
                        "lib" => {
                            ctx.create_local_variations(&["shared", "static"])?;
                            ctx.alias_variation("static");
                        }
                        _ => ctx.add_dependency(&tag(), &["lib"])?,
                    }
                    Ok(())
                }),
            )
            .unwrap();
        let out = run(builder, &mut g).unwrap();
        assert_eq!(out.resolved.find("app", "").unwrap().deps[0].variant, "static");
    }

    #[test]
    fn dependency_variation_steers_repointing() {
        let mut g = graph(&["lib", "app"]);
        let app = g.unit_by_name("app").unwrap().variants()[0];
        let lib = g.unit_by_name("lib").unwrap().variants()[0];
        g.add_dependency(app, mutagraph_core::Dependency::resolved(tag(), lib))
            .unwrap();

        let mut builder = bare();
        builder
            .register(
                Phase::PreArch,
                MutatorDescriptor::bottom_up("link", |ctx| {
                    if ctx.unit_name() == "lib" {
                        ctx.create_local_variations(&["shared", "static"])?;
                    } else {
                        ctx.set_dependency_variation("shared");
                    }
                    Ok(())
                }),
            )
            .unwrap();
        let out = run(builder, &mut g).unwrap();
        assert_eq!(out.resolved.find("app", "").unwrap().deps[0].variant, "shared");
    }

    #[derive(Debug)]
    struct Creator;

    impl Module for Creator {
        fn type_name(&self) -> &str {
            "creator"
        }
    }

    fn prebuilt() -> (ModuleRef, Properties) {
        (
            PlainModule::shared("prebuilt"),
            Properties::new(PropertyBag::new().with("enabled", true), PropertyBag::new()),
        )
    }

    #[test]
    fn created_units_join_later_passes_only() {
        let mut g = ModuleGraph::new();
        g.add_unit("gen", Arc::new(Creator), Properties::default())
            .unwrap();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let late = Arc::clone(&seen);

        let mut builder = bare();
        builder
            .register(
                Phase::PreDeps,
                MutatorDescriptor::top_down("create", |ctx| {
                    if ctx.module().type_name() == "creator" {
                        let extra = PropertyBag::new().with("name", "gen_prebuilt");
                        let created = ctx.create_module(&prebuilt, &[extra]);
                        assert_eq!(created.as_deref(), Some("gen_prebuilt"));
                        assert!(ctx.graph().unit_by_name("gen_prebuilt").is_none());
                    }
                    Ok(())
                }),
            )
            .unwrap()
            .register(
                Phase::PostDeps,
                MutatorDescriptor::bottom_up("observe", move |ctx| {
                    late.lock().unwrap().push(ctx.unit_name().to_string());
                    Ok(())
                }),
            )
            .unwrap();
        let out = run(builder, &mut g).unwrap();
        assert_eq!(out.report.passes[0].created_units, 1);
        assert_eq!(*seen.lock().unwrap(), vec!["gen", "gen_prebuilt"]);
        assert!(out.resolved.find("gen_prebuilt", "").is_some());
    }

    #[test]
    fn unresolved_at_end_names_the_request() {
        let mut g = graph(&["lib", "app"]);
        let mut builder = bare();
        builder
            .register(
                Phase::PreArch,
                MutatorDescriptor::bottom_up("request", |ctx| {
                    if ctx.unit_name() == "app" {
                        let arm = variation_map([("arch", "arm")]);
                        ctx.add_far_variation_dependencies(&arm, &tag(), &["lib"])?;
                    }
                    Ok(())
                }),
            )
            .unwrap()
            .register(Phase::Arch, split_lib("arch", &["x86"]))
            .unwrap();
        let err = run(builder, &mut g).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("app depends on lib"), "{text}");
        assert!(text.contains("{arch:arm}"), "{text}");
        assert!(text.contains("lib#x86"), "{text}");
    }

    #[test]
    fn dependency_cycle_is_fatal() {
        let mut g = graph(&["a", "b"]);
        let mut builder = bare();
        builder
            .register(
                Phase::PreDeps,
                MutatorDescriptor::bottom_up("deps", |ctx| match ctx.unit_name() {
                    "a" => ctx.add_dependency(&tag(), &["b"]),
                    _ => ctx.add_dependency(&tag(), &["a"]),
                }),
            )
            .unwrap()
            .register(Phase::PostDeps, MutatorDescriptor::bottom_up("after", |_| Ok(())))
            .unwrap();
        let err = run(builder, &mut g).unwrap_err();
        assert!(matches!(err, PipelineError::DependencyCycle(_)));
    }

    #[derive(Debug)]
    struct Library {
        deps: Vec<&'static str>,
    }

    impl Module for Library {
        fn type_name(&self) -> &str {
            "library"
        }

        fn deps(&self, ctx: &mut BottomUpContext<'_>) -> Result<(), PipelineError> {
            ctx.add_dependency(&tag(), &self.deps)
        }
    }

    fn standard_graph() -> ModuleGraph {
        let mut g = ModuleGraph::new();
        let host = Properties::new(
            PropertyBag::new(),
            PropertyBag::new().with("os", vec!["linux".to_string()]),
        );
        let disabled = Properties::new(
            PropertyBag::new().with("enabled", false),
            PropertyBag::new(),
        );
        g.add_unit("libc", Arc::new(Library { deps: vec![] }), Properties::default())
            .unwrap();
        g.add_unit("libutils", Arc::new(Library { deps: vec!["libc"] }), Properties::default())
            .unwrap();
        let app = Library {
            deps: vec!["libutils", "libc"],
        };
        g.add_unit("app", Arc::new(app), Properties::default())
            .unwrap();
        g.add_unit("tool", Arc::new(Library { deps: vec!["libc"] }), host)
            .unwrap();
        g.add_unit("broken", Arc::new(Library { deps: vec!["missing"] }), disabled)
            .unwrap();
        g
    }

    fn standard_plan() -> MutatorPlan {
        let policy = StaticPolicy::new()
            .with_axis(Axis::Os, ["android", "linux"])
            .with_axis(Axis::Arch, ["arm64", "x86_64"]);
        PipelineBuilder::new().build(Arc::new(policy)).unwrap()
    }

    #[test]
    fn standard_pipeline_splits_and_binds() {
        let mut g = standard_graph();
        let out = Pipeline::new(standard_plan(), PipelineConfig::serial())
            .run(&mut g)
            .unwrap();

        // libc, libutils, app: 2 os x 2 arch; tool: 1 os x 2 arch; broken: 4.
        assert_eq!(out.resolved.variants.len(), 4 + 4 + 4 + 2 + 4);
        let app = out.resolved.find("app", "android_x86_64").unwrap();
        let targets: Vec<String> = app
            .deps
            .iter()
            .map(|d| format!("{}#{}", d.unit, d.variant))
            .collect();
        assert_eq!(targets, vec!["libutils#android_x86_64", "libc#android_x86_64"]);
        let tool = out.resolved.find("tool", "linux_arm64").unwrap();
        assert_eq!(tool.deps[0].variant, "linux_arm64");
        assert_eq!(tool.history.len(), 2);
        assert!(out.resolved.find("broken", "android_arm64").unwrap().deps.is_empty());
    }

    #[test]
    fn parallel_and_serial_runs_agree() {
        let mut serial = standard_graph();
        let a = Pipeline::new(standard_plan(), PipelineConfig::serial())
            .run(&mut serial)
            .unwrap();
        let mut parallel = standard_graph();
        let b = Pipeline::new(
            standard_plan(),
            PipelineConfig {
                threads: 4,
                parallel: true,
            },
        )
        .run(&mut parallel)
        .unwrap();
        assert_eq!(a.report.fingerprint, b.report.fingerprint);
        assert_eq!(a.resolved, b.resolved);
        assert_eq!(b.report.threads, 4);
    }
}
