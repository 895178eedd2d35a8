//! Build planning: full builds and incremental quick builds

use crate::config::Config;
use crate::insertable::Insertable;
use crate::resources::ResourceDigests;
use romforge_core::{
    describe_chain, Analysis, DependencyGraph, Digest, GraphAnalyzer, Report, RootComparison, SerializedGraph,
    StaleReport, Tool, Verdict, Vertex,
};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildKind {
    /// Rebuild the output from the clean base image.
    Full,
    /// Reinsert only what changed since the previous build.
    Quick,
}

/// Ordered insertion steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildPlan {
    pub steps: Vec<Insertable>,
}

impl BuildPlan {
    /// Nothing to insert: the previous output is current.
    pub fn is_up_to_date(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    Plan(BuildPlan),
    /// The previous output cannot be reused; build from scratch instead.
    MustRebuild(String),
    /// No build can succeed until the configuration or inputs are fixed.
    CannotBuild(String),
}

pub struct Planner<'a> {
    config: &'a Config,
    graph: &'a DependencyGraph,
}

impl<'a> Planner<'a> {
    pub fn new(config: &'a Config, graph: &'a DependencyGraph) -> Self {
        Planner { config, graph }
    }

    pub fn plan(&self, kind: BuildKind, previous: Result<Report, StaleReport>) -> anyhow::Result<PlanOutcome> {
        match kind {
            BuildKind::Full => Ok(PlanOutcome::Plan(self.full_build())),
            BuildKind::Quick => self.quick_build(previous),
        }
    }

    /// Every declared step, with `Patches` expanded to the patches not named individually.
    pub fn full_build(&self) -> BuildPlan {
        let mut steps = Vec::new();
        for item in self.config.build_order() {
            match item {
                Insertable::Patches => steps.extend(self.unnamed_patches().map(|p| Insertable::SinglePatch(p.clone()))),
                other => steps.push(other.clone()),
            }
        }
        BuildPlan { steps }
    }

    /// Work out what must be reinserted into the previous output.
    pub fn quick_build(&self, previous: Result<Report, StaleReport>) -> anyhow::Result<PlanOutcome> {
        tracing::info!("Analyzing previous build result");

        match self.config.output_path() {
            Some(output) if output.is_file() => {
                tracing::info!("Previously built ROM found at '{}'", output.display());
            }
            _ => return Ok(must_rebuild("No previously built ROM found")),
        }

        let report = match previous {
            Ok(report) => report,
            Err(stale) => return Ok(must_rebuild(stale.to_string())),
        };

        let resources = ResourceDigests::collect(self.config)?;
        if let Some(reason) = self.structural_change(&report, &resources) {
            return Ok(must_rebuild(reason));
        }

        for &root in self.graph.patch_roots() {
            if let Vertex::Missing { file } = &self.graph[root] {
                let reason = format!("Patch '{}' could not be found", file.path.display());
                tracing::error!("{}", reason);
                return Ok(PlanOutcome::CannotBuild(reason));
            }
        }

        let old_graph = match SerializedGraph::new(report.dependency_graph.clone()) {
            Ok(old_graph) => old_graph,
            Err(e) => return Ok(must_rebuild(format!("Previous build report is corrupted: {}", e))),
        };
        let analyzer = GraphAnalyzer::new(self.graph, &old_graph);

        if let Some(reason) = self.module_change(&analyzer) {
            return Ok(must_rebuild(reason));
        }

        let patch_results = match analyzer.analyze_patches() {
            RootComparison::Removed { detail } => {
                return Ok(must_rebuild(format!(
                    "Previously built ROM contains patches that need to be removed: {}",
                    detail
                )));
            }
            RootComparison::Compared(results) => results,
        };

        let mut changed: BTreeSet<Insertable> = BTreeSet::new();

        for tool in Tool::ALL {
            match self.analyze_tool(tool, &report, &analyzer) {
                ToolChange::Unchanged => {}
                ToolChange::Reapply => {
                    changed.insert(Insertable::from(tool));
                }
                ToolChange::Rebuild(reason) => return Ok(must_rebuild(reason)),
            }
        }

        tracing::info!("Analyzing patch dependencies");
        for (root, analysis) in &patch_results {
            if analysis.is_identical() {
                continue;
            }
            if let Vertex::PatchRoot { relative_path, .. } = &self.graph[*root] {
                let resource = format!("Patch '{}'", relative_path);
                if analysis.verdict == Verdict::Arbitrary {
                    return Ok(must_rebuild(self.arbitrary_reason(&resource, analysis)));
                }
                self.log_reason(&resource, analysis);
                changed.insert(Insertable::SinglePatch(relative_path.clone()));
            }
        }

        self.check_resources(&report, &resources, &mut changed);
        self.check_levels(&report, &resources, &mut changed);

        let plan = self.order(&changed);
        if plan.is_up_to_date() {
            tracing::info!("Previously built ROM should already be up to date");
        }
        Ok(PlanOutcome::Plan(plan))
    }

    /// Changes the previous output cannot absorb without a full rebuild.
    fn structural_change(&self, report: &Report, resources: &ResourceDigests) -> Option<String> {
        if let Some(old_levels) = &report.levels {
            let removed = match &resources.levels {
                None => true,
                Some(new_levels) => old_levels.keys().any(|level| !new_levels.contains_key(level)),
            };
            if removed {
                return Some("Previously built ROM contains levels that need to be removed".to_string());
            }
        }

        if report.init_bps != resources.init_bps {
            return Some("Change in initial patch detected".to_string());
        }

        if report.build_order_hash.as_ref() != Some(&resources.build_order_hash) {
            return Some("Change in build order detected".to_string());
        }

        if report.asar_options != self.config.asar_options {
            return Some(format!(
                "Assembler options changed from \"{}\" to \"{}\"",
                report.asar_options.as_deref().unwrap_or_default(),
                self.config.asar_options.as_deref().unwrap_or_default()
            ));
        }

        None
    }

    /// Module code is reached through generated call stubs the graph does not
    /// track, so any module change invalidates the whole output.
    fn module_change(&self, analyzer: &GraphAnalyzer<'_>) -> Option<String> {
        tracing::info!("Analyzing module dependencies");
        match analyzer.analyze_modules() {
            RootComparison::Removed { detail } => Some(detail),
            RootComparison::Compared(results) => results.iter().find(|(_, a)| !a.is_identical()).map(|(_, a)| {
                format!(
                    "Module changed: {} ({})",
                    describe_chain(self.graph, &a.chain, &self.config.project_dir()),
                    a.verdict.describe()
                )
            }),
        }
    }

    fn analyze_tool(&self, tool: Tool, report: &Report, analyzer: &GraphAnalyzer<'_>) -> ToolChange {
        tracing::info!("Analyzing {} dependencies", tool);

        let old_options = previous_options(report, tool);
        let new_options = self.config.tool_options(tool);
        if old_options != new_options {
            tracing::warn!(
                "{} command line options changed from \"{}\" to \"{}\", {} will be reinserted",
                tool,
                old_options.unwrap_or_default(),
                new_options.unwrap_or_default(),
                tool
            );
            return ToolChange::Reapply;
        }

        let analysis = analyzer.analyze_tool(tool);
        match analysis.verdict {
            Verdict::Identical => {
                tracing::info!("{} dependencies already up to date", tool);
                ToolChange::Unchanged
            }
            Verdict::NoRoots => ToolChange::Unchanged,
            Verdict::OldRoot => ToolChange::Rebuild(format!(
                "{} was previously inserted into the ROM but is no longer designated for insertion",
                tool
            )),
            Verdict::Arbitrary => ToolChange::Rebuild(self.arbitrary_reason(tool.display_name(), &analysis)),
            _ => {
                self.log_reason(tool.display_name(), &analysis);
                ToolChange::Reapply
            }
        }
    }

    fn check_resources(&self, report: &Report, resources: &ResourceDigests, changed: &mut BTreeSet<Insertable>) {
        let checks: [(&str, Insertable, &Option<Digest>, &Option<Digest>); 6] = [
            ("GFX", Insertable::Graphics, &report.graphics, &resources.graphics),
            ("ExGFX", Insertable::ExGraphics, &report.exgraphics, &resources.exgraphics),
            ("Map16", Insertable::Map16, &report.map16, &resources.map16),
            ("Title moves", Insertable::TitleMoves, &report.title_moves, &resources.title_moves),
            ("Shared palettes", Insertable::SharedPalettes, &report.shared_palettes, &resources.shared_palettes),
            ("Global data", Insertable::GlobalData, &report.global_data, &resources.global_data),
        ];

        for (name, insertable, old, new) in checks {
            tracing::info!("Checking for {} changes", name);
            if old != new {
                tracing::warn!("Change in {} detected, will insert {}", name, name);
                changed.insert(insertable);
            }
        }
    }

    fn check_levels(&self, report: &Report, resources: &ResourceDigests, changed: &mut BTreeSet<Insertable>) {
        tracing::info!("Checking for level changes");
        if report.lm_level_import_flags != self.config.lm_level_import_flags {
            tracing::warn!("Change in level import flags detected, reinserting all levels");
            changed.insert(Insertable::Levels);
            return;
        }

        let empty = BTreeMap::new();
        let old_levels = report.levels.as_ref().unwrap_or(&empty);
        for (level, digest) in resources.levels.iter().flatten() {
            match old_levels.get(level) {
                None => tracing::warn!("New level '{}' detected, will be inserted", level),
                Some(old) if old != digest => tracing::warn!("Changed level '{}' detected, will be reinserted", level),
                Some(_) => continue,
            }
            changed.insert(Insertable::SingleLevel(level.clone()));
        }
    }

    /// Expand `changed` through the trigger graph, then order it by the build order.
    ///
    /// Single patches not named in the build order go where `Patches` stands, single
    /// levels where `Levels` stands. A trigger on `Levels` fires for any level.
    fn order(&self, changed: &BTreeSet<Insertable>) -> BuildPlan {
        let triggers = self.config.triggers();
        let mut triggered = changed.clone();
        for item in changed {
            let source = match item {
                Insertable::SingleLevel(_) => Insertable::Levels,
                other => other.clone(),
            };
            for target in triggers.triggered_by(&source) {
                if triggered.insert(target.clone()) {
                    tracing::warn!("{} triggers reinsertion of {}", item, target);
                }
            }
        }

        let mut steps = Vec::new();
        for item in self.config.build_order() {
            match item {
                Insertable::Patches => {
                    for patch in self.unnamed_patches() {
                        let single = Insertable::SinglePatch(patch.clone());
                        if triggered.contains(&single) {
                            steps.push(single);
                        }
                    }
                }
                Insertable::Levels if triggered.contains(&Insertable::Levels) => steps.push(Insertable::Levels),
                Insertable::Levels => steps.extend(
                    triggered
                        .iter()
                        .filter(|t| matches!(t, Insertable::SingleLevel(_)))
                        .cloned(),
                ),
                other if triggered.contains(other) => steps.push(other.clone()),
                _ => {}
            }
        }
        BuildPlan { steps }
    }

    /// Configured patches the build order does not name individually.
    fn unnamed_patches(&self) -> impl Iterator<Item = &String> {
        self.config
            .patches
            .iter()
            .filter(|p| !self.config.uses(&Insertable::SinglePatch((*p).clone())))
    }

    fn log_reason(&self, resource: &str, analysis: &Analysis) {
        tracing::warn!(
            "{} must be (re)inserted due to the following dependency: {} ({})",
            resource,
            describe_chain(self.graph, &analysis.chain, &self.config.project_dir()),
            analysis.verdict.describe()
        );
        if analysis.verdict == Verdict::Missing {
            tracing::warn!("{} has a dependency that cannot be checked, it is reinserted on every quick build", resource);
        }
    }

    /// An include that cannot be evaluated statically could pull in anything.
    fn arbitrary_reason(&self, resource: &str, analysis: &Analysis) -> String {
        format!(
            "{} depends on a file that cannot be determined statically: {}",
            resource,
            describe_chain(self.graph, &analysis.chain, &self.config.project_dir())
        )
    }
}

enum ToolChange {
    Unchanged,
    Reapply,
    Rebuild(String),
}

fn previous_options(report: &Report, tool: Tool) -> Option<&str> {
    match tool {
        Tool::Pixi => report.pixi_options.as_deref(),
        Tool::Gps => report.gps_options.as_deref(),
        Tool::AddMusicK => report.addmusick_options.as_deref(),
        Tool::UberAsm => report.uberasm_options.as_deref(),
    }
}

fn must_rebuild(reason: impl Into<String>) -> PlanOutcome {
    let reason = reason.into();
    tracing::warn!("{}, rebuilding ROM", reason);
    PlanOutcome::MustRebuild(reason)
}
