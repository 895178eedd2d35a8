//! CLI command implementations

use anyhow::Context;
use romforge_core::{clear_state, describe_chain, load_report, save_report, serialize, DependencyGraph};
use romforge_planner::{build_graph, create_report, BuildKind, BuildPlan, Config, PlanOutcome, Planner};
use std::path::Path;

pub fn plan(root: &Path) -> anyhow::Result<()> {
    let (config, graph) = load(root)?;
    let previous = load_report(&config.output_dir());

    let planner = Planner::new(&config, &graph);

    match planner.plan(BuildKind::Quick, previous)? {
        PlanOutcome::Plan(plan) if plan.is_up_to_date() => {
            println!("Everything is up to date");
        }
        PlanOutcome::Plan(plan) => print_steps(&plan),
        PlanOutcome::MustRebuild(reason) => {
            println!("Full rebuild required: {}", reason);
            print_steps(&planner.full_build());
        }
        PlanOutcome::CannotBuild(reason) => {
            anyhow::bail!("Cannot build: {}", reason);
        }
    }
    Ok(())
}

pub fn build_order(root: &Path) -> anyhow::Result<()> {
    let config = Config::load(root)?;
    let graph = DependencyGraph::new();
    print_steps(&Planner::new(&config, &graph).full_build());
    Ok(())
}

pub fn graph(root: &Path) -> anyhow::Result<()> {
    let (_, graph) = load(root)?;
    let records = serialize(&graph);
    let json = serde_json::to_string_pretty(&records).context("Failed to serialize dependency graph")?;
    println!("{}", json);
    Ok(())
}

pub fn check(root: &Path) -> anyhow::Result<()> {
    let (config, graph) = load(root)?;
    let base = config.project_dir();
    let unresolved = graph.unresolved_dependencies();

    if unresolved.is_empty() {
        println!("All dependencies resolved");
        return Ok(());
    }

    for (id, dependents) in &unresolved {
        for dependent in dependents {
            println!("{}", describe_chain(&graph, &[*dependent, *id], &base));
        }
    }
    tracing::warn!("{} unresolved dependencies", unresolved.len());
    Ok(())
}

pub fn record(root: &Path) -> anyhow::Result<()> {
    let (config, graph) = load(root)?;
    let output_dir = config.output_dir();

    let report = create_report(&config, &graph)?;
    save_report(&report, &output_dir)?;

    tracing::info!("Build report written to {}", output_dir.display());
    Ok(())
}

pub fn clear(root: &Path) -> anyhow::Result<()> {
    let config = Config::load(root)?;
    let output_dir = config.output_dir();
    tracing::info!("Clearing build state in: {}", output_dir.display());

    clear_state(&output_dir)
        .with_context(|| format!("Failed to clear build state in '{}'", output_dir.display()))?;

    tracing::info!("Build state cleared");
    Ok(())
}

fn load(root: &Path) -> anyhow::Result<(Config, DependencyGraph)> {
    tracing::info!("Loading project: {}", root.display());
    let config = Config::load(root)?;
    let graph = build_graph(&config)?;
    Ok((config, graph))
}

fn print_steps(plan: &BuildPlan) {
    for (n, step) in plan.steps.iter().enumerate() {
        println!("{:>3}. {}", n + 1, step);
    }
}
