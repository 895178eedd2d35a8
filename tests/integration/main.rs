//! Integration tests for Romforge
//!
//! These tests drive a whole project through configuration, graph resolution,
//! report recording and quick build planning.

use romforge_core::{clear_state, load_report, report_path, save_report, StaleReport};
use romforge_planner::{build_graph, create_report, BuildKind, Config, Insertable, PlanOutcome, Planner};
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const CONFIG: &str = "\
output = build/hack.smc
levels = levels
map16 = resources/all.map16
globules_path = globules

patches
[
    patches/hud.asm
    patches/physics.asm
]

build_order
[
    Map16
    Patches
    Levels
]

quick_build_triggers
[
    patches/physics.asm -> Map16
]
";

fn write(root: &Path, path: &str, content: &str) {
    let full_path = root.join(path);
    fs::create_dir_all(full_path.parent().unwrap()).unwrap();
    fs::write(full_path, content).unwrap();
}

fn create_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "config.txt", CONFIG);
    write(root, "levels/105.mwl", "level 105");
    write(root, "resources/all.map16", "map16");
    write(root, "patches/hud.asm", "incsrc hud/layout.asm\n");
    write(root, "patches/hud/layout.asm", "!rows = 2\n");
    write(root, "patches/physics.asm", "nop\n");
    write(root, "globules/math.asm", "nop\n");
    dir
}

fn record_build(root: &Path) {
    let config = Config::load(root).unwrap();
    let graph = build_graph(&config).unwrap();
    write(root, "build/hack.smc", "rom");
    let report = create_report(&config, &graph).unwrap();
    save_report(&report, &config.output_dir()).unwrap();
}

fn quick_plan(root: &Path) -> PlanOutcome {
    let config = Config::load(root).unwrap();
    let graph = build_graph(&config).unwrap();
    let previous = load_report(&config.output_dir());
    Planner::new(&config, &graph).plan(BuildKind::Quick, previous).unwrap()
}

#[test]
fn test_fresh_project_needs_full_build() {
    let dir = create_project();
    let outcome = quick_plan(dir.path());
    assert_eq!(
        outcome,
        PlanOutcome::MustRebuild("No previously built ROM found".to_string())
    );
}

#[test]
fn test_recorded_build_is_up_to_date() {
    let dir = create_project();
    record_build(dir.path());

    match quick_plan(dir.path()) {
        PlanOutcome::Plan(plan) => assert!(plan.is_up_to_date(), "unexpected steps: {:?}", plan.steps),
        other => panic!("Expected an empty plan, got {:?}", other),
    }
}

#[test]
fn test_edit_cycle() {
    let dir = create_project();
    let root = dir.path();
    record_build(root);

    // An included file changes: only its patch is reapplied
    write(root, "patches/hud/layout.asm", "!rows = 3\n");
    let PlanOutcome::Plan(plan) = quick_plan(root) else {
        panic!("Expected a plan");
    };
    assert_eq!(plan.steps, vec![Insertable::single_patch("patches/hud.asm")]);

    // Record it, then touch the triggering patch and a level
    record_build(root);
    write(root, "patches/physics.asm", "nop\nnop\n");
    write(root, "levels/105.mwl", "level 105 v2");
    let PlanOutcome::Plan(plan) = quick_plan(root) else {
        panic!("Expected a plan");
    };
    assert_eq!(
        plan.steps,
        vec![
            Insertable::Map16,
            Insertable::single_patch("patches/physics.asm"),
            Insertable::single_level("levels/105.mwl"),
        ]
    );
}

#[test]
fn test_cleared_state_forces_rebuild() {
    let dir = create_project();
    let root = dir.path();
    record_build(root);

    let output_dir = root.join("build");
    assert!(report_path(&output_dir).exists());
    clear_state(&output_dir).unwrap();
    assert_eq!(load_report(&output_dir).unwrap_err(), StaleReport::Absent);

    assert!(matches!(quick_plan(root), PlanOutcome::MustRebuild(_)));
}

#[test]
fn test_cli_build_order() {
    let dir = create_project();
    let output = Command::new(env!("CARGO_BIN_EXE_romforge"))
        .args(["--root", dir.path().to_str().unwrap(), "build-order"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let steps: Vec<&str> = stdout.lines().map(str::trim).collect();
    assert_eq!(
        steps,
        vec![
            "1. Map16",
            "2. patches/hud.asm",
            "3. patches/physics.asm",
            "4. Levels",
        ]
    );
}

#[test]
fn test_cli_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_romforge"))
        .arg("version")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Romforge v"));
}
