//! Unit tests for romforge-core module

use crate::test_utils::{create_tree, write_file};
use crate::*;
use std::collections::BTreeMap;
use std::path::Path;

/// Build a small GPS-style graph: root -> list -> two blocks, plus a generated output.
fn build_block_graph(root: &Path) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    let tool = graph.tool_root_or_create(Tool::Gps);
    let list = graph.get_or_create(&root.join("list.txt")).unwrap();
    let coin = graph.get_or_create(&root.join("blocks/coin.asm")).unwrap();
    let spike = graph.get_or_create(&root.join("blocks/spike.asm")).unwrap();
    let banks = graph.get_or_create_generated(&root.join("__banks.bin"));
    let table = graph.get_or_create(&root.join("blocks/table.bin")).unwrap();

    graph.add_edge(tool, list, "list");
    graph.add_edge(tool, banks, "banks");
    graph.add_edge(list, coin, "block_200");
    graph.add_edge(list, spike, "block_201");
    graph.add_edge(coin, table, "binary_0");
    graph
}

fn block_files() -> Vec<(&'static str, &'static str)> {
    vec![
        ("list.txt", "200 blocks/coin.asm\n201 blocks/spike.asm\n"),
        ("blocks/coin.asm", "incbin table.bin\n"),
        ("blocks/spike.asm", "db $42\n"),
        ("blocks/table.bin", "\x01\x02"),
    ]
}

fn records_of(graph: &DependencyGraph) -> SerializedGraph {
    SerializedGraph::new(serialize(graph)).unwrap()
}

// ── Path identity ───────────────────────────────────────────

#[test]
fn test_canonical_path_collapses_spellings() {
    let a = CanonicalPath::new(Path::new("/proj/asm/./sub/../Main.ASM"));
    let b = CanonicalPath::new(Path::new("/proj/asm/main.asm"));
    assert_eq!(a, b, "Dot segments and case should not affect identity");
    assert_eq!(b.as_str(), "/proj/asm/main.asm");
}

#[test]
fn test_normalize_relative() {
    assert_eq!(paths::normalize_relative("  Patches\\Fix.asm/ "), "patches/fix.asm");
    assert!(paths::is_rooted_literal("C:\\hacks\\x.asm"));
    assert!(paths::is_rooted_literal("/abs/x.asm"));
    assert!(!paths::is_rooted_literal("rel/x.asm"));
}

// ── Digests ─────────────────────────────────────────────────

#[test]
fn test_digest_is_lowercase_md5() {
    assert_eq!(Digest::of_bytes(b"hello").as_str(), "5d41402abc4b2a76b9719d911017c592");
}

#[test]
fn test_hash_folder_tracks_names_and_content() {
    let dir = create_tree(&[("gfx/GFX00.bin", "abc"), ("gfx/sub/GFX01.bin", "def")]);
    let folder = dir.path().join("gfx");
    let first = hash_folder(Some(&folder)).unwrap();
    assert!(first.is_some());

    std::fs::rename(folder.join("GFX00.bin"), folder.join("GFX02.bin")).unwrap();
    let renamed = hash_folder(Some(&folder)).unwrap();
    assert_ne!(first, renamed, "Renaming a file should change the folder digest");

    assert_eq!(hash_folder(Some(&dir.path().join("nope"))).unwrap(), None);
    assert_eq!(hash_folder(None).unwrap(), None);
}

#[test]
fn test_hash_list_is_order_sensitive() {
    assert_ne!(hash_list(["Pixi", "Gps"]), hash_list(["Gps", "Pixi"]));
    assert_eq!(hash_list(["Pixi", "Gps"]), hash_list(vec!["Pixi".to_string(), "Gps".to_string()]));
}

// ── Graph ───────────────────────────────────────────────────

#[test]
fn test_get_or_create_dedupes_by_canonical_path() {
    let dir = create_tree(&[("asm/main.asm", "nop\n")]);
    let mut graph = DependencyGraph::new();

    let a = graph.get_or_create(&dir.path().join("asm/main.asm")).unwrap();
    let b = graph.get_or_create(&dir.path().join("asm/../asm/./main.asm")).unwrap();
    assert_eq!(a, b, "Same file should map to one vertex");
    assert_eq!(graph.vertex_count(), 1);
    assert_eq!(graph[a].kind(), VertexKind::HashedFile);
    assert_eq!(graph[a].digest(), Some(&Digest::of_bytes(b"nop\n")));
}

#[test]
fn test_absent_file_becomes_missing_vertex() {
    let dir = create_tree(&[]);
    let mut graph = DependencyGraph::new();
    let id = graph.get_or_create(&dir.path().join("ghost.asm")).unwrap();
    assert_eq!(graph[id].kind(), VertexKind::Missing);
    assert_eq!(graph[id].digest(), None);

    let again = graph.get_or_create(&dir.path().join("ghost.asm")).unwrap();
    assert_eq!(id, again);
}

#[test]
fn test_generated_and_arbitrary_vertices() {
    let dir = create_tree(&[]);
    let mut graph = DependencyGraph::new();
    let generated = graph.get_or_create_generated(&dir.path().join("_versionflag.bin"));
    assert_eq!(graph[generated].kind(), VertexKind::Generated);

    let first = graph.create_arbitrary();
    let second = graph.create_arbitrary();
    assert_ne!(first, second, "Arbitrary markers are never shared");
}

#[test]
fn test_try_add_unique_edge() {
    let dir = create_tree(&[("a.asm", "a"), ("b.asm", "b")]);
    let mut graph = DependencyGraph::new();
    let a = graph.get_or_create(&dir.path().join("a.asm")).unwrap();
    let b = graph.get_or_create(&dir.path().join("b.asm")).unwrap();

    assert!(graph.try_add_unique_edge(a, b, "asar_dll", false));
    assert!(!graph.try_add_unique_edge(a, b, "other", false));
    assert!(graph.try_add_unique_edge(a, b, "sample_1", true));
    assert!(!graph.try_add_unique_edge(a, b, "sample_1", true));
    assert_eq!(graph.edge_count(), 2);

    graph.add_edge(a, b, "asar_dll");
    assert_eq!(graph.edge_count(), 3, "add_edge always inserts");
}

#[test]
fn test_patch_root_registration() {
    let dir = create_tree(&[("patches/fix.asm", "org $008000\n")]);
    let mut graph = DependencyGraph::new();
    let found = graph
        .add_patch_root(&dir.path().join("patches/fix.asm"), "Patches\\Fix.asm")
        .unwrap();
    let missing = graph
        .add_patch_root(&dir.path().join("patches/gone.asm"), "patches/gone.asm")
        .unwrap();

    assert_eq!(graph.patch_roots(), &[found, missing]);
    match &graph[found] {
        Vertex::PatchRoot { relative_path, .. } => assert_eq!(relative_path, "patches/fix.asm"),
        other => panic!("Expected patch root, got {:?}", other),
    }
    assert_eq!(graph[missing].kind(), VertexKind::Missing);
}

#[test]
fn test_module_insertion_order_and_cycles() {
    let dir = create_tree(&[("m/a.asm", "a"), ("m/b.asm", "b"), ("m/c.asm", "c")]);
    let mut graph = DependencyGraph::new();
    let a = graph.add_module_root(&dir.path().join("m/a.asm")).unwrap();
    let b = graph.add_module_root(&dir.path().join("m/b.asm")).unwrap();
    let c = graph.add_module_root(&dir.path().join("m/c.asm")).unwrap();
    graph.add_edge(a, b, "import_0");
    graph.add_edge(b, c, "import_0");

    let order = graph.module_insertion_order().unwrap();
    let pos = |id| order.iter().position(|&x| x == id).unwrap();
    assert!(pos(c) < pos(b) && pos(b) < pos(a), "Imports must come first: {:?}", order);

    graph.add_edge(c, a, "import_0");
    let err = graph.module_insertion_order().unwrap_err();
    assert!(matches!(err, GraphError::CyclicImports { .. }));
}

#[test]
fn test_unresolved_dependencies_lists_dependents() {
    let dir = create_tree(&[("main.asm", "incsrc gone.asm\n")]);
    let mut graph = DependencyGraph::new();
    let main = graph.get_or_create(&dir.path().join("main.asm")).unwrap();
    let gone = graph.get_or_create(&dir.path().join("gone.asm")).unwrap();
    let arbitrary = graph.create_arbitrary();
    graph.add_edge(main, gone, "source_0");
    graph.add_edge(main, arbitrary, "arbitrary_source_1");

    let unresolved = graph.unresolved_dependencies();
    assert_eq!(unresolved, vec![(gone, vec![main]), (arbitrary, vec![main])]);
}

// ── Serializer ──────────────────────────────────────────────

#[test]
fn test_serialized_record_format() {
    let dir = create_tree(&[("list.txt", "x")]);
    let mut graph = DependencyGraph::new();
    let tool = graph.tool_root_or_create(Tool::Gps);
    let list = graph.get_or_create(&dir.path().join("list.txt")).unwrap();
    let banks = graph.get_or_create_generated(&dir.path().join("__banks.bin"));
    graph.add_edge(tool, list, "list");
    graph.add_edge(tool, banks, "banks");

    let json = serde_json::to_string_pretty(&serialize(&graph)).unwrap();
    insta::assert_snapshot!(json, @r###"
    [
      {
        "type": "hash",
        "hash": "9dd4e461268c8034f5c8564e155c67a6",
        "dependencies": []
      },
      {
        "type": "tool_root",
        "tool": "gps",
        "dependencies": [
          {
            "tag": "list",
            "idx": 0
          },
          {
            "tag": "banks",
            "idx": -3
          }
        ]
      }
    ]
    "###);
}

#[test]
fn test_serialize_skips_content_free_vertices() {
    let dir = create_tree(&block_files());
    let graph = build_block_graph(dir.path());
    let records = serialize(&graph);

    // 5 content-bearing vertices: tool root, list, two blocks, table
    assert_eq!(records.len(), 5);
    let edges: usize = records.iter().map(|r| r.dependencies.len()).sum();
    assert_eq!(edges, graph.edge_count(), "Every edge is written exactly once");
    assert!(records[0].dependencies.is_empty(), "A sink is written first");
    let tool = records
        .iter()
        .find(|r| r.kind == RecordKind::ToolRoot { tool: Tool::Gps })
        .unwrap();
    assert!(tool.dependencies.iter().any(|d| d.tag == "banks" && d.idx == serializer::GENERATED_INDEX));
}

#[test]
fn test_serialize_round_trip_preserves_structure() {
    let dir = create_tree(&block_files());
    let graph = build_block_graph(dir.path());

    let json = serde_json::to_string(&serialize(&graph)).unwrap();
    let records: Vec<Record> = serde_json::from_str(&json).unwrap();
    let loaded = SerializedGraph::new(records).unwrap();

    // Every live edge appears as (source digest, tag, target digest) exactly once.
    let mut live: Vec<(Option<String>, String, Option<String>)> = Vec::new();
    for id in graph.vertex_ids() {
        for edge in graph.edges_from(id) {
            live.push((
                graph[edge.source].digest().map(|d| d.to_string()),
                edge.tag.clone(),
                graph[edge.target].digest().map(|d| d.to_string()),
            ));
        }
    }
    let mut stored: Vec<(Option<String>, String, Option<String>)> = Vec::new();
    for record in loaded.records() {
        for dependency in &record.dependencies {
            let target = match loaded.target(dependency) {
                RecordTarget::Record(idx) => loaded.get(idx).and_then(|r| r.digest()).map(|d| d.to_string()),
                _ => None,
            };
            stored.push((record.digest().map(|d| d.to_string()), dependency.tag.clone(), target));
        }
    }
    live.sort();
    stored.sort();
    assert_eq!(live, stored);
}

#[test]
fn test_serialize_keeps_edges_on_cycles() {
    let dir = create_tree(&[("a.asm", "incsrc b.asm\n"), ("b.asm", "incsrc a.asm\n")]);
    let mut graph = DependencyGraph::new();
    let a = graph.get_or_create(&dir.path().join("a.asm")).unwrap();
    let b = graph.get_or_create(&dir.path().join("b.asm")).unwrap();
    graph.add_edge(a, b, "source_0");
    graph.add_edge(b, a, "source_0");

    let records = serialize(&graph);
    assert_eq!(records.len(), 2);
    let edges: usize = records.iter().map(|r| r.dependencies.len()).sum();
    assert_eq!(edges, 2, "Cycle-only vertices should still be written");
}

#[test]
fn test_serialized_graph_rejects_dangling_index() {
    let records = vec![Record {
        kind: RecordKind::ToolRoot { tool: Tool::Pixi },
        dependencies: vec![RecordDependency { tag: "list".to_string(), idx: 7 }],
    }];
    let err = SerializedGraph::new(records).unwrap_err();
    assert_eq!(err, RecordError::DanglingIndex { record: 0, idx: 7, len: 1 });
}

// ── Analyzer ────────────────────────────────────────────────

#[test]
fn test_unchanged_state_is_identical() {
    let dir = create_tree(&block_files());
    let old = records_of(&build_block_graph(dir.path()));
    let graph = build_block_graph(dir.path());

    let analysis = GraphAnalyzer::new(&graph, &old).analyze_tool(Tool::Gps);
    assert_eq!(analysis.verdict, Verdict::Identical);
    assert_eq!(analysis.offending(), None);
}

#[test]
fn test_modified_leaf_is_reported_at_leaf() {
    let dir = create_tree(&block_files());
    let old = records_of(&build_block_graph(dir.path()));

    write_file(dir.path(), "blocks/table.bin", "\x01\x03");
    let graph = build_block_graph(dir.path());
    let analysis = GraphAnalyzer::new(&graph, &old).analyze_tool(Tool::Gps);

    assert_eq!(analysis.verdict, Verdict::ModifiedFile);
    let table = graph.find(&dir.path().join("blocks/table.bin")).unwrap();
    assert_eq!(analysis.offending(), Some(table), "Should name the leaf, not an ancestor");
    assert_eq!(
        describe_chain(&graph, &analysis.chain, dir.path()),
        "GPS -> list.txt -> blocks/coin.asm -> blocks/table.bin"
    );
}

#[test]
fn test_added_and_removed_slots_modify_dependencies() {
    let dir = create_tree(&block_files());
    let old = records_of(&build_block_graph(dir.path()));

    // Added slot
    write_file(dir.path(), "list.txt", "200 blocks/coin.asm\n201 blocks/spike.asm\n2A blocks/spike.asm\n");
    let mut graph = build_block_graph(dir.path());
    let list = graph.find(&dir.path().join("list.txt")).unwrap();
    let spike = graph.find(&dir.path().join("blocks/spike.asm")).unwrap();
    graph.add_edge(list, spike, "block_2A");
    let analysis = GraphAnalyzer::new(&graph, &old).analyze_tool(Tool::Gps);
    assert_eq!(analysis.verdict, Verdict::ModifiedDependencies);
    assert_eq!(analysis.offending(), Some(list));

    // Removed slot
    write_file(dir.path(), "list.txt", "200 blocks/coin.asm\n");
    let mut graph = DependencyGraph::new();
    let tool = graph.tool_root_or_create(Tool::Gps);
    let list = graph.get_or_create(&dir.path().join("list.txt")).unwrap();
    let coin = graph.get_or_create(&dir.path().join("blocks/coin.asm")).unwrap();
    let banks = graph.get_or_create_generated(&dir.path().join("__banks.bin"));
    let table = graph.get_or_create(&dir.path().join("blocks/table.bin")).unwrap();
    graph.add_edge(tool, list, "list");
    graph.add_edge(tool, banks, "banks");
    graph.add_edge(list, coin, "block_200");
    graph.add_edge(coin, table, "binary_0");
    let analysis = GraphAnalyzer::new(&graph, &old).analyze_tool(Tool::Gps);
    assert_eq!(analysis.verdict, Verdict::ModifiedDependencies);
    assert_eq!(analysis.offending(), Some(list));
}

#[test]
fn test_missing_and_arbitrary_dependencies() {
    let dir = create_tree(&block_files());
    let old = records_of(&build_block_graph(dir.path()));

    std::fs::remove_file(dir.path().join("blocks/table.bin")).unwrap();
    let graph = build_block_graph(dir.path());
    let analysis = GraphAnalyzer::new(&graph, &old).analyze_tool(Tool::Gps);
    assert_eq!(analysis.verdict, Verdict::Missing);
    assert_eq!(graph[analysis.offending().unwrap()].kind(), VertexKind::Missing);

    // An arbitrary include poisons the subtree even when the records agree
    let mut graph = DependencyGraph::new();
    let tool = graph.tool_root_or_create(Tool::Gps);
    let marker = graph.create_arbitrary();
    graph.add_edge(tool, marker, "arbitrary_source_0");
    let old = records_of(&graph);
    let analysis = GraphAnalyzer::new(&graph, &old).analyze_tool(Tool::Gps);
    assert_eq!(analysis.verdict, Verdict::Arbitrary);
    assert_eq!(analysis.offending(), Some(marker));
}

#[test]
fn test_tool_root_presence_verdicts() {
    let empty = SerializedGraph::default();
    let mut graph = DependencyGraph::new();
    let root = graph.tool_root_or_create(Tool::Pixi);

    let analyzer = GraphAnalyzer::new(&graph, &empty);
    assert_eq!(analyzer.analyze_tool(Tool::Pixi).verdict, Verdict::NewRoot);
    assert_eq!(analyzer.analyze_tool(Tool::Pixi).offending(), Some(root));
    assert_eq!(analyzer.analyze_tool(Tool::UberAsm).verdict, Verdict::NoRoots);

    let old = records_of(&graph);
    let fresh = DependencyGraph::new();
    assert_eq!(
        GraphAnalyzer::new(&fresh, &old).analyze_tool(Tool::Pixi).verdict,
        Verdict::OldRoot
    );
}

#[test]
fn test_diamond_is_visited_once() {
    let dir = create_tree(&[("a.asm", "a"), ("b.asm", "b"), ("shared.asm", "s")]);
    let build = |root: &Path| {
        let mut graph = DependencyGraph::new();
        let tool = graph.tool_root_or_create(Tool::UberAsm);
        let a = graph.get_or_create(&root.join("a.asm")).unwrap();
        let b = graph.get_or_create(&root.join("b.asm")).unwrap();
        let shared = graph.get_or_create(&root.join("shared.asm")).unwrap();
        graph.add_edge(tool, a, "level_1");
        graph.add_edge(tool, b, "level_2");
        graph.add_edge(a, shared, "source_0");
        graph.add_edge(b, shared, "source_0");
        graph
    };
    let old = records_of(&build(dir.path()));
    let graph = build(dir.path());
    assert!(GraphAnalyzer::new(&graph, &old).analyze_tool(Tool::UberAsm).is_identical());
}

#[test]
fn test_patch_matching() {
    let dir = create_tree(&[("a.asm", "a"), ("b.asm", "b")]);
    let mut graph = DependencyGraph::new();
    graph.add_patch_root(&dir.path().join("a.asm"), "a.asm").unwrap();
    graph.add_patch_root(&dir.path().join("b.asm"), "b.asm").unwrap();
    let old = records_of(&graph);

    // Same patches, one edited
    write_file(dir.path(), "b.asm", "b2");
    let mut graph = DependencyGraph::new();
    graph.add_patch_root(&dir.path().join("a.asm"), "a.asm").unwrap();
    let b = graph.add_patch_root(&dir.path().join("b.asm"), "b.asm").unwrap();
    match GraphAnalyzer::new(&graph, &old).analyze_patches() {
        RootComparison::Compared(results) => {
            let changed: Vec<_> = results.iter().filter(|(_, a)| !a.is_identical()).collect();
            assert_eq!(changed.len(), 1);
            assert_eq!(changed[0].0, b);
            assert_eq!(changed[0].1.verdict, Verdict::ModifiedFile);
        }
        other => panic!("Expected comparison, got {:?}", other),
    }

    // A patch dropped from the configuration
    let mut graph = DependencyGraph::new();
    graph.add_patch_root(&dir.path().join("a.asm"), "a.asm").unwrap();
    assert!(matches!(
        GraphAnalyzer::new(&graph, &old).analyze_patches(),
        RootComparison::Removed { .. }
    ));
}

#[test]
fn test_new_patch_is_new_root() {
    let dir = create_tree(&[("a.asm", "a"), ("c.asm", "c")]);
    let mut graph = DependencyGraph::new();
    graph.add_patch_root(&dir.path().join("a.asm"), "a.asm").unwrap();
    let old = records_of(&graph);

    let c = graph.add_patch_root(&dir.path().join("c.asm"), "c.asm").unwrap();
    match GraphAnalyzer::new(&graph, &old).analyze_patches() {
        RootComparison::Compared(results) => {
            let verdicts: BTreeMap<u64, Verdict> = results.iter().map(|(id, a)| (id.0, a.verdict)).collect();
            assert_eq!(verdicts.get(&c.0), Some(&Verdict::NewRoot));
            assert_eq!(verdicts.values().filter(|v| **v == Verdict::Identical).count(), 1);
        }
        other => panic!("Expected comparison, got {:?}", other),
    }
}

#[test]
fn test_module_name_change_is_removal() {
    let dir = create_tree(&[("m/util.asm", "u")]);
    let mut graph = DependencyGraph::new();
    graph.add_module_root(&dir.path().join("m/util.asm")).unwrap();
    let old = records_of(&graph);

    std::fs::rename(dir.path().join("m/util.asm"), dir.path().join("m/tools.asm")).unwrap();
    let mut graph = DependencyGraph::new();
    graph.add_module_root(&dir.path().join("m/tools.asm")).unwrap();
    assert!(matches!(
        GraphAnalyzer::new(&graph, &old).analyze_modules(),
        RootComparison::Removed { .. }
    ));
}

// ── Report persistence ──────────────────────────────────────

#[test]
fn test_report_round_trip() {
    let dir = create_tree(&block_files());
    let graph = build_block_graph(dir.path());

    let mut report = Report::new();
    report.dependency_graph = serialize(&graph);
    report.gps_options = Some("-l list.txt".to_string());
    save_report(&report, dir.path()).unwrap();

    let loaded = load_report(dir.path()).unwrap();
    assert_eq!(loaded, report);
}

#[test]
fn test_unusable_reports_are_stale_not_errors() {
    let dir = create_tree(&[]);
    assert_eq!(load_report(dir.path()), Err(StaleReport::Absent));

    write_file(dir.path(), ".romforge/build_report.json", "{ not json");
    assert!(matches!(load_report(dir.path()), Err(StaleReport::Corrupt(_))));

    write_file(dir.path(), ".romforge/build_report.json", r#"{"report_format_version": 1}"#);
    assert_eq!(
        load_report(dir.path()),
        Err(StaleReport::IncompatibleVersion { found: 1, expected: REPORT_FORMAT_VERSION })
    );

    clear_state(dir.path()).unwrap();
    assert!(!state_dir(dir.path()).exists());
}
