//! Sprite tool (PIXI) resolver

use super::{attach_root_dependencies, files_in, option_path, parse_hex, require_folder, RootDependency, ToolInvocation};
use crate::asar::AsarResolver;
use crate::resolver::{ResolveContext, ToolResolver};
use regex::Regex;
use romforge_core::{DependencyGraph, Tool, VertexId};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootKind {
    Asar,
    Binary,
    SpriteList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpriteKind {
    Normal,
    Shooter,
    Generator,
    Cluster,
    Extended,
}

impl SpriteKind {
    fn tag(self) -> &'static str {
        match self {
            SpriteKind::Normal => "normal",
            SpriteKind::Shooter => "shooter",
            SpriteKind::Generator => "generator",
            SpriteKind::Cluster => "cluster",
            SpriteKind::Extended => "extended",
        }
    }
}

const SHOOTER_RANGE: std::ops::RangeInclusive<u64> = 0xC0..=0xCF;
const GENERATOR_RANGE: std::ops::RangeInclusive<u64> = 0xD0..=0xFF;

const ASM_DIRECTORY_SOURCES: [(&str, &str); 4] = [
    ("cluster.asm", "cluster"),
    ("extended.asm", "extended"),
    ("main.asm", "main"),
    ("spritetool_clean.asm", "sprite_tool_clean"),
];

const GENERATED_FILES: [(&str, &str); 17] = [
    ("_ClusterPtr.bin", "cluster_ptr"),
    ("_BouncePtr.bin", "bounce_ptr"),
    ("_ExtendedPtr.bin", "extended_ptr"),
    ("_ExtendedCapePtr.bin", "extended_cape_ptr"),
    ("_versionflag.bin", "version_flag"),
    ("_CustomSize.bin", "custom_size"),
    ("_DefaultTables.bin", "default_tables"),
    ("_CustomStatusPtr.bin", "custom_status_ptr"),
    ("_PerLevelLvlPtrs.bin", "per_level_lvl_ptrs"),
    ("_PerLevelT.bin", "per_level_t"),
    ("_PerLevelCustomPtrTable.bin", "per_level_custom_ptr_table"),
    ("_PerLevelSprPtrs.bin", "per_level_spr_ptrs"),
    ("_cleanup.asm", "cleanup_asm"),
    ("_minorextendedptr.bin", "minor_extended_ptr"),
    ("_scoreptr.bin", "score_ptr"),
    ("_smokeptr.bin", "smoke_ptr"),
    ("_spinningcoinptr.bin", "spinning_coin_ptr"),
];

/// Folder layout, after applying command line overrides.
#[derive(Debug, Clone)]
struct Layout {
    list_file: PathBuf,
    asm: PathBuf,
    sprites: PathBuf,
    shooters: PathBuf,
    generators: PathBuf,
    extended: PathBuf,
    cluster: PathBuf,
    routines: PathBuf,
}

pub struct PixiResolver {
    exe_path: PathBuf,
    tool_dir: PathBuf,
    layout: Layout,
    asar_template: Vec<(PathBuf, &'static str)>,
    list_section: Regex,
    normal_sprite: Regex,
    per_level_sprite: Regex,
    cfg_asm_path: Regex,
}

impl PixiResolver {
    pub fn new(invocation: &ToolInvocation) -> anyhow::Result<Self> {
        let tool_dir = invocation.tool_dir();
        let layout = determine_layout(invocation, &tool_dir)?;
        let asar_template = GENERATED_FILES
            .iter()
            .map(|(name, tag)| (layout.asm.join(name), *tag))
            .collect();

        Ok(PixiResolver {
            exe_path: invocation.exe_path.clone(),
            tool_dir,
            layout,
            asar_template,
            list_section: Regex::new(r"(?i)^\s*(?P<section>sprite|extended|cluster):")?,
            normal_sprite: Regex::new(r"^\s*(?P<number>[a-fA-F0-9]+)\s+(?P<path>.*?\.(?:cfg|json|asm))")?,
            per_level_sprite: Regex::new(
                r"^\s*(?P<major>[a-fA-F0-9]+):(?P<minor>[a-fA-F0-9]+)\s+(?P<path>.*?\.(?:cfg|json|asm))",
            )?,
            cfg_asm_path: Regex::new(r"(?m)^\s*(?P<path>.*\.asm)\s*$")?,
        })
    }

    fn asar(&self) -> anyhow::Result<AsarResolver> {
        let mut asar = AsarResolver::new()?;
        for (path, tag) in &self.asar_template {
            asar.name_generated(path, *tag);
        }
        Ok(asar)
    }

    fn root_dependencies(&self) -> anyhow::Result<Vec<RootDependency<RootKind>>> {
        let layout = &self.layout;
        let mut dependencies = vec![
            RootDependency::new(&self.exe_path, "exe", RootKind::Binary),
            RootDependency::new(self.tool_dir.join("asar.dll"), "asar", RootKind::Binary),
        ];

        for (name, tag) in ASM_DIRECTORY_SOURCES {
            dependencies.push(RootDependency::new(layout.asm.join(name), tag, RootKind::Asar));
        }

        // Headers are optional per folder; the index keeps its slot either way
        let sprite_folders = [&layout.sprites, &layout.shooters, &layout.generators, &layout.extended, &layout.cluster];
        for (header_id, folder) in sprite_folders.into_iter().enumerate() {
            let header = folder.join("_header.asm");
            if header.is_file() {
                dependencies.push(RootDependency::new(header, format!("header_{}", header_id), RootKind::Asar));
            }
        }

        for routine in files_in(&layout.routines, Some("asm"), false)? {
            dependencies.push(RootDependency::named(routine, "routine", RootKind::Asar));
        }
        for define in files_in(&layout.asm.join("ExtraDefines"), Some("asm"), false)? {
            dependencies.push(RootDependency::new(define, "extra_define", RootKind::Asar));
        }
        for hijack in files_in(&layout.asm.join("ExtraHijacks"), Some("asm"), false)? {
            dependencies.push(RootDependency::new(hijack, "extra_hijack", RootKind::Asar));
        }

        dependencies.push(RootDependency::new(&layout.list_file, "list", RootKind::SpriteList));
        Ok(dependencies)
    }

    fn resolve_sprite_list(
        &self,
        graph: &mut DependencyGraph,
        list: VertexId,
        asar: &AsarResolver,
        ctx: &mut ResolveContext,
    ) -> anyhow::Result<()> {
        if !ctx.mark_seen(list) {
            return Ok(());
        }
        let contents = std::fs::read(&self.layout.list_file)?;
        let mut section = SpriteKind::Normal;

        for line in String::from_utf8_lossy(&contents).lines() {
            if line.trim().is_empty() {
                continue;
            }

            if let Some(caps) = self.normal_sprite.captures(line) {
                let Some(number) = parse_hex(&caps["number"]) else {
                    tracing::warn!("Sprite number out of range in PIXI list: '{}'", line);
                    continue;
                };
                let kind = match section {
                    SpriteKind::Normal if SHOOTER_RANGE.contains(&number) => SpriteKind::Shooter,
                    SpriteKind::Normal if GENERATOR_RANGE.contains(&number) => SpriteKind::Generator,
                    other => other,
                };
                self.resolve_sprite(graph, list, &caps["path"], &number.to_string(), kind, asar, ctx)?;
                continue;
            }

            if let Some(caps) = self.list_section.captures(line) {
                section = match caps["section"].to_ascii_lowercase().as_str() {
                    "extended" => SpriteKind::Extended,
                    "cluster" => SpriteKind::Cluster,
                    _ => SpriteKind::Normal,
                };
                continue;
            }

            if let Some(caps) = self.per_level_sprite.captures(line) {
                let (Some(major), Some(minor)) = (parse_hex(&caps["major"]), parse_hex(&caps["minor"])) else {
                    tracing::warn!("Sprite number out of range in PIXI list: '{}'", line);
                    continue;
                };
                let number = format!("{}:{}", major, minor);
                self.resolve_sprite(graph, list, &caps["path"], &number, section, asar, ctx)?;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_sprite(
        &self,
        graph: &mut DependencyGraph,
        list: VertexId,
        relative_path: &str,
        number: &str,
        kind: SpriteKind,
        asar: &AsarResolver,
        ctx: &mut ResolveContext,
    ) -> anyhow::Result<()> {
        let folder = match kind {
            SpriteKind::Normal => &self.layout.sprites,
            SpriteKind::Shooter => &self.layout.shooters,
            SpriteKind::Generator => &self.layout.generators,
            SpriteKind::Cluster => &self.layout.cluster,
            SpriteKind::Extended => &self.layout.extended,
        };
        let extension = Path::new(relative_path)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let tag = format!("{}_{}_sprite_{}", kind.tag(), extension, number);
        let sprite = graph.get_or_create(&option_path(folder, relative_path))?;
        graph.add_edge(list, sprite, tag);

        if !graph[sprite].is_hashed() {
            return Ok(());
        }
        match extension.as_str() {
            "cfg" => self.resolve_config(graph, sprite, ConfigFormat::Cfg, asar, ctx),
            "json" => self.resolve_config(graph, sprite, ConfigFormat::Json, asar, ctx),
            // Cluster and extended sprites are listed by their code directly
            _ => asar.resolve(graph, sprite, ctx),
        }
    }

    /// Follow a sprite configuration file to the code file it names.
    fn resolve_config(
        &self,
        graph: &mut DependencyGraph,
        config: VertexId,
        format: ConfigFormat,
        asar: &AsarResolver,
        ctx: &mut ResolveContext,
    ) -> anyhow::Result<()> {
        if !ctx.mark_seen(config) {
            return Ok(());
        }
        let Some(config_path) = graph[config].file().map(|f| f.path.clone()) else {
            return Ok(());
        };
        let contents = String::from_utf8_lossy(&std::fs::read(&config_path)?).into_owned();

        let asm_file = match format {
            ConfigFormat::Cfg => self
                .cfg_asm_path
                .captures(&contents)
                .map(|caps| caps["path"].trim().to_string()),
            ConfigFormat::Json => serde_json::from_str::<serde_json::Value>(&contents)
                .ok()
                .and_then(|doc| doc.get("AsmFile").and_then(|v| v.as_str()).map(str::to_string)),
        }
        .unwrap_or_default();
        if asm_file.is_empty() {
            tracing::warn!("No code file named in sprite configuration {}", config_path.display());
        }

        let base = config_path.parent().unwrap_or_else(|| Path::new(""));
        let asm = graph.get_or_create(&option_path(base, &asm_file))?;
        graph.try_add_unique_edge(config, asm, "asm_file", false);

        if graph[asm].is_hashed() {
            asar.resolve(graph, asm, ctx)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ConfigFormat {
    Cfg,
    Json,
}

impl ToolResolver for PixiResolver {
    fn tool(&self) -> Tool {
        Tool::Pixi
    }

    fn resolve(&self, graph: &mut DependencyGraph, root: VertexId) -> anyhow::Result<()> {
        let asar = self.asar()?;
        let mut ctx = ResolveContext::new();
        let dependencies = self.root_dependencies()?;

        attach_root_dependencies(graph, root, &dependencies, |graph, vertex, kind| match kind {
            RootKind::Asar => asar.resolve(graph, vertex, &mut ctx),
            RootKind::Binary => Ok(()),
            RootKind::SpriteList => self.resolve_sprite_list(graph, vertex, &asar, &mut ctx),
        })?;

        if !self.layout.list_file.is_file() {
            tracing::warn!("Missing PIXI list file {}", self.layout.list_file.display());
        }
        require_folder(graph, root, &self.layout.routines, "routine_folder");

        tracing::debug!("Resolved {} dependencies", Tool::Pixi);
        Ok(())
    }
}

/// Apply `-l`, `-a`, `-sp`, `-sh`, `-g`, `-e`, `-c` and `-r` overrides; the last one wins.
fn determine_layout(invocation: &ToolInvocation, tool_dir: &Path) -> anyhow::Result<Layout> {
    let rom_dir = invocation
        .output_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    // PIXI looks for the list next to the ROM unless told otherwise
    let mut layout = Layout {
        list_file: rom_dir.join("list.txt"),
        asm: tool_dir.join("asm"),
        sprites: tool_dir.join("sprites"),
        shooters: tool_dir.join("shooters"),
        generators: tool_dir.join("generators"),
        extended: tool_dir.join("extended"),
        cluster: tool_dir.join("cluster"),
        routines: tool_dir.join("routines"),
    };

    let passed_directories =
        Regex::new(r#"-(?P<kind>l|a|sp|sh|g|e|c|r)\s+(?:"(?P<quoted>[^"]*)"|(?P<bare>[^\s"]+))"#)?;
    for caps in passed_directories.captures_iter(&invocation.options) {
        let Some(literal) = caps.name("quoted").or_else(|| caps.name("bare")) else {
            continue;
        };
        let literal = literal.as_str();
        match &caps["kind"] {
            "l" => layout.list_file = option_path(&rom_dir, literal),
            "a" => layout.asm = option_path(tool_dir, literal),
            "sp" => layout.sprites = option_path(tool_dir, literal),
            "sh" => layout.shooters = option_path(tool_dir, literal),
            "g" => layout.generators = option_path(tool_dir, literal),
            "e" => layout.extended = option_path(tool_dir, literal),
            "c" => layout.cluster = option_path(tool_dir, literal),
            "r" => layout.routines = option_path(tool_dir, literal),
            _ => {}
        }
    }
    Ok(layout)
}
