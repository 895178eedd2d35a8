//! Project configuration
//!
//! A project is configured by every `config*.txt` file in its folder, read in
//! file-name order and merged. Each file holds `key = value` assignments and
//! lists:
//!
//! ```text
//! -- comment
//! output = build/hack.smc
//! build_order
//! [
//!     Graphics
//!     Patches
//! ]
//! ```

use crate::error::ConfigError;
use crate::insertable::Insertable;
use crate::triggers::TriggerGraph;
use anyhow::Context;
use romforge_core::paths::{from_literal, is_rooted_literal, normalize_relative};
use romforge_core::Tool;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

const CONFIG_PREFIX: &str = "config";
const CONFIG_EXTENSION: &str = "txt";
const COMMENT: &str = "--";
const TRIGGER_ARROW: &str = " -> ";

const BUILD_ORDER_LIST: &str = "build_order";
const TRIGGER_LIST: &str = "quick_build_triggers";
const PATCH_LIST: &str = "patches";

/// Where and how an external tool is run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolSettings {
    pub path: Option<String>,
    pub options: Option<String>,
}

/// Config keys naming a tool's executable and its option string.
fn tool_keys(tool: Tool) -> (&'static str, &'static str) {
    match tool {
        Tool::Pixi => ("pixi_path", "pixi_options"),
        Tool::Gps => ("gps_path", "gps_options"),
        Tool::AddMusicK => ("addmusick_path", "addmusick_options"),
        Tool::UberAsm => ("uberasm_path", "uberasm_options"),
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Folder the configuration files were read from.
    pub root: PathBuf,
    /// `dir`: folder every other path is relative to, itself relative to `root`.
    pub working_dir: Option<String>,
    pub output: Option<String>,
    pub temp: Option<String>,
    pub clean: Option<String>,
    pub initial_patch: Option<String>,
    pub levels: Option<String>,
    pub map16: Option<String>,
    pub shared_palette: Option<String>,
    pub global_data: Option<String>,
    pub title_moves: Option<String>,
    pub human_readable_map16_cli: Option<String>,
    pub human_readable_map16_dir: Option<String>,
    pub globules: Option<String>,
    pub asar: Option<String>,
    /// Command line options passed to the assembler for patches and modules.
    pub asar_options: Option<String>,
    pub lm_level_import_flags: Option<String>,
    pub tools: BTreeMap<Tool, ToolSettings>,
    /// Normalized relative patch paths, in declaration order.
    pub patches: Vec<String>,
    pub build_order: Option<Vec<Insertable>>,
    pub quick_build_triggers: Vec<(Insertable, Insertable)>,
    triggers: TriggerGraph,
}

impl Config {
    /// Read, merge and verify every configuration file in `root`.
    pub fn load(root: &Path) -> anyhow::Result<Config> {
        let mut files = Vec::new();
        let entries = std::fs::read_dir(root)
            .with_context(|| format!("Failed to read project folder '{}'", root.display()))?;
        for entry in entries {
            let path = entry?.path();
            if is_config_file(&path) {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(ConfigError::NoConfigFiles(root.display().to_string()).into());
        }

        let mut sources = Vec::with_capacity(files.len());
        for file in &files {
            let source = std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read config file '{}'", file.display()))?;
            tracing::debug!("Read config file {}", file.display());
            sources.push(source);
        }

        let mut config = Config::parse(root, &sources)?;
        config.verify()?;

        tracing::info!("Loaded configuration from {} file(s)", files.len());
        Ok(config)
    }

    /// Parse and merge configuration sources without verifying them.
    pub fn parse<S: AsRef<str>>(root: &Path, sources: &[S]) -> Result<Config, ConfigError> {
        let mut raw = RawConfig::default();
        for source in sources {
            raw.parse(source.as_ref())?;
        }

        let mut tools = BTreeMap::new();
        for tool in Tool::ALL {
            let (path_key, options_key) = tool_keys(tool);
            tools.insert(
                tool,
                ToolSettings {
                    path: raw.var(path_key),
                    options: raw.var(options_key),
                },
            );
        }

        Ok(Config {
            root: root.to_path_buf(),
            working_dir: raw.var("dir"),
            output: raw.var("output"),
            temp: raw.var("temp"),
            clean: raw.var("clean"),
            initial_patch: raw.var("initial_patch"),
            levels: raw.var("levels"),
            map16: raw.var("map16"),
            shared_palette: raw.var("shared_palette"),
            global_data: raw.var("global_data"),
            title_moves: raw.var("title_moves"),
            human_readable_map16_cli: raw.var("human_readable_map16_cli_path"),
            human_readable_map16_dir: raw.var("human_readable_map16_directory_path"),
            globules: raw.var("globules_path"),
            asar: raw.var("asar_path"),
            asar_options: raw.var("asar_options"),
            lm_level_import_flags: raw.var("lm_level_import_flags"),
            tools,
            patches: raw.patches,
            build_order: (!raw.build_order.is_empty()).then_some(raw.build_order),
            quick_build_triggers: raw.triggers,
            triggers: TriggerGraph::new(),
        })
    }

    /// Check the configuration is consistent, and build the trigger graph.
    pub fn verify(&mut self) -> Result<(), ConfigError> {
        let Some(build_order) = self.build_order.as_ref() else {
            return Err(ConfigError::MissingBuildOrder);
        };

        let has_patches = build_order.contains(&Insertable::Patches);
        let all_named = self
            .patches
            .iter()
            .all(|patch| build_order.contains(&Insertable::SinglePatch(patch.clone())));
        if !self.patches.is_empty() && !has_patches && !all_named {
            return Err(ConfigError::UncoveredPatches);
        }

        for item in build_order {
            self.verify_insertable(item)?;
        }

        for (trigger, triggered) in &self.quick_build_triggers {
            for endpoint in [trigger, triggered] {
                let covered = build_order.contains(endpoint)
                    || (matches!(endpoint, Insertable::SinglePatch(_)) && has_patches);
                if !covered {
                    return Err(ConfigError::TriggerNotInBuildOrder);
                }
            }
        }

        let triggers = TriggerGraph::from_pairs(&self.quick_build_triggers)?;

        for (trigger, triggered) in &self.quick_build_triggers {
            self.verify_insertable(trigger)?;
            self.verify_insertable(triggered)?;
        }

        tracing::debug!(
            "Verified build order of {} steps with {} quick build triggers",
            build_order.len(),
            triggers.edge_count()
        );
        self.triggers = triggers;
        Ok(())
    }

    fn verify_insertable(&self, item: &Insertable) -> Result<(), ConfigError> {
        match item {
            Insertable::Pixi | Insertable::Gps | Insertable::AddMusicK | Insertable::UberAsm => {
                let Some(tool) = item.tool() else {
                    return Ok(());
                };
                let (path_key, _) = tool_keys(tool);
                match self.tool_settings(tool).and_then(|s| s.path.as_deref()) {
                    None => self.require(None, path_key, item),
                    Some(path) if !self.resolve(path).is_file() => Err(ConfigError::ToolNotFound {
                        tool: tool.display_name(),
                        path: path.to_string(),
                    }),
                    Some(_) => Ok(()),
                }
            }
            Insertable::Map16 => {
                self.require(self.map16.as_deref(), "map16", item)?;
                match &self.human_readable_map16_cli {
                    Some(cli) if !self.resolve(cli).is_file() => Err(ConfigError::Map16CliNotFound(cli.clone())),
                    _ => Ok(()),
                }
            }
            Insertable::TitleMoves => self.require(self.title_moves.as_deref(), "title_moves", item),
            Insertable::SharedPalettes => self.require(self.shared_palette.as_deref(), "shared_palette", item),
            Insertable::GlobalData => self.require(self.global_data.as_deref(), "global_data", item),
            Insertable::Levels | Insertable::SingleLevel(_) => self.require(self.levels.as_deref(), "levels", item),
            Insertable::SinglePatch(path) => {
                if self.patches.contains(path) {
                    Ok(())
                } else {
                    Err(ConfigError::PatchNotFound(path.clone()))
                }
            }
            Insertable::Graphics | Insertable::ExGraphics | Insertable::Patches => Ok(()),
        }
    }

    fn require(&self, value: Option<&str>, variable: &'static str, item: &Insertable) -> Result<(), ConfigError> {
        if value.is_some() {
            return Ok(());
        }
        let list = if self.build_order().contains(item) {
            BUILD_ORDER_LIST
        } else {
            TRIGGER_LIST
        };
        Err(ConfigError::Unconfigured {
            variable,
            kind: item.kind_name(),
            list,
        })
    }

    // ── Accessors ───────────────────────────────────────────

    pub fn build_order(&self) -> &[Insertable] {
        self.build_order.as_deref().unwrap_or_default()
    }

    pub fn triggers(&self) -> &TriggerGraph {
        &self.triggers
    }

    /// Whether the build order names `item` directly.
    pub fn uses(&self, item: &Insertable) -> bool {
        self.build_order().contains(item)
    }

    pub fn tool_settings(&self, tool: Tool) -> Option<&ToolSettings> {
        self.tools.get(&tool)
    }

    pub fn tool_options(&self, tool: Tool) -> Option<&str> {
        self.tool_settings(tool).and_then(|s| s.options.as_deref())
    }

    pub fn tool_path(&self, tool: Tool) -> Option<PathBuf> {
        self.resolve_var(self.tool_settings(tool).and_then(|s| s.path.as_deref()))
    }

    // ── Paths ───────────────────────────────────────────────

    pub fn project_dir(&self) -> PathBuf {
        match &self.working_dir {
            Some(dir) if is_rooted_literal(dir) => from_literal(dir),
            Some(dir) => self.root.join(from_literal(dir)),
            None => self.root.clone(),
        }
    }

    /// Resolve a configured path against the project folder.
    pub fn resolve(&self, literal: &str) -> PathBuf {
        if is_rooted_literal(literal) {
            from_literal(literal)
        } else {
            self.project_dir().join(from_literal(literal))
        }
    }

    fn resolve_var(&self, value: Option<&str>) -> Option<PathBuf> {
        value.map(|literal| self.resolve(literal))
    }

    pub fn output_path(&self) -> Option<PathBuf> {
        self.resolve_var(self.output.as_deref())
    }

    /// Folder holding the output image, and with it the build state.
    pub fn output_dir(&self) -> PathBuf {
        self.output_path()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| self.project_dir())
    }

    pub fn initial_patch_path(&self) -> Option<PathBuf> {
        self.resolve_var(self.initial_patch.as_deref())
    }

    pub fn levels_dir(&self) -> Option<PathBuf> {
        self.resolve_var(self.levels.as_deref())
    }

    pub fn map16_path(&self) -> Option<PathBuf> {
        self.resolve_var(self.map16.as_deref())
    }

    pub fn shared_palette_path(&self) -> Option<PathBuf> {
        self.resolve_var(self.shared_palette.as_deref())
    }

    pub fn global_data_path(&self) -> Option<PathBuf> {
        self.resolve_var(self.global_data.as_deref())
    }

    pub fn title_moves_path(&self) -> Option<PathBuf> {
        self.resolve_var(self.title_moves.as_deref())
    }

    pub fn human_readable_map16_cli_path(&self) -> Option<PathBuf> {
        self.resolve_var(self.human_readable_map16_cli.as_deref())
    }

    /// Folder the human-readable map16 converter works on, when it is configured.
    ///
    /// Defaults to a folder named after the map16 file, next to it.
    pub fn human_readable_map16_dir_path(&self) -> Option<PathBuf> {
        self.human_readable_map16_cli.as_ref()?;
        if let Some(dir) = self.resolve_var(self.human_readable_map16_dir.as_deref()) {
            return Some(dir);
        }
        let map16 = self.map16_path()?;
        let stem = map16.file_stem()?.to_os_string();
        Some(map16.parent().map(|p| p.join(&stem)).unwrap_or_else(|| PathBuf::from(stem)))
    }

    pub fn globules_dir(&self) -> Option<PathBuf> {
        self.resolve_var(self.globules.as_deref())
    }

    pub fn asar_path(&self) -> Option<PathBuf> {
        self.resolve_var(self.asar.as_deref())
    }

    pub fn patch_path(&self, patch: &str) -> PathBuf {
        self.resolve(patch)
    }

    pub fn graphics_dir(&self) -> PathBuf {
        self.project_dir().join("Graphics")
    }

    pub fn exgraphics_dir(&self) -> PathBuf {
        self.project_dir().join("ExGraphics")
    }
}

fn is_config_file(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_lowercase()) else {
        return false;
    };
    path.is_file()
        && name.starts_with(CONFIG_PREFIX)
        && path
            .extension()
            .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(CONFIG_EXTENSION))
}

/// Strip comments and whitespace; `None` for lines with nothing left.
fn clean_line(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let content = match trimmed.find(COMMENT) {
        Some(start) => trimmed[..start].trim_end(),
        None => trimmed,
    };
    (!content.is_empty()).then_some(content)
}

/// Everything read from the sources so far, before interpretation.
#[derive(Debug, Default)]
struct RawConfig {
    vars: HashMap<String, String>,
    patches: Vec<String>,
    build_order: Vec<Insertable>,
    triggers: Vec<(Insertable, Insertable)>,
}

impl RawConfig {
    fn parse(&mut self, source: &str) -> Result<(), ConfigError> {
        let lines: Vec<&str> = source.lines().filter_map(clean_line).collect();

        let mut i = 0;
        while i < lines.len() {
            let line = lines[i];

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                if self.vars.contains_key(key) {
                    return Err(ConfigError::DuplicateKey(key.to_string()));
                }
                self.vars.insert(key.to_string(), value.trim().to_string());
                i += 1;
                continue;
            }

            if lines.get(i + 1) == Some(&"[") {
                let name = line;
                let mut items = Vec::new();
                i += 2;
                loop {
                    let Some(&item) = lines.get(i) else {
                        return Err(ConfigError::MalformedList(name.to_string()));
                    };
                    if item == "]" {
                        break;
                    }
                    items.push(item);
                    i += 1;
                }
                self.add_list(name, &items)?;
            } else {
                tracing::debug!("Ignoring config line '{}'", line);
            }
            i += 1;
        }
        Ok(())
    }

    fn add_list(&mut self, name: &str, items: &[&str]) -> Result<(), ConfigError> {
        match name {
            BUILD_ORDER_LIST => {
                for item in items {
                    self.build_order.push(Insertable::parse(item, false)?);
                }
            }
            TRIGGER_LIST => {
                for item in items {
                    let parts: Vec<&str> = item.split(TRIGGER_ARROW).collect();
                    let [trigger, triggered] = parts.as_slice() else {
                        return Err(ConfigError::MalformedTrigger(item.to_string()));
                    };
                    self.triggers
                        .push((Insertable::parse(trigger, true)?, Insertable::parse(triggered, true)?));
                }
            }
            PATCH_LIST => self.patches.extend(items.iter().map(|p| normalize_relative(p))),
            other => tracing::debug!("Ignoring unknown list '{}'", other),
        }
        Ok(())
    }

    /// A variable's value; blank values count as unset.
    fn var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}
