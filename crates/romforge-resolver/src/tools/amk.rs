//! Music tool (AddmusicK) resolver

use super::{attach_root_dependencies, option_path, parse_hex, RootDependency, ToolInvocation};
use crate::asar::AsarResolver;
use crate::resolver::{ResolveContext, ToolResolver};
use regex::Regex;
use romforge_core::{DependencyGraph, Tool, VertexId};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootKind {
    Asar,
    Binary,
    SongList,
    SampleGroups,
    SoundEffectList,
}

const FIXED_DEPENDENCIES: [(&str, &str, RootKind); 10] = [
    ("asar.exe", "asar", RootKind::Binary),
    ("Addmusic_list.txt", "song_list", RootKind::SongList),
    ("Addmusic_sample groups.txt", "sample_groups", RootKind::SampleGroups),
    ("Addmusic_sound effects.txt", "sound_effect_list", RootKind::SoundEffectList),
    ("asm/main.asm", "main", RootKind::Asar),
    ("asm/SNES/AMUndo.asm", "am_undo", RootKind::Asar),
    ("asm/SNES/patch.asm", "patch", RootKind::Asar),
    ("asm/SNES/patch2.asm", "patch2", RootKind::Asar),
    ("asm/SNES/SPCBase.bin", "spc_base", RootKind::Binary),
    ("asm/SNES/SPCDSPBase.bin", "spcdsp_base", RootKind::Binary),
];

const SONG_SAMPLE_LIST: (&str, &str) = ("asm/SNES/SongSampleList.asm", "song_sample_list");

const SAMPLES_FOLDER: &str = "samples";
const MUSIC_FOLDER: &str = "music";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SfxBank {
    Bank1DF9,
    Bank1DFC,
}

impl SfxBank {
    fn folder(self) -> &'static str {
        match self {
            SfxBank::Bank1DF9 => "1DF9",
            SfxBank::Bank1DFC => "1DFC",
        }
    }

    fn tag(self) -> &'static str {
        match self {
            SfxBank::Bank1DF9 => "1df9",
            SfxBank::Bank1DFC => "1dfc",
        }
    }
}

pub struct AmkResolver {
    exe_path: PathBuf,
    tool_dir: PathBuf,
    song_entry: Regex,
    song_directive: Regex,
    quoted: Regex,
    sample_group: Regex,
    sfx_entry: Regex,
    sfx_header: Regex,
}

impl AmkResolver {
    pub fn new(invocation: &ToolInvocation) -> anyhow::Result<Self> {
        Ok(AmkResolver {
            exe_path: invocation.exe_path.clone(),
            tool_dir: invocation.tool_dir(),
            song_entry: Regex::new(r"^(?P<number>[a-fA-F0-9]{1,2})\s+(?P<path>.*\.txt)\s*$")?,
            song_directive: Regex::new(r#"(?i)#path\s*"(?P<path>[^"]*)"|#samples\s*\{(?P<samples>[^}]*)\}"#)?,
            quoted: Regex::new(r#""(?P<name>[^"]*)""#)?,
            sample_group: Regex::new(r"#(?P<group>\S+)\s*\{(?P<samples>[^}]*)\}")?,
            sfx_entry: Regex::new(r"^(?P<number>[a-fA-F0-9]{1,2})\s+[?*]?\s*(?P<path>.*\.txt)\s*$")?,
            sfx_header: Regex::new(r"^\s*SFX(?P<bank>.*):\s*$")?,
        })
    }

    fn asar(&self) -> anyhow::Result<AsarResolver> {
        let mut asar = AsarResolver::new()?;
        asar.name_generated(&self.tool_dir.join(SONG_SAMPLE_LIST.0), SONG_SAMPLE_LIST.1);
        Ok(asar)
    }

    fn samples_dir(&self) -> PathBuf {
        self.tool_dir.join(SAMPLES_FOLDER)
    }

    fn read(graph: &DependencyGraph, vertex: VertexId) -> anyhow::Result<String> {
        let path = graph[vertex].file().map(|f| f.path.clone()).unwrap_or_default();
        Ok(String::from_utf8_lossy(&std::fs::read(path)?).into_owned())
    }

    fn resolve_song_list(
        &self,
        graph: &mut DependencyGraph,
        list: VertexId,
        ctx: &mut ResolveContext,
    ) -> anyhow::Result<()> {
        if !ctx.mark_seen(list) {
            return Ok(());
        }
        let contents = Self::read(graph, list)?;
        let music = self.tool_dir.join(MUSIC_FOLDER);

        for line in contents.lines() {
            let Some(caps) = self.song_entry.captures(line) else {
                continue;
            };
            let Some(number) = parse_hex(&caps["number"]) else {
                continue;
            };
            let song = graph.get_or_create(&option_path(&music, &caps["path"]))?;
            graph.add_edge(list, song, format!("song_{}", number));

            if graph[song].is_hashed() {
                self.resolve_song(graph, song, ctx)?;
            }
        }
        Ok(())
    }

    /// Link a song to its samples. `#path` changes the folder later samples live in.
    fn resolve_song(&self, graph: &mut DependencyGraph, song: VertexId, ctx: &mut ResolveContext) -> anyhow::Result<()> {
        if !ctx.mark_seen(song) {
            return Ok(());
        }
        let contents = Self::read(graph, song)?;
        let samples = self.samples_dir();
        let mut current = samples.clone();
        let mut sample_id = 0;

        for caps in self.song_directive.captures_iter(&contents) {
            if let Some(path) = caps.name("path") {
                current = option_path(&samples, path.as_str());
                continue;
            }
            let Some(block) = caps.name("samples") else {
                continue;
            };
            for sample in self.quoted.captures_iter(block.as_str()) {
                let vertex = graph.get_or_create(&option_path(&current, &sample["name"]))?;
                if graph.try_add_unique_edge(song, vertex, format!("sample_{}", sample_id), false) {
                    sample_id += 1;
                }
            }
        }
        Ok(())
    }

    fn resolve_sample_groups(
        &self,
        graph: &mut DependencyGraph,
        groups: VertexId,
        ctx: &mut ResolveContext,
    ) -> anyhow::Result<()> {
        if !ctx.mark_seen(groups) {
            return Ok(());
        }
        let contents = Self::read(graph, groups)?;
        let samples = self.samples_dir();

        for caps in self.sample_group.captures_iter(&contents) {
            let group = &caps["group"];
            for (sample_id, sample) in self.quoted.captures_iter(&caps["samples"]).enumerate() {
                let vertex = graph.get_or_create(&option_path(&samples, &sample["name"]))?;
                graph.add_edge(groups, vertex, format!("sample_group_{}_{}", group, sample_id));
            }
        }
        Ok(())
    }

    /// Sound effects may contain assembler code, so each one is scanned like a source file.
    fn resolve_sound_effects(
        &self,
        graph: &mut DependencyGraph,
        list: VertexId,
        asar: &AsarResolver,
        ctx: &mut ResolveContext,
    ) -> anyhow::Result<()> {
        if !ctx.mark_seen(list) {
            return Ok(());
        }
        let contents = Self::read(graph, list)?;
        let mut bank = SfxBank::Bank1DF9;

        for line in contents.lines() {
            if let Some(caps) = self.sfx_header.captures(line) {
                bank = if caps["bank"].trim() == "1DF9" {
                    SfxBank::Bank1DF9
                } else {
                    SfxBank::Bank1DFC
                };
                continue;
            }
            let Some(caps) = self.sfx_entry.captures(line) else {
                continue;
            };
            let Some(number) = parse_hex(&caps["number"]) else {
                continue;
            };

            let folder = self.tool_dir.join(bank.folder());
            let effect = graph.get_or_create(&option_path(&folder, &caps["path"]))?;
            graph.add_edge(list, effect, format!("sound_effect_{}_{}", bank.tag(), number));

            if graph[effect].is_hashed() {
                asar.resolve(graph, effect, ctx)?;
            }
        }
        Ok(())
    }
}

impl ToolResolver for AmkResolver {
    fn tool(&self) -> Tool {
        Tool::AddMusicK
    }

    fn resolve(&self, graph: &mut DependencyGraph, root: VertexId) -> anyhow::Result<()> {
        let asar = self.asar()?;
        let mut ctx = ResolveContext::new();
        let dependencies: Vec<RootDependency<RootKind>> = FIXED_DEPENDENCIES
            .iter()
            .map(|&(path, tag, kind)| RootDependency::new(self.tool_dir.join(path), tag, kind))
            .collect();

        attach_root_dependencies(graph, root, &dependencies, |graph, vertex, kind| match kind {
            RootKind::Asar => asar.resolve(graph, vertex, &mut ctx),
            RootKind::Binary => Ok(()),
            RootKind::SongList => self.resolve_song_list(graph, vertex, &mut ctx),
            RootKind::SampleGroups => self.resolve_sample_groups(graph, vertex, &mut ctx),
            RootKind::SoundEffectList => self.resolve_sound_effects(graph, vertex, &asar, &mut ctx),
        })?;

        let exe = graph.get_or_create(Path::new(&self.exe_path))?;
        graph.try_add_unique_edge(root, exe, "exe", false);

        tracing::debug!("Resolved {} dependencies", Tool::AddMusicK);
        Ok(())
    }
}
