//! Insertable identities: the units a build inserts into the output image

use romforge_core::paths::normalize_relative;
use romforge_core::Tool;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfigError;

/// One step of a build.
///
/// Single patches and single levels carry their normalized relative path, and
/// only they compare by it; every other kind is a singleton.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Insertable {
    Pixi,
    AddMusicK,
    Gps,
    UberAsm,
    Graphics,
    ExGraphics,
    Map16,
    SharedPalettes,
    GlobalData,
    TitleMoves,
    /// A single level file.
    SingleLevel(String),
    /// Every level in the levels folder.
    Levels,
    /// A single patch, named by its path.
    SinglePatch(String),
    /// Every configured patch not named individually in the build order.
    Patches,
}

impl Insertable {
    pub fn single_patch(path: &str) -> Self {
        Insertable::SinglePatch(normalize_relative(path))
    }

    pub fn single_level(path: &str) -> Self {
        Insertable::SingleLevel(normalize_relative(path))
    }

    /// Parse a build order or trigger entry.
    ///
    /// Names match case-insensitively. Anything that is not a known name is taken
    /// to be the path of a single patch. `Patches` is rejected inside triggers,
    /// which must name patches individually.
    pub fn parse(entry: &str, in_trigger: bool) -> Result<Self, ConfigError> {
        let trimmed = entry.trim();
        let insertable = match trimmed.to_ascii_lowercase().as_str() {
            "pixi" => Insertable::Pixi,
            "addmusick" => Insertable::AddMusicK,
            "gps" => Insertable::Gps,
            "uberasm" => Insertable::UberAsm,
            "graphics" => Insertable::Graphics,
            "exgraphics" => Insertable::ExGraphics,
            "map16" => Insertable::Map16,
            "sharedpalettes" => Insertable::SharedPalettes,
            "globaldata" => Insertable::GlobalData,
            "titlemoves" => Insertable::TitleMoves,
            "levels" => Insertable::Levels,
            "patches" if in_trigger => return Err(ConfigError::PatchesInTrigger),
            "patches" => Insertable::Patches,
            _ => Insertable::single_patch(trimmed),
        };
        Ok(insertable)
    }

    pub fn tool(&self) -> Option<Tool> {
        match self {
            Insertable::Pixi => Some(Tool::Pixi),
            Insertable::AddMusicK => Some(Tool::AddMusicK),
            Insertable::Gps => Some(Tool::Gps),
            Insertable::UberAsm => Some(Tool::UberAsm),
            _ => None,
        }
    }

    /// Name of the kind, without the path of single patches and levels.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Insertable::Pixi => "Pixi",
            Insertable::AddMusicK => "AddMusicK",
            Insertable::Gps => "Gps",
            Insertable::UberAsm => "UberAsm",
            Insertable::Graphics => "Graphics",
            Insertable::ExGraphics => "ExGraphics",
            Insertable::Map16 => "Map16",
            Insertable::SharedPalettes => "SharedPalettes",
            Insertable::GlobalData => "GlobalData",
            Insertable::TitleMoves => "TitleMoves",
            Insertable::SingleLevel(_) => "SingleLevel",
            Insertable::Levels => "Levels",
            Insertable::SinglePatch(_) => "SinglePatch",
            Insertable::Patches => "Patches",
        }
    }
}

impl From<Tool> for Insertable {
    fn from(tool: Tool) -> Self {
        match tool {
            Tool::Pixi => Insertable::Pixi,
            Tool::AddMusicK => Insertable::AddMusicK,
            Tool::Gps => Insertable::Gps,
            Tool::UberAsm => Insertable::UberAsm,
        }
    }
}

impl fmt::Display for Insertable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Insertable::SinglePatch(path) | Insertable::SingleLevel(path) => f.write_str(path),
            other => f.write_str(other.kind_name()),
        }
    }
}
