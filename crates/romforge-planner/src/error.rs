//! Configuration errors

/// A project configuration that cannot be built from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("No config*.txt files found in '{0}'")]
    NoConfigFiles(String),

    // ── Syntax ──────────────────────────────────────────────
    #[error("Duplicate config key: '{0}'")]
    DuplicateKey(String),
    #[error("Malformed list '{0}': missing closing ']'")]
    MalformedList(String),
    #[error("Malformed Quick Build trigger: '{0}'")]
    MalformedTrigger(String),
    #[error("'Patches' cannot be used in Quick Build triggers, please specify individual patches instead")]
    PatchesInTrigger,

    // ── Validation ──────────────────────────────────────────
    #[error("'build_order' list must be specified")]
    MissingBuildOrder,
    #[error("Not all patches listed in 'patches' appear in 'build_order'")]
    UncoveredPatches,
    #[error("Resources used in 'quick_build_triggers' must also be present in 'build_order'")]
    TriggerNotInBuildOrder,
    #[error("Cyclic triggers detected in Quick Build trigger list")]
    CyclicTriggers,
    #[error("{variable} not specified, but {kind} found in {list} list")]
    Unconfigured {
        variable: &'static str,
        kind: &'static str,
        list: &'static str,
    },
    #[error("{tool} not found at path '{path}'")]
    ToolNotFound { tool: &'static str, path: String },
    #[error("Patch '{0}' not found")]
    PatchNotFound(String),
    #[error("Human Readable Map16 CLI not found at path '{0}'")]
    Map16CliNotFound(String),
}
