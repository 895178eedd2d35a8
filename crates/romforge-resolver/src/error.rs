//! Errors raised while resolving module imports

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    #[error("Attempt to import '{module}' into itself")]
    SelfImport { module: String },
    #[error("Attempt to import '{import}' from '{module}', but file was not found")]
    ImportNotFound { import: String, module: String },
    #[error("Malformed ;LH> command: '{line}' in '{module}'")]
    MalformedCommand { line: String, module: String },
}
