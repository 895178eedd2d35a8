//! Patch and module resolution

use crate::asar::AsarResolver;
use crate::error::ModuleError;
use crate::resolver::ResolveContext;
use romforge_core::{DependencyGraph, VertexId};
use std::path::{Path, PathBuf};

const ASAR_DLL_TAG: &str = "asar_dll";
const IMPORT_COMMAND: &str = ";LH>";
const IMPORT_KEYWORD: &str = " import ";

/// Resolves user patches applied directly with the assembler.
pub struct PatchResolver {
    asar: AsarResolver,
    asar_dll: Option<PathBuf>,
}

impl PatchResolver {
    pub fn new(asar_dll: Option<&Path>) -> anyhow::Result<Self> {
        Ok(PatchResolver {
            asar: AsarResolver::new()?,
            asar_dll: asar_dll.map(Path::to_path_buf),
        })
    }

    pub fn with_include_dirs(mut self, dirs: &[PathBuf]) -> Self {
        self.asar = self.asar.with_include_dirs(dirs.iter().cloned());
        self
    }

    pub fn resolve(
        &self,
        graph: &mut DependencyGraph,
        patch: VertexId,
        ctx: &mut ResolveContext,
    ) -> anyhow::Result<()> {
        self.asar.resolve(graph, patch, ctx)?;
        link_asar_dll(graph, patch, self.asar_dll.as_deref())
    }
}

/// Resolves per-file modules ("globules") and their `;LH> import` lines.
pub struct ModuleResolver {
    asar: AsarResolver,
    asar_dll: Option<PathBuf>,
    folder: PathBuf,
}

impl ModuleResolver {
    pub fn new(folder: &Path, asar_dll: Option<&Path>) -> anyhow::Result<Self> {
        Ok(ModuleResolver {
            asar: AsarResolver::new()?,
            asar_dll: asar_dll.map(Path::to_path_buf),
            folder: folder.to_path_buf(),
        })
    }

    pub fn with_include_dirs(mut self, dirs: &[PathBuf]) -> Self {
        self.asar = self.asar.with_include_dirs(dirs.iter().cloned());
        self
    }

    /// Link `module` to the modules it imports, then scan it as asar source.
    ///
    /// Every module of the folder should already be registered as a root, so an
    /// import lands on the imported module's root vertex.
    pub fn resolve(
        &self,
        graph: &mut DependencyGraph,
        module: VertexId,
        ctx: &mut ResolveContext,
    ) -> anyhow::Result<()> {
        let Some(file) = graph[module].file().cloned() else {
            return Ok(());
        };
        if graph[module].is_hashed() {
            let contents = std::fs::read(&file.path)?;
            let module_name = file.file_name();
            let module_display = file.path.display().to_string();

            let mut imported = 0;
            for line in String::from_utf8_lossy(&contents).lines() {
                let Some(command) = line.strip_prefix(IMPORT_COMMAND) else {
                    continue;
                };
                let Some(imports) = command.strip_prefix(IMPORT_KEYWORD) else {
                    return Err(ModuleError::MalformedCommand {
                        line: line.to_string(),
                        module: module_display,
                    }
                    .into());
                };

                for import in imports.split(',').map(|i| i.replace('"', " ").trim().to_string()) {
                    let import_path = self.folder.join(&import);
                    if !import_path.is_file() {
                        return Err(ModuleError::ImportNotFound {
                            import: import_path.display().to_string(),
                            module: module_display,
                        }
                        .into());
                    }
                    if import.to_lowercase() == module_name {
                        return Err(ModuleError::SelfImport { module: module_display }.into());
                    }

                    let imported_vertex = graph.get_or_create_named(&import_path)?;
                    graph.add_edge(module, imported_vertex, format!("import_{}", imported));
                    imported += 1;
                }
            }
        }

        self.asar.resolve(graph, module, ctx)?;
        link_asar_dll(graph, module, self.asar_dll.as_deref())
    }
}

fn link_asar_dll(graph: &mut DependencyGraph, root: VertexId, asar_dll: Option<&Path>) -> anyhow::Result<()> {
    if let Some(asar_dll) = asar_dll {
        let dll = graph.get_or_create(asar_dll)?;
        graph.try_add_unique_edge(root, dll, ASAR_DLL_TAG, false);
    }
    Ok(())
}
