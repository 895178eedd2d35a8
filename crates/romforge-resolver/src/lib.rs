//! Static dependency discovery for assembler sources and external tools

pub mod asar;
pub mod error;
pub mod patch;
pub mod resolver;
pub mod tools;


#[cfg(test)]
pub mod test_utils;

pub use asar::{include_dirs_from_options, AsarResolver};
pub use error::ModuleError;
pub use patch::{ModuleResolver, PatchResolver};
pub use resolver::{ResolveContext, ToolResolver};
pub use tools::{get_resolver, ToolInvocation};
