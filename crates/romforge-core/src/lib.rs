//! Romforge Core: vertex model, dependency graph, serializer and change analyzer

pub mod analyzer;
pub mod cache;
pub mod digest;
pub mod error;
pub mod graph;
pub mod model;
pub mod paths;
pub mod report;
pub mod serializer;

#[cfg(test)]
pub mod tests;

#[cfg(test)]
pub mod test_utils;

pub use analyzer::{describe_chain, Analysis, GraphAnalyzer, RootComparison, Verdict};
pub use cache::{clear_state, ensure_state_dir, load_report, report_path, save_report, state_dir, REPORT_FILE, STATE_DIR};
pub use digest::{hash_file, hash_folder, hash_list, hash_optional_file, Digest};
pub use error::{GraphError, RecordError};
pub use graph::DependencyGraph;
pub use model::{DependencyEdge, FileRef, Tool, Vertex, VertexId, VertexKind};
pub use paths::CanonicalPath;
pub use report::{Report, StaleReport, REPORT_FORMAT_VERSION};
pub use serializer::{serialize, Record, RecordDependency, RecordKind, RecordTarget, SerializedGraph};
