//! Error types raised by the core graph machinery

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Cyclic imports detected between modules, involving '{module}'")]
    CyclicImports { module: String },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("Record {record} references dependency index {idx}, but only {len} records exist")]
    DanglingIndex { record: usize, idx: i64, len: usize },
}
