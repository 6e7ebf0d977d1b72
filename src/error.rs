use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("activity grid has no passable cell")]
    EmptyGrid,
    #[error("activity grid row {row} has {actual} columns, expected {expected}")]
    RaggedGrid {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),
    #[error("interactive run aborted: {0}")]
    RunAborted(String),
}

pub type SimResult<T> = Result<T, SimError>;
