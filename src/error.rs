use thiserror::Error;

/// Failures reported by the order-statistic queries.
///
/// Key absence is not an error: lookups by key return `Option`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("operation requires a non-empty tree")]
    Empty,
    #[error("rank {rank} is outside 1..={len}")]
    OutOfRange { rank: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, TreeError>;
