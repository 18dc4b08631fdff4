use crate::store::StoreError;
use crate::window::{CounterId, PhaseId};
use thiserror::Error;

/// Errors raised while building or querying a [`super::Demultiplexer`]
#[derive(Error, Debug)]
pub enum DemuxError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Window index {index} is out of range ({len} windows)")]
    WindowOutOfRange { index: usize, len: usize },

    #[error("Counter {counter} was never sampled (queried at window {index})")]
    CounterNeverSampled { counter: CounterId, index: usize },

    /// The hierarchy does not cover a window; indicates a build defect
    #[error("Window {index} is not covered by any instance of phase {phase}")]
    Inconsistent { index: usize, phase: PhaseId },
}

/// Result type for demultiplexer operations
pub type Result<T> = std::result::Result<T, DemuxError>;
