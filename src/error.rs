//! Error types for component construction and invocation.

use thiserror::Error;

/// Result type alias for component operations.
pub type Result<T> = std::result::Result<T, ComponentError>;

/// Errors raised while building or invoking a component.
///
/// Construction-time problems (`Config`, `UnsupportedStrategy`) are raised by
/// `make`. Invocation-time problems (`ShapeMismatch`, `TopologyMismatch`,
/// `MissingParam`) mean the caller handed over weights or inputs that do not
/// fit the component's spec.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComponentError {
    /// Declared configuration relationships are violated.
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    /// Unknown strategy, init or activation tag.
    #[error("unsupported strategy: {tag:?} is not supported")]
    UnsupportedStrategy { tag: String },

    /// Array shapes disagree.
    #[error("shape mismatch at {context}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        context: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// Realized tree keys or nesting differ from the spec.
    #[error("topology mismatch at {path:?}: {reason}")]
    TopologyMismatch { path: String, reason: String },

    /// Lookup of a key the tree does not hold.
    #[error("missing parameter: {key:?}")]
    MissingParam { key: String },

    /// Reshape failed.
    #[error("layout error: {0}")]
    Layout(#[from] ndarray::ShapeError),

    /// Sampling distribution could not be built.
    #[error("distribution error: {reason}")]
    Distribution { reason: String },
}

impl ComponentError {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    pub fn shape_mismatch(context: impl Into<String>, expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }
}
