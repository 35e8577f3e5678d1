/// Errors from histogram construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HistError {
    /// An axis needs at least one bin.
    #[error("axis must have at least one bin")]
    NoBins,

    /// The axis range is empty, inverted or not finite.
    #[error("invalid axis range [{min}, {max})")]
    InvalidRange { min: f64, max: f64 },

    /// A histogram has one, two or three axes.
    #[error("histograms need 1 to 3 axes, got {0}")]
    InvalidDimension(usize),
}

/// Result alias for histogram construction.
pub type HistResult<T> = Result<T, HistError>;
