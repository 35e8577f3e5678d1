//! Aggregate value types for event processing.
//!
//! - [`Counter`]: event counter
//! - [`Histogram`]: fixed-binning histogram over one, two or three axes,
//!   built with [`HistogramSpec::with_one_axis`],
//!   [`HistogramSpec::with_two_axes`] or [`HistogramSpec::with_three_axes`]
//! - [`RunningStats`]: count, mean, variance and extrema of a scalar
//!
//! All three implement [`tally_store::Combine`] and can therefore be booked with
//! any layout, including `ReplicatedCopies` via
//! [`LayoutSpec::replicated_combined`](tally_store::LayoutSpec::replicated_combined).

pub mod axis;
pub mod counter;
pub mod error;
pub mod histogram;
pub mod stats;

pub use axis::Axis;
pub use counter::Counter;
pub use error::{HistError, HistResult};
pub use histogram::{HistPoint, Histogram, HistogramSpec};
pub use stats::RunningStats;
