use serde::{Deserialize, Serialize};

use crate::error::{HistError, HistResult};

/// Uniform binning of `[min, max)` into `bins` bins.
///
/// Bin 0 is the underflow bin and bin `bins + 1` the overflow bin, so an
/// axis spans `bins + 2` storage cells.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AxisBounds")]
pub struct Axis {
    bins: usize,
    min: f64,
    max: f64,
}

/// Unvalidated wire form of an [`Axis`].
#[derive(Deserialize)]
struct AxisBounds {
    bins: usize,
    min: f64,
    max: f64,
}

impl TryFrom<AxisBounds> for Axis {
    type Error = HistError;

    fn try_from(raw: AxisBounds) -> HistResult<Self> {
        Axis::new(raw.bins, raw.min, raw.max)
    }
}

impl Axis {
    pub fn new(bins: usize, min: f64, max: f64) -> HistResult<Self> {
        if bins == 0 {
            return Err(HistError::NoBins);
        }
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(HistError::InvalidRange { min, max });
        }
        Ok(Self { bins, min, max })
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.bins as f64
    }

    /// Storage cells including under- and overflow.
    pub(crate) fn cells(&self) -> usize {
        self.bins + 2
    }

    /// Storage cell of `x`. NaN lands in the overflow bin.
    pub fn locate(&self, x: f64) -> usize {
        if x < self.min {
            0
        } else if x >= self.max || x.is_nan() {
            self.bins + 1
        } else {
            let bin = ((x - self.min) / self.bin_width()) as usize;
            // Rounding can push values just below `max` past the last bin.
            bin.min(self.bins - 1) + 1
        }
    }

    /// Lower edge of storage cell `cell` (1-based for in-range bins).
    pub fn lower_edge(&self, cell: usize) -> f64 {
        match cell {
            0 => f64::NEG_INFINITY,
            c if c > self.bins => self.max,
            c => self.min + (c - 1) as f64 * self.bin_width(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_axes() {
        assert_eq!(Axis::new(0, 0.0, 1.0), Err(HistError::NoBins));
        assert!(Axis::new(10, 1.0, 1.0).is_err());
        assert!(Axis::new(10, 2.0, 1.0).is_err());
        assert!(Axis::new(10, 0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn locates_values() {
        let axis = Axis::new(4, 0.0, 4.0).unwrap();
        assert_eq!(axis.locate(-0.5), 0);
        assert_eq!(axis.locate(0.0), 1);
        assert_eq!(axis.locate(1.5), 2);
        assert_eq!(axis.locate(3.999), 4);
        assert_eq!(axis.locate(4.0), 5);
        assert_eq!(axis.locate(f64::NAN), 5);
    }

    #[test]
    fn deserialization_validates() {
        let axis: Axis = serde_json::from_str(r#"{"bins":4,"min":0.0,"max":2.0}"#).unwrap();
        assert_eq!(axis, Axis::new(4, 0.0, 2.0).unwrap());
        assert!(serde_json::from_str::<Axis>(r#"{"bins":0,"min":0.0,"max":1.0}"#).is_err());
        assert!(serde_json::from_str::<Axis>(r#"{"bins":3,"min":1.0,"max":0.0}"#).is_err());
    }

    #[test]
    fn edges() {
        let axis = Axis::new(4, 0.0, 2.0).unwrap();
        assert_eq!(axis.bin_width(), 0.5);
        assert_eq!(axis.lower_edge(1), 0.0);
        assert_eq!(axis.lower_edge(3), 1.0);
        assert_eq!(axis.lower_edge(5), 2.0);
    }
}
