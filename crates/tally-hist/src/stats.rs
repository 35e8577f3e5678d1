use serde::{Deserialize, Serialize};
use tally_store::{Aggregate, Combine};

/// Count, mean, variance and extrema of a scalar quantity.
///
/// Stores raw moments so that two instances combine by addition.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningStats {
    count: u64,
    sum: f64,
    sum_sq: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl RunningStats {
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    /// Population variance.
    pub fn variance(&self) -> Option<f64> {
        let mean = self.mean()?;
        Some((self.sum_sq / self.count as f64 - mean * mean).max(0.0))
    }
}

fn pick(a: Option<f64>, b: Option<f64>, f: fn(f64, f64) -> f64) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(f(x, y)),
        (x, None) => x,
        (None, y) => y,
    }
}

impl Aggregate for RunningStats {
    type Point = f64;
    type Args = ();

    fn create(_: &()) -> Self {
        Self::default()
    }

    fn fill(&mut self, x: f64) {
        self.count += 1;
        self.sum += x;
        self.sum_sq += x * x;
        self.min = pick(self.min, Some(x), f64::min);
        self.max = pick(self.max, Some(x), f64::max);
    }
}

impl Combine for RunningStats {
    fn combine(&self, other: &Self) -> Self {
        Self {
            count: self.count + other.count,
            sum: self.sum + other.sum,
            sum_sq: self.sum_sq + other.sum_sq,
            min: pick(self.min, other.min, f64::min),
            max: pick(self.max, other.max, f64::max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stats_have_no_mean() {
        let s = RunningStats::create(&());
        assert_eq!(s.mean(), None);
        assert_eq!(s.variance(), None);
        assert_eq!(s.min(), None);
    }

    #[test]
    fn moments_and_extrema() {
        let mut s = RunningStats::default();
        s.fill_n([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(s.count(), 8);
        assert_eq!(s.mean(), Some(5.0));
        assert_eq!(s.variance(), Some(4.0));
        assert_eq!(s.min(), Some(2.0));
        assert_eq!(s.max(), Some(9.0));
    }

    #[test]
    fn combine_matches_single_pass() {
        let mut a = RunningStats::default();
        let mut b = RunningStats::default();
        let mut all = RunningStats::default();
        for x in [1.0, -3.0, 2.5] {
            a.fill(x);
            all.fill(x);
        }
        for x in [10.0, 0.5] {
            b.fill(x);
            all.fill(x);
        }
        assert_eq!(a.combine(&b), all);
        assert_eq!(b.combine(&a).count(), all.count());
        assert_eq!(a.combine(&RunningStats::default()), a);
    }

    #[test]
    fn empty_extrema_serialize_as_null() {
        let json = serde_json::to_value(RunningStats::default()).unwrap();
        assert!(json["min"].is_null());
    }
}
