//! The value contract every booked aggregate satisfies.

use std::sync::Arc;

use serde::Serialize;

/// A stateful object that accumulates measurements.
///
/// Instances are built from stored constructor arguments ([`Aggregate::Args`])
/// so that every physical copy of an entry starts out identical. Snapshots
/// are handed out by value, hence `Clone`; `Serialize` lets the exporter
/// persist a snapshot without knowing the concrete type.
pub trait Aggregate: Clone + Serialize + Send + Sync + 'static {
    /// One measurement.
    type Point: Send + 'static;
    /// Constructor arguments kept by the layout.
    type Args: Clone + Send + Sync + 'static;

    fn create(args: &Self::Args) -> Self;

    fn fill(&mut self, point: Self::Point);

    /// Apply many measurements in submission order.
    fn fill_n<I>(&mut self, points: I)
    where
        I: IntoIterator<Item = Self::Point>,
    {
        for point in points {
            self.fill(point);
        }
    }
}

/// Aggregates that know how to merge two of their instances.
///
/// `combine` must be associative and commutative with respect to the
/// aggregate's meaning, so any reduction order yields an equivalent result.
pub trait Combine: Aggregate {
    fn combine(&self, other: &Self) -> Self;
}

/// Combine function supplied at booking time for replicated layouts.
pub type CombineFn<V> = Arc<dyn Fn(&V, &V) -> V + Send + Sync>;

/// Plain numeric counters: every point is added to the running total.
macro_rules! summing_aggregate {
    ($($t:ty),* $(,)?) => {$(
        impl Aggregate for $t {
            type Point = $t;
            type Args = ();

            fn create(_: &()) -> Self {
                <$t>::default()
            }

            fn fill(&mut self, point: $t) {
                *self += point;
            }
        }

        impl Combine for $t {
            fn combine(&self, other: &Self) -> Self {
                *self + *other
            }
        }
    )*};
}

summing_aggregate!(i32, i64, u32, u64, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_sum_points() {
        let mut counter = i64::create(&());
        counter.fill(3);
        counter.fill_n([1, 1, 1]);
        assert_eq!(counter, 6);
        assert_eq!(counter.combine(&4), 10);
    }

    #[test]
    fn floats_sum_points() {
        let mut total = f64::create(&());
        total.fill_n(vec![0.5, 0.25]);
        assert_eq!(total, 0.75);
    }
}
