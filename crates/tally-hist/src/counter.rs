use serde::{Deserialize, Serialize};
use tally_store::{Aggregate, Combine};

/// Event counter. Each fill adds its increment.
///
/// Serializes as a bare number.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Counter(u64);

impl Counter {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Aggregate for Counter {
    type Point = u64;
    type Args = ();

    fn create(_: &()) -> Self {
        Self::default()
    }

    fn fill(&mut self, increment: u64) {
        self.0 = self.0.saturating_add(increment);
    }
}

impl Combine for Counter {
    fn combine(&self, other: &Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_increments() {
        let mut c = Counter::create(&());
        c.fill(1);
        c.fill_n([2, 3]);
        assert_eq!(c.value(), 6);
    }

    #[test]
    fn combine_adds_and_saturates() {
        let mut a = Counter::default();
        a.fill(u64::MAX - 1);
        let mut b = Counter::default();
        b.fill(5);
        assert_eq!(a.combine(&b).value(), u64::MAX);
        assert_eq!(b.combine(&Counter::default()), b);
    }

    #[test]
    fn serializes_as_number() {
        let mut c = Counter::default();
        c.fill(7);
        assert_eq!(serde_json::to_value(c).unwrap(), serde_json::json!(7));
    }
}
