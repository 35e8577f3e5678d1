use serde::{Deserialize, Serialize};
use tally_store::{Aggregate, Combine};

use crate::axis::Axis;
use crate::error::HistError;

/// Binning of a histogram: one, two or three axes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SpecAxes")]
pub struct HistogramSpec {
    axes: Vec<Axis>,
}

#[derive(Deserialize)]
struct SpecAxes {
    axes: Vec<Axis>,
}

impl TryFrom<SpecAxes> for HistogramSpec {
    type Error = HistError;

    fn try_from(raw: SpecAxes) -> Result<Self, HistError> {
        match raw.axes.len() {
            1..=3 => Ok(Self { axes: raw.axes }),
            n => Err(HistError::InvalidDimension(n)),
        }
    }
}

impl HistogramSpec {
    pub fn with_one_axis(x: Axis) -> Self {
        Self { axes: vec![x] }
    }

    pub fn with_two_axes(x: Axis, y: Axis) -> Self {
        Self { axes: vec![x, y] }
    }

    pub fn with_three_axes(x: Axis, y: Axis, z: Axis) -> Self {
        Self { axes: vec![x, y, z] }
    }

    pub fn dimension(&self) -> usize {
        self.axes.len()
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    fn cells(&self) -> usize {
        self.axes.iter().map(Axis::cells).product()
    }
}

/// One histogram measurement. Coordinates beyond the histogram's
/// dimension are ignored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HistPoint {
    pub coords: [f64; 3],
    pub weight: f64,
}

impl HistPoint {
    pub fn x(x: f64) -> Self {
        Self {
            coords: [x, 0.0, 0.0],
            weight: 1.0,
        }
    }

    pub fn xy(x: f64, y: f64) -> Self {
        Self {
            coords: [x, y, 0.0],
            weight: 1.0,
        }
    }

    pub fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self {
            coords: [x, y, z],
            weight: 1.0,
        }
    }

    pub fn weighted(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

/// Weighted fixed-binning histogram.
///
/// Contents are stored row-major with the first axis varying fastest; each
/// axis contributes an underflow and an overflow cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    spec: HistogramSpec,
    contents: Vec<f64>,
    sum_w2: Vec<f64>,
    entries: u64,
}

impl Histogram {
    pub fn new(spec: HistogramSpec) -> Self {
        let cells = spec.cells();
        Self {
            spec,
            contents: vec![0.0; cells],
            sum_w2: vec![0.0; cells],
            entries: 0,
        }
    }

    pub fn spec(&self) -> &HistogramSpec {
        &self.spec
    }

    /// Number of fills, including under- and overflow.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Content of the cell addressed by per-axis cell indices
    /// (0 = underflow, `bins + 1` = overflow). Returns `None` if the index
    /// list does not match the dimension or is out of range.
    pub fn bin_content(&self, cells: &[usize]) -> Option<f64> {
        self.flat_index(cells).map(|i| self.contents[i])
    }

    /// Statistical error of a cell, `sqrt(sum of squared weights)`.
    pub fn bin_error(&self, cells: &[usize]) -> Option<f64> {
        self.flat_index(cells).map(|i| self.sum_w2[i].sqrt())
    }

    /// Sum of weights in all in-range cells.
    pub fn integral(&self) -> f64 {
        self.contents
            .iter()
            .enumerate()
            .filter(|(i, _)| self.in_range(*i))
            .map(|(_, w)| w)
            .sum()
    }

    /// Sum of weights in every cell, flow cells included.
    pub fn total_weight(&self) -> f64 {
        self.contents.iter().sum()
    }

    fn flat_index(&self, cells: &[usize]) -> Option<usize> {
        if cells.len() != self.spec.dimension() {
            return None;
        }
        let mut index = 0;
        let mut stride = 1;
        for (axis, &cell) in self.spec.axes.iter().zip(cells) {
            if cell >= axis.cells() {
                return None;
            }
            index += cell * stride;
            stride *= axis.cells();
        }
        Some(index)
    }

    fn in_range(&self, mut flat: usize) -> bool {
        for axis in &self.spec.axes {
            let cell = flat % axis.cells();
            if cell == 0 || cell > axis.bins() {
                return false;
            }
            flat /= axis.cells();
        }
        true
    }
}

impl Aggregate for Histogram {
    type Point = HistPoint;
    type Args = HistogramSpec;

    fn create(spec: &HistogramSpec) -> Self {
        Self::new(spec.clone())
    }

    fn fill(&mut self, point: HistPoint) {
        let mut index = 0;
        let mut stride = 1;
        for (axis, &x) in self.spec.axes.iter().zip(&point.coords) {
            index += axis.locate(x) * stride;
            stride *= axis.cells();
        }
        self.contents[index] += point.weight;
        self.sum_w2[index] += point.weight * point.weight;
        self.entries += 1;
    }
}

impl Combine for Histogram {
    /// Cell-wise sum.
    ///
    /// # Panics
    ///
    /// Panics if the two histograms have different binning.
    fn combine(&self, other: &Self) -> Self {
        assert_eq!(
            self.spec, other.spec,
            "cannot combine histograms with different binning"
        );
        let add = |a: &[f64], b: &[f64]| -> Vec<f64> {
            a.iter().zip(b).map(|(x, y)| x + y).collect()
        };
        Self {
            spec: self.spec.clone(),
            contents: add(&self.contents, &other.contents),
            sum_w2: add(&self.sum_w2, &other.sum_w2),
            entries: self.entries + other.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn h1() -> Histogram {
        Histogram::new(HistogramSpec::with_one_axis(Axis::new(10, 0.0, 10.0).unwrap()))
    }

    fn h2() -> Histogram {
        Histogram::new(HistogramSpec::with_two_axes(
            Axis::new(2, 0.0, 2.0).unwrap(),
            Axis::new(3, 0.0, 3.0).unwrap(),
        ))
    }

    #[test]
    fn one_axis_fill() {
        let mut h = h1();
        h.fill(HistPoint::x(2.5));
        h.fill(HistPoint::x(2.7).weighted(2.0));
        h.fill(HistPoint::x(-1.0));
        assert_eq!(h.bin_content(&[3]), Some(3.0));
        assert_eq!(h.bin_content(&[0]), Some(1.0));
        assert_eq!(h.bin_error(&[3]), Some(5.0f64.sqrt()));
        assert_eq!(h.entries(), 3);
        assert_eq!(h.integral(), 3.0);
        assert_eq!(h.total_weight(), 4.0);
    }

    #[test]
    fn two_axis_fill_addresses_cells() {
        let mut h = h2();
        h.fill(HistPoint::xy(1.5, 0.5));
        h.fill(HistPoint::xy(5.0, 0.5));
        assert_eq!(h.bin_content(&[2, 1]), Some(1.0));
        assert_eq!(h.bin_content(&[3, 1]), Some(1.0));
        assert_eq!(h.bin_content(&[1, 2]), Some(0.0));
        assert_eq!(h.integral(), 1.0);
        assert_eq!(h.bin_content(&[4, 1]), None);
        assert_eq!(h.bin_content(&[1]), None);
    }

    #[test]
    fn three_axis_spec() {
        let axis = Axis::new(2, 0.0, 1.0).unwrap();
        let mut h = Histogram::new(HistogramSpec::with_three_axes(axis, axis, axis));
        assert_eq!(h.spec().dimension(), 3);
        h.fill(HistPoint::xyz(0.1, 0.6, 0.9));
        assert_eq!(h.bin_content(&[1, 2, 2]), Some(1.0));
        assert_eq!(h.integral(), 1.0);
    }

    #[test]
    fn combine_adds_cells() {
        let mut a = h1();
        let mut b = h1();
        a.fill(HistPoint::x(1.0));
        b.fill(HistPoint::x(1.0));
        b.fill(HistPoint::x(9.0));
        let c = a.combine(&b);
        assert_eq!(c.bin_content(&[2]), Some(2.0));
        assert_eq!(c.bin_content(&[10]), Some(1.0));
        assert_eq!(c.entries(), 3);
    }

    #[test]
    #[should_panic(expected = "different binning")]
    fn combine_rejects_mismatched_binning() {
        h1().combine(&h2());
    }

    #[test]
    fn serializes_spec_and_contents() {
        let mut h = h1();
        h.fill(HistPoint::x(0.5));
        let json = serde_json::to_value(&h).unwrap();
        assert_eq!(json["entries"], 1);
        assert_eq!(json["spec"]["axes"][0]["bins"], 10);
        assert_eq!(json["contents"][1], 1.0);
    }

    #[test]
    fn deserialized_spec_needs_one_to_three_axes() {
        let axis = r#"{"bins":2,"min":0.0,"max":1.0}"#;
        let one: HistogramSpec = serde_json::from_str(&format!(r#"{{"axes":[{axis}]}}"#)).unwrap();
        assert_eq!(one.dimension(), 1);
        assert!(serde_json::from_str::<HistogramSpec>(r#"{"axes":[]}"#).is_err());
        let four = format!(r#"{{"axes":[{axis},{axis},{axis},{axis}]}}"#);
        assert!(serde_json::from_str::<HistogramSpec>(&four).is_err());
    }

    proptest! {
        #[test]
        fn combine_is_order_independent(
            xs in proptest::collection::vec(proptest::collection::vec(-2.0f64..12.0, 0..20), 1..5)
        ) {
            let parts: Vec<Histogram> = xs
                .iter()
                .map(|values| {
                    let mut h = h1();
                    h.fill_n(values.iter().map(|&x| HistPoint::x(x)));
                    h
                })
                .collect();
            let forward = parts.iter().skip(1).fold(parts[0].clone(), |acc, h| acc.combine(h));
            let backward = parts.iter().rev().skip(1).fold(parts[parts.len() - 1].clone(), |acc, h| acc.combine(h));
            // Unit weights keep every sum exact.
            prop_assert_eq!(forward, backward);
        }
    }
}
