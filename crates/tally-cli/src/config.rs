use std::path::Path;

use anyhow::{bail, Context};
use serde::Deserialize;
use tally_hist::{Axis, HistogramSpec};
use tally_store::{LayoutKind, StoreConfig};

/// A `tally run` configuration file.
#[derive(Clone, Debug, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default, rename = "aggregate")]
    pub aggregates: Vec<AggregateConfig>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
    Counter,
    Histogram,
    /// Running mean, variance and extrema.
    Stats,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AggregateConfig {
    pub path: String,
    pub name: String,
    pub kind: AggregateKind,
    #[serde(default = "default_layout")]
    pub layout: LayoutKind,
    /// Replica count; defaults to the number of workers.
    pub instances: Option<usize>,
    pub buffer_capacity: Option<usize>,
    pub store_on_exit: Option<bool>,
    /// Validated while parsing.
    #[serde(default)]
    pub axes: Vec<Axis>,
}

fn default_layout() -> LayoutKind {
    LayoutKind::Single
}

impl RunConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let config: RunConfig = toml::from_str(text)?;
        if config.aggregates.is_empty() {
            bail!("config books no aggregates");
        }
        for agg in &config.aggregates {
            if agg.kind != AggregateKind::Histogram && !agg.axes.is_empty() {
                bail!("{}{}: axes are only valid for histograms", agg.path, agg.name);
            }
        }
        Ok(config)
    }
}

impl AggregateConfig {
    /// Histogram binning. Without axes, one axis of 100 bins over `[0, 1)`.
    pub fn histogram_spec(&self) -> anyhow::Result<HistogramSpec> {
        Ok(match self.axes[..] {
            [] => HistogramSpec::with_one_axis(Axis::new(100, 0.0, 1.0)?),
            [x] => HistogramSpec::with_one_axis(x),
            [x, y] => HistogramSpec::with_two_axes(x, y),
            [x, y, z] => HistogramSpec::with_three_axes(x, y, z),
            _ => bail!("{}{}: at most three axes are supported", self.path, self.name),
        })
    }
}
