use std::collections::BTreeMap;

use serde_json::Value;
use tally_store::Selection;

use crate::error::ExportResult;
use crate::exporter::{for_each_live, ExportReport, Exporter};

/// Collects merged values in memory, keyed by `(path, name)`.
#[derive(Clone, Debug, Default)]
pub struct MemoryExporter {
    values: BTreeMap<(String, String), Value>,
}

impl MemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str, name: &str) -> Option<&Value> {
        self.values.get(&(path.to_string(), name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &BTreeMap<(String, String), Value> {
        &self.values
    }

    pub fn into_values(self) -> BTreeMap<(String, String), Value> {
        self.values
    }
}

impl Exporter for MemoryExporter {
    fn export(&mut self, selection: &Selection) -> ExportResult<ExportReport> {
        for_each_live(selection, |entry| {
            let value = entry.merged_json()?;
            let key = entry.key();
            self.values.insert((key.path.clone(), key.name.clone()), value);
            Ok(())
        })
    }
}
