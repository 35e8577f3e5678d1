use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tally_store::{Entry, Selection};
use tally_types::{path_components, EntryKey};
use tracing::debug;

use crate::error::ExportResult;
use crate::exporter::{for_each_live, ExportReport, Exporter};

/// On-disk encoding of exported values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportFormat {
    /// Self-describing document with the entry metadata and the value.
    #[default]
    Json,
    /// Raw bincode encoding of the merged value.
    Bincode,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Bincode => "bin",
        }
    }
}

#[derive(Serialize)]
struct JsonLeaf<'a> {
    path: &'a str,
    name: &'a str,
    #[serde(rename = "type")]
    type_name: &'static str,
    layout: &'static str,
    instances: usize,
    value: Value,
}

/// Mirrors the booking tree on disk: `/det/tracks/` + `n` becomes
/// `<root>/det/tracks/n.json`.
#[derive(Clone, Debug)]
pub struct DirectoryExporter {
    root: PathBuf,
    format: ExportFormat,
}

impl DirectoryExporter {
    pub fn new(root: impl Into<PathBuf>, format: ExportFormat) -> Self {
        Self {
            root: root.into(),
            format,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    /// File an entry is written to.
    pub fn target(&self, key: &EntryKey) -> PathBuf {
        let mut target = self.root.clone();
        target.extend(path_components(&key.path));
        target.join(format!("{}.{}", key.name, self.format.extension()))
    }

    fn write_entry(&self, entry: &Entry) -> ExportResult<()> {
        let key = entry.key();
        let bytes = match self.format {
            ExportFormat::Json => {
                let leaf = JsonLeaf {
                    path: &key.path,
                    name: &key.name,
                    type_name: key.type_tag.name(),
                    layout: key.layout.as_str(),
                    instances: key.instance_count,
                    value: entry.merged_json()?,
                };
                serde_json::to_vec_pretty(&leaf)?
            }
            ExportFormat::Bincode => entry.merged_bytes()?,
        };

        let target = self.target(key);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, bytes)?;
        debug!(entry = %key.full_name(), target = %target.display(), "wrote entry");
        Ok(())
    }
}

impl Exporter for DirectoryExporter {
    fn export(&mut self, selection: &Selection) -> ExportResult<ExportReport> {
        for_each_live(selection, |entry| self.write_entry(entry))
    }
}
