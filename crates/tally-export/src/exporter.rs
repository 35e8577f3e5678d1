use serde::Serialize;
use tally_store::{BookStore, Condition, Entry, Selection, StoreError};
use tracing::{info, warn};

use crate::error::{ExportError, ExportResult};

/// Outcome of one export pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub exported: usize,
    /// Entries in the selection that had been removed from the store.
    pub skipped: usize,
}

/// A sink for merged aggregates.
pub trait Exporter {
    fn export(&mut self, selection: &Selection) -> ExportResult<ExportReport>;
}

/// Export every entry booked with `store_on_exit`.
///
/// Call this once all workers have finished: the merge forces pending
/// buffers through, but fills still in flight on other threads may land
/// after the snapshot.
pub fn export_on_exit(
    store: &BookStore,
    exporter: &mut dyn Exporter,
) -> ExportResult<ExportReport> {
    let selection = store.find(&Condition::store_on_exit());
    let report = exporter.export(&selection)?;
    info!(
        exported = report.exported,
        skipped = report.skipped,
        "exported store_on_exit entries"
    );
    Ok(report)
}

/// Run `export_one` on every live entry, counting removed entries as skipped.
pub(crate) fn for_each_live<F>(
    selection: &Selection,
    mut export_one: F,
) -> ExportResult<ExportReport>
where
    F: FnMut(&Entry) -> ExportResult<()>,
{
    let mut report = ExportReport::default();
    for entry in selection {
        match export_one(entry) {
            Ok(()) => report.exported += 1,
            Err(ExportError::Store(StoreError::EntryRemoved { entry: name })) => {
                warn!(entry = %name, "skipping removed entry");
                report.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(report)
}
