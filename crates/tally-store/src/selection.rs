//! Materialized, filterable views over booked entries.

use std::ops::Range;
use std::slice;

use crate::condition::Condition;
use crate::entry::Entry;
use crate::error::{StoreError, StoreResult};
use tally_types::EntryKey;

/// How a sub-selection combines the parent's condition with a new one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ComposeStrategy {
    /// Keep entries matching both conditions.
    #[default]
    And,
    /// Keep entries matching the new condition; it becomes the selection's
    /// condition going forward.
    OnlyChild,
    /// Ignore the new condition and re-apply the parent's. Useful to drop
    /// entries removed from the store since the parent was built.
    OnlyParent,
}

/// An ordered list of entries plus the condition that produced it.
///
/// Removing an element only changes this view; use
/// [`BookStore::remove_selection`](crate::BookStore::remove_selection) to
/// remove entries from the store itself.
#[derive(Clone, Debug, Default)]
pub struct Selection {
    entries: Vec<Entry>,
    condition: Condition,
}

impl Selection {
    pub(crate) fn new(entries: Vec<Entry>, condition: Condition) -> Self {
        Self { entries, condition }
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> StoreResult<&Entry> {
        self.entries.get(index).ok_or(StoreError::IndexOutOfRange {
            what: "selection",
            index,
            len: self.entries.len(),
        })
    }

    pub fn iter(&self) -> slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &EntryKey> {
        self.entries.iter().map(Entry::key)
    }

    /// Sub-select the entries that also match `condition`.
    pub fn find(&self, condition: &Condition) -> Selection {
        self.find_with(condition, ComposeStrategy::And)
    }

    /// Sub-select with an explicit composition strategy. Removed entries
    /// never match.
    pub fn find_with(&self, condition: &Condition, strategy: ComposeStrategy) -> Selection {
        let composed = match strategy {
            ComposeStrategy::And => self.condition.and(condition),
            ComposeStrategy::OnlyChild => condition.clone(),
            ComposeStrategy::OnlyParent => self.condition.clone(),
        };
        let entries = self
            .entries
            .iter()
            .filter(|e| e.is_live() && composed.matches(e.key()))
            .cloned()
            .collect();
        Selection::new(entries, composed)
    }

    /// Remove one element from the view.
    pub fn remove(&mut self, index: usize) -> StoreResult<Entry> {
        if index >= self.entries.len() {
            return Err(StoreError::IndexOutOfRange {
                what: "selection",
                index,
                len: self.entries.len(),
            });
        }
        Ok(self.entries.remove(index))
    }

    /// Remove a contiguous range from the view. Returns the number removed.
    pub fn remove_range(&mut self, range: Range<usize>) -> StoreResult<usize> {
        let len = self.entries.len();
        if range.start > range.end || range.end > len {
            return Err(StoreError::IndexOutOfRange {
                what: "selection",
                index: range.end.max(range.start),
                len,
            });
        }
        Ok(self.entries.drain(range).count())
    }

    /// Drop entries that were removed from the store. Returns the number
    /// dropped.
    pub fn retain_live(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(Entry::is_live);
        before - self.entries.len()
    }
}

impl<'a> IntoIterator for &'a Selection {
    type Item = &'a Entry;
    type IntoIter = slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl IntoIterator for Selection {
    type Item = Entry;
    type IntoIter = std::vec::IntoIter<Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutSpec;
    use crate::store::BookStore;
    use proptest::prelude::*;
    use tally_types::LayoutKind;

    fn populated() -> BookStore {
        let mut store = BookStore::new();
        store.book::<i64>("/det/", "hits", LayoutSpec::single(), ()).unwrap();
        store.book::<i64>("/det/", "hit_energy", LayoutSpec::shared(), ()).unwrap();
        store.book::<u64>("/det/tracks/", "n", LayoutSpec::replicated_combined(2), ()).unwrap();
        store.book::<f64>("/run/", "weight", LayoutSpec::single(), ()).unwrap();
        store.book::<u64>("/run/", "hits", LayoutSpec::shared(), ()).unwrap();
        store
    }

    fn names(selection: &Selection) -> Vec<String> {
        selection.keys().map(EntryKey::full_name).collect()
    }

    #[test]
    fn selection_keeps_booking_order() {
        let store = populated();
        let sel = store.find(&Condition::name_matches("hit.*").unwrap());
        assert_eq!(names(&sel), ["/det/hits", "/det/hit_energy", "/run/hits"]);
    }

    #[test]
    fn sub_selection_intersects_by_default() {
        let store = populated();
        let det = store.find(&Condition::path_matches("/det/.*").unwrap());
        let det_u64 = det.find(&Condition::type_is::<u64>());
        assert_eq!(names(&det_u64), ["/det/tracks/n"]);
        assert_eq!(
            det_u64.condition().to_string(),
            "(path ~ /^(?:/det/.*)$/ && type == u64)"
        );
    }

    #[test]
    fn only_child_replaces_condition_within_view() {
        let store = populated();
        let det = store.find(&Condition::path_equals("/det/"));
        let shared = det.find_with(
            &Condition::layout_equals(LayoutKind::SharedBuffered),
            ComposeStrategy::OnlyChild,
        );
        // Still a subset of the parent's entries.
        assert_eq!(names(&shared), ["/det/hit_energy"]);
        assert!(matches!(shared.condition(), Condition::LayoutEquals(_)));
    }

    #[test]
    fn only_parent_rematerializes_after_removal() {
        let mut store = populated();
        let hits = store.find(&Condition::name_equals("hits"));
        assert_eq!(hits.len(), 2);

        let first = hits.get(0).unwrap().clone();
        store.remove(first.key()).unwrap();

        let refreshed = hits.find_with(&Condition::none(), ComposeStrategy::OnlyParent);
        assert_eq!(names(&refreshed), ["/run/hits"]);
    }

    #[test]
    fn view_removal_does_not_touch_store() {
        let store = populated();
        let mut all = store.selection();
        assert_eq!(all.len(), 5);

        let removed = all.remove(0).unwrap();
        assert_eq!(removed.key().full_name(), "/det/hits");
        assert_eq!(all.remove_range(1..3).unwrap(), 2);
        assert_eq!(names(&all), ["/det/hit_energy", "/run/hits"]);
        assert!(removed.is_live());
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn out_of_range_positions_are_reported() {
        let store = populated();
        let mut sel = store.find(&Condition::name_equals("hits"));
        assert!(matches!(
            sel.get(2),
            Err(StoreError::IndexOutOfRange { what: "selection", index: 2, len: 2 })
        ));
        assert!(sel.remove(5).is_err());
        assert!(sel.remove_range(1..3).is_err());
        assert_eq!(sel.len(), 2);
    }

    #[test]
    fn retain_live_drops_removed_entries() {
        let mut store = populated();
        let mut sel = store.selection();
        let victim = store.get("/run/", "weight").unwrap();
        store.remove(victim.key()).unwrap();
        assert_eq!(sel.retain_live(), 1);
        assert_eq!(sel.len(), 4);
    }

    fn arb_condition() -> impl Strategy<Value = Condition> {
        let leaf = prop_oneof![
            Just(Condition::all()),
            Just(Condition::name_equals("hits")),
            Just(Condition::name_matches("hit.*").unwrap()),
            Just(Condition::path_equals("/det/")),
            Just(Condition::path_matches("/det/.*").unwrap()),
            Just(Condition::type_is::<u64>()),
            Just(Condition::layout_equals(LayoutKind::SharedBuffered)),
        ];
        leaf.prop_recursive(3, 16, 2, |inner| {
            prop_oneof![
                (inner.clone(), inner.clone()).prop_map(|(a, b)| a.and(&b)),
                (inner.clone(), inner.clone()).prop_map(|(a, b)| a.or(&b)),
                inner.prop_map(|a| a.negate()),
            ]
        })
    }

    proptest! {
        #[test]
        fn chained_find_equals_conjunction(a in arb_condition(), b in arb_condition()) {
            let store = populated();
            let chained = store.find(&a).find(&b);
            let joint = store.find(&a.and(&b));
            prop_assert_eq!(names(&chained), names(&joint));
        }
    }
}
