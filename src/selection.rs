//! Selection engine: maintains the selected subset of the page sequence.
//!
//! Selection only ever touches the `selected` flag. Order and provenance are
//! never changed here.
//!
//! ## Area selection policy
//!
//! [`PageStore::select_by_area`] uses additive assignment: the mode is applied
//! to records whose id is in the supplied set and every other record keeps its
//! current flag. Area selection never replaces the whole selection.

use crate::model::{PageId, PageRecord};
use crate::store::PageStore;
use std::collections::HashSet;

/// How an area selection is applied to the records it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AreaMode {
    /// Mark covered records selected
    #[default]
    Select,
    /// Mark covered records unselected
    Deselect,
    /// Flip covered records
    Toggle,
}

impl AreaMode {
    fn apply(self, current: bool) -> bool {
        match self {
            AreaMode::Select => true,
            AreaMode::Deselect => false,
            AreaMode::Toggle => !current,
        }
    }

    /// Past-tense verb for notices.
    pub fn verb(self) -> &'static str {
        match self {
            AreaMode::Select => "selected",
            AreaMode::Deselect => "deselected",
            AreaMode::Toggle => "toggled",
        }
    }
}

impl PageStore {
    /// Flip the selection flag of one record.
    ///
    /// Returns the new flag, or `None` when `id` is not in the store.
    pub fn toggle(&mut self, id: PageId) -> Option<bool> {
        let page = self.pages_mut().iter_mut().find(|p| p.id() == id)?;
        page.selected = !page.selected;
        Some(page.selected)
    }

    /// Select every record. Returns the selected count.
    pub fn select_all(&mut self) -> usize {
        self.set_all(true)
    }

    /// Deselect every record. Returns the selected count (always zero).
    pub fn deselect_all(&mut self) -> usize {
        self.set_all(false)
    }

    fn set_all(&mut self, selected: bool) -> usize {
        for page in self.pages_mut().iter_mut() {
            page.selected = selected;
        }
        self.selected_count()
    }

    /// Apply `mode` to every record whose id is in `ids`.
    ///
    /// Ids not present in the store are ignored. Returns how many records
    /// the set matched.
    pub fn select_by_area(&mut self, ids: &[PageId], mode: AreaMode) -> usize {
        let wanted: HashSet<PageId> = ids.iter().copied().collect();
        let mut matched = 0;
        for page in self.pages_mut().iter_mut() {
            if wanted.contains(&page.id()) {
                page.selected = mode.apply(page.selected);
                matched += 1;
            }
        }
        matched
    }

    /// Number of selected records.
    pub fn selected_count(&self) -> usize {
        self.iter().filter(|p| p.is_selected()).count()
    }

    /// Selected records in display order.
    pub fn selected_pages(&self) -> Vec<&PageRecord> {
        self.iter().filter(|p| p.is_selected()).collect()
    }

    /// Ids of the selected records in display order.
    pub fn selected_ids(&self) -> Vec<PageId> {
        self.iter().filter(|p| p.is_selected()).map(PageRecord::id).collect()
    }
}
