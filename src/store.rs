//! The ordered page sequence owned by one editing session.
//!
//! `PageStore` is created explicitly per session and handed by reference to
//! the selection, ordering, ingestion and export operations. All mutation
//! goes through `&mut self`, so no caller can observe a half-applied change.

use crate::model::{PageId, PageRecord};

/// Ordered collection of page records; order is display and export order.
#[derive(Debug, Clone, Default)]
pub struct PageStore {
    pages: Vec<PageRecord>,
}

impl PageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// True when the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// All records in display order.
    pub fn pages(&self) -> &[PageRecord] {
        &self.pages
    }

    /// Iterate records in display order.
    pub fn iter(&self) -> std::slice::Iter<'_, PageRecord> {
        self.pages.iter()
    }

    /// Record ids in display order.
    pub fn ids(&self) -> Vec<PageId> {
        self.pages.iter().map(PageRecord::id).collect()
    }

    /// Look up a record by id.
    pub fn get(&self, id: PageId) -> Option<&PageRecord> {
        self.pages.iter().find(|p| p.id() == id)
    }

    /// Current display index of `id`.
    pub fn position(&self, id: PageId) -> Option<usize> {
        self.pages.iter().position(|p| p.id() == id)
    }

    /// Record at display index `index`.
    pub fn at(&self, index: usize) -> Option<&PageRecord> {
        self.pages.get(index)
    }

    /// Append a record at the end of the sequence.
    ///
    /// Returns `false` (and drops the record) if its id is already present.
    pub fn append(&mut self, record: PageRecord) -> bool {
        if self.position(record.id()).is_some() {
            log::warn!("Refusing to append duplicate page id {}", record.id());
            return false;
        }
        self.pages.push(record);
        true
    }

    /// Remove a single record by id.
    pub fn remove_page(&mut self, id: PageId) -> Option<PageRecord> {
        let index = self.position(id)?;
        Some(self.pages.remove(index))
    }

    /// Remove every selected record, keeping survivors in relative order.
    ///
    /// Returns the number of records removed.
    pub fn remove_selected_pages(&mut self) -> usize {
        let before = self.pages.len();
        self.pages.retain(|p| !p.is_selected());
        let removed = before - self.pages.len();
        log::debug!("Removed {} selected page(s), {} remain", removed, self.pages.len());
        removed
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.pages.clear();
    }

    /// `(selected, total)` counts.
    pub fn summary(&self) -> (usize, usize) {
        (self.selected_count(), self.pages.len())
    }

    pub(crate) fn pages_mut(&mut self) -> &mut Vec<PageRecord> {
        &mut self.pages
    }
}

impl<'a> IntoIterator for &'a PageStore {
    type Item = &'a PageRecord;
    type IntoIter = std::slice::Iter<'a, PageRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.iter()
    }
}
