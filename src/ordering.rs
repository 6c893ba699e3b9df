//! Order engine: stepwise moves and drag-drop relocation.
//!
//! Two primitives with different semantics:
//!
//! - [`PageStore::move_pages_up`] / [`PageStore::move_pages_down`] shift each
//!   target one position by a single adjacent swap. A contiguous block moves
//!   as a block; a scattered selection moves each member by at most one step.
//! - [`PageStore::reorder`] removes the record at `from` and reinserts it at
//!   `to` in the shortened sequence (list-splice semantics).
//!
//! Empty id sets, unknown ids and out-of-range indices are no-ops.

use crate::model::PageId;
use crate::store::PageStore;

/// Direction of a stepwise move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Toward index 0
    Up,
    /// Toward the last index
    Down,
}

impl PageStore {
    /// Move every record in `ids` one position toward the start.
    ///
    /// Returns `true` if the sequence changed.
    pub fn move_pages_up(&mut self, ids: &[PageId]) -> bool {
        self.move_pages(ids, Direction::Up)
    }

    /// Move every record in `ids` one position toward the end.
    ///
    /// Returns `true` if the sequence changed.
    pub fn move_pages_down(&mut self, ids: &[PageId]) -> bool {
        self.move_pages(ids, Direction::Down)
    }

    /// Stepwise move in `direction`.
    pub fn move_pages(&mut self, ids: &[PageId], direction: Direction) -> bool {
        if ids.is_empty() || self.is_empty() {
            return false;
        }

        // Process nearest-to-boundary first so a block does not collide with itself.
        let mut targets: Vec<(usize, PageId)> = ids
            .iter()
            .filter_map(|&id| self.position(id).map(|index| (index, id)))
            .collect();
        targets.sort_by_key(|&(index, _)| index);
        targets.dedup_by_key(|&mut (_, id)| id);
        if direction == Direction::Down {
            targets.reverse();
        }

        let last = self.len() - 1;
        let mut changed = false;
        for (_, id) in targets {
            // Earlier swaps shift positions; re-locate by identity.
            let Some(index) = self.position(id) else {
                continue;
            };
            let neighbour = match direction {
                Direction::Up if index > 0 => index - 1,
                Direction::Down if index < last => index + 1,
                _ => continue,
            };
            self.pages_mut().swap(index, neighbour);
            changed = true;
        }
        changed
    }

    /// Relocate the record at `from` so it ends up at index `to`.
    ///
    /// `to` is interpreted against the sequence after removal, matching
    /// drag-drop list semantics. Returns `true` if the sequence changed.
    pub fn reorder(&mut self, from: usize, to: usize) -> bool {
        let len = self.len();
        if from == to || from >= len || to >= len {
            return false;
        }
        let pages = self.pages_mut();
        let record = pages.remove(from);
        pages.insert(to, record);
        true
    }

    /// Relocate the record with `id` to index `to`.
    pub fn move_page_to(&mut self, id: PageId, to: usize) -> bool {
        match self.position(id) {
            Some(from) => self.reorder(from, to),
            None => false,
        }
    }
}
