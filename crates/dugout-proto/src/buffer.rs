//! Sliding window over the segment catalog.
//!
//! The window is always a prefix of the catalog.  It starts at one batch and
//! grows by one batch at a time; it never shrinks, reorders or repeats.

use crate::protocol::SegmentId;

/// Identifiers that extend `window` by up to `batch` items.  Empty when the
/// window already spans the catalog.
pub fn next_batch(window: &[SegmentId], catalog: &[SegmentId], batch: usize) -> Vec<SegmentId> {
    let start = window.len().min(catalog.len());
    let end = (start + batch).min(catalog.len());
    catalog[start..end].to_vec()
}

/// A growth that has been requested but not yet applied.
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthTicket {
    /// Window length the batch was cut for.
    pub start: usize,
    pub batch: Vec<SegmentId>,
}

#[derive(Debug, Clone, Default)]
pub struct SegmentBuffer {
    catalog: Vec<SegmentId>,
    window: Vec<SegmentId>,
    batch_size: usize,
    growth_pending: bool,
}

impl SegmentBuffer {
    pub fn new(batch_size: usize) -> Self {
        Self {
            catalog: Vec::new(),
            window: Vec::new(),
            batch_size: batch_size.max(1),
            growth_pending: false,
        }
    }

    /// Install the catalog and open the initial window.
    pub fn load_catalog(&mut self, catalog: Vec<SegmentId>) {
        self.catalog = catalog;
        self.window = next_batch(&[], &self.catalog, self.batch_size);
        self.growth_pending = false;
    }

    pub fn window(&self) -> &[SegmentId] {
        &self.window
    }

    pub fn get(&self, idx: usize) -> Option<&SegmentId> {
        self.window.get(idx)
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn catalog_len(&self) -> usize {
        self.catalog.len()
    }

    /// True once the window covers the whole catalog.
    pub fn is_exhausted(&self) -> bool {
        self.window.len() >= self.catalog.len()
    }

    pub fn growth_pending(&self) -> bool {
        self.growth_pending
    }

    /// Cut the next batch.  Returns `None` while a growth is already in flight
    /// or when there is nothing left to add, so repeated triggers near the end
    /// of the window collapse into one growth.
    pub fn request_growth(&mut self) -> Option<GrowthTicket> {
        if self.growth_pending || self.is_exhausted() {
            return None;
        }
        let batch = next_batch(&self.window, &self.catalog, self.batch_size);
        if batch.is_empty() {
            return None;
        }
        self.growth_pending = true;
        Some(GrowthTicket {
            start: self.window.len(),
            batch,
        })
    }

    /// Apply a growth.  A ticket cut for a different window length is dropped.
    /// Returns the number of identifiers appended.
    pub fn complete_growth(&mut self, ticket: GrowthTicket) -> usize {
        self.growth_pending = false;
        if ticket.start != self.window.len() {
            return 0;
        }
        let added = ticket.batch.len();
        self.window.extend(ticket.batch);
        added
    }
}
