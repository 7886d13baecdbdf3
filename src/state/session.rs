use std::collections::HashSet;

use super::data::{ImageRecord, Progress, ViewMode};

/// Tag attached to a resolution request for the displayed image.
///
/// A result may only be committed to the display while
/// [`SessionStore::is_current`] still accepts its ticket.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayTicket {
    pub generation: u64,
    pub index: usize,
    pub record: ImageRecord,
}

/// The SessionStore owns the scanned image list, the navigation cursor
/// and the set of marked images.
///
/// Marks are stored by record id; positional indices are derived from the
/// current list. Replacing the list always clears marks and rewinds the
/// cursor, so a mark can never point at a record of an older scan.
#[derive(Debug, Default)]
pub struct SessionStore {
    images: Vec<ImageRecord>,
    cursor: usize,
    marked: HashSet<String>,
    mode: ViewMode,
    /// Bumped whenever the displayed record changes
    generation: u64,
}

impl SessionStore {
    /// Create an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically swap in a new image list.
    /// Resets the cursor, clears all marks and returns to browsing mode.
    pub fn replace_images(&mut self, images: Vec<ImageRecord>) {
        log::info!(
            "Replacing image list ({} -> {} images, {} marks dropped)",
            self.images.len(),
            images.len(),
            self.marked.len()
        );
        self.images = images;
        self.cursor = 0;
        self.marked.clear();
        self.mode = ViewMode::Browsing;
        self.bump_generation();
    }

    /// Move the cursor to `index`; ignored when out of range
    pub fn go_to(&mut self, index: usize) {
        if index >= self.images.len() || index == self.cursor {
            return;
        }
        self.cursor = index;
        self.bump_generation();
    }

    pub fn next(&mut self) {
        if self.can_go_next() {
            self.go_to(self.cursor + 1);
        }
    }

    pub fn prev(&mut self) {
        if self.can_go_prev() {
            self.go_to(self.cursor - 1);
        }
    }

    pub fn go_to_first(&mut self) {
        self.go_to(0);
    }

    pub fn go_to_last(&mut self) {
        if let Some(last) = self.images.len().checked_sub(1) {
            self.go_to(last);
        }
    }

    /// Flip the mark on the image at `index`; ignored when out of range
    pub fn toggle_mark(&mut self, index: usize) {
        let Some(record) = self.images.get(index) else {
            return;
        };
        if !self.marked.remove(&record.id) {
            self.marked.insert(record.id.clone());
        }
    }

    pub fn toggle_current_mark(&mut self) {
        self.toggle_mark(self.cursor);
    }

    pub fn clear_marks(&mut self) {
        self.marked.clear();
    }

    /// Switch to the single-image viewer. Returns false for an empty list.
    pub fn enter_viewer(&mut self) -> bool {
        if self.images.is_empty() {
            return false;
        }
        self.mode = ViewMode::Viewing;
        true
    }

    pub fn exit_viewer(&mut self) {
        self.mode = ViewMode::Browsing;
    }

    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The record under the cursor, or None for an empty session
    pub fn current_image(&self) -> Option<&ImageRecord> {
        self.images.get(self.cursor)
    }

    /// The record right after the cursor, if any
    pub fn peek_next(&self) -> Option<&ImageRecord> {
        self.images.get(self.cursor + 1)
    }

    pub fn can_go_next(&self) -> bool {
        self.cursor + 1 < self.images.len()
    }

    pub fn can_go_prev(&self) -> bool {
        self.cursor > 0
    }

    /// 1-based position for display; `{0, 0}` when empty
    pub fn progress(&self) -> Progress {
        if self.images.is_empty() {
            return Progress::default();
        }
        Progress {
            current: self.cursor + 1,
            total: self.images.len(),
        }
    }

    pub fn is_marked(&self, index: usize) -> bool {
        self.images
            .get(index)
            .is_some_and(|record| self.marked.contains(&record.id))
    }

    pub fn marked_count(&self) -> usize {
        self.marked.len()
    }

    /// Marked positions in ascending order
    pub fn marked_indices(&self) -> Vec<usize> {
        self.images
            .iter()
            .enumerate()
            .filter(|(_, record)| self.marked.contains(&record.id))
            .map(|(index, _)| index)
            .collect()
    }

    /// Marked records in ascending index order
    pub fn marked_images(&self) -> Vec<ImageRecord> {
        self.marked_indices()
            .into_iter()
            .map(|index| self.images[index].clone())
            .collect()
    }

    /// Ticket for resolving the record under the cursor
    pub fn display_ticket(&self) -> Option<DisplayTicket> {
        self.current_image().map(|record| DisplayTicket {
            generation: self.generation,
            index: self.cursor,
            record: record.clone(),
        })
    }

    /// Whether a ticket still describes what is on screen
    pub fn is_current(&self, ticket: &DisplayTicket) -> bool {
        ticket.generation == self.generation
    }

    fn bump_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}
