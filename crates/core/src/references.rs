//! Positionally ordered reference inputs for video generation.
//!
//! The remote model resolves positional placeholders in a prompt ("the
//! first item", "the second item") against `ordinal_position`, so a
//! [`ReferenceList`] keeps positions contiguous (`0..n`) after every
//! insert, removal and reorder.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

/// Media kind of a reference item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Video,
    Image,
}

/// A single input artifact supplied to a generation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceItem {
    pub id: DbId,
    pub source_type: SourceType,
    pub url: String,
    pub ordinal_position: u32,
}

impl ReferenceItem {
    /// A standalone item (e.g. a first or last frame) at position 0.
    pub fn image(id: DbId, url: impl Into<String>) -> Self {
        Self {
            id,
            source_type: SourceType::Image,
            url: url.into(),
            ordinal_position: 0,
        }
    }
}

/// Ordered reference items with contiguous ordinal positions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ReferenceItem>", into = "Vec<ReferenceItem>")]
pub struct ReferenceList {
    items: Vec<ReferenceItem>,
}

impl ReferenceList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[ReferenceItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn video_count(&self) -> usize {
        self.count_of(SourceType::Video)
    }

    pub fn image_count(&self) -> usize {
        self.count_of(SourceType::Image)
    }

    /// Append an item at the end of the list.
    pub fn push(&mut self, id: DbId, source_type: SourceType, url: impl Into<String>) {
        let ordinal_position = self.items.len() as u32;
        self.items.push(ReferenceItem {
            id,
            source_type,
            url: url.into(),
            ordinal_position,
        });
    }

    /// Remove an item by id, renumbering everything after it.
    pub fn remove(&mut self, id: DbId) -> Option<ReferenceItem> {
        let index = self.items.iter().position(|item| item.id == id)?;
        let removed = self.items.remove(index);
        self.renumber();
        Some(removed)
    }

    /// Move the item at position `from` to position `to`.
    ///
    /// All positions are renumbered before this returns, so no caller ever
    /// observes a gap or a duplicate ordinal.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<(), CoreError> {
        let len = self.items.len();
        if from >= len || to >= len {
            return Err(CoreError::Validation(format!(
                "Reference position out of range (from {from}, to {to}, len {len})"
            )));
        }
        let item = self.items.remove(from);
        self.items.insert(to, item);
        self.renumber();
        Ok(())
    }

    /// The item a positional placeholder with 0-based index `ordinal` refers to.
    pub fn resolve_placeholder(&self, ordinal: u32) -> Option<&ReferenceItem> {
        self.items.get(ordinal as usize)
    }

    fn count_of(&self, source_type: SourceType) -> usize {
        self.items
            .iter()
            .filter(|item| item.source_type == source_type)
            .count()
    }

    fn renumber(&mut self) {
        for (position, item) in self.items.iter_mut().enumerate() {
            item.ordinal_position = position as u32;
        }
    }
}

impl From<Vec<ReferenceItem>> for ReferenceList {
    /// Orders by the incoming positions, then closes any gaps.
    fn from(mut items: Vec<ReferenceItem>) -> Self {
        items.sort_by_key(|item| item.ordinal_position);
        let mut list = Self { items };
        list.renumber();
        list
    }
}

impl From<ReferenceList> for Vec<ReferenceItem> {
    fn from(list: ReferenceList) -> Self {
        list.items
    }
}
