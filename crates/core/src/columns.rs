//! Side-by-side generation columns and the board that owns them.
//!
//! A [`ColumnBoard`] holds one [`GenerationColumn`] per comparison slot.
//! The board enforces two invariants on every mutation:
//!
//! - it never becomes empty (removing the last column is rejected), and
//! - exactly one column is selected.
//!
//! Streaming state (`is_generating`, `error`) lives on the column but is
//! ephemeral: nothing here is ever persisted.

use serde::Serialize;

use crate::error::CoreError;
use crate::types::DbId;

/// Model used when a board is created without any model list.
pub const DEFAULT_MODEL_ID: &str = "default-model";

/// One streaming-generation slot bound to a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationColumn {
    pub id: DbId,
    pub model_id: String,
    /// Append-only while a stream is live; cleared when a new run begins.
    pub content: String,
    pub is_generating: bool,
    pub is_selected: bool,
    /// Set when the last run ended with a transport or remote error.
    pub error: Option<String>,
}

impl GenerationColumn {
    fn new(id: DbId, model_id: String) -> Self {
        Self {
            id,
            model_id,
            content: String::new(),
            is_generating: false,
            is_selected: false,
            error: None,
        }
    }
}

/// Ordered collection of columns for one comparison view.
#[derive(Debug, Clone)]
pub struct ColumnBoard {
    columns: Vec<GenerationColumn>,
    next_id: DbId,
}

impl ColumnBoard {
    /// Build a board with one column per model, the first one selected.
    ///
    /// An empty model list yields a single [`DEFAULT_MODEL_ID`] column.
    pub fn new<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut board = Self {
            columns: Vec::new(),
            next_id: 1,
        };
        for model in models {
            board.add(model);
        }
        if board.columns.is_empty() {
            board.add(DEFAULT_MODEL_ID);
        }
        board
    }

    pub fn columns(&self) -> &[GenerationColumn] {
        &self.columns
    }

    pub fn ids(&self) -> Vec<DbId> {
        self.columns.iter().map(|c| c.id).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, id: DbId) -> Option<&GenerationColumn> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn selected(&self) -> Option<&GenerationColumn> {
        self.columns.iter().find(|c| c.is_selected)
    }

    /// Append a new idle column. The first column on a board is selected.
    pub fn add(&mut self, model_id: impl Into<String>) -> DbId {
        let id = self.next_id;
        self.next_id += 1;
        let mut column = GenerationColumn::new(id, model_id.into());
        column.is_selected = self.columns.is_empty();
        self.columns.push(column);
        id
    }

    /// Remove a column. The last remaining column cannot be removed.
    ///
    /// If the removed column was selected, selection moves to the first
    /// remaining column.
    pub fn remove(&mut self, id: DbId) -> Result<GenerationColumn, CoreError> {
        let index = self.index_of(id)?;
        if self.columns.len() == 1 {
            return Err(CoreError::Conflict(
                "At least one generation column must remain".to_string(),
            ));
        }
        let removed = self.columns.remove(index);
        if removed.is_selected {
            self.columns[0].is_selected = true;
        }
        Ok(removed)
    }

    /// Select `id` and deselect every other column in one step.
    pub fn select(&mut self, id: DbId) -> Result<(), CoreError> {
        self.index_of(id)?;
        for column in &mut self.columns {
            column.is_selected = column.id == id;
        }
        Ok(())
    }

    pub fn set_model(&mut self, id: DbId, model_id: impl Into<String>) -> Result<(), CoreError> {
        let column = self.get_mut(id)?;
        column.model_id = model_id.into();
        Ok(())
    }

    /// Mark a column as generating and clear its previous output.
    pub fn begin(&mut self, id: DbId) -> Result<&GenerationColumn, CoreError> {
        let column = self.get_mut(id)?;
        column.content.clear();
        column.error = None;
        column.is_generating = true;
        Ok(column)
    }

    /// Append one streamed increment. Returns `false` for unknown columns.
    pub fn append(&mut self, id: DbId, chunk: &str) -> bool {
        match self.get_mut(id) {
            Ok(column) => {
                column.content.push_str(chunk);
                true
            }
            Err(_) => false,
        }
    }

    pub fn finish(&mut self, id: DbId) {
        if let Ok(column) = self.get_mut(id) {
            column.is_generating = false;
        }
    }

    pub fn fail(&mut self, id: DbId, reason: impl Into<String>) {
        if let Ok(column) = self.get_mut(id) {
            column.is_generating = false;
            column.error = Some(reason.into());
        }
    }

    /// Stop a column without recording an error (user cancellation).
    pub fn halt(&mut self, id: DbId) {
        self.finish(id);
    }

    fn index_of(&self, id: DbId) -> Result<usize, CoreError> {
        self.columns
            .iter()
            .position(|c| c.id == id)
            .ok_or(CoreError::NotFound {
                entity: "generation_column",
                id,
            })
    }

    fn get_mut(&mut self, id: DbId) -> Result<&mut GenerationColumn, CoreError> {
        let index = self.index_of(id)?;
        Ok(&mut self.columns[index])
    }
}

impl Default for ColumnBoard {
    fn default() -> Self {
        Self::new(std::iter::empty::<String>())
    }
}
