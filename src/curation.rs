//! In-memory curation of the current diagnosis suggestions.
//!
//! Operations address items by surrogate id. Invariant: at most one
//! item is principal, and setting a principal moves it to the head of
//! the list while the rest keep their relative order.

use thiserror::Error;

use crate::models::DiagnosisSuggestion;

#[derive(Debug, Error)]
pub enum CurationError {
    #[error("No diagnosis with id {0} in the current list")]
    UnknownDiagnosis(String),
}

/// The current, user-editable list of diagnosis suggestions.
#[derive(Debug, Default)]
pub struct DiagnosisList {
    items: Vec<DiagnosisSuggestion>,
}

impl DiagnosisList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list (fresh orchestration results or a history
    /// reload). Flags arrive as given; no reordering is applied.
    pub fn replace(&mut self, items: Vec<DiagnosisSuggestion>) {
        self.items = items;
    }

    pub fn items(&self) -> &[DiagnosisSuggestion] {
        &self.items
    }

    pub fn into_items(self) -> Vec<DiagnosisSuggestion> {
        self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Mark one suggestion as the principal diagnosis.
    ///
    /// Clears the flag everywhere else and moves the target to index 0,
    /// preserving the relative order of the remainder. Idempotent.
    pub fn set_principal(&mut self, id: &str) -> Result<(), CurationError> {
        let index = self.index_of(id)?;

        for item in &mut self.items {
            item.is_principal = false;
        }
        let mut principal = self.items.remove(index);
        principal.is_principal = true;
        self.items.insert(0, principal);
        Ok(())
    }

    /// Flip the selection flag on exactly one suggestion.
    pub fn toggle_selected(&mut self, id: &str) -> Result<(), CurationError> {
        let index = self.index_of(id)?;
        self.items[index].is_selected = !self.items[index].is_selected;
        Ok(())
    }

    /// Move `source_id` to occupy `target_id`'s index, shifting the
    /// items in between by one. Dropping an item on itself is a no-op.
    pub fn reorder(&mut self, source_id: &str, target_id: &str) -> Result<(), CurationError> {
        if source_id == target_id {
            return Ok(());
        }
        let source = self.index_of(source_id)?;
        let target = self.index_of(target_id)?;

        let item = self.items.remove(source);
        self.items.insert(target, item);
        Ok(())
    }

    /// Empty the list. Concepts and summary are unaffected — they live
    /// elsewhere.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    fn index_of(&self, id: &str) -> Result<usize, CurationError> {
        self.items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| CurationError::UnknownDiagnosis(id.to_string()))
    }
}
