use crate::models::{read::Expense, write::ExpenseCommand, ExpenseId};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{0}")]
    Other(String),
    #[error("expense not found: {0}")]
    NotFound(ExpenseId),
    #[error("invalid stored value: {0}")]
    Corrupt(String),
}

pub trait StorageBackend: Send + Sync {
    /// Every row, in whatever order the store yields them.
    fn list_expenses(&self) -> Result<Vec<Expense>, StorageError>;
    fn get_expense(&self, id: ExpenseId) -> Result<Expense, StorageError>;
    /// Inserts a new row; the store assigns the id.
    fn insert_expense(&self, command: &ExpenseCommand) -> Result<Expense, StorageError>;
    /// Overwrites every mutable field. Matching no row is not an error.
    fn update_expense(
        &self,
        id: ExpenseId,
        command: &ExpenseCommand,
    ) -> Result<Expense, StorageError>;
}
