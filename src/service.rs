use std::sync::Arc;

use thiserror::Error;

use crate::storage::{StorageBackend, StorageError};
use expensedb_core::{Expense, ExpenseCommand, ExpenseId};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid expense id '{raw}': {reason}")]
    InvalidId { raw: String, reason: String },
    #[error("expense {0} not found")]
    NotFound(ExpenseId),
    #[error("storage error: {0}")]
    Storage(StorageError),
    #[error("storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<StorageError> for ServiceError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(id) => ServiceError::NotFound(id),
            other => ServiceError::Storage(other),
        }
    }
}

/// Bridges request payloads to the storage backend.
///
/// Backends are blocking, so every storage call is moved onto the blocking pool.
#[derive(Clone)]
pub struct ExpenseService {
    storage: Arc<dyn StorageBackend>,
}

impl ExpenseService {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    pub fn parse_id(raw: &str) -> Result<ExpenseId, ServiceError> {
        raw.parse::<ExpenseId>().map_err(|e| ServiceError::InvalidId {
            raw: raw.to_string(),
            reason: e.to_string(),
        })
    }

    pub async fn list(&self) -> Result<Vec<Expense>, ServiceError> {
        self.run(|storage| storage.list_expenses()).await
    }

    pub async fn get(&self, raw_id: &str) -> Result<Expense, ServiceError> {
        let id = Self::parse_id(raw_id)?;
        self.run(move |storage| storage.get_expense(id)).await
    }

    pub async fn create(&self, command: ExpenseCommand) -> Result<Expense, ServiceError> {
        let expense = self.run(move |storage| storage.insert_expense(&command)).await?;
        tracing::info!(id = expense.id, "expense created");
        Ok(expense)
    }

    pub async fn update(
        &self,
        raw_id: &str,
        command: ExpenseCommand,
    ) -> Result<Expense, ServiceError> {
        let id = Self::parse_id(raw_id)?;
        let expense = self.run(move |storage| storage.update_expense(id, &command)).await?;
        tracing::info!(id, "expense updated");
        Ok(expense)
    }

    async fn run<T, F>(&self, op: F) -> Result<T, ServiceError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn StorageBackend) -> Result<T, StorageError> + Send + 'static,
    {
        let storage = self.storage.clone();
        let result = tokio::task::spawn_blocking(move || op(storage.as_ref())).await?;
        Ok(result?)
    }
}
