use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc, RwLock,
    },
};

use expensedb_core::{Expense, ExpenseCommand, ExpenseId};

use crate::{postgres_storage::PostgresStorage, sqlite_storage::SqliteStorage};

// Re-export core storage types so existing code using crate::storage::* still works
pub use expensedb_core::storage::{StorageBackend, StorageError};

/// Opens the backend named by a connection URL and ensures its schema exists.
///
/// Accepted forms: `postgres://...`, `postgresql://...`, `sqlite://<path>`,
/// `sqlite::memory:` and `memory://`.
pub fn open_storage(url: &str) -> Result<Arc<dyn StorageBackend>, StorageError> {
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        Ok(Arc::new(PostgresStorage::new(url)?))
    } else if url == "sqlite::memory:" {
        Ok(Arc::new(SqliteStorage::new(":memory:")?))
    } else if let Some(path) = url.strip_prefix("sqlite://") {
        Ok(Arc::new(SqliteStorage::new(path)?))
    } else if url.starts_with("memory://") {
        Ok(Arc::new(InMemoryStorage::new()))
    } else {
        Err(StorageError::Other(format!("unsupported database URL: {}", url)))
    }
}

pub struct InMemoryStorage {
    expenses: RwLock<BTreeMap<ExpenseId, Expense>>,
    sequence_counter: AtomicI64,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            expenses: RwLock::new(BTreeMap::new()),
            sequence_counter: AtomicI64::new(1),
        }
    }

    fn next_sequence(&self) -> ExpenseId {
        self.sequence_counter.fetch_add(1, Ordering::SeqCst)
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Other("in-memory store lock poisoned".to_string())
}

impl StorageBackend for InMemoryStorage {
    fn list_expenses(&self) -> Result<Vec<Expense>, StorageError> {
        let expenses = self.expenses.read().map_err(poisoned)?;
        Ok(expenses.values().cloned().collect())
    }

    fn get_expense(&self, id: ExpenseId) -> Result<Expense, StorageError> {
        let expenses = self.expenses.read().map_err(poisoned)?;
        expenses.get(&id).cloned().ok_or(StorageError::NotFound(id))
    }

    fn insert_expense(&self, command: &ExpenseCommand) -> Result<Expense, StorageError> {
        let mut expenses = self.expenses.write().map_err(poisoned)?;
        let expense = Expense::from_command(self.next_sequence(), command);
        expenses.insert(expense.id, expense.clone());
        Ok(expense)
    }

    fn update_expense(
        &self,
        id: ExpenseId,
        command: &ExpenseCommand,
    ) -> Result<Expense, StorageError> {
        let mut expenses = self.expenses.write().map_err(poisoned)?;
        let expense = Expense::from_command(id, command);
        match expenses.get_mut(&id) {
            Some(existing) => *existing = expense.clone(),
            None => tracing::warn!(id, "update matched no expense"),
        }
        Ok(expense)
    }
}
