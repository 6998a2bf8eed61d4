use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::storage::{StorageBackend, StorageError};
use expensedb_core::{Expense, ExpenseCommand, ExpenseId};

/// SQLite backend. SQLite has no array type, so tags are kept as a JSON array in a TEXT column.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(|e| StorageError::Other(e.to_string()))?;

        if path != ":memory:" {
            conn.execute_batch("PRAGMA journal_mode=WAL;")
                .map_err(|e| StorageError::Other(e.to_string()))?;
        }

        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        tracing::debug!(path, "SQLite storage ready");
        Ok(storage)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS expenses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT,
                amount REAL,
                note TEXT,
                tags TEXT
            );
            ",
        )
        .map_err(|e| StorageError::Other(e.to_string()))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Other("SQLite connection lock poisoned".to_string()))
    }
}

fn encode_tags(tags: &[String]) -> Result<String, StorageError> {
    serde_json::to_string(tags).map_err(|e| StorageError::Corrupt(e.to_string()))
}

fn decode_tags(raw: Option<String>) -> Result<Vec<String>, StorageError> {
    match raw {
        Some(s) if !s.is_empty() => {
            serde_json::from_str(&s).map_err(|e| StorageError::Corrupt(format!("tags: {}", e)))
        }
        _ => Ok(Vec::new()),
    }
}

// Raw row values; tags are decoded after the rusqlite borrow ends.
type RawRow = (i64, Option<String>, Option<f64>, Option<String>, Option<String>);

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn into_expense((id, title, amount, note, tags): RawRow) -> Result<Expense, StorageError> {
    Ok(Expense {
        id,
        title: title.unwrap_or_default(),
        amount: amount.unwrap_or_default(),
        note: note.unwrap_or_default(),
        tags: decode_tags(tags)?,
    })
}

impl StorageBackend for SqliteStorage {
    fn list_expenses(&self) -> Result<Vec<Expense>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, title, amount, note, tags FROM expenses")
            .map_err(|e| StorageError::Other(e.to_string()))?;
        let rows = stmt
            .query_map([], read_row)
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let mut result = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| StorageError::Other(e.to_string()))?;
            result.push(into_expense(raw)?);
        }
        Ok(result)
    }

    fn get_expense(&self, id: ExpenseId) -> Result<Expense, StorageError> {
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                "SELECT id, title, amount, note, tags FROM expenses WHERE id = ?1",
                params![id],
                read_row,
            )
            .optional()
            .map_err(|e| StorageError::Other(e.to_string()))?
            .ok_or(StorageError::NotFound(id))?;
        into_expense(raw)
    }

    fn insert_expense(&self, command: &ExpenseCommand) -> Result<Expense, StorageError> {
        let conn = self.conn()?;
        let tags = encode_tags(&command.tags)?;
        let raw = conn
            .query_row(
                "INSERT INTO expenses (title, amount, note, tags) VALUES (?1, ?2, ?3, ?4)
                 RETURNING id, title, amount, note, tags",
                params![command.title, command.amount, command.note, tags],
                read_row,
            )
            .map_err(|e| StorageError::Other(e.to_string()))?;
        into_expense(raw)
    }

    fn update_expense(
        &self,
        id: ExpenseId,
        command: &ExpenseCommand,
    ) -> Result<Expense, StorageError> {
        let conn = self.conn()?;
        let tags = encode_tags(&command.tags)?;
        let affected = conn
            .execute(
                "UPDATE expenses SET title = ?2, amount = ?3, note = ?4, tags = ?5 WHERE id = ?1",
                params![id, command.title, command.amount, command.note, tags],
            )
            .map_err(|e| StorageError::Other(e.to_string()))?;
        if affected == 0 {
            tracing::warn!(id, "SQLite update matched no expense");
        }
        Ok(Expense::from_command(id, command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(title: &str, amount: f64, tags: &[&str]) -> ExpenseCommand {
        ExpenseCommand {
            title: title.to_string(),
            amount,
            note: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_sqlite_basic_operations() {
        let storage = SqliteStorage::new(":memory:").unwrap();

        let created = storage
            .insert_expense(&command("strawberry smoothie", 79.0, &["food", "beverage"]))
            .unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(created.tags, vec!["food".to_string(), "beverage".to_string()]);

        let fetched = storage.get_expense(created.id).unwrap();
        assert_eq!(fetched, created);

        let all = storage.list_expenses().unwrap();
        assert_eq!(all, vec![created]);
    }

    #[test]
    fn test_sqlite_get_missing() {
        let storage = SqliteStorage::new(":memory:").unwrap();
        assert!(matches!(storage.get_expense(3), Err(StorageError::NotFound(3))));
    }

    #[test]
    fn test_sqlite_update_replaces_fields() {
        let storage = SqliteStorage::new(":memory:").unwrap();
        let created = storage.insert_expense(&command("tea", 20.0, &["beverage"])).unwrap();

        let replacement = command("apple smoothie", 89.0, &[]);
        let updated = storage.update_expense(created.id, &replacement).unwrap();
        assert_eq!(updated.id, created.id);

        let fetched = storage.get_expense(created.id).unwrap();
        assert_eq!(fetched.title, "apple smoothie");
        assert_eq!(fetched.amount, 89.0);
        assert!(fetched.tags.is_empty());
    }

    #[test]
    fn test_sqlite_update_missing_row() {
        let storage = SqliteStorage::new(":memory:").unwrap();
        let updated = storage.update_expense(99, &command("ghost", 1.0, &[])).unwrap();
        assert_eq!(updated.id, 99);
        assert!(storage.list_expenses().unwrap().is_empty());
    }

    #[test]
    fn test_sqlite_null_columns_read_as_empty() {
        let storage = SqliteStorage::new(":memory:").unwrap();
        storage
            .conn()
            .unwrap()
            .execute("INSERT INTO expenses (title) VALUES ('bare')", [])
            .unwrap();
        let fetched = storage.get_expense(1).unwrap();
        assert_eq!(fetched.note, "");
        assert_eq!(fetched.amount, 0.0);
        assert!(fetched.tags.is_empty());
    }
}
