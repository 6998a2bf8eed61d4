//! Core types and traits for ExpenseDB storage backends.
//!
//! This crate provides the `StorageBackend` trait and the expense models,
//! enabling pluggable storage implementations outside the server crate.

pub mod models;
pub mod storage;

// Re-export key types at crate root for convenience
pub use models::ExpenseId;
pub use models::read::Expense;
pub use models::write::ExpenseCommand;
pub use storage::{StorageBackend, StorageError};
