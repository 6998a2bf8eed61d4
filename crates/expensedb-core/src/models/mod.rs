pub mod read;
pub mod write;

/// Server-assigned expense identifier.
pub type ExpenseId = i64;
