use serde::{Deserialize, Serialize, Serializer};

use super::{write::ExpenseCommand, ExpenseId};

/// A persisted expense row. Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub title: String,
    #[serde(serialize_with = "serialize_amount")]
    pub amount: f64,
    pub note: String,
    pub tags: Vec<String>,
}

impl Expense {
    pub fn from_command(id: ExpenseId, command: &ExpenseCommand) -> Self {
        Self {
            id,
            title: command.title.clone(),
            amount: command.amount,
            note: command.note.clone(),
            tags: command.tags.clone(),
        }
    }
}

/// Whole amounts are written without a fractional part (`89`, not `89.0`).
fn serialize_amount<S: Serializer>(amount: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if amount.is_finite() && amount.fract() == 0.0 && amount.abs() < 1e15 {
        serializer.serialize_i64(*amount as i64)
    } else {
        serializer.serialize_f64(*amount)
    }
}
