use serde::Deserialize;

/// The mutable fields of an expense, as submitted on create and update.
///
/// Any `id` in the payload is ignored; fields left out default to empty/zero.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ExpenseCommand {
    pub title: String,
    pub amount: f64,
    pub note: String,
    pub tags: Vec<String>,
}
