//! Outcome of an all-or-nothing merge.

use serde::Serialize;
use thematic_core::types::DbId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MergeOutcome {
    /// Committed; carries the number of rows moved onto the target.
    Merged(u64),
    /// Rolled back before any change because this id does not exist.
    Missing(DbId),
    /// Rolled back before any change: moving the rows would leave two
    /// pending proposals, or two annotations by one author, with the same
    /// label on these cells.
    Colliding(Vec<DbId>),
}
