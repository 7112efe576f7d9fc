use serde::{Deserialize, Serialize};

use super::Timestamp;

/// One live holder of a resource, as recorded in its resource index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
    pub user_id: String,
    /// When this holder's lock lapses (Unix epoch milliseconds)
    pub expires_at: Timestamp,
}

/// Number of stale entries reaped by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Holders removed from the resource index
    pub resource_entries: usize,
    /// Resource ids removed from the type index
    pub type_entries: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.resource_entries + self.type_entries
    }
}
