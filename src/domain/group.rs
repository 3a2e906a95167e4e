use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, fair_share};

/// Stable identity of an expense group, assigned at creation. Deliberately
/// not derived from any contribution id, so removing a participant never
/// threatens the group key.
pub type GroupId = Uuid;

/// Denormalized per-group aggregate: total paid and number of contributions.
/// Kept equal to the live aggregate over the group's contributions by every
/// mutation, inside the same transaction. It exists for fast lookup, not as
/// an independent source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group_id: GroupId,
    pub total_cents: Cents,
    pub participant_count: i64,
    pub created_at: DateTime<Utc>,
}

impl GroupSummary {
    pub fn new(group_id: GroupId, total_cents: Cents, participant_count: i64) -> Self {
        assert!(participant_count > 0, "A group needs at least one participant");
        Self {
            group_id,
            total_cents,
            participant_count,
            created_at: Utc::now(),
        }
    }

    /// The amount each participant should have paid for an even split.
    pub fn fair_share(&self) -> Cents {
        fair_share(self.total_cents, self.participant_count)
    }
}
