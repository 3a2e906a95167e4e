use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, GroupId};

pub type ContributionId = Uuid;

/// Opaque caller-owned participant identity. Identity and profile data live
/// outside this system; we only relate contributions and settlements to it.
pub type ParticipantId = String;

/// One participant's payment toward one expense group. A participant has at
/// most one contribution per group; editing an amount mutates the existing
/// record rather than appending a new one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contribution {
    pub id: ContributionId,
    pub group_id: GroupId,
    pub participant_id: ParticipantId,
    /// Amount paid in cents (never negative)
    pub amount_cents: Cents,
    /// Creation encounter order within the group. Settlement recomputation
    /// walks contributions in this order, which keeps it deterministic.
    pub position: i64,
    /// When the contribution was recorded
    pub recorded_at: DateTime<Utc>,
}

impl Contribution {
    pub fn new(
        group_id: GroupId,
        participant_id: impl Into<ParticipantId>,
        amount_cents: Cents,
        position: i64,
    ) -> Self {
        assert!(amount_cents >= 0, "Contribution amount cannot be negative");
        Self {
            id: Uuid::new_v4(),
            group_id,
            participant_id: participant_id.into(),
            amount_cents,
            position,
            recorded_at: Utc::now(),
        }
    }
}
