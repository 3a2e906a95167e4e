use serde::{Deserialize, Serialize};

use super::{Cents, GroupId, ParticipantId};

/// One directed debt edge: `payer` owes `payee` this amount. The settlement
/// rows of a group are fully derived state: they are replaced wholesale
/// whenever the group's contributions change, never patched edge by edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub group_id: GroupId,
    pub payer_id: ParticipantId,
    pub payee_id: ParticipantId,
    /// Amount owed in cents (always positive)
    pub amount_cents: Cents,
}

impl Settlement {
    pub fn new(
        group_id: GroupId,
        payer_id: impl Into<ParticipantId>,
        payee_id: impl Into<ParticipantId>,
        amount_cents: Cents,
    ) -> Self {
        assert!(amount_cents > 0, "Settlement amount must be positive");
        Self {
            group_id,
            payer_id: payer_id.into(),
            payee_id: payee_id.into(),
            amount_cents,
        }
    }

    /// Signed effect of this edge on one participant's outstanding balance:
    /// positive if they are owed money by it, negative if they owe.
    pub fn net_for(&self, participant_id: &str) -> Cents {
        if self.payee_id == participant_id {
            self.amount_cents
        } else if self.payer_id == participant_id {
            -self.amount_cents
        } else {
            0
        }
    }
}
