use thiserror::Error;

use crate::domain::{GroupId, ParticipantId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("An expense group needs at least one contribution")]
    EmptyGroup,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Participant count must be at least one")]
    ZeroParticipants,

    #[error("Duplicate contribution for participant: {0}")]
    DuplicateParticipant(ParticipantId),

    #[error("Expense group not found: {0}")]
    GroupNotFound(GroupId),

    #[error("No contribution from participant {participant_id} in group {group_id}")]
    ContributionNotFound {
        group_id: GroupId,
        participant_id: ParticipantId,
    },

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
