use std::collections::HashSet;

use tracing::info;

use crate::domain::{
    Cents, Contribution, GroupId, GroupSummary, ParticipantId, Settlement, fair_share,
};
use crate::storage::{AmendMode, RemovalOutcome, Repository};

use super::AppError;

/// Application service providing high-level operations over expense groups.
/// This is the primary interface for any client (CLI, API, TUI, etc.).
pub struct SplitService {
    repo: Repository,
}

/// One (participant, amount) pair submitted when forming a group.
#[derive(Debug, Clone)]
pub struct ContributionEntry {
    pub participant_id: ParticipantId,
    pub amount_cents: Cents,
}

/// Full view of one expense group: the denormalized summary, the live
/// contributions, and the stored settlement set.
#[derive(Debug)]
pub struct GroupDetails {
    pub summary: GroupSummary,
    pub fair_share: Cents,
    pub contributions: Vec<Contribution>,
    pub settlements: Vec<Settlement>,
}

/// A participant's aggregate position against one counterparty across all
/// groups. Positive `net_cents` means the counterparty owes them.
pub struct CounterpartyPosition {
    pub counterparty: ParticipantId,
    pub net_cents: Cents,
}

impl SplitService {
    /// Create a new service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Group formation
    // ========================

    /// Form a new expense group from the given contribution entries and
    /// return its full view, settlements included.
    pub async fn form_group(&self, entries: Vec<ContributionEntry>) -> Result<GroupDetails, AppError> {
        if entries.is_empty() {
            return Err(AppError::EmptyGroup);
        }

        let pairs: Vec<(ParticipantId, Cents)> = entries
            .into_iter()
            .map(|entry| (entry.participant_id, entry.amount_cents))
            .collect();

        let mut seen: HashSet<&str> = HashSet::new();
        for (participant_id, amount_cents) in &pairs {
            if *amount_cents < 0 {
                return Err(AppError::InvalidAmount(format!(
                    "contribution from {} cannot be negative",
                    participant_id
                )));
            }
            if !seen.insert(participant_id.as_str()) {
                return Err(AppError::DuplicateParticipant(participant_id.clone()));
            }
        }

        let group_id = self.repo.create_group(&pairs).await?;
        info!(group_id = %group_id, participants = pairs.len(), "formed expense group");

        self.group_details(group_id).await
    }

    // ========================
    // Queries
    // ========================

    /// Get the full view of a group.
    pub async fn group_details(&self, group_id: GroupId) -> Result<GroupDetails, AppError> {
        let summary = self
            .repo
            .get_summary(group_id)
            .await?
            .ok_or(AppError::GroupNotFound(group_id))?;

        let contributions = self.repo.list_contributions(group_id).await?;
        let settlements = self.repo.list_settlements(group_id).await?;
        let share = summary.fair_share();

        Ok(GroupDetails {
            summary,
            fair_share: share,
            contributions,
            settlements,
        })
    }

    /// List all group summaries.
    pub async fn list_groups(&self) -> Result<Vec<GroupSummary>, AppError> {
        Ok(self.repo.list_summaries().await?)
    }

    /// Get the stored settlement set for a group.
    pub async fn settlements(&self, group_id: GroupId) -> Result<Vec<Settlement>, AppError> {
        if self.repo.get_summary(group_id).await?.is_none() {
            return Err(AppError::GroupNotFound(group_id));
        }
        Ok(self.repo.list_settlements(group_id).await?)
    }

    /// Aggregate one participant's net position per counterparty across all
    /// groups they appear in.
    pub async fn participant_positions(
        &self,
        participant_id: &str,
    ) -> Result<Vec<CounterpartyPosition>, AppError> {
        let positions = self.repo.participant_positions(participant_id).await?;
        Ok(positions
            .into_iter()
            .filter(|(_, net_cents)| *net_cents != 0)
            .map(|(counterparty, net_cents)| CounterpartyPosition {
                counterparty,
                net_cents,
            })
            .collect())
    }

    /// The per-head share of an evenly split amount, without forming any
    /// group.
    pub fn quick_split(total_cents: Cents, people: i64) -> Result<Cents, AppError> {
        if total_cents < 0 {
            return Err(AppError::InvalidAmount(
                "total cannot be negative".to_string(),
            ));
        }
        if people <= 0 {
            return Err(AppError::ZeroParticipants);
        }
        Ok(fair_share(total_cents, people))
    }

    // ========================
    // Mutations
    // ========================

    /// Remove a participant's contribution from a group. The group is
    /// rebalanced around the remaining contributions, or dissolved when the
    /// removed contribution was its last.
    pub async fn remove_participant(
        &self,
        group_id: GroupId,
        participant_id: &str,
    ) -> Result<RemovalOutcome, AppError> {
        match self.repo.remove_participant(group_id, participant_id).await? {
            Some(outcome) => {
                info!(
                    group_id = %group_id,
                    participant_id,
                    dissolved = matches!(outcome, RemovalOutcome::Dissolved),
                    "removed participant"
                );
                Ok(outcome)
            }
            None => Err(self.missing_contribution_error(group_id, participant_id).await?),
        }
    }

    /// Change a participant's contribution amount and bring the group's
    /// summary and settlement set in line, per the chosen [`AmendMode`].
    pub async fn amend_contribution(
        &self,
        group_id: GroupId,
        participant_id: &str,
        new_amount_cents: Cents,
        mode: AmendMode,
    ) -> Result<GroupDetails, AppError> {
        if new_amount_cents < 0 {
            return Err(AppError::InvalidAmount(
                "contribution cannot be negative".to_string(),
            ));
        }

        match self
            .repo
            .update_contribution(group_id, participant_id, new_amount_cents, mode)
            .await?
        {
            Some(()) => {
                info!(
                    group_id = %group_id,
                    participant_id,
                    new_amount_cents,
                    ?mode,
                    "amended contribution"
                );
                self.group_details(group_id).await
            }
            None => Err(self.missing_contribution_error(group_id, participant_id).await?),
        }
    }

    /// Dissolve a group: delete its contributions, summary, and settlements.
    pub async fn dissolve_group(&self, group_id: GroupId) -> Result<(), AppError> {
        if !self.repo.delete_group(group_id).await? {
            return Err(AppError::GroupNotFound(group_id));
        }
        info!(group_id = %group_id, "dissolved expense group");
        Ok(())
    }

    /// Distinguish "no such group" from "group exists but has no such
    /// participant" for error reporting.
    async fn missing_contribution_error(
        &self,
        group_id: GroupId,
        participant_id: &str,
    ) -> Result<AppError, AppError> {
        match self.repo.get_summary(group_id).await? {
            None => Ok(AppError::GroupNotFound(group_id)),
            Some(_) => Ok(AppError::ContributionNotFound {
                group_id,
                participant_id: participant_id.to_string(),
            }),
        }
    }
}
