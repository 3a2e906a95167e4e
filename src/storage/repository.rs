use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{
    Cents, Contribution, GroupId, GroupSummary, ParticipantId, Settlement, simplify,
};

use super::MIGRATION_001_INITIAL;

/// How an amount amendment propagates to the stored settlement set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmendMode {
    /// Recompute the settlement set from the live contributions. This is
    /// the authoritative rule; it is always correct.
    #[default]
    Recompute,
    /// Shift every stored settlement amount by the same delta applied to
    /// the group total, without recomputing. Falls back to a recompute
    /// whenever the shift cannot be applied faithfully (no stored edges,
    /// or an edge would drop to zero or below).
    Shift,
}

/// Result of removing a participant from a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// The group still has contributions; its settlements were recomputed.
    Rebalanced,
    /// The removed contribution was the last one; the whole group was
    /// deleted in the same transaction.
    Dissolved,
}

/// Repository for persisting and querying expense groups: contributions,
/// group summaries, and the derived settlement edges.
///
/// Every mutating operation runs as a single SQLite transaction covering
/// all of its reads and writes, so a concurrent reader never observes a
/// summary that disagrees with the contributions or a stale settlement set.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given path.
    /// Creates the database file if it doesn't exist.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Group operations
    // ========================

    /// Create a new expense group from the given (participant, amount)
    /// entries: one contribution row per entry, a summary row, and the
    /// settlement set derived from them, all in one transaction.
    ///
    /// Callers must validate the entries first (non-empty, no duplicate
    /// participants, no negative amounts).
    pub async fn create_group(&self, entries: &[(ParticipantId, Cents)]) -> Result<GroupId> {
        let group_id = Uuid::new_v4();
        let total_cents: Cents = entries.iter().map(|(_, amount)| amount).sum();

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        for (position, (participant_id, amount_cents)) in entries.iter().enumerate() {
            let contribution = Contribution::new(
                group_id,
                participant_id.clone(),
                *amount_cents,
                position as i64,
            );
            insert_contribution(&mut tx, &contribution).await?;
        }

        let summary = GroupSummary::new(group_id, total_cents, entries.len() as i64);
        sqlx::query(
            r#"
            INSERT INTO group_summaries (group_id, total_cents, participant_count, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(summary.group_id.to_string())
        .bind(summary.total_cents)
        .bind(summary.participant_count)
        .bind(summary.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to save group summary")?;

        reconcile(&mut tx, group_id, total_cents, entries).await?;

        tx.commit().await.context("Failed to commit group creation")?;
        Ok(group_id)
    }

    /// Get the summary for a group.
    pub async fn get_summary(&self, group_id: GroupId) -> Result<Option<GroupSummary>> {
        let row = sqlx::query(
            r#"
            SELECT group_id, total_cents, participant_count, created_at
            FROM group_summaries
            WHERE group_id = ?
            "#,
        )
        .bind(group_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch group summary")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_summary(&row)?)),
            None => Ok(None),
        }
    }

    /// List all group summaries, oldest first.
    pub async fn list_summaries(&self) -> Result<Vec<GroupSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT group_id, total_cents, participant_count, created_at
            FROM group_summaries
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list group summaries")?;

        rows.iter().map(Self::row_to_summary).collect()
    }

    /// List a group's contributions in their creation encounter order.
    pub async fn list_contributions(&self, group_id: GroupId) -> Result<Vec<Contribution>> {
        let rows = sqlx::query(
            r#"
            SELECT id, group_id, participant_id, amount_cents, position, recorded_at
            FROM contributions
            WHERE group_id = ?
            ORDER BY position
            "#,
        )
        .bind(group_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list contributions")?;

        rows.iter().map(Self::row_to_contribution).collect()
    }

    /// List a group's stored settlement edges.
    pub async fn list_settlements(&self, group_id: GroupId) -> Result<Vec<Settlement>> {
        let rows = sqlx::query(
            r#"
            SELECT group_id, payer_id, payee_id, amount_cents
            FROM settlements
            WHERE group_id = ?
            ORDER BY rowid
            "#,
        )
        .bind(group_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list settlements")?;

        rows.iter().map(Self::row_to_settlement).collect()
    }

    /// Remove one participant's contribution from a group, keep the summary
    /// in step, and recompute the settlement set over what remains. If the
    /// removed contribution was the group's last, the group is dissolved
    /// instead. Returns `None` (and writes nothing) when the group has no
    /// contribution from that participant.
    pub async fn remove_participant(
        &self,
        group_id: GroupId,
        participant_id: &str,
    ) -> Result<Option<RemovalOutcome>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let row = sqlx::query(
            "SELECT id, amount_cents FROM contributions WHERE group_id = ? AND participant_id = ?",
        )
        .bind(group_id.to_string())
        .bind(participant_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to fetch contribution")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let contribution_id: String = row.get("id");
        let removed_cents: Cents = row.get("amount_cents");

        sqlx::query("DELETE FROM contributions WHERE id = ?")
            .bind(&contribution_id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete contribution")?;

        sqlx::query(
            r#"
            UPDATE group_summaries
            SET total_cents = total_cents - ?, participant_count = participant_count - 1
            WHERE group_id = ?
            "#,
        )
        .bind(removed_cents)
        .bind(group_id.to_string())
        .execute(&mut *tx)
        .await
        .context("Failed to update group summary")?;

        let remaining = live_contributions(&mut tx, group_id).await?;
        let outcome = if remaining.is_empty() {
            delete_group_rows(&mut tx, group_id).await?;
            RemovalOutcome::Dissolved
        } else {
            let total_cents: Cents = remaining.iter().map(|(_, amount)| amount).sum();
            reconcile(&mut tx, group_id, total_cents, &remaining).await?;
            RemovalOutcome::Rebalanced
        };

        tx.commit().await.context("Failed to commit participant removal")?;
        Ok(Some(outcome))
    }

    /// Delete a group and everything belonging to it. Returns `false` when
    /// no such group exists.
    pub async fn delete_group(&self, group_id: GroupId) -> Result<bool> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let exists = sqlx::query("SELECT 1 FROM group_summaries WHERE group_id = ?")
            .bind(group_id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to fetch group summary")?
            .is_some();
        if !exists {
            return Ok(false);
        }

        delete_group_rows(&mut tx, group_id).await?;

        tx.commit().await.context("Failed to commit group deletion")?;
        Ok(true)
    }

    /// Change one participant's contribution amount, adjust the summary
    /// total by the signed difference, and bring the settlement set in
    /// line per the chosen [`AmendMode`]. Returns `None` (and writes
    /// nothing) when the group has no contribution from that participant.
    pub async fn update_contribution(
        &self,
        group_id: GroupId,
        participant_id: &str,
        new_amount_cents: Cents,
        mode: AmendMode,
    ) -> Result<Option<()>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let row = sqlx::query(
            "SELECT id, amount_cents FROM contributions WHERE group_id = ? AND participant_id = ?",
        )
        .bind(group_id.to_string())
        .bind(participant_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to fetch contribution")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let contribution_id: String = row.get("id");
        let old_amount_cents: Cents = row.get("amount_cents");
        let delta = new_amount_cents - old_amount_cents;

        sqlx::query("UPDATE contributions SET amount_cents = ? WHERE id = ?")
            .bind(new_amount_cents)
            .bind(&contribution_id)
            .execute(&mut *tx)
            .await
            .context("Failed to update contribution")?;

        sqlx::query("UPDATE group_summaries SET total_cents = total_cents + ? WHERE group_id = ?")
            .bind(delta)
            .bind(group_id.to_string())
            .execute(&mut *tx)
            .await
            .context("Failed to update group summary")?;

        match mode {
            AmendMode::Recompute => {
                let live = live_contributions(&mut tx, group_id).await?;
                let total_cents: Cents = live.iter().map(|(_, amount)| amount).sum();
                reconcile(&mut tx, group_id, total_cents, &live).await?;
            }
            AmendMode::Shift => {
                if !shift_settlements(&mut tx, group_id, delta).await? {
                    let live = live_contributions(&mut tx, group_id).await?;
                    let total_cents: Cents = live.iter().map(|(_, amount)| amount).sum();
                    reconcile(&mut tx, group_id, total_cents, &live).await?;
                }
            }
        }

        tx.commit().await.context("Failed to commit contribution update")?;
        Ok(Some(()))
    }

    // ========================
    // Cross-group queries
    // ========================

    /// Aggregate every stored settlement edge involving a participant into
    /// one net amount per counterparty, across all groups. Positive means
    /// the counterparty owes them, negative means they owe the counterparty.
    pub async fn participant_positions(
        &self,
        participant_id: &str,
    ) -> Result<Vec<(ParticipantId, Cents)>> {
        let rows = sqlx::query(
            r#"
            SELECT counterparty, SUM(net) as net_cents
            FROM (
                SELECT payer_id as counterparty, amount_cents as net
                FROM settlements WHERE payee_id = ?
                UNION ALL
                SELECT payee_id as counterparty, -amount_cents as net
                FROM settlements WHERE payer_id = ?
            )
            GROUP BY counterparty
            ORDER BY counterparty
            "#,
        )
        .bind(participant_id)
        .bind(participant_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to aggregate participant positions")?;

        Ok(rows
            .iter()
            .map(|row| (row.get("counterparty"), row.get("net_cents")))
            .collect())
    }

    fn row_to_summary(row: &sqlx::sqlite::SqliteRow) -> Result<GroupSummary> {
        let group_id_str: String = row.get("group_id");
        let created_at_str: String = row.get("created_at");

        Ok(GroupSummary {
            group_id: Uuid::parse_str(&group_id_str).context("Invalid group ID")?,
            total_cents: row.get("total_cents"),
            participant_count: row.get("participant_count"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    fn row_to_contribution(row: &sqlx::sqlite::SqliteRow) -> Result<Contribution> {
        let id_str: String = row.get("id");
        let group_id_str: String = row.get("group_id");
        let recorded_at_str: String = row.get("recorded_at");

        Ok(Contribution {
            id: Uuid::parse_str(&id_str).context("Invalid contribution ID")?,
            group_id: Uuid::parse_str(&group_id_str).context("Invalid group ID")?,
            participant_id: row.get("participant_id"),
            amount_cents: row.get("amount_cents"),
            position: row.get("position"),
            recorded_at: DateTime::parse_from_rfc3339(&recorded_at_str)
                .context("Invalid recorded_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    fn row_to_settlement(row: &sqlx::sqlite::SqliteRow) -> Result<Settlement> {
        let group_id_str: String = row.get("group_id");

        Ok(Settlement {
            group_id: Uuid::parse_str(&group_id_str).context("Invalid group ID")?,
            payer_id: row.get("payer_id"),
            payee_id: row.get("payee_id"),
            amount_cents: row.get("amount_cents"),
        })
    }
}

async fn insert_contribution(
    tx: &mut Transaction<'_, Sqlite>,
    contribution: &Contribution,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO contributions (id, group_id, participant_id, amount_cents, position, recorded_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(contribution.id.to_string())
    .bind(contribution.group_id.to_string())
    .bind(&contribution.participant_id)
    .bind(contribution.amount_cents)
    .bind(contribution.position)
    .bind(contribution.recorded_at.to_rfc3339())
    .execute(&mut **tx)
    .await
    .context("Failed to save contribution")?;
    Ok(())
}

/// Read the live (participant, amount) pairs of a group inside the open
/// transaction, in creation encounter order.
async fn live_contributions(
    tx: &mut Transaction<'_, Sqlite>,
    group_id: GroupId,
) -> Result<Vec<(ParticipantId, Cents)>> {
    let rows = sqlx::query(
        r#"
        SELECT participant_id, amount_cents
        FROM contributions
        WHERE group_id = ?
        ORDER BY position
        "#,
    )
    .bind(group_id.to_string())
    .fetch_all(&mut **tx)
    .await
    .context("Failed to read live contributions")?;

    Ok(rows
        .iter()
        .map(|row| (row.get("participant_id"), row.get("amount_cents")))
        .collect())
}

/// Replace a group's settlement rows with the set derived from its live
/// contributions. Runs inside the caller's transaction, so it fails exactly
/// when the enclosing mutation fails, never on its own.
async fn reconcile(
    tx: &mut Transaction<'_, Sqlite>,
    group_id: GroupId,
    total_cents: Cents,
    contributions: &[(ParticipantId, Cents)],
) -> Result<()> {
    sqlx::query("DELETE FROM settlements WHERE group_id = ?")
        .bind(group_id.to_string())
        .execute(&mut **tx)
        .await
        .context("Failed to clear settlements")?;

    let edges = simplify(total_cents, contributions);
    debug!(
        group_id = %group_id,
        participants = contributions.len(),
        edges = edges.len(),
        "reconciled settlement set"
    );

    for edge in &edges {
        sqlx::query(
            r#"
            INSERT INTO settlements (group_id, payer_id, payee_id, amount_cents)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(group_id.to_string())
        .bind(&edge.payer_id)
        .bind(&edge.payee_id)
        .bind(edge.amount_cents)
        .execute(&mut **tx)
        .await
        .context("Failed to save settlement")?;
    }

    Ok(())
}

/// Apply a uniform delta to every stored settlement amount of a group.
/// Returns `false` without writing when the shift cannot be applied
/// faithfully: there are no stored edges to shift, or some edge would end
/// up at zero or below.
async fn shift_settlements(
    tx: &mut Transaction<'_, Sqlite>,
    group_id: GroupId,
    delta: Cents,
) -> Result<bool> {
    if delta == 0 {
        return Ok(true);
    }

    let row = sqlx::query(
        "SELECT COUNT(*) as edge_count, MIN(amount_cents) as min_cents FROM settlements WHERE group_id = ?",
    )
    .bind(group_id.to_string())
    .fetch_one(&mut **tx)
    .await
    .context("Failed to inspect settlements")?;

    let edge_count: i64 = row.get("edge_count");
    let min_cents: Option<Cents> = row.get("min_cents");
    let shiftable = match min_cents {
        Some(min) if edge_count > 0 => min + delta > 0,
        _ => false,
    };
    if !shiftable {
        return Ok(false);
    }

    sqlx::query("UPDATE settlements SET amount_cents = amount_cents + ? WHERE group_id = ?")
        .bind(delta)
        .bind(group_id.to_string())
        .execute(&mut **tx)
        .await
        .context("Failed to shift settlements")?;
    Ok(true)
}

/// Delete every row belonging to a group, in the caller's transaction.
async fn delete_group_rows(tx: &mut Transaction<'_, Sqlite>, group_id: GroupId) -> Result<()> {
    let group_id_str = group_id.to_string();

    sqlx::query("DELETE FROM settlements WHERE group_id = ?")
        .bind(&group_id_str)
        .execute(&mut **tx)
        .await
        .context("Failed to delete settlements")?;

    sqlx::query("DELETE FROM contributions WHERE group_id = ?")
        .bind(&group_id_str)
        .execute(&mut **tx)
        .await
        .context("Failed to delete contributions")?;

    sqlx::query("DELETE FROM group_summaries WHERE group_id = ?")
        .bind(&group_id_str)
        .execute(&mut **tx)
        .await
        .context("Failed to delete group summary")?;

    Ok(())
}
