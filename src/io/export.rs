use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::SplitService;
use crate::domain::{Contribution, GroupSummary, Settlement};

/// One group's rows in a full snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub summary: GroupSummary,
    pub contributions: Vec<Contribution>,
    pub settlements: Vec<Settlement>,
}

/// Database snapshot for full export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub groups: Vec<GroupSnapshot>,
}

/// Exporter for converting expense-group data to various formats
pub struct Exporter<'a> {
    service: &'a SplitService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a SplitService) -> Self {
        Self { service }
    }

    /// Export group summaries to CSV format
    pub async fn export_groups_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let summaries = self.service.list_groups().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "group_id",
            "total_cents",
            "participant_count",
            "created_at",
        ])?;

        let mut count = 0;
        for summary in &summaries {
            csv_writer.write_record([
                summary.group_id.to_string(),
                summary.total_cents.to_string(),
                summary.participant_count.to_string(),
                summary.created_at.to_rfc3339(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export every group's settlement edges to CSV format
    pub async fn export_settlements_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let summaries = self.service.list_groups().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["group_id", "payer_id", "payee_id", "amount_cents"])?;

        let mut count = 0;
        for summary in &summaries {
            let settlements = self.service.settlements(summary.group_id).await?;
            for settlement in &settlements {
                csv_writer.write_record([
                    settlement.group_id.to_string(),
                    settlement.payer_id.clone(),
                    settlement.payee_id.clone(),
                    settlement.amount_cents.to_string(),
                ])?;
                count += 1;
            }
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export the full database as a JSON snapshot
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<DatabaseSnapshot> {
        let summaries = self.service.list_groups().await?;

        let mut groups = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let details = self.service.group_details(summary.group_id).await?;
            groups.push(GroupSnapshot {
                summary: details.summary,
                contributions: details.contributions,
                settlements: details.settlements,
            });
        }

        let snapshot = DatabaseSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            groups,
        };

        serde_json::to_writer_pretty(&mut writer, &snapshot)?;
        writeln!(writer)?;
        Ok(snapshot)
    }
}
