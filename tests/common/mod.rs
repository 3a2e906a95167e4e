// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use divvy::application::{ContributionEntry, SplitService};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(SplitService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = SplitService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to build contribution entries from (participant, cents) pairs
pub fn entries(pairs: &[(&str, i64)]) -> Vec<ContributionEntry> {
    pairs
        .iter()
        .map(|(participant_id, amount_cents)| ContributionEntry {
            participant_id: participant_id.to_string(),
            amount_cents: *amount_cents,
        })
        .collect()
}
