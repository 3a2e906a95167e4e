use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{ContributionEntry, SplitService};
use crate::domain::{GroupId, format_cents, parse_cents};
use crate::storage::{AmendMode, RemovalOutcome};

/// Divvy - Shared Expense Settlement
#[derive(Parser)]
#[command(name = "divvy")]
#[command(about = "A local-first tool that splits shared expenses into minimal settlements")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "divvy.db")]
    pub database: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Form an expense group from contributions
    New {
        /// Contributions as participant=amount pairs (e.g. "alice=100.00 bob=50")
        #[arg(required = true)]
        entries: Vec<String>,
    },

    /// List all expense groups
    Groups,

    /// Show a group: contributions, totals, and who pays whom
    Show {
        /// Group ID
        group: String,
    },

    /// Remove a participant's contribution from a group
    Remove {
        /// Group ID
        group: String,

        /// Participant to remove
        participant: String,
    },

    /// Change a participant's contribution amount
    Amend {
        /// Group ID
        group: String,

        /// Participant whose contribution changes
        participant: String,

        /// New amount (e.g. "150.00" or "150")
        amount: String,

        /// Shift stored settlements by the amount delta instead of
        /// recomputing them from scratch
        #[arg(long)]
        in_place: bool,
    },

    /// Dissolve a group, deleting all of its records
    Dissolve {
        /// Group ID
        group: String,
    },

    /// Show the per-head share of an evenly split amount
    Quick {
        /// Total amount (e.g. "120.00")
        amount: String,

        /// Number of people sharing it
        people: i64,
    },

    /// Show a participant's net position against every counterparty
    Position {
        /// Participant ID
        participant: String,
    },

    /// Export data to CSV or JSON
    Export {
        /// What to export: groups, settlements, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                SplitService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::New { entries } => {
                let service = SplitService::connect(&self.database).await?;
                let entries = entries
                    .iter()
                    .map(|raw| parse_entry(raw))
                    .collect::<Result<Vec<_>>>()?;

                let details = service.form_group(entries).await?;
                println!("Formed group: {}", details.summary.group_id);
                println!(
                    "  Total: {} across {} participant(s), fair share {}",
                    format_cents(details.summary.total_cents),
                    details.summary.participant_count,
                    format_cents(details.fair_share)
                );
                print_settlements(&details.settlements);
            }

            Commands::Groups => {
                let service = SplitService::connect(&self.database).await?;
                let summaries = service.list_groups().await?;
                if summaries.is_empty() {
                    println!("No expense groups found.");
                } else {
                    println!("{:<38} {:>12} {:>8} {:<12}", "GROUP", "TOTAL", "PEOPLE", "CREATED");
                    println!("{}", "-".repeat(74));
                    for summary in summaries {
                        println!(
                            "{:<38} {:>12} {:>8} {:<12}",
                            summary.group_id,
                            format_cents(summary.total_cents),
                            summary.participant_count,
                            summary.created_at.format("%Y-%m-%d")
                        );
                    }
                }
            }

            Commands::Show { group } => {
                let service = SplitService::connect(&self.database).await?;
                let group_id = parse_group_id(&group)?;
                let details = service.group_details(group_id).await?;

                println!("Group: {}", details.summary.group_id);
                println!(
                    "  Created:      {}",
                    details.summary.created_at.format("%Y-%m-%d %H:%M:%S")
                );
                println!(
                    "  Total:        {}",
                    format_cents(details.summary.total_cents)
                );
                println!("  Participants: {}", details.summary.participant_count);
                println!("  Fair share:   {}", format_cents(details.fair_share));
                println!();
                println!("Contributions:");
                for contribution in &details.contributions {
                    println!(
                        "  {:<20} paid {:>10}",
                        contribution.participant_id,
                        format_cents(contribution.amount_cents)
                    );
                }
                println!();
                print_settlements(&details.settlements);
            }

            Commands::Remove { group, participant } => {
                let service = SplitService::connect(&self.database).await?;
                let group_id = parse_group_id(&group)?;

                match service.remove_participant(group_id, &participant).await? {
                    RemovalOutcome::Rebalanced => {
                        println!("Removed {} from group {}", participant, group_id);
                        let details = service.group_details(group_id).await?;
                        print_settlements(&details.settlements);
                    }
                    RemovalOutcome::Dissolved => {
                        println!(
                            "Removed {} from group {}; no contributions remain, group dissolved",
                            participant, group_id
                        );
                    }
                }
            }

            Commands::Amend {
                group,
                participant,
                amount,
                in_place,
            } => {
                let service = SplitService::connect(&self.database).await?;
                let group_id = parse_group_id(&group)?;
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
                let mode = if in_place {
                    AmendMode::Shift
                } else {
                    AmendMode::Recompute
                };

                let details = service
                    .amend_contribution(group_id, &participant, amount_cents, mode)
                    .await?;
                println!(
                    "Amended {}'s contribution to {}",
                    participant,
                    format_cents(amount_cents)
                );
                println!(
                    "  Total: {} across {} participant(s), fair share {}",
                    format_cents(details.summary.total_cents),
                    details.summary.participant_count,
                    format_cents(details.fair_share)
                );
                print_settlements(&details.settlements);
            }

            Commands::Dissolve { group } => {
                let service = SplitService::connect(&self.database).await?;
                let group_id = parse_group_id(&group)?;
                service.dissolve_group(group_id).await?;
                println!("Dissolved group: {}", group_id);
            }

            Commands::Quick { amount, people } => {
                let total_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '120.00' or '120'")?;
                let share = SplitService::quick_split(total_cents, people)?;
                println!(
                    "Each of {} people pays {}",
                    people,
                    format_cents(share)
                );
            }

            Commands::Position { participant } => {
                let service = SplitService::connect(&self.database).await?;
                let positions = service.participant_positions(&participant).await?;
                if positions.is_empty() {
                    println!("{} is fully settled.", participant);
                } else {
                    for position in positions {
                        if position.net_cents > 0 {
                            println!(
                                "{} owes {} {}",
                                position.counterparty,
                                participant,
                                format_cents(position.net_cents)
                            );
                        } else {
                            println!(
                                "{} owes {} {}",
                                participant,
                                position.counterparty,
                                format_cents(-position.net_cents)
                            );
                        }
                    }
                }
            }

            Commands::Export {
                export_type,
                output,
            } => {
                let service = SplitService::connect(&self.database).await?;
                run_export_command(&service, &export_type, output.as_deref()).await?;
            }
        }

        Ok(())
    }
}

fn print_settlements(settlements: &[crate::domain::Settlement]) {
    if settlements.is_empty() {
        println!("Everyone is settled; no transfers needed.");
    } else {
        println!("Settlements:");
        for settlement in settlements {
            println!(
                "  {} pays {} {}",
                settlement.payer_id,
                settlement.payee_id,
                format_cents(settlement.amount_cents)
            );
        }
    }
}

fn parse_group_id(raw: &str) -> Result<GroupId> {
    Uuid::parse_str(raw).context("Invalid group ID format (expected UUID)")
}

/// Parse one "participant=amount" contribution entry.
fn parse_entry(raw: &str) -> Result<ContributionEntry> {
    let (participant_id, amount) = raw
        .split_once('=')
        .with_context(|| format!("Invalid entry '{}'. Use participant=amount", raw))?;
    if participant_id.is_empty() {
        anyhow::bail!("Invalid entry '{}': participant is empty", raw);
    }
    let amount_cents = parse_cents(amount)
        .with_context(|| format!("Invalid amount in entry '{}'", raw))?;
    Ok(ContributionEntry {
        participant_id: participant_id.to_string(),
        amount_cents,
    })
}

async fn run_export_command(
    service: &SplitService,
    export_type: &str,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "groups" => {
            let count = exporter.export_groups_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} groups", count);
            }
        }
        "settlements" => {
            let count = exporter.export_settlements_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} settlements", count);
            }
        }
        "full" => {
            let snapshot = exporter.export_full_json(writer).await?;
            if output.is_some() {
                eprintln!("Exported full database: {} groups", snapshot.groups.len());
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: groups, settlements, full",
                export_type
            );
        }
    }

    Ok(())
}
