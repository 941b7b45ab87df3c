//! Status command implementation
//!
//! This module implements the `status` command for displaying stage
//! cursors and the number of entities already imported.

use super::exit_code_for;
use crate::adapters::factory::create_target;
use crate::config::load_config;
use crate::core::state::{BatchCursor, StageStatus};
use crate::domain::{EntityType, LegacyId, Stage};
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Look up the target id of one legacy entity (`type:legacy_id`)
    #[arg(long, value_name = "TYPE:ID")]
    pub lookup: Option<String>,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking import status");

        println!("📊 Import Status");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let lookup = match self.lookup.as_deref().map(parse_lookup).transpose() {
            Ok(l) => l,
            Err(e) => {
                println!("❌ {e}");
                return Ok(2);
            }
        };

        let (target, cursor_storage) = match create_target(&config).await {
            Ok(t) => t,
            Err(e) => {
                println!("❌ Failed to connect to target");
                println!("   Error: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        if let Some((entity_type, legacy_id)) = lookup {
            let found = match target.find_by_legacy_id(entity_type, &legacy_id).await {
                Ok(found) => found,
                Err(e) => {
                    println!("❌ Lookup failed");
                    println!("   Error: {e}");
                    return Ok(5);
                }
            };
            match found {
                Some(id) => println!("{entity_type} {legacy_id} -> {id}"),
                None => println!("{entity_type} {legacy_id} has not been imported"),
            }
            return Ok(0);
        }

        let cursors = match cursor_storage.load_all_cursors().await {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load cursors");
                println!("   Error: {e}");
                return Ok(5);
            }
        };
        let counts = match target.entity_counts().await {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to count imported entities");
                println!("   Error: {e}");
                return Ok(5);
            }
        };

        if cursors.is_empty() {
            println!("No import history found.");
            println!("Run 'ferry import' to start importing.");
            println!();
        } else {
            println!(
                "{:<18} {:<14} {:>12} {:>10} {:<20}",
                "Stage", "Status", "Last Key", "Rows", "Updated"
            );
            println!("{}", "-".repeat(78));
            for stage in Stage::ORDER {
                let Some(cursor) = cursors.iter().find(|c| c.stage == stage) else {
                    continue;
                };
                print_cursor(cursor);
            }
            println!();
        }

        println!("Imported entities:");
        for entity_type in EntityType::ALL {
            println!(
                "  {:<18} {:>10}",
                entity_type.as_str(),
                counts.get(&entity_type).copied().unwrap_or(0)
            );
        }
        println!();
        Ok(0)
    }
}

fn print_cursor(cursor: &BatchCursor) {
    let status = match cursor.status {
        StageStatus::Completed => "✅ Completed",
        StageStatus::InProgress => "🔄 In Progress",
        StageStatus::Interrupted => "⏸️  Interrupted",
        StageStatus::NotStarted => "Not Started",
    };
    let last_key = cursor
        .last_key
        .map(|k| k.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{:<18} {:<14} {:>12} {:>10} {:<20}",
        cursor.stage.as_str(),
        status,
        last_key,
        cursor.rows_processed,
        cursor.updated_at.format("%Y-%m-%d %H:%M:%S")
    );
}

/// Parses `type:legacy_id`
fn parse_lookup(value: &str) -> Result<(EntityType, LegacyId), String> {
    let (entity_type, legacy_id) = value
        .split_once(':')
        .ok_or_else(|| format!("Lookup must look like 'post:123', got '{value}'"))?;
    let entity_type: EntityType = entity_type.parse()?;
    let legacy_id = LegacyId::new(legacy_id.trim())?;
    Ok((entity_type, legacy_id))
}
