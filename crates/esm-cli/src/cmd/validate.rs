use super::Context;
use crate::output::{print_json, print_table, short_checksum};
use esm_core::config::{has_errors, WarnLevel};
use esm_core::loader::load_migration_set;
use serde::Serialize;

#[derive(Serialize)]
struct MigrationSummary {
    version: String,
    name: String,
    checksum: String,
    operations: Vec<&'static str>,
}

pub fn run(ctx: &Context) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let warnings = config.validate();

    let migrations = load_migration_set(&config.migrations_dir)?.into_sorted()?;
    let summaries: Vec<MigrationSummary> = migrations
        .iter()
        .map(|m| MigrationSummary {
            version: m.version().to_string(),
            name: m.meta.name().to_string(),
            checksum: m.meta.checksum().to_string(),
            operations: m.operations.iter().map(|op| op.kind()).collect(),
        })
        .collect();

    if ctx.json {
        let value = serde_json::json!({
            "warnings": warnings,
            "migrations": summaries,
        });
        print_json(&value)?;
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
        if summaries.is_empty() {
            println!("No migrations found in {}.", config.migrations_dir.display());
        } else {
            let rows = summaries
                .iter()
                .map(|s| {
                    vec![
                        s.version.clone(),
                        s.name.clone(),
                        s.operations.len().to_string(),
                        short_checksum(&s.checksum),
                    ]
                })
                .collect();
            print_table(&["VERSION", "NAME", "OPS", "CHECKSUM"], rows);
        }
    }

    if has_errors(&warnings) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
