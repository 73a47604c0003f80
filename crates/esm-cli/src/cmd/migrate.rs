use super::{connect, Context};
use crate::output::print_json;
use anyhow::Context as _;
use esm_core::loader::load_migration_set;
use esm_core::Orchestrator;

pub fn run(
    ctx: &Context,
    ignore_previous_failures: bool,
    allow_older_versions: bool,
) -> anyhow::Result<()> {
    let config = ctx.checked_config()?;
    let set = load_migration_set(&config.migrations_dir).with_context(|| {
        format!("failed to load migrations from {}", config.migrations_dir.display())
    })?;

    let mut options = config.options();
    options.ignore_previous_failures |= ignore_previous_failures;
    options.allow_older_versions |= allow_older_versions;

    let transport = connect(&config)?;
    let mut orchestrator = Orchestrator::new(transport, options)?;
    let report = orchestrator
        .apply_migration_set(set)
        .with_context(|| format!("migration for '{}' failed", config.identifier))?;

    if ctx.json {
        print_json(&report)?;
    } else if report.applied.is_empty() {
        println!(
            "Nothing to apply for '{}' ({} already recorded).",
            config.identifier,
            report.skipped.len()
        );
    } else {
        println!(
            "Applied {} migration(s) for '{}': {}",
            report.applied.len(),
            config.identifier,
            report.applied.join(", ")
        );
    }
    Ok(())
}
