use super::{connect, Context};
use crate::output::{print_json, print_table, short_checksum};
use esm_core::ledger::{Ledger, LedgerRecord};
use esm_core::MigrationError;

pub fn run(ctx: &Context) -> anyhow::Result<()> {
    let config = ctx.checked_config()?;
    let transport = connect(&config)?;

    let records = match Ledger::new(&transport).list_all(&config.identifier) {
        Ok(records) => records,
        // version index not created yet: nothing has ever run
        Err(MigrationError::Transport(e)) if e.is_not_found() => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    if ctx.json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No migrations recorded for '{}'.", config.identifier);
        return Ok(());
    }
    print_table(
        &["VERSION", "NAME", "STATE", "CREATED", "CHECKSUM", "MESSAGE"],
        records.iter().map(row).collect(),
    );
    Ok(())
}

fn row(record: &LedgerRecord) -> Vec<String> {
    vec![
        record.version.clone(),
        record.name.clone(),
        record.state.to_string(),
        record.created.format("%Y-%m-%d %H:%M:%S").to_string(),
        short_checksum(&record.sha256_checksum),
        record.failure_message.clone().unwrap_or_default(),
    ]
}
