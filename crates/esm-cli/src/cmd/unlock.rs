use super::{connect, Context};
use crate::output::print_json;
use esm_core::lock::{lock_id, GlobalLock};

pub fn run(ctx: &Context) -> anyhow::Result<()> {
    let config = ctx.checked_config()?;
    let transport = connect(&config)?;
    GlobalLock::new(&transport).release(&config.identifier)?;

    if ctx.json {
        print_json(&serde_json::json!({ "released": lock_id(&config.identifier) }))?;
    } else {
        println!("Released lock '{}'.", lock_id(&config.identifier));
    }
    Ok(())
}
