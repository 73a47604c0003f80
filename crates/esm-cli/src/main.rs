mod cmd;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "esm",
    about = "Apply versioned schema and data migrations to Elasticsearch",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file
    #[arg(
        long,
        short = 'c',
        global = true,
        env = "ESM_CONFIG",
        default_value = esm_core::config::DEFAULT_CONFIG_FILE
    )]
    config: PathBuf,

    /// Override the identifier from the config file
    #[arg(long, global = true, env = "ESM_IDENTIFIER")]
    identifier: Option<String>,

    /// Override the migrations directory from the config file
    #[arg(long, global = true)]
    migrations_dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log at debug level
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply every migration not yet recorded for the identifier
    Migrate {
        /// Skip over FAILURE and IN_PROGRESS records instead of aborting
        #[arg(long)]
        ignore_previous_failures: bool,

        /// Accept new migrations that sort before the latest applied one
        #[arg(long)]
        allow_older_versions: bool,
    },

    /// Check the config and migration files without contacting the store
    Validate,

    /// Show the recorded migrations for the identifier
    History,

    /// Remove a lock left behind by a crashed run
    Unlock,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        match &cli.command {
            Commands::Migrate { .. } => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let ctx = cmd::Context {
        config_path: cli.config,
        identifier: cli.identifier,
        migrations_dir: cli.migrations_dir,
        json: cli.json,
    };

    let result = match cli.command {
        Commands::Migrate {
            ignore_previous_failures,
            allow_older_versions,
        } => cmd::migrate::run(&ctx, ignore_previous_failures, allow_older_versions),
        Commands::Validate => cmd::validate::run(&ctx),
        Commands::History => cmd::history::run(&ctx),
        Commands::Unlock => cmd::unlock::run(&ctx),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
