mod report;
mod scan;
mod targets;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "churnwatch-cli")]
#[command(about = "Churnwatch command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scan tracked targets for follower changes
    Scan {
        /// Scan a single target by handle instead of all tracked targets
        #[arg(long)]
        target: Option<String>,
        /// Print what would be scanned without touching anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Manage tracked targets
    Targets {
        #[command(subcommand)]
        command: TargetsCommand,
    },
    /// List recent scan runs with their coverage and trust status
    Runs {
        #[arg(long, default_value_t = 20)]
        limit: i64,
        /// Scope to a single target by handle
        #[arg(long)]
        target: Option<String>,
    },
    /// Behavioral pattern report for one target
    Patterns {
        #[arg(long)]
        target: String,
    },
}

#[derive(Debug, Subcommand)]
enum TargetsCommand {
    /// Seed/refresh tracked targets from the YAML targets file
    Sync,
    /// List tracked targets
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = churnwatch_core::load_app_config()?;

    let pool_config = churnwatch_db::PoolConfig::from_app_config(&config);
    let pool = churnwatch_db::connect_pool(&config.database_url, pool_config).await?;
    churnwatch_db::run_migrations(&pool).await?;

    match cli.command {
        Commands::Scan { target, dry_run } => {
            scan::run_scan(&pool, &config, target.as_deref(), dry_run).await?;
        }
        Commands::Targets { command } => match command {
            TargetsCommand::Sync => targets::run_targets_sync(&pool, &config).await?,
            TargetsCommand::List => targets::run_targets_list(&pool).await?,
        },
        Commands::Runs { limit, target } => {
            report::run_runs(&pool, limit, target.as_deref()).await?;
        }
        Commands::Patterns { target } => {
            report::run_patterns(&pool, &config, &target).await?;
        }
    }

    Ok(())
}
