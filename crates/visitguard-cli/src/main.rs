mod report;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::report::ReportCommands;

#[derive(Debug, Parser)]
#[command(name = "visitguard-cli")]
#[command(about = "visitguard command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Read-only visit reports
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("visitguard-cli ready; run with --help for commands");
        return Ok(());
    };

    let config = visitguard_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let pool_config = visitguard_db::PoolConfig::from_app_config(&config);
    let pool = visitguard_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => {
                visitguard_db::health_check(&pool).await?;
                println!("database reachable");
            }
            DbCommands::Migrate => {
                let applied = visitguard_db::run_migrations(&pool).await?;
                tracing::info!(applied, "migrations complete");
                println!("applied {applied} migration(s)");
            }
        },
        Commands::Report { command } => {
            report::run(&pool, &config, command).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests;
