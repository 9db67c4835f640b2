use clap::{Parser, Subcommand};
use retail_ledger::{config, migrator::Migrator};
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "migration", about = "Apply or inspect retail-ledger schema migrations")]
struct Cli {
    #[arg(long, help = "Database URL; defaults to the configured one")]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending migrations (default)
    Up,
    /// Roll back the last `steps` migrations
    Down {
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// List applied and pending migrations
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let app_config = config::load_config()?;
    config::init_tracing(app_config.log_level(), app_config.log_json);

    let database_url = cli
        .database_url
        .unwrap_or_else(|| app_config.database_url.clone());
    info!("Connecting to database: {}", database_url);

    let mut options = ConnectOptions::new(database_url);
    options
        .max_connections(2)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(app_config.db_connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(app_config.db_acquire_timeout_secs))
        .sqlx_logging(false);
    let db = Database::connect(options).await?;

    let outcome = match cli.command.unwrap_or(Command::Up) {
        Command::Up => Migrator::up(&db, None).await,
        Command::Down { steps } => Migrator::down(&db, Some(steps)).await,
        Command::Status => Migrator::status(&db).await,
    };

    match outcome {
        Ok(()) => {
            info!("Migration command completed");
            Ok(())
        }
        Err(e) => {
            error!("Migration failed: {}", e);
            Err(e.into())
        }
    }
}
