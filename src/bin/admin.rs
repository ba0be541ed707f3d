//! Operational batch jobs for the lessonbook database.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lessonbook::jobs::{self, JobReport};
use lessonbook::{init_pool, run_migrations, StorageError};

/// Run maintenance jobs against a lessonbook database
#[derive(Parser)]
#[command(name = "lessonbook-admin")]
#[command(about = "lessonbook-admin - Maintenance jobs for the lessonbook database", long_about = None)]
#[command(version)]
struct Cli {
    /// Database to operate on
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://lessonbook.db")]
    database_url: String,

    /// Report what would change without writing anything
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite student phone numbers into +<country><number> form
    NormalizePhones {
        /// Country calling code for numbers without one
        #[arg(long)]
        country_code: String,
    },
    /// Assign a school to rows created before multi-tenancy
    BackfillSchoolId {
        #[arg(long, env = "DEFAULT_SCHOOL_ID", default_value = "default")]
        school_id: String,
    },
    /// Remove sessions of cancelled or deleted subscriptions
    CleanupSubscriptions,
}

async fn run(cli: Cli) -> Result<JobReport, StorageError> {
    let pool = init_pool(&cli.database_url).await?;
    run_migrations(&pool).await?;

    let report = match cli.command {
        Commands::NormalizePhones { country_code } => {
            jobs::normalize_phones(&pool, &country_code, cli.dry_run).await?
        }
        Commands::BackfillSchoolId { school_id } => {
            jobs::backfill_school_id(&pool, &school_id, cli.dry_run).await?
        }
        Commands::CleanupSubscriptions => jobs::cleanup_subscriptions(&pool, cli.dry_run).await?,
    };

    pool.close().await;
    Ok(report)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Commands::NormalizePhones { country_code } = &cli.command {
        let digits = country_code.trim_start_matches('+');
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            eprintln!("--country-code must be digits only");
            std::process::exit(2);
        }
    }

    match run(cli).await {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to render report: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("Job failed: {}", e);
            std::process::exit(1);
        }
    }
}
