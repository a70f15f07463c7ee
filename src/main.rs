//! practice-sync operator CLI
//!
//! Inspect and drive the local sync engine: print stats, force a pass, run
//! retention cleanup, or list abandoned mutations.

use clap::{Parser, Subcommand};
use practice_sync::remote::HttpRemoteApi;
use practice_sync::sync::{ConnectivitySignal, SyncEngine, SyncOutcome};
use practice_sync::{Config, LocalDatabase, SyncError};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "practice-sync", version, about = "Offline-first sync engine for practice data")]
struct Cli {
    /// Local database file (overrides PRACTICE_SYNC_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Remote API base URL (overrides PRACTICE_SYNC_API_URL)
    #[arg(long, global = true)]
    server_url: Option<String>,

    /// Start with the connectivity signal offline
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print record counts, pending mutations and the last sync time
    Status,
    /// Force one sync pass
    Sync,
    /// Run retention cleanup once
    Cleanup,
    /// List abandoned mutations
    Failures {
        /// Maximum rows to print
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(url) = cli.server_url {
        config = config.with_server_url(url)?;
    }
    if let Some(path) = cli.db {
        config = config.with_database_path(path);
    }

    let db = Arc::new(LocalDatabase::open(config.database_path()).await?);
    let remote = Arc::new(HttpRemoteApi::new(
        config.server_url(),
        config.token().map(str::to_string),
        config.sync().request_timeout(),
    )?);
    let connectivity = ConnectivitySignal::new(!cli.offline);
    let engine = SyncEngine::new(db.clone(), remote, connectivity, config.sync().clone())?;

    match cli.command {
        Command::Status => {
            let stats = engine.get_stats().await?;
            println!("scenarios:    {}", stats.scenarios);
            println!("sessions:     {}", stats.sessions);
            println!("progress:     {}", stats.progress);
            println!("pending sync: {}", stats.pending_sync);
            println!("abandoned:    {}", stats.abandoned);
            match stats.last_sync {
                Some(at) => println!("last sync:    {}", at.to_rfc3339()),
                None => println!("last sync:    never"),
            }
            println!("online:       {}", stats.is_online);
        }
        Command::Sync => match engine.force_sync().await {
            Ok(SyncOutcome::Completed(report)) => {
                println!(
                    "applied {}, retried {}, abandoned {}, deferred {}",
                    report.applied, report.retried, report.abandoned, report.deferred
                );
                if let Some(cleanup) = report.cleanup {
                    println!("cleanup removed {} sessions", cleanup.sessions_removed);
                }
            }
            Ok(SyncOutcome::AlreadyRunning) => println!("a sync pass is already running"),
            Ok(SyncOutcome::SkippedOffline) | Err(SyncError::OfflineForceSync) => {
                eprintln!("cannot sync while offline");
                std::process::exit(2);
            }
            Err(e) => return Err(e.into()),
        },
        Command::Cleanup => {
            let stats = engine.run_cleanup().await?;
            println!(
                "removed {} sessions ({} kept pending sync), pruned {} failure records",
                stats.sessions_removed, stats.sessions_kept_pending, stats.failures_pruned
            );
        }
        Command::Failures { limit } => {
            let failures = db.abandoned_mutations(limit).await?;
            if failures.is_empty() {
                println!("no abandoned mutations");
            }
            for failure in failures {
                println!(
                    "{}  {} {} {}  retries={}  {}",
                    failure.abandoned_at.to_rfc3339(),
                    failure.operation,
                    failure.entity_kind,
                    failure.record_id,
                    failure.retry_count,
                    failure.last_error.as_deref().unwrap_or("-")
                );
            }
        }
    }

    Ok(())
}
