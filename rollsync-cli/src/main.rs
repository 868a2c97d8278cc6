use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rollsync::{RegistrationRecord, SyncConfig, SyncEngine, SyncPolicy};
use rollsync_backends::{parts_from_config, SheetsClient, StaticSession};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rollsync", about = "Offline-first attendance registration sync")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, env = "ROLLSYNC_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,
    /// Access token of the signed-in user; without it `sync` does nothing
    #[arg(long, env = "ROLLSYNC_SESSION_TOKEN", hide_env_values = true)]
    session_token: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Register one attendance, delivering it now or queueing it
    Submit {
        /// Catalog id of the person
        #[arg(long, conflicts_with = "name", required_unless_present = "name")]
        person: Option<String>,
        /// Name typed by hand, for people missing from the catalog
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        community: String,
        #[arg(long)]
        role: String,
        #[arg(long)]
        instrument: Option<String>,
        #[arg(long, default_value = "")]
        location: String,
        #[arg(long, env = "ROLLSYNC_SUBMITTED_BY", default_value = "")]
        submitted_by: String,
        /// RFC 3339 timestamp; defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Refresh reference data and drain the queue once
    Sync,
    /// List pending registrations
    Queue,
    /// Keep running, syncing whenever connectivity comes back
    Watch,
    /// Ask the spreadsheet to rebuild the roster export for a location
    RefreshExport {
        #[arg(long)]
        location: String,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_engine(config: &SyncConfig, session_token: Option<String>) -> rollsync::Result<Arc<SyncEngine>> {
    let parts = parts_from_config(config, StaticSession::new(session_token));
    let engine = SyncEngine::open(parts, config, SyncPolicy::default())?;
    rollsync::set_global_engine(Arc::clone(&engine));
    Ok(engine)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    let config = SyncConfig::load_or_default(&cli.data_dir);

    match cli.command {
        Command::Submit {
            person,
            name,
            community,
            role,
            instrument,
            location,
            submitted_by,
            at,
        } => {
            let engine = open_engine(&config, cli.session_token)?;
            let at = at.unwrap_or_else(Utc::now);
            let mut record = match (person, name) {
                (Some(person), _) => RegistrationRecord::new(person, community, role, at),
                (None, Some(name)) => RegistrationRecord::manual(&name, community, role, at),
                (None, None) => return Err("either --person or --name is required".into()),
            }
            .with_location(location)
            .with_submitted_by(submitted_by);
            if let Some(instrument) = instrument {
                record = record.with_instrument(instrument);
            }

            let outcome = engine.create_registration(record).await;
            if outcome.is_blocking() {
                return Err(outcome.user_message().into());
            }
            println!("{}", outcome.user_message());
            Ok(())
        }
        Command::Sync => {
            let engine = open_engine(&config, cli.session_token)?;
            let summary = engine.sync_all().await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::Queue => {
            let engine = open_engine(&config, cli.session_token)?;
            let pending = engine.pending()?;
            println!("{} pending", pending.len());
            for record in &pending {
                println!("{}", serde_json::to_string(record)?);
            }
            Ok(())
        }
        Command::Watch => {
            let engine = open_engine(&config, cli.session_token)?;
            let monitor = engine.spawn_monitor();
            tracing::info!("[SYNC] watching connectivity, Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            monitor.abort();
            Ok(())
        }
        Command::RefreshExport { location } => {
            let Some(url) = config.sheets_url.clone() else {
                return Err("ROLLSYNC_SHEETS_URL is not configured".into());
            };
            let calendar = rollsync::LocalCalendar::from_offset_minutes(config.utc_offset_minutes);
            SheetsClient::new(url, calendar)
                .request_export_refresh(&location)
                .await?;
            Ok(())
        }
    }
}
