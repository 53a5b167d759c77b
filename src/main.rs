//! shgate - shell scripts over HTTP for `curl | sh`

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shgate::{
    auth::spawn_token_sweep_task,
    config::Args,
    db::{MemoryStore, ScriptStore, SqliteStore},
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("shgate={},info", args.log_level).into());
    tracing_subscriber::registry()
        .with(filter)
        .with(args.log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!args.log_json).then(|| tracing_subscriber::fmt::layer()))
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  shgate - scripts for curl | sh");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Public URL: {}", args.base_url());
    if args.in_memory {
        info!("Storage: in-memory");
    } else {
        info!("Storage: SQLite at {}", args.db_path.display());
    }
    info!("Admin API: {}", if args.admin_token().is_some() { "token required" } else { "OPEN" });
    info!("Token sweep: every {}s", args.token_sweep_secs);
    info!("======================================");

    let store: Arc<dyn ScriptStore> = if args.in_memory {
        warn!("In-memory storage - scripts will be lost on restart");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(SqliteStore::open(&args.db_path)?)
    };

    spawn_token_sweep_task(
        Arc::clone(&store),
        Duration::from_secs(args.token_sweep_secs),
    );

    let state = Arc::new(AppState::new(args, store));
    server::run(state).await?;

    Ok(())
}
