//! rollcall-mentor - classroom roll-call and absence notification service
//!
//! Serves the student directory, the roll-call workflow and its SSE stream.
//! With `--seed <roster.json>` it replaces the roster and exits instead.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rollcall_common::config::{self, CliOverrides, TomlConfig};
use rollcall_common::events::EventBus;
use rollcall_common::models::Student;
use rollcall_common::{db, time, SystemClock};
use rollcall_mentor::services::{GeminiClient, OverrideRecipient, SmsDispatcher, TextBeeDispatcher};
use rollcall_mentor::{build_router, AppState, Collaborators};
use sqlx::SqlitePool;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for rollcall-mentor
#[derive(Parser, Debug)]
#[command(name = "rollcall-mentor")]
#[command(about = "Classroom roll-call and absence notification service")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Folder holding rollcall.db
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Replace the roster with this JSON file and exit
    #[arg(long, value_name = "ROSTER")]
    seed: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG wins; otherwise the configured level is applied once config is loaded
    let env_filter = EnvFilter::try_from_default_env().ok();
    let rust_log_set = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting rollcall-mentor v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let config = config::load_config(&CliOverrides {
        config_path: args.config.clone(),
        root_folder: args.root_folder.clone(),
        port: args.port,
    });

    if !rust_log_set {
        let level = config.logging.level.as_str();
        match EnvFilter::try_new(level) {
            Ok(filter) => {
                if let Err(e) = filter_handle.reload(filter) {
                    warn!("Could not apply log level {}: {}", level, e);
                }
            }
            Err(e) => warn!("Ignoring invalid log level {}: {}", level, e),
        }
    }

    let root_folder = config.root_folder();
    config::ensure_root_folder(&root_folder).context("Failed to initialize root folder")?;
    info!("Root folder: {}", root_folder.display());

    let db_path = config.database_path();
    let pool = db::init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    info!("Database: {}", db_path.display());

    if let Some(roster_path) = &args.seed {
        return seed_roster(&pool, roster_path).await;
    }

    let collaborators = build_collaborators(&config)?;
    let event_bus = EventBus::new(100);
    let state = AppState::new(
        pool,
        event_bus,
        collaborators,
        time::millis_to_duration(config.workflow.stage_clear_ms),
    );
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port()));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://127.0.0.1:{}/health", config.port());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

fn build_collaborators(config: &TomlConfig) -> Result<Collaborators> {
    let generator = GeminiClient::new(&config.composer).context("Failed to create composer client")?;
    if !generator.is_configured() {
        warn!("No composer API key configured; absence messages will use templates");
    }

    let gateway = TextBeeDispatcher::new(&config.sms).context("Failed to create SMS client")?;
    if !gateway.is_configured() {
        warn!("SMS gateway not configured; every dispatch will fail");
    }

    let dispatcher: Arc<dyn SmsDispatcher> = match &config.sms.override_recipient {
        Some(number) => {
            warn!("All SMS will be sent to override recipient {}", number);
            Arc::new(OverrideRecipient::new(Arc::new(gateway), number.clone()))
        }
        None => Arc::new(gateway),
    };

    Ok(Collaborators {
        generator: Arc::new(generator),
        dispatcher,
        clock: Arc::new(SystemClock),
    })
}

async fn seed_roster(pool: &SqlitePool, roster_path: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(roster_path)
        .await
        .with_context(|| format!("Failed to read roster {}", roster_path.display()))?;
    let roster: Vec<Student> =
        serde_json::from_str(&content).context("Roster is not a JSON array of students")?;

    let count = db::students::replace_roster(pool, &roster)
        .await
        .context("Failed to replace roster")?;
    info!("Seeded {} students from {}", count, roster_path.display());
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
