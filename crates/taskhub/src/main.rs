//! # taskhub
//!
//! TaskHub command line: run the server, load demo data, or watch the
//! live-update channel.

#![deny(unsafe_code)]

mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use taskhub_client::{
    ConnectionState, EventDispatcher, LiveSubscription, ReconnectConfig, TaskBoard, WsConnector,
};
use taskhub_core::events::{NOTIFICATION, PROJECT_UPDATE, TASK_UPDATE};
use taskhub_core::MutationEvent;
use taskhub_server::{AuthManager, ServerConfig, TaskhubServer, seed_demo_data};
use taskhub_settings::TaskhubSettings;
use taskhub_store::{ConnectionConfig, Store};
use tracing::{info, warn};

/// TaskHub task management server.
#[derive(Parser, Debug)]
#[command(name = "taskhub", version, about = "TaskHub task management server")]
struct Cli {
    /// Settings file (defaults to `TASKHUB_SETTINGS` or `~/.taskhub/settings.json`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP + WebSocket server until Ctrl-C.
    Serve {
        /// Host to bind.
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (0 for auto-assign).
        #[arg(long)]
        port: Option<u16>,
        /// Path to the `SQLite` database.
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// Insert demo users, projects and tasks into empty tables.
    Seed {
        /// Path to the `SQLite` database.
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// Subscribe to live updates and log every event.
    Watch {
        /// WebSocket URL of the server.
        #[arg(long)]
        url: Option<String>,
    },
}

fn load_settings(cli: &Cli) -> Result<TaskhubSettings> {
    let settings = match &cli.config {
        Some(path) => taskhub_settings::load_settings_from_path(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => taskhub_settings::load_settings().context("failed to load settings")?,
    };
    Ok(settings)
}

fn open_store(settings: &TaskhubSettings, db_path: Option<PathBuf>) -> Result<Store> {
    let path = db_path.unwrap_or_else(|| settings.database.resolved_path());
    let config = ConnectionConfig {
        pool_size: settings.database.pool_size,
        busy_timeout_ms: settings.database.busy_timeout_ms,
    };
    Store::open(&path, &config).with_context(|| format!("failed to open {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings(&cli)?;
    logging::init_logging(&settings.logging);

    match cli.command {
        Command::Serve { host, port, db_path } => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            serve(&settings, db_path).await
        }
        Command::Seed { db_path } => seed(&settings, db_path),
        Command::Watch { url } => {
            if let Some(url) = url {
                settings.client.url = url;
            }
            watch(&settings).await
        }
    }
}

async fn serve(settings: &TaskhubSettings, db_path: Option<PathBuf>) -> Result<()> {
    let store = open_store(settings, db_path)?;
    let auth = AuthManager::from_settings(&settings.auth);
    let server = TaskhubServer::new(ServerConfig::from_settings(settings), store, auth);

    let (addr, handle) = server.listen().await.context("failed to bind server")?;
    info!(%addr, "taskhub ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutting down");
    server.shutdown().graceful_shutdown(vec![handle], None).await;
    Ok(())
}

fn seed(settings: &TaskhubSettings, db_path: Option<PathBuf>) -> Result<()> {
    let store = open_store(settings, db_path)?;
    let conn = store.pool().get().context("failed to get a database connection")?;
    let report = seed_demo_data(&conn).context("seeding failed")?;
    info!(
        users = report.users,
        projects = report.projects,
        tasks = report.tasks,
        "seed complete"
    );
    Ok(())
}

fn watch_dispatcher(board: &Arc<Mutex<TaskBoard>>) -> EventDispatcher {
    let dispatcher = EventDispatcher::new();

    let tasks = Arc::clone(board);
    dispatcher.on(TASK_UPDATE, move |event| {
        let mut board = tasks.lock();
        let changed = board.apply(event);
        if let MutationEvent::TaskUpdate(change) = event {
            info!(
                task_id = change.id().unwrap_or("?"),
                changed,
                tasks = board.len(),
                "task update"
            );
        }
    });
    dispatcher.on(PROJECT_UPDATE, |event| {
        if let MutationEvent::ProjectUpdate(change) = event {
            info!(project_id = change.id().unwrap_or("?"), "project update");
        }
    });
    dispatcher.on(NOTIFICATION, |event| {
        if let MutationEvent::Notification(n) = event {
            info!(title = n.title.as_deref().unwrap_or(""), message = %n.message, "notification");
        }
    });
    dispatcher
}

async fn watch(settings: &TaskhubSettings) -> Result<()> {
    let board = Arc::new(Mutex::new(TaskBoard::new()));
    let dispatcher = Arc::new(watch_dispatcher(&board));
    let subscription = LiveSubscription::new(
        WsConnector::new(settings.client.url.clone()),
        ReconnectConfig::from_settings(&settings.client),
        dispatcher,
    );
    let mut states = subscription.watch_state();
    subscription.connect()?;
    info!(url = %settings.client.url, "watching live updates");

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                info!(%state, "connection state");
                if state == ConnectionState::Failed {
                    subscription.disconnect().await;
                    bail!("gave up connecting to {}", settings.client.url);
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "failed to listen for ctrl-c");
                }
                break;
            }
        }
    }

    subscription.disconnect().await;
    Ok(())
}
