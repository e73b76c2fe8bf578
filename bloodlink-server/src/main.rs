//! BloodLink Server
//!
//! Matches blood requests to eligible donors, notifies them and records
//! who accepts.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use bloodlink_core::config::ConfigStore;
use bloodlink_core::email::{EmailSender, LogEmailSender, SmtpConfig, SmtpEmailSender};
use bloodlink_core::events::{
    BroadcastHub, Broker, EventBus, LocalRouter, MemoryBroker, PgBroker,
};
use bloodlink_core::framework::DatabaseProcessor;
use bloodlink_core::processors::EventConsumer;
use bloodlink_core::store::Stores;
use clap::Parser;
use config::file::BrokerKind;
use config::{ConfigLoader, LoadedConfig, get_database_url};
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// BloodLink - blood donor matching and notification service
#[derive(Parser, Debug)]
#[command(name = "bloodlink-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./bloodlink.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:5000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,

    /// Keep all data in memory instead of PostgreSQL
    #[arg(long, default_value = "false")]
    in_memory: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "BLOODLINK_LOG_JSON", default_value = "false")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(args.log_json);

    tracing::info!("Starting bloodlink-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let db_pool = if args.in_memory {
        if loaded_config.broker.kind == BrokerKind::Postgres {
            anyhow::bail!("broker kind \"postgres\" requires a database; drop --in-memory");
        }
        tracing::warn!("Running with in-memory storage, data is lost on exit");
        None
    } else {
        Some(connect_database(args.migrate).await?)
    };

    let stores = match &db_pool {
        Some(pool) => Stores::postgres(DatabaseProcessor::new(pool.clone())),
        None => Stores::in_memory(),
    };

    let hub = Arc::new(BroadcastHub::default());
    let email = build_email_sender(&loaded_config)?;
    let router = Arc::new(LocalRouter::new(hub.clone(), email.clone()));
    let broker = build_broker(&loaded_config, db_pool.as_ref());
    let bus = Arc::new(EventBus::new(broker, router.clone()));

    // Start consuming before serving so events queued but not handled by an
    // earlier run are delivered
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut consumer_handle = None;
    if bus.connect(loaded_config.broker.retry).await {
        match bus.subscribe_all(&loaded_config.broker.consumer_group).await {
            Some(subscription) => {
                let consumer = EventConsumer::new(router, subscription, shutdown_rx);
                consumer_handle = Some(tokio::spawn(consumer.run()));
            }
            None => tracing::warn!("Broker subscription failed, relying on local routing"),
        }
    }

    let fanout_config = ConfigStore::new(loaded_config.fanout.clone());
    let state = AppState::new(stores, hub, email, bus, fanout_config.clone());

    // Spawn config reload handler (listens for SIGHUP)
    let reload_notify = spawn_config_reload_handler(config_loader, fanout_config);

    let router = build_router(state);

    tracing::info!("Starting HTTP server on {}", loaded_config.listen);
    let result = run_server(router, loaded_config.listen).await;

    // Stop background loops
    reload_notify.notify_one();
    let _ = shutdown_tx.send(true);
    if let Some(handle) = consumer_handle {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Event consumer task failed");
        }
    }

    if let Some(pool) = db_pool {
        tracing::info!("Closing database connections...");
        pool.close().await;
    }
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

async fn connect_database(migrate: bool) -> anyhow::Result<PgPool> {
    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    if migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }
    Ok(db_pool)
}

/// SMTP when `SMTP_HOST` is set, otherwise messages are only logged.
fn build_email_sender(config: &LoadedConfig) -> anyhow::Result<Arc<dyn EmailSender>> {
    match SmtpConfig::from_env() {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "Sending email through SMTP");
            Ok(Arc::new(SmtpEmailSender::new(
                &smtp,
                config.email_from_name.clone(),
            )?))
        }
        None => {
            tracing::warn!("SMTP_HOST not set, outgoing email is logged only");
            Ok(Arc::new(LogEmailSender::new(config.email_from_name.clone())))
        }
    }
}

fn build_broker(config: &LoadedConfig, pool: Option<&PgPool>) -> Option<Arc<dyn Broker>> {
    match (config.broker.kind, pool) {
        (BrokerKind::Postgres, Some(pool)) => Some(Arc::new(PgBroker::new(
            DatabaseProcessor::new(pool.clone()),
            config.broker.poll_interval,
        ))),
        (BrokerKind::Postgres, None) | (BrokerKind::Disabled, _) => None,
        (BrokerKind::Memory, _) => Some(Arc::new(MemoryBroker::new())),
    }
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=debug"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
