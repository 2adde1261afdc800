//! Settle server
//!
//! Loads `config/<env>.yaml`, wires the register and mint stores, the replay
//! ledger and the authentication gate, then serves until Ctrl-C or until a
//! provisioning failure marked unrecoverable arrives on the fatal channel.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use settle::api_auth::{AuthGate, MemoryReplayLedger, PgReplayLedger, ReplayLedger};
use settle::config::AppConfig;
use settle::db::Database;
use settle::gateway::{self, state::AppState};
use settle::mint::{MemoryMintStore, MintStore, PgMintStore};
use settle::register::{MemoryRegisterStore, PgRegisterStore, RegisterStore, UserProvisioner};

#[derive(Parser, Debug)]
#[command(name = "settle")]
#[command(version, about = "Settle mint and register server")]
struct Args {
    /// Config environment, loads config/<env>.yaml
    #[arg(long, short, env = "SETTLE_ENV", default_value = "dev")]
    env: String,
}

async fn connect(name: &str, url: &str) -> anyhow::Result<Database> {
    let db = Database::connect(url)
        .await
        .with_context(|| format!("Failed to connect to {} store", name))?;
    db.health_check()
        .await
        .with_context(|| format!("{} store health check failed", name))?;
    info!(store = name, "Connected to PostgreSQL");
    Ok(db)
}

async fn register_store(config: &AppConfig) -> anyhow::Result<Arc<dyn RegisterStore>> {
    match &config.register_url {
        Some(url) => {
            let db = connect("register", url).await?;
            Ok(Arc::new(PgRegisterStore::new(db.pool().clone())))
        }
        None => {
            warn!("register_url not set, using in-memory register store");
            Ok(Arc::new(MemoryRegisterStore::new()))
        }
    }
}

async fn mint_stores(
    config: &AppConfig,
) -> anyhow::Result<(Arc<dyn MintStore>, Arc<dyn ReplayLedger>)> {
    match &config.mint_url {
        Some(url) => {
            let db = connect("mint", url).await?;
            Ok((
                Arc::new(PgMintStore::new(db.pool().clone())),
                Arc::new(PgReplayLedger::new(db.pool().clone())),
            ))
        }
        None => {
            warn!("mint_url not set, using in-memory mint store and replay ledger");
            Ok((
                Arc::new(MemoryMintStore::new()),
                Arc::new(MemoryReplayLedger::new()),
            ))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        return;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = AppConfig::load(&args.env)?;
    let log_guard = settle::logging::init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        env = %args.env,
        livemode = config.livemode,
        "Starting settle"
    );

    if config.livemode && (config.register_url.is_none() || config.mint_url.is_none()) {
        anyhow::bail!("livemode requires both register_url and mint_url");
    }

    let register = register_store(&config).await?;
    let (mint, ledger) = mint_stores(&config).await?;

    let gate = AuthGate::from_config(&config.auth, config.livemode, ledger)
        .context("Invalid auth.skip_list")?;
    let provisioner = UserProvisioner::new(register, mint, config.mint_identity.clone());

    let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel();
    let state = Arc::new(AppState::new(
        Arc::new(gate),
        Arc::new(provisioner),
        config.auth.challenge_batch_size,
        config.livemode,
        fatal_tx,
    ));

    let addr = config.server.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let server = gateway::serve(listener, gateway::router(state), shutdown_signal());

    tokio::select! {
        result = server => {
            result.context("Server error")?;
            info!("Server stopped");
            Ok(())
        }
        Some(err) = fatal_rx.recv() => {
            error!(error = %err, "Unrecoverable provisioning failure, stopping");
            drop(log_guard);
            std::process::exit(1);
        }
    }
}
