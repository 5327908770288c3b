//! tollgated — the Tollgate micropayment engine daemon.
//!
//! Startup sequence:
//!   1. Load configuration from `TOLLGATE_*` environment variables
//!   2. Open (or provision) the store and run pending migrations
//!   3. Build the engine (seller keypair, channel manager, chunk engine)
//!   4. Start the scheduler loops (auto-settle, check-expired)
//!   5. Wait for ctrl-c, then shut down cooperatively

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use tollgate_chain::HttpChain;
use tollgate_core::config::Config;
use tollgate_engine::Engine;
use tollgate_store::Store;

#[derive(Parser, Debug)]
#[command(
    name = "tollgated",
    version,
    about = "Tollgate — payment-channel micropayments for metered streaming"
)]
struct Args {
    /// Directory for the persistent store (overrides TOLLGATE_DATA_DIR).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Blockchain JSON-RPC endpoint (overrides TOLLGATE_RPC_URL).
    #[arg(long)]
    rpc_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tollgate=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let mut cfg = Config::from_env().context("loading configuration")?;
    if let Some(data_dir) = args.data_dir {
        cfg.data_dir = data_dir;
    }
    if let Some(rpc_url) = args.rpc_url {
        cfg.rpc_url = rpc_url;
    }
    info!("tollgated starting");

    // ── Store ─────────────────────────────────────────────────────────────────
    let data_dir = expand_tilde(&cfg.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;
    let store = Arc::new(Store::open(&data_dir).context("opening store")?);
    info!(schema_version = store.schema_version()?, "store ready");

    // ── Blockchain client ─────────────────────────────────────────────────────
    let chain = Arc::new(
        HttpChain::new(&cfg.rpc_url, Duration::from_secs(cfg.rpc_timeout_secs))
            .context("building blockchain client")?,
    );

    // ── Engine & schedulers ───────────────────────────────────────────────────
    let engine = Arc::new(Engine::new(&cfg, store, chain).context("building engine")?);
    let handles = engine.spawn_background_tasks();
    info!("engine ready");

    // ── Shutdown ──────────────────────────────────────────────────────────────
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutting down");
    engine.shutdown();
    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
