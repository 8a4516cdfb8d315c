//! stratus mock control-plane server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens an
//! in-process SQLite store, and serves the mock cloud API over HTTP.
//! Every setting has a default, so the server runs with no config file
//! at all: an in-memory store on port 8080.
//!
//! # Echo mode
//!
//! `--echo` swaps the whole API for a catch-all that logs every request
//! and answers `{"ok": true}`. Useful for discovering which paths a
//! provider actually calls before mocking them:
//!
//! ```
//! cargo run -p stratus-api --bin server -- --echo
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use stratus_api::{AppState, ServerConfig};
use stratus_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Mock cloud control-plane server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Listen port; overrides the config file.
  #[arg(short, long)]
  port: Option<u16>,

  /// SQLite database path; `:memory:` keeps all state in process.
  #[arg(long)]
  db: Option<String>,

  /// Serve a catch-all that logs every request instead of the real API.
  #[arg(long)]
  echo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Flags override the environment, which overrides the file.
  let settings = config::Config::builder()
    .set_default("host", "0.0.0.0")?
    .set_default("port", 8080)?
    .set_default("db_path", ":memory:")?
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("STRATUS"))
    .set_override_option("port", cli.port)?
    .set_override_option("db_path", cli.db)?
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let app = if cli.echo {
    tracing::info!("echo mode: logging all requests, answering 200");
    stratus_api::echo_router()
  } else {
    let store = if server_cfg.db_path == ":memory:" {
      SqliteStore::open_in_memory().await
    } else {
      SqliteStore::open(&server_cfg.db_path).await
    }
    .with_context(|| {
      format!("failed to open store at {:?}", server_cfg.db_path)
    })?;
    stratus_api::router(AppState { store: Arc::new(store) })
  };

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
