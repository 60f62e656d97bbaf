//! rodas-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered with
//! `RODAS_*` environment variables, opens the SQLite store and serves the
//! JSON API over HTTP.
//!
//! # Creating an administrator
//!
//! ```text
//! rodas-server --create-admin coord@example.org --name "Coordenação"
//! ```
//!
//! The password is read from stdin.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use rodas_server::{ServerConfig, app, build_state, create_admin, expand_tilde};
use rodas_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Esperança Sobre Rodas ride coordination server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Register an administrator with this e-mail, then exit.
  #[arg(long, value_name = "EMAIL", requires = "name")]
  create_admin: Option<String>,

  /// Display name for `--create-admin`.
  #[arg(long)]
  name: Option<String>,
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

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("RODAS"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Open SQLite store.
  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let state = build_state(Arc::new(store), &server_cfg);

  // Helper mode: create an administrator and exit.
  if let Some(email) = cli.create_admin {
    let name = cli.name.unwrap_or_default();
    let password = read_password()?;
    let admin = create_admin(&state.coordinator, &email, &name, &password)
      .await
      .context("failed to create administrator")?;
    println!("created administrator {} ({})", admin.email, admin.actor_id);
    return Ok(());
  }

  let address = server_cfg.address();
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app(state)).await.context("server error")?;

  Ok(())
}

/// Read a password line from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line).context("failed to read password")?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}
