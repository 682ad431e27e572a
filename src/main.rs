mod cache;
mod config;
mod fetch;
mod manifest;
mod request;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cache::{CacheController, CacheStorage, SqliteStorage};
use fetch::HttpFetcher;
use request::ResourceRequest;

#[derive(Parser, Debug)]
#[command(name = "numcache")]
#[command(about = "Offline asset cache for the numbers learning app")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/numcache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Application origin to fetch assets from
  #[arg(long)]
  origin: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Seed the static namespace with the full asset manifest
  Install,
  /// Evict caches left over from prior versions
  Activate,
  /// Route one request through the cache controller
  Fetch {
    /// Asset path, e.g. /sounds/numbers/5.mp3
    path: String,

    /// Treat the request as a top-level navigation
    #[arg(long)]
    navigate: bool,

    /// Write the response body to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// Report cached namespaces and entry counts
  Status,
}

/// Initialize the tracing subscriber for logging.
fn init_tracing() {
  // RUST_LOG controls the level (e.g. RUST_LOG=debug)
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::registry()
    .with(fmt::layer().with_writer(std::io::stderr))
    .with(filter)
    .init();
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  init_tracing();

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  // Override origin if specified on command line
  let config = if let Some(origin) = args.origin {
    config::Config { origin, ..config }
  } else {
    config
  };

  let origin = config.origin_url()?;
  let storage = match &config.cache_path {
    Some(path) => SqliteStorage::open_at(path)?,
    None => SqliteStorage::open()?,
  };
  let fetcher = HttpFetcher::new()?;
  let controller = CacheController::new(storage, fetcher, origin.clone());

  match args.command {
    Command::Install => controller.install().await?,
    Command::Activate => controller.activate().await?,
    Command::Fetch {
      path,
      navigate,
      output,
    } => {
      let url = origin
        .join(&path)
        .map_err(|e| color_eyre::eyre::eyre!("Invalid asset path {}: {}", path, e))?;
      let request = if navigate {
        ResourceRequest::navigation(url)
      } else {
        ResourceRequest::subresource(url)
      };

      let snapshot = controller.intercept(&request).await?;
      controller.settle().await;

      info!(status = snapshot.status, bytes = snapshot.body.len(), "fetch complete");
      match output {
        Some(file) => std::fs::write(&file, &snapshot.body)?,
        None => std::io::stdout().write_all(&snapshot.body)?,
      }
    }
    Command::Status => {
      let summaries = controller.storage().summaries()?;
      if summaries.is_empty() {
        println!("cache is empty");
      }
      for namespace in summaries {
        let last = namespace
          .last_cached
          .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
          .unwrap_or_else(|| "never".to_string());
        println!(
          "{}  {} entries  last cached {}",
          namespace.name, namespace.entries, last
        );
      }
    }
  }

  Ok(())
}
