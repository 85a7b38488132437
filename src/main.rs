use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tera::Tera;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sputterview::config::AppConfig;
use sputterview::web::{create_router, AppState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

fn init_logging(debug: bool) {
    let default_filter = if debug {
        "debug,sqlx::query=info"
    } else {
        "info,sqlx::query=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stdout))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    let config = Arc::new(AppConfig::load(&args.config)?);
    init_logging(config.debug);

    // Lazy pool: file-only deployments may not have a database at all, and
    // the store is never written by this service.
    let db_options = SqliteConnectOptions::new()
        .filename(&config.database)
        .read_only(true);
    let db = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_lazy_with(db_options);

    let templates = Tera::new(&config.template_glob)?;
    let state = Arc::new(AppState::new(config.clone(), db, templates));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, prefix = ?config.url_prefix, "sputterview listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to install ctrl-c handler");
    }
}
