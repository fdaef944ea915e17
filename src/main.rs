use std::fs::OpenOptions;
use std::io::Write;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use licensegate::{
    build_router,
    config::{Config, ConfigHandle, Tunables},
    crypto::keys::{generate_api_key, generate_jwt_secret},
    state::AppState,
};

#[derive(Parser, Debug)]
#[command(name = "licensegate")]
#[command(about = "License validation and account server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the server
    Start,
    /// Print a fresh API_KEY and JWT_SECRET
    Gen {
        /// Length of the API key
        #[arg(long, default_value_t = 32)]
        api_key_size: usize,

        /// Random bytes behind the JWT secret
        #[arg(long, default_value_t = 64)]
        jwt_secret_size: usize,

        /// Append the values to .env
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    match Cli::parse().command {
        Command::Start => start().await,
        Command::Gen {
            api_key_size,
            jwt_secret_size,
            write,
        } => generate(api_key_size, jwt_secret_size, write),
    }
}

async fn start() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let tunables = Tunables::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    let handle = ConfigHandle::new(config, tunables);
    if let Some(path) = handle.config().config_path.clone() {
        if let Err(e) = handle.reload_from(&path).await {
            tracing::warn!("⚠️  Using built-in tunables: {:#}", e);
        }
    }

    let state = AppState::connect(handle.clone()).await?;
    tracing::info!("✅ AppState initialized");

    let cancel = CancellationToken::new();
    let refresher = handle.spawn_refresh(cancel.clone());

    let app = build_router(state.clone());
    let addr = handle.config().bind_addr.clone();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Cannot bind {}", addr))?;

    tracing::info!("🚀 Server listening on http://{}", addr);
    tracing::info!("✅ All systems operational");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("🛑 Shutting down");
    cancel.cancel();
    if let Some(task) = refresher {
        if let Err(e) = task.await {
            tracing::debug!("Config refresher ended abnormally: {}", e);
        }
    }
    state.close().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("❌ Cannot listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => tracing::error!("❌ Cannot listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn generate(api_key_size: usize, jwt_secret_size: usize, write: bool) -> anyhow::Result<()> {
    let api_key = generate_api_key(api_key_size);
    let jwt_secret = generate_jwt_secret(jwt_secret_size);
    let lines = format!("API_KEY={}\nJWT_SECRET={}\n", api_key, jwt_secret);

    print!("{}", lines);

    if write {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(".env")
            .context("Cannot open .env")?;
        file.write_all(lines.as_bytes())
            .context("Cannot write .env")?;
        tracing::info!("✅ Keys appended to .env");
    }

    Ok(())
}
