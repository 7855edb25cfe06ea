use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sea_orm::{ConnectOptions, Database};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use eventos_backend::config::ServerConfig;
use eventos_backend::dispatch::DispatchEngine;
use eventos_backend::notifications::senders::email::EmailSender;
use eventos_backend::notifications::senders::push::PushSender;
use eventos_backend::session::MemorySessionStore;
use eventos_backend::web::create_axum_router;

#[derive(Parser, Debug)]
#[command(name = "eventos-server", about = "Notification dispatch and templating server")]
struct Args {
    /// Override LISTEN_ADDR from the environment.
    #[arg(long)]
    listen_addr: Option<String>,
}

fn init_logging() {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily("logs", "server.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sea_orm=warn,sqlx::query=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal.");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    init_logging();

    let args = Args::parse();
    let mut config = ServerConfig::from_env()?;
    if let Some(listen_addr) = args.listen_addr {
        config.listen_addr = listen_addr;
    }
    let config = Arc::new(config);

    let mut connect_options = ConnectOptions::new(config.database_url.clone());
    connect_options
        .max_connections(10)
        .connect_timeout(Duration::from_secs(10));
    let db = Arc::new(Database::connect(connect_options).await?);
    info!("Database connection established.");

    let email = Arc::new(EmailSender::new(config.email.clone())?);
    let push = Arc::new(PushSender::new(config.push.clone()));
    let engine = Arc::new(DispatchEngine::new(
        db.clone(),
        email,
        push,
        config.dispatch.clone(),
    ));

    tokio::spawn(engine.clone().start_periodic_dispatch());

    let sessions = Arc::new(MemorySessionStore::new());
    let app_router = create_axum_router(db, engine, sessions, config.clone());

    info!(listen_addr = %config.listen_addr, "HTTP server listening.");
    let listener = TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app_router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
