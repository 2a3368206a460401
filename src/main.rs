use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tracing_subscriber::EnvFilter;

use sheet_tickets::config::Config;
use sheet_tickets::notify::{DisabledNotifier, Notifier, SmtpNotifier};
use sheet_tickets::sheet::{GoogleSheetReader, SheetSource};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env().expect("Failed to load configuration");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(&config.log_level)
        }))
        .init();

    tracing::info!("Starting sheet-tickets");

    let pool = sheet_tickets::db::connect(&config.database_url)
        .await
        .expect("Failed to open database");

    tracing::info!("Migrations applied");

    let sheet: Arc<dyn SheetSource> = Arc::new(
        GoogleSheetReader::from_config(&config.sheet, config.timeout)
            .expect("Failed to configure Google Sheets access"),
    );

    let notifier: Arc<dyn Notifier> = match &config.smtp {
        Some(smtp) => {
            let notifier = SmtpNotifier::new(smtp, config.timeout).expect("Failed to configure SMTP");
            tracing::info!("SMTP configured ({}:{})", smtp.host, smtp.port);
            Arc::new(notifier)
        }
        None => {
            tracing::warn!("MAIL_USER/MAIL_PASS not set, ticket emails are disabled");
            Arc::new(DisabledNotifier)
        }
    };

    let addr = SocketAddr::new(config.host, config.port);
    let (app, _state) = sheet_tickets::build_app(pool, config, sheet, notifier)?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
