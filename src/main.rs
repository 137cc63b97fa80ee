#![allow(clippy::result_large_err)]

use dotenvy::dotenv;
use std::{sync::Arc, time::Duration};
use storefront::{
    api::{self, AppState},
    config::{
        AppConfig,
        database::{create_connection, create_tables},
    },
    core::sync::run_periodic_sync,
    email::{LogMailer, Mailer},
    errors::Result,
    payments::{OfflineGateway, PaymentGateway, StripeGateway},
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_PATH: &str = "config.toml";
/// Upper bound on how often the sync task checks whether a pass is due.
const SYNC_CHECK_EVERY: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env before anything reads the environment
    dotenv().ok();

    // 2. Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("storefront=info,tower_http=info")),
        )
        .init();

    // 3. Load the application configuration
    let config = AppConfig::from_file_and_env(CONFIG_PATH)
        .inspect_err(|e| error!("Critical error loading application configuration: {}", e))?;
    if config.admin_ids.is_empty() {
        warn!("No admin_ids configured; every admin route will be refused");
    }

    // 4. Initialize database
    let db = create_connection(&config.database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    create_tables(&db)
        .await
        .inspect(|()| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Payment gateway and mailer
    let gateway: Arc<dyn PaymentGateway> = if let Some(key) = &config.stripe_secret_key {
        info!("Using Stripe payment gateway");
        Arc::new(StripeGateway::new(key.clone()))
    } else {
        // Offline sessions live in memory only: orders paid before a restart cannot be
        // refunded through this gateway.
        warn!("STRIPE_SECRET_KEY not set; using the offline payment gateway");
        Arc::new(OfflineGateway::new())
    };
    let mailer: Arc<dyn Mailer> = Arc::new(LogMailer);

    // 6. Background inventory sync
    let check_every = Duration::from_secs(config.inventory_sync_interval_secs).min(SYNC_CHECK_EVERY);
    let db = Arc::new(db);
    tokio::spawn(run_periodic_sync(
        Arc::clone(&db),
        config.sync_interval(),
        check_every,
    ));

    // 7. Serve the API
    let port = config.http_port;
    let app = api::router(AppState {
        db,
        gateway,
        mailer,
        config: Arc::new(config),
    });
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .inspect_err(|e| error!("Failed to bind port {}: {}", port, e))?;
    info!("Listening on http://0.0.0.0:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
