use repurpose::config::Config;
use repurpose::state::AppState;
use repurpose::{db, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "repurpose=info,tower_http=info".into()),
        )
        .init();

    // Load config
    let config = Config::from_env()?;
    let port = config.port;

    tracing::info!("Starting repurpose server on port {}", port);

    let missing = config.missing_credentials();
    if !missing.is_empty() {
        tracing::warn!(?missing, "provider credentials missing; /api/anthropic will answer 500");
    }

    // Open database
    if let Some(dir) = std::path::Path::new(&config.database_path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let conn = db::open_db(&config.database_path)?;
    tracing::info!("Database initialized at {}", config.database_path);

    let state = AppState::new(conn, config);

    // Init health tracking
    routes::health::init_start_time();

    // Build router
    let app = routes::build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("Listening on 0.0.0.0:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
