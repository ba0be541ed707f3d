use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lessonbook::{create_router, init_pool, run_migrations, AppState, Config};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            eprintln!("Optional: DATABASE_URL (default: sqlite://lessonbook.db)");
            eprintln!("Optional: LISTEN_ADDR (default: 0.0.0.0:3000)");
            eprintln!("Optional: CONFLICT_POLICY (fail-open | fail-closed)");
            eprintln!("Optional: RATES_URL, RATES_TTL_SECS (default: 3600)");
            std::process::exit(1);
        }
    };

    tracing::info!("Starting lessonbook server");
    tracing::info!("Listen address: {}", config.listen_addr);
    tracing::info!("Database: {}", config.database_url);
    tracing::info!("Conflict policy: {:?}", config.conflict_policy);
    match &config.rates_url {
        Some(url) => tracing::info!("Rates: {} (ttl {:?})", url, config.rates_ttl),
        None => tracing::info!("Rates: not configured"),
    }

    // Connect to database
    let pool = match init_pool(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Database connection error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run_migrations(&pool).await {
        eprintln!("Migration error: {}", e);
        std::process::exit(1);
    }
    tracing::info!("Database migrations completed");

    let state = AppState::from_config(pool, &config);
    let app = create_router(state);

    let listener = match tokio::net::TcpListener::bind(config.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", config.listen_addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server running at http://{}", config.listen_addr);

    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
