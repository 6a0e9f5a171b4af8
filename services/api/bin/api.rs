//! Main Entrypoint for the Samtale API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the database connection pool and running migrations.
//! 3. Initializing shared services (the model gateway, the scenario
//!    catalogue, and the optional speech synthesizer).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use samtale_api::{
    auth::AuthService,
    config::Config,
    db::Db,
    router::create_router,
    scenarios::FileScenarioStore,
    speech::AzureSynthesizer,
    state::AppState,
};
use samtale_core::{gateway::OpenAIChatGateway, scenario::ScenarioStore};
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Database ---
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let db = Arc::new(Db::new(pool));
    db.run_migrations().await?;
    info!("Database connection established and migrations are up-to-date.");

    // --- 4. Initialize Shared Services ---
    let auth = Arc::new(AuthService::new(
        db.clone(),
        config.staff_email_domain.clone(),
        config.staff_role_overrides.clone(),
    ));
    auth.bootstrap_if_empty().await?;

    let scenarios: Arc<dyn ScenarioStore> =
        Arc::new(FileScenarioStore::load(&config.scenarios_path)?);

    let mut openai_config = OpenAIConfig::new().with_api_key(&config.model_api_key);
    if let Some(base) = &config.model_api_base {
        openai_config = openai_config.with_api_base(base);
    }
    let gateway = Arc::new(
        OpenAIChatGateway::new(openai_config, config.chat_model.clone())
            .with_timeout(config.model_timeout),
    );

    let synthesizer = config
        .speech
        .as_ref()
        .map(|speech| Arc::new(AzureSynthesizer::new(speech)));
    if synthesizer.is_none() {
        info!("Speech credentials not configured; replies will not be read aloud.");
    }

    let app_state = Arc::new(AppState {
        db,
        auth,
        gateway,
        scenarios,
        synthesizer,
        config: Arc::new(config.clone()),
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        model = %config.chat_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
