use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use waybill_ai::{Engine, OpenAiBackend};
use waybill_conversation::SessionManager;
use waybill_server::{
    app::{self, AppState},
    chat::ChatService,
    config::ServerConfig,
    tools::shipping_tools,
};
use waybill_store::TtlStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from file and environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    // Connect the store; nothing works without it
    let store = TtlStore::from_config(&config.store);
    if let Err(report) = store.initialize().await {
        tracing::error!(backend = store.backend_name(), "Store unavailable: {}", report);
        std::process::exit(1);
    }
    tracing::info!(backend = store.backend_name(), "Store initialized");

    let backend =
        OpenAiBackend::new(config.llm.clone()).expect("failed to build reasoning backend");
    if config.llm.api_key.is_none() {
        tracing::warn!("No LLM API key configured; every turn will get the fallback reply");
    }

    let engine = Engine::new(Arc::new(backend), shipping_tools(), config.engine);
    let sessions = SessionManager::new(store.clone(), config.session.clone());
    let chat = ChatService::new(sessions, engine, config.turn_timeout());

    let addr = config.server.bind_address();
    let app = app::router(Arc::new(AppState::new(chat, store.clone(), config)));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    store.close().await;
    tracing::info!("Shut down");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
