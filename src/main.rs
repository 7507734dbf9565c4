use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pamelding_api::config::Config;
use pamelding_api::models::registration::FieldSchema;
use pamelding_api::routes;
use pamelding_api::services::flash::FlashSigner;
use pamelding_api::services::notify::Notifier;
use pamelding_api::services::storage::CsvStore;
use pamelding_api::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let schema = FieldSchema::from_config(&config);
    let store = Arc::new(CsvStore::new(&config, schema.clone()));
    store.ensure_initialized().await?;
    if store.disabled() {
        info!("CSV log disabled by configuration");
    } else {
        info!("CSV log at {}", config.csv_path().display());
    }

    let notifier = Arc::new(Notifier::new(config.clone())?);
    if config.notify_email.is_none() {
        info!("NOTIFY_EMAIL not set — organizer notifications disabled");
    }

    let state = AppState {
        flash: FlashSigner::new(&config.secret_key),
        config: config.clone(),
        schema,
        store,
        notifier,
    };

    let app = Router::new()
        .route("/", get(routes::pages::index))
        .route("/health", get(routes::pages::health_check))
        .route("/img/{*path}", get(routes::pages::image_asset))
        .route("/submit", post(routes::submit::submit))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Registration form listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
