// Library exports for the server binary and tests
pub mod config;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use config::Config;
use models::registration::FieldSchema;
use services::flash::FlashSigner;
use services::notify::Notifier;
use services::storage::CsvStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub schema: FieldSchema,
    pub store: Arc<CsvStore>,
    pub notifier: Arc<Notifier>,
    pub flash: FlashSigner,
}
