use std::sync::Arc;
use std::time::Duration;

use basketbot_core::cart::CartService;
use basketbot_core::config::{AppConfig, ConfigError};
use basketbot_core::{CatalogLoadError, ConversationRuntime};
use basketbot_db::{connect_with_settings, migrations, DbPool, SqlCartStore};
use basketbot_telegram::{
    ApiError, BotApiClient, DispatcherSettings, PollingRunner, ReconnectPolicy, UserDispatcher,
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runtime: Arc<ConversationRuntime>,
    pub runner: PollingRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("catalog could not be loaded: {0}")]
    Catalog(#[from] CatalogLoadError),
    #[error("telegram client could not be built: {0}")]
    Telegram(#[source] ApiError),
}

/// Wires store, catalog, messenger and runtime together. Nothing talks to Telegram yet; the
/// first network call happens when the runner starts polling.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;

    let catalog = config.catalog.load()?;
    let catalog_source = match config.catalog.path.as_deref() {
        Some(path) => path.display().to_string(),
        None => "builtin".to_owned(),
    };
    info!(
        event_name = "system.bootstrap.catalog_loaded",
        correlation_id = "bootstrap",
        products = catalog.len(),
        currency = catalog.currency(),
        source = %catalog_source,
        "catalog loaded"
    );

    let client = Arc::new(
        BotApiClient::new(
            &config.telegram.api_base_url,
            config.telegram.bot_token.clone(),
            config.telegram.poll_timeout_secs,
        )
        .map_err(BootstrapError::Telegram)?,
    );

    let cart = CartService::new(Arc::new(SqlCartStore::new(db_pool.clone())), Arc::new(catalog));
    let runtime =
        Arc::new(ConversationRuntime::new(cart, client.clone(), config.admins.user_ids.clone()));
    let dispatcher = UserDispatcher::new(
        runtime.clone(),
        DispatcherSettings {
            shutdown_timeout: Duration::from_secs(config.server.graceful_shutdown_secs),
            ..DispatcherSettings::default()
        },
    );
    let runner = PollingRunner::new(client, dispatcher, ReconnectPolicy::default());

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        admins = config.admins.user_ids.len(),
        "application wired"
    );

    Ok(Application { config, db_pool, runtime, runner })
}
