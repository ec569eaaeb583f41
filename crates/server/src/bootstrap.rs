use std::sync::Arc;

use axum::Router;
use easyshop_core::config::{AppConfig, ConfigError, LoadOptions};
use easyshop_db::repositories::{SqlCartRepository, SqlCategoryRepository, SqlProductRepository};
use easyshop_db::{connect_with_settings, migrations, CartService, CatalogService, DbPool};
use thiserror::Error;
use tracing::info;

use crate::api::{self, AppState};
use crate::health;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

impl Application {
    /// Health check plus the JSON API.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(health::router(self.db_pool.clone()))
            .merge(api::router(self.state.clone()))
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

#[cfg(test)]
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

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
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let products = Arc::new(SqlProductRepository::new(db_pool.clone()));
    let state = AppState {
        catalog: Arc::new(CatalogService::new(
            products.clone(),
            Arc::new(SqlCategoryRepository::new(db_pool.clone())),
        )),
        cart: Arc::new(CartService::new(
            products,
            Arc::new(SqlCartRepository::new(db_pool.clone())),
        )),
        auth: Arc::new(config.auth.clone()),
    };

    if config.auth.admin_token.is_none() {
        info!(
            event_name = "system.bootstrap.admin_disabled",
            correlation_id = "bootstrap",
            "no admin token configured; catalog administration endpoints will refuse requests"
        );
    }

    Ok(Application { config, db_pool, state })
}
