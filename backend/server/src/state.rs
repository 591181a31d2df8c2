use std::sync::Arc;

use directory::SqlitePool;
use minijinja::Environment;

use super::{config::Config, database::init_database, search::SearchClient, templates};

pub struct AppState {
    pub config: Config,
    pub pool: SqlitePool,
    pub search: SearchClient,
    pub templates: Environment<'static>,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Arc<Self>> {
        let config = Config::load()?;

        let pool = init_database(&config.database_url).await?;

        Self::with_pool(config, pool)
    }

    pub fn with_pool(config: Config, pool: SqlitePool) -> anyhow::Result<Arc<Self>> {
        let search = SearchClient::new(
            &config.search_root_url,
            config.bing_api_key.clone(),
            config.search_timeout,
        )?;

        let templates = templates::load()?;

        Ok(Arc::new(Self {
            config,
            pool,
            search,
            templates,
        }))
    }
}
