//! App Context

use std::sync::Arc;

use thiserror::Error;

use crate::{
    config::{AppConfig, ConfigError, JobsConfig},
    database::{self, Db},
    dispatch::Dispatcher,
    domain::{
        catalog::{CatalogService, PgCatalogService},
        lifecycle::{LifecycleController, LifecycleService},
        settings::{PgSettingsService, SettingsService},
    },
    generator::{GeminiGenerator, GeneratorError, ImageGenerator},
    jobs::{GenerationLock, GenerationWorker, JobQueue, JobScheduler, PgGenerationLock, PgJobQueue},
    messaging::{GatewayError, MessagingGateway, TelegramGateway},
    storage::{ImageStore, PgImageStore},
};

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to connect to database")]
    Database(#[source] sqlx::Error),

    #[error("failed to build messaging gateway")]
    Gateway(#[source] GatewayError),

    #[error("failed to build image generator")]
    Generator(#[source] GeneratorError),
}

#[derive(Clone)]
pub struct AppContext {
    pub db: Db,
    pub catalog: Arc<dyn CatalogService>,
    pub settings: Arc<dyn SettingsService>,
    pub images: Arc<dyn ImageStore>,
    pub queue: Arc<dyn JobQueue>,
    pub lock: Arc<dyn GenerationLock>,
    pub lifecycle: Arc<dyn LifecycleService>,
    pub gateway: Arc<dyn MessagingGateway>,
    pub generator: Arc<dyn ImageGenerator>,
    pub dispatcher: Dispatcher,
    public_base_url: String,
}

impl AppContext {
    /// Build application context from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is inconsistent, the database cannot be
    /// reached, or an HTTP client cannot be built.
    pub async fn from_config(config: &AppConfig) -> Result<Self, AppInitError> {
        config.validate()?;

        let pool = database::connect(
            &config.database.database_url,
            config.database.database_max_connections,
        )
        .await
        .map_err(AppInitError::Database)?;

        let db = Db::new(pool);
        let public_base_url = config.catalog.public_base_url.clone();

        let catalog: Arc<dyn CatalogService> = Arc::new(PgCatalogService::new(db.clone()));
        let settings: Arc<dyn SettingsService> = Arc::new(PgSettingsService::new(db.clone()));
        let images: Arc<dyn ImageStore> = Arc::new(PgImageStore::new(db.clone()));
        let queue: Arc<dyn JobQueue> = Arc::new(PgJobQueue::new(db.clone()));
        let lock: Arc<dyn GenerationLock> = Arc::new(PgGenerationLock::new(db.clone()));

        let gateway: Arc<dyn MessagingGateway> = Arc::new(
            TelegramGateway::new((&config.telegram).into()).map_err(AppInitError::Gateway)?,
        );

        let generator: Arc<dyn ImageGenerator> = Arc::new(
            GeminiGenerator::new((&config.gemini).into()).map_err(AppInitError::Generator)?,
        );

        let lifecycle: Arc<dyn LifecycleService> = Arc::new(LifecycleController::new(
            Arc::clone(&catalog),
            Arc::clone(&images),
            Arc::clone(&queue),
            public_base_url.clone(),
        ));

        let dispatcher = Dispatcher::new(
            config.catalog.admins(),
            Arc::clone(&lifecycle),
            Arc::clone(&catalog),
            Arc::clone(&settings),
            Arc::clone(&gateway),
        );

        Ok(Self {
            db,
            catalog,
            settings,
            images,
            queue,
            lock,
            lifecycle,
            gateway,
            generator,
            dispatcher,
            public_base_url,
        })
    }

    /// Scheduler driving generation workers over this context's services.
    #[must_use]
    pub fn scheduler(&self, jobs: &JobsConfig) -> JobScheduler {
        let worker = GenerationWorker::new(
            Arc::clone(&self.catalog),
            Arc::clone(&self.images),
            Arc::clone(&self.generator),
            Arc::clone(&self.gateway),
            Arc::clone(&self.settings),
            Arc::clone(&self.lock),
            jobs.worker(&self.public_base_url),
        );

        JobScheduler::new(Arc::clone(&self.queue), Arc::new(worker), jobs.scheduler())
    }
}
