//! Application state management

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::config::Config;
use crate::import::ImportPipeline;
use crate::library::{LibraryIndexCache, LibrarySource};
use crate::producers::ProducerRegistry;
use crate::render::RenderOptions;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    db: SqlitePool,
    pipeline: ImportPipeline,
    producers: ProducerRegistry,
    render_options: RenderOptions,
}

impl AppState {
    /// Create the state over a library source and an initialized pool
    pub fn new(config: Config, db: SqlitePool, library: Arc<dyn LibrarySource>) -> Self {
        let cache = Arc::new(LibraryIndexCache::new(library, config.library_scope()));
        let pipeline = ImportPipeline::new(db.clone(), cache, config.import_settings());
        let render_options = config.render_options();

        Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                pipeline,
                producers: ProducerRegistry::with_defaults(),
                render_options,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the database pool
    pub fn db(&self) -> &SqlitePool {
        &self.inner.db
    }

    pub fn pipeline(&self) -> &ImportPipeline {
        &self.inner.pipeline
    }

    /// Get the library index cache
    pub fn library(&self) -> &Arc<LibraryIndexCache> {
        self.inner.pipeline.cache()
    }

    pub fn producers(&self) -> &ProducerRegistry {
        &self.inner.producers
    }

    pub fn render_options(&self) -> &RenderOptions {
        &self.inner.render_options
    }
}
