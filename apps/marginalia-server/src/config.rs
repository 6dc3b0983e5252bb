//! Configuration management for the Marginalia server

use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use crate::import::ImportSettings;
use crate::library::LibraryScope;
use crate::location::{LocationSortKeyGenerator, DEFAULT_FLAT_WIDTH, DEFAULT_MAX_ELEMENT_DEPTH};
use crate::matching::Confidence;
use crate::merge::MergeStrategy;
use crate::render::{RenderOptions, DEFAULT_TIMESTAMP_FORMAT};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub library: LibraryConfig,
    pub reconcile: ReconcileConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryConfig {
    /// Calibre library root
    pub path: PathBuf,
    /// Only books carrying one of these tags are matched; empty means all
    pub scope_tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileConfig {
    pub max_element_depth: usize,
    pub flat_location_width: usize,
    pub auto_merge_threshold: u8,
    pub default_merge_strategy: MergeStrategy,
    pub news_clippings_destination: Option<String>,
    pub import_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    pub timestamp_format: String,
    pub horizontal_rule: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: "sqlite:./marginalia.db".to_string(),
            },
            library: LibraryConfig {
                path: PathBuf::from("./library"),
                scope_tags: Vec::new(),
            },
            reconcile: ReconcileConfig {
                max_element_depth: DEFAULT_MAX_ELEMENT_DEPTH,
                flat_location_width: DEFAULT_FLAT_WIDTH,
                auto_merge_threshold: Confidence::AUTOMATIC.value(),
                default_merge_strategy: MergeStrategy::HashIdentity,
                news_clippings_destination: None,
                import_concurrency: 4,
            },
            render: RenderConfig {
                timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
                horizontal_rule: false,
            },
        }
    }
}

impl Config {
    /// Read the configuration from the environment
    ///
    /// `LIBRARY_PATH` is required; everything else has a default.
    pub fn from_env() -> Result<Self, env::VarError> {
        let defaults = Config::default();

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parsed("SERVER_PORT", defaults.server.port),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(defaults.database.url),
            },
            library: LibraryConfig {
                path: PathBuf::from(env::var("LIBRARY_PATH")?),
                scope_tags: env::var("LIBRARY_SCOPE_TAGS")
                    .map(|tags| split_list(&tags))
                    .unwrap_or_default(),
            },
            reconcile: ReconcileConfig {
                max_element_depth: parsed("MAX_ELEMENT_DEPTH", defaults.reconcile.max_element_depth),
                flat_location_width: parsed("FLAT_LOCATION_WIDTH", defaults.reconcile.flat_location_width),
                auto_merge_threshold: parsed("AUTO_MERGE_THRESHOLD", defaults.reconcile.auto_merge_threshold),
                default_merge_strategy: parsed(
                    "DEFAULT_MERGE_STRATEGY",
                    defaults.reconcile.default_merge_strategy,
                ),
                news_clippings_destination: env::var("NEWS_CLIPPINGS_DESTINATION")
                    .ok()
                    .map(|title| title.trim().to_string())
                    .filter(|title| !title.is_empty()),
                import_concurrency: parsed("IMPORT_CONCURRENCY", defaults.reconcile.import_concurrency),
            },
            render: RenderConfig {
                timestamp_format: env::var("TIMESTAMP_FORMAT").unwrap_or(defaults.render.timestamp_format),
                horizontal_rule: parsed("RENDER_HORIZONTAL_RULE", defaults.render.horizontal_rule),
            },
        })
    }

    pub fn library_scope(&self) -> LibraryScope {
        LibraryScope::with_tags(self.library.scope_tags.iter().cloned())
    }

    pub fn import_settings(&self) -> ImportSettings {
        let threshold = Confidence::new(self.reconcile.auto_merge_threshold).unwrap_or_else(|| {
            tracing::warn!(
                "AUTO_MERGE_THRESHOLD {} is outside 0..=5, using {}",
                self.reconcile.auto_merge_threshold,
                Confidence::AUTOMATIC
            );
            Confidence::AUTOMATIC
        });

        ImportSettings {
            auto_merge_threshold: threshold,
            default_strategy: self.reconcile.default_merge_strategy,
            news_clippings_destination: self.reconcile.news_clippings_destination.clone(),
            concurrency: self.reconcile.import_concurrency.max(1),
            generator: LocationSortKeyGenerator::new(
                self.reconcile.max_element_depth,
                self.reconcile.flat_location_width,
            ),
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            timestamp_format: self.render.timestamp_format.clone(),
            horizontal_rule: self.render.horizontal_rule,
        }
    }
}

/// Parse an optional variable, keeping the default when it is unset or invalid
fn parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}='{}'", name, raw);
            default
        }),
        Err(_) => default,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" Fiction, ,News "), vec!["Fiction", "News"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_derived_settings() {
        let mut config = Config::default();
        config.reconcile.auto_merge_threshold = 9;
        config.reconcile.import_concurrency = 0;
        config.library.scope_tags = vec!["Read".to_string()];

        let settings = config.import_settings();
        assert_eq!(settings.auto_merge_threshold, Confidence::AUTOMATIC);
        assert_eq!(settings.concurrency, 1);
        assert_eq!(settings.generator.max_depth(), DEFAULT_MAX_ELEMENT_DEPTH);
        assert_eq!(config.library_scope().include_tags, vec!["Read"]);
        assert_eq!(config.render_options(), RenderOptions::default());
    }
}
