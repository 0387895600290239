//! Configuration loading and representation.
//!
//! Everything comes from the process environment:
//!
//! | variable                        | default | meaning                          |
//! |---------------------------------|---------|----------------------------------|
//! | `STOREFRONT_DATABASE_URL`       | none    | PostgreSQL connection string     |
//! | `STOREFRONT_MAX_CONNECTIONS`    | `5`     | pool size                        |
//! | `STOREFRONT_CATALOG_PAGE_SIZE`  | `8`     | products per home page grid page |

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use storefront_catalog::{DEFAULT_PAGE_SIZE, Paginator};

pub const DATABASE_URL_VAR: &str = "STOREFRONT_DATABASE_URL";
pub const MAX_CONNECTIONS_VAR: &str = "STOREFRONT_MAX_CONNECTIONS";
pub const PAGE_SIZE_VAR: &str = "STOREFRONT_CATALOG_PAGE_SIZE";

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorefrontConfig {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub catalog_page_size: usize,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            catalog_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl StorefrontConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map instead of the
    /// process environment).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        config.database_url = lookup(DATABASE_URL_VAR).filter(|s| !s.trim().is_empty());

        if let Some(raw) = lookup(MAX_CONNECTIONS_VAR) {
            config.max_connections = raw
                .trim()
                .parse()
                .with_context(|| format!("{MAX_CONNECTIONS_VAR} must be an integer, got {raw:?}"))?;
            if config.max_connections == 0 {
                bail!("{MAX_CONNECTIONS_VAR} must be positive");
            }
        }

        if let Some(raw) = lookup(PAGE_SIZE_VAR) {
            config.catalog_page_size = raw
                .trim()
                .parse()
                .with_context(|| format!("{PAGE_SIZE_VAR} must be an integer, got {raw:?}"))?;
        }
        // Validates the page size.
        config.paginator()?;

        Ok(config)
    }

    pub fn paginator(&self) -> anyhow::Result<Paginator> {
        Paginator::new(self.catalog_page_size).with_context(|| format!("invalid {PAGE_SIZE_VAR}"))
    }

    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .with_context(|| format!("{DATABASE_URL_VAR} is not set"))
    }
}
