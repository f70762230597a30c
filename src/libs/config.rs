//! Engine configuration.

use serde::Deserialize;

use crate::libs::dialect::Dialect;
use crate::libs::error::{Error, Result};

pub const DEFAULT_APP_LABEL: &str = "dynamic_models";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// sqlx connection URL (`postgres://...` or `sqlite:...`).
    pub database_url: String,
    pub max_connections: u32,
    /// Prefix for every generated table name.
    pub app_label: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            app_label: DEFAULT_APP_LABEL.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Self::default()
        }
    }

    /// In-memory SQLite, pinned to a single connection so every query sees
    /// the same database.
    pub fn sqlite_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Self::default()
        }
    }

    /// Read configuration from the environment, loading `.env` first if one
    /// exists.
    ///
    /// - `DYNASCHEMA_DATABASE_URL`, falling back to `DATABASE_URL`
    /// - `DYNASCHEMA_MAX_CONNECTIONS`
    /// - `DYNASCHEMA_APP_LABEL`
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DYNASCHEMA_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .map_err(|_| Error::config("DYNASCHEMA_DATABASE_URL or DATABASE_URL must be set"))?;

        let mut config = Self::new(database_url);
        if let Ok(raw) = std::env::var("DYNASCHEMA_MAX_CONNECTIONS") {
            config.max_connections = raw.parse().map_err(|_| {
                Error::config(format!("DYNASCHEMA_MAX_CONNECTIONS is not a number: {raw}"))
            })?;
        }
        if let Ok(label) = std::env::var("DYNASCHEMA_APP_LABEL") {
            config.app_label = label;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_app_label(mut self, app_label: impl Into<String>) -> Self {
        self.app_label = app_label.into();
        self
    }

    pub fn dialect(&self) -> Result<Dialect> {
        Dialect::from_url(&self.database_url)
    }

    /// True when the URL names a SQLite database that only lives as long as
    /// its connection.
    pub fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }

    pub fn validate(&self) -> Result<()> {
        self.dialect()?;
        if self.max_connections == 0 {
            return Err(Error::config("max_connections must be at least 1"));
        }
        if crate::libs::schema::slugify(&self.app_label).is_empty() {
            return Err(Error::config(format!(
                "app label {:?} has no usable characters",
                self.app_label
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_memory_is_single_connection() {
        let config = EngineConfig::sqlite_memory();
        assert_eq!(config.max_connections, 1);
        assert!(config.is_in_memory());
        assert_eq!(config.dialect().unwrap(), Dialect::Sqlite);
    }

    #[test]
    fn test_validate_rejects_unknown_scheme() {
        let config = EngineConfig::new("mysql://localhost/test");
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_empty_app_label() {
        let config = EngineConfig::sqlite_memory().with_app_label("!!");
        assert!(config.validate().is_err());
    }
}
