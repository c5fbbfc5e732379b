//! Configuration types for mariadb-mongo-migrate.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connectors::common::{
    redact_uri, validate_identifier, validate_mongo_collection, validate_mongo_database,
    validate_mongo_uri,
};
use crate::error::{Error, Result};
use crate::transform::IntervalPolicy;

/// Main migration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Source MariaDB configuration.
    pub source: SourceConfig,
    /// Target MongoDB configuration.
    pub target: TargetConfig,
    /// Migration options.
    #[serde(default)]
    pub options: MigrationOptions,
}

/// MariaDB source configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Database (schema) holding the table.
    pub database: String,
    /// User name.
    pub user: String,
    /// Password. Never serialized back out.
    #[serde(default, skip_serializing)]
    pub password: String,
    /// Table to migrate.
    pub table: String,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .field("table", &self.table)
            .finish()
    }
}

/// MongoDB target configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Connection URI (`mongodb://` or `mongodb+srv://`).
    pub uri: String,
    /// Target database name.
    pub database: String,
    /// Target collection name (created on first insert).
    pub collection: String,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("uri", &redact_uri(&self.uri))
            .field("database", &self.database)
            .field("collection", &self.collection)
            .finish()
    }
}

/// Migration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationOptions {
    /// Documents per `insert_many`.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Mapping applied to `TIME` values.
    #[serde(default)]
    pub interval_policy: IntervalPolicy,
    /// Timeout for establishing either connection, in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Dry run mode (don't write to the target).
    #[serde(default)]
    pub dry_run: bool,
    /// Show a progress spinner.
    #[serde(default)]
    pub show_progress: bool,
}

impl MigrationOptions {
    /// Connection timeout as a `Duration`.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            interval_policy: IntervalPolicy::default(),
            connect_timeout_secs: default_connect_timeout_secs(),
            dry_run: false,
            show_progress: false,
        }
    }
}

fn default_port() -> u16 {
    3306
}

fn default_batch_size() -> usize {
    1000
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn require(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Config(format!("{} cannot be empty", what)));
    }
    Ok(())
}

impl MigrationConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid. Nothing is
    /// contacted.
    pub fn validate(&self) -> Result<()> {
        if self.options.batch_size == 0 {
            return Err(Error::Config(
                "batch size must be greater than 0".to_string(),
            ));
        }
        if self.options.connect_timeout_secs == 0 {
            return Err(Error::Config(
                "connect timeout must be greater than 0".to_string(),
            ));
        }

        require(&self.source.host, "source host")?;
        require(&self.source.database, "source database")?;
        require(&self.source.user, "source user")?;
        require(&self.source.table, "source table")?;
        if self.source.port == 0 {
            return Err(Error::Config("source port cannot be 0".to_string()));
        }
        validate_identifier(&self.source.table).map_err(|e| match e {
            Error::Extraction(msg) => Error::Config(msg),
            other => other,
        })?;

        validate_mongo_uri(&self.target.uri)?;
        validate_mongo_database(&self.target.database)?;
        validate_mongo_collection(&self.target.collection)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MigrationConfig {
        MigrationConfig {
            source: SourceConfig {
                host: "localhost".to_string(),
                port: 3306,
                database: "shop".to_string(),
                user: "etl".to_string(),
                password: "hunter2".to_string(),
                table: "orders".to_string(),
            },
            target: TargetConfig {
                uri: "mongodb://admin:pw@localhost:27017".to_string(),
                database: "shop".to_string(),
                collection: "orders".to_string(),
            },
            options: MigrationOptions::default(),
        }
    }

    #[test]
    fn test_config_defaults() {
        let options = MigrationOptions::default();
        assert_eq!(options.batch_size, 1000);
        assert_eq!(options.interval_policy, IntervalPolicy::Null);
        assert_eq!(options.connect_timeout(), Duration::from_secs(10));
        assert!(!options.dry_run);
        assert!(!options.show_progress);
    }

    #[test]
    fn test_config_validate_ok() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_config_validate_batch_size() {
        let mut config = sample();
        config.options.batch_size = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_config_validate_required_fields() {
        let mut config = sample();
        config.source.host = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = sample();
        config.source.user.clear();
        assert!(config.validate().is_err());

        let mut config = sample();
        config.target.collection.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_names() {
        let mut config = sample();
        config.source.table = "orders; DROP TABLE x".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = sample();
        config.target.uri = "postgres://localhost".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = sample();
        config.target.database = "my.db".to_string();
        assert!(config.validate().is_err());

        let mut config = sample();
        config.target.collection = "system.profile".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = sample();
        let shown = format!("{:?}", config);
        assert!(!shown.contains("hunter2"));
        assert!(!shown.contains(":pw@"));
        assert!(shown.contains("orders"));
    }

    #[test]
    fn test_config_json_parse() {
        let json = r#"{
            "source": {
                "host": "db.internal",
                "database": "shop",
                "user": "etl",
                "password": "x",
                "table": "orders"
            },
            "target": {
                "uri": "mongodb://localhost:27017",
                "database": "shop",
                "collection": "orders"
            },
            "options": { "batch_size": 500, "interval_policy": "text" }
        }"#;
        let config: MigrationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.source.port, 3306);
        assert_eq!(config.options.batch_size, 500);
        assert_eq!(config.options.interval_policy, IntervalPolicy::Text);
        assert_eq!(config.options.connect_timeout_secs, 10);
    }

    #[test]
    fn test_password_not_serialized() {
        let out = serde_json::to_string(&sample()).unwrap();
        assert!(!out.contains("hunter2"));
    }
}
