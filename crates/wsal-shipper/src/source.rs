//! Reading WSAL rows from the WordPress database

use crate::config::DatabaseConfig;
use crate::error::{Result, ShipperError};
use crate::models::{EventRecord, MetadataRecord};
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlSslMode};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Source of audit rows above a given offset (dependency injection seam)
#[async_trait]
pub trait AuditSource: Send + Sync {
    /// Events with `id > offset`, ascending by id
    async fn fetch_events(&self, offset: i64) -> Result<Vec<EventRecord>>;

    /// Metadata with `occurrence_id > offset`, ascending by occurrence id
    async fn fetch_metadata(&self, offset: i64) -> Result<Vec<MetadataRecord>>;
}

/// WSAL tables in a MySQL/MariaDB WordPress database
pub struct MySqlAuditSource {
    pool: MySqlPool,
    events_sql: String,
    metadata_sql: String,
}

impl MySqlAuditSource {
    /// Connect with a single-connection pool; failure here is fatal for the run
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = connect_options(config)?;

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_with(options)
            .await?;

        info!(
            host = %config.host,
            database = %config.database,
            "Database connection established"
        );

        Ok(Self::from_pool(pool, &config.table_prefix))
    }

    /// Wrap an existing pool, reading from `<prefix>wsal_*` tables
    pub fn from_pool(pool: MySqlPool, table_prefix: &str) -> Self {
        Self {
            pool,
            events_sql: events_query(table_prefix),
            metadata_sql: metadata_query(table_prefix),
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl AuditSource for MySqlAuditSource {
    #[instrument(skip(self))]
    async fn fetch_events(&self, offset: i64) -> Result<Vec<EventRecord>> {
        let rows = sqlx::query_as::<_, EventRecord>(&self.events_sql)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = rows.len(), "Fetched occurrences");
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn fetch_metadata(&self, offset: i64) -> Result<Vec<MetadataRecord>> {
        let rows = sqlx::query_as::<_, MetadataRecord>(&self.metadata_sql)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = rows.len(), "Fetched metadata");
        Ok(rows)
    }
}

fn events_query(table_prefix: &str) -> String {
    format!(
        "SELECT id, created_on, alert_id FROM {}wsal_occurrences \
         WHERE id > ? ORDER BY id ASC",
        table_prefix
    )
}

fn metadata_query(table_prefix: &str) -> String {
    format!(
        "SELECT occurrence_id, name, value FROM {}wsal_metadata \
         WHERE occurrence_id > ? ORDER BY occurrence_id ASC",
        table_prefix
    )
}

/// Build connect options from the typed settings plus the free-form `extra` table
pub fn connect_options(config: &DatabaseConfig) -> Result<MySqlConnectOptions> {
    let mut options = MySqlConnectOptions::new()
        .host(&config.host)
        .username(&config.user)
        .database(&config.database);

    if !config.password.is_empty() {
        options = options.password(&config.password);
    }

    for (key, value) in &config.extra {
        options = apply_extra_option(options, key, value)?;
    }

    Ok(options)
}

fn apply_extra_option(
    options: MySqlConnectOptions,
    key: &str,
    value: &toml::Value,
) -> Result<MySqlConnectOptions> {
    let text = match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Boolean(b) => b.to_string(),
        other => {
            return Err(ShipperError::config(format!(
                "database.extra.{} must be a string, integer or boolean, got {}",
                key,
                other.type_str()
            )))
        }
    };

    let invalid = |e: &dyn std::fmt::Display| {
        ShipperError::config(format!("database.extra.{} = '{}': {}", key, text, e))
    };

    let options = match key {
        "port" => options.port(text.parse().map_err(|e| invalid(&e))?),
        "socket" | "unix_socket" => options.socket(&text),
        "charset" => options.charset(&text),
        "collation" => options.collation(&text),
        "ssl_mode" => options.ssl_mode(text.parse::<MySqlSslMode>().map_err(|e| invalid(&e))?),
        "ssl_disabled" => {
            let disabled: bool = text.parse().map_err(|e| invalid(&e))?;
            if disabled {
                options.ssl_mode(MySqlSslMode::Disabled)
            } else {
                options
            }
        }
        "ssl_ca" => options.ssl_ca(&text),
        "timezone" | "time_zone" => options.timezone(Some(text.clone())),
        "statement_cache_capacity" => {
            options.statement_cache_capacity(text.parse().map_err(|e| invalid(&e))?)
        }
        _ => {
            return Err(ShipperError::config(format!(
                "unsupported database.extra option '{}'",
                key
            )))
        }
    };

    Ok(options)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn database_config(extra: &[(&str, toml::Value)]) -> DatabaseConfig {
        DatabaseConfig {
            host: "db.internal".to_string(),
            user: "wp".to_string(),
            password: "secret".to_string(),
            database: "wordpress".to_string(),
            table_prefix: "wp_".to_string(),
            connect_timeout_secs: 5,
            extra: extra
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_queries_use_table_prefix() {
        let sql = events_query("blog_");
        assert!(sql.contains("FROM blog_wsal_occurrences"));
        assert!(sql.contains("WHERE id > ?"));
        assert!(sql.ends_with("ORDER BY id ASC"));

        let sql = metadata_query("wp_");
        assert!(sql.contains("SELECT occurrence_id, name, value FROM wp_wsal_metadata"));
        assert!(sql.ends_with("ORDER BY occurrence_id ASC"));
    }

    #[test]
    fn test_connect_options_from_typed_fields() {
        let options = connect_options(&database_config(&[])).unwrap();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 3306);
        assert_eq!(options.get_username(), "wp");
        assert_eq!(options.get_database(), Some("wordpress"));
    }

    #[test]
    fn test_extra_options_are_merged() {
        let options = connect_options(&database_config(&[
            ("port", toml::Value::Integer(3307)),
            ("charset", toml::Value::String("latin1".to_string())),
        ]))
        .unwrap();

        assert_eq!(options.get_port(), 3307);
        assert_eq!(options.get_charset(), "latin1");
    }

    #[test]
    fn test_port_may_be_given_as_string() {
        let options =
            connect_options(&database_config(&[("port", toml::Value::String("3310".into()))]))
                .unwrap();
        assert_eq!(options.get_port(), 3310);
    }

    #[test]
    fn test_invalid_extra_values_are_config_errors() {
        let bad = [
            ("port", toml::Value::String("http".into())),
            ("ssl_mode", toml::Value::String("sometimes".into())),
            ("ssl_disabled", toml::Value::String("maybe".into())),
            ("port", toml::Value::Array(vec![])),
            ("raise_on_warnings", toml::Value::Boolean(true)),
        ];

        for (key, value) in bad {
            let err = connect_options(&database_config(&[(key, value)])).unwrap_err();
            assert!(matches!(err, ShipperError::Config(_)), "{}: {:?}", key, err);
            assert!(err.to_string().contains(key));
        }
    }
}
