use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use tracing::debug;

use super::{NameLister, DATABASE_PREFIX};

/// Lists database names on the review database server
pub struct DatabaseLister {
    database_url: String,
    pattern: String,
}

impl DatabaseLister {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            pattern: format!("^{}", DATABASE_PREFIX),
        }
    }
}

#[async_trait]
impl NameLister for DatabaseLister {
    async fn list_names(&self) -> Result<Vec<String>> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&self.database_url)
            .await
            .context("Failed to connect to database server")?;

        // Narrow on the server; the naming rule still runs client-side
        let names: Result<Vec<String>, sqlx::Error> =
            sqlx::query_scalar("SELECT datname::text FROM pg_database WHERE datname ~ $1")
                .bind(&self.pattern)
                .fetch_all(&pool)
                .await;

        pool.close().await;

        let names = names.context("Failed to list databases")?;

        debug!(count = names.len(), "Listed databases");

        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_side_filter_is_anchored_prefix() {
        let lister = DatabaseLister::new("postgres://localhost/postgres");
        assert_eq!(lister.pattern, "^mirera-review");
    }

    #[tokio::test]
    async fn test_malformed_url_is_an_error() {
        let lister = DatabaseLister::new("not a database url");
        let err = lister.list_names().await.unwrap_err();
        assert!(err.to_string().contains("Failed to connect"));
    }
}
