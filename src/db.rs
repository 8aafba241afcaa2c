use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Owns the Postgres pool. `connect` may be called any number of times;
/// only the first call opens connections.
pub struct Database {
    url: String,
    max_connections: u32,
    pool: OnceCell<PgPool>,
}

impl Database {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            pool: OnceCell::new(),
        }
    }

    /// Wraps a pool that is already open.
    #[cfg(test)]
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            pool: OnceCell::new_with(Some(pool)),
        }
    }

    pub async fn connect(&self) -> anyhow::Result<&PgPool> {
        if let Some(pool) = self.pool.get() {
            debug!("database already connected");
            return Ok(pool);
        }
        self.pool
            .get_or_try_init(|| async {
                let pool = PgPoolOptions::new()
                    .max_connections(self.max_connections)
                    .connect(&self.url)
                    .await
                    .context("connect to database")?;
                info!("database connected");
                Ok(pool)
            })
            .await
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        let pool = self.connect().await?;
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .context("run migrations")?;
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.pool.initialized()
    }
}
