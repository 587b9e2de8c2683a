use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::models::{
    FeedbackFilter, FeedbackKind, FeedbackRecord, FeedbackTally, NewFeedback, QueryCount,
};
use crate::database::sqlite::queries::FeedbackQueries;


pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    /// Open `feedback.db` inside the configuration directory, creating both if needed
    #[inline]
    pub async fn initialize_from_config_dir(config_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        Self::new(config_dir.join("feedback.db")).await
    }

    // Feedback operations
    #[inline]
    pub async fn record_feedback(
        &self,
        feedback: &NewFeedback,
        at: DateTime<Utc>,
    ) -> Result<FeedbackRecord> {
        FeedbackQueries::create(&self.pool, feedback, at).await
    }

    #[inline]
    pub async fn feedback_tally(&self, filter: &FeedbackFilter) -> Result<FeedbackTally> {
        FeedbackQueries::tally(&self.pool, filter).await
    }

    #[inline]
    pub async fn top_queries(
        &self,
        kind: FeedbackKind,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<QueryCount>> {
        FeedbackQueries::top_queries(&self.pool, kind, since, limit).await
    }

    #[inline]
    pub async fn recent_feedback(&self, limit: i64) -> Result<Vec<FeedbackRecord>> {
        FeedbackQueries::list_recent(&self.pool, limit).await
    }

    #[inline]
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
