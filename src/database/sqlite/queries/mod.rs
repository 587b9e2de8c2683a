
use super::models::*;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

pub struct FeedbackQueries;

impl FeedbackQueries {
    #[inline]
    pub async fn create(
        pool: &SqlitePool,
        new_feedback: &NewFeedback,
        created_at: DateTime<Utc>,
    ) -> Result<FeedbackRecord> {
        let id = sqlx::query(
            "INSERT INTO feedback (message_id, query, feedback, comment, user_id, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&new_feedback.message_id)
        .bind(&new_feedback.query)
        .bind(new_feedback.feedback)
        .bind(&new_feedback.comment)
        .bind(&new_feedback.user_id)
        .bind(sql_timestamp(created_at))
        .execute(pool)
        .await
        .context("Failed to insert feedback")?
        .last_insert_rowid();

        Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve inserted feedback"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<FeedbackRecord>> {
        sqlx::query_as::<_, FeedbackRecord>(
            r#"
            SELECT id, message_id, query, feedback, comment, user_id, created_at
            FROM feedback WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get feedback by id")
    }

    /// Count ratings matching `filter`, split into total and positive
    #[inline]
    pub async fn tally(pool: &SqlitePool, filter: &FeedbackFilter) -> Result<FeedbackTally> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) AS total, COALESCE(SUM(CASE WHEN feedback = 'positive' THEN 1 ELSE 0 END), 0) AS positive FROM feedback WHERE created_at >= ",
        );
        builder.push_bind(sql_timestamp(filter.since));

        match &filter.query {
            QueryMatch::Any => {}
            QueryMatch::Exact(query) => {
                builder
                    .push(" AND lower(query) = ")
                    .push_bind(query.to_lowercase());
            }
            QueryMatch::AnyKeyword(keywords) if keywords.is_empty() => {}
            QueryMatch::AnyKeyword(keywords) => {
                builder.push(" AND (");
                let mut clauses = builder.separated(" OR ");
                for keyword in keywords {
                    clauses.push("lower(query) LIKE ");
                    clauses.push_bind_unseparated(format!("%{}%", keyword.to_lowercase()));
                }
                builder.push(")");
            }
        }

        let tally = builder
            .build_query_as::<FeedbackTally>()
            .fetch_one(pool)
            .await
            .context("Failed to tally feedback")?;

        debug!(
            "Feedback tally {:?}: {} total, {} positive",
            filter.query, tally.total, tally.positive
        );
        Ok(tally)
    }

    /// Most frequently rated queries of one kind since `since`
    #[inline]
    pub async fn top_queries(
        pool: &SqlitePool,
        kind: FeedbackKind,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<QueryCount>> {
        sqlx::query_as::<_, QueryCount>(
            r#"
            SELECT query, COUNT(*) AS count
            FROM feedback
            WHERE feedback = ? AND created_at >= ?
            GROUP BY query
            ORDER BY count DESC, query ASC
            LIMIT ?
            "#,
        )
        .bind(kind)
        .bind(sql_timestamp(since))
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to list top queries")
    }

    #[inline]
    pub async fn list_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<FeedbackRecord>> {
        sqlx::query_as::<_, FeedbackRecord>(
            r#"
            SELECT id, message_id, query, feedback, comment, user_id, created_at
            FROM feedback
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to list recent feedback")
    }
}
