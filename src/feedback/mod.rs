#[cfg(test)]
mod tests;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tracing::{debug, info, warn};

use crate::database::Database;
use crate::database::sqlite::models::{
    FeedbackFilter, FeedbackKind, FeedbackRecord, FeedbackTally, NewFeedback, QueryCount,
    QueryMatch,
};
use crate::{RagError, Result};

const STOP_WORDS: &[&str] = &[
    "how", "do", "i", "can", "what", "is", "the", "a", "an", "to", "for", "my",
];
const MAX_KEYWORDS: usize = 3;
const MAX_COMMENT_CHARS: usize = 1000;
const TOP_QUERY_LIMIT: i64 = 5;
const RECENT_COMMENT_LIMIT: i64 = 5;

/// Thresholds for strategy escalation and operator alerts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Trailing window consulted when choosing a retrieval strategy
    pub window_days: u32,
    pub negative_threshold: u64,
    pub min_samples: u64,
    pub min_positive_rate: f64,
    pub repeat_alert_days: u32,
    pub repeat_alert_negatives: u64,
    pub daily_min_samples: u64,
    pub daily_warn_rate: f64,
    pub daily_good_rate: f64,
    pub family_alert_min_samples: u64,
    pub family_alert_rate: f64,
}

impl Default for FeedbackConfig {
    #[inline]
    fn default() -> Self {
        Self {
            window_days: 30,
            negative_threshold: 3,
            min_samples: 3,
            min_positive_rate: 0.6,
            repeat_alert_days: 7,
            repeat_alert_negatives: 3,
            daily_min_samples: 10,
            daily_warn_rate: 0.7,
            daily_good_rate: 0.85,
            family_alert_min_samples: 5,
            family_alert_rate: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackStats {
    pub total: u64,
    pub positive: u64,
    pub negative: u64,
    /// Positive share in `[0, 1]`, zero when there are no ratings
    pub positive_rate: f64,
}

impl From<FeedbackTally> for FeedbackStats {
    #[inline]
    fn from(tally: FeedbackTally) -> Self {
        let total = u64::try_from(tally.total).unwrap_or(0);
        let positive = u64::try_from(tally.positive).unwrap_or(0);
        let negative = u64::try_from(tally.negative()).unwrap_or(0);
        let positive_rate = if total == 0 {
            0.0
        } else {
            positive as f64 / total as f64
        };
        Self {
            total,
            positive,
            negative,
            positive_rate,
        }
    }
}

/// Read side of the feedback history, as seen by strategy selection.
#[async_trait]
pub trait FeedbackSource: Send + Sync {
    /// Ratings for `query` and queries sharing its keywords over the trailing window
    async fn family_stats(&self, query: &str, window_days: u32) -> Result<FeedbackStats>;
}

/// Up to three lower-cased content words used to fuzzy-match similar queries.
#[inline]
pub fn query_keywords(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|word| word.chars().count() > 2 && !STOP_WORDS.contains(word))
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}

fn family_match(query: &str) -> QueryMatch {
    let keywords = query_keywords(query);
    if keywords.is_empty() {
        QueryMatch::Exact(query.trim().to_string())
    } else {
        QueryMatch::AnyKeyword(keywords)
    }
}

/// A threshold crossing worth an operator's attention
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackAlert {
    RepeatedNegative {
        query: String,
        negative_count: u64,
    },
    LowDailySatisfaction(FeedbackStats),
    HighDailySatisfaction(FeedbackStats),
    LowFamilySuccess {
        query: String,
        keywords: Vec<String>,
        stats: FeedbackStats,
    },
}

impl FeedbackAlert {
    fn emit(&self) {
        match self {
            Self::RepeatedNegative {
                query,
                negative_count,
            } => warn!(
                query = %query,
                negative_count,
                "Repeated negative feedback: review the answer and improve or re-ingest documentation"
            ),
            Self::LowDailySatisfaction(stats) => warn!(
                rate = stats.positive_rate,
                positive = stats.positive,
                total = stats.total,
                "Low satisfaction rate today"
            ),
            Self::HighDailySatisfaction(stats) => info!(
                rate = stats.positive_rate,
                positive = stats.positive,
                total = stats.total,
                "High satisfaction rate today"
            ),
            Self::LowFamilySuccess {
                query,
                keywords,
                stats,
            } => warn!(
                query = %query,
                keywords = %keywords.join(", "),
                rate = stats.positive_rate,
                total = stats.total,
                "Low success rate for this type of question: consider documenting these topics"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackSummary {
    pub days: u32,
    pub total: u64,
    pub positive: u64,
    pub negative: u64,
    pub satisfaction_rate: f64,
    pub top_negative_queries: Vec<QueryCount>,
    pub top_positive_queries: Vec<QueryCount>,
    /// Newest ratings inside the window that carry a comment
    pub recent_comments: Vec<FeedbackRecord>,
}

impl FeedbackSummary {
    /// Plain-text report for the terminal
    #[inline]
    pub fn render(&self) -> String {
        let rule = "=".repeat(60);
        let percent = |count: u64| {
            if self.total == 0 {
                0.0
            } else {
                count as f64 / self.total as f64 * 100.0
            }
        };

        let mut report = String::new();
        let _ = writeln!(report, "{}", rule);
        let _ = writeln!(report, "FEEDBACK REPORT - Last {} days", self.days);
        let _ = writeln!(report, "{}", rule);
        let _ = writeln!(report);
        let _ = writeln!(report, "Total feedback: {}", self.total);
        let _ = writeln!(
            report,
            "Positive: {} ({:.1}%)",
            self.positive,
            percent(self.positive)
        );
        let _ = writeln!(
            report,
            "Negative: {} ({:.1}%)",
            self.negative,
            percent(self.negative)
        );
        let _ = writeln!(
            report,
            "Satisfaction rate: {:.1}%",
            self.satisfaction_rate * 100.0
        );

        for (title, queries) in [
            ("TOP NEGATIVE QUERIES", &self.top_negative_queries),
            ("TOP POSITIVE QUERIES", &self.top_positive_queries),
        ] {
            if queries.is_empty() {
                continue;
            }
            let _ = writeln!(report);
            let _ = writeln!(report, "{}:", title);
            for (rank, item) in queries.iter().enumerate() {
                let _ = writeln!(
                    report,
                    "  {}. \"{}\" ({} times)",
                    rank + 1,
                    item.query,
                    item.count
                );
            }
        }

        if !self.recent_comments.is_empty() {
            let _ = writeln!(report);
            let _ = writeln!(report, "RECENT COMMENTS:");
            for record in &self.recent_comments {
                let _ = writeln!(
                    report,
                    "  [{}] \"{}\": {}",
                    record.feedback,
                    record.query,
                    record.comment.as_deref().unwrap_or_default()
                );
            }
        }

        let _ = writeln!(report, "{}", rule);
        report
    }
}

/// Persists user ratings and watches them for trouble.
#[derive(Debug, Clone)]
pub struct FeedbackLoop {
    database: Database,
    config: FeedbackConfig,
}

impl FeedbackLoop {
    #[inline]
    pub fn new(database: Database, config: FeedbackConfig) -> Self {
        Self { database, config }
    }

    #[inline]
    pub fn config(&self) -> &FeedbackConfig {
        &self.config
    }

    /// Store one rating, then run alert analysis on a background task.
    #[inline]
    pub async fn record(&self, feedback: NewFeedback) -> Result<FeedbackRecord> {
        let record = self.record_at(feedback, Utc::now()).await?;

        let this = self.clone();
        let query = record.query.clone();
        let kind = record.feedback;
        tokio::spawn(async move {
            if let Err(e) = this.analyze(&query, kind).await {
                warn!("Feedback analysis failed: {}", e);
            }
        });

        Ok(record)
    }

    /// Store one rating with an explicit timestamp; no analysis is run.
    #[inline]
    pub async fn record_at(
        &self,
        mut feedback: NewFeedback,
        at: DateTime<Utc>,
    ) -> Result<FeedbackRecord> {
        feedback.message_id = feedback.message_id.trim().to_string();
        feedback.query = feedback.query.trim().to_string();
        if feedback.message_id.is_empty() {
            return Err(RagError::Validation("messageId is required".to_string()));
        }
        if feedback.query.is_empty() {
            return Err(RagError::Validation("query is required".to_string()));
        }
        feedback.comment = feedback
            .comment
            .map(|comment| comment.trim().chars().take(MAX_COMMENT_CHARS).collect::<String>())
            .filter(|comment| !comment.is_empty());

        let record = self.database.record_feedback(&feedback, at).await?;
        debug!(
            "Recorded {} feedback for message {}",
            record.feedback, record.message_id
        );
        Ok(record)
    }

    #[inline]
    pub async fn stats_for(&self, query: QueryMatch, window_days: u32) -> Result<FeedbackStats> {
        let filter = FeedbackFilter {
            since: Utc::now() - Duration::days(i64::from(window_days)),
            query,
        };
        Ok(self.database.feedback_tally(&filter).await?.into())
    }

    /// Ratings received since midnight UTC
    #[inline]
    pub async fn daily_stats(&self) -> Result<FeedbackStats> {
        let now = Utc::now();
        let midnight = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|start| start.and_utc())
            .unwrap_or(now);
        let filter = FeedbackFilter {
            since: midnight,
            query: QueryMatch::Any,
        };
        Ok(self.database.feedback_tally(&filter).await?.into())
    }

    #[inline]
    pub async fn daily_satisfaction(&self) -> Result<f64> {
        Ok(self.daily_stats().await?.positive_rate)
    }

    /// Check every alert rule against the current history and emit the ones that fire.
    #[inline]
    pub async fn analyze(&self, query: &str, kind: FeedbackKind) -> Result<Vec<FeedbackAlert>> {
        let mut alerts = Vec::new();

        if kind == FeedbackKind::Negative {
            let repeated = self
                .stats_for(
                    QueryMatch::Exact(query.to_string()),
                    self.config.repeat_alert_days,
                )
                .await?;
            if repeated.negative >= self.config.repeat_alert_negatives {
                alerts.push(FeedbackAlert::RepeatedNegative {
                    query: query.to_string(),
                    negative_count: repeated.negative,
                });
            }
        }

        let today = self.daily_stats().await?;
        if today.total >= self.config.daily_min_samples {
            if today.positive_rate < self.config.daily_warn_rate {
                alerts.push(FeedbackAlert::LowDailySatisfaction(today));
            } else if today.positive_rate >= self.config.daily_good_rate {
                alerts.push(FeedbackAlert::HighDailySatisfaction(today));
            }
        }

        let keywords = query_keywords(query);
        if !keywords.is_empty() {
            let family = self
                .stats_for(
                    QueryMatch::AnyKeyword(keywords.clone()),
                    self.config.window_days,
                )
                .await?;
            if family.total >= self.config.family_alert_min_samples
                && family.positive_rate < self.config.family_alert_rate
            {
                alerts.push(FeedbackAlert::LowFamilySuccess {
                    query: query.to_string(),
                    keywords,
                    stats: family,
                });
            }
        }

        alerts.iter().for_each(FeedbackAlert::emit);
        Ok(alerts)
    }

    #[inline]
    pub async fn summary(&self, days: u32) -> Result<FeedbackSummary> {
        let since = Utc::now() - Duration::days(i64::from(days));
        let stats: FeedbackStats = self
            .database
            .feedback_tally(&FeedbackFilter {
                since,
                query: QueryMatch::Any,
            })
            .await?
            .into();

        let top_negative_queries = self
            .database
            .top_queries(FeedbackKind::Negative, since, TOP_QUERY_LIMIT)
            .await?;
        let top_positive_queries = self
            .database
            .top_queries(FeedbackKind::Positive, since, TOP_QUERY_LIMIT)
            .await?;

        let recent_comments = self
            .database
            .recent_feedback(RECENT_COMMENT_LIMIT)
            .await?
            .into_iter()
            .filter(|record| record.created_at >= since && record.comment.is_some())
            .collect();

        Ok(FeedbackSummary {
            days,
            total: stats.total,
            positive: stats.positive,
            negative: stats.negative,
            satisfaction_rate: stats.positive_rate,
            top_negative_queries,
            top_positive_queries,
            recent_comments,
        })
    }
}

#[async_trait]
impl FeedbackSource for FeedbackLoop {
    async fn family_stats(&self, query: &str, window_days: u32) -> Result<FeedbackStats> {
        self.stats_for(family_match(query), window_days).await
    }
}
