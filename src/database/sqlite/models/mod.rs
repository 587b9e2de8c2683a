#[cfg(test)]
mod tests;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use std::str::FromStr;

use crate::RagError;

/// A user's rating of one assistant answer. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct FeedbackRecord {
    pub id: i64,
    pub message_id: String,
    pub query: String,
    pub feedback: FeedbackKind,
    pub comment: Option<String>,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Positive,
    Negative,
}

impl std::fmt::Display for FeedbackKind {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            FeedbackKind::Positive => write!(f, "positive"),
            FeedbackKind::Negative => write!(f, "negative"),
        }
    }
}

impl FromStr for FeedbackKind {
    type Err = RagError;

    #[inline]
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "positive" => Ok(Self::Positive),
            "negative" => Ok(Self::Negative),
            other => Err(RagError::Validation(format!(
                "feedback must be \"positive\" or \"negative\", got {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFeedback {
    pub message_id: String,
    pub query: String,
    pub feedback: FeedbackKind,
    pub comment: Option<String>,
    pub user_id: Option<String>,
}

/// Which queries a tally covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryMatch {
    Any,
    /// Case-insensitive exact match
    Exact(String),
    /// Queries containing any of the keywords
    AnyKeyword(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackFilter {
    pub since: DateTime<Utc>,
    pub query: QueryMatch,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct FeedbackTally {
    pub total: i64,
    pub positive: i64,
}

impl FeedbackTally {
    #[inline]
    pub fn negative(&self) -> i64 {
        self.total - self.positive
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct QueryCount {
    pub query: String,
    pub count: i64,
}

/// Fixed-width UTC timestamp so stored values order lexicographically
#[inline]
pub fn sql_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
