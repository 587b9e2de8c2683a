
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use crate::feedback::{FeedbackConfig, FeedbackSource};

/// Query terms and the related words appended when expanding a query
const SYNONYMS: &[(&str, &str)] = &[
    ("apply", "apply application submit"),
    ("job", "job position role opening"),
    ("profile", "profile account settings information"),
    ("search", "search find browse discover look"),
    ("message", "message chat communicate contact"),
    ("withdraw", "withdraw cancel remove delete"),
    ("swipe", "swipe right left apply pass"),
    ("employer", "employer company recruiter hiring"),
    ("resume", "resume cv curriculum vitae"),
    ("interview", "interview meeting screening call"),
    ("salary", "salary pay compensation wage"),
    ("remote", "remote work from home distributed"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Default,
    Enhanced,
}

impl fmt::Display for StrategyKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            StrategyKind::Default => write!(f, "default"),
            StrategyKind::Enhanced => write!(f, "enhanced"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyReason {
    NoFeedbackHistory,
    HealthyFeedback,
    FeedbackUnavailable,
    NegativeFeedbackHistory,
    LowSuccessRate,
}

/// How many chunks to fetch and with what query text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalStrategy {
    pub kind: StrategyKind,
    pub reason: StrategyReason,
    pub document_count: usize,
    pub query: String,
}

impl RetrievalStrategy {
    #[inline]
    pub fn default_for(query: &str, document_count: usize, reason: StrategyReason) -> Self {
        Self {
            kind: StrategyKind::Default,
            reason,
            document_count,
            query: query.to_string(),
        }
    }

    #[inline]
    pub fn enhanced_for(query: &str, document_count: usize, reason: StrategyReason) -> Self {
        Self {
            kind: StrategyKind::Enhanced,
            reason,
            document_count: document_count.saturating_mul(2),
            query: expand_query(query),
        }
    }
}

/// Lower-case the query and append related terms for every table entry it mentions.
#[inline]
pub fn expand_query(query: &str) -> String {
    let lowered = query.to_lowercase();
    let mut expanded = lowered.clone();

    for (term, expansion) in SYNONYMS {
        if lowered.contains(term) {
            expanded.push(' ');
            expanded.push_str(expansion);
        }
    }

    debug!("Query expanded: {:?} -> {:?}", query, expanded);
    expanded
}

/// Pick a retrieval strategy from the feedback history of the query's family.
///
/// A missing or failing feedback source yields the default strategy.
#[inline]
pub async fn select_strategy(
    feedback: Option<&dyn FeedbackSource>,
    policy: &FeedbackConfig,
    query: &str,
    document_count: usize,
) -> RetrievalStrategy {
    let Some(source) = feedback else {
        return RetrievalStrategy::default_for(
            query,
            document_count,
            StrategyReason::FeedbackUnavailable,
        );
    };

    let stats = match source.family_stats(query, policy.window_days).await {
        Ok(stats) => stats,
        Err(e) => {
            warn!("Feedback lookup failed, using default retrieval: {}", e);
            return RetrievalStrategy::default_for(
                query,
                document_count,
                StrategyReason::FeedbackUnavailable,
            );
        }
    };

    if stats.negative >= policy.negative_threshold {
        info!(
            negative_count = stats.negative,
            "Query has negative feedback history, using enhanced retrieval"
        );
        return RetrievalStrategy::enhanced_for(
            query,
            document_count,
            StrategyReason::NegativeFeedbackHistory,
        );
    }

    if stats.total >= policy.min_samples && stats.positive_rate < policy.min_positive_rate {
        info!(
            rate = stats.positive_rate,
            total = stats.total,
            "Query type has low success rate, using enhanced retrieval"
        );
        return RetrievalStrategy::enhanced_for(
            query,
            document_count,
            StrategyReason::LowSuccessRate,
        );
    }

    let reason = if stats.total == 0 {
        StrategyReason::NoFeedbackHistory
    } else {
        StrategyReason::HealthyFeedback
    };
    RetrievalStrategy::default_for(query, document_count, reason)
}
