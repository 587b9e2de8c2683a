// Gate run before retrieval: off-topic detection, then intent classification


pub mod intent;
pub mod off_topic;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use intent::{Handler, Intent, IntentMatch};
pub use off_topic::{OffTopicCategory, OffTopicVerdict};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RouterConfig {
    /// Off-topic verdicts at or above this confidence short-circuit the request
    pub off_topic_min_confidence: f32,
    /// Longer messages are truncated to this many characters
    pub max_message_length: usize,
}

impl Default for RouterConfig {
    #[inline]
    fn default() -> Self {
        Self {
            off_topic_min_confidence: 0.7,
            max_message_length: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteDecision {
    OffTopic {
        category: OffTopicCategory,
        confidence: f32,
    },
    Intent(IntentMatch),
}

#[derive(Debug, Clone, Default)]
pub struct QueryRouter {
    config: RouterConfig,
}

impl QueryRouter {
    #[inline]
    pub fn new(config: RouterConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    #[inline]
    pub fn route(&self, message: &str) -> RouteDecision {
        let verdict = off_topic::detect(message);
        if verdict.is_off_topic && verdict.confidence >= self.config.off_topic_min_confidence {
            let category = verdict.category.unwrap_or(OffTopicCategory::Unrelated);
            debug!(
                "Off-topic query detected: {} (confidence: {})",
                category, verdict.confidence
            );
            return RouteDecision::OffTopic {
                category,
                confidence: verdict.confidence,
            };
        }

        let matched = intent::classify(message);
        debug!(
            "Intent detected: {:?} (confidence: {})",
            matched.intent, matched.confidence
        );
        RouteDecision::Intent(matched)
    }
}
