
use fancy_regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    UserStatus,
    ActionRequest,
    HowTo,
    Troubleshooting,
    Information,
    Greeting,
    Thanks,
    SmallTalk,
    Unknown,
}

/// What answers a classified message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Handler {
    UserStatus,
    ExecuteAction,
    SearchDocumentation,
    Troubleshoot,
    Greeting,
    Acknowledgment,
    SmallTalk,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentMatch {
    pub intent: Intent,
    pub confidence: f32,
    pub handler: Handler,
    /// Source of the pattern that matched, if any
    pub pattern: Option<String>,
}

struct IntentRule {
    intent: Intent,
    handler: Handler,
    confidence: f32,
    patterns: Vec<Regex>,
}

fn rule(intent: Intent, handler: Handler, confidence: f32, patterns: &[&str]) -> IntentRule {
    IntentRule {
        intent,
        handler,
        confidence,
        patterns: patterns
            .iter()
            .map(|pattern| Regex::new(&format!("(?i){}", pattern)).expect("valid regex"))
            .collect(),
    }
}

static INTENT_RULES: LazyLock<Vec<IntentRule>> = LazyLock::new(|| {
    vec![
        rule(
            Intent::UserStatus,
            Handler::UserStatus,
            0.9,
            &[
                r"how am i doing",
                r"my progress",
                r"my status",
                r"how many (applications|jobs)",
                r"show my (applications|jobs|profile)",
                r"what('s| is) my status",
            ],
        ),
        rule(
            Intent::ActionRequest,
            Handler::ExecuteAction,
            0.95,
            &[
                r"apply to",
                r"withdraw (from|my)",
                r"delete my",
                r"update my",
                r"change my",
                r"upload",
                r"send (a )?message",
            ],
        ),
        rule(
            Intent::HowTo,
            Handler::SearchDocumentation,
            0.8,
            &[
                r"how (do|can) i",
                r"how to",
                r"what('s| is) the (way|process)",
                r"steps to",
                r"guide (for|to)",
            ],
        ),
        rule(
            Intent::Troubleshooting,
            Handler::Troubleshoot,
            0.85,
            &[
                r"(not working|broken|error|problem|issue)",
                r"(can't|cannot|unable to)",
                r"(won't|will not|doesn't|does not)",
                r"why (is|isn't|won't)",
            ],
        ),
        rule(
            Intent::Information,
            Handler::SearchDocumentation,
            0.7,
            &[
                r"what (is|are|does)",
                r"tell me about",
                r"explain",
                r"define",
                r"meaning of",
            ],
        ),
        rule(
            Intent::Greeting,
            Handler::Greeting,
            1.0,
            &[r"^(hi|hello|hey|greetings)", r"good (morning|afternoon|evening)"],
        ),
        rule(
            Intent::Thanks,
            Handler::Acknowledgment,
            1.0,
            &[r"thank(s| you)", r"appreciate", r"helpful"],
        ),
        rule(
            Intent::SmallTalk,
            Handler::SmallTalk,
            0.9,
            &[
                r"^(how are you|how're you|hows you)",
                r"^what('?s| is) up",
                r"^how('?s| is|s) (it going|everything|things)",
                r"^(sup|wassup|what's good|whats good)",
            ],
        ),
    ]
});

/// Classify a message against the ordered rule table.
///
/// The most confident matching rule wins; on a tie the earlier rule is kept.
/// Messages matching nothing go to documentation search.
#[inline]
pub fn classify(message: &str) -> IntentMatch {
    let mut best: Option<IntentMatch> = None;

    for rule in INTENT_RULES.iter() {
        let Some(pattern) = rule
            .patterns
            .iter()
            .find(|pattern| pattern.is_match(message).unwrap_or(false))
        else {
            continue;
        };

        if best
            .as_ref()
            .is_none_or(|current| rule.confidence > current.confidence)
        {
            best = Some(IntentMatch {
                intent: rule.intent,
                confidence: rule.confidence,
                handler: rule.handler,
                pattern: Some(pattern.as_str().trim_start_matches("(?i)").to_string()),
            });
        }
    }

    best.unwrap_or(IntentMatch {
        intent: Intent::Unknown,
        confidence: 0.5,
        handler: Handler::SearchDocumentation,
        pattern: None,
    })
}
