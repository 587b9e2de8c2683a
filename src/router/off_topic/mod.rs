
use fancy_regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

const CATEGORY_CONFIDENCE: f32 = 0.95;
const SHORT_QUERY_CONFIDENCE: f32 = 0.7;
const LONG_QUERY_CONFIDENCE: f32 = 0.85;
const ON_TOPIC_CONFIDENCE: f32 = 0.8;
const SHORT_QUERY_MAX_WORDS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OffTopicCategory {
    Weather,
    Sports,
    Entertainment,
    News,
    Math,
    Jokes,
    Cooking,
    Travel,
    Health,
    GeneralKnowledge,
    CreativeRequests,
    Unrelated,
}

impl OffTopicCategory {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::Sports => "sports",
            Self::Entertainment => "entertainment",
            Self::News => "news",
            Self::Math => "math",
            Self::Jokes => "jokes",
            Self::Cooking => "cooking",
            Self::Travel => "travel",
            Self::Health => "health",
            Self::GeneralKnowledge => "general_knowledge",
            Self::CreativeRequests => "creative_requests",
            Self::Unrelated => "unrelated",
        }
    }

    /// Polite redirect back to what the assistant can help with
    #[inline]
    pub fn redirect_message(self) -> &'static str {
        match self {
            Self::Weather => "I'm an assistant focused on helping with job searches and applications. I can't help with weather information, but I'd be happy to help you find job opportunities!",
            Self::Sports => "I'm here to help with job searching, not sports updates. But I can help you find sports-related jobs if you're interested!",
            Self::Entertainment => "I'm focused on helping with job searches and career opportunities. I can't help with entertainment questions, but I can help you find jobs in the entertainment industry!",
            Self::News => "I'm designed to help with job applications and career searches. For news, you'll want to check a news website. How can I help with your job search?",
            Self::Math => "I'm here to help with job searching, not math calculations. But I can help you find jobs that use math skills!",
            Self::Jokes => "I'm not much of a comedian, but I'm great at helping you find jobs! What kind of position are you looking for?",
            Self::Cooking => "I'm focused on helping with job searches. I can't help with recipes, but I can help you find culinary jobs if you're interested!",
            Self::Travel => "I'm here to help with job searching, not travel planning. But I can help you find remote jobs or positions in specific locations!",
            Self::Health => "I'm a job search assistant, not a medical professional. For health concerns, please consult a doctor. How can I help with your career search?",
            Self::GeneralKnowledge => "I'm specialized in helping with job search features. For general knowledge questions, try a search engine. What can I help you with regarding jobs?",
            Self::CreativeRequests => "I'm focused on helping with job searches and applications. I can't write creative content, but I can help you craft your job profile or find opportunities!",
            Self::Unrelated => "I cannot answer that question. Please ask a question related to job searching and how to use the platform.",
        }
    }
}

impl fmt::Display for OffTopicCategory {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OffTopicVerdict {
    pub is_off_topic: bool,
    pub category: Option<OffTopicCategory>,
    pub confidence: f32,
}

static CATEGORY_PATTERNS: LazyLock<Vec<(OffTopicCategory, Regex)>> = LazyLock::new(|| {
    [
        (
            OffTopicCategory::Weather,
            r"(?i)\b(weather|temperature|rain|snow|sunny|cloudy|forecast|climate)\b",
        ),
        (
            OffTopicCategory::Sports,
            r"(?i)\b(football|basketball|baseball|soccer|nfl|nba|mlb|super bowl|world cup|championship|playoffs)\b",
        ),
        (
            OffTopicCategory::Entertainment,
            r"(?i)\b(movie|film|tv show|series|actor|actress|celebrity|music|song|album|artist|concert|netflix)\b",
        ),
        (
            OffTopicCategory::News,
            r"(?i)\b(news|headline|breaking|president|election|politics|government|congress)\b",
        ),
        (
            OffTopicCategory::Math,
            r"(?i)^[\d\s+\-*/()=.]+$|what('?s| is) \d+[\s+\-*/]\d+|calculate|solve|equation",
        ),
        (
            OffTopicCategory::Jokes,
            r"(?i)\b(tell (me )?a joke|make me laugh|something funny)\b",
        ),
        (
            OffTopicCategory::Cooking,
            r"(?i)\b(recipe|bake a|cook a|ingredient|prepare a meal|make a dish)\b",
        ),
        (
            OffTopicCategory::Travel,
            r"(?i)\b(flight|hotel|vacation|trip to|travel to|destination|tourist|booking)\b",
        ),
        (
            OffTopicCategory::Health,
            r"(?i)\b(doctor|medicine|symptom|disease|illness|pain|hurt|diagnosis|treatment)\b",
        ),
        (
            OffTopicCategory::GeneralKnowledge,
            r"(?i)\b(capital of|population of|who invented|when was|history of|who is|what is the meaning of life)\b",
        ),
        (
            OffTopicCategory::CreativeRequests,
            r"(?i)\b(write (me )?a|tell (me )?a|create a|generate a|make (me )?a)\b.{0,30}\b(poem|story|essay|song)\b",
        ),
    ]
    .into_iter()
    .map(|(category, pattern)| (category, Regex::new(pattern).expect("valid regex")))
    .collect()
});

static GREETING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(hi|hello|hey|sup|yo|thanks|thank you|bye|goodbye|good (morning|afternoon|evening))\b",
    )
    .expect("valid regex")
});

static CONVERSATIONAL_OPENER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^((hows?|how'?s|how is|whats?|what'?s|what is) (everything|things|it going|up)|how are you|how're you)",
    )
    .expect("valid regex")
});

/// Words that mark a query as belonging to the job platform's domain
const DOMAIN_KEYWORDS: &[&str] = &[
    "job", "jobs", "position", "role", "career", "employment", "work",
    "apply", "application", "applications", "applying", "applied",
    "profile", "resume", "cv", "skills", "experience",
    "search", "find", "browse", "looking", "seeking",
    "employer", "company", "recruiter", "hiring",
    "interview", "offer", "salary", "compensation",
    "message", "messaging", "contact", "communicate",
    "swipe", "match", "matching",
    "withdraw", "cancel", "delete",
    "account", "login", "signin", "signup", "register",
    "nextstep", "platform", "app", "website", "site",
    "status", "pending", "rejected", "accepted",
    "track", "tracking", "progress",
];

fn matches(regex: &Regex, text: &str) -> bool {
    regex.is_match(text).unwrap_or(false)
}

fn domain_keyword_count(query: &str) -> usize {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| DOMAIN_KEYWORDS.contains(word))
        .count()
}

/// Decide whether a query falls outside the supported domain.
///
/// Category patterns are checked first and win unconditionally. Otherwise a
/// query with no domain keyword is off-topic, with more confidence when it is long.
#[inline]
pub fn detect(query: &str) -> OffTopicVerdict {
    let query = query.trim().to_lowercase();

    if let Some((category, _)) = CATEGORY_PATTERNS
        .iter()
        .find(|(_, pattern)| matches(pattern, &query))
    {
        return OffTopicVerdict {
            is_off_topic: true,
            category: Some(*category),
            confidence: CATEGORY_CONFIDENCE,
        };
    }

    if domain_keyword_count(&query) > 0 {
        return OffTopicVerdict {
            is_off_topic: false,
            category: None,
            confidence: ON_TOPIC_CONFIDENCE,
        };
    }

    let word_count = query.split_whitespace().count();
    if word_count <= SHORT_QUERY_MAX_WORDS {
        if matches(&GREETING, &query) || matches(&CONVERSATIONAL_OPENER, &query) {
            return OffTopicVerdict {
                is_off_topic: false,
                category: None,
                confidence: ON_TOPIC_CONFIDENCE,
            };
        }
        return OffTopicVerdict {
            is_off_topic: true,
            category: Some(OffTopicCategory::Unrelated),
            confidence: SHORT_QUERY_CONFIDENCE,
        };
    }

    OffTopicVerdict {
        is_off_topic: true,
        category: Some(OffTopicCategory::Unrelated),
        confidence: LONG_QUERY_CONFIDENCE,
    }
}
