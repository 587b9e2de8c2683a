// Fixed replies for intents that do not need retrieval

use fancy_regex::Regex;
use std::sync::LazyLock;

use super::{ApplicationCounts, ChatAction, ResponseType};

static APPLY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)apply").expect("valid regex"));
static WITHDRAW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)withdraw").expect("valid regex"));
static EDIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)update|change|edit").expect("valid regex"));
static PROFILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)profile").expect("valid regex"));
static SEARCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(search|find|browse)\b").expect("valid regex"));
static MESSAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)message|contact").expect("valid regex"));
static RESUME_UPLOAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)resume.*upload|upload.*resume").expect("valid regex")
});
static LOGIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)login|log in|sign in").expect("valid regex"));
static SLOW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)slow|loading|not working").expect("valid regex"));
static HOW_ARE_YOU: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)how are you").expect("valid regex"));
static HOWS_IT_GOING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)how('?s| is|s) (everything|it going|things)").expect("valid regex")
});
static WHATS_UP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)what('?s| is) up").expect("valid regex"));

fn is(regex: &Regex, message: &str) -> bool {
    regex.is_match(message).unwrap_or(false)
}

/// A handler's reply before timestamps are attached
#[derive(Debug, Clone, PartialEq)]
pub struct CannedReply {
    pub response: String,
    pub response_type: ResponseType,
    pub actions: Vec<ChatAction>,
}

impl CannedReply {
    fn new(response: impl Into<String>, response_type: ResponseType) -> Self {
        Self {
            response: response.into(),
            response_type,
            actions: Vec::new(),
        }
    }

    fn with_actions(mut self, actions: Vec<ChatAction>) -> Self {
        self.actions = actions;
        self
    }
}

/// Step-by-step guide for the action the message asks about
#[inline]
pub fn action_guide(message: &str) -> CannedReply {
    if is(&WITHDRAW, message) {
        return CannedReply::new(
            "To withdraw an application:\n\n1. Go to the 'My Jobs' page\n2. Find the application you want to withdraw\n3. Click the red 'Withdraw' button\n4. Confirm your decision\n\nNote: this cannot be undone, but you can reapply later if you change your mind.",
            ResponseType::ActionGuide,
        )
        .with_actions(vec![ChatAction::navigate("Go to My Jobs", "/your-jobs")]);
    }

    if is(&APPLY, message) {
        return CannedReply::new(
            "To apply to a job:\n\n1. Browse jobs on the homepage or search page\n2. Swipe right on a job you like, or click the 'Apply' button\n3. Your application is submitted instantly!\n\nWould you like me to show you available jobs?",
            ResponseType::ActionGuide,
        )
        .with_actions(vec![
            ChatAction::navigate("Browse Jobs", "/browse-jobs"),
            ChatAction::navigate("View Homepage", "/"),
        ]);
    }

    if (is(&EDIT, message) && is(&PROFILE, message)) || is(&RESUME_UPLOAD, message) {
        return CannedReply::new(
            "To update your profile:\n\n1. Click 'Profile' in the navigation menu\n2. Edit any information you want to change\n3. Click 'Save Profile' when done\n\nYou can update your name, contact info, location, skills, photo and resume anytime!",
            ResponseType::ActionGuide,
        )
        .with_actions(vec![ChatAction::navigate("Edit Profile", "/profile")]);
    }

    if is(&SEARCH, message) {
        return CannedReply::new(
            "To search for jobs:\n\n1. Open the 'Browse Jobs' page\n2. Filter by title, location or salary\n3. Swipe right or click 'Apply' on positions you like",
            ResponseType::ActionGuide,
        )
        .with_actions(vec![ChatAction::navigate("Browse Jobs", "/browse-jobs")]);
    }

    if is(&MESSAGE, message) {
        return CannedReply::new(
            "To message an employer:\n\n1. Open 'Messages' from the navigation menu\n2. Pick the conversation for the job you applied to\n3. Type your message and press 'Send'\n\nEmployers can message you once you have applied to one of their jobs.",
            ResponseType::ActionGuide,
        )
        .with_actions(vec![ChatAction::navigate("Open Messages", "/messages")]);
    }

    CannedReply::new(
        "I can help you with actions like:\n- Applying to jobs\n- Withdrawing applications\n- Updating your profile\n- Searching for jobs\n- Messaging employers\n\nWhat would you like to do?",
        ResponseType::ActionMenu,
    )
}

#[inline]
pub fn troubleshooting(message: &str) -> CannedReply {
    let steps = if is(&RESUME_UPLOAD, message) {
        "If your resume won't upload, try these steps:\n\n1. Make sure your file is PDF, DOC or DOCX\n2. Check that the file is under 10MB\n3. Ensure the file isn't password protected\n4. Try a different browser\n5. Clear your browser cache and try again\n\nIf the problem persists, try uploading a different version of your resume."
    } else if is(&LOGIN, message) {
        "If you're having trouble logging in:\n\n1. Make sure you're using the correct email and password\n2. Use the 'Forgot Password' link to reset your password\n3. Check that your email is verified (look in your spam folder)\n4. Clear your browser cookies and try again\n5. Try a different browser"
    } else if is(&SLOW, message) {
        "If the site is slow or not loading:\n\n1. Refresh the page\n2. Clear your browser cache\n3. Check your internet connection\n4. Try a different browser\n5. Try again in a few minutes"
    } else {
        "Here are some general troubleshooting steps:\n\n1. Refresh the page\n2. Clear your browser cache\n3. Try logging out and back in\n4. Try a different browser\n5. Check your internet connection\n\nIf the problem continues, describe the specific issue and I'll give more targeted help."
    };

    CannedReply::new(
        format!("I'm sorry you're experiencing an issue. {}", steps),
        ResponseType::Troubleshooting,
    )
}

#[inline]
pub fn greeting() -> CannedReply {
    CannedReply::new(
        "Hi! I'm here to help with your job search. What can I do for you?\n\nI can help you with:\n- Applying to jobs\n- Tracking your applications\n- Updating your profile\n- Troubleshooting issues\n- Answering questions about the platform",
        ResponseType::Greeting,
    )
    .with_actions(vec![
        ChatAction::navigate("Browse Jobs", "/browse-jobs"),
        ChatAction::navigate("View My Jobs", "/your-jobs"),
        ChatAction::navigate("Edit Profile", "/profile"),
    ])
}

#[inline]
pub fn thanks() -> CannedReply {
    CannedReply::new(
        "You're welcome! Let me know if you need anything else.",
        ResponseType::Acknowledgment,
    )
}

#[inline]
pub fn small_talk(message: &str) -> CannedReply {
    if is(&HOW_ARE_YOU, message) {
        return CannedReply::new(
            "I'm doing great, thanks for asking! I'm ready to help you with your job search. How can I assist you today?",
            ResponseType::SmallTalk,
        );
    }
    if is(&HOWS_IT_GOING, message) {
        return CannedReply::new(
            "Everything's going well! I'm here to help you with your job search. What would you like to know?",
            ResponseType::SmallTalk,
        )
        .with_actions(vec![
            ChatAction::navigate("Browse Jobs", "/browse-jobs"),
            ChatAction::navigate("View My Jobs", "/your-jobs"),
        ]);
    }
    if is(&WHATS_UP, message) {
        return CannedReply::new(
            "Not much! Just here to help you with your job search. What can I do for you today?",
            ResponseType::SmallTalk,
        );
    }
    CannedReply::new(
        "I'm here to help you with your job search! What can I do for you?",
        ResponseType::SmallTalk,
    )
}

#[inline]
pub fn sign_in_required() -> CannedReply {
    CannedReply::new(
        "To see your progress, please log in to your account. Once logged in, you can view your applications, interview status and job search progress in the 'My Jobs' section.",
        ResponseType::AuthRequired,
    )
    .with_actions(vec![ChatAction::navigate("Log In", "/login")])
}

/// Personalised progress summary
#[inline]
pub fn user_status(counts: &ApplicationCounts) -> CannedReply {
    let mut response = format!(
        "Here's your job search progress:\n\nTotal applications: {}\nPending: {}\nInterviewing: {}\nOffers: {}\nRejected: {}\n\n",
        counts.total, counts.pending, counts.interviewing, counts.offered, counts.rejected
    );

    let advice = if counts.total == 0 {
        "You haven't applied to any jobs yet. Start by browsing jobs on the homepage and swiping right on positions you're interested in!".to_string()
    } else if counts.interviewing > 0 {
        format!(
            "Great job! You have {} interview{} in progress. Keep preparing and respond promptly to employer messages.",
            counts.interviewing,
            if counts.interviewing > 1 { "s" } else { "" }
        )
    } else if counts.total < 10 {
        "You're off to a good start! Try applying to 10-20 jobs to increase your chances.".to_string()
    } else if counts.pending * 5 > counts.total * 4 {
        "Most of your applications are still pending. This is normal! Employers typically respond within 1-2 weeks. Keep applying while you wait.".to_string()
    } else {
        "You're making good progress! Keep applying consistently and following up on your applications.".to_string()
    };
    response.push_str(&advice);

    CannedReply::new(response, ResponseType::UserData).with_actions(vec![
        ChatAction::navigate("View My Jobs", "/your-jobs"),
        ChatAction::navigate("Browse More Jobs", "/browse-jobs"),
    ])
}

#[inline]
pub fn user_status_unavailable() -> CannedReply {
    CannedReply::new(
        "I'm having trouble accessing your application data right now. Please try refreshing the page or check the 'My Jobs' section directly.",
        ResponseType::Error,
    )
}

#[inline]
pub fn off_topic_actions() -> Vec<ChatAction> {
    vec![
        ChatAction::navigate("Browse Jobs", "/browse-jobs"),
        ChatAction::navigate("View My Jobs", "/your-jobs"),
    ]
}
