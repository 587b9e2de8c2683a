use super::*;
use tempfile::TempDir;

async fn create_feedback_loop() -> (TempDir, FeedbackLoop) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let database = Database::initialize_from_config_dir(temp_dir.path())
        .await
        .expect("should open database");
    (temp_dir, FeedbackLoop::new(database, FeedbackConfig::default()))
}

fn rating(query: &str, feedback: FeedbackKind) -> NewFeedback {
    NewFeedback {
        message_id: "msg-1".to_string(),
        query: query.to_string(),
        feedback,
        comment: None,
        user_id: None,
    }
}

async fn seed(feedback_loop: &FeedbackLoop, query: &str, kind: FeedbackKind, times: usize) {
    for _ in 0..times {
        feedback_loop
            .record_at(rating(query, kind), Utc::now())
            .await
            .expect("should record feedback");
    }
}

#[test]
fn keywords_skip_stop_words_and_short_words() {
    assert_eq!(
        query_keywords("How do I apply to a job?"),
        vec!["apply".to_string(), "job".to_string()]
    );
    assert_eq!(
        query_keywords("Can I update my resume and profile photo"),
        vec![
            "update".to_string(),
            "resume".to_string(),
            "and".to_string()
        ]
    );
    assert!(query_keywords("how do I").is_empty());
}

#[test]
fn stats_from_tally() {
    let stats = FeedbackStats::from(FeedbackTally {
        total: 4,
        positive: 1,
    });
    assert_eq!(stats.negative, 3);
    assert!((stats.positive_rate - 0.25).abs() < f64::EPSILON);

    let empty = FeedbackStats::from(FeedbackTally::default());
    assert_eq!(empty, FeedbackStats::default());
}

#[tokio::test]
async fn record_validates_and_normalizes() {
    let (_temp_dir, feedback_loop) = create_feedback_loop().await;

    let mut missing_id = rating("apply", FeedbackKind::Positive);
    missing_id.message_id = "  ".to_string();
    assert!(matches!(
        feedback_loop.record_at(missing_id, Utc::now()).await,
        Err(RagError::Validation(_))
    ));

    assert!(matches!(
        feedback_loop
            .record_at(rating("   ", FeedbackKind::Positive), Utc::now())
            .await,
        Err(RagError::Validation(_))
    ));

    let mut with_comment = rating("  How do I apply?  ", FeedbackKind::Negative);
    with_comment.comment = Some("   ".to_string());
    let record = feedback_loop
        .record(with_comment)
        .await
        .expect("should record feedback");
    assert_eq!(record.query, "How do I apply?");
    assert_eq!(record.comment, None);
}

#[tokio::test]
async fn family_stats_match_similar_queries() {
    let (_temp_dir, feedback_loop) = create_feedback_loop().await;

    seed(&feedback_loop, "How do I apply to a job?", FeedbackKind::Negative, 2).await;
    seed(&feedback_loop, "Where do I apply", FeedbackKind::Positive, 1).await;
    seed(&feedback_loop, "Change password", FeedbackKind::Positive, 1).await;

    let family = feedback_loop
        .family_stats("how do i apply to a job?", 30)
        .await
        .expect("should compute stats");
    assert_eq!(family.total, 3);
    assert_eq!(family.negative, 2);

    let exact = feedback_loop
        .stats_for(QueryMatch::Exact("HOW DO I APPLY TO A JOB?".to_string()), 30)
        .await
        .expect("should compute stats");
    assert_eq!(exact.total, 2);
}

#[tokio::test]
async fn old_feedback_falls_outside_the_window() {
    let (_temp_dir, feedback_loop) = create_feedback_loop().await;

    feedback_loop
        .record_at(
            rating("withdraw application", FeedbackKind::Negative),
            Utc::now() - Duration::days(40),
        )
        .await
        .expect("should record feedback");

    let stats = feedback_loop
        .family_stats("withdraw application", 30)
        .await
        .expect("should compute stats");
    assert_eq!(stats.total, 0);
}

#[tokio::test]
async fn repeated_negatives_raise_an_alert() {
    let (_temp_dir, feedback_loop) = create_feedback_loop().await;
    seed(&feedback_loop, "How do I withdraw?", FeedbackKind::Negative, 3).await;

    let alerts = feedback_loop
        .analyze("How do I withdraw?", FeedbackKind::Negative)
        .await
        .expect("should analyze");

    assert!(alerts.contains(&FeedbackAlert::RepeatedNegative {
        query: "How do I withdraw?".to_string(),
        negative_count: 3,
    }));

    let positive_alerts = feedback_loop
        .analyze("How do I withdraw?", FeedbackKind::Positive)
        .await
        .expect("should analyze");
    assert!(
        !positive_alerts
            .iter()
            .any(|alert| matches!(alert, FeedbackAlert::RepeatedNegative { .. }))
    );
}

#[tokio::test]
async fn daily_satisfaction_alerts_need_enough_samples() {
    let (_temp_dir, feedback_loop) = create_feedback_loop().await;
    seed(&feedback_loop, "salary ranges", FeedbackKind::Negative, 4).await;
    seed(&feedback_loop, "salary ranges", FeedbackKind::Positive, 5).await;

    let alerts = feedback_loop
        .analyze("salary ranges", FeedbackKind::Positive)
        .await
        .expect("should analyze");
    assert!(
        !alerts
            .iter()
            .any(|alert| matches!(alert, FeedbackAlert::LowDailySatisfaction(_)))
    );

    seed(&feedback_loop, "salary ranges", FeedbackKind::Negative, 1).await;
    let alerts = feedback_loop
        .analyze("salary ranges", FeedbackKind::Negative)
        .await
        .expect("should analyze");
    assert!(
        alerts
            .iter()
            .any(|alert| matches!(alert, FeedbackAlert::LowDailySatisfaction(stats) if stats.total == 10))
    );
    assert!(
        alerts
            .iter()
            .any(|alert| matches!(alert, FeedbackAlert::LowFamilySuccess { .. }))
    );

    let rate = feedback_loop
        .daily_satisfaction()
        .await
        .expect("should compute rate");
    assert!((rate - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn high_daily_satisfaction_is_reported() {
    let (_temp_dir, feedback_loop) = create_feedback_loop().await;
    seed(&feedback_loop, "upload resume", FeedbackKind::Positive, 10).await;

    let alerts = feedback_loop
        .analyze("upload resume", FeedbackKind::Positive)
        .await
        .expect("should analyze");
    assert_eq!(alerts.len(), 1);
    assert!(matches!(alerts[0], FeedbackAlert::HighDailySatisfaction(_)));
}

#[tokio::test]
async fn summary_ranks_queries() {
    let (_temp_dir, feedback_loop) = create_feedback_loop().await;
    seed(&feedback_loop, "withdraw", FeedbackKind::Negative, 3).await;
    seed(&feedback_loop, "apply", FeedbackKind::Negative, 1).await;
    seed(&feedback_loop, "apply", FeedbackKind::Positive, 4).await;

    let summary = feedback_loop.summary(7).await.expect("should summarize");
    assert_eq!(summary.total, 8);
    assert_eq!(summary.positive, 4);
    assert_eq!(summary.negative, 4);
    assert!((summary.satisfaction_rate - 0.5).abs() < f64::EPSILON);
    assert_eq!(summary.top_negative_queries[0].query, "withdraw");
    assert_eq!(summary.top_positive_queries[0].count, 4);

    let report = summary.render();
    assert!(report.contains("Last 7 days"));
    assert!(report.contains("Satisfaction rate: 50.0%"));
    assert!(report.contains("1. \"withdraw\" (3 times)"));
    assert!(summary.recent_comments.is_empty());
    assert!(!report.contains("RECENT COMMENTS"));
}

#[tokio::test]
async fn summary_lists_recent_comments() {
    let (_temp_dir, feedback_loop) = create_feedback_loop().await;
    seed(&feedback_loop, "apply", FeedbackKind::Positive, 2).await;
    let mut commented = rating("withdraw", FeedbackKind::Negative);
    commented.comment = Some("  Steps were out of date  ".to_string());
    feedback_loop
        .record_at(commented, Utc::now())
        .await
        .expect("should record feedback");
    let mut stale = rating("profile", FeedbackKind::Negative);
    stale.comment = Some("old complaint".to_string());
    feedback_loop
        .record_at(stale, Utc::now() - Duration::days(30))
        .await
        .expect("should record feedback");

    let summary = feedback_loop.summary(7).await.expect("should summarize");
    assert_eq!(summary.negative, 1);
    assert_eq!(summary.recent_comments.len(), 1);
    assert_eq!(
        summary.recent_comments[0].comment.as_deref(),
        Some("Steps were out of date")
    );

    let report = summary.render();
    assert!(report.contains("RECENT COMMENTS:"));
    assert!(report.contains("[negative] \"withdraw\": Steps were out of date"));
    assert!(!report.contains("old complaint"));
}

#[test]
fn empty_summary_renders_without_division() {
    let summary = FeedbackSummary {
        days: 7,
        total: 0,
        positive: 0,
        negative: 0,
        satisfaction_rate: 0.0,
        top_negative_queries: Vec::new(),
        top_positive_queries: Vec::new(),
        recent_comments: Vec::new(),
    };
    let report = summary.render();
    assert!(report.contains("Positive: 0 (0.0%)"));
    assert!(!report.contains("TOP"));
}
