use super::*;
use chrono::TimeZone;

#[test]
fn feedback_kind_parsing() {
    assert_eq!(
        "positive".parse::<FeedbackKind>().expect("should parse"),
        FeedbackKind::Positive
    );
    assert_eq!(
        "negative".parse::<FeedbackKind>().expect("should parse"),
        FeedbackKind::Negative
    );
    assert!("meh".parse::<FeedbackKind>().is_err());
    assert_eq!(FeedbackKind::Negative.to_string(), "negative");
}

#[test]
fn tally_negative_count() {
    let tally = FeedbackTally {
        total: 7,
        positive: 4,
    };
    assert_eq!(tally.negative(), 3);
    assert_eq!(FeedbackTally::default().negative(), 0);
}

#[test]
fn timestamps_are_fixed_width() {
    let whole = Utc.with_ymd_and_hms(2026, 3, 1, 9, 5, 0).single().expect("valid date");
    let later = whole + chrono::Duration::milliseconds(250);

    assert_eq!(sql_timestamp(whole), "2026-03-01T09:05:00.000Z");
    assert_eq!(sql_timestamp(later), "2026-03-01T09:05:00.250Z");
    assert!(sql_timestamp(whole) < sql_timestamp(later));
}

#[test]
fn feedback_kind_serde() {
    let json = serde_json::to_string(&FeedbackKind::Positive).expect("should serialize");
    assert_eq!(json, "\"positive\"");
}
