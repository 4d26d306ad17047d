//! Lifecycle semantics exercised through the library's domain API: the
//! document review machine, sweep idempotence, and reminder windows.

use chrono::{Duration, Utc};

use complyhub::config::ReminderPolicy;
use complyhub::domain::compliance::{
    due_soon_reminder_eligible, is_forward_transition, is_overdue, overdue_reminder_eligible,
    sweep_eligible, ComplianceStatus, ReminderState,
};
use complyhub::domain::document::{next_version, DocumentStatus};
use complyhub::domain::similarity::{cosine_similarity, rank_by_similarity};

#[test]
fn new_versions_reenter_the_review_workflow() {
    // A rejected document gets a new version: version number advances and the
    // workflow restarts at Pending Review.
    let rejected = DocumentStatus::Rejected;
    assert!(rejected.is_terminal());
    assert_eq!(next_version(1), 2);
    assert_eq!(DocumentStatus::initial(), DocumentStatus::PendingReview);
}

#[test]
fn sweep_promotion_is_idempotent() {
    let now = Utc::now().naive_utc();
    let due_yesterday = now - Duration::days(1);

    // First run: an On Track task past due is eligible and becomes Overdue.
    assert!(is_overdue(due_yesterday, ComplianceStatus::OnTrack, now));
    assert!(sweep_eligible(ComplianceStatus::OnTrack));

    // Second run: the promoted task no longer matches the sweep's guard, so
    // nothing moves again.
    assert!(!sweep_eligible(ComplianceStatus::Overdue));
    assert!(!sweep_eligible(ComplianceStatus::Resolved));
}

#[test]
fn overdue_notification_respects_cooldown_across_runs() {
    let policy = ReminderPolicy::default();
    let now = Utc::now().naive_utc();

    let mut task = ReminderState {
        due_date: now - Duration::days(1),
        status: ComplianceStatus::Overdue,
        reminders_enabled: true,
        last_reminder_sent: None,
    };

    // First sweep notifies and stamps last_reminder_sent.
    assert!(overdue_reminder_eligible(task, policy, now));
    task.last_reminder_sent = Some(now);

    // An immediate re-run must not notify again.
    assert!(!overdue_reminder_eligible(task, policy, now));

    // After the cooldown it becomes eligible once more.
    let later = now + Duration::hours(policy.overdue_cooldown_hours + 1);
    assert!(overdue_reminder_eligible(task, policy, later));
}

#[test]
fn due_soon_and_overdue_windows_do_not_overlap() {
    let policy = ReminderPolicy::default();
    let now = Utc::now().naive_utc();

    let upcoming = ReminderState {
        due_date: now + Duration::days(2),
        status: ComplianceStatus::Pending,
        reminders_enabled: true,
        last_reminder_sent: None,
    };
    assert!(due_soon_reminder_eligible(upcoming, policy, now));
    assert!(!overdue_reminder_eligible(upcoming, policy, now));

    let past_due = ReminderState {
        due_date: now - Duration::days(2),
        status: ComplianceStatus::Overdue,
        reminders_enabled: true,
        last_reminder_sent: None,
    };
    assert!(!due_soon_reminder_eligible(past_due, policy, now));
    assert!(overdue_reminder_eligible(past_due, policy, now));
}

// Current behavior pinned: backward transitions are not part of the nominal
// forward table but the API still accepts them; see DESIGN.md before
// changing either side.
#[test]
fn forward_table_matches_nominal_workflow_only() {
    use ComplianceStatus::*;
    for from in ComplianceStatus::ALL {
        assert!(!is_forward_transition(Resolved, from));
    }
    assert!(is_forward_transition(Pending, Resolved));
    assert!(is_forward_transition(Overdue, Resolved));
    assert!(!is_forward_transition(Overdue, Pending));
}

#[test]
fn semantic_ranking_orders_by_similarity_before_any_filter() {
    let entries = vec![
        ("finance-handbook", vec![0.9, 0.1, 0.0]),
        ("exact-match", vec![1.0, 0.0, 0.0]),
        ("noise", vec![0.0, 0.0, 1.0]),
    ];

    let ranked = rank_by_similarity(entries, &[1.0, 0.0, 0.0], 0.7, |entry| &entry.1);
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].0 .0, "exact-match");
    assert!(ranked[0].1 > ranked[1].1);
    assert!(cosine_similarity(&[0.0, 0.0, 1.0], &[1.0, 0.0, 0.0]) < 0.7);
}
