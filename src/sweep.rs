//! Periodic compliance sweep: due-date driven status promotion plus
//! "due soon" and "overdue" reminder dispatch.
//!
//! Safe to run repeatedly and concurrently: the promotion is a guarded,
//! forward-only UPDATE, and reminder marking is a compare-and-set on
//! `last_reminder_sent` so two racing sweeps cannot both claim the same
//! dispatch.

use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::PgConnection;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ReminderPolicy;
use crate::domain::compliance::{
    due_soon_reminder_eligible, overdue_reminder_eligible, ComplianceStatus, ReminderState,
};
use crate::models::{ComplianceTask, Document, User};
use crate::notify::{self, TEMPLATE_COMPLIANCE_OVERDUE, TEMPLATE_COMPLIANCE_REMINDER};
use crate::schema::{compliance_tasks, documents, users};
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("database pool error: {0}")]
    Pool(String),
}

pub type SweepResult<T> = Result<T, SweepError>;

#[derive(Debug, Default)]
pub struct SweepSummary {
    pub promoted: usize,
    pub due_soon_reminders: usize,
    pub overdue_notifications: usize,
}

/// Promote Pending/On Track tasks past their due date to Overdue. The WHERE
/// clause re-checks eligibility, so repeated or concurrent runs are no-ops
/// after the first (promote-if-still-eligible).
pub fn promote_overdue(conn: &mut PgConnection, now: NaiveDateTime) -> SweepResult<usize> {
    let promoted = diesel::update(
        compliance_tasks::table
            .filter(compliance_tasks::is_active.eq(true))
            .filter(compliance_tasks::due_date.lt(now))
            .filter(compliance_tasks::status.eq_any(vec![
                ComplianceStatus::Pending.as_str(),
                ComplianceStatus::OnTrack.as_str(),
            ])),
    )
    .set((
        compliance_tasks::status.eq(ComplianceStatus::Overdue.as_str()),
        compliance_tasks::updated_at.eq(now),
    ))
    .execute(conn)?;

    Ok(promoted)
}

fn reminder_state(task: &ComplianceTask) -> ReminderState {
    ReminderState {
        due_date: task.due_date,
        status: ComplianceStatus::parse(&task.status).unwrap_or(ComplianceStatus::Pending),
        reminders_enabled: task.reminders,
        last_reminder_sent: task.last_reminder_sent,
    }
}

/// Claim the dispatch slot for a task: only succeeds if no concurrent sweep
/// has marked it since we loaded it.
fn mark_reminder_sent(
    conn: &mut PgConnection,
    task: &ComplianceTask,
    now: NaiveDateTime,
) -> SweepResult<bool> {
    let updated = diesel::update(
        compliance_tasks::table
            .find(task.id)
            .filter(compliance_tasks::last_reminder_sent.is_not_distinct_from(task.last_reminder_sent)),
    )
    .set((
        compliance_tasks::reminder_sent.eq(true),
        compliance_tasks::last_reminder_sent.eq(Some(now)),
        compliance_tasks::updated_at.eq(now),
    ))
    .execute(conn)?;

    Ok(updated > 0)
}

fn task_context(
    conn: &mut PgConnection,
    task: &ComplianceTask,
) -> SweepResult<Option<(User, Document)>> {
    let assignee: Option<User> = users::table
        .find(task.assigned_to)
        .first(conn)
        .optional()?;
    let document: Option<Document> = documents::table
        .find(task.document_id)
        .first(conn)
        .optional()?;

    // Soft relations may dangle; a task whose assignee or document is gone is
    // skipped, not an error.
    Ok(assignee.zip(document))
}

async fn dispatch_due_soon(
    state: &AppState,
    conn: &mut PgConnection,
    policy: ReminderPolicy,
    now: NaiveDateTime,
) -> SweepResult<usize> {
    let window_end = now + ChronoDuration::days(policy.due_soon_window_days);
    let candidates: Vec<ComplianceTask> = compliance_tasks::table
        .filter(compliance_tasks::is_active.eq(true))
        .filter(compliance_tasks::reminders.eq(true))
        .filter(compliance_tasks::status.ne(ComplianceStatus::Resolved.as_str()))
        .filter(compliance_tasks::due_date.ge(now))
        .filter(compliance_tasks::due_date.le(window_end))
        .load(conn)?;

    let mut sent = 0usize;
    for task in candidates {
        if !due_soon_reminder_eligible(reminder_state(&task), policy, now) {
            continue;
        }
        let Some((assignee, document)) = task_context(conn, &task)? else {
            warn!(task_id = %task.id, "skipping reminder for task with dangling references");
            continue;
        };

        if !mark_reminder_sent(conn, &task, now)? {
            continue;
        }

        notify::send_best_effort(
            state.notifier.as_ref(),
            &assignee.email,
            TEMPLATE_COMPLIANCE_REMINDER,
            serde_json::json!({
                "task_id": task.id,
                "compliance_type": task.compliance_type,
                "document_title": document.title,
                "due_date": task.due_date.and_utc().to_rfc3339(),
                "priority": task.priority,
            }),
        )
        .await;
        sent += 1;
    }

    Ok(sent)
}

async fn dispatch_overdue(
    state: &AppState,
    conn: &mut PgConnection,
    policy: ReminderPolicy,
    now: NaiveDateTime,
) -> SweepResult<usize> {
    let candidates: Vec<ComplianceTask> = compliance_tasks::table
        .filter(compliance_tasks::is_active.eq(true))
        .filter(compliance_tasks::reminders.eq(true))
        .filter(compliance_tasks::status.ne(ComplianceStatus::Resolved.as_str()))
        .filter(compliance_tasks::due_date.lt(now))
        .load(conn)?;

    let mut sent = 0usize;
    for task in candidates {
        if !overdue_reminder_eligible(reminder_state(&task), policy, now) {
            continue;
        }
        let Some((assignee, document)) = task_context(conn, &task)? else {
            warn!(task_id = %task.id, "skipping notification for task with dangling references");
            continue;
        };

        if !mark_reminder_sent(conn, &task, now)? {
            continue;
        }

        notify::send_best_effort(
            state.notifier.as_ref(),
            &assignee.email,
            TEMPLATE_COMPLIANCE_OVERDUE,
            serde_json::json!({
                "task_id": task.id,
                "compliance_type": task.compliance_type,
                "document_title": document.title,
                "due_date": task.due_date.and_utc().to_rfc3339(),
                "priority": task.priority,
            }),
        )
        .await;
        sent += 1;
    }

    Ok(sent)
}

pub async fn run_sweep(state: &AppState) -> SweepResult<SweepSummary> {
    let now = Utc::now().naive_utc();
    let policy = state.config.reminder_policy;
    let mut conn = state
        .db()
        .map_err(|err| SweepError::Pool(err.message().to_string()))?;

    let promoted = promote_overdue(&mut conn, now)?;
    let due_soon_reminders = dispatch_due_soon(state, &mut conn, policy, now).await?;
    let overdue_notifications = dispatch_overdue(state, &mut conn, policy, now).await?;

    let summary = SweepSummary {
        promoted,
        due_soon_reminders,
        overdue_notifications,
    };
    info!(
        promoted = summary.promoted,
        due_soon = summary.due_soon_reminders,
        overdue = summary.overdue_notifications,
        "compliance sweep completed"
    );
    Ok(summary)
}
