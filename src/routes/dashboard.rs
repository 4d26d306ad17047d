//! Read-only reporting over the document, compliance, knowledge-base, and
//! identity stores. No mutation happens on these paths.

use std::collections::HashMap;

use axum::extract::{Json, Path, Query, State};
use chrono::{Duration, NaiveDateTime, NaiveTime, Utc};
use diesel::dsl::count_star;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_types::Bool;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::domain::{ComplianceStatus, DocumentStatus, Role};
use crate::error::{AppError, AppResult};
use crate::models::{ComplianceTask, Document, User};
use crate::response::{self, ApiResponse};
use crate::routes::compliance::TaskResponse;
use crate::routes::documents::DocumentResponse;
use crate::schema::{compliance_tasks, documents, knowledge_base_entries, users};
use crate::state::AppState;

const UPLOAD_SERIES_DAYS: i64 = 7;
const RECENT_LIMIT: i64 = 10;

type DocPredicate = Box<dyn BoxableExpression<documents::table, Pg, SqlType = Bool>>;
type TaskPredicate = Box<dyn BoxableExpression<compliance_tasks::table, Pg, SqlType = Bool>>;

#[derive(Deserialize)]
pub struct DashboardQuery {
    pub department: Option<String>,
}

fn start_of_today(now: NaiveDateTime) -> NaiveDateTime {
    now.date().and_time(NaiveTime::MIN)
}

fn documents_scope(department: &Option<String>) -> DocPredicate {
    let mut predicate: DocPredicate = Box::new(documents::is_archived.eq(false));
    if let Some(department) = department {
        predicate = Box::new(predicate.and(documents::department.eq(department.clone())));
    }
    predicate
}

fn tasks_scope(department: &Option<String>) -> TaskPredicate {
    let mut predicate: TaskPredicate = Box::new(compliance_tasks::is_active.eq(true));
    if let Some(department) = department {
        predicate = Box::new(predicate.and(compliance_tasks::department.eq(department.clone())));
    }
    predicate
}

/// Bucket upload timestamps into a dense per-day series ending today.
fn upload_series(uploads: &[NaiveDateTime], now: NaiveDateTime) -> Vec<Value> {
    let mut per_day: HashMap<String, i64> = HashMap::new();
    for at in uploads {
        *per_day.entry(at.date().to_string()).or_default() += 1;
    }

    (0..UPLOAD_SERIES_DAYS)
        .rev()
        .map(|offset| {
            let date = (now - Duration::days(offset)).date().to_string();
            let count = per_day.get(&date).copied().unwrap_or(0);
            json!({ "date": date, "count": count })
        })
        .collect()
}

pub async fn dashboard_stats(
    State(state): State<AppState>,
    Query(params): Query<DashboardQuery>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<Value>>> {
    let department = if user.is_admin() {
        params.department
    } else {
        user.department().map(str::to_string)
    };

    let now = Utc::now().naive_utc();
    let mut conn = state.db()?;

    let documents_today: i64 = documents::table
        .filter(documents_scope(&department))
        .filter(documents::created_at.ge(start_of_today(now)))
        .count()
        .get_result(&mut conn)?;
    let total_documents: i64 = documents::table
        .filter(documents_scope(&department))
        .count()
        .get_result(&mut conn)?;
    let approved_documents: i64 = documents::table
        .filter(documents_scope(&department))
        .filter(documents::status.eq(DocumentStatus::Approved.as_str()))
        .count()
        .get_result(&mut conn)?;

    let pending_compliance: i64 = compliance_tasks::table
        .filter(tasks_scope(&department))
        .filter(compliance_tasks::status.eq_any(vec![
            ComplianceStatus::Pending.as_str(),
            ComplianceStatus::OnTrack.as_str(),
        ]))
        .count()
        .get_result(&mut conn)?;
    let overdue_compliance: i64 = compliance_tasks::table
        .filter(tasks_scope(&department))
        .filter(compliance_tasks::due_date.lt(now))
        .filter(compliance_tasks::status.ne(ComplianceStatus::Resolved.as_str()))
        .count()
        .get_result(&mut conn)?;
    let total_compliance: i64 = compliance_tasks::table
        .filter(tasks_scope(&department))
        .count()
        .get_result(&mut conn)?;
    let resolved_compliance: i64 = compliance_tasks::table
        .filter(tasks_scope(&department))
        .filter(compliance_tasks::status.eq(ComplianceStatus::Resolved.as_str()))
        .count()
        .get_result(&mut conn)?;

    let active_departments: Vec<Option<String>> = users::table
        .filter(users::is_active.eq(true))
        .select(users::department)
        .distinct()
        .load(&mut conn)?;
    let active_departments = active_departments.into_iter().flatten().count();

    let knowledge_base_items: i64 = match &department {
        Some(department) => knowledge_base_entries::table
            .filter(knowledge_base_entries::is_active.eq(true))
            .filter(knowledge_base_entries::department.eq(department.clone()))
            .count()
            .get_result(&mut conn)?,
        None => knowledge_base_entries::table
            .filter(knowledge_base_entries::is_active.eq(true))
            .count()
            .get_result(&mut conn)?,
    };

    let uploads: Vec<NaiveDateTime> = documents::table
        .filter(documents_scope(&department))
        .filter(documents::created_at.ge(now - Duration::days(UPLOAD_SERIES_DAYS)))
        .select(documents::created_at)
        .load(&mut conn)?;

    let recent_documents: Vec<Document> = documents::table
        .filter(documents_scope(&department))
        .order(documents::created_at.desc())
        .limit(RECENT_LIMIT)
        .load(&mut conn)?;
    let recent_documents: Vec<DocumentResponse> = recent_documents
        .into_iter()
        .map(DocumentResponse::from)
        .collect();

    let upcoming: Vec<ComplianceTask> = compliance_tasks::table
        .filter(tasks_scope(&department))
        .filter(compliance_tasks::due_date.ge(now))
        .filter(
            compliance_tasks::due_date
                .le(now + Duration::days(state.config.reminder_policy.due_soon_window_days)),
        )
        .filter(compliance_tasks::status.ne(ComplianceStatus::Resolved.as_str()))
        .order(compliance_tasks::due_date.asc())
        .limit(RECENT_LIMIT)
        .load(&mut conn)?;
    let upcoming: Vec<TaskResponse> = upcoming.into_iter().map(TaskResponse::from).collect();

    let department_stats: Option<Vec<Value>> = if user.is_admin() {
        let departments: Vec<Option<String>> = users::table
            .filter(users::is_active.eq(true))
            .select(users::department)
            .distinct()
            .load(&mut conn)?;
        let mut stats = Vec::new();
        for department in departments.into_iter().flatten() {
            let doc_count: i64 = documents::table
                .filter(documents::is_archived.eq(false))
                .filter(documents::department.eq(&department))
                .count()
                .get_result(&mut conn)?;
            let task_count: i64 = compliance_tasks::table
                .filter(compliance_tasks::is_active.eq(true))
                .filter(compliance_tasks::department.eq(&department))
                .count()
                .get_result(&mut conn)?;
            let user_count: i64 = users::table
                .filter(users::is_active.eq(true))
                .filter(users::department.eq(&department))
                .count()
                .get_result(&mut conn)?;
            stats.push(json!({
                "department": department,
                "documents": doc_count,
                "compliance": task_count,
                "users": user_count,
            }));
        }
        Some(stats)
    } else {
        None
    };

    let rate = |part: i64, whole: i64| {
        if whole > 0 {
            ((part as f64 / whole as f64) * 100.0).round() as i64
        } else {
            0
        }
    };

    Ok(response::ok(
        "dashboard statistics retrieved successfully",
        json!({
            "overview": {
                "documents_uploaded_today": documents_today,
                "total_documents": total_documents,
                "pending_compliance": pending_compliance,
                "overdue_compliance": overdue_compliance,
                "active_departments": active_departments,
                "knowledge_base_items": knowledge_base_items,
                "compliance_completion_rate": rate(resolved_compliance, total_compliance),
                "document_approval_rate": rate(approved_documents, total_documents),
            },
            "trends": {
                "weekly_uploads": upload_series(&uploads, now),
            },
            "recent": {
                "recent_documents": recent_documents,
                "upcoming_compliance": upcoming,
            },
            "department_stats": department_stats,
        }),
    ))
}

pub async fn department_stats(
    State(state): State<AppState>,
    Path(department): Path<String>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<Value>>> {
    if user.role == Role::DepartmentUser && user.department() != Some(department.as_str()) {
        return Err(AppError::forbidden(
            "access denied: you can only view your department's statistics",
        ));
    }

    let mut conn = state.db()?;

    let total_documents: i64 = documents::table
        .filter(documents::is_archived.eq(false))
        .filter(documents::department.eq(&department))
        .count()
        .get_result(&mut conn)?;

    let documents_by_status: Vec<(String, i64)> = documents::table
        .filter(documents::is_archived.eq(false))
        .filter(documents::department.eq(&department))
        .group_by(documents::status)
        .select((documents::status, count_star()))
        .load(&mut conn)?;

    let compliance_by_status: Vec<(String, i64)> = compliance_tasks::table
        .filter(compliance_tasks::is_active.eq(true))
        .filter(compliance_tasks::department.eq(&department))
        .group_by(compliance_tasks::status)
        .select((compliance_tasks::status, count_star()))
        .load(&mut conn)?;

    let uploader_counts: Vec<(Uuid, i64)> = documents::table
        .filter(documents::is_archived.eq(false))
        .filter(documents::department.eq(&department))
        .group_by(documents::uploaded_by)
        .select((documents::uploaded_by, count_star()))
        .order(count_star().desc())
        .limit(RECENT_LIMIT)
        .load(&mut conn)?;

    let uploader_ids: Vec<Uuid> = uploader_counts.iter().map(|(id, _)| *id).collect();
    let uploaders: Vec<User> = users::table
        .filter(users::id.eq_any(&uploader_ids))
        .load(&mut conn)?;
    let by_id: HashMap<Uuid, User> = uploaders.into_iter().map(|u| (u.id, u)).collect();

    let top_users: Vec<Value> = uploader_counts
        .into_iter()
        .map(|(id, count)| {
            let (name, email) = by_id
                .get(&id)
                .map(|u| (u.name.clone(), u.email.clone()))
                .unwrap_or_default();
            json!({ "user_id": id, "name": name, "email": email, "document_count": count })
        })
        .collect();

    let counts_json = |counts: Vec<(String, i64)>, key: &str| -> Vec<Value> {
        counts
            .into_iter()
            .map(|(value, count)| json!({ key: value, "count": count }))
            .collect()
    };

    Ok(response::ok(
        "department statistics retrieved successfully",
        json!({
            "department": department,
            "total_documents": total_documents,
            "documents_by_status": counts_json(documents_by_status, "status"),
            "compliance_by_status": counts_json(compliance_by_status, "status"),
            "top_users": top_users,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_series_is_dense_and_ends_today() {
        let now = Utc::now().naive_utc();
        let uploads = vec![now, now, now - Duration::days(2)];
        let series = upload_series(&uploads, now);

        assert_eq!(series.len(), UPLOAD_SERIES_DAYS as usize);
        assert_eq!(series.last().unwrap()["count"], 2);
        assert_eq!(series[UPLOAD_SERIES_DAYS as usize - 3]["count"], 1);
        assert_eq!(series[0]["count"], 0);
    }
}
