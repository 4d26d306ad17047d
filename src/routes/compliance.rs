use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use diesel::dsl::count_star;
use diesel::pg::Pg;
use diesel::sql_types::Bool;
use diesel::{prelude::*, PgConnection};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::domain::{access, CompliancePriority, ComplianceStatus, DocumentStatus};
use crate::error::{AppError, AppResult};
use crate::models::{ComplianceTask, Document, NewComplianceTask};
use crate::response::{self, ApiResponse};
use crate::routes::documents::{paginate, pagination};
use crate::schema::{compliance_tasks, documents, users};
use crate::state::AppState;

type TaskPredicate = Box<dyn BoxableExpression<compliance_tasks::table, Pg, SqlType = Bool>>;

#[derive(Deserialize)]
pub struct TaskListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub department: Option<String>,
    pub assigned_to: Option<Uuid>,
    #[serde(default)]
    pub due_soon: bool,
    #[serde(default)]
    pub overdue: bool,
    pub sort_order: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateTaskRequest {
    pub document_id: Uuid,
    pub due_date: DateTime<Utc>,
    pub priority: Option<String>,
    pub compliance_type: String,
    pub description: String,
    pub assigned_to: Uuid,
    pub reminders: Option<bool>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub resolution_notes: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateTaskRequest {
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Option<String>,
    pub compliance_type: Option<String>,
    pub description: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub reminders: Option<bool>,
}

#[derive(Serialize)]
pub struct TaskResponse {
    pub id: Uuid,
    pub document_id: Uuid,
    pub department: String,
    pub due_date: String,
    pub status: String,
    pub priority: String,
    pub compliance_type: String,
    pub description: String,
    pub assigned_to: Uuid,
    pub reminders: bool,
    pub reminder_sent: bool,
    pub last_reminder_sent: Option<String>,
    pub resolution_notes: Option<String>,
    pub resolved_at: Option<String>,
    pub resolved_by: Option<Uuid>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ComplianceTask> for TaskResponse {
    fn from(task: ComplianceTask) -> Self {
        Self {
            id: task.id,
            document_id: task.document_id,
            department: task.department,
            due_date: task.due_date.and_utc().to_rfc3339(),
            status: task.status,
            priority: task.priority,
            compliance_type: task.compliance_type,
            description: task.description,
            assigned_to: task.assigned_to,
            reminders: task.reminders,
            reminder_sent: task.reminder_sent,
            last_reminder_sent: task.last_reminder_sent.map(|at| at.and_utc().to_rfc3339()),
            resolution_notes: task.resolution_notes,
            resolved_at: task.resolved_at.map(|at| at.and_utc().to_rfc3339()),
            resolved_by: task.resolved_by,
            is_active: task.is_active,
            created_at: task.created_at.and_utc().to_rfc3339(),
            updated_at: task.updated_at.and_utc().to_rfc3339(),
        }
    }
}

struct TaskFilter {
    department: Option<String>,
    status: Option<&'static str>,
    priority: Option<&'static str>,
    assigned_to: Option<Uuid>,
    due_soon: bool,
    overdue: bool,
    window_days: i64,
    now: NaiveDateTime,
}

impl TaskFilter {
    /// Department scoping mirrors point access: department users are pinned
    /// to their own department, admins may filter freely.
    fn from_query(user: &CurrentUser, params: &TaskListQuery, window_days: i64) -> AppResult<Self> {
        let department = if user.is_admin() {
            params.department.clone()
        } else {
            user.department().map(str::to_string)
        };

        let status = match params.status.as_deref() {
            Some(value) => Some(
                ComplianceStatus::parse(value)
                    .ok_or_else(|| AppError::bad_request("unknown compliance status"))?
                    .as_str(),
            ),
            None => None,
        };
        let priority = match params.priority.as_deref() {
            Some(value) => Some(
                CompliancePriority::parse(value)
                    .ok_or_else(|| AppError::bad_request("unknown compliance priority"))?
                    .as_str(),
            ),
            None => None,
        };

        Ok(Self {
            department,
            status,
            priority,
            assigned_to: params.assigned_to,
            due_soon: params.due_soon,
            overdue: params.overdue,
            window_days,
            now: Utc::now().naive_utc(),
        })
    }

    /// All filters as one conjunctive predicate, reusable across the page
    /// load and the count/grouping queries.
    fn predicate(&self) -> TaskPredicate {
        let mut predicate: TaskPredicate = Box::new(compliance_tasks::is_active.eq(true));

        if let Some(department) = &self.department {
            predicate =
                Box::new(predicate.and(compliance_tasks::department.eq(department.clone())));
        }
        if let Some(status) = self.status {
            predicate = Box::new(predicate.and(compliance_tasks::status.eq(status)));
        }
        if let Some(priority) = self.priority {
            predicate = Box::new(predicate.and(compliance_tasks::priority.eq(priority)));
        }
        if let Some(assigned_to) = self.assigned_to {
            predicate = Box::new(predicate.and(compliance_tasks::assigned_to.eq(assigned_to)));
        }
        if self.due_soon {
            let window_end = self.now + Duration::days(self.window_days);
            predicate = Box::new(
                predicate
                    .and(compliance_tasks::due_date.ge(self.now))
                    .and(compliance_tasks::due_date.le(window_end))
                    .and(compliance_tasks::status.ne(ComplianceStatus::Resolved.as_str())),
            );
        }
        if self.overdue {
            predicate = Box::new(
                predicate
                    .and(compliance_tasks::due_date.lt(self.now))
                    .and(compliance_tasks::status.ne(ComplianceStatus::Resolved.as_str())),
            );
        }

        predicate
    }
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Query(params): Query<TaskListQuery>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<Value>>> {
    let window_days = state.config.reminder_policy.due_soon_window_days;
    let filter = TaskFilter::from_query(&user, &params, window_days)?;
    let (page, limit, offset) = paginate(params.page, params.limit);

    let mut conn = state.db()?;

    let total_count: i64 = compliance_tasks::table
        .filter(filter.predicate())
        .count()
        .get_result(&mut conn)?;

    let mut query = compliance_tasks::table
        .filter(filter.predicate())
        .into_boxed();
    query = match params.sort_order.as_deref() {
        Some("desc") => query.order(compliance_tasks::due_date.desc()),
        _ => query.order(compliance_tasks::due_date.asc()),
    };
    let tasks: Vec<ComplianceTask> = query.limit(limit).offset(offset).load(&mut conn)?;

    let status_counts: Vec<(String, i64)> = compliance_tasks::table
        .filter(filter.predicate())
        .group_by(compliance_tasks::status)
        .select((compliance_tasks::status, count_star()))
        .load(&mut conn)?;
    let priority_counts: Vec<(String, i64)> = compliance_tasks::table
        .filter(filter.predicate())
        .group_by(compliance_tasks::priority)
        .select((compliance_tasks::priority, count_star()))
        .load(&mut conn)?;

    let tasks: Vec<TaskResponse> = tasks.into_iter().map(TaskResponse::from).collect();
    Ok(response::ok(
        "compliance tasks retrieved successfully",
        json!({
            "compliance_tasks": tasks,
            "pagination": pagination(page, limit, total_count),
            "status_counts": counts_json(status_counts, "status"),
            "priority_counts": counts_json(priority_counts, "priority"),
        }),
    ))
}

fn counts_json(counts: Vec<(String, i64)>, key: &str) -> Vec<Value> {
    counts
        .into_iter()
        .map(|(value, count)| json!({ key: value, "count": count }))
        .collect()
}

pub async fn create_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateTaskRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Value>>)> {
    let mut problems: Vec<(&str, &str)> = Vec::new();
    if payload.compliance_type.trim().is_empty() {
        problems.push(("compliance_type", "is required"));
    }
    if payload.description.trim().is_empty() {
        problems.push(("description", "is required"));
    }
    if !problems.is_empty() {
        return Err(AppError::validation("invalid compliance payload", problems));
    }

    let priority = match payload.priority.as_deref() {
        Some(value) => CompliancePriority::parse(value)
            .ok_or_else(|| AppError::bad_request("unknown compliance priority"))?,
        None => CompliancePriority::Medium,
    };

    let mut conn = state.db()?;

    let document: Document = documents::table
        .find(payload.document_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("document not found"))?;

    if !access::can_act(&user.actor(), &document.department) {
        return Err(AppError::forbidden(
            "access denied: you can only create compliance tasks for documents in your department",
        ));
    }

    let assignee: Option<Uuid> = users::table
        .find(payload.assigned_to)
        .select(users::id)
        .first(&mut conn)
        .optional()?;
    if assignee.is_none() {
        return Err(AppError::not_found("assigned user not found"));
    }

    // Department comes from the document, never the request body.
    let new_task = NewComplianceTask {
        id: Uuid::new_v4(),
        document_id: document.id,
        department: document.department.clone(),
        due_date: payload.due_date.naive_utc(),
        status: ComplianceStatus::Pending.as_str().to_string(),
        priority: priority.as_str().to_string(),
        compliance_type: payload.compliance_type.trim().to_string(),
        description: payload.description.trim().to_string(),
        assigned_to: payload.assigned_to,
        reminders: payload.reminders.unwrap_or(true),
    };

    diesel::insert_into(compliance_tasks::table)
        .values(&new_task)
        .execute(&mut conn)?;

    let task: ComplianceTask = compliance_tasks::table.find(new_task.id).first(&mut conn)?;
    info!(task_id = %task.id, document_id = %document.id, "compliance task created");

    Ok(response::created(
        "compliance task created successfully",
        json!({ "compliance_task": TaskResponse::from(task) }),
    ))
}

fn load_task(conn: &mut PgConnection, task_id: Uuid) -> AppResult<ComplianceTask> {
    compliance_tasks::table
        .find(task_id)
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("compliance task not found"))
}

fn ensure_task_access(user: &CurrentUser, task: &ComplianceTask, action: &str) -> AppResult<()> {
    if access::can_act(&user.actor(), &task.department) {
        Ok(())
    } else {
        Err(AppError::forbidden(format!(
            "access denied: you can only {action} compliance tasks from your department"
        )))
    }
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<Value>>> {
    let mut conn = state.db()?;
    let task = load_task(&mut conn, task_id)?;
    ensure_task_access(&user, &task, "view")?;

    Ok(response::ok(
        "compliance task retrieved successfully",
        json!({ "compliance_task": TaskResponse::from(task) }),
    ))
}

/// Arbitrary transitions are accepted here, including backward ones; the
/// nominal forward table lives in `domain::compliance` and is deliberately
/// not enforced (see DESIGN.md).
pub async fn update_task_status(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    user: CurrentUser,
    Json(payload): Json<UpdateStatusRequest>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let new_status = ComplianceStatus::parse(&payload.status)
        .ok_or_else(|| AppError::bad_request("unknown compliance status"))?;

    let mut conn = state.db()?;
    let task = load_task(&mut conn, task_id)?;
    ensure_task_access(&user, &task, "modify")?;

    let now = Utc::now().naive_utc();

    if new_status == ComplianceStatus::Resolved {
        diesel::update(compliance_tasks::table.find(task.id))
            .set((
                compliance_tasks::status.eq(new_status.as_str()),
                compliance_tasks::resolved_at.eq(Some(now)),
                compliance_tasks::resolved_by.eq(Some(user.id)),
                compliance_tasks::resolution_notes
                    .eq(payload.resolution_notes.clone().unwrap_or_default()),
                compliance_tasks::updated_at.eq(now),
            ))
            .execute(&mut conn)?;

        // Resolving the review obligation marks the source document approved.
        diesel::update(documents::table.find(task.document_id))
            .set((
                documents::status.eq(DocumentStatus::Approved.as_str()),
                documents::updated_at.eq(now),
            ))
            .execute(&mut conn)?;
    } else {
        // Leaving Resolved clears the resolution stamp so that
        // status = Resolved ⇔ resolved_at/resolved_by set keeps holding.
        diesel::update(compliance_tasks::table.find(task.id))
            .set((
                compliance_tasks::status.eq(new_status.as_str()),
                compliance_tasks::resolved_at.eq(None::<NaiveDateTime>),
                compliance_tasks::resolved_by.eq(None::<Uuid>),
                compliance_tasks::resolution_notes.eq(None::<String>),
                compliance_tasks::updated_at.eq(now),
            ))
            .execute(&mut conn)?;
    }

    let updated: ComplianceTask = compliance_tasks::table.find(task.id).first(&mut conn)?;
    Ok(response::ok(
        "compliance task status updated successfully",
        json!({ "compliance_task": TaskResponse::from(updated) }),
    ))
}

pub async fn update_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    user: CurrentUser,
    Json(payload): Json<UpdateTaskRequest>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let mut conn = state.db()?;
    let task = load_task(&mut conn, task_id)?;
    ensure_task_access(&user, &task, "modify")?;

    let priority = match payload.priority.as_deref() {
        Some(value) => Some(
            CompliancePriority::parse(value)
                .ok_or_else(|| AppError::bad_request("unknown compliance priority"))?,
        ),
        None => None,
    };
    if let Some(assigned_to) = payload.assigned_to {
        let exists: Option<Uuid> = users::table
            .find(assigned_to)
            .select(users::id)
            .first(&mut conn)
            .optional()?;
        if exists.is_none() {
            return Err(AppError::not_found("assigned user not found"));
        }
    }

    let now = Utc::now().naive_utc();
    if let Some(due_date) = payload.due_date {
        diesel::update(compliance_tasks::table.find(task.id))
            .set(compliance_tasks::due_date.eq(due_date.naive_utc()))
            .execute(&mut conn)?;
    }
    if let Some(priority) = priority {
        diesel::update(compliance_tasks::table.find(task.id))
            .set(compliance_tasks::priority.eq(priority.as_str()))
            .execute(&mut conn)?;
    }
    if let Some(compliance_type) = payload
        .compliance_type
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        diesel::update(compliance_tasks::table.find(task.id))
            .set(compliance_tasks::compliance_type.eq(compliance_type))
            .execute(&mut conn)?;
    }
    if let Some(description) = payload
        .description
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        diesel::update(compliance_tasks::table.find(task.id))
            .set(compliance_tasks::description.eq(description))
            .execute(&mut conn)?;
    }
    if let Some(reminders) = payload.reminders {
        diesel::update(compliance_tasks::table.find(task.id))
            .set(compliance_tasks::reminders.eq(reminders))
            .execute(&mut conn)?;
    }
    if let Some(assigned_to) = payload.assigned_to {
        diesel::update(compliance_tasks::table.find(task.id))
            .set(compliance_tasks::assigned_to.eq(assigned_to))
            .execute(&mut conn)?;
    }
    diesel::update(compliance_tasks::table.find(task.id))
        .set(compliance_tasks::updated_at.eq(now))
        .execute(&mut conn)?;

    let updated: ComplianceTask = compliance_tasks::table.find(task.id).first(&mut conn)?;
    Ok(response::ok(
        "compliance task updated successfully",
        json!({ "compliance_task": TaskResponse::from(updated) }),
    ))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<()>>> {
    let mut conn = state.db()?;
    let task = load_task(&mut conn, task_id)?;
    ensure_task_access(&user, &task, "delete")?;

    diesel::update(compliance_tasks::table.find(task.id))
        .set((
            compliance_tasks::is_active.eq(false),
            compliance_tasks::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)?;

    Ok(response::ok_empty("compliance task deleted successfully"))
}

/// Predicate for the read views: derived-overdue is `due_date < now` and not
/// resolved, regardless of whether the sweep has promoted the row yet.
fn view_predicate(user: &CurrentUser) -> TaskPredicate {
    let mut predicate: TaskPredicate = Box::new(compliance_tasks::is_active.eq(true));
    if !user.is_admin() {
        if let Some(department) = user.department() {
            predicate =
                Box::new(predicate.and(compliance_tasks::department.eq(department.to_string())));
        }
    }
    predicate
}

pub async fn overdue_tasks(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<Value>>> {
    let now = Utc::now().naive_utc();
    let mut conn = state.db()?;

    let tasks: Vec<ComplianceTask> = compliance_tasks::table
        .filter(view_predicate(&user))
        .filter(compliance_tasks::due_date.lt(now))
        .filter(compliance_tasks::status.ne(ComplianceStatus::Resolved.as_str()))
        .order(compliance_tasks::due_date.asc())
        .load(&mut conn)?;
    let tasks: Vec<TaskResponse> = tasks.into_iter().map(TaskResponse::from).collect();

    Ok(response::ok(
        "overdue compliance tasks retrieved successfully",
        json!({ "overdue_tasks": tasks }),
    ))
}

pub async fn due_soon_tasks(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<Value>>> {
    let now = Utc::now().naive_utc();
    let window_end = now + Duration::days(state.config.reminder_policy.due_soon_window_days);
    let mut conn = state.db()?;

    let tasks: Vec<ComplianceTask> = compliance_tasks::table
        .filter(view_predicate(&user))
        .filter(compliance_tasks::due_date.ge(now))
        .filter(compliance_tasks::due_date.le(window_end))
        .filter(compliance_tasks::status.ne(ComplianceStatus::Resolved.as_str()))
        .order(compliance_tasks::due_date.asc())
        .load(&mut conn)?;
    let tasks: Vec<TaskResponse> = tasks.into_iter().map(TaskResponse::from).collect();

    Ok(response::ok(
        "due soon compliance tasks retrieved successfully",
        json!({ "due_soon_tasks": tasks }),
    ))
}

pub async fn task_stats(
    State(state): State<AppState>,
    Query(params): Query<TaskListQuery>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<Value>>> {
    let department = if user.is_admin() {
        params.department.clone()
    } else {
        user.department().map(str::to_string)
    };

    let scope = |department: &Option<String>| -> TaskPredicate {
        let mut predicate: TaskPredicate = Box::new(compliance_tasks::is_active.eq(true));
        if let Some(department) = department {
            predicate =
                Box::new(predicate.and(compliance_tasks::department.eq(department.clone())));
        }
        predicate
    };

    let mut conn = state.db()?;

    let total: i64 = compliance_tasks::table
        .filter(scope(&department))
        .count()
        .get_result(&mut conn)?;

    let status_counts: Vec<(String, i64)> = compliance_tasks::table
        .filter(scope(&department))
        .group_by(compliance_tasks::status)
        .select((compliance_tasks::status, count_star()))
        .load(&mut conn)?;
    let mut by_status = serde_json::Map::new();
    for status in ComplianceStatus::ALL {
        by_status.insert(status.as_str().to_string(), json!(0));
    }
    let mut resolved = 0i64;
    for (status, count) in &status_counts {
        if status == ComplianceStatus::Resolved.as_str() {
            resolved = *count;
        }
        by_status.insert(status.clone(), json!(count));
    }
    let completion_rate = if total > 0 {
        ((resolved as f64 / total as f64) * 100.0).round() as i64
    } else {
        0
    };

    let priority_counts: Vec<(String, i64)> = compliance_tasks::table
        .filter(scope(&department))
        .group_by(compliance_tasks::priority)
        .select((compliance_tasks::priority, count_star()))
        .load(&mut conn)?;

    let department_counts: Option<Vec<Value>> = if user.is_admin() {
        let counts: Vec<(String, i64)> = compliance_tasks::table
            .filter(compliance_tasks::is_active.eq(true))
            .group_by(compliance_tasks::department)
            .select((compliance_tasks::department, count_star()))
            .load(&mut conn)?;
        Some(counts_json(counts, "department"))
    } else {
        None
    };

    Ok(response::ok(
        "compliance statistics retrieved successfully",
        json!({
            "overview": {
                "total_tasks": total,
                "by_status": by_status,
                "completion_rate": completion_rate,
            },
            "tasks_by_priority": counts_json(priority_counts, "priority"),
            "tasks_by_department": department_counts,
        }),
    ))
}
