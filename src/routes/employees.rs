use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use diesel::{prelude::*, result::DatabaseErrorKind};
use rand::{rngs::OsRng, RngCore};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::{password, CurrentUser};
use crate::domain::Role;
use crate::error::{AppError, AppResult};
use crate::models::{Document, NewDocumentAllowedUser, NewUser, User};
use crate::notify::{self, TEMPLATE_EMPLOYEE_INVITE};
use crate::response::{self, ApiResponse};
use crate::routes::auth::UserResponse;
use crate::schema::{document_allowed_users, documents, users};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct InviteRequest {
    pub name: String,
    pub email: String,
}

#[derive(Deserialize)]
pub struct AssignUsersRequest {
    pub user_ids: Vec<Uuid>,
}

fn generate_temp_password() -> String {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Invites a department user. The invitee inherits the admin's department and
/// receives a generated temporary password via the notification dispatcher.
pub async fn invite_employee(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<InviteRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Value>>)> {
    if !user.is_admin() {
        return Err(AppError::forbidden("only admins can invite employees"));
    }
    let department = user
        .department()
        .ok_or_else(|| AppError::bad_request("admin has no department"))?
        .to_string();

    let mut problems: Vec<(&str, &str)> = Vec::new();
    if payload.name.trim().len() < 2 {
        problems.push(("name", "must be at least 2 characters"));
    }
    if !payload.email.contains('@') {
        problems.push(("email", "must be a valid email address"));
    }
    if !problems.is_empty() {
        return Err(AppError::validation("invalid invite payload", problems));
    }

    let email = payload.email.trim().to_lowercase();
    let mut conn = state.db()?;

    let existing: Option<Uuid> = users::table
        .filter(users::email.eq(&email))
        .select(users::id)
        .first(&mut conn)
        .optional()?;
    if existing.is_some() {
        return Err(AppError::conflict("a user with this email already exists"));
    }

    let temp_password = generate_temp_password();
    let password_hash = password::hash_password(&temp_password)?;

    let new_user = NewUser {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        email: email.clone(),
        password_hash,
        role: Role::DepartmentUser.as_str().to_string(),
        department: Some(department.clone()),
    };
    match diesel::insert_into(users::table)
        .values(&new_user)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::conflict("a user with this email already exists"));
        }
        Err(err) => return Err(err.into()),
    }
    drop(conn);

    info!(user_id = %new_user.id, department = %department, "employee invited");

    // Credential delivery is best-effort; the account exists either way and
    // the admin can re-trigger delivery by resetting the password.
    notify::send_best_effort(
        state.notifier.as_ref(),
        &email,
        TEMPLATE_EMPLOYEE_INVITE,
        json!({
            "name": new_user.name,
            "temporary_password": temp_password,
            "department": department,
        }),
    )
    .await;

    Ok(response::created(
        "employee invited successfully",
        json!({ "user_id": new_user.id }),
    ))
}

pub async fn department_employees(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<Value>>> {
    if !user.is_admin() {
        return Err(AppError::forbidden(
            "only admins can view department employees",
        ));
    }
    let department = user
        .department()
        .ok_or_else(|| AppError::bad_request("admin has no department"))?
        .to_string();

    let mut conn = state.db()?;
    let employees: Vec<User> = users::table
        .filter(users::department.eq(&department))
        .filter(users::role.eq(Role::DepartmentUser.as_str()))
        .filter(users::is_active.eq(true))
        .order(users::name.asc())
        .load(&mut conn)?;

    let employees: Vec<UserResponse> = employees.into_iter().map(UserResponse::from).collect();
    Ok(response::ok(
        "department employees retrieved successfully",
        json!({ "employees": employees }),
    ))
}

/// Grants same-department users explicit access to a document (meaningful
/// for `access = self` documents).
pub async fn assign_users_to_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    user: CurrentUser,
    Json(payload): Json<AssignUsersRequest>,
) -> AppResult<Json<ApiResponse<Value>>> {
    if !user.is_admin() {
        return Err(AppError::forbidden("only admins can assign users"));
    }
    if payload.user_ids.is_empty() {
        return Err(AppError::bad_request("no users provided"));
    }

    let mut conn = state.db()?;
    let document: Document = documents::table
        .find(document_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("document not found"))?;

    if user.department() != Some(document.department.as_str()) {
        return Err(AppError::forbidden(
            "you can only assign users within your own department's documents",
        ));
    }

    let mut user_ids = payload.user_ids;
    user_ids.sort();
    user_ids.dedup();

    let assignees: Vec<User> = users::table
        .filter(users::id.eq_any(&user_ids))
        .load(&mut conn)?;
    if assignees.len() != user_ids.len() {
        return Err(AppError::bad_request("one or more users do not exist"));
    }

    let outsiders: Vec<&User> = assignees
        .iter()
        .filter(|assignee| assignee.department.as_deref() != Some(document.department.as_str()))
        .collect();
    if !outsiders.is_empty() {
        let invalid: Vec<Value> = outsiders
            .iter()
            .map(|u| json!({ "id": u.id, "name": u.name, "department": u.department }))
            .collect();
        return Err(
            AppError::bad_request("some users do not belong to your department")
                .with_detail(json!({ "invalid_users": invalid })),
        );
    }

    let grants: Vec<NewDocumentAllowedUser> = user_ids
        .iter()
        .map(|user_id| NewDocumentAllowedUser {
            document_id,
            user_id: *user_id,
            assigned_by: Some(user.id),
        })
        .collect();

    diesel::insert_into(document_allowed_users::table)
        .values(&grants)
        .on_conflict_do_nothing()
        .execute(&mut conn)?;

    let granted: Vec<Uuid> = document_allowed_users::table
        .filter(document_allowed_users::document_id.eq(document_id))
        .select(document_allowed_users::user_id)
        .load(&mut conn)?;

    let now = Utc::now().naive_utc();
    diesel::update(documents::table.find(document_id))
        .set(documents::updated_at.eq(now))
        .execute(&mut conn)?;

    Ok(response::ok(
        "users assigned successfully",
        json!({ "document_id": document_id, "allowed_users": granted }),
    ))
}
