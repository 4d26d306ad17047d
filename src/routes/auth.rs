use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use diesel::{prelude::*, result::DatabaseErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{password, CurrentUser},
    domain::Role,
    error::{AppError, AppResult},
    models::{NewUser, User},
    response::{self, ApiResponse},
    schema::users,
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub department: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub department: Option<String>,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub department: Option<String>,
    pub is_active: bool,
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            department: user.department,
            is_active: user.is_active,
            last_login: user.last_login.map(|at| at.and_utc().to_rfc3339()),
            created_at: user.created_at.and_utc().to_rfc3339(),
            updated_at: user.updated_at.and_utc().to_rfc3339(),
        }
    }
}

fn validate_registration(payload: &RegisterRequest) -> AppResult<()> {
    let mut problems: Vec<(&str, &str)> = Vec::new();
    if payload.name.trim().len() < 2 {
        problems.push(("name", "must be at least 2 characters"));
    }
    if !payload.email.contains('@') {
        problems.push(("email", "must be a valid email address"));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        problems.push(("password", "must be at least 6 characters"));
    }
    if payload.department.trim().is_empty() {
        problems.push(("department", "must not be empty"));
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation("invalid registration payload", problems))
    }
}

/// Registers the admin of a department. The first user of a department is
/// its admin; the one-admin-per-department invariant is checked here and
/// backstopped by a partial unique index.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Value>>)> {
    validate_registration(&payload)?;

    let email = payload.email.trim().to_lowercase();
    let department = payload.department.trim().to_string();
    let mut conn = state.db()?;

    let email_taken: Option<Uuid> = users::table
        .filter(users::email.eq(&email))
        .select(users::id)
        .first(&mut conn)
        .optional()?;
    if email_taken.is_some() {
        return Err(AppError::conflict("user already exists, please login"));
    }

    let admin_exists: Option<Uuid> = users::table
        .filter(users::department.eq(&department))
        .filter(users::role.eq(Role::Admin.as_str()))
        .select(users::id)
        .first(&mut conn)
        .optional()?;
    if admin_exists.is_some() {
        return Err(AppError::conflict(format!(
            "an admin already exists for the {department} department"
        )));
    }

    let password_hash = password::hash_password(&payload.password)?;
    let new_user = NewUser {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        email: email.clone(),
        password_hash,
        role: Role::Admin.as_str().to_string(),
        department: Some(department.clone()),
    };

    // The partial unique index backstops the admin check under races.
    match diesel::insert_into(users::table)
        .values(&new_user)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::conflict("user or department admin already exists"));
        }
        Err(err) => return Err(err.into()),
    }

    let user: User = users::table.find(new_user.id).first(&mut conn)?;
    let token = state
        .jwt
        .generate_token(user.id, &user.email, &user.role, user.department.as_deref())?;

    info!(user_id = %user.id, department = %department, "registered department admin");

    Ok(response::created(
        "admin registered successfully",
        json!({
            "user": UserResponse::from(user),
            "token": token,
            "expires_in": state.jwt.expiry_seconds(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let email = payload.email.trim().to_lowercase();
    let mut conn = state.db()?;

    let user: User = users::table
        .filter(users::email.eq(&email))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::unauthorized("invalid email or password"))?;

    if !user.is_active {
        return Err(AppError::unauthorized(
            "account is deactivated, please contact an administrator",
        ));
    }

    let valid = password::verify_password(&payload.password, &user.password_hash)
        .map_err(|_| AppError::unauthorized("invalid email or password"))?;
    if !valid {
        return Err(AppError::unauthorized("invalid email or password"));
    }

    let now = Utc::now().naive_utc();
    diesel::update(users::table.find(user.id))
        .set((users::last_login.eq(Some(now)), users::updated_at.eq(now)))
        .execute(&mut conn)?;

    let token = state
        .jwt
        .generate_token(user.id, &user.email, &user.role, user.department.as_deref())?;

    let user: User = users::table.find(user.id).first(&mut conn)?;
    Ok(response::ok(
        "login successful",
        json!({
            "user": UserResponse::from(user),
            "token": token,
            "expires_in": state.jwt.expiry_seconds(),
        }),
    ))
}

pub async fn get_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<ApiResponse<Value>>> {
    let mut conn = state.db()?;
    let user: User = users::table.find(user.id).first(&mut conn)?;
    Ok(response::ok(
        "profile retrieved successfully",
        json!({ "user": UserResponse::from(user) }),
    ))
}

pub async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    let department = payload
        .department
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    if name.is_none() && department.is_none() {
        return Err(AppError::bad_request("no changes provided"));
    }

    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();

    if let Some(name) = &name {
        diesel::update(users::table.find(user.id))
            .set((users::name.eq(name), users::updated_at.eq(now)))
            .execute(&mut conn)?;
    }
    if let Some(department) = &department {
        diesel::update(users::table.find(user.id))
            .set((
                users::department.eq(Some(department.clone())),
                users::updated_at.eq(now),
            ))
            .execute(&mut conn)?;
    }

    let updated: User = users::table.find(user.id).first(&mut conn)?;
    Ok(response::ok(
        "profile updated successfully",
        json!({ "user": UserResponse::from(updated) }),
    ))
}

pub async fn change_password(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    if payload.new_password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(
            "invalid password payload",
            vec![("new_password", "must be at least 6 characters")],
        ));
    }

    let mut conn = state.db()?;
    let record: User = users::table.find(user.id).first(&mut conn)?;

    let valid = password::verify_password(&payload.current_password, &record.password_hash)
        .map_err(AppError::internal)?;
    if !valid {
        return Err(AppError::bad_request("current password is incorrect"));
    }

    let password_hash = password::hash_password(&payload.new_password)?;
    diesel::update(users::table.find(user.id))
        .set((
            users::password_hash.eq(password_hash),
            users::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)?;

    Ok(response::ok_empty("password changed successfully"))
}
