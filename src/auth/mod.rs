pub mod jwt;
pub mod password;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::{Actor, Role},
    error::AppError,
    models::User,
    schema::users,
    state::AppState,
};

/// The authenticated principal. Claims are revalidated against the live user
/// row on every request, so deactivating an account invalidates outstanding
/// tokens at their next use.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department: Option<String>,
}

impl CurrentUser {
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id,
            role: self.role,
            department: self.department.clone(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Convenience for handlers that require a department-scoped principal.
    pub fn department(&self) -> Option<&str> {
        self.department.as_deref()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized("missing or invalid credentials"))?;

        let claims = state
            .jwt
            .verify_token(bearer.token())
            .map_err(|_| AppError::unauthorized("missing or invalid credentials"))?;

        let mut conn = state.db()?;
        let user: User = users::table
            .find(claims.sub)
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| AppError::unauthorized("missing or invalid credentials"))?;

        if !user.is_active {
            return Err(AppError::unauthorized(
                "account is deactivated, please contact an administrator",
            ));
        }

        let role = Role::parse(&user.role)
            .ok_or_else(|| AppError::internal(format!("unknown role '{}'", user.role)))?;

        Ok(CurrentUser {
            id: user.id,
            name: user.name,
            email: user.email,
            role,
            department: user.department,
        })
    }
}
