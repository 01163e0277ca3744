//! Request guards. `CurrentUser` resolves the bearer token to a live
//! user row on every request; `CurrentAdmin` additionally requires the
//! admin role. Handlers take these as extractor arguments.

use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::{security, state::AppState};
use crate::db::models::User;
use crate::db::types::UserRole;
use crate::repositories;

const BAD_CREDENTIALS: &str = "Invalid authentication credentials";

pub(crate) struct CurrentUser(pub(crate) User);
pub(crate) struct CurrentAdmin(pub(crate) User);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())?
        .strip_prefix("Bearer ")
}

async fn authenticate(parts: &mut Parts, state: &AppState) -> Result<User, ApiError> {
    let State(app) = State::<AppState>::from_request_parts(parts, state)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

    let token = bearer_token(parts).ok_or(ApiError::Unauthorized(BAD_CREDENTIALS))?;
    let claims = security::verify_token(token, app.settings())
        .map_err(|_| ApiError::Unauthorized(BAD_CREDENTIALS))?;

    let user = repositories::users::find_by_id(app.db(), &claims.sub)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?
        .ok_or(ApiError::Unauthorized("User not found"))?;

    if !user.is_active {
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS));
    }
    Ok(user)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).await.map(CurrentUser)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state).await?;
        if user.role == UserRole::Admin {
            Ok(CurrentAdmin(user))
        } else {
            Err(ApiError::Forbidden("Admin access required"))
        }
    }
}
