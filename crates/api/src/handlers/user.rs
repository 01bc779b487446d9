//! Handlers for the authenticated user's own profile.

use axum::extract::State;
use axum::Json;
use haggle_db::models::user::UserResponse;
use serde::Deserialize;
use validator::Validate;

use crate::auth::identity::ProfileUpdate;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Request body for `PATCH /users/me`. Omitted fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, message = "Name must not be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "Email is invalid"))]
    pub email: Option<String>,
    #[validate(length(min = 1, message = "Phone must not be empty"))]
    pub phone: Option<String>,
    #[validate(length(min = 1, message = "Password must not be empty"))]
    pub password: Option<String>,
}

/// GET /api/v1/users/me
pub async fn get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<UserResponse>> {
    let user = state.identity.user_profile(auth.user_id).await?;
    Ok(Json(UserResponse::from(&user)))
}

/// PATCH /api/v1/users/me
///
/// Update name, email, phone or password of the caller.
pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<UpdateProfileRequest>,
) -> AppResult<Json<UserResponse>> {
    input.validate()?;

    let update = ProfileUpdate {
        name: input.name,
        email: input.email,
        phone: input.phone,
        password: input.password,
    };
    let user = state.identity.update_profile(auth.user_id, update).await?;
    Ok(Json(UserResponse::from(&user)))
}
