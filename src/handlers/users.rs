// handlers/users.rs - /users routes, including login and registration

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::auth::password::{hash_password, verify_password};
use crate::database::models::{NewUser, User};
use crate::error::ApiError;
use crate::handlers::{parse_id, Message};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

/// Body of POST /users and POST /users/register
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub apartment: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: String,
    pub token: String,
}

/// GET /users
pub async fn list(State(state): State<AppState>, user: AuthUser) -> ApiResult<Vec<User>> {
    user.require_admin()?;
    let users = state.stores.users.list_users().await?;
    Ok(ApiResponse::success(users))
}

/// GET /users/:id
pub async fn get(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<User> {
    let id = parse_id(&id)?;
    caller.require_self_or_admin(id)?;

    let user = state
        .stores
        .users
        .find_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("The user with given id was not found"))?;
    Ok(ApiResponse::success(user))
}

/// GET /users/get/count
pub async fn count(State(state): State<AppState>, user: AuthUser) -> ApiResult<Value> {
    user.require_admin()?;
    let user_count = state.stores.users.count_users().await?;
    Ok(ApiResponse::success(json!({ "userCount": user_count })))
}

/// POST /users - admin only, may create other admins
pub async fn create(
    State(state): State<AppState>,
    caller: AuthUser,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> ApiResult<User> {
    caller.require_admin()?;
    let Json(payload) = payload?;
    let user = insert_user(&state, payload).await?;
    Ok(ApiResponse::created(user))
}

/// POST /users/register - public sign-up; the admin flag is ignored
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> ApiResult<User> {
    let Json(mut payload) = payload?;
    payload.is_admin = false;
    let user = insert_user(&state, payload).await?;
    Ok(ApiResponse::created(user))
}

/// POST /users/login
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let Json(request) = payload?;

    let mut errors = HashMap::new();
    let email = request.email.map(|e| normalize_email(&e)).filter(|e| !e.is_empty());
    let password = request.password.filter(|p| !p.is_empty());
    if email.is_none() {
        errors.insert("email".to_string(), "This field is required".to_string());
    }
    if password.is_none() {
        errors.insert("password".to_string(), "This field is required".to_string());
    }
    let (Some(email), Some(password)) = (email, password) else {
        return Err(ApiError::validation_error("Email and password are required", Some(errors)));
    };

    let user = state
        .stores
        .users
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::not_found("The user was not found"))?;

    if !verify_password(&password, &user.password_hash).await? {
        warn!("Failed login for {}", user.email);
        return Err(ApiError::bad_request("Password is wrong"));
    }

    let token = state.keys.issue(user.id, user.is_admin)?;
    info!("User {} logged in", user.id);
    Ok(ApiResponse::success(LoginResponse {
        user: user.email,
        token,
    }))
}

/// DELETE /users/:id
pub async fn delete(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Message> {
    caller.require_admin()?;
    let id = parse_id(&id)?;

    if !state.stores.users.delete_user(id).await? {
        return Err(ApiError::not_found("The user was not found"));
    }
    info!("Deleted user {}", id);
    Ok(ApiResponse::success(Message::new("The user was deleted")))
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Validate, hash the password and store the user
pub async fn insert_user(state: &AppState, payload: UserPayload) -> Result<User, ApiError> {
    let mut errors = HashMap::new();
    let mut required = |key: &str, value: Option<String>| -> String {
        match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            Some(v) => v,
            None => {
                errors.insert(key.to_string(), "This field is required".to_string());
                String::new()
            }
        }
    };

    let name = required("name", payload.name);
    let email = normalize_email(&required("email", payload.email));
    let phone = required("phone", payload.phone);
    let password = payload.password.filter(|p| !p.is_empty());

    if password.is_none() {
        errors.insert("password".to_string(), "This field is required".to_string());
    }
    if !email.is_empty() && !email.contains('@') {
        errors.insert("email".to_string(), "Must be a valid email address".to_string());
    }
    let Some(password) = password.filter(|_| errors.is_empty()) else {
        return Err(ApiError::validation_error("The user cannot be created", Some(errors)));
    };

    let password_hash = hash_password(&password, state.config.security.bcrypt_cost).await?;
    let user = state
        .stores
        .users
        .insert_user(NewUser {
            name,
            email,
            password_hash,
            phone,
            is_admin: payload.is_admin,
            street: payload.street,
            apartment: payload.apartment,
            zip: payload.zip,
            city: payload.city,
            country: payload.country,
        })
        .await?;

    info!("Created user {} (admin: {})", user.id, user.is_admin);
    Ok(user)
}
