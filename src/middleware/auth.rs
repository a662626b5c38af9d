use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::{Claims, JwtKeys};
use crate::config::RevocationPolicy;
use crate::error::ApiError;
use crate::middleware::allow_list::AllowList;
use crate::state::AppState;

/// Authenticated caller, decoded from the bearer token
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub is_admin: bool,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            is_admin: claims.is_admin,
        }
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(ApiError::forbidden("Administrator privileges required"))
        }
    }

    /// Admins may act on anyone; everyone else only on themselves
    pub fn require_self_or_admin(&self, user_id: Uuid) -> Result<(), ApiError> {
        if self.is_admin || self.user_id == user_id {
            Ok(())
        } else {
            Err(ApiError::forbidden("Access to another user's resources is not allowed"))
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Outcome of a successful gate check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Matched the allow-list; no credential was inspected
    Public,
    Authenticated(AuthUser),
}

#[derive(Clone)]
pub struct AuthGate {
    allow_list: AllowList,
    keys: JwtKeys,
    policy: RevocationPolicy,
}

impl AuthGate {
    pub fn new(allow_list: AllowList, keys: JwtKeys, policy: RevocationPolicy) -> Self {
        Self {
            allow_list,
            keys,
            policy,
        }
    }

    pub fn policy(&self) -> RevocationPolicy {
        self.policy
    }

    /// Decide whether a request may proceed
    pub fn authenticate(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
    ) -> Result<Admission, ApiError> {
        if self.allow_list.is_allowed(method, path) {
            return Ok(Admission::Public);
        }

        let token = extract_jwt_from_headers(headers).map_err(ApiError::unauthorized)?;
        let claims = self.keys.verify(token)?;

        if self.is_revoked(&claims) {
            warn!("Rejected token of non-admin user {} for {} {}", claims.user_id, method, path);
            return Err(ApiError::unauthorized("The user is not authorized"));
        }

        Ok(Admission::Authenticated(AuthUser::from(claims)))
    }

    fn is_revoked(&self, claims: &Claims) -> bool {
        match self.policy {
            RevocationPolicy::AdminOnly => !claims.is_admin,
            RevocationPolicy::Authenticated => false,
        }
    }
}

/// Gate middleware: admits allow-listed routes, otherwise requires a valid
/// token and stores the caller in the request extensions
pub async fn auth_gate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let admission = state
        .gate
        .authenticate(request.method(), request.uri().path(), request.headers())
        .map_err(|err| {
            debug!("{} {} rejected: {}", request.method(), request.uri().path(), err);
            err
        })?;

    if let Admission::Authenticated(user) = admission {
        request.extensions_mut().insert(user);
    }

    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<&str, &'static str> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or("Missing Authorization header")?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format")?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        Some(_) => Err("Empty JWT token"),
        None => Err("Authorization header must use Bearer token format"),
    }
}
