//! Authentication middleware and extractors.

use axum::{
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use log::debug;
use std::sync::Arc;

use super::{AuthError, AuthService};
use crate::user::{UserInfo, UserRole};

/// Extract a Bearer token from an Authorization header value.
fn bearer_token_from_header(header_value: &str) -> Result<&str, AuthError> {
    let mut parts = header_value.split_whitespace();
    let scheme = parts.next().ok_or(AuthError::InvalidAuthHeader)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidAuthHeader);
    }

    let token = parts.next().ok_or(AuthError::InvalidAuthHeader)?;
    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }

    if parts.next().is_some() {
        return Err(AuthError::InvalidAuthHeader);
    }

    Ok(token)
}

/// Authentication state shared by the middleware.
#[derive(Clone)]
pub struct AuthState {
    service: Arc<AuthService>,
}

impl AuthState {
    pub fn new(service: Arc<AuthService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &AuthService {
        &self.service
    }
}

/// Authenticated identity attached to the request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: UserInfo,
}

impl CurrentUser {
    pub fn new(user: UserInfo) -> Self {
        Self { user }
    }

    /// Get the user ID.
    pub fn id(&self) -> &str {
        &self.user.id
    }

    /// Get the user's role.
    pub fn role(&self) -> UserRole {
        self.user.role
    }

    /// Moderator or administrator.
    pub fn is_elevated(&self) -> bool {
        self.user.role.is_elevated()
    }

    pub fn is_admin(&self) -> bool {
        self.user.role == UserRole::Administrator
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::MissingAuthHeader)
    }
}

/// Authentication middleware.
///
/// Requires `Authorization: Bearer <access token>`. A missing or malformed
/// header is rejected with 401, a token that fails verification with 403.
/// On success the stored identity is loaded and injected as `CurrentUser`.
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let token = bearer_token_from_header(header)?;

    let user = auth.service.verify_identity(token).await.inspect_err(|e| {
        debug!("Rejected bearer token: {}", e);
    })?;

    req.extensions_mut().insert(CurrentUser::new(user));

    Ok(next.run(req).await)
}
