//! JWT claims.

use serde::{Deserialize, Serialize};

use crate::user::UserRole;

/// Token class. Access and refresh tokens are signed with different keys and
/// also carry their class so one can never stand in for the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

/// JWT claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Identity id.
    pub sub: String,

    /// Role at issue time. Informational; authorization reloads the identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,

    /// Token class.
    pub typ: TokenKind,

    /// Issued at (Unix seconds).
    pub iat: i64,

    /// Expiration (Unix seconds).
    pub exp: i64,

    /// Unique token id.
    pub jti: String,
}

impl Claims {
    pub fn new(sub: impl Into<String>, role: Option<UserRole>, typ: TokenKind, iat: i64, ttl_secs: i64) -> Self {
        Self {
            sub: sub.into(),
            role,
            typ,
            iat,
            exp: iat.saturating_add(ttl_secs),
            jti: uuid::Uuid::new_v4().to_string(),
        }
    }
}
