//! User data models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::auth::{Owned, password};

/// User role enumeration.
///
/// The original deployment stored Spanish role names; those are accepted as
/// aliases on input and normalized on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    #[serde(alias = "usuario", alias = "ordinary-user")]
    User,
    #[serde(alias = "investigador")]
    Researcher,
    #[serde(alias = "moderador")]
    Moderator,
    #[serde(alias = "administrador", alias = "admin")]
    Administrator,
}

impl UserRole {
    /// Roles exempt from ownership checks on mutation.
    pub const ELEVATED: [UserRole; 2] = [UserRole::Moderator, UserRole::Administrator];

    pub fn is_elevated(self) -> bool {
        Self::ELEVATED.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Researcher => "researcher",
            UserRole::Moderator => "moderator",
            UserRole::Administrator => "administrator",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" | "usuario" | "ordinary-user" => Ok(UserRole::User),
            "researcher" | "investigador" => Ok(UserRole::Researcher),
            "moderator" | "moderador" => Ok(UserRole::Moderator),
            "administrator" | "administrador" | "admin" => Ok(UserRole::Administrator),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

impl TryFrom<String> for UserRole {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl sqlx::Type<sqlx::Sqlite> for UserRole {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for UserRole {
    fn encode_by_ref(
        &self,
        buf: &mut <sqlx::Sqlite as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Sqlite>>::encode(self.to_string(), buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for UserRole {
    fn decode(
        value: <sqlx::Sqlite as sqlx::Database>::ValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

/// Identity record as stored.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub location: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: UserRole,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Check a plaintext password against this identity's stored hash.
    ///
    /// CPU-bound; async callers run it on the blocking pool.
    pub fn verify_password(&self, password: &str) -> bool {
        password::verify(password, &self.password_hash)
    }
}

impl Owned for User {
    fn owner_id(&self) -> Option<&str> {
        Some(&self.id)
    }
}

/// Public user info (safe to return to clients).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub email: String,
    pub location: Option<String>,
    pub role: UserRole,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            location: user.location,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl Owned for UserInfo {
    fn owner_id(&self) -> Option<&str> {
        Some(&self.id)
    }
}

/// Upper bound, in characters, for `name`, `email` and `location`.
pub const MAX_USER_FIELD_LEN: usize = 200;

/// Request to create a user (signup or administrative creation).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub location: Option<String>,
    pub role: Option<UserRole>,
}

/// Request to update an existing user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub location: Option<String>,
    pub role: Option<UserRole>,
}

/// A validated identity ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub location: Option<String>,
    pub role: UserRole,
}

/// Column changes applied by the repository. Passwords arrive already hashed.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub location: Option<String>,
    pub role: Option<UserRole>,
}

/// User list query parameters.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UserListQuery {
    /// Case-insensitive substring of name or email.
    pub q: Option<String>,
    pub role: Option<UserRole>,
    pub page: Option<i64>,
    #[serde(alias = "pageSize")]
    pub page_size: Option<i64>,
}
