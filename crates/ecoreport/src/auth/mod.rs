//! Authentication and authorization.
//!
//! - bcrypt password hashing
//! - HS256 access/refresh tokens with separate keys
//! - signup, login, refresh, identity verification and password changes
//! - bearer middleware and the ownership/role guard

mod claims;
mod config;
mod error;
mod guard;
mod middleware;
pub mod password;
mod service;
mod tokens;

pub use claims::{Claims, TokenKind};
pub use config::{AuthConfig, ConfigValidationError, MIN_SECRET_LEN, ResolvedSecrets};
pub use error::{AuthError, AuthErrorResponse};
pub use guard::{Owned, authorize_mutation, can_mutate, require_role};
pub use middleware::{AuthState, CurrentUser, auth_middleware};
pub use service::{AuthService, ChangePasswordRequest, TokenPair};
pub use tokens::TokenService;
