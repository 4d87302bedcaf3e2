//! User management module.
//!
//! Identity records, the credential store and user administration.

mod models;
mod repository;
mod service;

pub use models::{
    CreateUserRequest, MAX_USER_FIELD_LEN, NewUser, UpdateUserRequest, User, UserChanges, UserInfo, UserListQuery,
    UserRole,
};
pub use repository::{UserRepository, is_unique_violation};
pub use service::{UserService, is_valid_email};
