//! User administration.

use anyhow::{Result, bail};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::models::{
    CreateUserRequest, MAX_USER_FIELD_LEN, UpdateUserRequest, User, UserChanges, UserInfo,
    UserListQuery, UserRole,
};
use super::repository::{UserRepository, is_unique_violation};
use crate::auth::{AuthError, AuthService, CurrentUser, authorize_mutation, password, require_role};
use crate::content::check_len;
use crate::content::pagination::{Page, PageRequest};

/// Service for user management operations.
#[derive(Debug, Clone)]
pub struct UserService {
    repo: UserRepository,
    auth: Arc<AuthService>,
}

impl UserService {
    /// Create a new user service.
    pub fn new(repo: UserRepository, auth: Arc<AuthService>) -> Self {
        Self { repo, auth }
    }

    /// Create a user on behalf of a moderator or administrator.
    /// Only administrators may create administrators.
    #[instrument(skip(self, actor, request), fields(actor = %actor.id(), email = %request.email))]
    pub async fn create_user(&self, actor: &CurrentUser, request: CreateUserRequest) -> Result<UserInfo> {
        require_role(actor, &UserRole::ELEVATED)?;

        let role = request.role.unwrap_or_default();
        if role == UserRole::Administrator && !actor.is_admin() {
            return Err(AuthError::forbidden("only administrators may create administrators").into());
        }

        let user = self.auth.register(request, role).await?;
        info!(user_id = %user.id, role = %user.role, "Created user");

        Ok(user.into())
    }

    /// List users with optional filters.
    #[instrument(skip(self))]
    pub async fn list_users(&self, query: UserListQuery) -> Result<Page<UserInfo>> {
        let page = PageRequest::new(query.page, query.page_size);
        let (users, total) = self.repo.list(&query, page).await?;
        Ok(Page::new(users, total, page).map(UserInfo::from))
    }

    /// Look a user up by ID. Store failures are errors, a missing user is `None`.
    #[instrument(skip(self))]
    pub async fn find_user(&self, id: &str) -> Result<Option<UserInfo>> {
        Ok(self.repo.get(id).await?.map(UserInfo::from))
    }

    /// Get a user by ID.
    #[instrument(skip(self))]
    pub async fn get_user(&self, id: &str) -> Result<UserInfo> {
        match self.find_user(id).await? {
            Some(user) => Ok(user),
            None => bail!("User not found: {}", id),
        }
    }

    /// Update a user. Callers may update themselves; moderators and
    /// administrators may update anyone. Role changes require an administrator.
    #[instrument(skip(self, actor, request), fields(actor = %actor.id()))]
    pub async fn update_user(
        &self,
        actor: &CurrentUser,
        id: &str,
        request: UpdateUserRequest,
    ) -> Result<UserInfo> {
        let Some(existing) = self.repo.get(id).await? else {
            bail!("User not found: {}", id);
        };
        authorize_target(actor, &existing)?;

        if let Some(role) = request.role {
            if role != existing.role && !actor.is_admin() {
                return Err(AuthError::forbidden("only administrators may change roles").into());
            }
        }

        if let Some(name) = &request.name {
            if name.trim().is_empty() {
                bail!("Invalid name: must not be empty.");
            }
        }
        check_len("name", request.name.as_deref().map(str::trim), MAX_USER_FIELD_LEN)?;
        check_len("email", request.email.as_deref().map(str::trim), MAX_USER_FIELD_LEN)?;
        check_len("location", request.location.as_deref(), MAX_USER_FIELD_LEN)?;

        if let Some(email) = &request.email {
            if !is_valid_email(email.trim()) {
                bail!("Invalid email format.");
            }
            if let Some(other) = self.repo.get_by_email(email.trim()).await? {
                if other.id != id {
                    bail!("Email '{}' is already registered.", email.trim());
                }
            }
        }

        let password_hash = match request.password {
            Some(password) if password.trim().is_empty() => {
                bail!("Invalid password: must not be empty.");
            }
            Some(password) => Some(password::hash_blocking(password, self.auth.bcrypt_cost()).await?),
            None => None,
        };

        let changes = UserChanges {
            name: request.name.map(|n| n.trim().to_string()),
            email: request.email.map(|e| e.trim().to_string()),
            password_hash,
            location: request.location,
            role: request.role,
        };

        let user = match self.repo.update(id, changes).await {
            Ok(user) => user,
            Err(e) if is_unique_violation(&e) => bail!("Email is already registered."),
            Err(e) => return Err(e),
        };
        info!(user_id = %user.id, "Updated user");

        Ok(user.into())
    }

    /// Delete a user (self, moderator or administrator).
    #[instrument(skip(self, actor), fields(actor = %actor.id()))]
    pub async fn delete_user(&self, actor: &CurrentUser, id: &str) -> Result<()> {
        let Some(existing) = self.repo.get(id).await? else {
            bail!("User not found: {}", id);
        };
        authorize_target(actor, &existing)?;

        self.repo.delete(id).await?;
        warn!(user_id = %id, "Deleted user");

        Ok(())
    }
}

/// Ownership guard for identities. Administrator accounts can only be
/// touched by administrators, so a moderator cannot take one over.
fn authorize_target(actor: &CurrentUser, target: &User) -> Result<()> {
    authorize_mutation(actor, target)?;
    if target.role == UserRole::Administrator && !actor.is_admin() {
        return Err(AuthError::forbidden("only administrators may modify administrators").into());
    }
    Ok(())
}

/// Basic email validation.
pub fn is_valid_email(email: &str) -> bool {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }
    let (local, domain) = (parts[0], parts[1]);
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthConfig;
    use crate::db::Database;

    async fn setup() -> (UserService, Arc<AuthService>) {
        let db = Database::in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool().clone());
        let mut config = AuthConfig::with_secrets(
            "access-secret-0123456789abcdefghijkl",
            "refresh-secret-0123456789abcdefghijk",
        );
        config.bcrypt_cost = 4;
        let auth = Arc::new(AuthService::new(repo.clone(), &config).unwrap());
        (UserService::new(repo, auth.clone()), auth)
    }

    async fn make_user(auth: &AuthService, email: &str, role: UserRole) -> CurrentUser {
        let info = auth
            .signup(CreateUserRequest {
                name: email.split('@').next().unwrap_or("x").to_string(),
                email: email.to_string(),
                password: "pw123".to_string(),
                location: None,
                role: Some(role),
            })
            .await
            .unwrap();
        CurrentUser::new(info)
    }

    fn forbidden(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<AuthError>(),
            Some(AuthError::InsufficientPermissions(_))
        )
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("user.name@sub.domain.com"));
        assert!(!is_valid_email("userexample.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@example."));
        assert!(!is_valid_email("us er@example.com"));
    }

    #[tokio::test]
    async fn test_create_user_requires_elevated_role() {
        let (users, auth) = setup().await;
        let plain = make_user(&auth, "plain@x.com", UserRole::User).await;

        let err = users
            .create_user(
                &plain,
                CreateUserRequest {
                    name: "New".to_string(),
                    email: "new@x.com".to_string(),
                    password: "pw".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(forbidden(&err));
    }

    #[tokio::test]
    async fn test_only_admin_creates_admin() {
        let (users, auth) = setup().await;
        let moderator = make_user(&auth, "mod@x.com", UserRole::Moderator).await;
        let admin = make_user(&auth, "admin@x.com", UserRole::Administrator).await;

        let request = CreateUserRequest {
            name: "Boss".to_string(),
            email: "boss@x.com".to_string(),
            password: "pw".to_string(),
            location: None,
            role: Some(UserRole::Administrator),
        };

        let err = users.create_user(&moderator, request.clone()).await.unwrap_err();
        assert!(forbidden(&err));

        let created = users.create_user(&admin, request).await.unwrap();
        assert_eq!(created.role, UserRole::Administrator);
    }

    #[tokio::test]
    async fn test_create_user_duplicate_email() {
        let (users, auth) = setup().await;
        let moderator = make_user(&auth, "mod@x.com", UserRole::Moderator).await;

        let err = users
            .create_user(
                &moderator,
                CreateUserRequest {
                    name: "Dup".to_string(),
                    email: "mod@x.com".to_string(),
                    password: "pw".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<AuthError>(), Some(AuthError::EmailTaken)));
    }

    #[tokio::test]
    async fn test_update_self_and_others() {
        let (users, auth) = setup().await;
        let ana = make_user(&auth, "ana@x.com", UserRole::User).await;
        let bob = make_user(&auth, "bob@x.com", UserRole::User).await;
        let moderator = make_user(&auth, "mod@x.com", UserRole::Moderator).await;

        let updated = users
            .update_user(
                &ana,
                ana.id(),
                UpdateUserRequest {
                    location: Some("Quito".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.location.as_deref(), Some("Quito"));

        let err = users
            .update_user(
                &bob,
                ana.id(),
                UpdateUserRequest {
                    name: Some("Hijacked".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(forbidden(&err));

        let renamed = users
            .update_user(
                &moderator,
                ana.id(),
                UpdateUserRequest {
                    name: Some("Ana M".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Ana M");
    }

    #[tokio::test]
    async fn test_role_change_requires_admin() {
        let (users, auth) = setup().await;
        let ana = make_user(&auth, "ana@x.com", UserRole::User).await;
        let moderator = make_user(&auth, "mod@x.com", UserRole::Moderator).await;
        let admin = make_user(&auth, "admin@x.com", UserRole::Administrator).await;

        let promote = UpdateUserRequest {
            role: Some(UserRole::Researcher),
            ..Default::default()
        };

        let err = users.update_user(&ana, ana.id(), promote.clone()).await.unwrap_err();
        assert!(forbidden(&err));
        let err = users
            .update_user(&moderator, ana.id(), promote.clone())
            .await
            .unwrap_err();
        assert!(forbidden(&err));

        let promoted = users.update_user(&admin, ana.id(), promote).await.unwrap();
        assert_eq!(promoted.role, UserRole::Researcher);
    }

    #[tokio::test]
    async fn test_update_email_uniqueness() {
        let (users, auth) = setup().await;
        let ana = make_user(&auth, "ana@x.com", UserRole::User).await;
        make_user(&auth, "bob@x.com", UserRole::User).await;

        let err = users
            .update_user(
                &ana,
                ana.id(),
                UpdateUserRequest {
                    email: Some("bob@x.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));

        // Re-submitting one's own email is not a conflict.
        let same = users
            .update_user(
                &ana,
                ana.id(),
                UpdateUserRequest {
                    email: Some("ana@x.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(same.email, "ana@x.com");
    }

    #[tokio::test]
    async fn test_update_password_rehashes() {
        let (users, auth) = setup().await;
        let ana = make_user(&auth, "ana@x.com", UserRole::User).await;

        users
            .update_user(
                &ana,
                ana.id(),
                UpdateUserRequest {
                    password: Some("fresh-pw".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(auth.login("ana@x.com", "fresh-pw").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_user_guarded() {
        let (users, auth) = setup().await;
        let ana = make_user(&auth, "ana@x.com", UserRole::User).await;
        let bob = make_user(&auth, "bob@x.com", UserRole::User).await;

        let err = users.delete_user(&bob, ana.id()).await.unwrap_err();
        assert!(forbidden(&err));

        users.delete_user(&ana, ana.id()).await.unwrap();
        let err = users.get_user(ana.id()).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_moderator_cannot_touch_admin() {
        let (users, auth) = setup().await;
        let moderator = make_user(&auth, "mod@x.com", UserRole::Moderator).await;
        let admin = make_user(&auth, "admin@x.com", UserRole::Administrator).await;
        let other_admin = make_user(&auth, "root@x.com", UserRole::Administrator).await;

        let err = users
            .update_user(
                &moderator,
                admin.id(),
                UpdateUserRequest {
                    password: Some("taken-over".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(forbidden(&err));
        assert!(auth.login("admin@x.com", "taken-over").await.is_err());
        assert!(auth.login("admin@x.com", "pw123").await.is_ok());

        let err = users.delete_user(&moderator, admin.id()).await.unwrap_err();
        assert!(forbidden(&err));
        assert!(users.find_user(admin.id()).await.unwrap().is_some());

        // Administrators can still manage each other and themselves.
        users
            .update_user(
                &other_admin,
                admin.id(),
                UpdateUserRequest {
                    name: Some("Admin".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        users.delete_user(&admin, admin.id()).await.unwrap();
        assert!(users.find_user(admin.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_rejects_overlong_fields() {
        let (users, auth) = setup().await;
        let ana = make_user(&auth, "ana@x.com", UserRole::User).await;

        for request in [
            UpdateUserRequest {
                name: Some("n".repeat(MAX_USER_FIELD_LEN + 1)),
                ..Default::default()
            },
            UpdateUserRequest {
                email: Some(format!("{}@x.com", "a".repeat(MAX_USER_FIELD_LEN))),
                ..Default::default()
            },
            UpdateUserRequest {
                location: Some("l".repeat(MAX_USER_FIELD_LEN + 1)),
                ..Default::default()
            },
        ] {
            let err = users.update_user(&ana, ana.id(), request).await.unwrap_err();
            assert!(err.to_string().starts_with("Invalid"));
        }
    }

    #[tokio::test]
    async fn test_update_rejects_password_bcrypt_would_truncate() {
        let (users, auth) = setup().await;
        let ana = make_user(&auth, "ana@x.com", UserRole::User).await;

        let err = users
            .update_user(
                &ana,
                ana.id(),
                UpdateUserRequest {
                    password: Some("p".repeat(password::MAX_PASSWORD_BYTES + 1)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AuthError>(),
            Some(AuthError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_find_user_missing_is_none() {
        let (users, auth) = setup().await;
        let ana = make_user(&auth, "ana@x.com", UserRole::User).await;
        assert_eq!(users.find_user(ana.id()).await.unwrap().map(|u| u.id), Some(ana.id().to_string()));
        assert!(users.find_user("usr_missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_users_paged() {
        let (users, auth) = setup().await;
        for i in 0..3 {
            make_user(&auth, &format!("u{i}@x.com"), UserRole::User).await;
        }
        make_user(&auth, "mod@x.com", UserRole::Moderator).await;

        let page = users
            .list_users(UserListQuery {
                page_size: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.results.len(), 2);

        let moderators = users
            .list_users(UserListQuery {
                role: Some(UserRole::Moderator),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(moderators.total, 1);
    }
}
