//! Signup, login, token refresh, identity resolution and password changes.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::{AuthConfig, AuthError, ConfigValidationError, TokenKind, TokenService, password};
use crate::user::{CreateUserRequest, NewUser, User, UserChanges, UserInfo, UserRepository, UserRole};
use crate::content::check_len;
use crate::user::{MAX_USER_FIELD_LEN, is_unique_violation, is_valid_email};

/// Tokens returned by a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Change password request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// Authentication core. Holds the credential store and the token service.
#[derive(Debug)]
pub struct AuthService {
    users: UserRepository,
    tokens: TokenService,
    bcrypt_cost: u32,
    /// Checked against on logins for unknown emails so they cost the same.
    dummy_hash: String,
}

impl AuthService {
    /// Build from config. Fails if the signing secrets are unusable.
    pub fn new(users: UserRepository, config: &AuthConfig) -> Result<Self, ConfigValidationError> {
        let tokens = TokenService::new(config)?;
        let dummy_hash = password::hash(&AuthConfig::generate_secret(), config.bcrypt_cost)
            .map_err(|_| ConfigValidationError::InvalidBcryptCost(config.bcrypt_cost))?;

        Ok(Self {
            users,
            tokens,
            bcrypt_cost: config.bcrypt_cost,
            dummy_hash,
        })
    }

    pub fn bcrypt_cost(&self) -> u32 {
        self.bcrypt_cost
    }

    /// Register a new identity. The role defaults to `user`.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn signup(&self, request: CreateUserRequest) -> Result<UserInfo, AuthError> {
        let role = request.role.unwrap_or_default();
        let user = self.register(request, role).await?;
        info!(user_id = %user.id, role = %user.role, "Registered new user");
        Ok(user.into())
    }

    /// Validate, hash and persist an identity with the given role.
    pub(crate) async fn register(
        &self,
        request: CreateUserRequest,
        role: UserRole,
    ) -> Result<User, AuthError> {
        let name = request.name.trim();
        let email = request.email.trim();

        if name.is_empty() || email.is_empty() || request.password.trim().is_empty() {
            return Err(AuthError::invalid_input(
                "name, email and password are required",
            ));
        }
        if !is_valid_email(email) {
            return Err(AuthError::invalid_input("Invalid email format"));
        }
        for (field, value) in [
            ("name", Some(name)),
            ("email", Some(email)),
            ("location", request.location.as_deref()),
        ] {
            check_len(field, value, MAX_USER_FIELD_LEN)
                .map_err(|e| AuthError::invalid_input(e.to_string()))?;
        }

        if self
            .users
            .get_by_email(email)
            .await
            .map_err(AuthError::internal)?
            .is_some()
        {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = password::hash_blocking(request.password, self.bcrypt_cost).await?;

        let new_user = NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
            location: request.location.filter(|l| !l.trim().is_empty()),
            role,
        };

        self.users.create(new_user).await.map_err(|e| {
            if is_unique_violation(&e) {
                // Lost a race with a concurrent signup for the same email.
                AuthError::EmailTaken
            } else {
                AuthError::internal(format!("{e:#}"))
            }
        })
    }

    /// Exchange credentials for an access and a refresh token.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::invalid_input("email and password are required"));
        }

        let Some(user) = self
            .users
            .get_by_email(email.trim())
            .await
            .map_err(AuthError::internal)?
        else {
            debug!("Login for unknown email");
            let dummy = self.dummy_hash.clone();
            let candidate = password.to_string();
            password::blocking(move || password::verify(&candidate, &dummy)).await?;
            return Err(AuthError::InvalidCredentials);
        };

        let candidate = user.clone();
        let password = password.to_string();
        let matches = password::blocking(move || candidate.verify_password(&password)).await?;
        if !matches {
            debug!(user_id = %user.id, "Login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let pair = TokenPair {
            access_token: self.tokens.issue_access_token(&user)?,
            refresh_token: self.tokens.issue_refresh_token(&user)?,
        };
        info!(user_id = %user.id, "User logged in");
        Ok(pair)
    }

    /// Mint a new access token from a refresh token. The refresh token is not rotated.
    #[instrument(skip_all)]
    pub async fn refresh_access_token(&self, refresh_token: Option<&str>) -> Result<String, AuthError> {
        let token = refresh_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::invalid_input("refresh token is required"))?;

        let claims = self.tokens.verify(token, TokenKind::Refresh)?;

        let user = self
            .users
            .get(&claims.sub)
            .await
            .map_err(AuthError::internal)?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "Refresh token for deleted user");
                AuthError::UserNotFound
            })?;

        self.tokens.issue_access_token(&user)
    }

    /// Verify an access token and load the identity it names.
    #[instrument(skip_all)]
    pub async fn verify_identity(&self, access_token: &str) -> Result<UserInfo, AuthError> {
        let claims = self.tokens.verify(access_token, TokenKind::Access)?;

        let user = self
            .users
            .get(&claims.sub)
            .await
            .map_err(AuthError::internal)?
            .ok_or(AuthError::UnknownIdentity)?;

        Ok(user.into())
    }

    /// Replace the password of `identity_id` after checking the current one.
    #[instrument(skip(self, request))]
    pub async fn change_password(
        &self,
        identity_id: &str,
        request: ChangePasswordRequest,
    ) -> Result<(), AuthError> {
        if request.current_password.is_empty()
            || request.new_password.trim().is_empty()
            || request.confirm_password.is_empty()
        {
            return Err(AuthError::invalid_input(
                "currentPassword, newPassword and confirmPassword are required",
            ));
        }
        if request.new_password != request.confirm_password {
            return Err(AuthError::invalid_input(
                "newPassword and confirmPassword do not match",
            ));
        }

        let user = self
            .users
            .get(identity_id)
            .await
            .map_err(AuthError::internal)?
            .ok_or(AuthError::UserNotFound)?;

        let current = request.current_password;
        let matches = password::blocking(move || user.verify_password(&current)).await?;
        if !matches {
            return Err(AuthError::InvalidCredentials);
        }

        let password_hash = password::hash_blocking(request.new_password, self.bcrypt_cost).await?;
        self.users
            .update(
                identity_id,
                UserChanges {
                    password_hash: Some(password_hash),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| AuthError::internal(format!("{e:#}")))?;

        info!(user_id = %identity_id, "Password changed");
        Ok(())
    }
}
