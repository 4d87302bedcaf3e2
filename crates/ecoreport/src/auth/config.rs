//! Authentication configuration.

use serde::{Deserialize, Serialize};

/// Minimum length of a signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Work factor range accepted by bcrypt.
pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 secret for access tokens. Supports `env:VAR_NAME`.
    pub access_token_secret: Option<String>,

    /// HS256 secret for refresh tokens. Must differ from the access secret.
    pub refresh_token_secret: Option<String>,

    /// Access token lifetime in seconds.
    pub access_token_ttl_secs: i64,

    /// Refresh token lifetime in seconds.
    pub refresh_token_ttl_secs: i64,

    /// bcrypt work factor.
    pub bcrypt_cost: u32,

    /// Allowed CORS origins. Empty allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // No default secrets; `ecoreport init` generates them.
            access_token_secret: None,
            refresh_token_secret: None,
            access_token_ttl_secs: 15 * 60,
            refresh_token_ttl_secs: 7 * 24 * 60 * 60,
            bcrypt_cost: 10,
            allowed_origins: Vec::new(),
        }
    }
}

/// Signing secrets after `env:` indirection has been resolved.
#[derive(Clone)]
pub struct ResolvedSecrets {
    pub access: String,
    pub refresh: String,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

impl AuthConfig {
    /// Build a config with explicit secrets and defaults for everything else.
    pub fn with_secrets(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access_token_secret: Some(access.into()),
            refresh_token_secret: Some(refresh.into()),
            ..Self::default()
        }
    }

    /// Resolve the access token secret, expanding `env:VAR_NAME` syntax.
    pub fn resolve_access_secret(&self) -> Result<Option<String>, ConfigValidationError> {
        resolve_secret(self.access_token_secret.as_deref())
    }

    /// Resolve the refresh token secret, expanding `env:VAR_NAME` syntax.
    pub fn resolve_refresh_secret(&self) -> Result<Option<String>, ConfigValidationError> {
        resolve_secret(self.refresh_token_secret.as_deref())
    }

    /// Resolve and validate both secrets.
    pub fn resolve_secrets(&self) -> Result<ResolvedSecrets, ConfigValidationError> {
        let access = self
            .resolve_access_secret()?
            .ok_or(ConfigValidationError::MissingSecret("access_token_secret"))?;
        let refresh = self
            .resolve_refresh_secret()?
            .ok_or(ConfigValidationError::MissingSecret("refresh_token_secret"))?;

        if access.len() < MIN_SECRET_LEN {
            return Err(ConfigValidationError::SecretTooShort("access_token_secret"));
        }
        if refresh.len() < MIN_SECRET_LEN {
            return Err(ConfigValidationError::SecretTooShort("refresh_token_secret"));
        }
        if access == refresh {
            return Err(ConfigValidationError::IdenticalSecrets);
        }

        Ok(ResolvedSecrets { access, refresh })
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.resolve_secrets()?;

        if self.access_token_ttl_secs <= 0 {
            return Err(ConfigValidationError::InvalidTtl("access_token_ttl_secs"));
        }
        if self.refresh_token_ttl_secs <= 0 {
            return Err(ConfigValidationError::InvalidTtl("refresh_token_ttl_secs"));
        }
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.bcrypt_cost) {
            return Err(ConfigValidationError::InvalidBcryptCost(self.bcrypt_cost));
        }

        Ok(())
    }

    /// Generate a secure random signing secret.
    ///
    /// `rand::rng()` is seeded from the OS CSPRNG.
    pub fn generate_secret() -> String {
        use rand::Rng;

        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        const SECRET_LENGTH: usize = 64;

        let mut rng = rand::rng();
        (0..SECRET_LENGTH)
            .map(|_| {
                let idx = rng.random_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect()
    }
}

fn resolve_secret(value: Option<&str>) -> Result<Option<String>, ConfigValidationError> {
    match value {
        None => Ok(None),
        Some(value) => {
            if let Some(var_name) = value.strip_prefix("env:") {
                match std::env::var(var_name) {
                    Ok(secret) if !secret.is_empty() => Ok(Some(secret)),
                    Ok(_) => Err(ConfigValidationError::EnvVarEmpty(var_name.to_string())),
                    Err(_) => Err(ConfigValidationError::EnvVarNotFound(var_name.to_string())),
                }
            } else if value.is_empty() {
                Ok(None)
            } else {
                Ok(Some(value.to_string()))
            }
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// A signing secret is not configured.
    MissingSecret(&'static str),
    /// A signing secret is shorter than [`MIN_SECRET_LEN`].
    SecretTooShort(&'static str),
    /// Access and refresh tokens would be signed with the same key.
    IdenticalSecrets,
    /// A token lifetime is zero or negative.
    InvalidTtl(&'static str),
    /// bcrypt cost outside the range the algorithm accepts.
    InvalidBcryptCost(u32),
    /// Environment variable not found (for `env:VAR_NAME` syntax).
    EnvVarNotFound(String),
    /// Environment variable is empty (for `env:VAR_NAME` syntax).
    EnvVarEmpty(String),
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSecret(field) => {
                write!(
                    f,
                    "auth.{} is required. Run `ecoreport init` or set ECOREPORT__AUTH__{}.",
                    field,
                    field.to_uppercase()
                )
            }
            Self::SecretTooShort(field) => {
                write!(
                    f,
                    "auth.{} must be at least {} characters long.",
                    field, MIN_SECRET_LEN
                )
            }
            Self::IdenticalSecrets => {
                write!(
                    f,
                    "auth.access_token_secret and auth.refresh_token_secret must be different."
                )
            }
            Self::InvalidTtl(field) => write!(f, "auth.{} must be positive.", field),
            Self::InvalidBcryptCost(cost) => {
                write!(
                    f,
                    "auth.bcrypt_cost must be between {} and {} (got {}).",
                    MIN_BCRYPT_COST,
                    MAX_BCRYPT_COST,
                    cost
                )
            }
            Self::EnvVarNotFound(var) => {
                write!(
                    f,
                    "Environment variable '{}' not found (referenced via env:{} in config).",
                    var, var
                )
            }
            Self::EnvVarEmpty(var) => {
                write!(
                    f,
                    "Environment variable '{}' is empty (referenced via env:{} in config).",
                    var, var
                )
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}
