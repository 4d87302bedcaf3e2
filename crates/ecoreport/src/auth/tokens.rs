//! Access and refresh token issuing and verification.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use log::warn;

use super::{AuthConfig, AuthError, Claims, ConfigValidationError, TokenKind};
use crate::user::User;

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl KeyPair {
    fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }
}

/// Issues and verifies HS256 tokens. Access and refresh tokens use separate keys.
pub struct TokenService {
    access: KeyPair,
    refresh: KeyPair,
    validation: Validation,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl_secs", &self.access.ttl_secs)
            .field("refresh_ttl_secs", &self.refresh.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Build from config. Resolves `env:` secrets and validates them.
    pub fn new(config: &AuthConfig) -> Result<Self, ConfigValidationError> {
        config.validate()?;
        let secrets = config.resolve_secrets()?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            access: KeyPair::new(&secrets.access, config.access_token_ttl_secs),
            refresh: KeyPair::new(&secrets.refresh, config.refresh_token_ttl_secs),
            validation,
        })
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn issue(&self, user: &User, kind: TokenKind, now: DateTime<Utc>) -> Result<String, AuthError> {
        let keys = self.keys(kind);
        let claims = Claims::new(
            user.id.clone(),
            Some(user.role),
            kind,
            now.timestamp(),
            keys.ttl_secs,
        );

        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| AuthError::internal(format!("token signing failed: {e}")))
    }

    /// Issue a short-lived access token.
    pub fn issue_access_token(&self, user: &User) -> Result<String, AuthError> {
        self.issue_access_token_at(user, Utc::now())
    }

    /// Issue an access token as if the current time were `now`.
    pub fn issue_access_token_at(&self, user: &User, now: DateTime<Utc>) -> Result<String, AuthError> {
        self.issue(user, TokenKind::Access, now)
    }

    /// Issue a long-lived refresh token.
    pub fn issue_refresh_token(&self, user: &User) -> Result<String, AuthError> {
        self.issue_refresh_token_at(user, Utc::now())
    }

    /// Issue a refresh token as if the current time were `now`.
    pub fn issue_refresh_token_at(&self, user: &User, now: DateTime<Utc>) -> Result<String, AuthError> {
        self.issue(user, TokenKind::Refresh, now)
    }

    /// Verify a token of the expected class. Either every check passes and the
    /// claims are returned, or the token is rejected.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.keys(kind).decoding, &self.validation).map_err(
            |e| {
                warn!("{} token validation failed: {:?}", kind, e);
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    _ => AuthError::InvalidToken(e.to_string()),
                }
            },
        )?;

        if data.claims.typ != kind {
            warn!("expected {} token, got {}", kind, data.claims.typ);
            return Err(AuthError::InvalidToken(format!("not an {} token", kind)));
        }

        Ok(data.claims)
    }
}
