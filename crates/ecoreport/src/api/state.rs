//! Application state shared across handlers.

use std::sync::Arc;

use crate::auth::{AuthConfig, AuthService, AuthState, ConfigValidationError};
use crate::content::{CompanyRepository, EventRepository, PublicationRepository, ReportRepository};
use crate::db::Database;
use crate::user::{UserRepository, UserService};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthState,
    pub users: UserService,
    pub reports: ReportRepository,
    pub events: EventRepository,
    pub publications: PublicationRepository,
    pub companies: CompanyRepository,
    /// CORS origins. Empty allows any origin.
    pub allowed_origins: Arc<Vec<String>>,
}

impl AppState {
    /// Wire every service to `db`. Fails if the auth config is unusable.
    pub fn new(db: &Database, config: &AuthConfig) -> Result<Self, ConfigValidationError> {
        let pool = db.pool().clone();
        let user_repo = UserRepository::new(pool.clone());
        let auth = Arc::new(AuthService::new(user_repo.clone(), config)?);

        Ok(Self {
            auth: AuthState::new(auth.clone()),
            users: UserService::new(user_repo, auth),
            reports: ReportRepository::new(pool.clone()),
            events: EventRepository::new(pool.clone()),
            publications: PublicationRepository::new(pool.clone()),
            companies: CompanyRepository::new(pool),
            allowed_origins: Arc::new(config.allowed_origins.clone()),
        })
    }

    pub fn auth_service(&self) -> &AuthService {
        self.auth.service()
    }
}
