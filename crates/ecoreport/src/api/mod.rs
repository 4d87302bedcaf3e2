//! HTTP API module.
//!
//! REST endpoints for authentication, user management and community content.

mod error;
mod extract;
mod handlers;
mod routes;
mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use extract::ApiJson;
pub use handlers::{HealthResponse, MessageResponse};
pub use routes::create_router;
pub use state::AppState;
