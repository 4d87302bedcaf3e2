//! API route definitions.

use axum::http::{HeaderValue, Method, header};
use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::auth::auth_middleware;

use super::handlers::{self, auth, companies, events, publications, reports, users};
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.allowed_origins);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let auth_state = state.auth.clone();

    // Protected routes (require authentication)
    let protected_routes = Router::new()
        .route("/auth/verify", get(auth::verify))
        .route("/users/change-password", put(auth::change_password))
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        // Content mutations
        .route("/contamination-reports", post(reports::create_report))
        .route(
            "/contamination-reports/{id}",
            put(reports::update_report).delete(reports::delete_report),
        )
        .route(
            "/contamination-reports/{id}/images",
            post(reports::add_report_image),
        )
        .route("/events", post(events::create_event))
        .route(
            "/events/{id}",
            put(events::update_event).delete(events::delete_event),
        )
        .route("/events/{id}/images", post(events::add_event_image))
        .route("/events/{id}/participants", post(events::add_participant))
        .route("/publications", post(publications::create_publication))
        .route(
            "/publications/{id}",
            put(publications::update_publication).delete(publications::delete_publication),
        )
        .route("/companies", post(companies::create_company))
        .route(
            "/companies/{id}",
            put(companies::update_company).delete(companies::delete_company),
        )
        .route("/companies/{id}/images", post(companies::add_company_image))
        .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
        .with_state(state.clone());

    // Public routes (no authentication)
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh-token", post(auth::refresh_token))
        .route("/contamination-reports", get(reports::list_reports))
        .route("/contamination-reports/{id}", get(reports::get_report))
        .route("/events", get(events::list_events))
        .route("/events/{id}", get(events::get_event))
        .route("/publications", get(publications::list_publications))
        .route("/publications/{id}", get(publications::get_publication))
        .route("/companies", get(companies::list_companies))
        .route("/companies/{id}", get(companies::get_company))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .layer(trace_layer)
}

/// Build the CORS layer. No configured origins means any origin is allowed.
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let headers = [header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT];

    if allowed_origins.is_empty() {
        tracing::warn!("CORS: No origins configured, allowing any origin");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(headers);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("CORS: Invalid origin in config: {}", origin);
                None
            })
        })
        .collect();

    tracing::info!("CORS: Allowing {} origin(s)", origins.len());
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
}
