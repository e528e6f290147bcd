//! API handlers for Gearloan REST endpoints

pub mod equipment;
pub mod health;
pub mod loans;
pub mod openapi;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::caller::CallerClaims, AppState};

/// Extractor for the calling member from a bearer JWT
pub struct AuthenticatedUser(pub CallerClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Get the Authorization header
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = CallerClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Equipment registry
        .route("/equipment", get(equipment::list_equipment).post(equipment::create_equipment))
        .route("/equipment/:id", get(equipment::get_equipment))
        // Loans
        .route("/loans", get(loans::list_loans).post(loans::request_loan))
        .route("/loans/:id", get(loans::get_loan))
        .route("/loans/:id/cancel", post(loans::cancel_loan))
        .route("/loans/:id/complete", post(loans::complete_loan))
        .route("/loans/:id/extend", post(loans::extend_loan))
        .route("/loans/:id/approve", post(loans::approve_loan))
        .route("/loans/:id/reject", post(loans::reject_loan))
        .route("/loans/:id/approve-extension", post(loans::approve_extension))
        .route("/loans/:id/decline-extension", post(loans::decline_extension))
        // Caller-scoped views
        .route("/me/loans", get(loans::my_loans))
        .route("/me/loans/overdue", get(loans::my_overdue_loans))
        .route("/me/equipment-loans", get(loans::my_equipment_loans))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
