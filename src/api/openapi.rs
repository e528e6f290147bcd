//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{equipment, health, loans};

/// Registers the bearer scheme referenced by `security(("bearer_auth" = []))`
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Gearloan API",
        version = "1.0.0",
        description = "Peer-to-peer equipment lending REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Equipment
        equipment::list_equipment,
        equipment::get_equipment,
        equipment::create_equipment,
        // Loans
        loans::list_loans,
        loans::get_loan,
        loans::request_loan,
        loans::cancel_loan,
        loans::complete_loan,
        loans::extend_loan,
        loans::approve_loan,
        loans::reject_loan,
        loans::approve_extension,
        loans::decline_extension,
        loans::my_loans,
        loans::my_overdue_loans,
        loans::my_equipment_loans,
    ),
    components(
        schemas(
            // Equipment
            crate::models::equipment::Equipment,
            crate::models::equipment::CreateEquipment,
            // Loans
            crate::models::loan::LoanStatus,
            crate::models::loan::LoanView,
            crate::models::loan::CreateLoan,
            crate::models::loan::ExtendLoan,
            crate::models::page::LoanPage,
            loans::LoanActionResponse,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "equipment", description = "Equipment registry"),
        (name = "loans", description = "Loan scheduling")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
