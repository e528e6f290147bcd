//! Loan scheduling endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        loan::{CreateLoan, ExtendLoan, LoanListQuery, LoanView},
        page::LoanPage,
    },
    AppState,
};

use super::AuthenticatedUser;

/// Result of a loan write
#[derive(Serialize, ToSchema)]
pub struct LoanActionResponse {
    /// Human-readable outcome
    pub message: String,
    /// Loan after the write
    pub loan: LoanView,
}

fn done(message: &str, loan: LoanView) -> Json<LoanActionResponse> {
    Json(LoanActionResponse {
        message: message.to_string(),
        loan,
    })
}

/// List all loans
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanListQuery),
    responses(
        (status = 200, description = "Page of loans, newest first", body = LoanPage),
        (status = 400, description = "Invalid paging parameters")
    )
)]
pub async fn list_loans(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<LoanListQuery>,
) -> AppResult<Json<LoanPage>> {
    query.validate()?;
    let page = state.services.loans.list_loans(&query).await?;
    Ok(Json(page))
}

/// Get loan by ID
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan details", body = LoanView),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(loan_id): Path<i64>,
) -> AppResult<Json<LoanView>> {
    let loan = state.services.loans.get_loan(loan_id).await?;
    Ok(Json(loan))
}

/// Request a loan as borrower
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateLoan,
    responses(
        (status = 201, description = "Loan requested", body = LoanActionResponse),
        (status = 400, description = "Start date not before end date"),
        (status = 404, description = "Equipment not found"),
        (status = 409, description = "Equipment already booked for these dates")
    )
)]
pub async fn request_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateLoan>,
) -> AppResult<(StatusCode, Json<LoanActionResponse>)> {
    let loan = state
        .services
        .loans
        .request_loan(claims.user_id, request)
        .await?;
    Ok((StatusCode::CREATED, done("Loan requested successfully", loan)))
}

/// Cancel a loan before it starts (borrower)
#[utoipa::path(
    post,
    path = "/loans/{id}/cancel",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan cancelled", body = LoanActionResponse),
        (status = 403, description = "Caller is not the borrower"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan already started or not cancellable")
    )
)]
pub async fn cancel_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i64>,
) -> AppResult<Json<LoanActionResponse>> {
    let loan = state.services.loans.cancel_loan(claims.user_id, loan_id).await?;
    Ok(done("Loan cancelled successfully", loan))
}

/// Mark a loan as returned (borrower or owner)
#[utoipa::path(
    post,
    path = "/loans/{id}/complete",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan completed", body = LoanActionResponse),
        (status = 403, description = "Caller is neither borrower nor owner"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan not approved")
    )
)]
pub async fn complete_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i64>,
) -> AppResult<Json<LoanActionResponse>> {
    let loan = state.services.loans.complete_loan(claims.user_id, loan_id).await?;
    Ok(done("Loan completed successfully", loan))
}

/// Request an extension (borrower)
#[utoipa::path(
    post,
    path = "/loans/{id}/extend",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Loan ID")),
    request_body = ExtendLoan,
    responses(
        (status = 200, description = "Extension requested", body = LoanActionResponse),
        (status = 400, description = "New end date not after current end date"),
        (status = 403, description = "Caller is not the borrower"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan not approved or extension window booked")
    )
)]
pub async fn extend_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i64>,
    Json(request): Json<ExtendLoan>,
) -> AppResult<Json<LoanActionResponse>> {
    let loan = state
        .services
        .loans
        .request_extension(claims.user_id, loan_id, request.new_end_date)
        .await?;
    Ok(done("Extension requested successfully", loan))
}

/// Approve a pending loan (equipment owner)
#[utoipa::path(
    post,
    path = "/loans/{id}/approve",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan approved", body = LoanActionResponse),
        (status = 403, description = "Caller does not own the equipment"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Not pending, schedule conflict, or concurrent update")
    )
)]
pub async fn approve_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i64>,
) -> AppResult<Json<LoanActionResponse>> {
    let loan = state.services.loans.approve_loan(claims.user_id, loan_id).await?;
    Ok(done("Loan approved successfully", loan))
}

/// Reject a pending loan (equipment owner)
#[utoipa::path(
    post,
    path = "/loans/{id}/reject",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan rejected", body = LoanActionResponse),
        (status = 403, description = "Caller does not own the equipment"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan not pending")
    )
)]
pub async fn reject_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i64>,
) -> AppResult<Json<LoanActionResponse>> {
    let loan = state.services.loans.reject_loan(claims.user_id, loan_id).await?;
    Ok(done("Loan rejected successfully", loan))
}

/// Approve a pending extension (equipment owner)
#[utoipa::path(
    post,
    path = "/loans/{id}/approve-extension",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Extension approved", body = LoanActionResponse),
        (status = 403, description = "Caller does not own the equipment"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "No extension pending or extension window booked")
    )
)]
pub async fn approve_extension(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i64>,
) -> AppResult<Json<LoanActionResponse>> {
    let loan = state
        .services
        .loans
        .approve_extension(claims.user_id, loan_id)
        .await?;
    Ok(done("Extension approved successfully", loan))
}

/// Decline a pending extension (equipment owner)
#[utoipa::path(
    post,
    path = "/loans/{id}/decline-extension",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Extension declined", body = LoanActionResponse),
        (status = 403, description = "Caller does not own the equipment"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "No extension pending")
    )
)]
pub async fn decline_extension(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i64>,
) -> AppResult<Json<LoanActionResponse>> {
    let loan = state
        .services
        .loans
        .decline_extension(claims.user_id, loan_id)
        .await?;
    Ok(done("Extension declined", loan))
}

/// Loans borrowed by the caller
#[utoipa::path(
    get,
    path = "/me/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanListQuery),
    responses(
        (status = 200, description = "Caller's loans, newest first", body = LoanPage)
    )
)]
pub async fn my_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<LoanListQuery>,
) -> AppResult<Json<LoanPage>> {
    query.validate()?;
    let page = state
        .services
        .loans
        .borrower_loans(claims.user_id, &query)
        .await?;
    Ok(Json(page))
}

/// Approved loans of the caller that are past their end date
#[utoipa::path(
    get,
    path = "/me/loans/overdue",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Overdue loans", body = Vec<LoanView>)
    )
)]
pub async fn my_overdue_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LoanView>>> {
    let loans = state
        .services
        .loans
        .borrower_overdue_loans(claims.user_id)
        .await?;
    Ok(Json(loans))
}

/// Loans against equipment the caller owns
#[utoipa::path(
    get,
    path = "/me/equipment-loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanListQuery),
    responses(
        (status = 200, description = "Loans on the caller's equipment, newest first", body = LoanPage)
    )
)]
pub async fn my_equipment_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<LoanListQuery>,
) -> AppResult<Json<LoanPage>> {
    query.validate()?;
    let page = state
        .services
        .loans
        .owner_loans(claims.user_id, &query)
        .await?;
    Ok(Json(page))
}
