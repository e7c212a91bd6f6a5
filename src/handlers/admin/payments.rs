//! Admin payment handlers

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use crate::handlers::admin::{csv_response, export_name, pdf_response};
use crate::handlers::{ok, AppState};
use crate::middleware::AdminUser;
use crate::models::{Pagination, PaymentFilter};
use crate::utils::errors::Result;

/// `GET /api/admin/payments`
pub async fn list_payments(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(filter): Query<PaymentFilter>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse> {
    let payments = state.services.payment_service.list(&filter, pagination).await?;
    Ok(ok(payments))
}

/// `POST /api/admin/payments/:id/refresh`
pub async fn refresh(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let payment = state.services.payment_service.refresh_status(id).await?;
    Ok(ok(payment))
}

/// `POST /api/admin/payments/reconcile`
pub async fn reconcile(State(state): State<AppState>, AdminUser(_admin): AdminUser) -> Result<impl IntoResponse> {
    let report = state.services.payment_service.reconcile_stale().await?;
    Ok(ok(report))
}

/// `GET /api/admin/payments/export.csv`
pub async fn export_csv(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(filter): Query<PaymentFilter>,
) -> Result<impl IntoResponse> {
    let rows = state.services.payment_service.list_all(&filter).await?;
    let body = state.services.export_service.payments_csv(&rows);
    Ok(csv_response(&export_name("payments", "csv"), body))
}

/// `GET /api/admin/payments/export.pdf`
pub async fn export_pdf(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(filter): Query<PaymentFilter>,
) -> Result<impl IntoResponse> {
    let rows = state.services.payment_service.list_all(&filter).await?;
    let export = state.services.export_service.payments_pdf(&rows)?;
    Ok(pdf_response(&export_name("payments", "pdf"), export.bytes))
}
