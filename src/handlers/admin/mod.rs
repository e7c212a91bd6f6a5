//! Admin handlers module
//!
//! Every handler here takes an `AdminUser`, so requests without an admin
//! bearer token are rejected before any work is done.

pub mod bookings;
pub mod events;
pub mod payments;
pub mod settings;
pub mod system;
pub mod users;

use axum::http::header;
use axum::response::IntoResponse;

/// CSV download response
pub(crate) fn csv_response(file_name: &str, body: String) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, super::content_disposition(file_name, true)),
        ],
        body,
    )
}

/// PDF download response
pub(crate) fn pdf_response(file_name: &str, bytes: Vec<u8>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, super::content_disposition(file_name, true)),
        ],
        bytes,
    )
}

/// Export file name stamped with today's date
pub(crate) fn export_name(prefix: &str, extension: &str) -> String {
    format!("{}-{}.{}", prefix, chrono::Utc::now().format("%Y%m%d"), extension)
}
