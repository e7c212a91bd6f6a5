//! Route table and middleware stack

use std::time::Duration;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;
use crate::config::ServerConfig;
use crate::handlers::admin::{self, bookings as admin_bookings, events as admin_events, payments as admin_payments};
use crate::handlers::{auth, bookings, certificates, events, health, payments, uploads, AppState};
use crate::middleware::rate_limit::{limit_logins, limit_payments};

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static("idempotency-key"),
        ])
        .max_age(Duration::from_secs(60 * 60));

    if config.allowed_origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    cors.allow_origin(origins)
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(admin_events::list_events).post(admin_events::create_event))
        .route("/events/:id", put(admin_events::update_event).delete(admin_events::delete_event))
        .route("/categories", post(admin_events::create_category))
        .route("/categories/:id", put(admin_events::update_category).delete(admin_events::delete_category))
        .route("/bookings", get(admin_bookings::list_bookings))
        .route("/bookings/export.csv", get(admin_bookings::export_csv))
        .route("/bookings/export.pdf", get(admin_bookings::export_pdf))
        .route("/bookings/:id/status", put(admin_bookings::update_status))
        .route("/bookings/:id/attendance", put(admin_bookings::update_attendance))
        .route("/bookings/:id/certificate", put(admin_bookings::set_certificate_override))
        .route("/bookings/:id/certificate/issue", post(admin_bookings::issue_certificate))
        .route("/bookings/:id/certificate-eligibility", get(admin_bookings::certificate_eligibility))
        .route("/certificates/:id/email", post(admin_bookings::email_certificate))
        .route("/payments", get(admin_payments::list_payments))
        .route("/payments/export.csv", get(admin_payments::export_csv))
        .route("/payments/export.pdf", get(admin_payments::export_pdf))
        .route("/payments/reconcile", post(admin_payments::reconcile))
        .route("/payments/:id/refresh", post(admin_payments::refresh))
        .route("/users", get(admin::users::list_users))
        .route("/users/:id", put(admin::users::update_user))
        .route("/settings", get(admin::settings::list_settings))
        .route("/settings/gmail", get(admin::settings::get_gmail).put(admin::settings::put_gmail))
        .route("/settings/gmail/test", post(admin::settings::test_gmail))
        .route("/settings/mpesa", get(admin::settings::get_mpesa).put(admin::settings::put_mpesa))
        .route("/settings/:key", get(admin::settings::get_setting).put(admin::settings::put_setting))
        .route("/stats", get(admin::system::stats))
        .route("/db-diagnostics", get(admin::system::db_diagnostics))
        .route("/rate-limits", get(admin::system::rate_limits))
        .route(
            "/rate-limits/:client",
            get(admin::system::client_rate_limit).delete(admin::system::clear_rate_limit),
        )
        .route("/uploads/images", post(admin::system::upload_image))
}

/// Build the full application router
pub fn build_router(state: AppState) -> Router {
    let rate_limiting = state.settings.features.rate_limiting;
    let server = state.settings.server.clone();

    let mut login: Router<AppState> = Router::new().route("/auth/login", post(auth::login));
    let mut initiate: Router<AppState> = Router::new().route("/payments/mpesa/initiate", post(payments::initiate));
    if rate_limiting {
        login = login.route_layer(from_fn_with_state(state.clone(), limit_logins));
        initiate = initiate.route_layer(from_fn_with_state(state.clone(), limit_payments));
    }

    let api = Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/auth/register", post(auth::register))
        .route("/auth/me", get(auth::me))
        .merge(login)
        .route("/events", get(events::list_events))
        .route("/events/:id", get(events::get_event))
        .route("/categories", get(events::list_categories))
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings/mine", get(bookings::my_bookings))
        .route("/bookings/:reference", get(bookings::get_booking))
        .route("/bookings/:reference/certificate-eligibility", get(bookings::certificate_eligibility))
        .route("/bookings/:reference/certificate", get(bookings::download_own_certificate))
        .merge(initiate)
        .route("/payments/mpesa/callback", post(payments::callback))
        .route("/payments/:id/status", get(payments::status))
        .route("/certificates/:id", get(certificates::get_certificate))
        .nest("/admin", admin_routes());

    Router::new()
        .nest("/api", api)
        .route("/uploads/:file", get(uploads::serve_upload))
        .layer(DefaultBodyLimit::max(server.max_body_bytes))
        .layer(RequestBodyLimitLayer::new(server.max_body_bytes))
        .layer(cors_layer(&server))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
