//! HTTP handlers module
//!
//! This module contains the axum handlers grouped by resource:
//! - Public handlers for events, bookings, payments and certificates
//! - Admin handlers under `/api/admin`
//! - The router that wires them together with middleware

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod certificates;
pub mod events;
pub mod health;
pub mod payments;
pub mod router;
pub mod uploads;

pub use router::build_router;

use std::net::IpAddr;
use std::sync::Arc;
use axum::Json;
use serde::Serialize;
use crate::config::Settings;
use crate::middleware::{RateLimiter, RateLimitConfig};
use crate::services::ServiceFactory;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub services: ServiceFactory,
    pub settings: Arc<Settings>,
    pub payment_limiter: RateLimiter,
    pub login_limiter: RateLimiter,
    /// Peers allowed to report the client address via `X-Forwarded-For`
    pub trusted_proxies: Arc<[IpAddr]>,
}

impl AppState {
    pub fn new(services: ServiceFactory, settings: Settings) -> Self {
        let trusted_proxies = settings.server.trusted_proxy_addrs().into();
        Self {
            services,
            settings: Arc::new(settings),
            payment_limiter: RateLimiter::new("payments", RateLimitConfig::payments(), true),
            login_limiter: RateLimiter::new("login", RateLimitConfig::login(), true),
            trusted_proxies,
        }
    }
}

/// Success envelope, the counterpart of the error envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
        message: None,
    })
}

pub fn ok_with_message<T: Serialize>(data: T, message: impl Into<String>) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
        message: Some(message.into()),
    })
}

/// Content-Disposition value for a downloadable file
pub fn content_disposition(file_name: &str, attachment: bool) -> String {
    let kind = if attachment { "attachment" } else { "inline" };
    format!("{}; filename=\"{}\"", kind, file_name.replace('"', ""))
}
