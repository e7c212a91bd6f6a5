//! Rate limiting middleware
//!
//! Sliding-window limiter with a burst allowance, keyed by client address.
//! Applied to payment initiation and login so a single client cannot flood
//! M-Pesa with STK prompts or brute-force passwords.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn, info};
use crate::handlers::AppState;
use crate::middleware::auth::bearer_token;
use crate::models::UserRole;
use crate::utils::errors::{MaabaraError, Result};

/// Rate limit configuration
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitConfig {
    /// Maximum requests per window
    pub max_requests: u32,
    /// Time window duration
    #[serde(with = "duration_secs")]
    pub window_duration: Duration,
    /// Burst allowance (extra requests allowed in short bursts)
    pub burst_allowance: u32,
}

mod duration_secs {
    use std::time::Duration;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }
}

impl RateLimitConfig {
    /// STK pushes reach the payer's phone, so keep these scarce
    pub fn payments() -> Self {
        Self {
            max_requests: 5,
            window_duration: Duration::from_secs(60),
            burst_allowance: 2,
        }
    }

    pub fn login() -> Self {
        Self {
            max_requests: 10,
            window_duration: Duration::from_secs(60),
            burst_allowance: 5,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_duration: Duration::from_secs(60),
            burst_allowance: 5,
        }
    }
}

/// Rate limit entry for tracking client requests
#[derive(Debug, Clone)]
struct RateLimitEntry {
    requests: Vec<Instant>,
    burst_used: u32,
    last_reset: Instant,
}

impl RateLimitEntry {
    fn new() -> Self {
        Self {
            requests: Vec::new(),
            burst_used: 0,
            last_reset: Instant::now(),
        }
    }

    /// Drop requests that fell out of the window
    fn cleanup(&mut self, window_duration: Duration) {
        let now = Instant::now();
        self.requests.retain(|&time| now.duration_since(time) < window_duration);

        if self.last_reset.elapsed() > window_duration {
            self.burst_used = 0;
            self.last_reset = now;
        }
    }

    fn is_allowed(&mut self, config: &RateLimitConfig) -> bool {
        self.cleanup(config.window_duration);

        if (self.requests.len() as u32) < config.max_requests {
            return true;
        }

        if self.burst_used < config.burst_allowance {
            self.burst_used += 1;
            return true;
        }

        false
    }

    fn record_request(&mut self) {
        self.requests.push(Instant::now());
    }
}

/// Per-client request limiter
#[derive(Clone)]
pub struct RateLimiter {
    name: &'static str,
    config: RateLimitConfig,
    entries: Arc<Mutex<HashMap<String, RateLimitEntry>>>,
    admin_exempt: bool,
}

impl RateLimiter {
    pub fn new(name: &'static str, config: RateLimitConfig, admin_exempt: bool) -> Self {
        Self {
            name,
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
            admin_exempt,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, RateLimitEntry>> {
        // A panic while holding the lock leaves counters that are still usable
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count a request from `client`, failing once the window and burst are used up
    pub fn check(&self, client: &str, is_admin: bool) -> Result<()> {
        if self.admin_exempt && is_admin {
            debug!(limiter = self.name, client = client, "Admin exempt from rate limiting");
            return Ok(());
        }

        let mut entries = self.entries();
        let entry = entries.entry(client.to_string()).or_insert_with(RateLimitEntry::new);

        if entry.is_allowed(&self.config) {
            entry.record_request();
            Ok(())
        } else {
            warn!(limiter = self.name, client = client, "Rate limit exceeded");
            Err(MaabaraError::RateLimitExceeded)
        }
    }

    /// Current rate limit status for a client
    pub fn status(&self, client: &str) -> RateLimitStatus {
        let entries = self.entries();

        match entries.get(client) {
            Some(entry) => {
                let mut entry = entry.clone();
                entry.cleanup(self.config.window_duration);

                let current_requests = entry.requests.len() as u32;
                RateLimitStatus {
                    current_requests,
                    max_requests: self.config.max_requests,
                    remaining: self.config.max_requests.saturating_sub(current_requests),
                    burst_used: entry.burst_used,
                    burst_remaining: self.config.burst_allowance.saturating_sub(entry.burst_used),
                    window_seconds: self.config.window_duration.as_secs(),
                }
            }
            None => RateLimitStatus {
                current_requests: 0,
                max_requests: self.config.max_requests,
                remaining: self.config.max_requests,
                burst_used: 0,
                burst_remaining: self.config.burst_allowance,
                window_seconds: self.config.window_duration.as_secs(),
            },
        }
    }

    /// Forget one client's history
    pub fn clear(&self, client: &str) -> bool {
        let removed = self.entries().remove(client).is_some();
        if removed {
            info!(limiter = self.name, client = client, "Rate limit cleared");
        }
        removed
    }

    pub fn statistics(&self) -> RateLimitStatistics {
        let entries = self.entries();
        let mut active_clients = 0;
        let mut total_requests = 0;
        let mut clients_at_limit = 0;

        for entry in entries.values() {
            let mut entry = entry.clone();
            entry.cleanup(self.config.window_duration);

            if !entry.requests.is_empty() {
                active_clients += 1;
                total_requests += entry.requests.len();

                if entry.requests.len() >= self.config.max_requests as usize {
                    clients_at_limit += 1;
                }
            }
        }

        RateLimitStatistics {
            name: self.name,
            total_clients: entries.len(),
            active_clients,
            total_requests,
            clients_at_limit,
            config: self.config.clone(),
        }
    }

    /// Drop clients idle for two windows, returning how many were removed
    pub fn cleanup_old_entries(&self) -> usize {
        let mut entries = self.entries();
        let keep_for = self.config.window_duration * 2;
        let before = entries.len();

        entries.retain(|_, entry| entry.requests.iter().any(|time| time.elapsed() < keep_for));
        debug!(limiter = self.name, remaining_entries = entries.len(), "Cleaned up old rate limit entries");
        before - entries.len()
    }

    /// Run [`cleanup_old_entries`](Self::cleanup_old_entries) on a fixed interval
    pub fn spawn_cleanup(self, every: Duration) -> JoinHandle<()> {
        info!(limiter = self.name, "Started rate limit cleanup with interval {:?}", every);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                let removed = self.cleanup_old_entries();
                if removed > 0 {
                    info!(limiter = self.name, removed = removed, "Rate limit cleanup removed idle clients");
                }
            }
        })
    }
}

/// Rate limit status for a client
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStatus {
    pub current_requests: u32,
    pub max_requests: u32,
    pub remaining: u32,
    pub burst_used: u32,
    pub burst_remaining: u32,
    pub window_seconds: u64,
}

/// Rate limit statistics
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStatistics {
    pub name: &'static str,
    pub total_clients: usize,
    pub active_clients: usize,
    pub total_requests: usize,
    pub clients_at_limit: usize,
    pub config: RateLimitConfig,
}

/// Client key for rate limiting
///
/// The socket peer address, unless the peer is a trusted proxy. Then the
/// `X-Forwarded-For` chain is walked from the right and the first hop that
/// is not itself a trusted proxy is used.
pub fn client_key(parts: &Parts, trusted_proxies: &[IpAddr]) -> String {
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let Some(peer) = peer else {
        return "unknown".to_string();
    };

    if !trusted_proxies.contains(&peer) {
        return peer.to_string();
    }

    let forwarded = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    forwarded
        .rsplit(',')
        .map(str::trim)
        .filter_map(|hop| hop.parse::<IpAddr>().ok())
        .find(|hop| !trusted_proxies.contains(hop))
        .unwrap_or(peer)
        .to_string()
}

/// Only the signature is checked here; handlers still authenticate properly
fn is_admin_request(parts: &Parts, state: &AppState) -> bool {
    bearer_token(parts)
        .and_then(|token| state.services.auth_service.verify_token(token).ok())
        .is_some_and(|claims| claims.role == UserRole::Admin)
}

async fn limit_with(limiter: &RateLimiter, state: &AppState, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let client = client_key(&parts, &state.trusted_proxies);
    let is_admin = is_admin_request(&parts, state);

    if let Err(e) = limiter.check(&client, is_admin) {
        return e.into_response();
    }

    next.run(Request::from_parts(parts, body)).await
}

/// Axum middleware for payment initiation
pub async fn limit_payments(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let limiter = state.payment_limiter.clone();
    limit_with(&limiter, &state, request, next).await
}

/// Axum middleware for login
pub async fn limit_logins(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let limiter = state.login_limiter.clone();
    limit_with(&limiter, &state, request, next).await
}
