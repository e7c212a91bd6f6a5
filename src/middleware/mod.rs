//! Middleware module
//!
//! This module contains middleware for request processing

pub mod auth;
pub mod rate_limit;

// Re-export commonly used middleware
pub use auth::{AuthUser, MaybeAuthUser, AdminUser};
pub use rate_limit::{RateLimiter, RateLimitConfig, RateLimitStatus, RateLimitStatistics};
