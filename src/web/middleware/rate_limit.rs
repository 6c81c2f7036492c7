//! Rate limiting middleware for the login and registration endpoints.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter,
};
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc, time::Duration};

use crate::web::error::ApiError;

/// Rate limiter keyed by client IP.
pub type IpRateLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// State for rate limiting.
pub struct RateLimitState {
    login_limiter: IpRateLimiter,
    /// Requests per minute per client.
    login_rate_limit: u32,
}

impl RateLimitState {
    /// Create a limiter allowing `login_rate_limit` attempts per minute per IP.
    pub fn new(login_rate_limit: u32) -> Self {
        let per_minute = NonZeroU32::new(login_rate_limit).unwrap_or(NonZeroU32::MIN);
        Self {
            login_limiter: RateLimiter::keyed(Quota::per_minute(per_minute)),
            login_rate_limit,
        }
    }

    pub fn login_rate_limit(&self) -> u32 {
        self.login_rate_limit
    }

    /// Check if a login attempt is allowed for the given IP.
    pub fn check_login(&self, ip: &str) -> bool {
        self.login_limiter.check_key(&ip.to_string()).is_ok()
    }

    /// Drop state for clients whose quota has fully replenished.
    pub fn cleanup(&self) {
        self.login_limiter.retain_recent();
        self.login_limiter.shrink_to_fit();
    }

    /// Start a background task to periodically clean up old entries.
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            interval.tick().await;
            loop {
                interval.tick().await;
                self.cleanup();
                tracing::debug!(clients = self.login_limiter.len(), "Rate limiter cleaned up");
            }
        });
    }
}

/// Extract client IP from request.
fn get_client_ip(req: &Request<Body>) -> String {
    // Reverse proxy headers first
    if let Some(forwarded) = req
        .headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(ip) = forwarded.split(',').next() {
            return ip.trim().to_string();
        }
    }

    if let Some(real_ip) = req
        .headers()
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
    {
        return real_ip.to_string();
    }

    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

/// Rate limiting middleware for login and registration.
pub async fn login_rate_limit(
    state: Arc<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = get_client_ip(&req);

    if !state.check_login(&ip) {
        tracing::warn!(ip = %ip, "Login rate limit exceeded");
        return ApiError::too_many_requests("Too many login attempts. Please try again later.")
            .into_response();
    }

    next.run(req).await
}
