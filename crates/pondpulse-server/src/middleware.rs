//! Request middleware: request-id propagation, bearer-token auth, and a
//! fixed-window rate limit on the protected routes.

use std::{
    collections::HashSet,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Request ID carried through handler extensions and echoed back in the
/// `x-request-id` response header.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Bearer-token configuration for the protected router.
#[derive(Debug, Clone)]
pub struct AuthState {
    api_keys: Arc<HashSet<String>>,
    pub enabled: bool,
}

impl AuthState {
    /// Reads `PONDPULSE_API_KEYS` (comma-separated tokens).
    ///
    /// Missing keys disable auth in development only; anywhere else they
    /// fail startup.
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let keys: HashSet<String> = std::env::var("PONDPULSE_API_KEYS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect();

        if keys.is_empty() {
            anyhow::ensure!(
                is_development,
                "PONDPULSE_API_KEYS is required outside development; provide comma-separated bearer tokens"
            );
            tracing::warn!(
                "PONDPULSE_API_KEYS not set; bearer auth disabled in development environment"
            );
        }

        Ok(Self {
            enabled: !keys.is_empty(),
            api_keys: Arc::new(keys),
        })
    }

    fn allows(&self, token: &str) -> bool {
        self.api_keys.contains(token)
    }
}

/// Fixed-window request limiter shared across all clients.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    current: Arc<Mutex<Window>>,
}

#[derive(Debug)]
struct Window {
    opened_at: Instant,
    seen: usize,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            current: Arc::new(Mutex::new(Window {
                opened_at: Instant::now(),
                seen: 0,
            })),
        }
    }
}

#[derive(Debug, Serialize)]
struct RejectionBody {
    error: Rejection,
}

#[derive(Debug, Serialize)]
struct Rejection {
    code: &'static str,
    message: &'static str,
}

fn reject(status: StatusCode, code: &'static str, message: &'static str) -> Response {
    (
        status,
        Json(RejectionBody {
            error: Rejection { code, message },
        }),
    )
        .into_response()
}

/// Attaches a request ID to every request: the incoming `x-request-id`
/// header when present, a fresh `UUIDv4` otherwise. The ID lands in the
/// request extensions and on the response header.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));
    let mut res = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }
    res
}

/// Rejects requests without a configured bearer token, unless auth is
/// disabled (development with no keys).
pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    if !auth.enabled {
        return next.run(req).await;
    }

    match bearer_token(req.headers().get(AUTHORIZATION)) {
        Some(token) if auth.allows(token) => next.run(req).await,
        _ => reject(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid bearer token",
        ),
    }
}

/// Counts requests against the current window, opening a new window once
/// the old one expires.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let mut window = rate_limit.current.lock().await;
    if window.opened_at.elapsed() >= rate_limit.window {
        window.opened_at = Instant::now();
        window.seen = 0;
    }

    if window.seen >= rate_limit.max_requests {
        return reject(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "rate limit exceeded",
        );
    }

    window.seen += 1;
    drop(window);

    next.run(req).await
}

fn bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_accepts_valid_header() {
        let header = HeaderValue::from_static("Bearer test-token");
        assert_eq!(bearer_token(Some(&header)), Some("test-token"));
    }

    #[test]
    fn bearer_token_rejects_other_schemes_and_blanks() {
        let basic = HeaderValue::from_static("Basic abc123");
        assert_eq!(bearer_token(Some(&basic)), None);
        let blank = HeaderValue::from_static("Bearer   ");
        assert_eq!(bearer_token(Some(&blank)), None);
        assert_eq!(bearer_token(None), None);
    }

    #[test]
    fn auth_disables_without_keys_in_dev_only() {
        std::env::remove_var("PONDPULSE_API_KEYS");
        let state = AuthState::from_env(true).expect("dev should allow missing keys");
        assert!(!state.enabled);
        assert!(AuthState::from_env(false).is_err());
    }
}
