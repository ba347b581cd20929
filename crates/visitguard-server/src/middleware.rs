use std::{collections::HashSet, sync::Arc};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

pub const AUTHENTICATED_USER_HEADER: &str = "x-authenticated-user-id";

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Caller identity asserted by the upstream gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub Uuid);

/// API key auth settings used by middleware.
#[derive(Debug, Clone)]
pub struct AuthState {
    api_keys: Arc<HashSet<String>>,
    pub enabled: bool,
}

impl AuthState {
    /// Builds auth config from `VISITGUARD_API_KEYS` (comma-separated bearer tokens).
    ///
    /// In development, empty/missing keys disable auth for local iteration.
    /// In non-development envs, empty/missing keys fail startup.
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let raw = std::env::var("VISITGUARD_API_KEYS").unwrap_or_default();
        Self::from_keys(&raw, is_development)
    }

    /// Same rules as [`AuthState::from_env`] over an explicit key list.
    pub fn from_keys(raw: &str, is_development: bool) -> anyhow::Result<Self> {
        let keys: HashSet<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect();

        if keys.is_empty() {
            if is_development {
                tracing::warn!(
                    "VISITGUARD_API_KEYS not set; bearer auth disabled in development environment"
                );
                return Ok(Self::disabled());
            }

            anyhow::bail!(
                "VISITGUARD_API_KEYS is required outside development; provide comma-separated bearer tokens"
            );
        }

        Ok(Self {
            api_keys: Arc::new(keys),
            enabled: true,
        })
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self {
            api_keys: Arc::new(HashSet::new()),
            enabled: false,
        }
    }

    fn allows(&self, token: &str) -> bool {
        self.api_keys.contains(token)
    }
}

#[derive(Debug, Serialize)]
struct MiddlewareErrorBody {
    error: MiddlewareError,
}

#[derive(Debug, Serialize)]
struct MiddlewareError {
    code: &'static str,
    message: &'static str,
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
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

/// Lifts the gateway-asserted user id into an [`AuthenticatedUser`] extension.
///
/// A missing header leaves the request anonymous. A malformed one is logged
/// and treated the same way.
pub async fn authenticated_user(mut req: Request, next: Next) -> Response {
    if let Some(user) = parse_authenticated_user(req.headers()) {
        req.extensions_mut().insert(user);
    }
    next.run(req).await
}

/// Middleware enforcing Bearer token auth when enabled.
pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    if !auth.enabled {
        return next.run(req).await;
    }

    let token = extract_bearer_token(req.headers().get(AUTHORIZATION));

    match token {
        Some(token) if auth.allows(token) => next.run(req).await,
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(MiddlewareErrorBody {
                error: MiddlewareError {
                    code: "unauthorized",
                    message: "missing or invalid bearer token",
                },
            }),
        )
            .into_response(),
    }
}

fn parse_authenticated_user(headers: &HeaderMap) -> Option<AuthenticatedUser> {
    let raw = headers.get(AUTHENTICATED_USER_HEADER)?;
    match raw.to_str().ok().map(str::trim).map(Uuid::parse_str) {
        Some(Ok(user_id)) => Some(AuthenticatedUser(user_id)),
        _ => {
            tracing::warn!(
                header = AUTHENTICATED_USER_HEADER,
                "ignoring malformed authenticated user header"
            );
            None
        }
    }
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|s| !s.trim().is_empty())
}
