//! API Middleware
//!
//! API key authentication, principal extraction and request logging.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::OperationContext;
use crate::error::{AppError, AppResult};

pub const API_KEY_HEADER: &str = "X-API-Key";
pub const OWNER_HEADER: &str = "X-Request-Owner";
pub const CORRELATION_HEADER: &str = "X-Correlation-Id";

/// Set of accepted API keys, stored as hex SHA-256 digests
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    digests: Arc<HashSet<String>>,
}

impl ApiKeys {
    pub fn from_hashes(hashes: impl IntoIterator<Item = String>) -> Self {
        Self {
            digests: Arc::new(hashes.into_iter().map(|h| h.to_ascii_lowercase()).collect()),
        }
    }

    /// Hex SHA-256 digest of a raw key
    pub fn digest(raw_key: &str) -> String {
        hex::encode(Sha256::digest(raw_key.as_bytes()))
    }

    /// Returns the digest of `raw_key` when it is accepted
    pub fn verify(&self, raw_key: &str) -> Option<String> {
        let digest = Self::digest(raw_key);
        self.digests.contains(&digest).then_some(digest)
    }
}

// =========================================================================
// Authentication
// =========================================================================

/// Validate the API key and record the caller in an `OperationContext`.
///
/// The fronting gateway has already authenticated the end user; it names
/// them in `X-Request-Owner`. Only callers holding a configured API key are
/// trusted to do so.
pub async fn auth_middleware(
    State(api_keys): State<ApiKeys>,
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> AppResult<Response> {
    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::MissingApiKey)?;

    let digest = api_keys.verify(api_key).ok_or(AppError::InvalidApiKey)?;

    let owner = headers
        .get(OWNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(AppError::MissingOwner)?;

    // Extract correlation ID or generate new one
    let correlation_id = headers
        .get(CORRELATION_HEADER)
        .or_else(|| headers.get("x-request-id"))
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let context = OperationContext::new()
        .with_api_key_fingerprint(&digest[..8])
        .with_owner(owner)
        .with_correlation_id(correlation_id);

    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

// =========================================================================
// Logging
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["x-api-key", "authorization", "cookie", "set-cookie"];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let masked_value = if SENSITIVE_HEADERS.contains(&name.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = mask_headers_for_logging(request.headers());
    let correlation_id = request
        .extensions()
        .get::<OperationContext>()
        .and_then(|ctx| ctx.correlation_id);

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        correlation_id = ?correlation_id,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %start.elapsed().as_millis(),
        correlation_id = ?correlation_id,
        "Request completed"
    );

    response
}
