use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;

/// Partition key taken verbatim from the `Authorization` header.
///
/// The value is opaque: no `Bearer` prefix handling, no verification. It only
/// selects which slice of the collection a request can see.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TenantKey(String);

impl TenantKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rejects requests without a usable `Authorization` header and injects the
/// [`TenantKey`] into request extensions for the handlers.
pub async fn require_tenant_key(
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = extract_tenant_key(&headers).ok_or_else(|| {
        tracing::debug!("Rejected {} {}: missing authorization key", request.method(), request.uri());
        ApiError::missing_key()
    })?;

    request.extensions_mut().insert(key);
    Ok(next.run(request).await)
}

/// Extract the partition key. Absent and empty values count as missing.
///
/// HTTP allows opaque `obs-text` bytes (0x80-0xFF) in header values, but the
/// key is echoed by `/me` and stored as a JSON string in every document, so
/// it has to be valid text. Values carrying such bytes are treated as missing
/// and the request gets the same 401 as one without the header.
pub fn extract_tenant_key(headers: &HeaderMap) -> Option<TenantKey> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    if value.is_empty() {
        return None;
    }
    Some(TenantKey::new(value))
}
