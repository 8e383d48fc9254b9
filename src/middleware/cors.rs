use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

/// Request headers browsers may send cross-origin
pub const ALLOWED_HEADERS: [HeaderName; 8] = [
    header::ACCESS_CONTROL_ALLOW_HEADERS,
    header::ORIGIN,
    header::ACCEPT,
    HeaderName::from_static("x-requested-with"),
    header::CONTENT_TYPE,
    header::ACCESS_CONTROL_REQUEST_METHOD,
    header::ACCESS_CONTROL_REQUEST_HEADERS,
    header::AUTHORIZATION,
];

/// `ALLOWED_HEADERS` rendered as a header value
const ALLOWED_HEADERS_VALUE: &str = "access-control-allow-headers, origin, accept, \
    x-requested-with, content-type, access-control-request-method, \
    access-control-request-headers, authorization";

/// Answers preflights and stamps the wildcard origin on every response.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(AllowMethods::any())
        .allow_headers(AllowHeaders::list(ALLOWED_HEADERS))
}

/// `CorsLayer` only sends allow-methods and allow-headers on preflight
/// responses; this adds both to every other response, errors included.
pub async fn cors_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers
        .entry(header::ACCESS_CONTROL_ALLOW_METHODS)
        .or_insert(HeaderValue::from_static("*"));
    headers
        .entry(header::ACCESS_CONTROL_ALLOW_HEADERS)
        .or_insert(HeaderValue::from_static(ALLOWED_HEADERS_VALUE));

    response
}
