use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::handlers::{protected, public};
use crate::middleware::{cors_headers, cors_layer, require_tenant_key};
use crate::state::AppState;

/// Build the HTTP application around an already constructed state
pub fn app(state: AppState) -> Router {
    let api = &state.config.api;
    let security = &state.config.security;

    let mut router = Router::new()
        // Public
        .route("/health", get(public::health))
        // Key-scoped
        .merge(document_routes())
        .layer(DefaultBodyLimit::max(api.max_request_size_bytes));

    if api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    // Outermost so preflights and rejections carry the CORS headers too
    if security.enable_cors {
        router = router
            .layer(middleware::from_fn(cors_headers))
            .layer(cors_layer());
    }

    router.with_state(state)
}

fn document_routes() -> Router<AppState> {
    use protected::documents;

    Router::new()
        .route(
            "/me",
            get(protected::me)
                .put(protected::me_put)
                .delete(protected::me_delete),
        )
        // Partition-level operations
        .route(
            "/",
            get(documents::collection_get)
                .post(documents::collection_post)
                .delete(documents::collection_delete),
        )
        // Document-level operations
        .route(
            "/:id",
            get(documents::record_get)
                .put(documents::record_put)
                .delete(documents::record_delete),
        )
        .route_layer(middleware::from_fn(require_tenant_key))
}
