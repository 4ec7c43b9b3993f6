//! HTTP routes.
//!
//! `POST /geocode` always answers `200 OK` with a JSON body; failures are
//! reported in its `error` fields. The body is taken as raw bytes and decoded
//! by [`GeocodeService::geocode`] so that malformed JSON is reported the same
//! way. Bodies that cannot be buffered, including ones over the configured
//! size limit, are reported as decode errors too.

use crate::server::service::{GeocodeService, Health};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State, rejection::BytesRejection},
    routing::{get, post},
};
use geocode_proxy_core::{Error, wire::BatchResponse};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn router(service: GeocodeService) -> Router {
    Router::new()
        .route("/geocode", post(geocode))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(service.max_body_bytes()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(service)
}

async fn geocode(
    State(service): State<GeocodeService>,
    body: Result<Bytes, BytesRejection>,
) -> Json<BatchResponse> {
    match body {
        Ok(body) => Json(service.geocode(&body).await),
        Err(rejection) => {
            let err = Error::RequestDecode {
                reason: rejection.body_text(),
            };
            tracing::error!("{err}");
            Json(BatchResponse::from_error(&err))
        }
    }
}

async fn health(State(service): State<GeocodeService>) -> Json<Health> {
    Json(service.health())
}
