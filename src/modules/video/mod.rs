use crate::config::settings::AppConfig;
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

pub mod cleanup;
pub mod dto;
pub mod handler;
pub mod model;
pub mod repository;
pub mod resolver;
pub mod service;
pub mod stream_handler;

pub fn router(config: &AppConfig) -> Router<AppState> {
    // Uploads are streamed to disk, so the only cap is the configured size.
    let upload_routes = Router::new()
        .route("/videos", post(handler::upload_video))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_upload_bytes));

    let routes = Router::new()
        .route("/videos", get(handler::list_videos))
        .route("/videos/{id}", get(handler::get_video).delete(handler::delete_video))
        .route("/videos/{id}/resubmit", post(handler::resubmit_video))
        .route("/videos/{id}/playlist.m3u8", get(stream_handler::get_manifest))
        .route("/videos/{id}/segments/{name}", get(stream_handler::get_segment))
        .route("/videos/{id}/{name}", get(stream_handler::get_artifact));

    upload_routes.merge(routes)
}
