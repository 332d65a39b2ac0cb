//! Progressive web app assets: manifest and service worker.
//!
//! Both are served from the site root so the worker's scope covers the whole
//! app.

use axum::{
    http::header,
    response::{IntoResponse, Response},
};

/// Offline cache worker script.
const SERVICE_WORKER_JS: &str = include_str!("../../static/js/service-worker.js");

/// Serve the web app manifest.
pub async fn manifest() -> Response {
    let manifest = serde_json::json!({
        "name": "Plant Health Assistant",
        "short_name": "Plant Health",
        "start_url": "/app/home",
        "scope": "/",
        "icons": [
            {
                "src": "/static/icons/icon.svg",
                "sizes": "any",
                "type": "image/svg+xml"
            }
        ],
        "theme_color": "#4a8fe7",
        "background_color": "#ffffff",
        "display": "standalone"
    });

    (
        [(header::CONTENT_TYPE, "application/manifest+json")],
        manifest.to_string(),
    )
        .into_response()
}

/// Serve the service worker script.
pub async fn service_worker() -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        SERVICE_WORKER_JS,
    )
        .into_response()
}
