//! Static browser assets served next to the existing application

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Namespace every asset lives under
pub const ASSET_PREFIX: &str = "/nodecopter-gamepad";

pub const ASSET_FILES: [&str; 3] = [
    "gamepad-client.js",
    "gamepad-calibration.js",
    "gamepad-test.html",
];

/// Serve the asset files from `asset_dir` and forward everything else to `app`
pub fn with_assets(app: Router, asset_dir: impl Into<PathBuf>) -> Router {
    let asset_dir = asset_dir.into();

    let mut assets = Router::new();
    for file in ASSET_FILES {
        let path = asset_dir.join(file);
        assets = assets.route(
            &format!("{}/{}", ASSET_PREFIX, file),
            any(move || serve_asset(path.clone())),
        );
    }

    assets.fallback_service(app)
}

pub(crate) async fn serve_asset(path: PathBuf) -> Response {
    match tokio::fs::read(&path).await {
        Ok(contents) => {
            debug!("Serving {} ({} bytes)", path.display(), contents.len());
            ([(header::CONTENT_TYPE, content_type(&path))], contents).into_response()
        }
        Err(e) => {
            warn!("Asset {} unavailable: {}", path.display(), e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("js") => "application/javascript; charset=utf-8",
        Some("html") => "text/html; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use axum::routing::get;
    use tower::ServiceExt;

    fn public_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("public")
    }

    fn app() -> Router {
        Router::new()
            .route("/", get(|| async { "hello world" }))
            .route("/nodecopter-gamepad/other", get(|| async { "not an asset" }))
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_serves_each_asset() {
        for file in ASSET_FILES {
            let router = with_assets(app(), public_dir());
            let request = Request::get(format!("{}/{}", ASSET_PREFIX, file))
                .body(Body::empty())
                .unwrap();
            let response = router.oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::OK, "{}", file);
            let expected = std::fs::read_to_string(public_dir().join(file)).unwrap();
            assert_eq!(body_string(response).await, expected);
        }
    }

    #[tokio::test]
    async fn test_content_types() {
        let router = with_assets(app(), public_dir());
        let request = Request::get("/nodecopter-gamepad/gamepad-test.html")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
        assert_eq!(
            content_type(Path::new("gamepad-client.js")),
            "application/javascript; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn test_any_method_is_served() {
        let router = with_assets(app(), public_dir());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/nodecopter-gamepad/gamepad-client.js")
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_query_string_is_ignored() {
        let router = with_assets(app(), public_dir());
        let request = Request::get("/nodecopter-gamepad/gamepad-client.js?v=1")
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/javascript; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn test_other_requests_reach_existing_app() {
        let router = with_assets(app(), public_dir());
        let response = router
            .clone()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "hello world");

        let response = router
            .clone()
            .oneshot(
                Request::get("/nodecopter-gamepad/other")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "not an asset");

        let response = router
            .oneshot(Request::get("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let empty = std::env::temp_dir().join("gamepad-relay-no-assets");
        let router = with_assets(app(), empty);
        let request = Request::get("/nodecopter-gamepad/gamepad-client.js")
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
