use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, Uri},
    middleware::from_fn_with_state,
    routing::{get, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::warn;

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::handlers::{categories, health, orders, products, users};
use crate::middleware::auth_gate;
use crate::state::AppState;
use crate::uploads::PUBLIC_PATH;

/// Full application router: API routes under the configured prefix, the
/// upload directory under `/public/uploads`, every request through the gate.
pub fn app(state: AppState) -> Router {
    let config = state.config.clone();
    let path = |route: &str| config.api_path(route);

    Router::new()
        .route("/health", get(health::health))
        // Categories
        .route(&path("/categories"), get(categories::list).post(categories::create))
        .route(
            &path("/categories/:id"),
            get(categories::get).put(categories::update).delete(categories::delete),
        )
        // Products
        .route(&path("/products"), get(products::list).post(products::create))
        .route(&path("/products/get/count"), get(products::count))
        .route(&path("/products/get/featured/:count"), get(products::featured))
        .route(&path("/products/gallery-images/:id"), put(products::gallery))
        .route(
            &path("/products/:id"),
            get(products::get).put(products::update).delete(products::delete),
        )
        // Users
        .route(&path("/users"), get(users::list).post(users::create))
        .route(&path("/users/login"), axum::routing::post(users::login))
        .route(&path("/users/register"), axum::routing::post(users::register))
        .route(&path("/users/get/count"), get(users::count))
        .route(&path("/users/:id"), get(users::get).delete(users::delete))
        // Orders
        .route(&path("/orders"), get(orders::list).post(orders::create))
        .route(&path("/orders/get/totalsales"), get(orders::total_sales))
        .route(&path("/orders/get/count"), get(orders::count))
        .route(&path("/orders/get/userorders/:userid"), get(orders::user_orders))
        .route(
            &path("/orders/:id"),
            get(orders::get).put(orders::update_status).delete(orders::delete),
        )
        .nest_service(PUBLIC_PATH, ServeDir::new(&config.api.upload_dir))
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), auth_gate))
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .layer(cors_layer(&config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found(method: Method, uri: Uri) -> ApiError {
    ApiError::not_found(format!("No route for {} {}", method, uri.path()))
}

/// Empty origin list means permissive, as in development
fn cors_layer(config: &AppConfig) -> CorsLayer {
    if config.security.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreBackend;
    use crate::store::Stores;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn test_state() -> AppState {
        let mut config = AppConfig::development();
        config.database.backend = StoreBackend::Memory;
        config.api.upload_dir = std::env::temp_dir().join("eshop-routes-test");
        AppState::new(config, Stores::memory())
    }

    async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = app(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_and_catalog_reads_are_public() {
        let state = test_state();

        let (status, body) = send(&state, request(Method::GET, "/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["backend"], "memory");

        let (status, body) = send(&state, request(Method::GET, "/api/v1/products", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn gated_routes_reject_missing_credentials() {
        let state = test_state();
        let (status, body) = send(&state, request(Method::GET, "/api/v1/orders", None)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn unknown_routes_are_404_once_authenticated() {
        let state = test_state();
        let token = state.keys.issue(Uuid::new_v4(), true).unwrap();

        let (status, body) = send(&state, request(Method::GET, "/api/v1/nowhere", Some(&token))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn malformed_json_gets_the_error_envelope() {
        let state = test_state();
        let token = state.keys.issue(Uuid::new_v4(), true).unwrap();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/categories")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let (status, body) = send(&state, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }
}
