//! Read-only admin API.
//!
//! Mounted only when `admin.enabled`; every route requires the bearer key.

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/destinations", get(get_destinations))
        .route("/admin/circuits", get(get_circuits))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}

#[cfg(test)]
mod tests {
    use crate::config::{DestinationConfig, GatewayConfig};
    use crate::http::HttpServer;
    use crate::pipeline::EventBus;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    fn server() -> HttpServer {
        let mut config = GatewayConfig::default();
        config.health_check.enabled = false;
        config.admin.enabled = true;
        config.admin.api_key = "secret".into();
        config.destinations.push(DestinationConfig {
            name: "d1".into(),
            cluster: "backend".into(),
            address: "http://127.0.0.1:5001".into(),
        });
        HttpServer::new(config, EventBus::default()).unwrap()
    }

    async fn get(server: &HttpServer, path: &str, key: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut request = Request::get(path);
        if let Some(key) = key {
            request = request.header(header::AUTHORIZATION, format!("Bearer {key}"));
        }
        let response = server
            .router()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }

    #[tokio::test]
    async fn test_requires_bearer_key() {
        let server = server();
        assert_eq!(get(&server, "/admin/status", None).await.0, StatusCode::UNAUTHORIZED);
        assert_eq!(get(&server, "/admin/status", Some("wrong")).await.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_status_reports_admission() {
        let (status, body) = get(&server(), "/admin/status", Some("secret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["admission"]["permit_limit"], 100);
        assert_eq!(body["admission"]["in_flight"], 0);
    }

    #[tokio::test]
    async fn test_destinations_and_circuits() {
        let server = server();
        let (status, body) = get(&server, "/admin/destinations", Some("secret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["name"], "d1");
        assert_eq!(body[0]["active_state"], "unknown");
        assert_eq!(body[0]["eligible"], true);
        assert_eq!(body[0]["passive_excluded"], false);

        let (status, body) = get(&server, "/admin/circuits", Some("secret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["cluster"], "backend");
        assert_eq!(body[0]["state"], "closed");
    }
}
