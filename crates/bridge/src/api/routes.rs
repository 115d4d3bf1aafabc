//! API route definitions

use crate::api::{handlers, middleware};
use crate::app::AppState;
use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

/// Create the main API router
pub fn create_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    // Click'n'Load probes must answer without credentials
    let public = Router::new()
        .route("/healthz", get(handlers::health_check))
        .route("/cnl/flash", get(handlers::cnl_probe).post(handlers::cnl_probe))
        .route("/cnl/flash/check", get(handlers::cnl_probe).post(handlers::cnl_probe))
        .route("/cnl/jdcheck.js", get(handlers::cnl_jdcheck))
        .route("/cnl/crossdomain.xml", get(handlers::cnl_crossdomain));

    let protected = Router::new()
        // Intake
        .route("/cnl/*subpath", post(handlers::cnl_submit))
        .route("/downloads/links", post(handlers::submit_links))
        .route("/linkgrabber/add-file", post(handlers::add_file))

        // Status and buffer management
        .route("/system/status", get(handlers::system_status))
        .route("/system/buffer/replay", post(handlers::replay_buffer))
        .route("/buffer/details", get(handlers::buffer_details))
        .route("/buffer/clear", delete(handlers::clear_buffer))
        .route("/buffer/package/:package_id", delete(handlers::delete_package))
        .route("/buffer/dlc/:filename", delete(handlers::delete_container))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_token));

    public.merge(protected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnl::tests::encrypt_form;
    use crate::database::Database;
    use axum::{
        body::{to_bytes, Body},
        http::{header, request::Builder, Request, StatusCode},
        response::Response,
    };
    use config::Config;
    use serde_json::{json, Value};
    use simulator::SimulatedGateway;
    use std::time::Duration;
    use tower::util::ServiceExt;
    use tower_http::timeout::TimeoutLayer;

    const TOKEN: &str = "test-token-0123456789";

    async fn create_test_state() -> (Arc<AppState>, Arc<SimulatedGateway>) {
        let mut config = Config::default();
        config.security.api_token = Some(TOKEN.to_string());

        let sim = Arc::new(SimulatedGateway::new(true));
        let database = Database::new_in_memory().await.unwrap();
        let state = Arc::new(AppState::new(config, database, sim.clone()));
        (state, sim)
    }

    fn app(state: &Arc<AppState>) -> Router {
        create_routes(state).with_state(state.clone())
    }

    fn authed(method: &str, uri: &str) -> Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
    }

    fn json_request(uri: &str, body: Value) -> Request<Body> {
        authed("POST", uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn form_encode(pairs: &[(&str, &str)]) -> String {
        let encode = |value: &str| {
            value
                .bytes()
                .map(|b| {
                    if b.is_ascii_alphanumeric() {
                        (b as char).to_string()
                    } else {
                        format!("%{:02X}", b)
                    }
                })
                .collect::<String>()
        };
        pairs
            .iter()
            .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    #[tokio::test]
    async fn test_health_endpoint_is_public() {
        let (state, _) = create_test_state().await;

        let request = Request::builder()
            .uri("/healthz")
            .body(Body::empty())
            .unwrap();

        let response = app(&state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["components"]["jdownloader"], "offline");
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let (state, _) = create_test_state().await;

        let request = Request::builder()
            .uri("/system/status")
            .body(Body::empty())
            .unwrap();
        let response = app(&state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

        let request = Request::builder()
            .uri("/system/status")
            .header(header::AUTHORIZATION, "Bearer wrong")
            .body(Body::empty())
            .unwrap();
        let response = app(&state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let request = authed("GET", "/system/status").body(Body::empty()).unwrap();
        let response = app(&state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_links_buffer_while_offline_and_show_up() {
        let (state, _) = create_test_state().await;

        // cached state starts offline
        let response = app(&state)
            .oneshot(json_request(
                "/downloads/links",
                json!({ "links": ["http://a/1", "http://a/2"], "name": "Pkg" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "buffered");
        assert_eq!(body["reason"], "offline");

        let response = app(&state)
            .oneshot(json_request("/downloads/links", json!(["http://b/1"])))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["status"], "buffered");

        let request = authed("GET", "/buffer/details").body(Body::empty()).unwrap();
        let details = body_json(app(&state).oneshot(request).await.unwrap()).await;
        let packages = details["packages"].as_array().unwrap();
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0]["name"], "Pkg");
        assert_eq!(details["dlc_files"].as_array().unwrap().len(), 0);

        let request = authed("GET", "/system/status").body(Body::empty()).unwrap();
        let status = body_json(app(&state).oneshot(request).await.unwrap()).await;
        assert_eq!(status["buffer_count"], 2);
        assert_eq!(status["jd_online"], false);
    }

    #[tokio::test]
    async fn test_links_delivered_when_online() {
        let (state, sim) = create_test_state().await;
        state.monitor.record(true).await;

        let response = app(&state)
            .oneshot(json_request("/downloads/links", json!(["http://now"])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "delivered");
        assert_eq!(sim.delivered_links().await, vec!["http://now"]);
    }

    #[tokio::test]
    async fn test_empty_links_rejected() {
        let (state, _) = create_test_state().await;

        let response = app(&state)
            .oneshot(json_request("/downloads/links", json!({ "links": ["  "] })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_package() {
        let (state, _) = create_test_state().await;

        let response = app(&state)
            .oneshot(json_request("/downloads/links", json!(["http://gone"])))
            .await
            .unwrap();
        let id = body_json(response).await["id"].as_str().unwrap().to_string();

        let uri = format!("/buffer/package/{}", id);
        let response = app(&state)
            .oneshot(authed("DELETE", &uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "deleted");
        assert_eq!(body["deleted"]["links"], json!(["http://gone"]));

        let response = app(&state)
            .oneshot(authed("DELETE", &uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app(&state)
            .oneshot(authed("DELETE", "/buffer/package/not-a-uuid").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_container_upload_and_delete() {
        let (state, _) = create_test_state().await;

        let boundary = "XBOUNDARYX";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"movie.dlc\"\r\n\
             Content-Type: application/octet-stream\r\n\r\nDLCDATA\r\n--{b}--\r\n",
            b = boundary
        );
        let request = authed("POST", "/linkgrabber/add-file")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();

        let response = app(&state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "buffered");
        assert_eq!(body["filename"], "movie.dlc");

        let containers = state.store.list_containers().await.unwrap();
        assert_eq!(containers[0].payload, b"DLCDATA");

        let response = app(&state)
            .oneshot(authed("DELETE", "/buffer/dlc/movie.dlc").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app(&state)
            .oneshot(authed("DELETE", "/buffer/dlc/movie.dlc").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_clear_buffer() {
        let (state, _) = create_test_state().await;
        for link in ["http://1", "http://2"] {
            app(&state)
                .oneshot(json_request("/downloads/links", json!([link])))
                .await
                .unwrap();
        }

        let response = app(&state)
            .oneshot(authed("DELETE", "/buffer/clear").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["deleted_packages"], 2);
        assert_eq!(body["deleted_dlcs"], 0);
        assert_eq!(state.store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_replay_status_codes() {
        let (state, sim) = create_test_state().await;
        let replay = || authed("POST", "/system/buffer/replay").body(Body::empty()).unwrap();

        let response = app(&state).oneshot(replay()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "empty");

        app(&state)
            .oneshot(json_request("/downloads/links", json!(["http://later"])))
            .await
            .unwrap();

        sim.set_online(false);
        let response = app(&state).oneshot(replay()).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(state.store.count().await.unwrap(), 1);

        sim.set_online(true);
        let response = app(&state).oneshot(replay()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["report"]["delivered_packages"], 1);
        assert_eq!(state.store.count().await.unwrap(), 0);
        assert_eq!(sim.delivered_links().await, vec!["http://later"]);
    }

    #[tokio::test]
    async fn test_replay_outlives_request_timeout() {
        let (state, sim) = create_test_state().await;
        for i in 0..4 {
            app(&state)
                .oneshot(json_request("/downloads/links", json!([format!("http://{}", i)])))
                .await
                .unwrap();
        }
        sim.set_latency(Some(Duration::from_millis(200))).await;

        let timed = app(&state).layer(TimeoutLayer::new(Duration::from_millis(500)));
        let response = timed
            .oneshot(authed("POST", "/system/buffer/replay").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

        let mut drained = false;
        for _ in 0..60 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if state.store.count().await.unwrap() == 0 && !state.dispatcher.is_running() {
                drained = true;
                break;
            }
        }
        assert!(drained, "replay pass stopped with the request");
        assert_eq!(
            sim.delivered_links().await,
            vec!["http://0", "http://1", "http://2", "http://3"]
        );
    }

    #[tokio::test]
    async fn test_cnl_probes() {
        let (state, _) = create_test_state().await;

        for uri in ["/cnl/flash", "/cnl/flash/check"] {
            let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
            let response = app(&state).oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_text(response).await, "JDownloader");
        }

        let request = Request::builder()
            .uri("/cnl/jdcheck.js")
            .body(Body::empty())
            .unwrap();
        let response = app(&state).oneshot(request).await.unwrap();
        assert_eq!(body_text(response).await, "jdownloader=true;");
    }

    #[tokio::test]
    async fn test_cnl_addcrypted2_form() {
        let (state, _) = create_test_state().await;
        let (crypted, jk) = encrypt_form("http://cnl/1\r\nhttp://cnl/2");

        let request = authed("POST", "/cnl/flash/addcrypted2")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form_encode(&[
                ("crypted", crypted.as_str()),
                ("jk", jk.as_str()),
                ("package", "From Page"),
            ])))
            .unwrap();

        let response = app(&state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "success");

        let packages = state.store.list_packages().await.unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].links, vec!["http://cnl/1", "http://cnl/2"]);
        assert_eq!(packages[0].name.as_deref(), Some("From Page"));
    }

    #[tokio::test]
    async fn test_cnl_failures() {
        let (state, _) = create_test_state().await;

        let request = authed("POST", "/cnl/flash/addcrypted2")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("crypted=AAAA"))
            .unwrap();
        let response = app(&state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "failed");

        let request = authed("POST", "/cnl/flash/unknown")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("urls=http%3A%2F%2Fa"))
            .unwrap();
        let response = app(&state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
