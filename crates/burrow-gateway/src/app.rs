use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::handlers::{
    delete_user_urls_handler, health_handler, list_user_urls_handler, ping_handler,
    redirect_handler, shorten_batch_handler, shorten_json_handler, shorten_text_handler,
};
use crate::state::AppState;

pub struct App;

impl App {
    pub fn router(state: AppState) -> Router {
        let shortening = Router::new()
            .route("/", post(shorten_text_handler))
            .route("/api/shorten", post(shorten_json_handler))
            .route("/api/shorten/batch", post(shorten_batch_handler))
            .route_layer(from_fn_with_state(state.clone(), auth::identify));

        let user = Router::new()
            .route(
                "/api/user/urls",
                get(list_user_urls_handler).delete(delete_user_urls_handler),
            )
            .route_layer(from_fn_with_state(state.clone(), auth::require_identity));

        Router::new()
            .route("/health", get(health_handler))
            .route("/ping", get(ping_handler))
            .route("/{id}", get(redirect_handler))
            .merge(shortening)
            .merge(user)
            .layer(RequestDecompressionLayer::new())
            .layer(CompressionLayer::new())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenSigner;
    use axum::body::{to_bytes, Body};
    use axum::http::header::{
        ACCEPT_ENCODING, AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE, COOKIE, LOCATION,
        SET_COOKIE,
    };
    use axum::http::{Request, Response, StatusCode};
    use burrow_core::{Shortener, UserId};
    use burrow_generator::SeqGenerator;
    use burrow_shortener::{ServiceConfig, ShortenerService};
    use burrow_storage::InMemoryStorage;
    use flate2::read::GzDecoder;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Read, Write};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    const SECRET: &str = "test-secret";

    struct TestApp {
        router: Router,
        service: Arc<ShortenerService<InMemoryStorage<SeqGenerator>>>,
    }

    impl TestApp {
        fn new() -> Self {
            let storage = Arc::new(InMemoryStorage::with_generator(SeqGenerator::with_prefix(
                "bw",
            )));
            let config = ServiceConfig::builder()
                .base_url("http://localhost:8080")
                .flush_interval(Duration::from_secs(3600))
                .build();
            let service = Arc::new(ShortenerService::new(storage, config));
            let state = AppState::new(service.clone(), TokenSigner::new(SECRET));

            Self {
                router: App::router(state),
                service,
            }
        }

        async fn send(&self, request: Request<Body>) -> Response<Body> {
            self.router.clone().oneshot(request).await.unwrap()
        }
    }

    async fn body_string(response: Response<Body>) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn token_cookie(response: &Response<Body>) -> String {
        let value = response
            .headers()
            .get(SET_COOKIE)
            .expect("set-cookie header")
            .to_str()
            .unwrap();
        value.split(';').next().unwrap().to_string()
    }

    fn user_cookie(user: &UserId) -> String {
        format!("token={}", TokenSigner::new(SECRET).issue(user).unwrap())
    }

    fn post_text(body: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::post("/").header(CONTENT_TYPE, "text/plain");
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn post_json(uri: &str, body: &str, cookie: &str) -> Request<Body> {
        Request::post(uri)
            .header(CONTENT_TYPE, "application/json")
            .header(COOKIE, cookie)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::get(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn text_shortening_issues_identity() {
        let app = TestApp::new();

        let response = app.send(post_text("https://ya.ru", None)).await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("token="));
        assert!(cookie.contains("HttpOnly"));
        assert!(response.headers().contains_key(AUTHORIZATION));
        assert_eq!(body_string(response).await, "http://localhost:8080/bw000000");
    }

    #[tokio::test]
    async fn duplicate_text_shortening_conflicts_with_same_url() {
        let app = TestApp::new();
        let cookie = user_cookie(&UserId::generate());

        let first = app.send(post_text("https://ya.ru", Some(&cookie))).await;
        let second = app.send(post_text("https://ya.ru", Some(&cookie))).await;

        assert_eq!(first.status(), StatusCode::CREATED);
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert!(!second.headers().contains_key(SET_COOKIE));
        assert_eq!(body_string(first).await, body_string(second).await);
    }

    #[tokio::test]
    async fn empty_text_body_is_bad_request() {
        let app = TestApp::new();

        let empty = app.send(post_text("", None)).await;
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

        let blank = app.send(post_text(" \n", None)).await;
        assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

        let cookie = user_cookie(&UserId::generate());
        let blank_json = app
            .send(post_json("/api/shorten", r#"{"url":"   "}"#, &cookie))
            .await;
        assert_eq!(blank_json.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn text_and_json_shortening_agree_on_padded_urls() {
        let app = TestApp::new();
        let cookie = user_cookie(&UserId::generate());

        let json = app
            .send(post_json("/api/shorten", r#"{"url":"  ya.ru  "}"#, &cookie))
            .await;
        assert_eq!(json.status(), StatusCode::CREATED);
        let body: serde_json::Value = serde_json::from_str(&body_string(json).await).unwrap();
        assert_eq!(body["result"], "http://localhost:8080/bw000000");

        let text = app.send(post_text("ya.ru\n", Some(&cookie))).await;
        assert_eq!(text.status(), StatusCode::CONFLICT);
        assert_eq!(body_string(text).await, "http://localhost:8080/bw000000");

        let mailto = app.send(post_text("  mailto:a@b.c", Some(&cookie))).await;
        assert_eq!(mailto.status(), StatusCode::CREATED);

        let redirect = app.send(get("/bw000000", None)).await;
        assert_eq!(redirect.headers().get(LOCATION).unwrap(), "ya.ru");
    }

    #[tokio::test]
    async fn invalid_token_is_unauthorized() {
        let app = TestApp::new();

        let response = app
            .send(post_text("https://ya.ru", Some("token=garbage")))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn authorization_header_identifies_user() {
        let app = TestApp::new();
        let user = UserId::generate();
        let token = TokenSigner::new(SECRET).issue(&user).unwrap();

        let request = Request::post("/")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from("https://ya.ru"))
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(!response.headers().contains_key(SET_COOKIE));

        let urls = app.service.get_all_urls(&user).await.unwrap();
        assert_eq!(urls.len(), 1);
    }

    #[tokio::test]
    async fn redirects_to_full_url() {
        let app = TestApp::new();
        app.send(post_text("https://ya.ru", None)).await;

        let response = app.send(get("/bw000000", None)).await;

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "https://ya.ru");
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let app = TestApp::new();

        assert_eq!(app.send(get("/bw999999", None)).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(app.send(get("/short", None)).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn json_shortening() {
        let app = TestApp::new();
        let cookie = user_cookie(&UserId::generate());

        let created = app
            .send(post_json("/api/shorten", r#"{"url":"https://ya.ru"}"#, &cookie))
            .await;
        assert_eq!(created.status(), StatusCode::CREATED);
        let body: serde_json::Value = serde_json::from_str(&body_string(created).await).unwrap();
        assert_eq!(body, serde_json::json!({"result": "http://localhost:8080/bw000000"}));

        let existing = app
            .send(post_json("/api/shorten", r#"{"url":"https://ya.ru"}"#, &cookie))
            .await;
        assert_eq!(existing.status(), StatusCode::CONFLICT);

        let malformed = app
            .send(post_json("/api/shorten", r#"{"link":"https://ya.ru"}"#, &cookie))
            .await;
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn batch_shortening_keeps_correlation_ids() {
        let app = TestApp::new();
        let cookie = user_cookie(&UserId::generate());
        let batch = r#"[
            {"correlation_id": "a", "original_url": "https://example.com/1"},
            {"correlation_id": "b", "original_url": "https://example.com/2"}
        ]"#;

        let response = app.send(post_json("/api/shorten/batch", batch, &cookie)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(
            body,
            serde_json::json!([
                {"correlation_id": "a", "short_url": "http://localhost:8080/bw000000"},
                {"correlation_id": "b", "short_url": "http://localhost:8080/bw000001"},
            ])
        );

        let again = r#"[
            {"correlation_id": "c", "original_url": "https://example.com/3"},
            {"correlation_id": "d", "original_url": "https://example.com/1"}
        ]"#;
        let response = app.send(post_json("/api/shorten/batch", again, &cookie)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body[1]["short_url"], "http://localhost:8080/bw000000");

        let empty = app.send(post_json("/api/shorten/batch", "[]", &cookie)).await;
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn user_urls_require_a_token() {
        let app = TestApp::new();

        let response = app.send(get("/api/user/urls", None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(!response.headers().contains_key(SET_COOKIE));
    }

    #[tokio::test]
    async fn user_urls_lists_own_urls_or_no_content() {
        let app = TestApp::new();

        let created = app.send(post_text("https://ya.ru", None)).await;
        let cookie = token_cookie(&created);

        let response = app.send(get("/api/user/urls", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(
            body,
            serde_json::json!([
                {"short_url": "http://localhost:8080/bw000000", "original_url": "https://ya.ru"}
            ])
        );

        let stranger = user_cookie(&UserId::generate());
        let response = app.send(get("/api/user/urls", Some(&stranger))).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn deleted_urls_are_gone() {
        let app = TestApp::new();
        let cookie = user_cookie(&UserId::generate());
        app.send(post_text("https://example.com/1", Some(&cookie))).await;
        app.send(post_text("https://example.com/2", Some(&cookie))).await;

        let request = Request::delete("/api/user/urls")
            .header(CONTENT_TYPE, "application/json")
            .header(COOKIE, &cookie)
            .body(Body::from(r#"["bw000000", "not-an-id"]"#))
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        // drains the pipeline
        app.service.shutdown().await;

        assert_eq!(app.send(get("/bw000000", None)).await.status(), StatusCode::GONE);
        assert_eq!(
            app.send(get("/bw000001", None)).await.status(),
            StatusCode::TEMPORARY_REDIRECT
        );
    }

    #[tokio::test]
    async fn malformed_deletion_body_is_bad_request() {
        let app = TestApp::new();
        let cookie = user_cookie(&UserId::generate());

        let request = Request::delete("/api/user/urls")
            .header(COOKIE, &cookie)
            .body(Body::from(r#"{"ids": []}"#))
            .unwrap();
        assert_eq!(app.send(request).await.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_and_ping() {
        let app = TestApp::new();

        let health = app.send(get("/health", None)).await;
        assert_eq!(health.status(), StatusCode::OK);
        assert_eq!(body_string(health).await, r#"{"status":"ok"}"#);

        assert_eq!(app.send(get("/ping", None)).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn gzip_request_body_is_decoded() {
        let app = TestApp::new();
        let cookie = user_cookie(&UserId::generate());

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(br#"{"url":"https://ya.ru"}"#).unwrap();
        let compressed = encoder.finish().unwrap();

        let request = Request::post("/api/shorten")
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_ENCODING, "gzip")
            .header(COOKIE, &cookie)
            .body(Body::from(compressed))
            .unwrap();
        let response = app.send(request).await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["result"], "http://localhost:8080/bw000000");
    }

    #[tokio::test]
    async fn responses_are_gzipped_when_accepted() {
        let app = TestApp::new();
        let cookie = user_cookie(&UserId::generate());
        app.send(post_text("https://example.com/a/rather/long/path", Some(&cookie)))
            .await;

        let request = Request::get("/api/user/urls")
            .header(COOKIE, &cookie)
            .header(ACCEPT_ENCODING, "gzip")
            .body(Body::empty())
            .unwrap();
        let response = app.send(request).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CONTENT_ENCODING).unwrap(), "gzip");

        let compressed = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let mut decoded = String::new();
        GzDecoder::new(compressed.as_ref())
            .read_to_string(&mut decoded)
            .unwrap();
        let body: serde_json::Value = serde_json::from_str(&decoded).unwrap();
        assert_eq!(
            body,
            serde_json::json!([{
                "short_url": "http://localhost:8080/bw000000",
                "original_url": "https://example.com/a/rather/long/path"
            }])
        );
    }
}
