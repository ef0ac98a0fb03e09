//! HttpBackend against a mock HTTP server

use bytes::Bytes;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use elohim_migration::{
    AssetUpload, CreateDocumentRequest, HttpBackend, MigrationBackend, MigrationConfig,
    MigrationError, UpdateDocumentRequest,
};

fn config(server: &MockServer) -> MigrationConfig {
    let mut config = MigrationConfig::new("my-repo", "secret");
    config.asset_api_url = server.uri();
    config.migration_api_url = server.uri();
    config.content_api_url = format!("{}/api/v2", server.uri());
    config.migration_api_key = Some("api-key".into());
    config.retry_backoff_ms = 1;
    config
}

fn backend(server: &MockServer) -> HttpBackend {
    HttpBackend::new(config(server)).unwrap()
}

fn asset_json(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "url": format!("https://assets.example.io/{}.png", id),
        "filename": format!("{}.png", id),
        "size": 10,
        "kind": "image",
        "width": 10,
        "height": 10,
        "tags": []
    })
}

// ── Asset API ───────────────────────────────────────────────────

#[tokio::test]
async fn test_list_assets_sends_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/assets"))
        .and(query_param("pageSize", "50"))
        .and(query_param("cursor", "abc"))
        .and(header("authorization", "Bearer secret"))
        .and(header("repository", "my-repo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 1,
            "items": [asset_json("a1")],
            "cursor": "",
            "missing_ids": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = backend(&server).list_assets(Some("abc"), 50).await.unwrap();

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, "a1");
    assert!(page.next_cursor().is_none());
}

#[tokio::test]
async fn test_create_asset_uploads_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/assets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(asset_json("new")))
        .expect(1)
        .mount(&server)
        .await;

    let asset = backend(&server)
        .create_asset(AssetUpload {
            file: Bytes::from_static(b"\x89PNG"),
            filename: "logo.png".into(),
            content_type: Some("image/png".into()),
            notes: None,
            credits: Some("Studio".into()),
            alt: Some("Company logo".into()),
        })
        .await
        .unwrap();
    assert_eq!(asset.id, "new");

    let requests = server.received_requests().await.unwrap();
    let content_type = requests[0]
        .headers
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("multipart/form-data"));

    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("filename=\"logo.png\""));
    assert!(body.contains("Company logo"));
    assert!(body.contains("Studio"));
    assert!(!body.contains("name=\"notes\""));
}

#[tokio::test]
async fn test_tags_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "id": "t1", "name": "hero" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/tags"))
        .and(body_json(json!({ "name": "banner" })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "id": "t2", "name": "banner" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend(&server);
    let tags = backend.list_tags().await.unwrap();
    assert_eq!(tags[0].name, "hero");

    let created = backend.create_tag("banner").await.unwrap();
    assert_eq!(created.id, "t2");
}

// ── Content API ─────────────────────────────────────────────────

#[tokio::test]
async fn test_repository_and_document_search() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "refs": [{ "id": "master", "ref": "master-ref", "label": "Master", "isMasterRef": true }],
            "languages": [{ "id": "en-us", "name": "English", "is_master": true }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/documents/search"))
        .and(query_param("ref", "master-ref"))
        .and(query_param("lang", "*"))
        .and(query_param("page", "2"))
        .and(query_param("pageSize", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "page": 2,
            "results_per_page": 20,
            "total_pages": 2,
            "results": [{ "id": "d1", "type": "page", "lang": "en-us", "data": {} }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend(&server);
    let repository = backend.repository().await.unwrap();
    assert_eq!(repository.master_locale(), Some("en-us"));

    let page = backend
        .list_documents(repository.master_ref(), 2, 20)
        .await
        .unwrap();
    assert_eq!(page.results[0].id, "d1");
    assert_eq!(page.total_pages, 2);
}

// ── Migration API ───────────────────────────────────────────────

#[tokio::test]
async fn test_create_document_sends_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/documents"))
        .and(header("x-api-key", "api-key"))
        .and(header("authorization", "Bearer secret"))
        .and(body_json(json!({
            "title": "Home",
            "type": "page",
            "uid": "home",
            "lang": "en-us",
            "data": {}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "R1",
            "uid": "home",
            "type": "page",
            "lang": "en-us"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = backend(&server)
        .create_document(CreateDocumentRequest {
            title: "Home".into(),
            doc_type: "page".into(),
            uid: Some("home".into()),
            lang: "en-us".into(),
            alternate_language_id: None,
            tags: None,
            data: json!({}),
        })
        .await
        .unwrap();

    assert_eq!(created.id, "R1");
}

#[tokio::test]
async fn test_update_missing_document_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/documents/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = backend(&server)
        .update_document(
            "gone",
            UpdateDocumentRequest {
                title: None,
                uid: None,
                tags: None,
                data: json!({}),
            },
        )
        .await;

    assert!(matches!(result, Err(MigrationError::NotFound(_))));
}

// ── Error mapping and retries ───────────────────────────────────

#[tokio::test]
async fn test_invalid_token_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tags"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
        .mount(&server)
        .await;

    let result = backend(&server).list_tags().await;
    match result {
        Err(MigrationError::Unauthorized(message)) => assert_eq!(message, "invalid token"),
        other => panic!("expected Unauthorized, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_keeps_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tags"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let result = backend(&server).list_tags().await;
    assert!(matches!(
        result,
        Err(MigrationError::Server { status: 500, .. })
    ));
}

#[tokio::test]
async fn test_rate_limit_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tags"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let tags = backend(&server).list_tags().await.unwrap();
    assert!(tags.is_empty());
}

#[tokio::test]
async fn test_rate_limit_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tags"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&server)
        .await;

    let mut config = config(&server);
    config.max_retries = 1;
    let result = HttpBackend::new(config).unwrap().list_tags().await;

    assert!(matches!(
        result,
        Err(MigrationError::RateLimited { attempts: 2, .. })
    ));
}

// ── Foreign assets ──────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_foreign_asset() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/photo.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(b"pixels".to_vec()),
        )
        .mount(&server)
        .await;

    let backend = backend(&server);
    let fetched = backend
        .fetch_asset(&format!("{}/files/photo.png", server.uri()))
        .await
        .unwrap();
    assert_eq!(&fetched.bytes[..], b"pixels");
    assert_eq!(fetched.content_type.as_deref(), Some("image/png"));

    let missing = backend
        .fetch_asset(&format!("{}/files/missing.png", server.uri()))
        .await;
    assert!(matches!(missing, Err(MigrationError::AssetFetch { .. })));
}
