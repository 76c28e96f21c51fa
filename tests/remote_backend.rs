//! Talks to an in-process HTTP service shaped like the real document API.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;

use docchat::{
    Backend, BackendError, DocumentStatus, RemoteBackend, ResponseResolver, Role, Session,
    CONNECTIVITY_ERROR,
};

#[derive(Clone, Default)]
struct Service {
    documents: Arc<Mutex<Vec<(String, String)>>>,
    uploads: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    outage: Arc<AtomicBool>,
}

impl Service {
    fn seeded() -> Self {
        let service = Self::default();
        {
            let mut docs = service.documents.lock().unwrap();
            docs.push(("Handbook.pdf".to_string(), "indexed".to_string()));
            docs.push(("Roadmap.md".to_string(), "processing".to_string()));
        }
        service
    }
}

async fn chat(Json(body): Json<Value>) -> Json<Value> {
    let query = body["query"].as_str().unwrap_or_default();
    Json(json!({
        "response_text": format!("You asked: **{}**", query),
        "sources": [
            {"title": "Handbook.pdf", "uri": "Page 3"},
            {"title": "Roadmap.md"}
        ]
    }))
}

async fn status(State(service): State<Service>) -> Result<Json<Value>, StatusCode> {
    if service.outage.load(Ordering::SeqCst) {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let docs = service.documents.lock().unwrap();
    let indexed = docs.iter().filter(|(_, s)| s == "indexed").count();
    Ok(Json(json!({ "indexed_count": indexed })))
}

async fn documents(State(service): State<Service>) -> Json<Value> {
    let docs = service.documents.lock().unwrap();
    let list: Vec<Value> = docs
        .iter()
        .enumerate()
        .map(|(i, (name, status))| json!({"id": i + 1, "name": name, "status": status}))
        .collect();
    Json(Value::Array(list))
}

async fn upload(
    State(service): State<Service>,
    mut multipart: Multipart,
) -> Result<Json<Value>, StatusCode> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("unnamed").to_string();
        let bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
        service.uploads.lock().unwrap().push((name.clone(), bytes.to_vec()));
        service
            .documents
            .lock()
            .unwrap()
            .push((name, "pending".to_string()));
        return Ok(Json(json!({"message": "queued"})));
    }
    Err(StatusCode::BAD_REQUEST)
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn healthy_service() -> (String, Service) {
    let service = Service::seeded();
    let router = Router::new()
        .route("/api/v1/chat", post(chat))
        .route("/api/v1/status", get(status))
        .route("/api/v1/documents", get(documents))
        .route("/api/v1/upload-document", post(upload))
        .with_state(service.clone());
    (serve(router).await, service)
}

async fn broken_service() -> String {
    let router = Router::new()
        .route(
            "/api/v1/chat",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route("/api/v1/status", get(|| async { "not json" }))
        .route(
            "/api/v1/documents",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
        );
    serve(router).await
}

fn remote_session(url: &str) -> Session {
    Session::new(Backend::remote(url, Duration::from_secs(5)).unwrap())
}

#[tokio::test]
async fn test_chat_reply_maps_sources() {
    let (url, _service) = healthy_service().await;
    let backend = RemoteBackend::new(&url).unwrap();

    let resolution = backend.resolve("What is on the roadmap?").await.unwrap();

    assert_eq!(resolution.content, "You asked: **What is on the roadmap?**");
    assert_eq!(resolution.sources.len(), 2);
    assert_eq!(resolution.sources[0].title, "Handbook.pdf");
    assert_eq!(resolution.sources[0].locator, "Page 3");
    assert_eq!(resolution.sources[1].locator, "");
}

#[tokio::test]
async fn test_controller_records_remote_reply() {
    let (url, _service) = healthy_service().await;
    let session = remote_session(&url);

    assert!(session.controller().submit("  refund policy  ").await);

    let state = session.state().snapshot();
    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.messages[0].content, "refund policy");
    assert_eq!(state.messages[1].role, Role::Assistant);
    assert_eq!(state.messages[1].content, "You asked: **refund policy**");
    assert!(!state.is_processing);
}

#[tokio::test]
async fn test_server_error_becomes_apology() {
    let url = broken_service().await;
    let session = remote_session(&url);

    assert!(session.controller().submit("anything").await);

    let state = session.state().snapshot();
    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.messages[1].content, CONNECTIVITY_ERROR);
    assert!(state.messages[1].sources.is_empty());
    assert!(!state.is_processing);
}

#[tokio::test]
async fn test_malformed_reply_is_decode_error() {
    let url = broken_service().await;
    let backend = RemoteBackend::new(&url).unwrap();

    let err = backend.fetch_status().await.unwrap_err();
    assert!(matches!(err, BackendError::Decode(_)), "{err}");

    let err = backend.fetch_documents().await.unwrap_err();
    assert!(
        matches!(err, BackendError::Status { status: 503, .. }),
        "{err}"
    );
}

#[tokio::test]
async fn test_refresh_reads_status_and_documents() {
    let (url, _service) = healthy_service().await;
    let session = remote_session(&url);

    assert!(session.library().refresh().await);

    let state = session.state().snapshot();
    assert_eq!(state.indexed_count, 1);
    assert_eq!(state.documents.len(), 2);
    assert_eq!(state.documents[0].id, "1");
    assert_eq!(state.documents[0].status, DocumentStatus::Indexed);
    assert_eq!(state.documents[1].name, "Roadmap.md");
    assert_eq!(state.documents[1].status, DocumentStatus::Pending);
}

#[tokio::test]
async fn test_upload_sends_file_and_refreshes() {
    let (url, service) = healthy_service().await;
    let session = remote_session(&url);

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, b"quarterly notes").unwrap();

    assert!(session.library().ingest(path).await);

    let uploads = service.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, "notes.txt");
    assert_eq!(uploads[0].1, b"quarterly notes");

    let state = session.state().snapshot();
    assert!(!state.is_indexing);
    assert_eq!(state.documents.len(), 3);
    assert_eq!(state.documents[2].name, "notes.txt");
    assert_eq!(state.documents[2].status, DocumentStatus::Pending);
}

#[tokio::test]
async fn test_refresh_failure_keeps_last_known_documents() {
    let (url, service) = healthy_service().await;
    let session = remote_session(&url);
    assert!(session.library().refresh().await);
    let before = session.state().snapshot();

    service.outage.store(true, Ordering::SeqCst);
    service.documents.lock().unwrap().clear();
    assert!(!session.library().refresh().await);

    let after = session.state().snapshot();
    assert_eq!(after.documents, before.documents);
    assert_eq!(after.indexed_count, before.indexed_count);

    service.outage.store(false, Ordering::SeqCst);
    assert!(session.library().refresh().await);
    assert!(session.state().snapshot().documents.is_empty());
}

#[tokio::test]
async fn test_missing_upload_file_leaves_flag_down() {
    let (url, service) = healthy_service().await;
    let session = remote_session(&url);

    assert!(!session.library().ingest("/definitely/not/here.pdf".into()).await);

    assert!(!session.state().snapshot().is_indexing);
    assert!(service.uploads.lock().unwrap().is_empty());
}
