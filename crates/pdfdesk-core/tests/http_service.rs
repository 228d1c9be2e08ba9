//! HTTP record service integration tests against a local axum server.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use parking_lot::Mutex;
use pdfdesk_config::RemoteConfig;
use pdfdesk_core::{HttpRecordService, RecordService};
use pdfdesk_protocol::{FilterState, Record, RecordId, ServiceError, UploadFile};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

/// Requests observed by the fake server.
#[derive(Default)]
struct Seen {
    list_queries: Vec<Option<String>>,
    puts: Vec<(String, Value)>,
    uploads: Vec<(String, String, usize)>,
    questions: Vec<(String, Value)>,
}

type Shared = Arc<Mutex<Seen>>;

fn server_records() -> Vec<Record> {
    vec![
        Record::new(1, "a.pdf", "/files/a.pdf", true),
        Record::new(2, "b.pdf", "/files/b.pdf", false),
    ]
}

async fn list(
    State(seen): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Vec<Record>> {
    let selected = params.get("selected").cloned();
    seen.lock().list_queries.push(selected.clone());
    let records = server_records()
        .into_iter()
        .filter(|record| match selected.as_deref() {
            Some("true") => record.selected,
            Some("false") => !record.selected,
            _ => true,
        })
        .collect();
    Json(records)
}

async fn update(
    State(seen): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    seen.lock().puts.push((id, body));
    StatusCode::OK
}

async fn delete(Path(id): Path<String>) -> impl IntoResponse {
    if id == "500" {
        (StatusCode::INTERNAL_SERVER_ERROR, "boom")
    } else {
        (StatusCode::OK, "")
    }
}

async fn upload(State(seen): State<Shared>, mut multipart: Multipart) -> impl IntoResponse {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.unwrap_or_default();
        seen.lock()
            .uploads
            .push((file_name.clone(), content_type, bytes.len()));
        let created = json!({
            "id": 10,
            "name": file_name,
            "file": format!("/files/{file_name}"),
            "selected": false,
            "pages": 3
        });
        return (StatusCode::CREATED, Json(created)).into_response();
    }
    StatusCode::BAD_REQUEST.into_response()
}

async fn ask(
    State(seen): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    seen.lock().questions.push((id.clone(), body.clone()));
    match id.as_str() {
        "404" => (StatusCode::NOT_FOUND, "missing").into_response(),
        "garbled" => (StatusCode::OK, "not json").into_response(),
        _ => Json(json!({ "answer": body["question"], "record": id })).into_response(),
    }
}

async fn spawn_server() -> (HttpRecordService, Shared) {
    let seen: Shared = Arc::new(Mutex::new(Seen::default()));
    let app = Router::new()
        .route("/pdfs", get(list))
        .route("/pdfs/upload", post(upload))
        .route("/pdfs/{id}", put(update).delete(delete))
        .route("/pdfs/qa-pdf/{id}", post(ask))
        .with_state(seen.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let service = HttpRecordService::new(&RemoteConfig {
        base_url: format!("http://{addr}"),
        ..RemoteConfig::default()
    })
    .expect("service");
    (service, seen)
}

#[tokio::test]
async fn list_passes_filter_as_selected_query() {
    let (service, seen) = spawn_server().await;

    let all = service.list(FilterState::All).await.expect("all");
    let selected = service.list(FilterState::Selected).await.expect("selected");
    let unselected = service
        .list(FilterState::Unselected)
        .await
        .expect("unselected");

    assert_eq!(all, server_records());
    assert_eq!(selected, vec![server_records()[0].clone()]);
    assert_eq!(unselected, vec![server_records()[1].clone()]);
    assert_eq!(
        seen.lock().list_queries,
        vec![None, Some("true".to_string()), Some("false".to_string())]
    );
}

#[tokio::test]
async fn update_puts_the_full_record() {
    let (service, seen) = spawn_server().await;
    let mut record = Record::new(2, "renamed.pdf", "/files/b.pdf", true);
    record.extra.insert("pages".to_string(), json!(12));

    service.update(&record).await.expect("update");

    let seen = seen.lock();
    let puts = &seen.puts;
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].0, "2");
    assert_eq!(
        puts[0].1,
        json!({
            "id": 2,
            "name": "renamed.pdf",
            "file": "/files/b.pdf",
            "selected": true,
            "pages": 12
        })
    );
}

#[tokio::test]
async fn delete_maps_server_error_to_status() {
    let (service, _) = spawn_server().await;

    service.delete(&RecordId::Int(1)).await.expect("delete");
    let err = service
        .delete(&RecordId::Int(500))
        .await
        .expect_err("server error");
    assert_eq!(
        err,
        ServiceError::Status {
            status: 500,
            body: "boom".to_string()
        }
    );
}

#[tokio::test]
async fn upload_sends_multipart_file_field() {
    let (service, seen) = spawn_server().await;

    let created = service
        .upload(UploadFile::pdf("report.pdf", b"%PDF-1.7 data".to_vec()))
        .await
        .expect("upload");

    assert_eq!(created.id, RecordId::Int(10));
    assert_eq!(created.file, "/files/report.pdf");
    assert_eq!(created.extra.get("pages"), Some(&json!(3)));
    assert_eq!(
        seen.lock().uploads,
        vec![(
            "report.pdf".to_string(),
            "application/pdf".to_string(),
            13
        )]
    );
}

#[tokio::test]
async fn ask_posts_question_and_returns_opaque_answer() {
    let (service, seen) = spawn_server().await;

    let answer = service
        .ask(&RecordId::Int(5), "what is on page 2?")
        .await
        .expect("ask");
    assert_eq!(answer, json!({ "answer": "what is on page 2?", "record": "5" }));
    assert_eq!(
        seen.lock().questions,
        vec![("5".to_string(), json!({ "question": "what is on page 2?" }))]
    );

    let err = service
        .ask(&RecordId::Int(404), "hello")
        .await
        .expect_err("rejected");
    assert_eq!(err.status(), Some(404));

    let err = service
        .ask(&RecordId::Text("garbled".to_string()), "hello")
        .await
        .expect_err("undecodable");
    assert!(matches!(err, ServiceError::Decode(_)));
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let service = HttpRecordService::new(&RemoteConfig {
        base_url: format!("http://{addr}"),
        ..RemoteConfig::default()
    })
    .expect("service");
    let err = service.list(FilterState::All).await.expect_err("refused");
    assert!(matches!(err, ServiceError::Transport(_)));
}
