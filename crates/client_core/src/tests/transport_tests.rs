use super::*;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::json;
use shared::{domain::NoteTag, error::ErrorCode};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct ServerState {
    list_queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    deleted: Arc<Mutex<Vec<String>>>,
}

fn groceries() -> serde_json::Value {
    json!({
        "id": "abc123",
        "title": "Groceries",
        "content": "milk, eggs",
        "tag": "Shopping",
        "createdAt": "2025-05-01T10:00:00Z",
        "updatedAt": "2025-05-02T10:00:00Z"
    })
}

async fn list_notes(
    State(state): State<ServerState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    state.list_queries.lock().expect("lock").push(params);
    Json(json!({ "notes": [groceries()], "totalPages": 4 }))
}

async fn get_note(Path(id): Path<String>) -> Result<Json<serde_json::Value>, StatusCode> {
    if id == "abc123" {
        Ok(Json(groceries()))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

async fn create_note(Json(draft): Json<serde_json::Value>) -> (StatusCode, Json<serde_json::Value>) {
    if draft["title"].as_str().unwrap_or_default().len() < 3 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "title too short" })),
        );
    }
    let mut created = draft.clone();
    created["id"] = json!("new-1");
    (StatusCode::CREATED, Json(created))
}

async fn delete_note(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    if id != "abc123" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Note not found" })),
        );
    }
    state.deleted.lock().expect("lock").push(id);
    (StatusCode::OK, Json(groceries()))
}

async fn spawn_server() -> (String, ServerState) {
    let state = ServerState::default();
    let app = Router::new()
        .route("/api/notes", get(list_notes).post(create_note))
        .route("/api/notes/:id", get(get_note).delete(delete_note))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (format!("http://{addr}/api/"), state)
}

#[test]
fn rejects_unparseable_base_url() {
    let err = HttpNotesApi::new("http://[::1").err().expect("invalid url");
    assert!(matches!(err, NotesClientError::InvalidBaseUrl { .. }));
}

#[tokio::test]
async fn list_sends_camel_case_query_and_decodes_page() {
    let (base_url, state) = spawn_server().await;
    let api = HttpNotesApi::new(&base_url).expect("api");

    let page = api
        .fetch_notes(ListNotesQuery::new("milk", 2, 12, Some(NoteTag::Shopping)))
        .await
        .expect("page");
    assert_eq!(page.total_pages, 4);
    assert_eq!(page.notes[0].title, "Groceries");
    assert!(page.notes[0].created_at.is_some());

    api.fetch_notes(ListNotesQuery::new("", 1, 12, None))
        .await
        .expect("unfiltered page");

    let queries = state.list_queries.lock().expect("lock").clone();
    assert_eq!(queries[0].get("search").map(String::as_str), Some("milk"));
    assert_eq!(queries[0].get("page").map(String::as_str), Some("2"));
    assert_eq!(queries[0].get("perPage").map(String::as_str), Some("12"));
    assert_eq!(queries[0].get("tag").map(String::as_str), Some("Shopping"));
    assert!(!queries[1].contains_key("search"));
    assert!(!queries[1].contains_key("tag"));
}

#[tokio::test]
async fn delete_returns_removed_note_and_maps_not_found() {
    let (base_url, state) = spawn_server().await;
    let api = HttpNotesApi::new(&base_url).expect("api");

    let deleted = api
        .delete_note(&NoteId::new("abc123"))
        .await
        .expect("delete");
    assert_eq!(deleted.title, "Groceries");
    assert_eq!(*state.deleted.lock().expect("lock"), vec!["abc123".to_string()]);

    let err = api
        .delete_note(&NoteId::new("missing"))
        .await
        .expect_err("missing note");
    match err {
        NotesClientError::Api(api_err) => {
            assert_eq!(api_err.code, ErrorCode::NotFound);
            assert_eq!(api_err.message, "Note not found");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn create_and_fetch_single_note() {
    let (base_url, _state) = spawn_server().await;
    let api = HttpNotesApi::new(&base_url).expect("api");

    let created = api
        .create_note(&NoteDraft {
            title: "Standup".to_string(),
            content: "9:30".to_string(),
            tag: NoteTag::Meeting,
        })
        .await
        .expect("create");
    assert_eq!(created.id, NoteId::new("new-1"));
    assert_eq!(created.tag, NoteTag::Meeting);

    let rejected = api
        .create_note(&NoteDraft {
            title: "x".to_string(),
            content: String::new(),
            tag: NoteTag::Todo,
        })
        .await
        .expect_err("short title");
    assert_eq!(rejected.status(), Some(400));

    let fetched = api.fetch_note(&NoteId::new("abc123")).await.expect("note");
    assert_eq!(fetched.content, "milk, eggs");
}
