//! API integration tests
//!
//! Each test drives the full router in process against the in-memory store.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use library_catalog_server::{
    api::create_router,
    config::AppConfig,
    repository::Repository,
    services::{clock::SystemClock, Services},
    AppState,
};

fn app() -> Router {
    let config = AppConfig::default();
    let services = Services::new(
        Repository::in_memory(),
        config.catalog.clone(),
        config.loans.clone(),
        Arc::new(SystemClock),
    );
    create_router(AppState {
        services: Arc::new(services),
    })
}

/// Send a request and return the status with the decoded JSON body
async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(format!("/api/v1{}", uri));
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_author(app: &Router, name: &str) -> String {
    let (status, body) = send(app, "POST", "/authors", Some(json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn create_book(app: &Router, author_id: &str) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/books",
        Some(json!({
            "title": "Test Book",
            "author_id": author_id,
            "topic": "Test topic",
            "year": 2024
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

#[tokio::test]
async fn test_health_check() {
    let app = app();

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_create_book() {
    let app = app();
    let author_id = create_author(&app, "author_name1").await;

    let book = create_book(&app, &author_id).await;
    assert_eq!(book["title"], "Test Book");
    assert_eq!(book["author_id"], author_id.as_str());
    assert_eq!(book["copies"].as_array().unwrap().len(), 1);
    assert_eq!(book["copies"][0]["is_lost"], false);
}

#[tokio::test]
async fn test_create_book_invalid_input() {
    let app = app();

    let (status, body) = send(&app, "POST", "/books", Some(json!({ "title": "", "author": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 22);
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("title"));
    assert!(message.contains("year"));

    let (status, body) = send(&app, "GET", "/books", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_books"], 0);
}

#[tokio::test]
async fn test_list_books() {
    let app = app();
    let author_id = create_author(&app, "author_name1").await;
    create_book(&app, &author_id).await;
    create_book(&app, &author_id).await;

    let (status, body) = send(&app, "GET", "/books", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_page"], 1);
    assert_eq!(body["total_books"], 2);
    assert_eq!(body["total_pages"], 2);
    assert_eq!(body["books"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/books?author_id={}&limit=10&topic=Test%20topic", author_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["books"].as_array().unwrap().len(), 2);
    assert_eq!(body["filters"]["author_id"], author_id.as_str());
    assert_eq!(body["filters"]["topic"], "Test topic");

    let (_, body) = send(&app, "GET", "/books?year=1900", None).await;
    assert_eq!(body["total_books"], 0);
}

#[tokio::test]
async fn test_get_book_by_id() {
    let app = app();
    let author_id = create_author(&app, "author_name1").await;
    let book = create_book(&app, &author_id).await;
    let book_id = book["id"].as_str().unwrap();

    let (status, body) = send(&app, "GET", &format!("/books/{}", book_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["book"]["id"], book_id);
    assert_eq!(body["author_name"], "author_name1");
    assert_eq!(body["total_non_lost_copies"], 1);
    assert_eq!(body["available_non_lost_copies"], 1);
}

#[tokio::test]
async fn test_get_book_nonexistent_id() {
    let app = app();

    let (status, body) = send(&app, "GET", "/books/nonexistent_id", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 5);

    let (status, _) = send(&app, "GET", "/books/6f1c1d0e-5f1a-4c1b-9a7e-0d3f3c2b1a00", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_loan_and_return_book() {
    let app = app();
    let author_id = create_author(&app, "author_name1").await;
    let book = create_book(&app, &author_id).await;
    let book_id = book["id"].as_str().unwrap();
    let copy_id = book["copies"][0]["id"].as_str().unwrap();

    let (_, reader) = send(&app, "POST", "/readers", Some(json!({ "name": "Reader" }))).await;
    let reader_id = reader["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/books/{}/loan", book_id),
        Some(json!({ "reader_id": reader_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Book loaned successfully");
    assert_eq!(body["loan"]["copy_id"], copy_id);
    assert!(body["loan"]["returned_at"].is_null());

    let (_, loans) = send(&app, "GET", &format!("/readers/{}/loans", reader_id), None).await;
    assert_eq!(loans.as_array().unwrap().len(), 1);

    let (status, body) = send(&app, "PUT", &format!("/books/{}/return", copy_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Book returned successfully");
    assert!(body["loan"]["returned_at"].is_string());

    let (status, _) = send(&app, "PUT", &format!("/books/{}/return", copy_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, history) = send(&app, "GET", &format!("/books/{}/loans", book_id), None).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
    let (_, loans) = send(&app, "GET", &format!("/readers/{}/loans", reader_id), None).await;
    assert!(loans.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_loan_requires_reader_id() {
    let app = app();
    let author_id = create_author(&app, "author_name1").await;
    let book = create_book(&app, &author_id).await;
    let book_id = book["id"].as_str().unwrap();

    let (status, body) = send(&app, "PUT", &format!("/books/{}/loan", book_id), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 22);
}

#[tokio::test]
async fn test_loan_when_no_copy_available() {
    let app = app();
    let author_id = create_author(&app, "author_name1").await;
    let book = create_book(&app, &author_id).await;
    let uri = format!("/books/{}/loan", book["id"].as_str().unwrap());

    let (status, _) = send(&app, "PUT", &uri, Some(json!({ "reader_id": "4b8e2f7a-1c3d-4e5f-8a9b-0c1d2e3f4a5b" }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "PUT", &uri, Some(json!({ "reader_id": "9d7c6b5a-4e3f-4a1b-8c2d-3e4f5a6b7c8d" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 7);
}

#[tokio::test]
async fn test_borrow_limit() {
    let app = app();
    let author_id = create_author(&app, "author_name1").await;
    let reader_id = "4b8e2f7a-1c3d-4e5f-8a9b-0c1d2e3f4a5b";

    for _ in 0..5 {
        let book = create_book(&app, &author_id).await;
        let uri = format!("/books/{}/loan", book["id"].as_str().unwrap());
        let (status, _) = send(&app, "PUT", &uri, Some(json!({ "reader_id": reader_id }))).await;
        assert_eq!(status, StatusCode::OK);
    }

    let book = create_book(&app, &author_id).await;
    let uri = format!("/books/{}/loan", book["id"].as_str().unwrap());
    let (status, body) = send(&app, "PUT", &uri, Some(json!({ "reader_id": reader_id }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 11);
    assert_eq!(body["message"], "Reader already has 5 books borrowed");
}

#[tokio::test]
async fn test_update_book() {
    let app = app();
    let author_id = create_author(&app, "author_name1").await;
    let book = create_book(&app, &author_id).await;
    let uri = format!("/books/{}", book["id"].as_str().unwrap());

    let (status, body) = send(&app, "PUT", &uri, Some(json!({ "title": "Updated Title" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Updated Title");
    assert_eq!(body["topic"], "Test topic");
    assert_eq!(body["year"], 2024);
    assert_eq!(body["copies"], book["copies"]);

    let (status, _) = send(&app, "PUT", &uri, Some(json!({ "year": null }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_book() {
    let app = app();
    let author_id = create_author(&app, "author_name1").await;
    let book = create_book(&app, &author_id).await;
    let book_id = book["id"].as_str().unwrap();
    let copy_id = book["copies"][0]["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/books/{}/loan", book_id),
        Some(json!({ "reader_id": "4b8e2f7a-1c3d-4e5f-8a9b-0c1d2e3f4a5b" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "DELETE", &format!("/books/{}", book_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Book deleted successfully");

    let (status, _) = send(&app, "GET", &format!("/books/{}", book_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "PUT", &format!("/books/{}/return", copy_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", &format!("/books/{}", book_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_copies_lifecycle() {
    let app = app();
    let author_id = create_author(&app, "author_name1").await;
    let book = create_book(&app, &author_id).await;
    let book_id = book["id"].as_str().unwrap();
    let first_copy = book["copies"][0]["id"].as_str().unwrap();

    let (status, copy) = send(&app, "POST", &format!("/books/{}/copies", book_id), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let spare = copy["id"].as_str().unwrap().to_string();

    let (status, copy) = send(
        &app,
        "PUT",
        &format!("/books/{}/copies/{}/lost", book_id, first_copy),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(copy["is_lost"], true);

    let (_, details) = send(&app, "GET", &format!("/books/{}", book_id), None).await;
    assert_eq!(details["total_non_lost_copies"], 1);

    let (_, body) = send(
        &app,
        "PUT",
        &format!("/books/{}/loan", book_id),
        Some(json!({ "reader_id": "4b8e2f7a-1c3d-4e5f-8a9b-0c1d2e3f4a5b" })),
    )
    .await;
    assert_eq!(body["loan"]["copy_id"], spare.as_str());
}

#[tokio::test]
async fn test_authors_and_readers() {
    let app = app();

    let (status, body) = send(&app, "POST", "/authors", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 22);

    let author_id = create_author(&app, "Ursula").await;
    let (status, body) = send(&app, "GET", &format!("/authors/{}", author_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Ursula");

    let (_, authors) = send(&app, "GET", "/authors", None).await;
    assert_eq!(authors.as_array().unwrap().len(), 1);

    let (status, reader) = send(&app, "POST", "/readers", Some(json!({ "name": "Ged" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = send(&app, "GET", &format!("/readers/{}", reader["id"].as_str().unwrap()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Ged");

    let (status, _) = send(&app, "GET", "/readers/unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
