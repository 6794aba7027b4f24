//! Book, copy and loan endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookCopy, BookDetails, BookList, BookQuery, CreateBook, UpdateBook},
        ids::{BookId, CopyId, ReaderId},
        loan::{Loan, LoanRequest},
    },
    AppState,
};

/// Confirmation message
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Loan or return confirmation with the ledger entry
#[derive(Serialize, ToSchema)]
pub struct LoanResponse {
    pub message: String,
    pub loan: Loan,
}

/// Create a new book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Missing required fields", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    Json(request): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let book = state.services.catalog.create_book(request).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// List books with filters and pagination
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(BookQuery),
    responses(
        (status = 200, description = "Page of books", body = BookList)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<BookList>> {
    let list = state.services.catalog.list_books(&query).await?;
    Ok(Json(list))
}

/// Get a book with its author name and copy counts
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = String, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = BookDetails),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<BookDetails>> {
    let id: BookId = id.parse()?;
    let details = state.services.catalog.get_book_details(id).await?;
    Ok(Json(details))
}

/// Update the fields present in the body
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = String, Path, description = "Book ID")
    ),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Required field set to null", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateBook>,
) -> AppResult<Json<Book>> {
    let id: BookId = id.parse()?;
    let book = state.services.catalog.update_book(id, request).await?;
    Ok(Json(book))
}

/// Delete a book and its loan history
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = String, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book deleted", body = MessageResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id: BookId = id.parse()?;
    state.services.catalog.delete_book(id).await?;
    Ok(Json(MessageResponse {
        message: "Book deleted successfully".to_string(),
    }))
}

/// Lend an available copy of a book to a reader
#[utoipa::path(
    put,
    path = "/books/{id}/loan",
    tag = "loans",
    params(
        ("id" = String, Path, description = "Book ID")
    ),
    request_body = LoanRequest,
    responses(
        (status = 200, description = "Copy loaned", body = LoanResponse),
        (status = 400, description = "No copy available or borrow limit reached", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn loan_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<LoanRequest>,
) -> AppResult<Json<LoanResponse>> {
    let book_id: BookId = id.parse()?;
    let reader_id: ReaderId = request
        .reader_id
        .ok_or_else(|| AppError::MissingFields("reader_id".to_string()))?
        .parse()?;

    let loan = state.services.loans.loan_copy(book_id, reader_id).await?;
    Ok(Json(LoanResponse {
        message: "Book loaned successfully".to_string(),
        loan,
    }))
}

/// Return a loaned copy. The path carries a copy id, not a book id.
#[utoipa::path(
    put,
    path = "/books/{id}/return",
    tag = "loans",
    params(
        ("id" = String, Path, description = "Copy ID")
    ),
    responses(
        (status = 200, description = "Copy returned", body = LoanResponse),
        (status = 404, description = "No open loan for this copy", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<LoanResponse>> {
    let copy_id: CopyId = id.parse()?;
    let loan = state.services.loans.return_copy(copy_id).await?;
    Ok(Json(LoanResponse {
        message: "Book returned successfully".to_string(),
        loan,
    }))
}

/// Loan history of a book
#[utoipa::path(
    get,
    path = "/books/{id}/loans",
    tag = "loans",
    params(
        ("id" = String, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Loan records, oldest first", body = Vec<Loan>),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_book_loans(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<Loan>>> {
    let id: BookId = id.parse()?;
    let loans = state.services.loans.get_book_loans(id).await?;
    Ok(Json(loans))
}

/// Add a copy to a book
#[utoipa::path(
    post,
    path = "/books/{id}/copies",
    tag = "books",
    params(
        ("id" = String, Path, description = "Book ID")
    ),
    responses(
        (status = 201, description = "Copy added", body = BookCopy),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn add_copy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<(StatusCode, Json<BookCopy>)> {
    let id: BookId = id.parse()?;
    let copy = state.services.catalog.add_copy(id).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}

/// Report a copy as lost
#[utoipa::path(
    put,
    path = "/books/{id}/copies/{copy_id}/lost",
    tag = "books",
    params(
        ("id" = String, Path, description = "Book ID"),
        ("copy_id" = String, Path, description = "Copy ID")
    ),
    responses(
        (status = 200, description = "Copy marked lost", body = BookCopy),
        (status = 404, description = "Book or copy not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn mark_copy_lost(
    State(state): State<AppState>,
    Path((id, copy_id)): Path<(String, String)>,
) -> AppResult<Json<BookCopy>> {
    let id: BookId = id.parse()?;
    let copy_id: CopyId = copy_id.parse()?;
    let copy = state.services.catalog.mark_copy_lost(id, copy_id).await?;
    Ok(Json(copy))
}
