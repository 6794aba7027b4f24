//! Reader endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        ids::ReaderId,
        loan::Loan,
        reader::{CreateReader, Reader},
    },
    AppState,
};

/// Register a reader
#[utoipa::path(
    post,
    path = "/readers",
    tag = "readers",
    request_body = CreateReader,
    responses(
        (status = 201, description = "Reader created", body = Reader),
        (status = 400, description = "Missing name", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_reader(
    State(state): State<AppState>,
    Json(request): Json<CreateReader>,
) -> AppResult<(StatusCode, Json<Reader>)> {
    let reader = state.services.people.create_reader(request).await?;
    Ok((StatusCode::CREATED, Json(reader)))
}

/// List readers
#[utoipa::path(
    get,
    path = "/readers",
    tag = "readers",
    responses(
        (status = 200, description = "All readers", body = Vec<Reader>)
    )
)]
pub async fn list_readers(State(state): State<AppState>) -> AppResult<Json<Vec<Reader>>> {
    let readers = state.services.people.list_readers().await?;
    Ok(Json(readers))
}

/// Get a reader by ID
#[utoipa::path(
    get,
    path = "/readers/{id}",
    tag = "readers",
    params(
        ("id" = String, Path, description = "Reader ID")
    ),
    responses(
        (status = 200, description = "Reader", body = Reader),
        (status = 404, description = "Reader not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_reader(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Reader>> {
    let id: ReaderId = id.parse()?;
    let reader = state.services.people.get_reader(id).await?;
    Ok(Json(reader))
}

/// Open loans of a reader
#[utoipa::path(
    get,
    path = "/readers/{id}/loans",
    tag = "loans",
    params(
        ("id" = String, Path, description = "Reader ID")
    ),
    responses(
        (status = 200, description = "Open loans", body = Vec<Loan>)
    )
)]
pub async fn get_reader_loans(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<Loan>>> {
    let id: ReaderId = id.parse()?;
    let loans = state.services.loans.get_reader_loans(id).await?;
    Ok(Json(loans))
}
