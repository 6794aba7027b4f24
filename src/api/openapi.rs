//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{authors, books, health, readers};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Library Catalog API",
        version = "1.0.0",
        description = "Books, copies, authors, readers and loans",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        books::add_copy,
        books::mark_copy_lost,
        // Loans
        books::loan_book,
        books::return_book,
        books::list_book_loans,
        readers::get_reader_loans,
        // Authors
        authors::list_authors,
        authors::get_author,
        authors::create_author,
        // Readers
        readers::list_readers,
        readers::get_reader,
        readers::create_reader,
    ),
    components(
        schemas(
            // Identifiers
            crate::models::ids::BookId,
            crate::models::ids::CopyId,
            crate::models::ids::LoanId,
            crate::models::ids::AuthorId,
            crate::models::ids::ReaderId,
            // Books
            crate::models::book::Book,
            crate::models::book::BookCopy,
            crate::models::book::NewCopy,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::book::BookQuery,
            crate::models::book::BookList,
            crate::models::book::AppliedFilters,
            crate::models::book::BookDetails,
            books::MessageResponse,
            // Loans
            crate::models::loan::Loan,
            crate::models::loan::LoanRequest,
            books::LoanResponse,
            // People
            crate::models::author::Author,
            crate::models::author::CreateAuthor,
            crate::models::reader::Reader,
            crate::models::reader::CreateReader,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Catalog and copy management"),
        (name = "loans", description = "Loan management"),
        (name = "authors", description = "Author records"),
        (name = "readers", description = "Reader records")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
