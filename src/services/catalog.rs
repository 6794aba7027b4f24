//! Catalog management service

use crate::{
    config::CatalogConfig,
    error::{AppError, AppResult},
    models::{
        book::{AppliedFilters, Book, BookCopy, BookDetails, BookFilter, BookList, BookQuery, CreateBook, UpdateBook},
        ids::{AuthorId, BookId, CopyId},
    },
    repository::Repository,
};

use super::availability::AvailabilityResolver;

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    availability: AvailabilityResolver,
    config: CatalogConfig,
}

impl CatalogService {
    pub fn new(repository: Repository, config: CatalogConfig) -> Self {
        Self {
            availability: AvailabilityResolver::new(repository.loans.clone()),
            repository,
            config,
        }
    }

    /// Create a book; a book always starts with at least one copy
    pub async fn create_book(&self, request: CreateBook) -> AppResult<Book> {
        let book = request.into_book()?;
        self.repository.books.insert(&book).await?;
        tracing::info!("Created book {} with {} copies", book.id, book.copies.len());
        Ok(book)
    }

    pub async fn get_book(&self, id: BookId) -> AppResult<Book> {
        self.repository
            .books
            .get(id)
            .await?
            .ok_or_else(|| id.not_found())
    }

    /// Book with its author's name and copy counts
    pub async fn get_book_details(&self, id: BookId) -> AppResult<BookDetails> {
        let book = self.get_book(id).await?;
        let availability = self.availability.resolve(&book).await?;
        let author_name = self
            .repository
            .people
            .get_author(book.author_id)
            .await?
            .map(|a| a.name)
            .unwrap_or_else(|| "Author not found".to_string());

        Ok(BookDetails {
            author_name,
            total_non_lost_copies: availability.non_lost.len(),
            available_non_lost_copies: availability.available.len(),
            book,
        })
    }

    /// Overwrite the fields present in the request
    pub async fn update_book(&self, id: BookId, request: UpdateBook) -> AppResult<Book> {
        let changes = request.into_changes()?;
        if changes.is_empty() {
            return self.get_book(id).await;
        }

        self.repository
            .books
            .update(id, &changes)
            .await?
            .ok_or_else(|| id.not_found())
    }

    /// Delete a book together with its whole loan history
    pub async fn delete_book(&self, id: BookId) -> AppResult<()> {
        if !self.repository.books.delete_cascade(id).await? {
            return Err(id.not_found());
        }
        tracing::info!("Deleted book {}", id);
        Ok(())
    }

    /// Filter and paginate books in storage order
    pub async fn list_books(&self, query: &BookQuery) -> AppResult<BookList> {
        let page = query.page.filter(|p| *p >= 1).unwrap_or(self.config.default_page);
        let limit = query
            .limit
            .filter(|l| *l >= 1)
            .unwrap_or(self.config.default_page_size);

        let author_id = query.author_id.clone().filter(|a| !a.is_empty());
        let topic = query.topic.clone().filter(|t| !t.is_empty());
        let filters = AppliedFilters {
            author_id: author_id.clone(),
            topic: topic.clone(),
            year: query.year,
        };

        let author_id = match author_id.map(|raw| raw.parse::<AuthorId>()) {
            Some(Err(_)) => {
                // A malformed author id cannot match any book
                return Ok(BookList {
                    books: Vec::new(),
                    current_page: page,
                    total_pages: 0,
                    total_books: 0,
                    filters,
                });
            }
            Some(Ok(id)) => Some(id),
            None => None,
        };

        let filter = BookFilter {
            author_id,
            topic,
            year: query.year,
        };
        let offset = (page - 1).saturating_mul(limit);
        let result = self.repository.books.list(&filter, offset, limit).await?;

        Ok(BookList {
            books: result.books,
            current_page: page,
            total_pages: result.total / limit + i64::from(result.total % limit != 0),
            total_books: result.total,
            filters,
        })
    }

    /// Append a fresh copy to a book
    pub async fn add_copy(&self, book_id: BookId) -> AppResult<BookCopy> {
        let copy = BookCopy::new();
        if !self.repository.books.add_copy(book_id, &copy).await? {
            return Err(book_id.not_found());
        }
        tracing::info!("Added copy {} to book {}", copy.id, book_id);
        Ok(copy)
    }

    /// Report a copy lost. Lost copies are never lent again.
    pub async fn mark_copy_lost(&self, book_id: BookId, copy_id: CopyId) -> AppResult<BookCopy> {
        let copy = self
            .repository
            .books
            .mark_copy_lost(book_id, copy_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Copy {} not found in book {}", copy_id, book_id))
            })?;
        tracing::info!("Copy {} of book {} marked lost", copy_id, book_id);
        Ok(copy)
    }
}
