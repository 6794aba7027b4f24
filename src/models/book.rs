//! Book (catalog entry) model and its embedded copies

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::ids::{AuthorId, BookId, CopyId};
use crate::error::{AppError, AppResult};

/// One physical, individually loanable copy of a book.
///
/// Copies are owned by their book and never removed on their own; `is_lost`
/// is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookCopy {
    pub id: CopyId,
    pub is_lost: bool,
}

impl BookCopy {
    /// A fresh copy on the shelf
    pub fn new() -> Self {
        Self {
            id: CopyId::new(),
            is_lost: false,
        }
    }
}

impl Default for BookCopy {
    fn default() -> Self {
        Self::new()
    }
}

/// Book with its ordered copies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author_id: AuthorId,
    pub topic: String,
    pub year: i32,
    pub copies: Vec<BookCopy>,
}

impl Book {
    /// Find a copy of this book by id
    pub fn copy(&self, copy_id: CopyId) -> Option<&BookCopy> {
        self.copies.iter().find(|c| c.id == copy_id)
    }

    pub fn has_copy(&self, copy_id: CopyId) -> bool {
        self.copy(copy_id).is_some()
    }

    /// Copies that have not been reported lost, in copy order
    pub fn non_lost_copies(&self) -> impl Iterator<Item = &BookCopy> {
        self.copies.iter().filter(|c| !c.is_lost)
    }

    /// Overwrite the fields present in `changes`
    pub fn apply(&mut self, changes: &BookChanges) {
        if let Some(ref title) = changes.title {
            self.title = title.clone();
        }
        if let Some(author_id) = changes.author_id {
            self.author_id = author_id;
        }
        if let Some(ref topic) = changes.topic {
            self.topic = topic.clone();
        }
        if let Some(year) = changes.year {
            self.year = year;
        }
    }

    /// Does this book match every criterion set in `filter`?
    pub fn matches(&self, filter: &BookFilter) -> bool {
        filter.author_id.map_or(true, |a| a == self.author_id)
            && filter.topic.as_ref().map_or(true, |t| *t == self.topic)
            && filter.year.map_or(true, |y| y == self.year)
    }
}

/// Initial copy description supplied on creation
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct NewCopy {
    #[serde(default)]
    pub is_lost: bool,
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(required, length(min = 1))]
    pub title: Option<String>,
    #[validate(required)]
    pub author_id: Option<AuthorId>,
    #[validate(required, length(min = 1))]
    pub topic: Option<String>,
    #[validate(required, range(min = 1))]
    pub year: Option<i32>,
    /// Initial copies; one shelf copy is provisioned when empty or absent
    #[serde(default)]
    pub copies: Option<Vec<NewCopy>>,
}

impl CreateBook {
    /// Validate the request and build the book, provisioning copies
    pub fn into_book(self) -> AppResult<Book> {
        self.validate()?;

        let (Some(title), Some(author_id), Some(topic), Some(year)) =
            (self.title, self.author_id, self.topic, self.year)
        else {
            return Err(AppError::MissingFields("title, author_id, topic, year".to_string()));
        };

        let mut copies: Vec<BookCopy> = self
            .copies
            .unwrap_or_default()
            .into_iter()
            .map(|c| BookCopy {
                id: CopyId::new(),
                is_lost: c.is_lost,
            })
            .collect();
        if copies.is_empty() {
            copies.push(BookCopy::new());
        }

        Ok(Book {
            id: BookId::new(),
            title,
            author_id,
            topic,
            year,
            copies,
        })
    }
}

/// Update book request.
///
/// An omitted field is left untouched; a present field overwrites, even when
/// empty. Explicit nulls are rejected.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateBook {
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub title: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub author_id: Option<Option<AuthorId>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>)]
    pub topic: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<i32>)]
    pub year: Option<Option<i32>>,
}

impl UpdateBook {
    pub fn into_changes(self) -> AppResult<BookChanges> {
        let mut nulled = Vec::new();
        let changes = BookChanges {
            title: present(self.title, "title", &mut nulled),
            author_id: present(self.author_id, "author_id", &mut nulled),
            topic: present(self.topic, "topic", &mut nulled),
            year: present(self.year, "year", &mut nulled),
        };

        if !nulled.is_empty() {
            return Err(AppError::Validation(format!(
                "Fields cannot be null: {}",
                nulled.join(", ")
            )));
        }
        Ok(changes)
    }
}

fn present<T>(value: Option<Option<T>>, field: &'static str, nulled: &mut Vec<&'static str>) -> Option<T> {
    match value {
        Some(None) => {
            nulled.push(field);
            None
        }
        other => other.flatten(),
    }
}

/// Validated partial update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookChanges {
    pub title: Option<String>,
    pub author_id: Option<AuthorId>,
    pub topic: Option<String>,
    pub year: Option<i32>,
}

impl BookChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.author_id.is_none() && self.topic.is_none() && self.year.is_none()
    }
}

/// Book list query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    pub author_id: Option<String>,
    pub topic: Option<String>,
    pub year: Option<i32>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Filter criteria for listing books
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    pub author_id: Option<AuthorId>,
    pub topic: Option<String>,
    pub year: Option<i32>,
}

/// One page of books plus the total count matching the filter
#[derive(Debug, Clone)]
pub struct BookPage {
    pub books: Vec<Book>,
    pub total: i64,
}

/// Filters echoed back in list responses
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AppliedFilters {
    pub author_id: Option<String>,
    pub topic: Option<String>,
    pub year: Option<i32>,
}

/// Paginated book list
#[derive(Debug, Serialize, ToSchema)]
pub struct BookList {
    pub books: Vec<Book>,
    pub current_page: i64,
    pub total_pages: i64,
    pub total_books: i64,
    pub filters: AppliedFilters,
}

/// Book with author name and copy counts
#[derive(Debug, Serialize, ToSchema)]
pub struct BookDetails {
    pub book: Book,
    pub author_name: String,
    pub total_non_lost_copies: usize,
    pub available_non_lost_copies: usize,
}
