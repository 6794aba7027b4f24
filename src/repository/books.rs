//! Books repository: catalog entries and their embedded copies

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgConnection, Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        book::{Book, BookChanges, BookCopy, BookFilter, BookPage},
        ids::{AuthorId, BookId, CopyId},
    },
};

/// Catalog persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Check that the store is reachable
    async fn ping(&self) -> AppResult<()>;

    /// Insert a book together with its copies
    async fn insert(&self, book: &Book) -> AppResult<()>;

    async fn get(&self, id: BookId) -> AppResult<Option<Book>>;

    /// Overwrite the fields present in `changes`, returning the updated book
    async fn update(&self, id: BookId, changes: &BookChanges) -> AppResult<Option<Book>>;

    /// Delete the book and every loan referencing it or its copies, as one unit.
    /// Returns false when the book does not exist.
    async fn delete_cascade(&self, id: BookId) -> AppResult<bool>;

    /// Filtered page in storage order
    async fn list(&self, filter: &BookFilter, offset: i64, limit: i64) -> AppResult<BookPage>;

    /// Append a copy to a book. Returns false when the book does not exist.
    async fn add_copy(&self, book_id: BookId, copy: &BookCopy) -> AppResult<bool>;

    /// Flag a copy of the given book as lost
    async fn mark_copy_lost(&self, book_id: BookId, copy_id: CopyId) -> AppResult<Option<BookCopy>>;
}

#[derive(FromRow)]
struct BookRow {
    id: BookId,
    title: String,
    author_id: AuthorId,
    topic: String,
    year: i32,
}

impl BookRow {
    fn into_book(self, copies: Vec<BookCopy>) -> Book {
        Book {
            id: self.id,
            title: self.title,
            author_id: self.author_id,
            topic: self.topic,
            year: self.year,
            copies,
        }
    }
}

#[derive(FromRow)]
struct CopyRow {
    book_id: BookId,
    id: CopyId,
    is_lost: bool,
}

#[derive(Clone)]
pub struct PgBookStore {
    pool: Pool<Postgres>,
}

impl PgBookStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Load copies for a set of books, keeping insertion order per book
    async fn load_copies(
        conn: &mut PgConnection,
        book_ids: &[BookId],
    ) -> AppResult<HashMap<BookId, Vec<BookCopy>>> {
        let ids: Vec<Uuid> = book_ids.iter().map(|id| id.0).collect();

        let rows = sqlx::query_as::<_, CopyRow>(
            "SELECT book_id, id, is_lost FROM book_copies WHERE book_id = ANY($1) ORDER BY seq",
        )
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut copies: HashMap<BookId, Vec<BookCopy>> = HashMap::new();
        for row in rows {
            copies.entry(row.book_id).or_default().push(BookCopy {
                id: row.id,
                is_lost: row.is_lost,
            });
        }
        Ok(copies)
    }
}

#[async_trait]
impl BookStore for PgBookStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert(&self, book: &Book) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO books (id, title, author_id, topic, year) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(book.id)
        .bind(&book.title)
        .bind(book.author_id)
        .bind(&book.topic)
        .bind(book.year)
        .execute(&mut *tx)
        .await?;

        for copy in &book.copies {
            sqlx::query("INSERT INTO book_copies (id, book_id, is_lost) VALUES ($1, $2, $3)")
                .bind(copy.id)
                .bind(book.id)
                .bind(copy.is_lost)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: BookId) -> AppResult<Option<Book>> {
        let mut conn = self.pool.acquire().await?;

        let Some(row) = sqlx::query_as::<_, BookRow>(
            "SELECT id, title, author_id, topic, year FROM books WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        else {
            return Ok(None);
        };

        let mut copies = Self::load_copies(&mut *conn, &[id]).await?;
        Ok(Some(row.into_book(copies.remove(&id).unwrap_or_default())))
    }

    async fn update(&self, id: BookId, changes: &BookChanges) -> AppResult<Option<Book>> {
        let mut conn = self.pool.acquire().await?;

        let Some(row) = sqlx::query_as::<_, BookRow>(
            r#"
            UPDATE books SET
                title = COALESCE($2, title),
                author_id = COALESCE($3, author_id),
                topic = COALESCE($4, topic),
                year = COALESCE($5, year)
            WHERE id = $1
            RETURNING id, title, author_id, topic, year
            "#,
        )
        .bind(id)
        .bind(&changes.title)
        .bind(changes.author_id)
        .bind(&changes.topic)
        .bind(changes.year)
        .fetch_optional(&mut *conn)
        .await?
        else {
            return Ok(None);
        };

        let mut copies = Self::load_copies(&mut *conn, &[id]).await?;
        Ok(Some(row.into_book(copies.remove(&id).unwrap_or_default())))
    }

    async fn delete_cascade(&self, id: BookId) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        // Blocks until in-flight loan inserts holding FOR SHARE on this row commit
        let exists = sqlx::query_scalar::<_, BookId>("SELECT id FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();

        if !exists {
            return Ok(false);
        }

        let removed = sqlx::query(
            r#"
            DELETE FROM loans
            WHERE book_id = $1
               OR copy_id IN (SELECT id FROM book_copies WHERE book_id = $1)
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!("Deleted book {} and {} loan records", id, removed);
        Ok(true)
    }

    async fn list(&self, filter: &BookFilter, offset: i64, limit: i64) -> AppResult<BookPage> {
        let mut conn = self.pool.acquire().await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM books
            WHERE ($1::uuid IS NULL OR author_id = $1)
              AND ($2::text IS NULL OR topic = $2)
              AND ($3::int IS NULL OR year = $3)
            "#,
        )
        .bind(filter.author_id)
        .bind(&filter.topic)
        .bind(filter.year)
        .fetch_one(&mut *conn)
        .await?;

        let rows = sqlx::query_as::<_, BookRow>(
            r#"
            SELECT id, title, author_id, topic, year FROM books
            WHERE ($1::uuid IS NULL OR author_id = $1)
              AND ($2::text IS NULL OR topic = $2)
              AND ($3::int IS NULL OR year = $3)
            ORDER BY seq
            OFFSET $4 LIMIT $5
            "#,
        )
        .bind(filter.author_id)
        .bind(&filter.topic)
        .bind(filter.year)
        .bind(offset)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        let ids: Vec<BookId> = rows.iter().map(|r| r.id).collect();
        let mut copies = Self::load_copies(&mut *conn, &ids).await?;

        let books = rows
            .into_iter()
            .map(|row| {
                let book_copies = copies.remove(&row.id).unwrap_or_default();
                row.into_book(book_copies)
            })
            .collect();

        Ok(BookPage { books, total })
    }

    async fn add_copy(&self, book_id: BookId, copy: &BookCopy) -> AppResult<bool> {
        let inserted = sqlx::query(
            "INSERT INTO book_copies (id, book_id, is_lost) SELECT $1, id, $2 FROM books WHERE id = $3",
        )
        .bind(copy.id)
        .bind(copy.is_lost)
        .bind(book_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(inserted == 1)
    }

    async fn mark_copy_lost(&self, book_id: BookId, copy_id: CopyId) -> AppResult<Option<BookCopy>> {
        let copy = sqlx::query_as::<_, BookCopy>(
            "UPDATE book_copies SET is_lost = TRUE WHERE book_id = $1 AND id = $2 RETURNING id, is_lost",
        )
        .bind(book_id)
        .bind(copy_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(copy)
    }
}

