//! Loans repository: the append-mostly loan ledger

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        ids::{BookId, CopyId, ReaderId},
        loan::Loan,
    },
};

/// Result of a guarded loan insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenLoanOutcome {
    /// The entry was written
    Opened(Loan),
    /// The copy already has an open loan, or was lost in the meantime
    CopyTaken,
    /// The reader holds `open` loans, which is at or over the limit
    ReaderAtLimit { open: i64 },
}

/// Loan ledger persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoanStore: Send + Sync {
    /// Ids among `copy_ids` that currently have an open loan
    async fn open_copy_ids(&self, copy_ids: &[CopyId]) -> AppResult<HashSet<CopyId>>;

    /// Number of open loans held by a reader across all books
    async fn count_open_by_reader(&self, reader_id: ReaderId) -> AppResult<i64>;

    /// Append `loan` as one atomic check-and-insert.
    ///
    /// The entry is written only if the book still exists (else `NotFound`), the
    /// copy belongs to it (else `Validation`), the copy is not lost and has no
    /// open loan, and the reader holds fewer than `max_open_per_reader` open loans.
    async fn open_loan(&self, loan: &Loan, max_open_per_reader: i64) -> AppResult<OpenLoanOutcome>;

    /// Close the open loan of a copy, leaving closed history untouched
    async fn close_open_loan(&self, copy_id: CopyId, returned_at: DateTime<Utc>) -> AppResult<Option<Loan>>;

    /// Full history for a book, oldest first
    async fn list_by_book(&self, book_id: BookId) -> AppResult<Vec<Loan>>;

    async fn list_open_by_reader(&self, reader_id: ReaderId) -> AppResult<Vec<Loan>>;
}

const LOAN_COLUMNS: &str = "id, book_id, reader_id, copy_id, loaned_at, returned_at, due_date";

#[derive(Clone)]
pub struct PgLoanStore {
    pool: Pool<Postgres>,
}

impl PgLoanStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoanStore for PgLoanStore {
    async fn open_copy_ids(&self, copy_ids: &[CopyId]) -> AppResult<HashSet<CopyId>> {
        if copy_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let ids: Vec<Uuid> = copy_ids.iter().map(|id| id.0).collect();

        let open = sqlx::query_scalar::<_, CopyId>(
            "SELECT copy_id FROM loans WHERE copy_id = ANY($1) AND returned_at IS NULL",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(open.into_iter().collect())
    }

    async fn count_open_by_reader(&self, reader_id: ReaderId) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE reader_id = $1 AND returned_at IS NULL",
        )
        .bind(reader_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn open_loan(&self, loan: &Loan, max_open_per_reader: i64) -> AppResult<OpenLoanOutcome> {
        let mut tx = self.pool.begin().await?;

        // Serialises loans of the same reader so the count below stays valid until commit
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(loan.reader_id)
            .execute(&mut *tx)
            .await?;

        // Shared row lock: a concurrent delete of this book waits for us, or we see it gone
        let book_exists = sqlx::query_scalar::<_, BookId>("SELECT id FROM books WHERE id = $1 FOR SHARE")
            .bind(loan.book_id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !book_exists {
            return Err(loan.book_id.not_found());
        }

        // FOR SHARE: a concurrent mark-lost waits until this loan commits or rolls back
        let is_lost: Option<bool> = sqlx::query_scalar(
            "SELECT is_lost FROM book_copies WHERE book_id = $1 AND id = $2 FOR SHARE",
        )
        .bind(loan.book_id)
        .bind(loan.copy_id)
        .fetch_optional(&mut *tx)
        .await?;

        match is_lost {
            None => {
                return Err(AppError::Validation(format!(
                    "Copy {} does not exist in book {}",
                    loan.copy_id, loan.book_id
                )))
            }
            Some(true) => return Ok(OpenLoanOutcome::CopyTaken),
            Some(false) => {}
        }

        let open: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE reader_id = $1 AND returned_at IS NULL",
        )
        .bind(loan.reader_id)
        .fetch_one(&mut *tx)
        .await?;
        if open >= max_open_per_reader {
            return Ok(OpenLoanOutcome::ReaderAtLimit { open });
        }

        let inserted = sqlx::query_as::<_, Loan>(&format!(
            r#"
            INSERT INTO loans (id, book_id, reader_id, copy_id, loaned_at, returned_at, due_date)
            VALUES ($1, $2, $3, $4, $5, NULL, $6)
            ON CONFLICT (copy_id) WHERE returned_at IS NULL DO NOTHING
            RETURNING {}
            "#,
            LOAN_COLUMNS
        ))
        .bind(loan.id)
        .bind(loan.book_id)
        .bind(loan.reader_id)
        .bind(loan.copy_id)
        .bind(loan.loaned_at)
        .bind(loan.due_date)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(inserted) = inserted else {
            return Ok(OpenLoanOutcome::CopyTaken);
        };

        tx.commit().await?;
        Ok(OpenLoanOutcome::Opened(inserted))
    }

    async fn close_open_loan(&self, copy_id: CopyId, returned_at: DateTime<Utc>) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(&format!(
            "UPDATE loans SET returned_at = $2 WHERE copy_id = $1 AND returned_at IS NULL RETURNING {}",
            LOAN_COLUMNS
        ))
        .bind(copy_id)
        .bind(returned_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(loan)
    }

    async fn list_by_book(&self, book_id: BookId) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans WHERE book_id = $1 ORDER BY loaned_at, id",
            LOAN_COLUMNS
        ))
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }

    async fn list_open_by_reader(&self, reader_id: ReaderId) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans WHERE reader_id = $1 AND returned_at IS NULL ORDER BY loaned_at, id",
            LOAN_COLUMNS
        ))
        .bind(reader_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }
}
