//! Loan ledger entry and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::ids::{BookId, CopyId, LoanId, ReaderId};

/// One entry of the loan ledger.
///
/// An entry with no `returned_at` is an open loan. Entries are created once and
/// closed at most once; a copy accumulates a history of closed entries and at
/// most one open entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: LoanId,
    pub book_id: BookId,
    pub reader_id: ReaderId,
    pub copy_id: CopyId,
    pub loaned_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    /// Reserved, not computed yet
    pub due_date: Option<DateTime<Utc>>,
}

impl Loan {
    /// Open a new ledger entry for `copy_id`
    pub fn open(book_id: BookId, reader_id: ReaderId, copy_id: CopyId, loaned_at: DateTime<Utc>) -> Self {
        Self {
            id: LoanId::new(),
            book_id,
            reader_id,
            copy_id,
            loaned_at,
            returned_at: None,
            due_date: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }
}

/// Loan request body
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoanRequest {
    /// Reader borrowing the book
    pub reader_id: Option<String>,
}
