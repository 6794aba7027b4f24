//! Copy availability, derived from a book and the open entries of the ledger

use std::{collections::HashSet, sync::Arc};

use crate::{
    error::AppResult,
    models::{
        book::{Book, BookCopy},
        ids::CopyId,
    },
    repository::LoanStore,
};

/// Snapshot of which copies of a book can be lent.
///
/// `available ⊆ non_lost`, and no available copy is in `on_loan`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    pub non_lost: Vec<BookCopy>,
    pub on_loan: HashSet<CopyId>,
    pub available: Vec<BookCopy>,
}

impl Availability {
    /// Combine a book with the set of its copies that have an open loan
    pub fn from_parts(book: &Book, open: &HashSet<CopyId>) -> Self {
        let non_lost: Vec<BookCopy> = book.non_lost_copies().cloned().collect();
        let on_loan: HashSet<CopyId> = non_lost
            .iter()
            .map(|c| c.id)
            .filter(|id| open.contains(id))
            .collect();
        let available = non_lost
            .iter()
            .filter(|c| !on_loan.contains(&c.id))
            .cloned()
            .collect();

        Self {
            non_lost,
            on_loan,
            available,
        }
    }

    /// Copy to lend next: the first available one in copy order
    pub fn first_available(&self) -> Option<&BookCopy> {
        self.available.first()
    }
}

/// Reads the ledger to compute [`Availability`]. Has no side effects; the answer
/// may be stale as soon as it is returned.
#[derive(Clone)]
pub struct AvailabilityResolver {
    loans: Arc<dyn LoanStore>,
}

impl AvailabilityResolver {
    pub fn new(loans: Arc<dyn LoanStore>) -> Self {
        Self { loans }
    }

    pub async fn resolve(&self, book: &Book) -> AppResult<Availability> {
        let ids: Vec<CopyId> = book.non_lost_copies().map(|c| c.id).collect();
        let open = self.loans.open_copy_ids(&ids).await?;
        Ok(Availability::from_parts(book, &open))
    }
}
