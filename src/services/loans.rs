//! Loan management service: borrowing policy on top of the ledger

use std::sync::Arc;

use crate::{
    config::LoansConfig,
    error::{AppError, AppResult},
    models::{
        ids::{BookId, CopyId, ReaderId},
        loan::Loan,
    },
    repository::{OpenLoanOutcome, Repository},
};

use super::{availability::AvailabilityResolver, clock::Clock};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    availability: AvailabilityResolver,
    clock: Arc<dyn Clock>,
    max_books_borrowed: u32,
}

impl LoansService {
    pub fn new(repository: Repository, config: LoansConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            availability: AvailabilityResolver::new(repository.loans.clone()),
            repository,
            clock,
            max_books_borrowed: config.max_books_borrowed,
        }
    }

    /// Lend the first available copy of a book to a reader.
    ///
    /// Copy choice is deterministic: the first non-lost copy, in copy order, with
    /// no open loan. The insert is guarded by the store; when another request
    /// takes the chosen copy first, availability is resolved again.
    pub async fn loan_copy(&self, book_id: BookId, reader_id: ReaderId) -> AppResult<Loan> {
        let limit = i64::from(self.max_books_borrowed);
        let mut book = self
            .repository
            .books
            .get(book_id)
            .await?
            .ok_or_else(|| book_id.not_found())?;

        let mut attempts = 0;
        loop {
            let availability = self.availability.resolve(&book).await?;
            let Some(copy) = availability.first_available() else {
                return Err(AppError::NoCopyAvailable(format!(
                    "Book {} is not available",
                    book_id
                )));
            };

            let open = self.repository.loans.count_open_by_reader(reader_id).await?;
            if open >= limit {
                return Err(AppError::BorrowLimitExceeded {
                    limit: self.max_books_borrowed,
                });
            }

            let loan = Loan::open(book.id, reader_id, copy.id, self.clock.now());
            match self.repository.loans.open_loan(&loan, limit).await? {
                OpenLoanOutcome::Opened(loan) => {
                    tracing::info!(
                        "Loaned copy {} of book {} to reader {}",
                        loan.copy_id, loan.book_id, loan.reader_id
                    );
                    return Ok(loan);
                }
                OpenLoanOutcome::ReaderAtLimit { open } => {
                    tracing::debug!("Reader {} reached {} open loans concurrently", reader_id, open);
                    return Err(AppError::BorrowLimitExceeded {
                        limit: self.max_books_borrowed,
                    });
                }
                OpenLoanOutcome::CopyTaken => {
                    attempts += 1;
                    if attempts > book.copies.len() {
                        tracing::warn!("Giving up on book {} after {} contended attempts", book_id, attempts);
                        return Err(AppError::NoCopyAvailable(format!(
                            "Book {} is not available",
                            book_id
                        )));
                    }
                    tracing::debug!("Copy {} was taken concurrently, selecting again", loan.copy_id);
                    book = self
                        .repository
                        .books
                        .get(book_id)
                        .await?
                        .ok_or_else(|| book_id.not_found())?;
                }
            }
        }
    }

    /// Close the open loan of a copy. The id is a copy id, not a book id.
    pub async fn return_copy(&self, copy_id: CopyId) -> AppResult<Loan> {
        let loan = self
            .repository
            .loans
            .close_open_loan(copy_id, self.clock.now())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No open loan for copy {}", copy_id)))?;

        tracing::info!("Copy {} returned by reader {}", copy_id, loan.reader_id);
        Ok(loan)
    }

    /// Loan history of a book, open and closed
    pub async fn get_book_loans(&self, book_id: BookId) -> AppResult<Vec<Loan>> {
        self.repository
            .books
            .get(book_id)
            .await?
            .ok_or_else(|| book_id.not_found())?;
        self.repository.loans.list_by_book(book_id).await
    }

    /// Open loans of a reader
    pub async fn get_reader_loans(&self, reader_id: ReaderId) -> AppResult<Vec<Loan>> {
        self.repository.loans.list_open_by_reader(reader_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            book::{Book, BookCopy},
            ids::AuthorId,
        },
        repository::{books::MockBookStore, loans::MockLoanStore, people::MockPeopleStore},
        services::clock::FixedClock,
    };
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;
    use tokio_test::{assert_err, assert_ok};

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()))
    }

    fn service(repository: &Repository) -> LoansService {
        LoansService::new(repository.clone(), LoansConfig::default(), clock())
    }

    async fn shelve(repository: &Repository, lost: &[bool]) -> Book {
        let book = Book {
            id: BookId::new(),
            title: "Test Book".into(),
            author_id: AuthorId::new(),
            topic: "Test topic".into(),
            year: 2024,
            copies: lost
                .iter()
                .map(|&is_lost| BookCopy {
                    id: CopyId::new(),
                    is_lost,
                })
                .collect(),
        };
        repository.books.insert(&book).await.unwrap();
        book
    }

    #[tokio::test]
    async fn test_single_copy_scenario() {
        let repository = Repository::in_memory();
        let loans = service(&repository);
        let book = shelve(&repository, &[false]).await;
        let c1 = book.copies[0].id;
        let (r1, r2) = (ReaderId::new(), ReaderId::new());

        let l1 = loans.loan_copy(book.id, r1).await.unwrap();
        assert_eq!(l1.copy_id, c1);
        assert!(l1.is_open());
        assert_eq!(l1.loaned_at, clock().now());

        let err = loans.loan_copy(book.id, r2).await.unwrap_err();
        assert!(matches!(err, AppError::NoCopyAvailable(_)));

        let returned = loans.return_copy(c1).await.unwrap();
        assert_eq!(returned.id, l1.id);
        assert!(!returned.is_open());

        let l2 = loans.loan_copy(book.id, r2).await.unwrap();
        assert_eq!(l2.copy_id, c1);
        assert_ne!(l2.id, l1.id);

        let history = loans.get_book_loans(book.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.iter().filter(|l| l.is_open()).count(), 1);
    }

    #[tokio::test]
    async fn test_borrow_limit() {
        let repository = Repository::in_memory();
        let loans = service(&repository);
        let reader = ReaderId::new();

        let mut taken = Vec::new();
        for _ in 0..5 {
            let book = shelve(&repository, &[false]).await;
            taken.push(assert_ok!(loans.loan_copy(book.id, reader).await));
        }

        let sixth = shelve(&repository, &[false]).await;
        let err = loans.loan_copy(sixth.id, reader).await.unwrap_err();
        assert!(matches!(err, AppError::BorrowLimitExceeded { limit: 5 }));

        assert_ok!(loans.return_copy(taken[0].copy_id).await);
        assert_eq!(loans.get_reader_loans(reader).await.unwrap().len(), 4);
        assert_ok!(loans.loan_copy(sixth.id, reader).await);
    }

    #[tokio::test]
    async fn test_no_copy_checked_before_limit() {
        let repository = Repository::in_memory();
        let loans = service(&repository);
        let reader = ReaderId::new();
        for _ in 0..5 {
            let book = shelve(&repository, &[false]).await;
            loans.loan_copy(book.id, reader).await.unwrap();
        }

        let lost = shelve(&repository, &[true]).await;
        let err = loans.loan_copy(lost.id, reader).await.unwrap_err();
        assert!(matches!(err, AppError::NoCopyAvailable(_)));
    }

    #[tokio::test]
    async fn test_skips_lost_and_loaned_copies() {
        let repository = Repository::in_memory();
        let loans = service(&repository);
        let book = shelve(&repository, &[true, false, false]).await;

        let first = loans.loan_copy(book.id, ReaderId::new()).await.unwrap();
        let second = loans.loan_copy(book.id, ReaderId::new()).await.unwrap();

        assert_eq!(first.copy_id, book.copies[1].id);
        assert_eq!(second.copy_id, book.copies[2].id);
        assert_err!(loans.loan_copy(book.id, ReaderId::new()).await);
    }

    #[tokio::test]
    async fn test_return_twice() {
        let repository = Repository::in_memory();
        let loans = service(&repository);
        let book = shelve(&repository, &[false]).await;
        let copy = book.copies[0].id;

        let err = loans.return_copy(copy).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        loans.loan_copy(book.id, ReaderId::new()).await.unwrap();
        assert_ok!(loans.return_copy(copy).await);
        let err = loans.return_copy(copy).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unknown_book() {
        let repository = Repository::in_memory();
        let loans = service(&repository);

        let err = loans.loan_copy(BookId::new(), ReaderId::new()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = loans.get_book_loans(BookId::new()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_loans_single_copy() {
        let repository = Repository::in_memory();
        let loans = service(&repository);
        let book = shelve(&repository, &[false]).await;

        let book_id = book.id;
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let loans = loans.clone();
                tokio::spawn(async move { loans.loan_copy(book_id, ReaderId::new()).await })
            })
            .collect();

        let mut opened = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => opened += 1,
                Err(AppError::NoCopyAvailable(_)) => {}
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }

        assert_eq!(opened, 1);
        let open = repository.loans.open_copy_ids(&[book.copies[0].id]).await.unwrap();
        assert_eq!(open.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_loans_distinct_copies() {
        let repository = Repository::in_memory();
        let loans = service(&repository);
        let book = shelve(&repository, &[false, false, false]).await;

        let book_id = book.id;
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let loans = loans.clone();
                tokio::spawn(async move { loans.loan_copy(book_id, ReaderId::new()).await })
            })
            .collect();

        let mut copies = HashSet::new();
        for handle in handles {
            if let Ok(loan) = handle.await.unwrap() {
                assert!(copies.insert(loan.copy_id), "copy lent twice");
            }
        }
        assert_eq!(copies.len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_loans_respect_limit() {
        let repository = Repository::in_memory();
        let loans = service(&repository);
        let reader = ReaderId::new();

        let mut books = Vec::new();
        for _ in 0..10 {
            books.push(shelve(&repository, &[false]).await);
        }

        let handles: Vec<_> = books
            .iter()
            .map(|book| {
                let loans = loans.clone();
                let book_id = book.id;
                tokio::spawn(async move { loans.loan_copy(book_id, reader).await })
            })
            .collect();

        let mut opened = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => opened += 1,
                Err(AppError::BorrowLimitExceeded { .. }) => {}
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }

        assert_eq!(opened, 5);
        assert_eq!(repository.loans.count_open_by_reader(reader).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_storage_failure_passes_through() {
        let mut books = MockBookStore::new();
        books
            .expect_get()
            .returning(|_| Err(AppError::Database(sqlx::Error::PoolTimedOut)));
        let repository = Repository::from_stores(
            Arc::new(books),
            Arc::new(MockLoanStore::new()),
            Arc::new(MockPeopleStore::new()),
        );

        let err = service(&repository)
            .loan_copy(BookId::new(), ReaderId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Database(sqlx::Error::PoolTimedOut)));
    }

    #[tokio::test]
    async fn test_retries_after_copy_taken() {
        let book = Book {
            id: BookId::new(),
            title: "Contended".into(),
            author_id: AuthorId::new(),
            topic: "Topic".into(),
            year: 2020,
            copies: vec![BookCopy::new(), BookCopy::new()],
        };
        let (first, second) = (book.copies[0].id, book.copies[1].id);

        let mut books = MockBookStore::new();
        let stored = book.clone();
        books.expect_get().returning(move |_| Ok(Some(stored.clone())));

        let mut ledger = MockLoanStore::new();
        let mut resolved = 0;
        ledger.expect_open_copy_ids().returning(move |_| {
            resolved += 1;
            // The second resolution sees the copy a concurrent request took
            Ok(if resolved == 1 { HashSet::new() } else { [first].into_iter().collect() })
        });
        ledger.expect_count_open_by_reader().returning(|_| Ok(0));
        ledger.expect_open_loan().returning(move |loan, _| {
            Ok(if loan.copy_id == first {
                OpenLoanOutcome::CopyTaken
            } else {
                OpenLoanOutcome::Opened(loan.clone())
            })
        });

        let repository = Repository::from_stores(
            Arc::new(books),
            Arc::new(ledger),
            Arc::new(MockPeopleStore::new()),
        );
        let loan = service(&repository)
            .loan_copy(book.id, ReaderId::new())
            .await
            .unwrap();
        assert_eq!(loan.copy_id, second);
    }
}
