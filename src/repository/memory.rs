//! In-process store.
//!
//! Books live in an insertion-ordered arena that owns their copies; the ledger is
//! a plain vector. One `RwLock` covers everything, so each check-and-write below
//! is atomic with respect to every other store call.

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tokio::sync::RwLock;

use super::{BookStore, LoanStore, OpenLoanOutcome, PeopleStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        author::Author,
        book::{Book, BookChanges, BookCopy, BookFilter, BookPage},
        ids::{AuthorId, BookId, CopyId, ReaderId},
        loan::Loan,
        reader::Reader,
    },
};

#[derive(Default)]
struct MemoryState {
    books: IndexMap<BookId, Book>,
    loans: Vec<Loan>,
    authors: IndexMap<AuthorId, Author>,
    readers: IndexMap<ReaderId, Reader>,
}

impl MemoryState {
    fn open_loans_of(&self, reader_id: ReaderId) -> impl Iterator<Item = &Loan> {
        self.loans
            .iter()
            .filter(move |l| l.reader_id == reader_id && l.is_open())
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn insert(&self, book: &Book) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.books.insert(book.id, book.clone());
        Ok(())
    }

    async fn get(&self, id: BookId) -> AppResult<Option<Book>> {
        Ok(self.state.read().await.books.get(&id).cloned())
    }

    async fn update(&self, id: BookId, changes: &BookChanges) -> AppResult<Option<Book>> {
        let mut state = self.state.write().await;
        Ok(state.books.get_mut(&id).map(|book| {
            book.apply(changes);
            book.clone()
        }))
    }

    async fn delete_cascade(&self, id: BookId) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let Some(book) = state.books.shift_remove(&id) else {
            return Ok(false);
        };

        let copy_ids: HashSet<CopyId> = book.copies.iter().map(|c| c.id).collect();
        let before = state.loans.len();
        state
            .loans
            .retain(|l| l.book_id != id && !copy_ids.contains(&l.copy_id));

        tracing::debug!("Deleted book {} and {} loan records", id, before - state.loans.len());
        Ok(true)
    }

    async fn list(&self, filter: &BookFilter, offset: i64, limit: i64) -> AppResult<BookPage> {
        let state = self.state.read().await;
        let matching: Vec<&Book> = state.books.values().filter(|b| b.matches(filter)).collect();

        let books = matching
            .iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|b| (*b).clone())
            .collect();

        Ok(BookPage {
            books,
            total: matching.len() as i64,
        })
    }

    async fn add_copy(&self, book_id: BookId, copy: &BookCopy) -> AppResult<bool> {
        let mut state = self.state.write().await;
        match state.books.get_mut(&book_id) {
            Some(book) => {
                book.copies.push(copy.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_copy_lost(&self, book_id: BookId, copy_id: CopyId) -> AppResult<Option<BookCopy>> {
        let mut state = self.state.write().await;
        let copy = state
            .books
            .get_mut(&book_id)
            .and_then(|book| book.copies.iter_mut().find(|c| c.id == copy_id))
            .map(|copy| {
                copy.is_lost = true;
                copy.clone()
            });
        Ok(copy)
    }
}

#[async_trait]
impl LoanStore for MemoryStore {
    async fn open_copy_ids(&self, copy_ids: &[CopyId]) -> AppResult<HashSet<CopyId>> {
        let wanted: HashSet<&CopyId> = copy_ids.iter().collect();
        let state = self.state.read().await;
        Ok(state
            .loans
            .iter()
            .filter(|l| l.is_open() && wanted.contains(&l.copy_id))
            .map(|l| l.copy_id)
            .collect())
    }

    async fn count_open_by_reader(&self, reader_id: ReaderId) -> AppResult<i64> {
        Ok(self.state.read().await.open_loans_of(reader_id).count() as i64)
    }

    async fn open_loan(&self, loan: &Loan, max_open_per_reader: i64) -> AppResult<OpenLoanOutcome> {
        let mut state = self.state.write().await;

        let book = state
            .books
            .get(&loan.book_id)
            .ok_or_else(|| loan.book_id.not_found())?;

        match book.copy(loan.copy_id) {
            None => {
                return Err(AppError::Validation(format!(
                    "Copy {} does not exist in book {}",
                    loan.copy_id, loan.book_id
                )))
            }
            Some(copy) if copy.is_lost => return Ok(OpenLoanOutcome::CopyTaken),
            Some(_) => {}
        }

        let open = state.open_loans_of(loan.reader_id).count() as i64;
        if open >= max_open_per_reader {
            return Ok(OpenLoanOutcome::ReaderAtLimit { open });
        }

        if state
            .loans
            .iter()
            .any(|l| l.copy_id == loan.copy_id && l.is_open())
        {
            return Ok(OpenLoanOutcome::CopyTaken);
        }

        let mut entry = loan.clone();
        entry.returned_at = None;
        state.loans.push(entry.clone());
        Ok(OpenLoanOutcome::Opened(entry))
    }

    async fn close_open_loan(&self, copy_id: CopyId, returned_at: DateTime<Utc>) -> AppResult<Option<Loan>> {
        let mut state = self.state.write().await;
        Ok(state
            .loans
            .iter_mut()
            .find(|l| l.copy_id == copy_id && l.is_open())
            .map(|loan| {
                loan.returned_at = Some(returned_at);
                loan.clone()
            }))
    }

    async fn list_by_book(&self, book_id: BookId) -> AppResult<Vec<Loan>> {
        let state = self.state.read().await;
        Ok(state
            .loans
            .iter()
            .filter(|l| l.book_id == book_id)
            .cloned()
            .collect())
    }

    async fn list_open_by_reader(&self, reader_id: ReaderId) -> AppResult<Vec<Loan>> {
        let state = self.state.read().await;
        Ok(state.open_loans_of(reader_id).cloned().collect())
    }
}

#[async_trait]
impl PeopleStore for MemoryStore {
    async fn insert_author(&self, author: &Author) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.authors.insert(author.id, author.clone());
        Ok(())
    }

    async fn get_author(&self, id: AuthorId) -> AppResult<Option<Author>> {
        Ok(self.state.read().await.authors.get(&id).cloned())
    }

    async fn list_authors(&self) -> AppResult<Vec<Author>> {
        let state = self.state.read().await;
        let mut authors: Vec<Author> = state.authors.values().cloned().collect();
        authors.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(authors)
    }

    async fn insert_reader(&self, reader: &Reader) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.readers.insert(reader.id, reader.clone());
        Ok(())
    }

    async fn get_reader(&self, id: ReaderId) -> AppResult<Option<Reader>> {
        Ok(self.state.read().await.readers.get(&id).cloned())
    }

    async fn list_readers(&self) -> AppResult<Vec<Reader>> {
        let state = self.state.read().await;
        let mut readers: Vec<Reader> = state.readers.values().cloned().collect();
        readers.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(readers)
    }
}
