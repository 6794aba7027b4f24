//! Repository layer: persistence traits and their backends
//!
//! Services only see the store traits. Two backends implement them: PostgreSQL
//! (`PgBookStore`, `PgLoanStore`, `PgPeopleStore`) and a process-local
//! [`memory::MemoryStore`].

pub mod books;
pub mod loans;
pub mod memory;
pub mod people;

use std::sync::Arc;

use sqlx::{Pool, Postgres};

pub use books::BookStore;
pub use loans::{LoanStore, OpenLoanOutcome};
pub use people::PeopleStore;

/// Handle on the catalog and loan ledger, opened at startup and closed at shutdown
#[derive(Clone)]
pub struct Repository {
    pool: Option<Pool<Postgres>>,
    pub books: Arc<dyn BookStore>,
    pub loans: Arc<dyn LoanStore>,
    pub people: Arc<dyn PeopleStore>,
}

impl Repository {
    /// Create a repository backed by the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(books::PgBookStore::new(pool.clone())),
            loans: Arc::new(loans::PgLoanStore::new(pool.clone())),
            people: Arc::new(people::PgPeopleStore::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Create a repository holding everything in process memory
    pub fn in_memory() -> Self {
        let store = memory::MemoryStore::new();
        Self::from_stores(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store),
        )
    }

    pub fn from_stores(
        books: Arc<dyn BookStore>,
        loans: Arc<dyn LoanStore>,
        people: Arc<dyn PeopleStore>,
    ) -> Self {
        Self {
            pool: None,
            books,
            loans,
            people,
        }
    }

    /// Release the underlying connections
    pub async fn close(&self) {
        if let Some(ref pool) = self.pool {
            pool.close().await;
            tracing::info!("Database connections closed");
        }
    }
}
