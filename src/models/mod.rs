//! Data models for the catalog

pub mod author;
pub mod book;
pub mod ids;
pub mod loan;
pub mod reader;

// Re-export commonly used types
pub use author::Author;
pub use book::{Book, BookCopy, BookDetails};
pub use ids::{AuthorId, BookId, CopyId, LoanId, ReaderId};
pub use loan::Loan;
pub use reader::Reader;
