//! Identifier newtypes
//!
//! Every entity is keyed by a UUID. Parsing an identifier from user input never
//! fails loudly: a malformed value is reported as `NotFound`, since a caller cannot
//! tell a bad id from an absent record.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            Serialize, Deserialize, sqlx::Type, ToSchema,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// `NotFound` error naming this identifier
            pub fn not_found(self) -> AppError {
                AppError::NotFound(format!("{} with id {} not found", $label, self))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| AppError::NotFound(format!("{} with id {} not found", $label, s)))
            }
        }
    };
}

entity_id!(
    /// Book identifier
    BookId,
    "Book"
);
entity_id!(
    /// Copy identifier, unique across all books; the ledger joins on it
    CopyId,
    "Copy"
);
entity_id!(
    /// Loan ledger entry identifier
    LoanId,
    "Loan"
);
entity_id!(AuthorId, "Author");
entity_id!(ReaderId, "Reader");
