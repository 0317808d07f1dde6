//! Concrete [`EndorsementAccessor`](crate::endorsement::EndorsementAccessor)
//! implementations: SQLite for production, in-memory tables for tests and
//! local tooling.

pub mod email;
pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;

pub use email::{EmailList, EmailPattern, classify_email};
pub use error::AccessorError;
pub use memory::{InMemoryAccessor, MemoryState, OwnedPaper};
pub use sqlite::SqliteAccessor;
