//! # techsim-corpus
//!
//! Text corpus providers for the similarity pipeline.
//!
//! A provider supplies two labeled collections: reference texts
//! (technique descriptions) and query texts (synthetic samples). The
//! shipping implementation reads the pipeline's SQLite database; the
//! core never sees anything but `TextRecord`s, so other sources slot
//! in behind the same trait.

pub mod error;
pub mod provider;
pub mod sqlite;

pub use error::CorpusError;
pub use provider::CorpusProvider;
pub use sqlite::SqliteCorpus;
