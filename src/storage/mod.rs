//! Persistence: the generic repository contract and its backends.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod sql;
pub mod transaction;

pub use error::{DataError, DataResult};
pub use memory::MemoryRepository;
pub use postgres::PgRepository;
pub use repository::{to_record, DeleteResult, Record, Repository, UpdateResult, WriteResult};
pub use transaction::finish;
