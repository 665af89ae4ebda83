pub mod paths;
pub mod table_file;
pub mod store;
pub mod query;
pub mod error;

pub use error::{Result, ShelfDbError};
pub use query::DEFAULT_QUERY;
pub use store::{Store, StoreOptions, DEFAULT_TABLE};
pub use table_file::Record;
