pub mod database;
pub mod error;
pub mod row_helpers;
pub mod schema;
pub mod todos;

pub use database::Database;
pub use error::StoreError;
pub use todos::TodoRepo;
