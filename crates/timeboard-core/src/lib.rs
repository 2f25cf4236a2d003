pub mod board;
pub mod errors;
pub mod ids;
pub mod todo;

pub use board::Board;
pub use errors::ValidationError;
pub use ids::TodoId;
pub use todo::{Todo, TodoStatus};
