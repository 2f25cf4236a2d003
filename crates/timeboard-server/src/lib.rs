pub mod client;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod server;

pub use client::{BoardView, ClientError, TodoClient};
pub use dispatch::{dispatch, Intent, Outcome};
pub use error::ApiError;
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
