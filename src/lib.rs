pub mod config;
pub mod error;
pub mod models;
pub mod repl;
pub mod services;

pub use error::AppError;
pub use models::*;
pub use services::*;
