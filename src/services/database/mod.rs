// Relational backing store access
pub mod adapter;
pub mod postgresql;

pub use adapter::StoreGateway;
pub use postgresql::PostgresGateway;
