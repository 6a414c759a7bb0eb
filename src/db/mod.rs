pub mod executor;
pub mod models;
pub mod schema;
pub mod session;
