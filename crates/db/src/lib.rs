pub mod connection;
pub mod executor;
pub mod migrations;
pub mod seed;

pub use connection::{connect, connect_with_settings, DbPool};
pub use executor::PgQueryExecutor;
pub use seed::{DemoSeed, SeedError, SeedReport};
