//! db-access library.
//!
//! A backend-agnostic relational data-access layer for PostgreSQL, MySQL and
//! SQLite. Statements run inside scoped transactional sessions, results come
//! back in a small set of predictable shapes, and every failure is classified
//! as an integrity, backend or general error.
//!
//! ```ignore
//! let engine = Engine::connect_uri("sqlite:app.db?foreign_keys=true").await?;
//! let runner = StatementRunner::new(engine.clone());
//! let names = runner.execute_one("SELECT name FROM users", false).await?;
//!
//! let repo = Repository::new(engine);
//! let total = repo.count_query("SELECT * FROM users").await?;
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod repository;

pub use config::{Config, ConnectionDescriptor};
pub use db::{Engine, StatementRunner};
pub use error::DbError;
pub use repository::Repository;
