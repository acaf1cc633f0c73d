//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Engine handle and connection pool management
//! - Scoped sessions (one transaction per operation)
//! - Statement compilation and execution
//! - Row shaping and error classification
//! - Schema catalog
//! - Type mappings

#[macro_use]
pub mod macros;
pub mod classifier;
pub mod executor;
pub mod params;
pub mod pool;
pub mod schema;
pub mod session;
pub mod shaper;
pub mod statement;
pub mod types;

pub use classifier::classify;
pub use executor::StatementRunner;
pub use pool::{DbPool, Engine};
pub use schema::{SchemaCatalog, SchemaInspector};
pub use session::ScopedSession;
pub use shaper::{CommandOutcome, RawResult, RawRows, RowRepr, shape_rows};
pub use statement::{CompiledStatement, StatementKind, compile};
