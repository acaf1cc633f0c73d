//! Data models for the data-access layer.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod entity;
pub mod outcome;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use connection::{ConnectionInfo, DatabaseType};
pub use entity::{Entity, TypedQuery, entity_to_record, record_to_entity};
pub use outcome::{
    BatchResult, DalResult, Deleted, ErrorKind, RecordNotFound, RecordOutcome, ShapedRows,
    ShapedValue, StatementMetadata, StatementResult, StructuredError,
};
pub use query::{
    Comparison, Filter, Params, QueryParam, RawStatement, Select, SortOrder, Statement,
};
pub use schema::{ColumnDetail, TableMetadata, parse_default_value};
