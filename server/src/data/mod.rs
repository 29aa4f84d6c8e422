//! Data layer: PostgreSQL service and the generic listing engine

pub mod postgres;
pub mod query;
