//! Order listing backend: REST API over PostgreSQL with a generic
//! dynamic listing engine (offset and cursor pagination).

pub mod api;
pub mod app;
pub mod core;
pub mod data;
pub mod utils;
