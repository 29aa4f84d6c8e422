//! Generic dynamic listing engine
//!
//! Turns untrusted request filters plus a per-call-site [`ListConfig`]
//! into parameterized Postgres queries, in two pagination flavors:
//!
//! - [`offset::list_offset`] for page/limit browsing with a total count
//! - [`keyset::list_keyset`] for cursor feeds stable under concurrent
//!   writes
//!
//! Column names come exclusively from the configured columns map; request
//! values only ever travel as bound parameters.

pub mod cursor;
mod exec;
pub mod filter;
pub mod keyset;
pub mod offset;
pub mod preview;
pub mod row;
pub mod types;

pub use keyset::{KeysetPage, list_keyset};
pub use offset::{OffsetPage, list_offset};
pub use types::{
    FilterMap, FilterValue, ListConfig, PreviewSpec, QueryError, Scalar, SortDirection,
    UnmappedKeys,
};
