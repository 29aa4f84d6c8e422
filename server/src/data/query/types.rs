//! Listing engine type definitions
//!
//! Request-side filter shapes, per-call-site configuration, and the typed
//! parameter collector every generated query binds through.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::core::constants::{DEFAULT_LIMIT, DEFAULT_PREVIEW_LIMIT};
use crate::utils::sql::table_alias;

/// Listing engine errors
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cannot filter by key: {0}")]
    UnmappedKey(String),

    #[error("Unsupported filter operator: {0}")]
    UnsupportedOperator(String),

    #[error("List query cancelled")]
    Cancelled,
}

/// A single scalar filter value
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Best-effort numeric coercion (strings are parsed, NaN rejected)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) if f.is_finite() => Some(*f),
            Scalar::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Scalar or list payload of an `{op, value}` filter
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ScalarOrList {
    List(Vec<Scalar>),
    Scalar(Scalar),
}

/// One entry in a filter mapping
///
/// Accepts a bare scalar, a list, an `{op, value}` pair, or the reserved
/// `sort` object `{field, direction}`. Null is a valid "no filter" value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Op {
        op: String,
        value: Option<ScalarOrList>,
    },
    Sort {
        field: String,
        direction: String,
    },
    List(Vec<Scalar>),
    Scalar(Scalar),
    Null,
}

/// Mapping of filter keys to values, as received from the HTTP layer
///
/// A BTreeMap keeps compiled predicates deterministic for a given input.
pub type FilterMap = BTreeMap<String, FilterValue>;

/// Mapping of filter keys to fully-qualified column expressions
///
/// This map is the only source of column names the compiler may
/// interpolate. It is fixed at configuration time, never derived from
/// request input.
pub type ColumnsMap = BTreeMap<String, String>;

/// Behavior for filter keys absent from the columns map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnmappedKeys {
    /// Fail the request (configuration/caller error)
    #[default]
    Reject,
    /// Silently drop the filter
    Drop,
}

/// Sort direction, ASC unless DESC is requested explicitly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Case-insensitive parse; anything unrecognized is ASC
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Default ordering for a list call site
#[derive(Debug, Clone)]
pub struct OrderSpec {
    /// Bare column name on the parent table (qualified by the engines)
    pub column: String,
    pub direction: SortDirection,
}

/// Capped related-record preview attached to each parent row
#[derive(Debug, Clone)]
pub struct PreviewSpec {
    /// Child table expression, e.g. `"order_items oi"`
    pub table: String,
    /// Qualified foreign key referencing the parent id, e.g. `"oi.order_id"`
    pub foreign_key: String,
    /// Per-parent row cap
    pub limit: u32,
    /// Trusted projection expression; must produce one JSON value per child
    /// row (e.g. `json_build_object(...)` or `to_jsonb(oi)`)
    pub select: String,
}

impl PreviewSpec {
    pub fn new(
        table: impl Into<String>,
        foreign_key: impl Into<String>,
        select: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            foreign_key: foreign_key.into(),
            limit: DEFAULT_PREVIEW_LIMIT,
            select: select.into(),
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }
}

/// Per-call-site listing configuration
///
/// Everything here is established at configuration time by the call site.
/// `extra_where` fragments are spliced into the query verbatim: they are a
/// trust boundary the caller owns and must never carry request input.
#[derive(Debug, Clone)]
pub struct ListConfig {
    /// Table expression with optional alias, e.g. `"public.orders o"`
    pub table: String,
    /// Selected columns, e.g. `["o.*"]`
    pub columns: Vec<String>,
    pub columns_map: ColumnsMap,
    pub default_order: OrderSpec,
    pub preview: Option<PreviewSpec>,
    pub extra_where: Vec<String>,
    pub unmapped_keys: UnmappedKeys,
    pub default_limit: u32,
}

impl ListConfig {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: vec!["*".to_string()],
            columns_map: ColumnsMap::new(),
            default_order: OrderSpec {
                column: "created_at".to_string(),
                direction: SortDirection::Desc,
            },
            preview: None,
            extra_where: Vec::new(),
            unmapped_keys: UnmappedKeys::default(),
            default_limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Allow a filter key, mapping it to a qualified column expression
    pub fn map_column(mut self, key: impl Into<String>, column: impl Into<String>) -> Self {
        self.columns_map.insert(key.into(), column.into());
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.default_order = OrderSpec {
            column: column.into(),
            direction,
        };
        self
    }

    pub fn with_preview(mut self, preview: PreviewSpec) -> Self {
        self.preview = Some(preview);
        self
    }

    /// Append a trusted raw WHERE fragment (caller-owned trust boundary)
    pub fn with_extra_where(mut self, fragment: impl Into<String>) -> Self {
        self.extra_where.push(fragment.into());
        self
    }

    pub fn unmapped_keys(mut self, mode: UnmappedKeys) -> Self {
        self.unmapped_keys = mode;
        self
    }

    pub fn with_default_limit(mut self, limit: u32) -> Self {
        self.default_limit = limit;
        self
    }

    /// Alias of the parent table expression
    pub fn alias(&self) -> &str {
        table_alias(&self.table)
    }
}

/// A value bound into a query as a positional parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlArgument {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Bound with its own type so timestamptz comparisons need no cast
    Timestamp(DateTime<Utc>),
    TextArray(Vec<String>),
    IntArray(Vec<i64>),
}

impl From<&Scalar> for SqlArgument {
    fn from(s: &Scalar) -> Self {
        match s {
            Scalar::Bool(b) => SqlArgument::Bool(*b),
            Scalar::Int(i) => SqlArgument::Int(*i),
            Scalar::Float(f) => SqlArgument::Float(*f),
            Scalar::Text(t) => SqlArgument::Text(t.clone()),
        }
    }
}

/// Collects bound parameters during query building (insertion order)
#[derive(Debug, Default, Clone)]
pub struct SqlArguments {
    pub values: Vec<SqlArgument>,
}

impl SqlArguments {
    /// Push a value and return its 1-based placeholder index
    pub fn push(&mut self, value: SqlArgument) -> usize {
        self.values.push(value);
        self.values.len()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Direction of cursor traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Toward older rows (descending from the cursor)
    #[default]
    Next,
    /// Toward newer rows
    Prev,
}

impl Direction {
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("prev") {
            Direction::Prev
        } else {
            Direction::Next
        }
    }
}

/// Requested sort, taken from the reserved `sort` filter key
#[derive(Debug, Clone, PartialEq)]
pub struct SortRequest {
    pub field: String,
    pub direction: String,
}

/// Reserved pagination controls, split out of a filter mapping
///
/// Malformed values are normalized to `None` (callers substitute defaults)
/// rather than rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageControls {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
    pub direction: Direction,
    pub include_total: bool,
    pub sort: Option<SortRequest>,
}

impl PageControls {
    /// Remove the reserved control keys from `filters` and coerce them.
    /// Whatever remains in `filters` afterwards is domain filter input.
    pub fn take(filters: &mut FilterMap) -> Self {
        let page = take_scalar(filters, "page").and_then(|s| coerce_u32(&s));
        let limit = take_scalar(filters, "limit").and_then(|s| coerce_u32(&s));

        // reserved but unused: the window always derives from page/limit,
        // so an explicit offset can never disagree with the reported page
        take_scalar(filters, "offset");

        let cursor = take_scalar(filters, "cursor")
            .and_then(|s| s.as_text().map(str::to_string))
            .filter(|s| !s.is_empty());

        let direction = take_scalar(filters, "direction")
            .and_then(|s| s.as_text().map(Direction::parse))
            .unwrap_or_default();

        let include_total = match take_scalar(filters, "include_total") {
            Some(Scalar::Bool(b)) => b,
            Some(Scalar::Text(s)) => s.eq_ignore_ascii_case("true") || s == "1",
            Some(Scalar::Int(i)) => i != 0,
            _ => false,
        };

        let sort = match filters.remove("sort") {
            Some(FilterValue::Sort { field, direction }) => Some(SortRequest { field, direction }),
            _ => None,
        };

        Self {
            page,
            limit,
            cursor,
            direction,
            include_total,
            sort,
        }
    }
}

fn take_scalar(filters: &mut FilterMap, key: &str) -> Option<Scalar> {
    match filters.remove(key) {
        Some(FilterValue::Scalar(s)) => Some(s),
        _ => None,
    }
}

fn coerce_u32(s: &Scalar) -> Option<u32> {
    s.as_f64()
        .filter(|f| *f >= 0.0 && *f <= u32::MAX as f64)
        .map(|f| f as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> FilterValue {
        FilterValue::Scalar(Scalar::Text(s.to_string()))
    }

    #[test]
    fn take_splits_controls_from_domain_filters() {
        let mut filters = FilterMap::new();
        filters.insert("page".into(), text("2"));
        filters.insert("limit".into(), text("20"));
        filters.insert("status".into(), text("pending"));
        filters.insert(
            "sort".into(),
            FilterValue::Sort {
                field: "total".into(),
                direction: "desc".into(),
            },
        );

        let controls = PageControls::take(&mut filters);
        assert_eq!(controls.page, Some(2));
        assert_eq!(controls.limit, Some(20));
        assert_eq!(
            controls.sort,
            Some(SortRequest {
                field: "total".into(),
                direction: "desc".into(),
            })
        );

        // only the domain filter remains
        assert_eq!(filters.len(), 1);
        assert!(filters.contains_key("status"));
    }

    #[test]
    fn non_numeric_page_normalizes_to_none() {
        let mut filters = FilterMap::new();
        filters.insert("page".into(), text("abc"));
        filters.insert("limit".into(), text("NaN"));

        let controls = PageControls::take(&mut filters);
        assert_eq!(controls.page, None);
        assert_eq!(controls.limit, None);
    }

    #[test]
    fn numeric_scalars_coerce() {
        let mut filters = FilterMap::new();
        filters.insert("page".into(), FilterValue::Scalar(Scalar::Int(3)));
        filters.insert("limit".into(), FilterValue::Scalar(Scalar::Float(25.0)));

        let controls = PageControls::take(&mut filters);
        assert_eq!(controls.page, Some(3));
        assert_eq!(controls.limit, Some(25));
    }

    #[test]
    fn cursor_and_direction_extract() {
        let mut filters = FilterMap::new();
        filters.insert("cursor".into(), text("abc123"));
        filters.insert("direction".into(), text("PREV"));
        filters.insert("include_total".into(), text("true"));

        let controls = PageControls::take(&mut filters);
        assert_eq!(controls.cursor.as_deref(), Some("abc123"));
        assert_eq!(controls.direction, Direction::Prev);
        assert!(controls.include_total);
    }

    #[test]
    fn empty_cursor_is_none() {
        let mut filters = FilterMap::new();
        filters.insert("cursor".into(), text(""));
        let controls = PageControls::take(&mut filters);
        assert_eq!(controls.cursor, None);
    }

    #[test]
    fn filter_value_deserializes_untagged() {
        let v: FilterValue = serde_json::from_str(r#"{"op": "ilike", "value": "%foo%"}"#).unwrap();
        assert!(matches!(v, FilterValue::Op { .. }));

        let v: FilterValue =
            serde_json::from_str(r#"{"field": "total", "direction": "desc"}"#).unwrap();
        assert!(matches!(v, FilterValue::Sort { .. }));

        let v: FilterValue = serde_json::from_str(r#"["a", "b"]"#).unwrap();
        assert!(matches!(v, FilterValue::List(_)));

        let v: FilterValue = serde_json::from_str("42").unwrap();
        assert_eq!(v, FilterValue::Scalar(Scalar::Int(42)));

        let v: FilterValue = serde_json::from_str("null").unwrap();
        assert_eq!(v, FilterValue::Null);
    }

    #[test]
    fn list_config_builder() {
        let config = ListConfig::new("public.orders o")
            .with_columns(["o.*"])
            .map_column("status", "o.status")
            .order_by("created_at", SortDirection::Desc)
            .with_default_limit(25);

        assert_eq!(config.alias(), "o");
        assert_eq!(config.columns_map.get("status").unwrap(), "o.status");
        assert_eq!(config.default_limit, 25);
        assert_eq!(config.unmapped_keys, UnmappedKeys::Reject);
    }
}
