//! Cursor-paginated list engine
//!
//! Resumes from an opaque `(order value, id)` cursor with a keyset
//! predicate instead of OFFSET, so concurrent inserts never skip or
//! duplicate rows between pages. Previews join in as a per-row LATERAL
//! subquery; the optional total count reuses the filter predicate only,
//! since a total is cursor-independent.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::core::constants::MAX_PAGE_LIMIT;
use crate::utils::sql::join_sql;

use super::cursor::Cursor;
use super::exec;
use super::filter::{self, Predicate};
use super::preview::PREVIEW_FIELD;
use super::row::row_to_json;
use super::types::{
    Direction, FilterMap, ListConfig, PageControls, PreviewSpec, QueryError, SortDirection,
    SqlArgument,
};

/// Cursor-mode page envelope
#[derive(Debug, Serialize)]
pub struct KeysetPage {
    pub data: Vec<JsonValue>,
    pub next_cursor: Option<String>,
    pub prev_cursor: Option<String>,
    pub total_count: Option<u64>,
}

/// Compiled statements for one cursor-mode list call
///
/// `count_params` marks the end of the filter predicate within the bound
/// arguments; the keyset predicate and limit come after it and never reach
/// the count query.
#[derive(Debug)]
struct KeysetPlan {
    data_sql: String,
    count_sql: String,
    predicate: Predicate,
    count_params: usize,
    direction: Direction,
    include_total: bool,
    order_field: String,
}

/// Run a cursor-paginated list call
pub async fn list_keyset(
    pool: &PgPool,
    filters: &FilterMap,
    config: &ListConfig,
    cancel: &CancellationToken,
) -> Result<KeysetPage, QueryError> {
    let plan = build_plan(filters, config)?;

    let rows = exec::fetch_all(pool, cancel, &plan.data_sql, &plan.predicate.args.values).await?;
    let mut data: Vec<JsonValue> = rows.iter().map(row_to_json).collect();
    if plan.direction == Direction::Prev {
        // prev pages are fetched in reverse; restore the default order so
        // every page reads the same way
        data.reverse();
    }

    let next_cursor = data.last().and_then(|row| mint_cursor(row, &plan.order_field));
    let prev_cursor = data.first().and_then(|row| mint_cursor(row, &plan.order_field));

    let total_count = if plan.include_total {
        Some(
            exec::fetch_count(
                pool,
                cancel,
                &plan.count_sql,
                &plan.predicate.args.values[..plan.count_params],
            )
            .await?,
        )
    } else {
        None
    };

    Ok(KeysetPage {
        data,
        next_cursor,
        prev_cursor,
        total_count,
    })
}

fn build_plan(filters: &FilterMap, config: &ListConfig) -> Result<KeysetPlan, QueryError> {
    let mut filters = filters.clone();
    let controls = PageControls::take(&mut filters);

    let mut predicate = filter::compile(&filters, &config.columns_map, config.unmapped_keys)?;
    for fragment in &config.extra_where {
        predicate.push_raw(fragment);
    }

    // snapshot before the keyset predicate: the total is cursor-independent
    let count_params = predicate.args.len();
    let count_sql = join_sql(&[
        "SELECT COUNT(*) AS total FROM",
        &config.table,
        &predicate.where_clause(),
    ]);

    let alias = config.alias();
    let order_column = format!("{}.{}", alias, config.default_order.column);
    let id_column = format!("{}.id", alias);

    // an undecodable cursor starts from the beginning rather than failing
    if let Some(cursor) = controls.cursor.as_deref().and_then(Cursor::decode) {
        predicate.push_keyset(
            &order_column,
            &id_column,
            controls.direction,
            order_argument(&cursor.order_value),
            cursor.id,
        );
    }

    let limit = controls
        .limit
        .filter(|l| *l > 0)
        .unwrap_or(config.default_limit)
        .min(MAX_PAGE_LIMIT);
    let limit_param = predicate.args.push(SqlArgument::Int(limit as i64));

    let mut select = config.columns.join(", ");
    let mut preview_join = String::new();
    if let Some(preview) = &config.preview {
        select.push_str(&format!(
            ", COALESCE(_preview.preview, '[]'::json) AS {}",
            PREVIEW_FIELD
        ));
        preview_join = build_preview_join(preview, alias);
    }

    let direction = order_direction(controls.direction, config.default_order.direction);
    let order = format!(
        "ORDER BY {oc} {d}, {ic} {d}",
        oc = order_column,
        ic = id_column,
        d = direction.as_sql(),
    );
    let data_sql = join_sql(&[
        "SELECT",
        &select,
        "FROM",
        &config.table,
        &preview_join,
        &predicate.where_clause(),
        &order,
        &format!("LIMIT ${}", limit_param),
    ]);

    Ok(KeysetPlan {
        data_sql,
        count_sql,
        predicate,
        count_params,
        direction: controls.direction,
        include_total: controls.include_total,
        order_field: config.default_order.column.clone(),
    })
}

/// Per-row LATERAL preview subquery; the inner LIMIT caps children before
/// aggregation so the cap holds per parent
fn build_preview_join(preview: &PreviewSpec, alias: &str) -> String {
    format!(
        "LEFT JOIN LATERAL (SELECT json_agg(item) AS preview \
         FROM (SELECT {select} AS item FROM {table} \
         WHERE {fk} = {alias}.id LIMIT {limit}) _items) _preview ON true",
        select = preview.select,
        table = preview.table,
        fk = preview.foreign_key,
        alias = alias,
        limit = preview.limit,
    )
}

/// Prev traversal flips the scan order; the page is un-reversed after the
/// fetch
fn order_direction(traversal: Direction, default: SortDirection) -> SortDirection {
    match (traversal, default) {
        (Direction::Next, d) => d,
        (Direction::Prev, SortDirection::Asc) => SortDirection::Desc,
        (Direction::Prev, SortDirection::Desc) => SortDirection::Asc,
    }
}

/// Bind a cursor order value with its real type when it parses as a
/// timestamp, so timestamptz columns compare without a cast
fn order_argument(order_value: &str) -> SqlArgument {
    match order_value.parse::<DateTime<Utc>>() {
        Ok(ts) => SqlArgument::Timestamp(ts),
        Err(_) => SqlArgument::Text(order_value.to_string()),
    }
}

fn mint_cursor(row: &JsonValue, order_field: &str) -> Option<String> {
    let id = row.get("id")?.as_i64()?;
    let order_value = match row.get(order_field)? {
        JsonValue::Null => return None,
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    };
    Some(Cursor::new(order_value, id).encode())
}
