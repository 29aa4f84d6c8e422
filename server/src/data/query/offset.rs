//! Offset-paginated list engine
//!
//! Orchestrates filter compilation, ordering, LIMIT/OFFSET paging, a total
//! count, and optional related-record previews into one page envelope.

use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::core::constants::{DEFAULT_PAGE, MAX_PAGE_LIMIT};
use crate::utils::sql::join_sql;

use super::exec;
use super::filter::{self, Predicate};
use super::preview;
use super::row::row_to_json;
use super::types::{FilterMap, ListConfig, PageControls, QueryError, SortDirection, SqlArgument};

/// Offset-mode page envelope
#[derive(Debug, Serialize)]
pub struct OffsetPage {
    pub success: bool,
    pub page: u32,
    pub limit: u32,
    pub total_rows: u64,
    pub total_pages: u64,
    pub data: Vec<JsonValue>,
}

/// Compiled statements for one offset-mode list call
///
/// `predicate` carries every bound parameter; the count query binds only
/// the first `count_params` of them (the shared filter predicate), the
/// data query additionally binds limit and offset.
#[derive(Debug)]
struct OffsetPlan {
    data_sql: String,
    count_sql: String,
    predicate: Predicate,
    count_params: usize,
    page: u32,
    limit: u32,
}

/// Run an offset-paginated list call
pub async fn list_offset(
    pool: &PgPool,
    filters: &FilterMap,
    config: &ListConfig,
    cancel: &CancellationToken,
) -> Result<OffsetPage, QueryError> {
    let plan = build_plan(filters, config)?;

    let rows = exec::fetch_all(pool, cancel, &plan.data_sql, &plan.predicate.args.values).await?;
    let mut data: Vec<JsonValue> = rows.iter().map(row_to_json).collect();

    let total_rows = exec::fetch_count(
        pool,
        cancel,
        &plan.count_sql,
        &plan.predicate.args.values[..plan.count_params],
    )
    .await?;

    if let Some(preview) = &config.preview {
        if !data.is_empty() {
            preview::attach_previews(pool, cancel, preview, &mut data).await?;
        }
    }

    Ok(OffsetPage {
        success: true,
        page: plan.page,
        limit: plan.limit,
        total_rows,
        total_pages: total_pages(total_rows, plan.limit),
        data,
    })
}

fn build_plan(filters: &FilterMap, config: &ListConfig) -> Result<OffsetPlan, QueryError> {
    let mut filters = filters.clone();
    let controls = PageControls::take(&mut filters);

    let mut predicate = filter::compile(&filters, &config.columns_map, config.unmapped_keys)?;
    for fragment in &config.extra_where {
        predicate.push_raw(fragment);
    }

    // zero and non-numeric both fall back, like the defaults they replace
    let page = controls.page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE);
    let limit = controls
        .limit
        .filter(|l| *l > 0)
        .unwrap_or(config.default_limit)
        .min(MAX_PAGE_LIMIT);
    let offset = (page as u64 - 1) * limit as u64;

    let (order_column, order_direction) = resolve_sort(&controls, config);

    let where_clause = predicate.where_clause();
    let count_params = predicate.args.len();
    let count_sql = join_sql(&["SELECT COUNT(*) AS total FROM", &config.table, &where_clause]);

    let limit_param = predicate.args.push(SqlArgument::Int(limit as i64));
    let offset_param = predicate.args.push(SqlArgument::Int(offset as i64));

    let columns = config.columns.join(", ");
    let order = format!("ORDER BY {} {}", order_column, order_direction.as_sql());
    let paging = format!("LIMIT ${} OFFSET ${}", limit_param, offset_param);
    let data_sql = join_sql(&[
        "SELECT",
        &columns,
        "FROM",
        &config.table,
        &where_clause,
        &order,
        &paging,
    ]);

    Ok(OffsetPlan {
        data_sql,
        count_sql,
        predicate,
        count_params,
        page,
        limit,
    })
}

/// Resolve the sort column through the columns map; unknown fields fall
/// back to the configured default order column
fn resolve_sort(controls: &PageControls, config: &ListConfig) -> (String, SortDirection) {
    let default_column = format!("{}.{}", config.alias(), config.default_order.column);
    match &controls.sort {
        Some(sort) => {
            let column = config
                .columns_map
                .get(&sort.field)
                .cloned()
                .unwrap_or(default_column);
            (column, SortDirection::parse(&sort.direction))
        }
        None => (default_column, config.default_order.direction),
    }
}

fn total_pages(total_rows: u64, limit: u32) -> u64 {
    total_rows.div_ceil(limit as u64)
}
