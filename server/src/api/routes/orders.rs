//! Order listing endpoints
//!
//! Two read surfaces over the same orders table: a paged browse view
//! (offset mode) and an infinite-scroll feed (cursor mode). Both translate
//! their query strings into a filter mapping and hand off to the listing
//! engine; the engine owns all SQL.

use axum::Router;
use axum::extract::{Query, State};
use axum::response::Json;
use axum::routing::get;
use serde::Deserialize;

use crate::api::server::AppState;
use crate::api::types::ApiError;
use crate::core::constants::DEFAULT_FEED_LIMIT;
use crate::data::query::types::ScalarOrList;
use crate::data::query::{
    self, FilterMap, FilterValue, KeysetPage, ListConfig, OffsetPage, PreviewSpec, Scalar,
    SortDirection,
};

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_orders))
        .route("/feed", get(orders_feed))
        .with_state(state)
}

/// Query string for `GET /api/orders`
#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    /// Comma-separated status list, e.g. `status=pending,preparing`
    pub status: Option<String>,
    pub user_id: Option<i64>,
    pub payment_method: Option<String>,
    pub table_number: Option<i64>,
    /// Free-text search over the customer name
    pub q: Option<String>,
    /// Inclusive RFC 3339 lower bound on creation time
    pub date_from: Option<String>,
    /// Inclusive RFC 3339 upper bound on creation time
    pub date_to: Option<String>,
    pub sort_by: Option<String>,
    pub sort_dir: Option<String>,
}

impl ListOrdersQuery {
    fn into_filters(self) -> FilterMap {
        let mut filters = FilterMap::new();
        insert_text(&mut filters, "page", self.page);
        insert_text(&mut filters, "limit", self.limit);
        insert_status(&mut filters, self.status);
        if let Some(user_id) = self.user_id {
            filters.insert("user_id".into(), FilterValue::Scalar(Scalar::Int(user_id)));
        }
        insert_text(&mut filters, "payment_method", self.payment_method);
        if let Some(table_number) = self.table_number {
            filters.insert(
                "table_number".into(),
                FilterValue::Scalar(Scalar::Int(table_number)),
            );
        }
        insert_text(&mut filters, "customer_name__q", self.q);
        insert_bound(&mut filters, "created_at_from", ">=", self.date_from);
        insert_bound(&mut filters, "created_at_to", "<=", self.date_to);
        if let Some(field) = self.sort_by {
            filters.insert(
                "sort".into(),
                FilterValue::Sort {
                    field,
                    direction: self.sort_dir.unwrap_or_default(),
                },
            );
        }
        filters
    }
}

/// Query string for `GET /api/orders/feed`
#[derive(Debug, Default, Deserialize)]
pub struct OrdersFeedQuery {
    pub cursor: Option<String>,
    pub direction: Option<String>,
    pub limit: Option<String>,
    pub include_total: Option<String>,
    pub status: Option<String>,
    pub user_id: Option<i64>,
}

impl OrdersFeedQuery {
    fn into_filters(self) -> FilterMap {
        let mut filters = FilterMap::new();
        insert_text(&mut filters, "cursor", self.cursor);
        insert_text(&mut filters, "direction", self.direction);
        insert_text(&mut filters, "limit", self.limit);
        insert_text(&mut filters, "include_total", self.include_total);
        insert_status(&mut filters, self.status);
        if let Some(user_id) = self.user_id {
            filters.insert("user_id".into(), FilterValue::Scalar(Scalar::Int(user_id)));
        }
        filters
    }
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(params): Query<ListOrdersQuery>,
) -> Result<Json<OffsetPage>, ApiError> {
    let filters = params.into_filters();
    let page = query::list_offset(&state.pool, &filters, &orders_config(), &state.cancel).await?;
    Ok(Json(page))
}

pub async fn orders_feed(
    State(state): State<AppState>,
    Query(params): Query<OrdersFeedQuery>,
) -> Result<Json<KeysetPage>, ApiError> {
    let filters = params.into_filters();
    let page = query::list_keyset(&state.pool, &filters, &feed_config(), &state.cancel).await?;
    Ok(Json(page))
}

/// Allowed filter/sort columns for the orders surface
fn orders_config() -> ListConfig {
    ListConfig::new("public.orders o")
        .with_columns(["o.*"])
        .map_column("status", "o.status")
        .map_column("user_id", "o.user_id")
        .map_column("payment_method", "o.payment_method")
        .map_column("table_number", "o.table_number")
        .map_column("customer_name", "o.customer_name")
        .map_column("created_at", "o.created_at")
        .map_column("created_at_from", "o.created_at")
        .map_column("created_at_to", "o.created_at")
        .map_column("total", "o.total")
        .order_by("created_at", SortDirection::Desc)
        .with_preview(items_preview())
}

fn feed_config() -> ListConfig {
    orders_config().with_default_limit(DEFAULT_FEED_LIMIT)
}

fn items_preview() -> PreviewSpec {
    PreviewSpec::new(
        "public.order_items oi",
        "oi.order_id",
        "json_build_object('product_id', oi.product_id, 'name', oi.name, \
         'quantity', oi.quantity, 'unit_price', oi.unit_price)",
    )
}

fn insert_text(filters: &mut FilterMap, key: &str, value: Option<String>) {
    if let Some(value) = value {
        filters.insert(key.into(), FilterValue::Scalar(Scalar::Text(value)));
    }
}

/// CSV status list becomes an array filter (`status = ANY(...)`)
fn insert_status(filters: &mut FilterMap, status: Option<String>) {
    let Some(status) = status else { return };
    let items: Vec<Scalar> = status
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Scalar::Text(s.to_string()))
        .collect();
    if !items.is_empty() {
        filters.insert("status".into(), FilterValue::List(items));
    }
}

fn insert_bound(filters: &mut FilterMap, key: &str, op: &str, value: Option<String>) {
    if let Some(value) = value {
        filters.insert(
            key.into(),
            FilterValue::Op {
                op: op.to_string(),
                value: Some(ScalarOrList::Scalar(Scalar::Text(value))),
            },
        );
    }
}
