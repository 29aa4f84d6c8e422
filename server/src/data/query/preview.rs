//! Related-record preview fetcher
//!
//! Given a page of parent rows, fetches a capped sample of related child
//! rows per parent in one query and attaches them in-process. One LATERAL
//! probe per parent id keeps the cap per parent instead of sharing a
//! single LIMIT across the whole page.

use std::collections::HashMap;

use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row};
use tokio_util::sync::CancellationToken;

use super::exec;
use super::types::{PreviewSpec, QueryError, SqlArgument};

/// Field name previews are attached under on each parent row
pub const PREVIEW_FIELD: &str = "items_preview";

/// Build the preview query; `$1` binds the parent id array
pub fn build_preview_sql(preview: &PreviewSpec) -> String {
    format!(
        "SELECT parent.id AS parent_id, child.item AS item \
         FROM unnest($1::bigint[]) AS parent(id) \
         JOIN LATERAL (SELECT {select} AS item FROM {table} \
         WHERE {fk} = parent.id LIMIT {limit}) child ON true",
        select = preview.select,
        table = preview.table,
        fk = preview.foreign_key,
        limit = preview.limit,
    )
}

/// Fetch previews for `rows` and attach them under [`PREVIEW_FIELD`]
///
/// Parents without children (or without a numeric `id`) get an empty array
/// so the response shape stays uniform.
pub async fn attach_previews(
    pool: &PgPool,
    cancel: &CancellationToken,
    preview: &PreviewSpec,
    rows: &mut [JsonValue],
) -> Result<(), QueryError> {
    let parent_ids: Vec<i64> = rows
        .iter()
        .filter_map(|row| row.get("id").and_then(JsonValue::as_i64))
        .collect();

    let mut grouped: HashMap<i64, Vec<JsonValue>> = HashMap::new();
    if !parent_ids.is_empty() {
        let sql = build_preview_sql(preview);
        let args = [SqlArgument::IntArray(parent_ids)];
        for row in exec::fetch_all(pool, cancel, &sql, &args).await? {
            let parent_id: i64 = row.try_get("parent_id")?;
            let item: JsonValue = row.try_get("item")?;
            grouped.entry(parent_id).or_default().push(item);
        }
    }

    attach_items(rows, grouped);
    Ok(())
}

/// Attach each parent's bucket under [`PREVIEW_FIELD`]; parents without a
/// bucket (or without a numeric `id`) get an empty array
fn attach_items(rows: &mut [JsonValue], mut grouped: HashMap<i64, Vec<JsonValue>>) {
    for row in rows.iter_mut() {
        let id = row.get("id").and_then(JsonValue::as_i64);
        if let Some(object) = row.as_object_mut() {
            let items = id.and_then(|id| grouped.remove(&id)).unwrap_or_default();
            object.insert(PREVIEW_FIELD.to_string(), JsonValue::Array(items));
        }
    }
}
