//! SQL utility functions

/// Escape SQL LIKE metacharacters (%, _, \) in user input
///
/// Use this when building LIKE/ILIKE patterns from user input to prevent
/// unintended pattern matching.
pub fn escape_like_pattern(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Alias of a table expression like `"public.orders o"` (falls back to the
/// table name itself when no alias is given).
pub fn table_alias(table: &str) -> &str {
    table.split_whitespace().last().unwrap_or(table)
}

/// Join non-empty SQL fragments with single spaces
pub fn join_sql(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}
