//! Filter compiler
//!
//! Translates an untrusted filter mapping into a parameterized SQL
//! predicate. Column names are interpolated only from the configured
//! columns map (or trusted raw fragments); every request value travels as
//! a bound parameter. The compiled predicate is a structured condition
//! list rendered to `$n` placeholder SQL at the edge.

use super::types::{
    ColumnsMap, Direction, FilterMap, FilterValue, QueryError, Scalar, ScalarOrList, SqlArgument,
    SqlArguments, UnmappedKeys,
};
use crate::utils::sql::escape_like_pattern;

/// Suffix marking a free-text search key (`customer_name__q`)
const TEXT_SEARCH_SUFFIX: &str = "__q";

/// Comparison operators accepted in `{op, value}` filters
///
/// Fixed allowlist: operators are never taken verbatim from request input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl CompareOp {
    fn from_op(op: &str) -> Option<Self> {
        match op {
            "=" => Some(Self::Eq),
            "<>" | "!=" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            ">=" => Some(Self::Gte),
            "<=" => Some(Self::Lte),
            _ => None,
        }
    }

    fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
        }
    }
}

/// One compiled condition; `param` fields are 1-based placeholder indices
#[derive(Debug, Clone)]
enum Cond {
    Compare {
        column: String,
        op: CompareOp,
        param: usize,
    },
    Ilike {
        column: String,
        param: usize,
        /// `__q` convention casts the column to text first
        cast_text: bool,
    },
    AnyOf {
        column: String,
        param: usize,
    },
    Keyset {
        order_column: String,
        id_column: String,
        direction: Direction,
        order_param: usize,
        id_param: usize,
    },
    Raw(String),
}

impl Cond {
    fn render(&self) -> String {
        match self {
            Cond::Compare { column, op, param } => {
                format!("{} {} ${}", column, op.as_sql(), param)
            }
            Cond::Ilike {
                column,
                param,
                cast_text: true,
            } => format!("({}::text ILIKE ${})", column, param),
            Cond::Ilike {
                column,
                param,
                cast_text: false,
            } => format!("{} ILIKE ${}", column, param),
            Cond::AnyOf { column, param } => format!("{} = ANY(${})", column, param),
            Cond::Keyset {
                order_column,
                id_column,
                direction,
                order_param,
                id_param,
            } => {
                let op = match direction {
                    Direction::Next => "<",
                    Direction::Prev => ">",
                };
                format!(
                    "({oc} {op} ${a} OR ({oc} = ${a} AND {ic} {op} ${b}))",
                    oc = order_column,
                    ic = id_column,
                    op = op,
                    a = order_param,
                    b = id_param,
                )
            }
            Cond::Raw(fragment) => format!("({})", fragment),
        }
    }
}

/// Compiled predicate: conditions plus the parameters they bind
///
/// When no condition survives compilation the rendered predicate is empty
/// and `where_clause` omits the `WHERE` keyword entirely.
#[derive(Debug, Default, Clone)]
pub struct Predicate {
    conds: Vec<Cond>,
    pub args: SqlArguments,
}

impl Predicate {
    pub fn is_empty(&self) -> bool {
        self.conds.is_empty()
    }

    /// Number of conditions currently compiled
    pub fn len(&self) -> usize {
        self.conds.len()
    }

    /// Append a trusted raw fragment (caller-owned, not parameterized)
    pub fn push_raw(&mut self, fragment: &str) {
        self.conds.push(Cond::Raw(fragment.to_string()));
    }

    /// Append a keyset condition resuming after/before `(order_value, id)`
    pub fn push_keyset(
        &mut self,
        order_column: &str,
        id_column: &str,
        direction: Direction,
        order_value: SqlArgument,
        id: i64,
    ) {
        let order_param = self.args.push(order_value);
        let id_param = self.args.push(SqlArgument::Int(id));
        self.conds.push(Cond::Keyset {
            order_column: order_column.to_string(),
            id_column: id_column.to_string(),
            direction,
            order_param,
            id_param,
        });
    }

    /// Render the predicate body (no `WHERE` keyword), AND-joined
    pub fn render(&self) -> String {
        self.conds
            .iter()
            .map(Cond::render)
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Render a full `WHERE ...` clause, or an empty string
    pub fn where_clause(&self) -> String {
        if self.conds.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.render())
        }
    }
}

/// Compile a filter mapping against a columns allowlist
///
/// Null and empty-string values are treated as "no filter". Empty arrays
/// are explicit no-ops. Keys absent from the map are rejected or dropped
/// according to `unmapped`.
pub fn compile(
    filters: &FilterMap,
    columns_map: &ColumnsMap,
    unmapped: UnmappedKeys,
) -> Result<Predicate, QueryError> {
    let mut predicate = Predicate::default();

    for (key, value) in filters {
        // empty values mean "no filter" before the key is even looked up,
        // so a null-valued unmapped key never errors
        if is_no_op(value) {
            continue;
        }

        let Some(column) = resolve_column(key, columns_map, unmapped)? else {
            continue;
        };

        match value {
            FilterValue::Null => {}
            // reserved key shape; never compiled as a column filter
            FilterValue::Sort { .. } => {}
            FilterValue::Scalar(scalar) => {
                compile_scalar(&mut predicate, key, &column, scalar);
            }
            FilterValue::List(items) => {
                if !items.is_empty() {
                    let param = predicate.args.push(list_argument(items));
                    predicate.conds.push(Cond::AnyOf { column, param });
                }
            }
            FilterValue::Op { op, value } => {
                compile_op(&mut predicate, &column, op, value.as_ref())?;
            }
        }
    }

    Ok(predicate)
}

/// Null, empty-string, and valueless `{op}` filters carry no constraint
fn is_no_op(value: &FilterValue) -> bool {
    match value {
        FilterValue::Null => true,
        FilterValue::Scalar(Scalar::Text(s)) => s.is_empty(),
        FilterValue::Op { value: None, .. } => true,
        FilterValue::Op {
            value: Some(ScalarOrList::Scalar(Scalar::Text(s))),
            ..
        } => s.is_empty(),
        _ => false,
    }
}

/// Resolve a filter key through the columns map
///
/// `__q` keys fall back to the mapping of the suffix-stripped key, so a
/// call site can map either `name__q` or `name`.
fn resolve_column(
    key: &str,
    columns_map: &ColumnsMap,
    unmapped: UnmappedKeys,
) -> Result<Option<String>, QueryError> {
    let mapped = columns_map.get(key).or_else(|| {
        key.strip_suffix(TEXT_SEARCH_SUFFIX)
            .and_then(|stripped| columns_map.get(stripped))
    });

    match mapped {
        Some(column) => Ok(Some(column.clone())),
        None => match unmapped {
            UnmappedKeys::Reject => Err(QueryError::UnmappedKey(key.to_string())),
            UnmappedKeys::Drop => Ok(None),
        },
    }
}

fn compile_scalar(predicate: &mut Predicate, key: &str, column: &str, scalar: &Scalar) {
    if matches!(scalar, Scalar::Text(s) if s.is_empty()) {
        return;
    }

    if key.ends_with(TEXT_SEARCH_SUFFIX) {
        if let Some(text) = scalar.as_text() {
            let pattern = format!("%{}%", escape_like_pattern(text));
            let param = predicate.args.push(SqlArgument::Text(pattern));
            predicate.conds.push(Cond::Ilike {
                column: column.to_string(),
                param,
                cast_text: true,
            });
            return;
        }
    }

    let param = predicate.args.push(SqlArgument::from(scalar));
    predicate.conds.push(Cond::Compare {
        column: column.to_string(),
        op: CompareOp::Eq,
        param,
    });
}

fn compile_op(
    predicate: &mut Predicate,
    column: &str,
    op: &str,
    value: Option<&ScalarOrList>,
) -> Result<(), QueryError> {
    let Some(value) = value else {
        return Ok(());
    };

    match op.to_ascii_lowercase().as_str() {
        "ilike" => {
            if let ScalarOrList::Scalar(scalar) = value {
                let pattern = scalar_text(scalar);
                if pattern.is_empty() {
                    return Ok(());
                }
                let param = predicate.args.push(SqlArgument::Text(pattern));
                predicate.conds.push(Cond::Ilike {
                    column: column.to_string(),
                    param,
                    cast_text: false,
                });
            }
            Ok(())
        }
        "in" => {
            let items = match value {
                ScalarOrList::List(items) => items.as_slice(),
                ScalarOrList::Scalar(scalar) => std::slice::from_ref(scalar),
            };
            if !items.is_empty() {
                let param = predicate.args.push(list_argument(items));
                predicate.conds.push(Cond::AnyOf {
                    column: column.to_string(),
                    param,
                });
            }
            Ok(())
        }
        other => match CompareOp::from_op(other) {
            Some(compare) => {
                let ScalarOrList::Scalar(scalar) = value else {
                    return Err(QueryError::UnsupportedOperator(format!(
                        "{} on list value",
                        op
                    )));
                };
                if matches!(scalar, Scalar::Text(s) if s.is_empty()) {
                    return Ok(());
                }
                let param = predicate.args.push(SqlArgument::from(scalar));
                predicate.conds.push(Cond::Compare {
                    column: column.to_string(),
                    op: compare,
                    param,
                });
                Ok(())
            }
            None => Err(QueryError::UnsupportedOperator(op.to_string())),
        },
    }
}

/// Bind a list as the tightest array type it fits
fn list_argument(items: &[Scalar]) -> SqlArgument {
    if items.iter().all(|s| matches!(s, Scalar::Int(_))) {
        let ints = items
            .iter()
            .filter_map(|s| match s {
                Scalar::Int(i) => Some(*i),
                _ => None,
            })
            .collect();
        return SqlArgument::IntArray(ints);
    }
    SqlArgument::TextArray(items.iter().map(scalar_text).collect())
}

fn scalar_text(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Text(s) => s.clone(),
        Scalar::Int(i) => i.to_string(),
        Scalar::Float(f) => f.to_string(),
        Scalar::Bool(b) => b.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> ColumnsMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn text(s: &str) -> FilterValue {
        FilterValue::Scalar(Scalar::Text(s.to_string()))
    }

    #[test]
    fn scalar_equality() {
        let mut filters = FilterMap::new();
        filters.insert("status".into(), text("pending"));
        let columns = map(&[("status", "o.status")]);

        let p = compile(&filters, &columns, UnmappedKeys::Reject).unwrap();
        assert_eq!(p.render(), "o.status = $1");
        assert_eq!(
            p.args.values,
            vec![SqlArgument::Text("pending".to_string())]
        );
    }

    #[test]
    fn numeric_and_boolean_equality() {
        let mut filters = FilterMap::new();
        filters.insert("user_id".into(), FilterValue::Scalar(Scalar::Int(7)));
        filters.insert("paid".into(), FilterValue::Scalar(Scalar::Bool(true)));
        let columns = map(&[("user_id", "o.user_id"), ("paid", "o.paid")]);

        let p = compile(&filters, &columns, UnmappedKeys::Reject).unwrap();
        // BTreeMap iteration: paid before user_id
        assert_eq!(p.render(), "o.paid = $1 AND o.user_id = $2");
        assert_eq!(
            p.args.values,
            vec![SqlArgument::Bool(true), SqlArgument::Int(7)]
        );
    }

    #[test]
    fn null_and_empty_string_are_skipped() {
        let mut filters = FilterMap::new();
        filters.insert("status".into(), FilterValue::Null);
        filters.insert("payment_method".into(), text(""));
        let columns = map(&[("status", "o.status"), ("payment_method", "o.payment_method")]);

        let p = compile(&filters, &columns, UnmappedKeys::Reject).unwrap();
        assert!(p.is_empty());
        assert_eq!(p.where_clause(), "");
    }

    #[test]
    fn array_value_becomes_any() {
        let mut filters = FilterMap::new();
        filters.insert(
            "status".into(),
            FilterValue::List(vec![
                Scalar::Text("pending".into()),
                Scalar::Text("paid".into()),
            ]),
        );
        let columns = map(&[("status", "o.status")]);

        let p = compile(&filters, &columns, UnmappedKeys::Reject).unwrap();
        assert_eq!(p.render(), "o.status = ANY($1)");
        assert_eq!(
            p.args.values,
            vec![SqlArgument::TextArray(vec![
                "pending".to_string(),
                "paid".to_string()
            ])]
        );
    }

    #[test]
    fn integer_array_binds_as_int_array() {
        let mut filters = FilterMap::new();
        filters.insert(
            "user_id".into(),
            FilterValue::List(vec![Scalar::Int(1), Scalar::Int(2)]),
        );
        let columns = map(&[("user_id", "o.user_id")]);

        let p = compile(&filters, &columns, UnmappedKeys::Reject).unwrap();
        assert_eq!(p.args.values, vec![SqlArgument::IntArray(vec![1, 2])]);
    }

    #[test]
    fn empty_array_is_a_noop() {
        let mut filters = FilterMap::new();
        filters.insert("status".into(), FilterValue::List(vec![]));
        let columns = map(&[("status", "o.status")]);

        let p = compile(&filters, &columns, UnmappedKeys::Reject).unwrap();
        assert!(p.is_empty());
        assert!(p.args.is_empty());
    }

    #[test]
    fn op_ilike_takes_value_verbatim() {
        let mut filters = FilterMap::new();
        filters.insert(
            "customer".into(),
            FilterValue::Op {
                op: "ilike".into(),
                value: Some(ScalarOrList::Scalar(Scalar::Text("%ana%".into()))),
            },
        );
        let columns = map(&[("customer", "o.customer_name")]);

        let p = compile(&filters, &columns, UnmappedKeys::Reject).unwrap();
        assert_eq!(p.render(), "o.customer_name ILIKE $1");
        assert_eq!(p.args.values, vec![SqlArgument::Text("%ana%".to_string())]);
    }

    #[test]
    fn op_in_with_list() {
        let mut filters = FilterMap::new();
        filters.insert(
            "status".into(),
            FilterValue::Op {
                op: "in".into(),
                value: Some(ScalarOrList::List(vec![
                    Scalar::Text("pending".into()),
                    Scalar::Text("preparing".into()),
                ])),
            },
        );
        let columns = map(&[("status", "o.status")]);

        let p = compile(&filters, &columns, UnmappedKeys::Reject).unwrap();
        assert_eq!(p.render(), "o.status = ANY($1)");
    }

    #[test]
    fn comparison_operators_from_allowlist() {
        for (op, sql) in [
            ("=", "="),
            ("<>", "<>"),
            (">", ">"),
            ("<", "<"),
            (">=", ">="),
            ("<=", "<="),
        ] {
            let mut filters = FilterMap::new();
            filters.insert(
                "total".into(),
                FilterValue::Op {
                    op: op.into(),
                    value: Some(ScalarOrList::Scalar(Scalar::Float(10.5))),
                },
            );
            let columns = map(&[("total", "o.total")]);

            let p = compile(&filters, &columns, UnmappedKeys::Reject).unwrap();
            assert_eq!(p.render(), format!("o.total {} $1", sql));
            assert_eq!(p.args.values, vec![SqlArgument::Float(10.5)]);
        }
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let mut filters = FilterMap::new();
        filters.insert(
            "total".into(),
            FilterValue::Op {
                op: "; DROP TABLE orders".into(),
                value: Some(ScalarOrList::Scalar(Scalar::Int(1))),
            },
        );
        let columns = map(&[("total", "o.total")]);

        let err = compile(&filters, &columns, UnmappedKeys::Reject).unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedOperator(_)));
    }

    #[test]
    fn text_search_suffix_wraps_and_escapes() {
        let mut filters = FilterMap::new();
        filters.insert("customer_name__q".into(), text("100%_ana"));
        let columns = map(&[("customer_name__q", "o.customer_name")]);

        let p = compile(&filters, &columns, UnmappedKeys::Reject).unwrap();
        assert_eq!(p.render(), "(o.customer_name::text ILIKE $1)");
        assert_eq!(
            p.args.values,
            vec![SqlArgument::Text("%100\\%\\_ana%".to_string())]
        );
    }

    #[test]
    fn text_search_suffix_falls_back_to_stripped_key() {
        let mut filters = FilterMap::new();
        filters.insert("customer_name__q".into(), text("ana"));
        // map only carries the bare key
        let columns = map(&[("customer_name", "o.customer_name")]);

        let p = compile(&filters, &columns, UnmappedKeys::Reject).unwrap();
        assert_eq!(p.render(), "(o.customer_name::text ILIKE $1)");
    }

    #[test]
    fn null_value_on_unmapped_key_is_ignored() {
        let mut filters = FilterMap::new();
        filters.insert("transient".into(), FilterValue::Null);
        let columns = map(&[("status", "o.status")]);

        let p = compile(&filters, &columns, UnmappedKeys::Reject).unwrap();
        assert!(p.is_empty());
    }

    #[test]
    fn empty_string_on_unmapped_key_is_ignored() {
        let mut filters = FilterMap::new();
        filters.insert("transient".into(), text(""));
        filters.insert("status".into(), text("pending"));
        let columns = map(&[("status", "o.status")]);

        let p = compile(&filters, &columns, UnmappedKeys::Reject).unwrap();
        assert_eq!(p.render(), "o.status = $1");
    }

    #[test]
    fn valueless_op_on_unmapped_key_is_ignored() {
        let mut filters = FilterMap::new();
        filters.insert(
            "transient".into(),
            FilterValue::Op {
                op: ">=".into(),
                value: None,
            },
        );
        filters.insert(
            "gone".into(),
            FilterValue::Op {
                op: "ilike".into(),
                value: Some(ScalarOrList::Scalar(Scalar::Text(String::new()))),
            },
        );
        let columns = map(&[("status", "o.status")]);

        let p = compile(&filters, &columns, UnmappedKeys::Reject).unwrap();
        assert!(p.is_empty());
    }

    #[test]
    fn unmapped_key_rejected_in_strict_mode() {
        let mut filters = FilterMap::new();
        filters.insert("evil; --".into(), text("x"));
        let columns = map(&[("status", "o.status")]);

        let err = compile(&filters, &columns, UnmappedKeys::Reject).unwrap_err();
        match err {
            QueryError::UnmappedKey(key) => assert_eq!(key, "evil; --"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unmapped_key_dropped_in_lenient_mode() {
        let mut filters = FilterMap::new();
        filters.insert("evil; --".into(), text("x"));
        filters.insert("status".into(), text("pending"));
        let columns = map(&[("status", "o.status")]);

        let p = compile(&filters, &columns, UnmappedKeys::Drop).unwrap();
        // the unmapped key never reaches the SQL text
        assert_eq!(p.render(), "o.status = $1");
    }

    #[test]
    fn values_never_appear_in_sql_text() {
        let mut filters = FilterMap::new();
        filters.insert("status".into(), text("'; DROP TABLE orders; --"));
        let columns = map(&[("status", "o.status")]);

        let p = compile(&filters, &columns, UnmappedKeys::Reject).unwrap();
        assert!(!p.render().contains("DROP TABLE"));
        assert_eq!(p.render(), "o.status = $1");
    }

    #[test]
    fn keyset_condition_next_and_prev() {
        let mut p = Predicate::default();
        p.push_keyset(
            "o.created_at",
            "o.id",
            Direction::Next,
            SqlArgument::Text("2024-01-01T00:00:00Z".into()),
            31,
        );
        assert_eq!(
            p.render(),
            "(o.created_at < $1 OR (o.created_at = $1 AND o.id < $2))"
        );

        let mut p = Predicate::default();
        p.push_keyset(
            "o.created_at",
            "o.id",
            Direction::Prev,
            SqlArgument::Text("2024-01-01T00:00:00Z".into()),
            31,
        );
        assert_eq!(
            p.render(),
            "(o.created_at > $1 OR (o.created_at = $1 AND o.id > $2))"
        );
    }

    #[test]
    fn raw_fragments_are_parenthesized() {
        let mut p = Predicate::default();
        p.push_raw("o.status <> 'cancelled'");
        assert_eq!(p.where_clause(), "WHERE (o.status <> 'cancelled')");
    }

    #[test]
    fn parameters_number_sequentially_across_conditions() {
        let mut filters = FilterMap::new();
        filters.insert("status".into(), text("pending"));
        filters.insert("user_id".into(), FilterValue::Scalar(Scalar::Int(3)));
        let columns = map(&[("status", "o.status"), ("user_id", "o.user_id")]);

        let p = compile(&filters, &columns, UnmappedKeys::Reject).unwrap();
        assert_eq!(p.render(), "o.status = $1 AND o.user_id = $2");
        assert_eq!(p.args.len(), 2);
    }
}
