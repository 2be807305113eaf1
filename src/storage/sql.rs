//! Renders [`FindOptions`] / [`Where`] into a sqlx `QueryBuilder`.
//!
//! Identifiers are validated and interpolated; values are always bound. When
//! the entity declares a column type the bound value gets an explicit cast so
//! JSON strings land as `uuid`, `timestamptz`, etc.

use serde_json::Value as JsonValue;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{Postgres, QueryBuilder};

use crate::domain::entity::DELETED_AT;
use crate::domain::query::{Condition, FindOptions, Order, Where};
use crate::storage::error::{ensure_ident, DataResult};

/// Column -> Postgres type lookup (usually `T::column_type`).
pub type ColumnTypes = fn(&str) -> Option<&'static str>;

pub fn push_value(
    qb: &mut QueryBuilder<'static, Postgres>,
    value: &JsonValue,
    sql_type: Option<&'static str>,
) {
    match value {
        JsonValue::Null => {
            qb.push("NULL");
            return;
        }
        JsonValue::Bool(b) => {
            qb.push_bind(*b);
        }
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                qb.push_bind(i);
            } else if let Some(f) = n.as_f64() {
                qb.push_bind(f);
            } else {
                qb.push_bind(n.to_string());
            }
        }
        JsonValue::String(s) => {
            qb.push_bind(s.clone());
        }
        other => {
            qb.push_bind(other.clone()).push("::jsonb");
            return;
        }
    }

    if let Some(t) = sql_type {
        qb.push("::").push(t);
    }
}

fn push_comparison(
    qb: &mut QueryBuilder<'static, Postgres>,
    column: &str,
    op: &str,
    value: &JsonValue,
    types: ColumnTypes,
) -> DataResult<()> {
    let column = ensure_ident(column)?;
    qb.push(column).push(" ").push(op).push(" ");
    push_value(qb, value, types(column));
    Ok(())
}

pub fn push_condition(
    qb: &mut QueryBuilder<'static, Postgres>,
    condition: &Condition,
    types: ColumnTypes,
) -> DataResult<()> {
    match condition {
        Condition::Eq(c, JsonValue::Null) | Condition::IsNull(c) => {
            qb.push(ensure_ident(c)?).push(" IS NULL");
        }
        Condition::Ne(c, JsonValue::Null) | Condition::IsNotNull(c) => {
            qb.push(ensure_ident(c)?).push(" IS NOT NULL");
        }
        Condition::Eq(c, v) => push_comparison(qb, c, "=", v, types)?,
        Condition::Ne(c, v) => push_comparison(qb, c, "<>", v, types)?,
        Condition::Gt(c, v) => push_comparison(qb, c, ">", v, types)?,
        Condition::Gte(c, v) => push_comparison(qb, c, ">=", v, types)?,
        Condition::Lt(c, v) => push_comparison(qb, c, "<", v, types)?,
        Condition::Lte(c, v) => push_comparison(qb, c, "<=", v, types)?,
        Condition::In(c, values) => {
            let column = ensure_ident(c)?;
            if values.is_empty() {
                qb.push("FALSE");
            } else {
                qb.push(column).push(" IN (");
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        qb.push(", ");
                    }
                    push_value(qb, v, types(column));
                }
                qb.push(")");
            }
        }
        Condition::Like(c, pattern) => {
            qb.push(ensure_ident(c)?)
                .push("::text LIKE ")
                .push_bind(pattern.clone());
        }
        Condition::ILike(c, pattern) => {
            qb.push(ensure_ident(c)?)
                .push("::text ILIKE ")
                .push_bind(pattern.clone());
        }
        Condition::Any(inner) => {
            if inner.is_empty() {
                qb.push("FALSE");
            } else {
                qb.push("(");
                for (i, c) in inner.iter().enumerate() {
                    if i > 0 {
                        qb.push(" OR ");
                    }
                    push_condition(qb, c, types)?;
                }
                qb.push(")");
            }
        }
    }
    Ok(())
}

/// Appends ` WHERE ...`. Unless `with_deleted`, soft-deleted rows are excluded.
pub fn push_where(
    qb: &mut QueryBuilder<'static, Postgres>,
    filter: &Where,
    with_deleted: bool,
    types: ColumnTypes,
) -> DataResult<()> {
    let mut first = true;
    let mut next = |qb: &mut QueryBuilder<'static, Postgres>| {
        qb.push(if first { " WHERE " } else { " AND " });
        first = false;
    };

    if !with_deleted {
        next(qb);
        qb.push(DELETED_AT).push(" IS NULL");
    }
    for condition in filter.conditions() {
        next(qb);
        push_condition(qb, condition, types)?;
    }
    Ok(())
}

pub fn push_order(qb: &mut QueryBuilder<'static, Postgres>, order: &[Order]) -> DataResult<()> {
    for (i, o) in order.iter().enumerate() {
        qb.push(if i == 0 { " ORDER BY " } else { ", " });
        qb.push(ensure_ident(&o.column)?)
            .push(" ")
            .push(o.direction.as_sql());
    }
    Ok(())
}

pub fn push_window(qb: &mut QueryBuilder<'static, Postgres>, options: &FindOptions) {
    if let Some(take) = options.take {
        qb.push(" LIMIT ").push_bind(take.min(i64::MAX as u64) as i64);
    }
    if let Some(skip) = options.skip {
        qb.push(" OFFSET ").push_bind(skip.min(i64::MAX as u64) as i64);
    }
}

/// Binds a raw-query parameter by its JSON type.
pub fn bind_json<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &JsonValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        JsonValue::Null => query.bind(None::<String>),
        JsonValue::Bool(b) => query.bind(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(f) = n.as_f64() {
                query.bind(f)
            } else {
                query.bind(n.to_string())
            }
        }
        JsonValue::String(s) => query.bind(s.clone()),
        other => query.bind(other.clone()),
    }
}
