//! Translation of list-endpoint query strings into repository options.
//!
//! Recognised keys: `page`, `perPage`, `search`, `deleted`, `orders` (JSON
//! array of `{ name, isDesc }`) or its bracket form `orders[0][name]` /
//! `orders[0][isDesc]`. Every other key is a column filter; camelCase keys are
//! mapped to snake_case columns.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::domain::entity::CREATED_AT;
use crate::domain::query::{Condition, Direction, Order, Where};
use crate::storage::error::{ensure_ident, DataResult};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PER_PAGE: i64 = 10;

const RESERVED: [&str; 5] = ["page", "perPage", "search", "orders", "deleted"];

#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub page: i64,
    pub per_page: i64,
    pub search: Option<String>,
    pub orders: Vec<Order>,
    pub filter: Where,
    /// `deleted=true`: include soft-deleted rows.
    pub with_deleted: bool,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
            search: None,
            orders: vec![Order::desc(CREATED_AT)],
            filter: Where::new(),
            with_deleted: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderParam {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    is_desc: JsonValue,
}

impl OrderParam {
    fn into_order(self) -> DataResult<Order> {
        let column = to_snake_case(self.name.as_deref().unwrap_or("createdAt"));
        ensure_ident(&column)?;
        let desc = matches!(&self.is_desc, JsonValue::Bool(true))
            || matches!(&self.is_desc, JsonValue::String(s) if s == "true");
        Ok(Order {
            column,
            direction: if desc { Direction::Desc } else { Direction::Asc },
        })
    }
}

/// `createdAt` -> `created_at`. Already snake_case names pass through.
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn numeric(value: &str) -> Option<JsonValue> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(JsonValue::from(i));
    }
    let f = trimmed.parse::<f64>().ok().filter(|f| f.is_finite())?;
    serde_json::Number::from_f64(f).map(JsonValue::Number)
}

/// `"true"`/`"false"` become booleans, numeric strings become numbers.
pub fn convert_value(value: &str) -> JsonValue {
    if value.eq_ignore_ascii_case("true") {
        return JsonValue::Bool(true);
    }
    if value.eq_ignore_ascii_case("false") {
        return JsonValue::Bool(false);
    }
    numeric(value).unwrap_or_else(|| JsonValue::String(value.to_string()))
}

/// `[..]` values parse as JSON arrays with the same conversion per item.
/// Anything unparsable stays a string.
fn array_value(value: &str) -> Option<Vec<JsonValue>> {
    if !(value.starts_with('[') && value.ends_with(']')) {
        return None;
    }
    match serde_json::from_str::<JsonValue>(value) {
        Ok(JsonValue::Array(items)) => Some(
            items
                .into_iter()
                .map(|item| match item {
                    JsonValue::String(s) => convert_value(&s),
                    other => other,
                })
                .collect(),
        ),
        _ => None,
    }
}

fn filter_condition(column: String, raw: &str) -> Condition {
    if let Some(values) = array_value(raw) {
        return Condition::In(column, values);
    }
    if raw == "null" {
        return Condition::IsNull(column);
    }
    match convert_value(raw) {
        JsonValue::String(s) if s.contains('%') => Condition::ILike(column, s),
        other => Condition::Eq(column, other),
    }
}

fn parse_page(raw: Option<&String>, default: i64) -> i64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v != 0)
        .unwrap_or(default)
}

/// Splits `orders[3][isDesc]` into `(3, "isDesc")`.
fn bracket_order_key(key: &str) -> Option<(usize, &str)> {
    let rest = key.strip_prefix("orders[")?;
    let (index, rest) = rest.split_once("][")?;
    let prop = rest.strip_suffix(']')?;
    Some((index.parse().ok()?, prop))
}

fn is_bracket_order_key(key: &str) -> bool {
    key.starts_with("orders") && key.contains('[') && key.contains(']')
}

impl ListQuery {
    pub fn from_params(params: &HashMap<String, String>) -> DataResult<Self> {
        let page = parse_page(params.get("page"), DEFAULT_PAGE);
        let per_page = parse_page(params.get("perPage"), DEFAULT_PER_PAGE);
        let search = params
            .get("search")
            .filter(|s| !s.is_empty())
            .cloned();
        let with_deleted = params
            .get("deleted")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        let mut orders = Vec::new();
        if let Some(raw) = params.get("orders") {
            if let Ok(parsed) = serde_json::from_str::<Vec<OrderParam>>(raw) {
                for order in parsed {
                    orders.push(order.into_order()?);
                }
            }
        }
        if orders.is_empty() {
            let mut by_index: BTreeMap<usize, OrderParam> = BTreeMap::new();
            for (key, value) in params {
                let Some((index, prop)) = bracket_order_key(key) else {
                    continue;
                };
                let entry = by_index.entry(index).or_insert(OrderParam {
                    name: None,
                    is_desc: JsonValue::Null,
                });
                match prop {
                    "name" => entry.name = Some(value.clone()),
                    "isDesc" => entry.is_desc = JsonValue::String(value.clone()),
                    _ => {}
                }
            }
            for order in by_index.into_values() {
                orders.push(order.into_order()?);
            }
        }
        if orders.is_empty() {
            orders.push(Order::desc(CREATED_AT));
        }

        // Sorted so the rendered SQL is stable.
        let filters: BTreeMap<&String, &String> = params
            .iter()
            .filter(|(k, _)| !RESERVED.contains(&k.as_str()) && !is_bracket_order_key(k))
            .collect();
        let mut filter = Where::new();
        for (key, raw) in filters {
            let column = to_snake_case(key);
            ensure_ident(&column)?;
            filter.push(filter_condition(column, raw));
        }

        Ok(Self {
            page,
            per_page,
            search,
            orders,
            filter,
            with_deleted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults() {
        let q = ListQuery::from_params(&HashMap::new()).unwrap();
        assert_eq!(q, ListQuery::default());
        assert_eq!(q.orders, vec![Order::desc("created_at")]);
    }

    #[test]
    fn zero_page_values_fall_back_to_defaults() {
        let q = ListQuery::from_params(&params(&[("page", "0"), ("perPage", "0")])).unwrap();
        assert_eq!((q.page, q.per_page), (1, 10));

        let q = ListQuery::from_params(&params(&[("page", "3"), ("perPage", "25")])).unwrap();
        assert_eq!((q.page, q.per_page), (3, 25));
    }

    #[test]
    fn orders_from_json() {
        let q = ListQuery::from_params(&params(&[(
            "orders",
            r#"[{"name":"userName","isDesc":false},{"name":"createdAt","isDesc":true}]"#,
        )]))
        .unwrap();
        assert_eq!(
            q.orders,
            vec![Order::asc("user_name"), Order::desc("created_at")]
        );
    }

    #[test]
    fn orders_from_bracket_notation() {
        let q = ListQuery::from_params(&params(&[
            ("orders[1][name]", "mailAddress"),
            ("orders[0][name]", "userName"),
            ("orders[0][isDesc]", "true"),
        ]))
        .unwrap();
        assert_eq!(
            q.orders,
            vec![Order::desc("user_name"), Order::asc("mail_address")]
        );
        assert!(q.filter.is_empty());
    }

    #[test]
    fn filters_are_typed() {
        let q = ListQuery::from_params(&params(&[
            ("invalidFlg", "false"),
            ("permissions", "33"),
            ("mailAddress", "%@example.com"),
            ("note", "null"),
            ("intensity", "[1, \"2\", \"x\"]"),
            ("userName", "alice"),
        ]))
        .unwrap();
        assert_eq!(
            q.filter.conditions(),
            &[
                Condition::In("intensity".into(), vec![json!(1), json!(2), json!("x")]),
                Condition::Eq("invalid_flg".into(), json!(false)),
                Condition::ILike("mail_address".into(), "%@example.com".into()),
                Condition::IsNull("note".into()),
                Condition::Eq("permissions".into(), json!(33)),
                Condition::Eq("user_name".into(), json!("alice")),
            ]
        );
    }

    #[test]
    fn reserved_keys_are_not_filters() {
        let q = ListQuery::from_params(&params(&[
            ("search", "rose"),
            ("deleted", "true"),
            ("page", "2"),
        ]))
        .unwrap();
        assert!(q.filter.is_empty());
        assert_eq!(q.search.as_deref(), Some("rose"));
        assert!(q.with_deleted);
    }

    #[test]
    fn rejects_unsafe_filter_names() {
        assert!(ListQuery::from_params(&params(&[("name;drop", "x")])).is_err());
        assert!(ListQuery::from_params(&params(&[(
            "orders",
            r#"[{"name":"id desc, (select 1)"}]"#
        )]))
        .is_err());
    }

    #[test]
    fn conversion_rules() {
        assert_eq!(convert_value("TRUE"), json!(true));
        assert_eq!(convert_value("1.5"), json!(1.5));
        assert_eq!(convert_value("-7"), json!(-7));
        assert_eq!(convert_value("abc"), json!("abc"));
        assert_eq!(convert_value(""), json!(""));
        assert_eq!(to_snake_case("passwordUpdateTime"), "password_update_time");
        assert_eq!(to_snake_case("user_id"), "user_id");
    }
}
