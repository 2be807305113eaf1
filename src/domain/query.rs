//! Typed query specification shared by every repository backend.
//!
//! A [`Where`] is a conjunction of [`Condition`]s; [`Condition::Any`] nests a
//! disjunction (used for free-text search across several columns). Values are
//! JSON scalars so the same filter can be rendered to SQL or evaluated in memory.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

use super::entity::EntityId;

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String, JsonValue),
    Ne(String, JsonValue),
    Gt(String, JsonValue),
    Gte(String, JsonValue),
    Lt(String, JsonValue),
    Lte(String, JsonValue),
    In(String, Vec<JsonValue>),
    /// SQL `LIKE` pattern (`%` and `_` wildcards), case-sensitive.
    Like(String, String),
    /// Case-insensitive `LIKE`.
    ILike(String, String),
    IsNull(String),
    IsNotNull(String),
    /// True when any nested condition holds.
    Any(Vec<Condition>),
}

impl Condition {
    /// Column names referenced by this condition (recursively).
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Condition::Eq(c, _)
            | Condition::Ne(c, _)
            | Condition::Gt(c, _)
            | Condition::Gte(c, _)
            | Condition::Lt(c, _)
            | Condition::Lte(c, _)
            | Condition::In(c, _)
            | Condition::Like(c, _)
            | Condition::ILike(c, _)
            | Condition::IsNull(c)
            | Condition::IsNotNull(c) => vec![c.as_str()],
            Condition::Any(inner) => inner.iter().flat_map(|c| c.columns()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Where {
    conditions: Vec<Condition>,
}

impl Where {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn push(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    pub fn eq(self, column: &str, value: impl Into<JsonValue>) -> Self {
        self.and(Condition::Eq(column.to_string(), value.into()))
    }

    pub fn ne(self, column: &str, value: impl Into<JsonValue>) -> Self {
        self.and(Condition::Ne(column.to_string(), value.into()))
    }

    pub fn gt(self, column: &str, value: impl Into<JsonValue>) -> Self {
        self.and(Condition::Gt(column.to_string(), value.into()))
    }

    pub fn gte(self, column: &str, value: impl Into<JsonValue>) -> Self {
        self.and(Condition::Gte(column.to_string(), value.into()))
    }

    pub fn lt(self, column: &str, value: impl Into<JsonValue>) -> Self {
        self.and(Condition::Lt(column.to_string(), value.into()))
    }

    pub fn lte(self, column: &str, value: impl Into<JsonValue>) -> Self {
        self.and(Condition::Lte(column.to_string(), value.into()))
    }

    pub fn is_in(self, column: &str, values: Vec<JsonValue>) -> Self {
        self.and(Condition::In(column.to_string(), values))
    }

    pub fn like(self, column: &str, pattern: &str) -> Self {
        self.and(Condition::Like(column.to_string(), pattern.to_string()))
    }

    pub fn ilike(self, column: &str, pattern: &str) -> Self {
        self.and(Condition::ILike(column.to_string(), pattern.to_string()))
    }

    pub fn is_null(self, column: &str) -> Self {
        self.and(Condition::IsNull(column.to_string()))
    }

    pub fn is_not_null(self, column: &str) -> Self {
        self.and(Condition::IsNotNull(column.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

impl Order {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: Direction::Desc,
        }
    }
}

/// Options for read operations: filter, ordering, window and soft-delete visibility.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub filter: Where,
    pub order: Vec<Order>,
    pub skip: Option<u64>,
    pub take: Option<u64>,
    /// Include soft-deleted rows.
    pub with_deleted: bool,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filtered(filter: Where) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn order_by(mut self, order: Order) -> Self {
        self.order.push(order);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn take(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }

    pub fn with_deleted(mut self) -> Self {
        self.with_deleted = true;
        self
    }

    /// Same filter and ordering, without any window.
    pub fn unwindowed(&self) -> Self {
        Self {
            skip: None,
            take: None,
            ..self.clone()
        }
    }
}

/// Target rows of a write: one id, several ids, or an arbitrary filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Criteria {
    Id(EntityId),
    Ids(Vec<EntityId>),
    Filter(Where),
}

impl Criteria {
    /// Normalises the criteria into a filter on `primary_key`.
    pub fn into_where(self, primary_key: &str) -> Where {
        match self {
            Criteria::Id(id) => Where::new().eq(primary_key, id.to_json()),
            Criteria::Ids(ids) => {
                Where::new().is_in(primary_key, ids.iter().map(EntityId::to_json).collect())
            }
            Criteria::Filter(w) => w,
        }
    }
}

impl From<EntityId> for Criteria {
    fn from(id: EntityId) -> Self {
        Criteria::Id(id)
    }
}

impl From<Vec<EntityId>> for Criteria {
    fn from(ids: Vec<EntityId>) -> Self {
        Criteria::Ids(ids)
    }
}

impl From<Where> for Criteria {
    fn from(w: Where) -> Self {
        Criteria::Filter(w)
    }
}

impl From<i64> for Criteria {
    fn from(id: i64) -> Self {
        Criteria::Id(EntityId::Int(id))
    }
}

impl From<&str> for Criteria {
    fn from(id: &str) -> Self {
        Criteria::Id(EntityId::from(id))
    }
}

impl From<String> for Criteria {
    fn from(id: String) -> Self {
        Criteria::Id(EntityId::Text(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn criteria_normalise_to_primary_key_filters() {
        let w = Criteria::from(7).into_where("id");
        assert_eq!(w.conditions(), &[Condition::Eq("id".into(), json!(7))]);

        let w = Criteria::from(vec![EntityId::from("a"), EntityId::from("b")]).into_where("id");
        assert_eq!(
            w.conditions(),
            &[Condition::In("id".into(), vec![json!("a"), json!("b")])]
        );

        let filter = Where::new().eq("name", "x");
        assert_eq!(Criteria::from(filter.clone()).into_where("id"), filter);
    }

    #[test]
    fn unwindowed_keeps_filter_and_order() {
        let opts = FindOptions::filtered(Where::new().eq("a", 1))
            .order_by(Order::desc("created_at"))
            .skip(10)
            .take(5);
        let plain = opts.unwindowed();
        assert_eq!(plain.skip, None);
        assert_eq!(plain.take, None);
        assert_eq!(plain.filter, opts.filter);
        assert_eq!(plain.order, opts.order);
    }

    #[test]
    fn any_reports_nested_columns() {
        let c = Condition::Any(vec![
            Condition::ILike("name".into(), "%a%".into()),
            Condition::ILike("note".into(), "%a%".into()),
        ]);
        assert_eq!(c.columns(), vec!["name", "note"]);
    }
}
