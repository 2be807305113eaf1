//! In-process [`Repository`] backend.
//!
//! Rows are kept as JSON records and filtered with the same [`Where`]
//! semantics the SQL renderer produces, including soft-delete visibility and
//! Postgres' NULL ordering. Used by service tests and for running without a
//! database.

use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;

use crate::domain::entity::{Entity, CREATED_AT, DELETED_AT, UPDATED_AT};
use crate::domain::query::{Condition, Criteria, Direction, FindOptions, Order, Where};
use crate::storage::error::DataResult;
use crate::storage::repository::{write_filter, Record, Repository, UpdateResult, WriteResult};

pub struct MemoryRepository<T> {
    rows: RwLock<Vec<Record>>,
    next_id: AtomicI64,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(0),
            _entity: PhantomData,
        }
    }
}

fn now() -> JsonValue {
    JsonValue::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn field<'a>(record: &'a Record, column: &str) -> &'a JsonValue {
    record.get(column).unwrap_or(&JsonValue::Null)
}

fn as_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// SQL-like comparison of two non-null values. `None` when incomparable.
fn compare(a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (JsonValue::Bool(x), JsonValue::Bool(y)) => Some(x.cmp(y)),
        (JsonValue::String(x), JsonValue::String(y)) => match (as_datetime(x), as_datetime(y)) {
            (Some(dx), Some(dy)) => Some(dx.cmp(&dy)),
            _ => Some(x.cmp(y)),
        },
        (JsonValue::Number(x), JsonValue::String(y)) => {
            x.as_f64()?.partial_cmp(&y.parse::<f64>().ok()?)
        }
        (JsonValue::String(x), JsonValue::Number(y)) => {
            x.parse::<f64>().ok()?.partial_cmp(&y.as_f64()?)
        }
        _ => None,
    }
}

fn as_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// `LIKE` matching with `%` (any run) and `_` (any single char).
///
/// Greedy two-pointer scan: only the most recent `%` is ever retried, so the
/// cost stays `O(text * pattern)` however many wildcards the pattern holds.
fn like(text: &[char], pattern: &[char]) -> bool {
    let (mut t, mut p) = (0, 0);
    // Pattern position after the last `%` and the text position it resumes from.
    let mut retry: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                p += 1;
                retry = Some((p, t));
            }
            Some('_') => {
                t += 1;
                p += 1;
            }
            Some(c) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match retry {
                Some((after_wildcard, from)) => {
                    p = after_wildcard;
                    t = from + 1;
                    retry = Some((after_wildcard, t));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}

fn like_match(value: &JsonValue, pattern: &str, case_insensitive: bool) -> bool {
    let Some(text) = as_text(value) else {
        return false;
    };
    let (text, pattern) = if case_insensitive {
        (text.to_lowercase(), pattern.to_lowercase())
    } else {
        (text, pattern.to_string())
    };
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    like(&text, &pattern)
}

fn compares(
    record: &Record,
    column: &str,
    value: &JsonValue,
    accept: fn(Ordering) -> bool,
) -> bool {
    let current = field(record, column);
    if current.is_null() || value.is_null() {
        return false;
    }
    compare(current, value).is_some_and(accept)
}

fn matches(record: &Record, condition: &Condition) -> bool {
    match condition {
        Condition::Eq(c, JsonValue::Null) | Condition::IsNull(c) => field(record, c).is_null(),
        Condition::Ne(c, JsonValue::Null) | Condition::IsNotNull(c) => !field(record, c).is_null(),
        Condition::Eq(c, v) => compares(record, c, v, Ordering::is_eq),
        Condition::Ne(c, v) => compares(record, c, v, Ordering::is_ne),
        Condition::Gt(c, v) => compares(record, c, v, Ordering::is_gt),
        Condition::Gte(c, v) => compares(record, c, v, Ordering::is_ge),
        Condition::Lt(c, v) => compares(record, c, v, Ordering::is_lt),
        Condition::Lte(c, v) => compares(record, c, v, Ordering::is_le),
        Condition::In(c, values) => values
            .iter()
            .any(|v| compares(record, c, v, Ordering::is_eq)),
        Condition::Like(c, p) => like_match(field(record, c), p, false),
        Condition::ILike(c, p) => like_match(field(record, c), p, true),
        Condition::Any(inner) => inner.iter().any(|c| matches(record, c)),
    }
}

fn matches_all(record: &Record, filter: &Where) -> bool {
    filter.conditions().iter().all(|c| matches(record, c))
}

fn visible(record: &Record, with_deleted: bool) -> bool {
    with_deleted || field(record, DELETED_AT).is_null()
}

/// NULLs sort last ascending and first descending, as in Postgres.
fn order_records(a: &Record, b: &Record, order: &[Order]) -> Ordering {
    for o in order {
        let (x, y) = (field(a, &o.column), field(b, &o.column));
        let ord = match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => compare(x, y).unwrap_or(Ordering::Equal),
        };
        let ord = match o.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn apply_changes(record: &mut Record, changes: &Record, primary_key: &str) {
    for (column, value) in changes {
        if column != primary_key {
            record.insert(column.clone(), value.clone());
        }
    }
    if !changes.contains_key(UPDATED_AT) {
        record.insert(UPDATED_AT.to_string(), now());
    }
}

impl<T: Entity> MemoryRepository<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn decode(record: &Record) -> DataResult<T> {
        Ok(serde_json::from_value(JsonValue::Object(record.clone()))?)
    }

    fn generate_id(&self) -> JsonValue {
        if T::column_type(T::PRIMARY_KEY) == Some("uuid") {
            JsonValue::String(uuid::Uuid::new_v4().to_string())
        } else {
            JsonValue::from(self.next_id.fetch_add(1, AtomicOrdering::SeqCst) + 1)
        }
    }

    async fn select(&self, options: &FindOptions) -> Vec<Record> {
        let rows = self.rows.read().await;
        let mut selected: Vec<Record> = rows
            .iter()
            .filter(|r| visible(r, options.with_deleted) && matches_all(r, &options.filter))
            .cloned()
            .collect();
        drop(rows);

        if !options.order.is_empty() {
            selected.sort_by(|a, b| order_records(a, b, &options.order));
        }
        let skip = options.skip.unwrap_or(0).min(usize::MAX as u64) as usize;
        let take = options.take.map_or(usize::MAX, |t| t.min(usize::MAX as u64) as usize);
        selected.into_iter().skip(skip).take(take).collect()
    }

    /// Applies `mutate` to every row matching `filter` (soft-deleted rows included).
    async fn modify(&self, filter: &Where, mutate: impl Fn(&mut Record)) -> u64 {
        let mut rows = self.rows.write().await;
        let mut affected = 0;
        for record in rows.iter_mut().filter(|r| matches_all(r, filter)) {
            mutate(record);
            affected += 1;
        }
        affected
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for MemoryRepository<T> {
    async fn find(&self, options: FindOptions) -> DataResult<Vec<T>> {
        self.select(&options).await.iter().map(Self::decode).collect()
    }

    async fn find_and_count(&self, options: FindOptions) -> DataResult<(Vec<T>, u64)> {
        let items = self.find(options.clone()).await?;
        let total = self.count(options.unwindowed()).await?;
        Ok((items, total))
    }

    async fn count(&self, options: FindOptions) -> DataResult<u64> {
        Ok(self.select(&options.unwindowed()).await.len() as u64)
    }

    async fn save_record(&self, mut record: Record) -> DataResult<T> {
        let pk = T::PRIMARY_KEY;
        if record.get(pk).is_some_and(JsonValue::is_null) {
            record.remove(pk);
        }

        let mut rows = self.rows.write().await;

        if let Some(id) = record.get(pk).cloned() {
            let existing = rows.iter_mut().find(|r| {
                compare(field(r, pk), &id).is_some_and(Ordering::is_eq)
            });
            if let Some(existing) = existing {
                let mut updated = existing.clone();
                apply_changes(&mut updated, &record, pk);
                let entity = Self::decode(&updated)?;
                *existing = updated;
                return Ok(entity);
            }
        }

        let mut inserted = record;
        match inserted.get(pk).map(JsonValue::as_i64) {
            None => {
                inserted.insert(pk.to_string(), self.generate_id());
            }
            // Later generated ids must not collide with an explicit one.
            Some(Some(explicit)) => {
                self.next_id.fetch_max(explicit, AtomicOrdering::SeqCst);
            }
            Some(None) => {}
        }
        let stamp = now();
        for column in [CREATED_AT, UPDATED_AT] {
            inserted
                .entry(column.to_string())
                .or_insert_with(|| stamp.clone());
        }
        inserted
            .entry(DELETED_AT.to_string())
            .or_insert(JsonValue::Null);

        let entity = Self::decode(&inserted)?;
        rows.push(inserted);
        Ok(entity)
    }

    async fn update_record(&self, criteria: Criteria, changes: Record) -> DataResult<UpdateResult> {
        let filter = write_filter::<T>(criteria, "update")?;
        let affected = self
            .modify(&filter, |r| apply_changes(r, &changes, T::PRIMARY_KEY))
            .await;
        Ok(WriteResult { affected })
    }

    async fn delete(&self, criteria: Criteria) -> DataResult<WriteResult> {
        let filter = write_filter::<T>(criteria, "delete")?;
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|r| !matches_all(r, &filter));
        Ok(WriteResult {
            affected: (before - rows.len()) as u64,
        })
    }

    async fn soft_delete(&self, criteria: Criteria) -> DataResult<UpdateResult> {
        let filter = write_filter::<T>(criteria, "soft_delete")?.is_null(DELETED_AT);
        let affected = self
            .modify(&filter, |r| {
                let stamp = now();
                r.insert(DELETED_AT.to_string(), stamp.clone());
                r.insert(UPDATED_AT.to_string(), stamp);
            })
            .await;
        Ok(WriteResult { affected })
    }

    async fn restore(&self, criteria: Criteria) -> DataResult<UpdateResult> {
        let filter = write_filter::<T>(criteria, "restore")?.is_not_null(DELETED_AT);
        let affected = self
            .modify(&filter, |r| {
                r.insert(DELETED_AT.to_string(), JsonValue::Null);
                r.insert(UPDATED_AT.to_string(), now());
            })
            .await;
        Ok(WriteResult { affected })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{DeviceEntity, ScentEntity};
    use crate::storage::error::DataError;
    use serde_json::json;

    async fn seeded(n: i64) -> MemoryRepository<ScentEntity> {
        let repo = MemoryRepository::new();
        for i in 1..=n {
            repo.save(&json!({
                "name": format!("scent {i}"),
                "intensity": i,
                "is_public": i % 2 == 0,
            }))
            .await
            .unwrap();
        }
        repo
    }

    fn by_intensity() -> FindOptions {
        FindOptions::new().order_by(Order::asc("intensity"))
    }

    fn intensities(items: &[ScentEntity]) -> Vec<i32> {
        items.iter().map(|s| s.intensity).collect()
    }

    #[tokio::test]
    async fn get_list_returns_requested_window_and_total() {
        let repo = seeded(25).await;
        let page = repo.get_list(2, 10, by_intensity()).await.unwrap();
        assert_eq!(intensities(&page.items), (11..=20).collect::<Vec<_>>());
        assert_eq!(page.pagination.total, 25);
        assert_eq!(page.pagination.page, 2);
        assert_eq!(page.pagination.per_page, 10);
    }

    #[tokio::test]
    async fn get_list_last_page_is_partial() {
        let repo = seeded(25).await;
        let page = repo.get_list(3, 10, by_intensity()).await.unwrap();
        assert_eq!(intensities(&page.items), (21..=25).collect::<Vec<_>>());
        assert_eq!(page.pagination.total, 25);
    }

    #[tokio::test]
    async fn get_list_clamps_page_to_one() {
        let repo = seeded(25).await;
        let first = repo.get_list(1, 10, by_intensity()).await.unwrap();
        for page in [0, -5] {
            let clamped = repo.get_list(page, 10, by_intensity()).await.unwrap();
            assert_eq!(intensities(&clamped.items), intensities(&first.items));
            assert_eq!(clamped.pagination.page, 1);
        }
    }

    #[tokio::test]
    async fn get_list_without_page_size() {
        let repo = seeded(7).await;

        let all = repo.get_list(1, 0, FindOptions::new()).await.unwrap();
        assert_eq!(all.items.len(), 7);
        assert_eq!(all.pagination.per_page, 7);
        assert_eq!(all.pagination.total, 7);

        let rest = repo.get_list(2, -1, FindOptions::new()).await.unwrap();
        assert!(rest.items.is_empty());
        assert_eq!(rest.pagination.total, 7);
        assert_eq!(rest.pagination.per_page, 7);
    }

    #[tokio::test]
    async fn get_list_counts_only_matching_rows() {
        let repo = seeded(10).await;
        let options = FindOptions::filtered(Where::new().eq("is_public", true));
        let page = repo.get_list(1, 2, options).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.pagination.total, 5);
    }

    #[tokio::test]
    async fn soft_delete_then_restore() {
        let repo = seeded(3).await;
        let target = repo
            .find_one_by(Where::new().eq("intensity", 2))
            .await
            .unwrap()
            .unwrap();

        let res = repo.soft_delete(target.id.clone().into()).await.unwrap();
        assert_eq!(res.affected, 1);
        assert_eq!(repo.find(FindOptions::new()).await.unwrap().len(), 2);
        assert_eq!(repo.count(FindOptions::new().with_deleted()).await.unwrap(), 3);

        // Already deleted rows are not stamped twice.
        let again = repo.soft_delete(target.id.clone().into()).await.unwrap();
        assert_eq!(again.affected, 0);

        let res = repo.restore(target.id.clone().into()).await.unwrap();
        assert_eq!(res.affected, 1);
        let restored = repo
            .find_one_by(Where::new().eq("id", target.id.as_str()))
            .await
            .unwrap()
            .unwrap();
        assert!(restored.deleted_at.is_none());
        assert_eq!(repo.find(FindOptions::new()).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn save_updates_existing_row() {
        let repo = seeded(1).await;
        let scent = repo.find_one(FindOptions::new()).await.unwrap().unwrap();

        let saved = repo
            .save(&json!({ "id": scent.id, "name": "renamed" }))
            .await
            .unwrap();
        assert_eq!(saved.id, scent.id);
        assert_eq!(saved.name, "renamed");
        assert_eq!(saved.intensity, scent.intensity);
        assert_eq!(repo.count(FindOptions::new()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn save_with_unknown_id_inserts() {
        let repo = MemoryRepository::<ScentEntity>::new();
        let id = uuid::Uuid::new_v4().to_string();
        let saved = repo
            .save(&json!({ "id": id, "name": "new", "intensity": 3, "is_public": true }))
            .await
            .unwrap();
        assert_eq!(saved.id, id);
        assert!(repo.exists(FindOptions::new()).await.unwrap());
    }

    #[tokio::test]
    async fn update_and_delete_by_filter() {
        let repo = seeded(6).await;
        let updated = repo
            .update_many(Where::new().gt("intensity", 4), &json!({ "description": "strong" }))
            .await
            .unwrap();
        assert_eq!(updated.affected, 2);
        assert_eq!(
            repo.count_by(Where::new().eq("description", "strong"))
                .await
                .unwrap(),
            2
        );

        let deleted = repo
            .delete(Where::new().lte("intensity", 2).into())
            .await
            .unwrap();
        assert_eq!(deleted.affected, 2);
        assert_eq!(repo.count(FindOptions::new().with_deleted()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn writes_reject_empty_criteria() {
        let repo = seeded(2).await;
        let err = repo
            .update(Criteria::Filter(Where::new()), &json!({ "name": "x" }))
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::EmptyCriteria("update")));

        let err = repo.delete(Criteria::Ids(vec![])).await.unwrap_err();
        assert!(matches!(err, DataError::EmptyCriteria("delete")));
        assert_eq!(repo.count(FindOptions::new()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn ilike_search_and_null_ordering() {
        let repo = seeded(3).await;
        repo.update(
            Where::new().eq("intensity", 2).into(),
            &json!({ "description": "Warm Amber" }),
        )
        .await
        .unwrap();

        let hits = repo
            .find_by(Where::new().ilike("description", "%amber%"))
            .await
            .unwrap();
        assert_eq!(intensities(&hits), vec![2]);

        let asc = repo
            .find(FindOptions::new().order_by(Order::asc("description")))
            .await
            .unwrap();
        assert_eq!(asc[0].intensity, 2);

        let desc = repo
            .find(FindOptions::new().order_by(Order::desc("description")))
            .await
            .unwrap();
        assert_eq!(desc[2].intensity, 2);
    }

    #[test]
    fn like_wildcards() {
        let m = |t: &str, p: &str| like_match(&json!(t), p, false);
        assert!(m("rose", "r%"));
        assert!(m("rose", "%os%"));
        assert!(m("rose", "r_se"));
        assert!(!m("rose", "R%"));
        assert!(like_match(&json!("rose"), "R%", true));
        assert!(like_match(&json!(42), "4%", false));
        assert!(m("rose", "%"));
        assert!(m("", "%%"));
        assert!(!m("", "_"));
        assert!(m("rosewood", "%o%o%"));
        assert!(!m("rosewood", "%o%x%"));
        assert!(m("a_b", "a_b"));
        assert!(m("mississippi", "%iss%ppi"));
    }

    #[test]
    fn like_with_many_wildcards_finishes() {
        let text = "a".repeat(200);
        let pattern = format!("{}b", "%a".repeat(40));
        let started = std::time::Instant::now();
        assert!(!like_match(&json!(text), &pattern, true));
        assert!(like_match(&json!(text), &format!("{}%", "%a".repeat(40)), true));
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }

    #[tokio::test]
    async fn generated_ids_skip_past_explicit_ones() {
        let repo: MemoryRepository<DeviceEntity> = MemoryRepository::new();
        let device = |id: Option<i64>, serial: &str| {
            let mut record = json!({
                "name": "diffuser",
                "serial_number": serial,
                "is_connected": false,
            });
            if let Some(id) = id {
                record["id"] = json!(id);
            }
            record
        };

        let first = repo.save(&device(None, "s-1")).await.unwrap();
        assert_eq!(first.id, 1);
        let explicit = repo.save(&device(Some(7), "s-7")).await.unwrap();
        assert_eq!(explicit.id, 7);
        let next = repo.save(&device(None, "s-8")).await.unwrap();
        assert_eq!(next.id, 8);

        // A lower explicit id leaves the counter where it is.
        repo.save(&device(Some(3), "s-3")).await.unwrap();
        let after = repo.save(&device(None, "s-9")).await.unwrap();
        assert_eq!(after.id, 9);
        assert_eq!(repo.count(FindOptions::new()).await.unwrap(), 5);
    }
}
