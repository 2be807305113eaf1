//! The generic repository contract.
//!
//! Backends implement the primitive reads and writes; everything else
//! (single-row lookups, `*_by` shorthands, typed saves and `get_list`) is
//! derived here so every backend paginates identically.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::domain::entity::Entity;
use crate::domain::pagination::{PageMode, PageRequest, Pagination};
use crate::domain::query::{Criteria, FindOptions, Where};
use crate::storage::error::{DataError, DataResult};

/// A (partial) row as column -> value.
pub type Record = serde_json::Map<String, JsonValue>;

/// Rows touched by an update, delete, soft-delete or restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteResult {
    pub affected: u64,
}

pub type UpdateResult = WriteResult;
pub type DeleteResult = WriteResult;

/// Serializes a partial entity (any struct or `json!` object) into a [`Record`].
pub fn to_record<P: Serialize + ?Sized>(partial: &P) -> DataResult<Record> {
    match serde_json::to_value(partial)? {
        JsonValue::Object(map) => Ok(map),
        _ => Err(DataError::InvalidRecord),
    }
}

/// Resolves write criteria into a filter, refusing ones that would match
/// nothing or everything.
pub fn write_filter<T: Entity>(criteria: Criteria, op: &'static str) -> DataResult<Where> {
    match &criteria {
        Criteria::Ids(ids) if ids.is_empty() => return Err(DataError::EmptyCriteria(op)),
        Criteria::Filter(w) if w.is_empty() => return Err(DataError::EmptyCriteria(op)),
        _ => {}
    }
    Ok(criteria.into_where(T::PRIMARY_KEY))
}

#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// All rows matching `options`. Honours `skip`/`take` when set.
    async fn find(&self, options: FindOptions) -> DataResult<Vec<T>>;

    /// The window selected by `options` plus the count of all matching rows
    /// (ignoring `skip`/`take`).
    async fn find_and_count(&self, options: FindOptions) -> DataResult<(Vec<T>, u64)>;

    async fn count(&self, options: FindOptions) -> DataResult<u64>;

    /// Inserts the record, or updates the row whose primary key it carries.
    async fn save_record(&self, record: Record) -> DataResult<T>;

    async fn update_record(&self, criteria: Criteria, changes: Record) -> DataResult<UpdateResult>;

    /// Hard delete.
    async fn delete(&self, criteria: Criteria) -> DataResult<DeleteResult>;

    /// Stamps `deleted_at`; the rows disappear from default reads.
    async fn soft_delete(&self, criteria: Criteria) -> DataResult<UpdateResult>;

    /// Clears `deleted_at`.
    async fn restore(&self, criteria: Criteria) -> DataResult<UpdateResult>;

    async fn exists(&self, options: FindOptions) -> DataResult<bool> {
        Ok(self.count(options).await? > 0)
    }

    async fn bulk_save_records(&self, records: Vec<Record>) -> DataResult<Vec<T>> {
        let mut saved = Vec::with_capacity(records.len());
        for record in records {
            saved.push(self.save_record(record).await?);
        }
        Ok(saved)
    }

    async fn find_by(&self, filter: Where) -> DataResult<Vec<T>> {
        self.find(FindOptions::filtered(filter)).await
    }

    async fn find_one(&self, options: FindOptions) -> DataResult<Option<T>> {
        Ok(self.find(options.take(1)).await?.into_iter().next())
    }

    async fn find_one_by(&self, filter: Where) -> DataResult<Option<T>> {
        self.find_one(FindOptions::filtered(filter)).await
    }

    async fn count_by(&self, filter: Where) -> DataResult<u64> {
        self.count(FindOptions::filtered(filter)).await
    }

    async fn save<P>(&self, partial: &P) -> DataResult<T>
    where
        P: Serialize + Sync + ?Sized,
    {
        self.save_record(to_record(partial)?).await
    }

    async fn bulk_save<P>(&self, partials: &[P]) -> DataResult<Vec<T>>
    where
        P: Serialize + Sync,
    {
        let records = partials
            .iter()
            .map(to_record)
            .collect::<DataResult<Vec<_>>>()?;
        self.bulk_save_records(records).await
    }

    async fn update<P>(&self, criteria: Criteria, partial: &P) -> DataResult<UpdateResult>
    where
        P: Serialize + Sync + ?Sized,
    {
        self.update_record(criteria, to_record(partial)?).await
    }

    async fn update_many<P>(&self, filter: Where, partial: &P) -> DataResult<UpdateResult>
    where
        P: Serialize + Sync + ?Sized,
    {
        self.update_record(Criteria::Filter(filter), to_record(partial)?)
            .await
    }

    async fn soft_delete_many(&self, criteria: Criteria) -> DataResult<UpdateResult> {
        self.soft_delete(criteria).await
    }

    /// Paginated read.
    ///
    /// With `per_page > 0` this returns one window and the full total. With
    /// `per_page <= 0`, page 1 returns every row and any other page returns no
    /// rows but still reports the total; both report `perPage = total`.
    async fn get_list(
        &self,
        page: i64,
        per_page: i64,
        options: FindOptions,
    ) -> DataResult<Pagination<T>> {
        let request = PageRequest::new(page, per_page);
        let mode = request.mode();
        debug!(table = T::TABLE, page = request.page(), per_page, ?mode, "get_list");

        match mode {
            PageMode::Window { skip, take } => {
                let (items, total) = self
                    .find_and_count(FindOptions {
                        skip: Some(skip),
                        take: Some(take),
                        ..options
                    })
                    .await?;
                Ok(request.into_result(items, total))
            }
            PageMode::Everything => {
                let items = self.find(options).await?;
                let total = items.len() as u64;
                Ok(request.into_result(items, total))
            }
            PageMode::CountOnly => {
                let total = self.count(options).await?;
                Ok(request.into_result(Vec::new(), total))
            }
        }
    }
}
