//! CRUD service layered over any [`Repository`] backend.

use std::marker::PhantomData;

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::app::list_query::ListQuery;
use crate::domain::entity::{Entity, EntityId};
use crate::domain::pagination::Pagination;
use crate::domain::query::{Condition, Criteria, FindOptions, Where};
use crate::storage::error::DataResult;
use crate::storage::repository::{Repository, UpdateResult};

pub struct BaseService<T, R> {
    repository: R,
    _entity: PhantomData<fn() -> T>,
}

impl<T, R: Clone> Clone for BaseService<T, R> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity, R: Repository<T>> BaseService<T, R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            _entity: PhantomData,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub async fn exists(&self, options: FindOptions) -> DataResult<bool> {
        self.repository.exists(options).await
    }

    pub async fn create<P>(&self, partial: &P) -> DataResult<T>
    where
        P: Serialize + Sync + ?Sized,
    {
        self.repository.save(partial).await
    }

    pub async fn save_all<P>(&self, partials: &[P]) -> DataResult<Vec<T>>
    where
        P: Serialize + Sync,
    {
        self.repository.bulk_save(partials).await
    }

    pub async fn update<P>(
        &self,
        criteria: impl Into<Criteria>,
        partial: &P,
    ) -> DataResult<UpdateResult>
    where
        P: Serialize + Sync + ?Sized,
    {
        self.repository.update(criteria.into(), partial).await
    }

    pub async fn update_many<P>(&self, filter: Where, partial: &P) -> DataResult<UpdateResult>
    where
        P: Serialize + Sync + ?Sized,
    {
        self.repository.update_many(filter, partial).await
    }

    /// Soft delete by id.
    pub async fn delete(&self, id: impl Into<EntityId>) -> DataResult<UpdateResult> {
        self.repository.soft_delete(Criteria::Id(id.into())).await
    }

    /// Soft delete by ids or filter.
    pub async fn delete_many(&self, criteria: Criteria) -> DataResult<UpdateResult> {
        self.repository.soft_delete_many(criteria).await
    }

    pub async fn find_one(&self, options: FindOptions) -> DataResult<Option<T>> {
        self.repository.find_one(options).await
    }

    pub async fn find_by_id(&self, id: impl Into<EntityId>) -> DataResult<Option<T>> {
        let id = id.into();
        self.repository
            .find_one_by(Where::new().eq(T::PRIMARY_KEY, id.to_json()))
            .await
    }

    pub async fn find(&self, options: FindOptions) -> DataResult<Vec<T>> {
        self.repository.find(options).await
    }

    /// Like [`find`](Self::find) but returns only the `select`ed columns of
    /// each row. An empty `select` returns whole rows.
    pub async fn find_with_select(
        &self,
        options: FindOptions,
        select: &[&str],
    ) -> DataResult<Vec<JsonValue>> {
        let rows = self.repository.find(options).await?;
        rows.iter()
            .map(|row| -> DataResult<JsonValue> {
                let value = serde_json::to_value(row)?;
                if select.is_empty() {
                    return Ok(value);
                }
                let projected = match value {
                    JsonValue::Object(map) => map
                        .into_iter()
                        .filter(|(k, _)| select.contains(&k.as_str()))
                        .collect(),
                    _ => serde_json::Map::new(),
                };
                Ok(JsonValue::Object(projected))
            })
            .collect()
    }

    /// Paginated listing driven by query-string parameters.
    ///
    /// `search` is matched with `ILIKE %search%` against any of
    /// `search_columns`; the remaining filters are ANDed.
    pub async fn find_all(
        &self,
        query: &ListQuery,
        search_columns: &[&str],
    ) -> DataResult<Pagination<T>> {
        let mut filter = query.filter.clone();
        if let Some(search) = query.search.as_deref() {
            if !search_columns.is_empty() {
                let pattern = format!("%{}%", search);
                filter.push(Condition::Any(
                    search_columns
                        .iter()
                        .map(|c| Condition::ILike(c.to_string(), pattern.clone()))
                        .collect(),
                ));
            }
        }

        let options = FindOptions {
            filter,
            order: query.orders.clone(),
            with_deleted: query.with_deleted,
            ..FindOptions::default()
        };
        debug!(
            table = T::TABLE,
            page = query.page,
            per_page = query.per_page,
            conditions = options.filter.conditions().len(),
            "find_all"
        );
        self.repository
            .get_list(query.page, query.per_page, options)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ScentEntity;
    use crate::domain::query::Order;
    use crate::storage::memory::MemoryRepository;
    use serde_json::json;
    use std::collections::HashMap;

    type ScentService = BaseService<ScentEntity, MemoryRepository<ScentEntity>>;

    async fn service() -> ScentService {
        let svc = BaseService::new(MemoryRepository::new());
        let scents = [
            ("Rose Garden", "floral and soft", 3, true),
            ("Cedar Smoke", "woody", 5, true),
            ("Wild Rosemary", "herbal", 2, false),
            ("Ocean Breeze", "fresh marine", 1, true),
        ];
        let rows: Vec<JsonValue> = scents
            .iter()
            .map(|(name, description, intensity, is_public)| {
                json!({
                    "name": name,
                    "description": description,
                    "intensity": intensity,
                    "is_public": is_public,
                })
            })
            .collect();
        svc.save_all(&rows).await.unwrap();
        svc
    }

    fn query(pairs: &[(&str, &str)]) -> ListQuery {
        let params: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ListQuery::from_params(&params).unwrap()
    }

    #[tokio::test]
    async fn find_all_searches_across_columns() {
        let svc = service().await;
        let page = svc
            .find_all(
                &query(&[("search", "ros"), ("orders[0][name]", "intensity")]),
                &["name", "description"],
            )
            .await
            .unwrap();
        let names: Vec<_> = page.items.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Wild Rosemary", "Rose Garden"]);
        assert_eq!(page.pagination.total, 2);
    }

    #[tokio::test]
    async fn find_all_applies_typed_filters_and_paging() {
        let svc = service().await;
        let page = svc
            .find_all(
                &query(&[
                    ("isPublic", "true"),
                    ("perPage", "2"),
                    ("page", "2"),
                    ("orders", r#"[{"name":"intensity","isDesc":true}]"#),
                ]),
                &[],
            )
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 3);
        assert_eq!(page.pagination.per_page, 2);
        let intensities: Vec<_> = page.items.iter().map(|s| s.intensity).collect();
        assert_eq!(intensities, vec![1]);
    }

    #[tokio::test]
    async fn find_all_hides_deleted_unless_requested() {
        let svc = service().await;
        let cedar = svc
            .find_one(FindOptions::filtered(Where::new().eq("name", "Cedar Smoke")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(svc.delete(cedar.id.clone()).await.unwrap().affected, 1);

        let visible = svc.find_all(&query(&[]), &[]).await.unwrap();
        assert_eq!(visible.pagination.total, 3);

        let all = svc.find_all(&query(&[("deleted", "true")]), &[]).await.unwrap();
        assert_eq!(all.pagination.total, 4);
        assert!(svc.find_by_id(cedar.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_with_select_projects_columns() {
        let svc = service().await;
        let rows = svc
            .find_with_select(
                FindOptions::new().order_by(Order::asc("intensity")),
                &["name", "intensity"],
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], json!({ "name": "Ocean Breeze", "intensity": 1 }));
    }

    #[tokio::test]
    async fn update_and_delete_many() {
        let svc = service().await;
        let res = svc
            .update_many(Where::new().lt("intensity", 3), &json!({ "is_public": false }))
            .await
            .unwrap();
        assert_eq!(res.affected, 2);
        assert!(
            !svc.exists(FindOptions::filtered(
                Where::new().eq("is_public", true).lt("intensity", 3)
            ))
            .await
            .unwrap()
        );

        let res = svc
            .delete_many(Criteria::Filter(Where::new().eq("is_public", false)))
            .await
            .unwrap();
        assert_eq!(res.affected, 2);
        assert_eq!(svc.find(FindOptions::new()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn create_and_update_by_id() {
        let svc = service().await;
        let created = svc
            .create(&json!({ "name": "Fig Leaf", "intensity": 4, "is_public": true }))
            .await
            .unwrap();
        svc.update(created.id.clone(), &json!({ "intensity": 2 }))
            .await
            .unwrap();
        let reloaded = svc.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(reloaded.intensity, 2);
    }
}
