//! PostgreSQL implementation of [`Repository`].
//!
//! Rows are read as `row_to_json(table.*)` and deserialized into the entity,
//! so entity field names are the column names. Every primitive (find, count,
//! exists, save, update, delete, soft delete, restore, fetch) also has an
//! `*_in` variant taking an explicit connection, which is how callers run
//! several operations inside one transaction.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{PgConnection, Postgres, QueryBuilder, Row, Transaction};
use tracing::debug;

use crate::domain::entity::{Entity, DELETED_AT, UPDATED_AT};
use crate::domain::query::{Criteria, FindOptions, Where};
use crate::storage::error::{ensure_ident, DataError, DataResult};
use crate::storage::repository::{write_filter, Record, Repository, UpdateResult, WriteResult};
use crate::storage::sql::{bind_json, push_order, push_value, push_where, push_window};
use crate::storage::transaction::finish;

pub struct PgRepository<T> {
    pool: PgPool,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for PgRepository<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _entity: PhantomData,
        }
    }
}

fn decode<T: Entity>(row: &PgRow) -> DataResult<T> {
    let record: JsonValue = row.try_get("record")?;
    Ok(serde_json::from_value(record)?)
}

impl<T: Entity> PgRepository<T> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Starts a transaction on a dedicated connection. Pair with
    /// [`finish`](crate::storage::transaction::finish).
    pub async fn begin(&self) -> DataResult<Transaction<'static, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    /// `SELECT row_to_json(<table>.*) AS record FROM <table>`, ready for a
    /// caller-supplied `WHERE`.
    pub fn create_query_builder(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT row_to_json(");
        qb.push(T::TABLE).push(".*) AS record FROM ").push(T::TABLE);
        qb
    }

    /// Runs a builder produced by [`create_query_builder`](Self::create_query_builder).
    pub async fn fetch(&self, qb: QueryBuilder<'static, Postgres>) -> DataResult<Vec<T>> {
        let mut conn = self.pool.acquire().await?;
        self.fetch_in(&mut conn, qb).await
    }

    pub async fn fetch_in(
        &self,
        conn: &mut PgConnection,
        mut qb: QueryBuilder<'static, Postgres>,
    ) -> DataResult<Vec<T>> {
        let rows = qb.build().fetch_all(&mut *conn).await?;
        rows.iter().map(decode::<T>).collect()
    }

    /// Raw read. Each result row is returned as a JSON object.
    pub async fn query(&self, sql: &str, params: &[JsonValue]) -> DataResult<Vec<JsonValue>> {
        let wrapped = format!("SELECT row_to_json(q.*) AS record FROM ({}) AS q", sql);
        let mut query = sqlx::query(&wrapped);
        for param in params {
            query = bind_json(query, param);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| row.try_get::<JsonValue, _>("record").map_err(DataError::from))
            .collect()
    }

    /// Raw statement; returns the number of affected rows.
    pub async fn execute(&self, sql: &str, params: &[JsonValue]) -> DataResult<u64> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_json(query, param);
        }
        Ok(query.execute(&self.pool).await?.rows_affected())
    }

    fn select(&self, options: &FindOptions) -> DataResult<QueryBuilder<'static, Postgres>> {
        let mut qb = self.create_query_builder();
        push_where(&mut qb, &options.filter, options.with_deleted, T::column_type)?;
        push_order(&mut qb, &options.order)?;
        push_window(&mut qb, options);
        Ok(qb)
    }

    pub async fn find_in(
        &self,
        conn: &mut PgConnection,
        options: &FindOptions,
    ) -> DataResult<Vec<T>> {
        let mut qb = self.select(options)?;
        let rows = qb.build().fetch_all(&mut *conn).await?;
        rows.iter().map(decode::<T>).collect()
    }

    pub async fn find_one_in(
        &self,
        conn: &mut PgConnection,
        filter: Where,
    ) -> DataResult<Option<T>> {
        let options = FindOptions::filtered(filter).take(1);
        Ok(self.find_in(conn, &options).await?.into_iter().next())
    }

    pub async fn count_in(
        &self,
        conn: &mut PgConnection,
        options: &FindOptions,
    ) -> DataResult<u64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM ");
        qb.push(T::TABLE);
        push_where(&mut qb, &options.filter, options.with_deleted, T::column_type)?;
        let total = qb.build_query_scalar::<i64>().fetch_one(&mut *conn).await?;
        Ok(total.max(0) as u64)
    }

    pub async fn exists_in(
        &self,
        conn: &mut PgConnection,
        options: &FindOptions,
    ) -> DataResult<bool> {
        let mut qb = QueryBuilder::new("SELECT EXISTS (SELECT 1 FROM ");
        qb.push(T::TABLE);
        push_where(&mut qb, &options.filter, options.with_deleted, T::column_type)?;
        qb.push(")");
        Ok(qb.build_query_scalar::<bool>().fetch_one(&mut *conn).await?)
    }

    /// Updates the row carrying the record's primary key, inserting it when no
    /// such row exists (or the record has no key).
    pub async fn save_in(&self, conn: &mut PgConnection, mut record: Record) -> DataResult<T> {
        if record.get(T::PRIMARY_KEY).is_some_and(JsonValue::is_null) {
            record.remove(T::PRIMARY_KEY);
        }

        if let Some(id) = record.get(T::PRIMARY_KEY).cloned() {
            let mut changes = record.clone();
            changes.remove(T::PRIMARY_KEY);
            let filter = Where::new().eq(T::PRIMARY_KEY, id);
            let mut qb = self.update_builder(&filter, &changes)?;
            qb.push(" RETURNING row_to_json(")
                .push(T::TABLE)
                .push(".*) AS record");
            if let Some(row) = qb.build().fetch_optional(&mut *conn).await? {
                return decode(&row);
            }
        }

        let mut qb = self.insert_builder(&record)?;
        let row = qb.build().fetch_one(&mut *conn).await?;
        decode(&row)
    }

    pub async fn update_in(
        &self,
        conn: &mut PgConnection,
        criteria: Criteria,
        changes: Record,
    ) -> DataResult<UpdateResult> {
        let filter = write_filter::<T>(criteria, "update")?;
        let mut qb = self.update_builder(&filter, &changes)?;
        let affected = qb.build().execute(&mut *conn).await?.rows_affected();
        Ok(WriteResult { affected })
    }

    pub async fn delete_in(
        &self,
        conn: &mut PgConnection,
        criteria: Criteria,
    ) -> DataResult<WriteResult> {
        let filter = write_filter::<T>(criteria, "delete")?;
        let mut qb = QueryBuilder::new("DELETE FROM ");
        qb.push(T::TABLE);
        push_where(&mut qb, &filter, true, T::column_type)?;
        let affected = qb.build().execute(&mut *conn).await?.rows_affected();
        Ok(WriteResult { affected })
    }

    pub async fn soft_delete_in(
        &self,
        conn: &mut PgConnection,
        criteria: Criteria,
    ) -> DataResult<UpdateResult> {
        self.stamp_deleted(conn, criteria, true).await
    }

    pub async fn restore_in(
        &self,
        conn: &mut PgConnection,
        criteria: Criteria,
    ) -> DataResult<UpdateResult> {
        self.stamp_deleted(conn, criteria, false).await
    }

    fn insert_builder(&self, record: &Record) -> DataResult<QueryBuilder<'static, Postgres>> {
        let mut qb = QueryBuilder::new("INSERT INTO ");
        qb.push(T::TABLE);

        if record.is_empty() {
            qb.push(" DEFAULT VALUES");
        } else {
            qb.push(" (");
            for (i, column) in record.keys().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                qb.push(ensure_ident(column)?);
            }
            qb.push(") VALUES (");
            for (i, (column, value)) in record.iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                push_value(&mut qb, value, T::column_type(column));
            }
            qb.push(")");
        }

        qb.push(" RETURNING row_to_json(")
            .push(T::TABLE)
            .push(".*) AS record");
        Ok(qb)
    }

    /// `UPDATE <table> SET ... WHERE ...` over soft-deleted rows too.
    /// `updated_at` is bumped unless the changes set it explicitly.
    fn update_builder(
        &self,
        filter: &Where,
        changes: &Record,
    ) -> DataResult<QueryBuilder<'static, Postgres>> {
        let mut qb = QueryBuilder::new("UPDATE ");
        qb.push(T::TABLE).push(" SET ");

        let mut first = true;
        for (column, value) in changes {
            if column == T::PRIMARY_KEY {
                continue;
            }
            if !first {
                qb.push(", ");
            }
            first = false;
            qb.push(ensure_ident(column)?).push(" = ");
            push_value(&mut qb, value, T::column_type(column));
        }
        if !changes.contains_key(UPDATED_AT) {
            if !first {
                qb.push(", ");
            }
            qb.push(UPDATED_AT).push(" = now()");
        }

        push_where(&mut qb, filter, true, T::column_type)?;
        Ok(qb)
    }

    async fn stamp_deleted(
        &self,
        conn: &mut PgConnection,
        criteria: Criteria,
        deleted: bool,
    ) -> DataResult<UpdateResult> {
        let op = if deleted { "soft_delete" } else { "restore" };
        let filter = write_filter::<T>(criteria, op)?;
        // Only rows whose state actually changes are counted.
        let filter = if deleted {
            filter.is_null(DELETED_AT)
        } else {
            filter.is_not_null(DELETED_AT)
        };

        let mut qb = QueryBuilder::new("UPDATE ");
        qb.push(T::TABLE).push(" SET ").push(DELETED_AT);
        qb.push(if deleted { " = now()" } else { " = NULL" });
        qb.push(", ").push(UPDATED_AT).push(" = now()");
        push_where(&mut qb, &filter, true, T::column_type)?;

        let affected = qb.build().execute(&mut *conn).await?.rows_affected();
        debug!(table = T::TABLE, op, affected, "deleted_at stamped");
        Ok(WriteResult { affected })
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for PgRepository<T> {
    async fn find(&self, options: FindOptions) -> DataResult<Vec<T>> {
        let mut conn = self.pool.acquire().await?;
        self.find_in(&mut conn, &options).await
    }

    async fn find_and_count(&self, options: FindOptions) -> DataResult<(Vec<T>, u64)> {
        let mut conn = self.pool.acquire().await?;
        let items = self.find_in(&mut conn, &options).await?;
        let total = self.count_in(&mut conn, &options.unwindowed()).await?;
        Ok((items, total))
    }

    async fn count(&self, options: FindOptions) -> DataResult<u64> {
        let mut conn = self.pool.acquire().await?;
        self.count_in(&mut conn, &options).await
    }

    async fn exists(&self, options: FindOptions) -> DataResult<bool> {
        let mut conn = self.pool.acquire().await?;
        self.exists_in(&mut conn, &options).await
    }

    async fn save_record(&self, record: Record) -> DataResult<T> {
        let mut conn = self.pool.acquire().await?;
        self.save_in(&mut conn, record).await
    }

    async fn bulk_save_records(&self, records: Vec<Record>) -> DataResult<Vec<T>> {
        let mut tx = self.begin().await?;
        let outcome = async {
            let mut saved = Vec::with_capacity(records.len());
            for record in records {
                saved.push(self.save_in(&mut tx, record).await?);
            }
            Ok::<_, DataError>(saved)
        }
        .await;
        finish(tx, outcome).await
    }

    async fn update_record(&self, criteria: Criteria, changes: Record) -> DataResult<UpdateResult> {
        let mut conn = self.pool.acquire().await?;
        self.update_in(&mut conn, criteria, changes).await
    }

    async fn delete(&self, criteria: Criteria) -> DataResult<WriteResult> {
        let mut conn = self.pool.acquire().await?;
        self.delete_in(&mut conn, criteria).await
    }

    async fn soft_delete(&self, criteria: Criteria) -> DataResult<UpdateResult> {
        let mut conn = self.pool.acquire().await?;
        self.soft_delete_in(&mut conn, criteria).await
    }

    async fn restore(&self, criteria: Criteria) -> DataResult<UpdateResult> {
        let mut conn = self.pool.acquire().await?;
        self.restore_in(&mut conn, criteria).await
    }
}
