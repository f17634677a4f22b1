//! PostgreSQL implementation of the warehouse ports.

use crate::error::map_sqlx_error;
use crate::sql::{self, ColumnType};
use async_trait::async_trait;
use gridiron_core::ids::{quote_ident, validate_identifier};
use gridiron_core::ports::{RowPredicate, Warehouse, WarehouseTransaction};
use gridiron_core::{Error, Result, Table, TableRef, Value};
use sqlx::postgres::Postgres;
use sqlx::query_builder::Separated;
use sqlx::{PgPool, QueryBuilder, Row, Transaction};
use std::collections::HashMap;
use tracing::debug;

/// PostgreSQL warehouse backed by a connection pool.
#[derive(Clone)]
pub struct PgWarehouse {
    pool: PgPool,
}

impl PgWarehouse {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn ensure_schema(&self, schema: &str) -> Result<()> {
        validate_identifier(schema)?;
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema)))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn table_exists(&self, table: &TableRef) -> Result<bool> {
        let row = sqlx::query(
            r#"SELECT EXISTS (
                   SELECT 1 FROM information_schema.tables
                   WHERE table_schema = $1 AND table_name = $2
               )"#,
        )
        .bind(table.schema())
        .bind(table.name())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.get::<bool, _>(0))
    }

    async fn primary_key(&self, table: &TableRef) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"SELECT kcu.column_name
               FROM information_schema.table_constraints tc
               JOIN information_schema.key_column_usage kcu
                 ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
                AND tc.table_name = kcu.table_name
               WHERE tc.constraint_type = 'PRIMARY KEY'
                 AND tc.table_schema = $1
                 AND tc.table_name = $2
               ORDER BY kcu.ordinal_position"#,
        )
        .bind(table.schema())
        .bind(table.name())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.iter().map(|r| r.get::<String, _>("column_name")).collect())
    }

    async fn row_count(&self, table: &TableRef) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table.quoted()))
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(count as u64)
    }

    async fn columns(&self, table: &TableRef) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"SELECT column_name
               FROM information_schema.columns
               WHERE table_schema = $1 AND table_name = $2
               ORDER BY ordinal_position"#,
        )
        .bind(table.schema())
        .bind(table.name())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.iter().map(|r| r.get::<String, _>("column_name")).collect())
    }

    async fn count_matching(&self, table: &TableRef, predicate: &RowPredicate) -> Result<u64> {
        let column = quote_ident(predicate.column());
        let count: i64 = match predicate {
            RowPredicate::IsNull(_) => {
                sqlx::query_scalar::<_, i64>(&format!(
                    "SELECT COUNT(*) FROM {} WHERE {} IS NULL",
                    table.quoted(),
                    column
                ))
                .fetch_one(&self.pool)
                .await
            }
            RowPredicate::OutsideRange { min, max, .. } => {
                sqlx::query_scalar::<_, i64>(&format!(
                    "SELECT COUNT(*) FROM {} WHERE {col} < $1 OR {col} > $2",
                    table.quoted(),
                    col = column
                ))
                .bind(*min)
                .bind(*max)
                .fetch_one(&self.pool)
                .await
            }
        }
        .map_err(map_sqlx_error)?;
        Ok(count as u64)
    }

    async fn begin(&self) -> Result<Box<dyn WarehouseTransaction>> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

/// One open PostgreSQL transaction. Dropped without commit, it rolls back.
pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PgTransaction {
    /// Storage type of each column of an existing relation, as seen inside
    /// this transaction. Empty when the relation does not exist.
    async fn column_types(&mut self, table: &TableRef) -> Result<HashMap<String, ColumnType>> {
        let rows = sqlx::query(
            r#"SELECT column_name::text AS column_name, data_type::text AS data_type
               FROM information_schema.columns
               WHERE table_schema = $1 AND table_name = $2"#,
        )
        .bind(table.schema())
        .bind(table.name())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .iter()
            .map(|r| {
                (
                    r.get::<String, _>("column_name"),
                    ColumnType::from_data_type(&r.get::<String, _>("data_type")),
                )
            })
            .collect())
    }

    async fn insert_rows(&mut self, table: &TableRef, rows: &Table, types: &[ColumnType]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let cells = sql::coerce_rows(rows, types)?;
        let columns = sql::column_list(rows.columns());
        let mut inserted = 0u64;

        for chunk in cells.chunks(sql::rows_per_statement(rows.width())) {
            let mut qb: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO {} ({}) ", table.quoted(), columns));
            qb.push_values(chunk.iter(), |mut b, row| {
                for (value, ty) in row.iter().zip(types) {
                    push_value(&mut b, value, *ty);
                }
            });
            let result = qb
                .build()
                .execute(&mut *self.tx)
                .await
                .map_err(map_sqlx_error)?;
            inserted += result.rows_affected();
        }

        debug!(table = %table, rows = inserted, "Inserted rows");
        Ok(inserted)
    }

    async fn create_with(&mut self, table: &TableRef, columns: &[String], types: &[ColumnType]) -> Result<()> {
        if columns.is_empty() {
            return Err(Error::MalformedTable(format!("cannot create {} with no columns", table)));
        }
        sqlx::query(&sql::create_table_sql(table, columns, types))
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

/// Bind one coerced cell with an explicit cast to its column type.
fn push_value(b: &mut Separated<'_, '_, Postgres, &'static str>, value: &Value, ty: ColumnType) {
    match value {
        Value::Null => {
            b.push("NULL");
        }
        Value::Bool(v) => {
            b.push_bind(*v);
        }
        Value::Int(i) => {
            b.push_bind(*i);
        }
        Value::Float(f) => {
            b.push_bind(*f);
        }
        Value::Text(s) => {
            b.push_bind(s.clone());
        }
    }
    b.push_unseparated(format!("::{}", ty.sql_name()));
}

#[async_trait]
impl WarehouseTransaction for PgTransaction {
    async fn create_table(&mut self, table: &TableRef, rows: &Table) -> Result<u64> {
        let types = sql::infer_column_types(rows);
        self.create_with(table, rows.columns(), &types).await?;
        self.insert_rows(table, rows, &types).await
    }

    async fn stage_rows(&mut self, target: &TableRef, rows: &Table) -> Result<TableRef> {
        let staging = target.with_suffix("_staging")?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", staging.quoted()))
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        let types = sql::resolve_column_types(rows, &self.column_types(target).await?);
        self.create_with(&staging, rows.columns(), &types).await?;
        self.insert_rows(&staging, rows, &types).await?;
        Ok(staging)
    }

    async fn upsert_from(
        &mut self,
        target: &TableRef,
        staging: &TableRef,
        columns: &[String],
        key: &[String],
    ) -> Result<()> {
        if key.is_empty() {
            return Err(Error::InvalidRequest(format!("upsert into {} needs a key", target)));
        }
        let statement = sql::upsert_sql(target, staging, columns, key);
        let result = sqlx::query(&statement)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        debug!(table = %target, affected = result.rows_affected(), "Upserted staged rows");
        Ok(())
    }

    async fn delete_where_in(&mut self, table: &TableRef, column: &str, values: &[Value]) -> Result<u64> {
        if values.is_empty() {
            return Ok(0);
        }
        let ty = match self.column_types(table).await?.get(column) {
            Some(ty) => *ty,
            None => ColumnType::infer(values),
        };
        let values = values
            .iter()
            .map(|v| sql::coerce(v, ty, column))
            .collect::<Result<Vec<_>>>()?;
        let mut deleted = 0u64;

        for chunk in values.chunks(sql::MAX_BIND_PARAMS) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "DELETE FROM {} WHERE {} IN (",
                table.quoted(),
                quote_ident(column)
            ));
            let mut list = qb.separated(", ");
            for value in chunk {
                push_value(&mut list, value, ty);
            }
            qb.push(")");
            let result = qb
                .build()
                .execute(&mut *self.tx)
                .await
                .map_err(map_sqlx_error)?;
            deleted += result.rows_affected();
        }
        Ok(deleted)
    }

    async fn append_rows(&mut self, table: &TableRef, rows: &Table) -> Result<u64> {
        let types = sql::resolve_column_types(rows, &self.column_types(table).await?);
        self.insert_rows(table, rows, &types).await
    }

    async fn drop_table(&mut self, table: &TableRef) -> Result<()> {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table.quoted()))
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn count_rows(&mut self, table: &TableRef) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table.quoted()))
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(count as u64)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }
}
