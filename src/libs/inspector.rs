//! Read-only queries against the live catalog.

use sqlx::{Any, AnyPool, Executor, Row};
use sqlx::any::AnyRow;

use crate::libs::dialect::Dialect;
use crate::libs::error::{Error, Result};
use crate::libs::registry::ModelRegistry;

/// One physical column as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub default_value: Option<String>,
}

impl ColumnInfo {
    fn from_row(dialect: Dialect, row: &AnyRow) -> Result<Self> {
        let name: String = row.try_get("name")?;
        let sql_type: String = row.try_get("sql_type")?;
        let default_value: Option<String> = row.try_get("default_value")?;
        let (nullable, primary_key) = match dialect {
            Dialect::Postgres => {
                let is_nullable: String = row.try_get("is_nullable")?;
                let primary_key: bool = row.try_get("primary_key")?;
                (is_nullable.eq_ignore_ascii_case("YES"), primary_key)
            }
            Dialect::Sqlite => {
                let not_null: i64 = row.try_get("not_null")?;
                let primary_key: i64 = row.try_get("primary_key")?;
                (not_null == 0, primary_key > 0)
            }
        };
        Ok(Self {
            name,
            sql_type,
            nullable,
            primary_key,
            default_value,
        })
    }
}

pub(crate) async fn table_exists_on<'c, E>(executor: E, dialect: Dialect, table: &str) -> Result<bool>
where
    E: Executor<'c, Database = Any>,
{
    let sql = dialect.table_exists_query();
    let row = sqlx::query(&sql)
        .bind(table.to_string())
        .fetch_one(executor)
        .await?;
    let count: i64 = row.try_get("n")?;
    Ok(count > 0)
}

pub(crate) async fn table_columns_on<'c, E>(executor: E, dialect: Dialect, table: &str) -> Result<Vec<ColumnInfo>>
where
    E: Executor<'c, Database = Any>,
{
    let sql = dialect.table_columns_query();
    let rows = sqlx::query(&sql)
        .bind(table.to_string())
        .fetch_all(executor)
        .await?;
    rows.iter().map(|row| ColumnInfo::from_row(dialect, row)).collect()
}

/// Catalog inspector bound to an engine's pool and registry.
pub struct Inspector<'a> {
    pool: &'a AnyPool,
    dialect: Dialect,
    registry: &'a ModelRegistry,
}

impl<'a> Inspector<'a> {
    pub fn new(pool: &'a AnyPool, dialect: Dialect, registry: &'a ModelRegistry) -> Self {
        Self {
            pool,
            dialect,
            registry,
        }
    }

    pub async fn table_exists(&self, table_name: &str) -> Result<bool> {
        table_exists_on(self.pool, self.dialect, table_name).await
    }

    /// Columns of `table_name` in declaration order; empty when the table
    /// does not exist.
    pub async fn table_columns(&self, table_name: &str) -> Result<Vec<ColumnInfo>> {
        table_columns_on(self.pool, self.dialect, table_name).await
    }

    pub async fn table_has_field(&self, table_name: &str, column_name: &str) -> Result<bool> {
        let columns = self.table_columns(table_name).await?;
        Ok(columns.iter().any(|c| c.name == column_name))
    }

    pub async fn field_allows_null(&self, table_name: &str, column_name: &str) -> Result<bool> {
        self.table_columns(table_name)
            .await?
            .into_iter()
            .find(|c| c.name == column_name)
            .map(|c| c.nullable)
            .ok_or_else(|| {
                Error::schema(format!("column {column_name:?} does not exist on {table_name:?}"))
            })
    }

    pub fn is_registered(&self, identifier: &str) -> bool {
        self.registry.contains(identifier)
    }
}
