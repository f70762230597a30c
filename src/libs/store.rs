//! Persistence of model and field descriptions.
//!
//! Descriptions live in two metadata tables next to the tables they
//! describe. Only applied state is stored: names and nullability are saved
//! as they exist in the database, so a description read back has no pending
//! changes and always points at the live table.

use async_trait::async_trait;
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::libs::dialect::Dialect;
use crate::libs::error::{Error, Result};
use crate::libs::schema::{DataType, FieldSchema, ModelId, ModelSchema};
use crate::libs::value::{format_datetime, parse_datetime};

pub const MODELS_TABLE: &str = "dynaschema_model_schemas";
pub const FIELDS_TABLE: &str = "dynaschema_field_schemas";

#[async_trait]
pub trait DescriptionStore: Send + Sync {
    /// Insert or replace the description and its fields.
    async fn save_model(&self, schema: &ModelSchema) -> Result<()>;

    async fn load_model(&self, id: ModelId) -> Result<Option<ModelSchema>>;

    async fn find_model(&self, app_label: &str, name: &str) -> Result<Option<ModelSchema>>;

    async fn list_models(&self) -> Result<Vec<ModelSchema>>;

    /// Returns false when nothing was stored under `id`.
    async fn delete_model(&self, id: ModelId) -> Result<bool>;
}

/// `DescriptionStore` backed by the engine's own database.
#[derive(Debug, Clone)]
pub struct SqlDescriptionStore {
    pool: AnyPool,
    dialect: Dialect,
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::validation(format!("invalid stored id {raw:?}: {e}")))
}

impl SqlDescriptionStore {
    pub fn new(pool: AnyPool, dialect: Dialect) -> Self {
        Self { pool, dialect }
    }

    /// Create the metadata tables if they are missing.
    pub async fn ensure_tables(&self) -> Result<()> {
        let d = self.dialect;
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                app_label TEXT NOT NULL,
                name TEXT NOT NULL,
                modified TEXT NOT NULL,
                UNIQUE(app_label, name)
            )",
            d.quote(MODELS_TABLE)
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                model_id TEXT NOT NULL REFERENCES {}(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                data_type TEXT NOT NULL,
                is_null {} NOT NULL
            )",
            d.quote(FIELDS_TABLE),
            d.quote(MODELS_TABLE),
            d.column_type(&DataType::Boolean)
        ))
        .execute(&self.pool)
        .await?;

        debug!("description tables verified");
        Ok(())
    }

    fn select_models_sql(&self, filter: &str) -> String {
        format!(
            "SELECT id, app_label, name, modified FROM {} {filter} ORDER BY app_label, name",
            self.dialect.quote(MODELS_TABLE)
        )
    }

    async fn hydrate(&self, row: &AnyRow) -> Result<ModelSchema> {
        let id = parse_id(&row.try_get::<String, _>("id")?)?;
        let app_label: String = row.try_get("app_label")?;
        let name: String = row.try_get("name")?;
        let modified = parse_datetime(&row.try_get::<String, _>("modified")?)?;

        let d = self.dialect;
        let sql = format!(
            "SELECT id, name, data_type, is_null FROM {} WHERE model_id = {} ORDER BY position",
            d.quote(FIELDS_TABLE),
            d.placeholder(1)
        );
        let rows = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_all(&self.pool)
            .await?;

        let mut fields = Vec::with_capacity(rows.len());
        for r in rows {
            let field_id = parse_id(&r.try_get::<String, _>("id")?)?;
            let field_name: String = r.try_get("name")?;
            let data_type: DataType = serde_json::from_str(&r.try_get::<String, _>("data_type")?)?;
            let null = match r.try_get::<bool, _>("is_null") {
                Ok(v) => v,
                Err(_) => r.try_get::<i64, _>("is_null")? != 0,
            };
            fields.push(FieldSchema::from_parts(field_id, field_name, data_type, null)?);
        }

        ModelSchema::from_parts(id, app_label, name, modified, fields)
    }
}

#[async_trait]
impl DescriptionStore for SqlDescriptionStore {
    async fn save_model(&self, schema: &ModelSchema) -> Result<()> {
        let d = self.dialect;
        let model_id = schema.id().to_string();
        let mut tx = self.pool.begin().await?;

        let upsert = format!(
            "INSERT INTO {} (id, app_label, name, modified) VALUES ({}, {}, {}, {}) \
             ON CONFLICT (id) DO UPDATE SET app_label = excluded.app_label, \
             name = excluded.name, modified = excluded.modified",
            d.quote(MODELS_TABLE),
            d.placeholder(1),
            d.placeholder(2),
            d.placeholder(3),
            d.placeholder(4)
        );
        sqlx::query(&upsert)
            .bind(model_id.clone())
            .bind(schema.app_label().to_string())
            .bind(schema.prior_name().to_string())
            .bind(format_datetime(&schema.modified()))
            .execute(&mut *tx)
            .await?;

        let clear = format!(
            "DELETE FROM {} WHERE model_id = {}",
            d.quote(FIELDS_TABLE),
            d.placeholder(1)
        );
        sqlx::query(&clear)
            .bind(model_id.clone())
            .execute(&mut *tx)
            .await?;

        let insert = format!(
            "INSERT INTO {} (id, model_id, position, name, data_type, is_null) \
             VALUES ({}, {}, {}, {}, {}, {})",
            d.quote(FIELDS_TABLE),
            d.placeholder(1),
            d.placeholder(2),
            d.placeholder(3),
            d.placeholder(4),
            d.placeholder(5),
            d.placeholder(6)
        );
        for (position, field) in schema.fields().iter().enumerate() {
            sqlx::query(&insert)
                .bind(field.id().to_string())
                .bind(model_id.clone())
                .bind(position as i64)
                .bind(field.prior_name().to_string())
                .bind(serde_json::to_string(field.data_type())?)
                .bind(field.prior_null())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(model = %schema.id(), name = schema.prior_name(), "saved description");
        Ok(())
    }

    async fn load_model(&self, id: ModelId) -> Result<Option<ModelSchema>> {
        let sql = self.select_models_sql(&format!("WHERE id = {}", self.dialect.placeholder(1)));
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => Ok(Some(self.hydrate(&r).await?)),
            None => Ok(None),
        }
    }

    async fn find_model(&self, app_label: &str, name: &str) -> Result<Option<ModelSchema>> {
        let sql = self.select_models_sql(&format!(
            "WHERE app_label = {} AND name = {}",
            self.dialect.placeholder(1),
            self.dialect.placeholder(2)
        ));
        let row = sqlx::query(&sql)
            .bind(app_label.to_string())
            .bind(name.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => Ok(Some(self.hydrate(&r).await?)),
            None => Ok(None),
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelSchema>> {
        let sql = self.select_models_sql("");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        let mut models = Vec::with_capacity(rows.len());
        for r in &rows {
            models.push(self.hydrate(r).await?);
        }
        Ok(models)
    }

    async fn delete_model(&self, id: ModelId) -> Result<bool> {
        let d = self.dialect;
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!(
            "DELETE FROM {} WHERE model_id = {}",
            d.quote(FIELDS_TABLE),
            d.placeholder(1)
        ))
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE id = {}",
            d.quote(MODELS_TABLE),
            d.placeholder(1)
        ))
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
