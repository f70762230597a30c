use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value as Json;
use sqlx::AnyPool;
use sqlx::Row;
use sqlx::any::AnyRow;
use tracing::debug;

use crate::libs::dialect::Dialect;
use crate::libs::error::{Error, Result};
use crate::libs::query_builder::DynamicQuery;
use crate::libs::schema::{DataType, ModelId, ModelSchema, PRIMARY_KEY};
use crate::libs::value::{Value, bind_value, coerce, decode_value};

/// One attribute of a runtime model.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicField {
    pub name: String,
    pub column: String,
    pub data_type: DataType,
    pub null: bool,
}

/// Runtime data-access type built from a `ModelSchema`.
///
/// Snapshot of the description at `built_at`; it does not follow later
/// edits. Ask the staleness checker before reusing one.
#[derive(Debug)]
pub struct DynamicModel {
    model_id: ModelId,
    name: String,
    table_name: String,
    fields: Vec<DynamicField>,
    built_at: DateTime<Utc>,
    pool: AnyPool,
    dialect: Dialect,
}

impl DynamicModel {
    pub(crate) fn build(schema: &ModelSchema, pool: AnyPool, dialect: Dialect) -> Self {
        let fields = schema
            .fields()
            .iter()
            .map(|f| DynamicField {
                name: f.name().to_string(),
                column: f.column_name(),
                data_type: f.data_type().clone(),
                null: f.null(),
            })
            .collect();
        Self {
            model_id: schema.id(),
            name: schema.name().to_string(),
            table_name: schema.table_name(),
            fields,
            built_at: Utc::now(),
            pool,
            dialect,
        }
    }

    pub fn model_id(&self) -> ModelId {
        self.model_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn fields(&self) -> &[DynamicField] {
        &self.fields
    }

    pub fn field(&self, column: &str) -> Option<&DynamicField> {
        self.fields.iter().find(|f| f.column == column)
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub(crate) fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub(crate) fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Type of `column`, including the primary key.
    pub(crate) fn column_type(&self, column: &str) -> Result<DataType> {
        if column == PRIMARY_KEY {
            return Ok(DataType::Integer);
        }
        self.field(column)
            .map(|f| f.data_type.clone())
            .ok_or_else(|| {
                Error::validation(format!("{} has no field {column:?}", self.table_name))
            })
    }

    pub fn new_record(&self) -> DynamicRecord {
        DynamicRecord::default()
    }

    /// Build a record from a JSON object keyed by column name. An `id` key
    /// is taken as the primary key.
    pub fn record_from_json(&self, json: &Json) -> Result<DynamicRecord> {
        let map = json
            .as_object()
            .ok_or_else(|| Error::validation("record JSON must be an object"))?;
        let mut record = DynamicRecord::default();
        for (key, raw) in map {
            if key == PRIMARY_KEY {
                record.id = raw.as_i64();
                continue;
            }
            let data_type = self.column_type(key)?;
            record.values.insert(key.clone(), Value::from_json(raw, &data_type)?);
        }
        Ok(record)
    }

    /// Check every value against its field and return them in field order.
    /// Fields missing from `record` are reported when they are NOT NULL.
    fn validated(&self, record: &DynamicRecord, partial: bool) -> Result<Vec<(&DynamicField, Value)>> {
        for key in record.values.keys() {
            if self.field(key).is_none() {
                return Err(Error::validation(format!(
                    "{} has no field {key:?}",
                    self.table_name
                )));
            }
        }

        let mut out = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = match record.values.get(&field.column) {
                Some(v) => coerce(v.clone(), &field.data_type)?,
                None if partial => continue,
                None => Value::Null,
            };
            if value.is_null() && !field.null {
                return Err(Error::validation(format!(
                    "field {:?} of {} may not be null",
                    field.column, self.table_name
                )));
            }
            out.push((field, value));
        }
        Ok(out)
    }

    pub(crate) fn select_list(&self) -> String {
        let mut cols = vec![self.dialect.quote(PRIMARY_KEY)];
        cols.extend(
            self.fields
                .iter()
                .map(|f| self.dialect.select_expr(&f.column, &f.data_type)),
        );
        cols.join(", ")
    }

    pub(crate) fn decode_row(&self, row: &AnyRow) -> Result<DynamicRecord> {
        let id: i64 = row.try_get(PRIMARY_KEY)?;
        let mut values = BTreeMap::new();
        for field in &self.fields {
            values.insert(
                field.column.clone(),
                decode_value(row, &field.column, &field.data_type)?,
            );
        }
        Ok(DynamicRecord { id: Some(id), values })
    }

    // -------- Insert a record --------
    pub async fn insert(&self, record: &DynamicRecord) -> Result<DynamicRecord> {
        let values = self.validated(record, false)?;
        let d = self.dialect;

        let sql = if values.is_empty() {
            format!(
                "INSERT INTO {} DEFAULT VALUES RETURNING {}",
                d.quote(&self.table_name),
                d.quote(PRIMARY_KEY)
            )
        } else {
            let cols: Vec<String> = values.iter().map(|(f, _)| d.quote(&f.column)).collect();
            let placeholders: Vec<String> = values
                .iter()
                .enumerate()
                .map(|(i, (f, _))| d.value_placeholder(i + 1, &f.data_type))
                .collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
                d.quote(&self.table_name),
                cols.join(", "),
                placeholders.join(", "),
                d.quote(PRIMARY_KEY)
            )
        };

        let mut query = sqlx::query(&sql);
        let mut stored = BTreeMap::new();
        for (field, value) in values {
            stored.insert(field.column.clone(), value.clone());
            query = bind_value(query, value, &field.data_type);
        }

        let row = query.fetch_one(&self.pool).await?;
        let id: i64 = row.try_get(PRIMARY_KEY)?;
        debug!(table = %self.table_name, id, "inserted record");
        Ok(DynamicRecord { id: Some(id), values: stored })
    }

    // -------- Get a record by primary key --------
    pub async fn get(&self, id: i64) -> Result<Option<DynamicRecord>> {
        self.query().filter(PRIMARY_KEY, "=", id).first().await
    }

    // -------- Get all records --------
    pub async fn all(&self) -> Result<Vec<DynamicRecord>> {
        self.query().order_by(PRIMARY_KEY, "ASC").fetch_all().await
    }

    /// Like `all`, deserialized into `T` through the record's JSON form.
    pub async fn all_as<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.query().order_by(PRIMARY_KEY, "ASC").fetch_as().await
    }

    pub fn query(&self) -> DynamicQuery<'_> {
        DynamicQuery::new(self)
    }

    // -------- Update record --------
    /// Write the values present in `record` to the row with its id.
    pub async fn update(&self, record: &DynamicRecord) -> Result<()> {
        let id = record
            .id
            .ok_or_else(|| Error::validation("cannot update a record without an id"))?;
        let values = self.validated(record, true)?;
        if values.is_empty() {
            return Ok(());
        }
        let d = self.dialect;

        let sets: Vec<String> = values
            .iter()
            .enumerate()
            .map(|(i, (f, _))| format!("{} = {}", d.quote(&f.column), d.value_placeholder(i + 1, &f.data_type)))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = {}",
            d.quote(&self.table_name),
            sets.join(", "),
            d.quote(PRIMARY_KEY),
            d.placeholder(values.len() + 1)
        );

        let mut query = sqlx::query(&sql);
        for (field, value) in values {
            query = bind_value(query, value, &field.data_type);
        }
        let result = query.bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("{} row {id}", self.table_name)));
        }
        Ok(())
    }

    // -------- Delete record --------
    /// Returns false when no row had that id.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let d = self.dialect;
        let sql = format!(
            "DELETE FROM {} WHERE {} = {}",
            d.quote(&self.table_name),
            d.quote(PRIMARY_KEY),
            d.placeholder(1)
        );
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) AS n FROM {}", self.dialect.quote(&self.table_name));
        let row = sqlx::query(&sql).fetch_one(&self.pool).await?;
        Ok(row.try_get("n")?)
    }
}

/// A row of a dynamic model: optional primary key plus values keyed by
/// column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicRecord {
    id: Option<i64>,
    values: BTreeMap<String, Value>,
}

impl DynamicRecord {
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.values.insert(column.into(), value.into());
        self
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn to_json(&self) -> Json {
        let mut map = serde_json::Map::new();
        if let Some(id) = self.id {
            map.insert(PRIMARY_KEY.to_string(), Json::from(id));
        }
        for (column, value) in &self.values {
            map.insert(column.clone(), value.to_json());
        }
        Json::Object(map)
    }

    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.to_json())?)
    }
}
