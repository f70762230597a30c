// schema.rs
use std::fmt;

use chrono::{DateTime, Utc};
use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::libs::error::{Error, Result};

pub type ModelId = Uuid;
pub type FieldId = Uuid;

/// Column name reserved for the generated primary key.
pub const PRIMARY_KEY: &str = "id";

/// Longest identifier PostgreSQL keeps without truncating.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Lowercase snake-case identifier built from the ASCII alphanumerics of
/// `name`. Returns an empty string when nothing usable is left.
pub fn slugify(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned.trim().to_case(Case::Snake)
}

fn checked_identifier(raw: &str, what: &str) -> Result<String> {
    let slug = slugify(raw);
    if slug.is_empty() {
        return Err(Error::validation(format!(
            "{what} {raw:?} has no usable characters"
        )));
    }
    if slug.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::validation(format!(
            "{what} {slug:?} is longer than {MAX_IDENTIFIER_LEN} characters"
        )));
    }
    Ok(slug)
}

/// A value together with the version of it that is physically applied.
///
/// Editors locate existing tables and columns through `prior()` and call
/// `commit()` once the database matches `get()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracked<T> {
    current: T,
    applied: T,
}

impl<T: Clone + PartialEq> Tracked<T> {
    pub fn new(value: T) -> Self {
        Self {
            applied: value.clone(),
            current: value,
        }
    }

    pub fn get(&self) -> &T {
        &self.current
    }

    pub fn prior(&self) -> &T {
        &self.applied
    }

    pub fn set(&mut self, value: T) {
        self.current = value;
    }

    pub fn is_changed(&self) -> bool {
        self.current != self.applied
    }

    pub fn commit(&mut self) {
        self.applied = self.current.clone();
    }
}

/// Storage type of a dynamic field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataType {
    Integer,
    Float,
    Boolean,
    Character { max_length: u32 },
    Text,
    DateTime,
}

impl DataType {
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::Boolean => "boolean",
            DataType::Character { .. } => "character",
            DataType::Text => "text",
            DataType::DateTime => "datetime",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Character { max_length } => write!(f, "character({max_length})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Description of one column of a dynamic model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    id: FieldId,
    name: Tracked<String>,
    data_type: DataType,
    null: Tracked<bool>,
}

impl FieldSchema {
    /// A non-nullable field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Result<Self> {
        Self::from_parts(Uuid::new_v4(), name.into(), data_type, false)
    }

    pub fn from_parts(id: FieldId, name: String, data_type: DataType, null: bool) -> Result<Self> {
        let column = checked_identifier(&name, "field name")?;
        if column == PRIMARY_KEY {
            return Err(Error::validation(format!(
                "field name {name:?} collides with the primary key column"
            )));
        }
        if let DataType::Character { max_length: 0 } = data_type {
            return Err(Error::validation("character fields need a max_length above 0"));
        }
        Ok(Self {
            id,
            name: Tracked::new(name),
            data_type,
            null: Tracked::new(null),
        })
    }

    pub fn nullable(mut self, null: bool) -> Self {
        self.null = Tracked::new(null);
        self
    }

    pub fn id(&self) -> FieldId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.name.get()
    }

    pub fn prior_name(&self) -> &str {
        self.name.prior()
    }

    pub fn column_name(&self) -> String {
        slugify(self.name.get())
    }

    /// Column name as it exists in the database right now.
    pub fn prior_column_name(&self) -> String {
        slugify(self.name.prior())
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn null(&self) -> bool {
        *self.null.get()
    }

    pub fn prior_null(&self) -> bool {
        *self.null.prior()
    }

    pub fn is_renamed(&self) -> bool {
        self.column_name() != self.prior_column_name()
    }

    pub fn is_null_changed(&self) -> bool {
        self.null.is_changed()
    }

    pub(crate) fn commit(&mut self) {
        self.name.commit();
        self.null.commit();
    }
}

/// Description of a dynamic model and the table backing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSchema {
    id: ModelId,
    app_label: String,
    name: Tracked<String>,
    modified: DateTime<Utc>,
    fields: Vec<FieldSchema>,
}

impl ModelSchema {
    pub fn new(app_label: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        Self::from_parts(Uuid::new_v4(), app_label.into(), name.into(), Utc::now(), Vec::new())
    }

    /// Rebuild a description read back from storage. The stored state is
    /// taken to be the applied one.
    pub fn from_parts(
        id: ModelId,
        app_label: String,
        name: String,
        modified: DateTime<Utc>,
        fields: Vec<FieldSchema>,
    ) -> Result<Self> {
        checked_identifier(&app_label, "app label")?;
        let mut model = Self {
            id,
            app_label,
            name: Tracked::new(name),
            modified,
            fields: Vec::new(),
        };
        model.check_table_name(model.name())?;
        for field in fields {
            model.add_field(field)?;
        }
        Ok(model)
    }

    fn check_table_name(&self, name: &str) -> Result<String> {
        let table = format!("{}_{}", slugify(&self.app_label), checked_identifier(name, "model name")?);
        if table.len() > MAX_IDENTIFIER_LEN {
            return Err(Error::validation(format!(
                "table name {table:?} is longer than {MAX_IDENTIFIER_LEN} characters"
            )));
        }
        Ok(table)
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn app_label(&self) -> &str {
        &self.app_label
    }

    pub fn name(&self) -> &str {
        self.name.get()
    }

    /// Name the backing table was last created or renamed under.
    pub fn prior_name(&self) -> &str {
        self.name.prior()
    }

    /// Change the display name. The table keeps its old name until the
    /// table editor's `alter()` runs.
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.check_table_name(&name)?;
        self.name.set(name);
        Ok(())
    }

    pub fn table_name(&self) -> String {
        format!("{}_{}", slugify(&self.app_label), slugify(self.name.get()))
    }

    /// Table name as it exists in the database right now.
    pub fn prior_table_name(&self) -> String {
        format!("{}_{}", slugify(&self.app_label), slugify(self.name.prior()))
    }

    pub fn is_renamed(&self) -> bool {
        self.table_name() != self.prior_table_name()
    }

    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    pub fn set_modified(&mut self, modified: DateTime<Utc>) {
        self.modified = modified;
    }

    /// Advance `modified` to now.
    pub fn touch(&mut self) -> DateTime<Utc> {
        self.modified = Utc::now();
        self.modified
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn field(&self, id: FieldId) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub(crate) fn field_mut(&mut self, id: FieldId) -> Option<&mut FieldSchema> {
        self.fields.iter_mut().find(|f| f.id == id)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldSchema> {
        let column = slugify(name);
        self.fields.iter().find(|f| f.column_name() == column)
    }

    fn check_column_free(&self, column: &str, except: Option<FieldId>) -> Result<()> {
        let taken = self
            .fields
            .iter()
            .any(|f| Some(f.id) != except && f.column_name() == column);
        if taken {
            return Err(Error::validation(format!(
                "model {:?} already has a field named {column:?}",
                self.name()
            )));
        }
        Ok(())
    }

    /// Describe a new field. The column is not created until the field
    /// editor's `create()` runs (or the table is created).
    pub fn add_field(&mut self, field: FieldSchema) -> Result<FieldId> {
        self.check_column_free(&field.column_name(), None)?;
        let id = field.id;
        self.fields.push(field);
        Ok(id)
    }

    pub fn rename_field(&mut self, id: FieldId, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        let column = checked_identifier(&name, "field name")?;
        if column == PRIMARY_KEY {
            return Err(Error::validation(format!(
                "field name {name:?} collides with the primary key column"
            )));
        }
        self.check_column_free(&column, Some(id))?;
        let field = self
            .field_mut(id)
            .ok_or_else(|| Error::not_found(format!("field {id}")))?;
        field.name.set(name);
        Ok(())
    }

    pub fn set_field_null(&mut self, id: FieldId, null: bool) -> Result<()> {
        let field = self
            .field_mut(id)
            .ok_or_else(|| Error::not_found(format!("field {id}")))?;
        field.null.set(null);
        Ok(())
    }

    /// Forget a field. Drop its column with the field editor first.
    pub fn remove_field(&mut self, id: FieldId) -> Option<FieldSchema> {
        let index = self.fields.iter().position(|f| f.id == id)?;
        Some(self.fields.remove(index))
    }

    pub(crate) fn commit_name(&mut self) {
        self.name.commit();
    }

    pub(crate) fn commit_all(&mut self) {
        self.name.commit();
        for field in &mut self.fields {
            field.commit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Simple Model"), "simple_model");
        assert_eq!(slugify("  count "), "count");
        assert_eq!(slugify("first-name"), "first_name");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_tracked_commit() {
        let mut name = Tracked::new("a".to_string());
        assert!(!name.is_changed());
        name.set("b".to_string());
        assert!(name.is_changed());
        assert_eq!(name.prior(), "a");
        name.commit();
        assert!(!name.is_changed());
        assert_eq!(name.prior(), "b");
    }

    #[test]
    fn test_rename_keeps_prior_table_name() {
        let mut model = ModelSchema::new("dynamic_models", "simple model").unwrap();
        assert_eq!(model.table_name(), "dynamic_models_simple_model");
        model.set_name("renamed model").unwrap();
        assert_eq!(model.table_name(), "dynamic_models_renamed_model");
        assert_eq!(model.prior_table_name(), "dynamic_models_simple_model");
        assert!(model.is_renamed());
        model.commit_name();
        assert!(!model.is_renamed());
    }

    #[test]
    fn test_field_names_are_unique() {
        let mut model = ModelSchema::new("dynamic_models", "simple model").unwrap();
        model.add_field(FieldSchema::new("count", DataType::Integer).unwrap()).unwrap();
        let dup = FieldSchema::new("Count", DataType::Text).unwrap();
        assert!(matches!(model.add_field(dup), Err(Error::Validation(_))));
    }

    #[test]
    fn test_primary_key_name_is_reserved() {
        assert!(FieldSchema::new("ID", DataType::Integer).is_err());
    }

    #[test]
    fn test_data_type_tag_serialization() {
        let json = serde_json::to_string(&DataType::Character { max_length: 40 }).unwrap();
        assert_eq!(json, r#"{"type":"character","max_length":40}"#);
        let back: DataType = serde_json::from_str(r#"{"type":"date_time"}"#).unwrap();
        assert_eq!(back, DataType::DateTime);
    }
}
