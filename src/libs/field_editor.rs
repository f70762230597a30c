//! Column-level schema editor.

use tracing::info;

use crate::libs::dialect::Dialect;
use crate::libs::error::{Error, Result};
use crate::libs::inspector::table_columns_on;
use crate::libs::orm::SchemaEngine;
use crate::libs::schema::{FieldId, FieldSchema, ModelSchema};

/// Column definition for `field` as used inside CREATE TABLE.
pub(crate) fn column_definition(dialect: Dialect, field: &FieldSchema) -> String {
    dialect.column_definition(&field.column_name(), field.data_type(), field.null())
}

/// Reconciles the column behind one field of a model description.
///
/// Columns live on the model's physical table, so a pending model rename
/// does not move them until the table editor's `alter()` runs.
pub struct FieldEditor<'a> {
    engine: &'a SchemaEngine,
    schema: &'a mut ModelSchema,
    field_id: FieldId,
}

impl<'a> FieldEditor<'a> {
    pub(crate) fn new(engine: &'a SchemaEngine, schema: &'a mut ModelSchema, field_id: FieldId) -> Self {
        Self {
            engine,
            schema,
            field_id,
        }
    }

    fn field(&self) -> Result<&FieldSchema> {
        self.schema.field(self.field_id).ok_or_else(|| {
            Error::schema(format!(
                "field {} was removed from model {:?}",
                self.field_id,
                self.schema.name()
            ))
        })
    }

    pub async fn exists(&self) -> Result<bool> {
        let column = self.field()?.column_name();
        self.engine
            .inspector()
            .table_has_field(&self.schema.prior_table_name(), &column)
            .await
    }

    /// Add the column with the field's type and nullability.
    pub async fn create(&mut self) -> Result<()> {
        let table = self.schema.prior_table_name();
        let field = self.field()?;
        let column = field.column_name();

        let inspector = self.engine.inspector();
        if !inspector.table_exists(&table).await? {
            return Err(Error::schema(format!(
                "cannot add {column:?}: table {table:?} does not exist"
            )));
        }
        if inspector.table_has_field(&table, &column).await? {
            return Err(Error::schema(format!(
                "column {column:?} already exists on {table:?}"
            )));
        }

        let statements = self
            .engine
            .dialect()
            .add_column(&table, &column, field.data_type(), field.null());
        self.engine.execute_all(&statements).await?;
        info!(table = %table, column = %column, data_type = %field.data_type(), "Added column");

        self.commit_field();
        self.finish().await
    }

    pub async fn drop(&mut self) -> Result<()> {
        let table = self.schema.prior_table_name();
        let column = self.field()?.prior_column_name();
        if !self.engine.inspector().table_has_field(&table, &column).await? {
            return Err(Error::schema(format!(
                "column {column:?} does not exist on {table:?}"
            )));
        }

        let dialect = self.engine.dialect();
        self.engine
            .execute_all(&[dialect.drop_column(&table, &column)])
            .await?;
        info!(table = %table, column = %column, "Dropped column");

        self.finish().await
    }

    /// Apply a pending rename and/or nullability change. Both run in one
    /// transaction, rename first.
    pub async fn alter(&mut self) -> Result<()> {
        let table = self.schema.prior_table_name();
        let field = self.field()?;
        let from = field.prior_column_name();
        let to = field.column_name();
        let renamed = field.is_renamed();
        let null_changed = field.is_null_changed();
        let null = field.null();

        if renamed || null_changed {
            let inspector = self.engine.inspector();
            if !inspector.table_has_field(&table, &from).await? {
                return Err(Error::schema(format!(
                    "cannot alter {from:?}: column does not exist on {table:?}"
                )));
            }
            if renamed && inspector.table_has_field(&table, &to).await? {
                return Err(Error::schema(format!(
                    "cannot rename {from:?}: column {to:?} already exists on {table:?}"
                )));
            }
            self.apply_alter(&table, &from, &to, renamed, null_changed, null)
                .await?;
            info!(
                table = %table,
                from = %from,
                to = %to,
                null,
                renamed,
                null_changed,
                "Altered column"
            );
        }

        self.commit_field();
        self.finish().await
    }

    async fn apply_alter(
        &self,
        table: &str,
        from: &str,
        to: &str,
        renamed: bool,
        null_changed: bool,
        null: bool,
    ) -> Result<()> {
        let dialect = self.engine.dialect();
        let mut tx = self.engine.pool().begin().await?;

        if renamed {
            sqlx::query(&dialect.rename_column(table, from, to))
                .execute(&mut *tx)
                .await?;
        }
        if null_changed {
            let statements = match dialect.set_nullable(table, to, null) {
                Some(sql) => vec![sql],
                None => {
                    let columns = table_columns_on(&mut *tx, dialect, table).await?;
                    dialect.rebuild_table(table, &columns, to, null)
                }
            };
            for sql in &statements {
                sqlx::query(sql).execute(&mut *tx).await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    fn commit_field(&mut self) {
        if let Some(field) = self.schema.field_mut(self.field_id) {
            field.commit();
        }
    }

    async fn finish(&mut self) -> Result<()> {
        self.schema.touch();
        self.engine.persist(self.schema).await
    }
}
