//! Table-level schema editor.

use tracing::info;

use crate::libs::error::{Error, Result};
use crate::libs::field_editor::column_definition;
use crate::libs::orm::SchemaEngine;
use crate::libs::schema::ModelSchema;

/// Reconciles the table behind one model description.
///
/// Every mutating call bumps `modified` as its last step so runtime models
/// built earlier are stale, then runs the engine's save hook.
pub struct TableEditor<'a> {
    engine: &'a SchemaEngine,
    schema: &'a mut ModelSchema,
}

impl<'a> TableEditor<'a> {
    pub(crate) fn new(engine: &'a SchemaEngine, schema: &'a mut ModelSchema) -> Self {
        Self { engine, schema }
    }

    pub fn schema(&self) -> &ModelSchema {
        &*self.schema
    }

    /// Whether a table named by the current `table_name` exists.
    pub async fn exists(&self) -> Result<bool> {
        self.engine
            .inspector()
            .table_exists(&self.schema.table_name())
            .await
    }

    /// Create the table with a column for every described field.
    pub async fn create(&mut self) -> Result<()> {
        let table = self.schema.table_name();
        if self.engine.inspector().table_exists(&table).await? {
            return Err(Error::schema(format!("table {table:?} already exists")));
        }

        let dialect = self.engine.dialect();
        let columns: Vec<String> = self
            .schema
            .fields()
            .iter()
            .map(|f| column_definition(dialect, f))
            .collect();
        self.engine
            .execute_all(&[dialect.create_table(&table, &columns)])
            .await?;
        info!(table = %table, columns = columns.len(), "Created table");

        self.schema.commit_all();
        self.finish().await
    }

    /// Drop the table and forget its runtime model and marker.
    pub async fn drop(&mut self) -> Result<()> {
        let table = self.schema.prior_table_name();
        if !self.engine.inspector().table_exists(&table).await? {
            return Err(Error::schema(format!("table {table:?} does not exist")));
        }

        let dialect = self.engine.dialect();
        self.engine.execute_all(&[dialect.drop_table(&table)]).await?;
        info!(table = %table, "Dropped table");

        self.finish().await?;
        for key in [table, self.schema.table_name()] {
            self.engine.registry().evict(&key);
            self.engine.markers().remove(&key);
        }
        Ok(())
    }

    /// Rename the table to match a changed model name. Without a pending
    /// rename nothing is sent to the database, but `modified` still moves.
    pub async fn alter(&mut self) -> Result<()> {
        if self.schema.is_renamed() {
            let from = self.schema.prior_table_name();
            let to = self.schema.table_name();
            let inspector = self.engine.inspector();
            if !inspector.table_exists(&from).await? {
                return Err(Error::schema(format!(
                    "cannot rename {from:?}: table does not exist"
                )));
            }
            if inspector.table_exists(&to).await? {
                return Err(Error::schema(format!(
                    "cannot rename {from:?}: table {to:?} already exists"
                )));
            }

            let dialect = self.engine.dialect();
            self.engine
                .execute_all(&[dialect.rename_table(&from, &to)])
                .await?;
            info!(from = %from, to = %to, "Renamed table");

            self.engine.registry().evict(&from);
            self.engine.markers().remove(&from);
        }

        self.schema.commit_name();
        self.finish().await
    }

    async fn finish(&mut self) -> Result<()> {
        self.schema.touch();
        self.engine.persist(self.schema).await
    }
}
