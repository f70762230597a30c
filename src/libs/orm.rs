use std::sync::Arc;

use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use tracing::{debug, info};

use crate::libs::checker::SchemaChecker;
use crate::libs::config::EngineConfig;
use crate::libs::dialect::Dialect;
use crate::libs::dynamic::DynamicModel;
use crate::libs::error::{Error, Result};
use crate::libs::field_editor::FieldEditor;
use crate::libs::inspector::Inspector;
use crate::libs::registry::{LastModifiedCache, ModelRegistry};
use crate::libs::schema::{FieldId, ModelSchema};
use crate::libs::store::DescriptionStore;
use crate::libs::table_editor::TableEditor;

/// Connection to the catalog store plus the runtime-model registry and the
/// last-modified markers. Hand out editors, checkers and inspectors bound
/// to a description.
pub struct SchemaEngine {
    config: EngineConfig,
    pool: AnyPool,
    dialect: Dialect,
    registry: ModelRegistry,
    markers: LastModifiedCache,
    store: Option<Arc<dyn DescriptionStore>>,
}

impl SchemaEngine {
    pub async fn connect(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let dialect = config.dialect()?;
        sqlx::any::install_default_drivers();

        info!(dialect = dialect.name(), "Connecting to catalog store");
        let mut options = AnyPoolOptions::new().max_connections(config.max_connections);
        if config.is_in_memory() {
            // the database lives only as long as its single connection
            options = options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = options.connect(&config.database_url).await?;

        Ok(Self {
            config,
            pool,
            dialect,
            registry: ModelRegistry::new(),
            markers: LastModifiedCache::new(),
            store: None,
        })
    }

    /// Persist descriptions through `store` after every schema edit.
    pub fn with_store(mut self, store: Arc<dyn DescriptionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn markers(&self) -> &LastModifiedCache {
        &self.markers
    }

    pub fn inspector(&self) -> Inspector<'_> {
        Inspector::new(&self.pool, self.dialect, &self.registry)
    }

    /// New description under the configured app label.
    pub fn new_model(&self, name: impl Into<String>) -> Result<ModelSchema> {
        ModelSchema::new(self.config.app_label.clone(), name)
    }

    pub fn table_editor<'a>(&'a self, schema: &'a mut ModelSchema) -> TableEditor<'a> {
        TableEditor::new(self, schema)
    }

    pub fn field_editor<'a>(&'a self, schema: &'a mut ModelSchema, field: FieldId) -> Result<FieldEditor<'a>> {
        if schema.field(field).is_none() {
            return Err(Error::schema(format!(
                "field {field} is not part of model {:?}",
                schema.name()
            )));
        }
        Ok(FieldEditor::new(self, schema, field))
    }

    pub fn checker<'a>(&'a self, schema: &'a ModelSchema) -> SchemaChecker<'a> {
        SchemaChecker::new(schema, &self.markers)
    }

    // -------- Runtime models --------
    /// Build a runtime model for `schema` and register it under its table
    /// name, replacing any earlier one. No catalog I/O.
    pub fn as_model(&self, schema: &ModelSchema) -> Arc<DynamicModel> {
        let model = Arc::new(DynamicModel::build(schema, self.pool.clone(), self.dialect));
        let replaced = self.registry.register(model.clone());
        debug!(
            table = model.table_name(),
            fields = model.fields().len(),
            replaced = replaced.is_some(),
            "built runtime model"
        );
        model
    }

    /// Registered runtime model for `schema` when it is still current,
    /// otherwise a freshly built one.
    pub fn current_model(&self, schema: &ModelSchema) -> Arc<DynamicModel> {
        match self.registry.get(&schema.table_name()) {
            Some(model) if self.checker(schema).is_current(&model) => model,
            _ => self.as_model(schema),
        }
    }

    // -------- Statement execution --------
    /// Run `statements` in order; more than one runs in a single transaction.
    pub(crate) async fn execute_all(&self, statements: &[String]) -> Result<()> {
        match statements {
            [] => Ok(()),
            [single] => {
                debug!(sql = %single, "executing");
                sqlx::query(single).execute(&self.pool).await?;
                Ok(())
            }
            many => {
                let mut tx = self.pool.begin().await?;
                for sql in many {
                    debug!(sql = %sql, "executing");
                    sqlx::query(sql).execute(&mut *tx).await?;
                }
                tx.commit().await?;
                Ok(())
            }
        }
    }

    /// Save hook run after every schema edit: records the last-modified
    /// marker, then hands the description to the store.
    pub(crate) async fn persist(&self, schema: &ModelSchema) -> Result<()> {
        self.checker(schema).update();
        if let Some(store) = &self.store {
            store.save_model(schema).await?;
        }
        Ok(())
    }

    // -------- Execute raw SQL --------
    pub async fn raw(&self, sql: &str) -> Result<u64> {
        let result = sqlx::query(sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
