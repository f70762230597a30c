#![allow(dead_code)]

use dynaschema::*;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

/// Engine on a private in-memory SQLite database.
pub async fn engine() -> SchemaEngine {
    init_tracing();
    SchemaEngine::connect(EngineConfig::sqlite_memory())
        .await
        .expect("in-memory engine")
}

pub fn simple_model(engine: &SchemaEngine) -> ModelSchema {
    engine.new_model("simple model").unwrap()
}

/// "simple model" with an existing table and no fields.
pub async fn existing_table(engine: &SchemaEngine) -> ModelSchema {
    let mut schema = simple_model(engine);
    engine.table_editor(&mut schema).create().await.unwrap();
    schema
}

/// "simple model" with an existing table and an integer `count` column.
pub async fn existing_column(engine: &SchemaEngine) -> (ModelSchema, FieldId) {
    let mut schema = existing_table(engine).await;
    let field = schema
        .add_field(FieldSchema::new("count", DataType::Integer).unwrap())
        .unwrap();
    engine
        .field_editor(&mut schema, field)
        .unwrap()
        .create()
        .await
        .unwrap();
    (schema, field)
}
