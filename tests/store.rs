mod common;

use std::sync::Arc;

use dynaschema::*;

async fn engine_with_store() -> (SchemaEngine, SqlDescriptionStore) {
    let engine = common::engine().await;
    let store = SqlDescriptionStore::new(engine.pool().clone(), engine.dialect());
    store.ensure_tables().await.unwrap();
    let engine = engine.with_store(Arc::new(store.clone()));
    (engine, store)
}

#[tokio::test]
async fn test_ensure_tables_is_idempotent() {
    let (engine, store) = engine_with_store().await;
    store.ensure_tables().await.unwrap();
    assert!(engine.inspector().table_exists(MODELS_TABLE).await.unwrap());
    assert!(engine.inspector().table_exists(FIELDS_TABLE).await.unwrap());
}

#[tokio::test]
async fn test_save_and_load_round_trip() {
    let (engine, store) = engine_with_store().await;
    let mut schema = engine.new_model("inventory").unwrap();
    schema
        .add_field(FieldSchema::new("sku", DataType::Character { max_length: 12 }).unwrap())
        .unwrap();
    schema
        .add_field(FieldSchema::new("stock", DataType::Integer).unwrap().nullable(true))
        .unwrap();
    store.save_model(&schema).await.unwrap();

    let loaded = store.load_model(schema.id()).await.unwrap().unwrap();
    assert_eq!(loaded.name(), "inventory");
    assert_eq!(loaded.app_label(), schema.app_label());
    assert_eq!(loaded.modified(), schema.modified());
    assert_eq!(loaded.fields().len(), 2);
    assert_eq!(loaded.fields()[0].data_type(), &DataType::Character { max_length: 12 });
    assert!(loaded.fields()[1].null());
    assert_eq!(loaded.fields()[1].id(), schema.fields()[1].id());

    let found = store
        .find_model(schema.app_label(), "inventory")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id(), schema.id());
}

#[tokio::test]
async fn test_schema_edits_are_persisted() {
    let (engine, store) = engine_with_store().await;
    let mut schema = engine.new_model("simple model").unwrap();
    engine.table_editor(&mut schema).create().await.unwrap();

    let field = schema
        .add_field(FieldSchema::new("count", DataType::Integer).unwrap())
        .unwrap();
    engine.field_editor(&mut schema, field).unwrap().create().await.unwrap();

    schema.set_name("renamed model").unwrap();
    engine.table_editor(&mut schema).alter().await.unwrap();

    let loaded = store.load_model(schema.id()).await.unwrap().unwrap();
    assert_eq!(loaded.name(), "renamed model");
    assert_eq!(loaded.table_name(), "dynamic_models_renamed_model");
    assert_eq!(loaded.modified(), schema.modified());
    assert_eq!(loaded.fields().len(), 1);
    assert_eq!(loaded.fields()[0].column_name(), "count");

    // a model rebuilt from the stored description reads the live table
    let model = engine.as_model(&loaded);
    assert_eq!(model.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_pending_changes_are_not_persisted() {
    let (engine, store) = engine_with_store().await;
    let (mut schema, field) = common::existing_column(&engine).await;
    let old_table = schema.table_name();

    // a rename and a nullability change wait for their editors while
    // another field edit triggers a save
    schema.set_name("renamed model").unwrap();
    schema.set_field_null(field, true).unwrap();
    let extra = schema
        .add_field(FieldSchema::new("note", DataType::Text).unwrap().nullable(true))
        .unwrap();
    engine.field_editor(&mut schema, extra).unwrap().create().await.unwrap();

    let loaded = store.load_model(schema.id()).await.unwrap().unwrap();
    assert_eq!(loaded.name(), "simple model");
    assert_eq!(loaded.table_name(), old_table);
    assert!(!loaded.fields()[0].null());
    assert!(engine.inspector().table_exists(&loaded.table_name()).await.unwrap());

    engine.table_editor(&mut schema).alter().await.unwrap();
    let loaded = store.load_model(schema.id()).await.unwrap().unwrap();
    assert_eq!(loaded.table_name(), "dynamic_models_renamed_model");
    assert!(engine.inspector().table_exists(&loaded.table_name()).await.unwrap());
}

#[tokio::test]
async fn test_list_and_delete_models() {
    let (engine, store) = engine_with_store().await;
    let alpha = engine.new_model("alpha").unwrap();
    let beta = engine.new_model("beta").unwrap();
    store.save_model(&alpha).await.unwrap();
    store.save_model(&beta).await.unwrap();

    let names: Vec<String> = store
        .list_models()
        .await
        .unwrap()
        .iter()
        .map(|m| m.name().to_string())
        .collect();
    assert_eq!(names, vec!["alpha", "beta"]);

    assert!(store.delete_model(alpha.id()).await.unwrap());
    assert!(!store.delete_model(alpha.id()).await.unwrap());
    assert!(store.load_model(alpha.id()).await.unwrap().is_none());
    assert_eq!(store.list_models().await.unwrap().len(), 1);
}
