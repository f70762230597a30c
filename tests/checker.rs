mod common;

use std::sync::Arc;
use std::time::Duration;

use dynaschema::*;

async fn update_schema_timestamp(engine: &SchemaEngine, schema: &mut ModelSchema) {
    tokio::time::sleep(Duration::from_millis(2)).await;
    schema.touch();
    engine.checker(schema).update();
}

#[tokio::test]
async fn test_outdated_model_is_detected() {
    let engine = common::engine().await;
    let mut schema = common::simple_model(&engine);

    let original_model = engine.as_model(&schema);
    assert!(engine.checker(&schema).is_current(&original_model), "model should be current");

    update_schema_timestamp(&engine, &mut schema).await;
    assert!(
        !engine.checker(&schema).is_current(&original_model),
        "model should no longer be current"
    );

    let new_model = engine.as_model(&schema);
    assert!(engine.checker(&schema).is_current(&new_model), "model should again be current");
}

#[tokio::test]
async fn test_marker_cache_law() {
    let engine = common::engine().await;
    let mut schema = common::simple_model(&engine);

    assert!(engine.checker(&schema).get_last_modified().is_none());

    update_schema_timestamp(&engine, &mut schema).await;
    assert_eq!(engine.checker(&schema).get_last_modified(), Some(schema.modified()));

    engine.checker(&schema).delete();
    assert!(engine.checker(&schema).get_last_modified().is_none());

    engine.checker(&schema).update();
    assert_eq!(engine.checker(&schema).get_last_modified(), Some(schema.modified()));
}

#[tokio::test]
async fn test_as_model_replaces_registry_entry() {
    let engine = common::engine().await;
    let schema = common::simple_model(&engine);
    let table = schema.table_name();
    assert!(!engine.inspector().is_registered(&table));

    let first = engine.as_model(&schema);
    assert!(engine.inspector().is_registered(&table));

    let second = engine.as_model(&schema);
    let registered = engine.registry().get(&table).unwrap();
    assert!(Arc::ptr_eq(&registered, &second));
    assert!(!Arc::ptr_eq(&registered, &first));
    assert_eq!(engine.registry().len(), 1);
}

#[tokio::test]
async fn test_current_model_rebuilds_only_when_stale() {
    let engine = common::engine().await;
    let mut schema = common::existing_table(&engine).await;

    let first = engine.current_model(&schema);
    let again = engine.current_model(&schema);
    assert!(Arc::ptr_eq(&first, &again));

    tokio::time::sleep(Duration::from_millis(2)).await;
    schema
        .add_field(FieldSchema::new("count", DataType::Integer).unwrap())
        .unwrap();
    let field = schema.fields()[0].id();
    engine.field_editor(&mut schema, field).unwrap().create().await.unwrap();

    let rebuilt = engine.current_model(&schema);
    assert!(!Arc::ptr_eq(&first, &rebuilt));
    assert!(rebuilt.field("count").is_some());
}

#[tokio::test]
async fn test_delete_last_modified() {
    let engine = common::engine().await;
    let schema = common::existing_table(&engine).await;

    let checker = engine.checker(&schema);
    assert_eq!(checker.get_last_modified(), Some(schema.modified()));
    checker.delete();
    assert!(checker.get_last_modified().is_none());
}

#[tokio::test]
async fn test_field_edits_record_last_modified() {
    let engine = common::engine().await;
    let mut schema = common::existing_table(&engine).await;
    let created = engine.checker(&schema).get_last_modified().unwrap();

    tokio::time::sleep(Duration::from_millis(2)).await;
    let field = schema
        .add_field(FieldSchema::new("count", DataType::Integer).unwrap())
        .unwrap();
    engine.field_editor(&mut schema, field).unwrap().create().await.unwrap();

    let marker = engine.checker(&schema).get_last_modified().unwrap();
    assert_eq!(marker, schema.modified());
    assert!(marker > created);
}
