mod common;

use chrono::{TimeZone, Utc};
use dynaschema::*;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize, PartialEq)]
struct Player {
    id: i64,
    name: String,
    score: i64,
    active: bool,
    rating: Option<f64>,
}

async fn players(engine: &SchemaEngine) -> ModelSchema {
    let mut schema = engine.new_model("players").unwrap();
    schema
        .add_field(FieldSchema::new("name", DataType::Character { max_length: 32 }).unwrap())
        .unwrap();
    schema
        .add_field(FieldSchema::new("score", DataType::Integer).unwrap())
        .unwrap();
    schema
        .add_field(FieldSchema::new("active", DataType::Boolean).unwrap())
        .unwrap();
    schema
        .add_field(FieldSchema::new("rating", DataType::Float).unwrap().nullable(true))
        .unwrap();
    schema
        .add_field(FieldSchema::new("joined", DataType::DateTime).unwrap().nullable(true))
        .unwrap();
    engine.table_editor(&mut schema).create().await.unwrap();
    schema
}

fn player(model: &DynamicModel, name: &str, score: i64) -> DynamicRecord {
    model
        .new_record()
        .with("name", name)
        .with("score", score)
        .with("active", true)
}

#[tokio::test]
async fn test_insert_and_get() {
    let engine = common::engine().await;
    let schema = players(&engine).await;
    let model = engine.as_model(&schema);
    let joined = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();

    let stored = model
        .insert(&player(&model, "ada", 10).with("rating", 4.5).with("joined", joined))
        .await
        .unwrap();
    let id = stored.id().expect("generated id");

    let row = model.get(id).await.unwrap().unwrap();
    assert_eq!(row.get("name"), Some(&Value::from("ada")));
    assert_eq!(row.get("score"), Some(&Value::Integer(10)));
    assert_eq!(row.get("active"), Some(&Value::Boolean(true)));
    assert_eq!(row.get("rating"), Some(&Value::Float(4.5)));
    assert_eq!(row.get("joined"), Some(&Value::DateTime(joined)));

    assert!(model.get(id + 100).await.unwrap().is_none());
}

#[tokio::test]
async fn test_insert_validates_values() {
    let engine = common::engine().await;
    let schema = players(&engine).await;
    let model = engine.as_model(&schema);

    let missing = model.new_record().with("name", "ada");
    assert!(matches!(model.insert(&missing).await, Err(Error::Validation(_))));

    let wrong_type = player(&model, "ada", 1).with("score", "high");
    assert!(matches!(model.insert(&wrong_type).await, Err(Error::Validation(_))));

    let unknown = player(&model, "ada", 1).with("nickname", "a");
    assert!(matches!(model.insert(&unknown).await, Err(Error::Validation(_))));

    let too_long = player(&model, &"x".repeat(33), 1);
    assert!(matches!(model.insert(&too_long).await, Err(Error::Validation(_))));

    assert_eq!(model.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_update_and_delete() {
    let engine = common::engine().await;
    let schema = players(&engine).await;
    let model = engine.as_model(&schema);

    let mut stored = model.insert(&player(&model, "ada", 10)).await.unwrap();
    stored.set("score", 25).set("rating", Value::Null);
    model.update(&stored).await.unwrap();

    let row = model.get(stored.id().unwrap()).await.unwrap().unwrap();
    assert_eq!(row.get("score"), Some(&Value::Integer(25)));
    assert_eq!(row.get("rating"), Some(&Value::Null));

    assert!(model.delete(stored.id().unwrap()).await.unwrap());
    assert!(!model.delete(stored.id().unwrap()).await.unwrap());
    assert!(matches!(model.update(&stored).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_query_builder() {
    let engine = common::engine().await;
    let schema = players(&engine).await;
    let model = engine.as_model(&schema);
    for (name, score) in [("ada", 10), ("grace", 30), ("linus", 20), ("ken", 5)] {
        model.insert(&player(&model, name, score)).await.unwrap();
    }

    let top = model
        .query()
        .filter("score", ">=", 10)
        .order_by("score", "desc")
        .limit(2)
        .fetch_all()
        .await
        .unwrap();
    let names: Vec<_> = top.iter().map(|r| r.get("name").and_then(Value::as_str).unwrap()).collect();
    assert_eq!(names, vec!["grace", "linus"]);

    let skipped = model
        .query()
        .order_by("score", "ASC")
        .offset(3)
        .fetch_all()
        .await
        .unwrap();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].get("name"), Some(&Value::from("grace")));

    let like = model.query().like("name", "race").fetch_one().await.unwrap();
    assert_eq!(like.get("score"), Some(&Value::Integer(30)));

    assert!(matches!(
        model.query().filter("score", "=", 99).fetch_one().await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        model.query().filter("score", "; DROP", 1).fetch_all().await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        model.query().order_by("nickname", "ASC").fetch_all().await,
        Err(Error::Validation(_))
    ));
}

#[tokio::test]
async fn test_like_matches_text_form_of_column() {
    let engine = common::engine().await;
    let schema = players(&engine).await;
    let model = engine.as_model(&schema);
    for (name, score) in [("ada", 10), ("grace", 30), ("linus", 20), ("ken", 5)] {
        model.insert(&player(&model, name, score)).await.unwrap();
    }

    let (sql, _) = model.query().like("score", "3").build_sql().unwrap();
    assert!(sql.ends_with("WHERE CAST(\"score\" AS TEXT) LIKE ?"), "{sql}");

    let rows = model.query().like("score", "3").fetch_all().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), Some(&Value::from("grace")));
}

#[tokio::test]
async fn test_fetch_as_deserializes_rows() {
    let engine = common::engine().await;
    let schema = players(&engine).await;
    let model = engine.as_model(&schema);
    model.insert(&player(&model, "ada", 10)).await.unwrap();

    let all: Vec<Player> = model.all_as().await.unwrap();
    assert_eq!(
        all,
        vec![Player {
            id: 1,
            name: "ada".into(),
            score: 10,
            active: true,
            rating: None,
        }]
    );
}

#[tokio::test]
async fn test_record_from_json() {
    let engine = common::engine().await;
    let schema = players(&engine).await;
    let model = engine.as_model(&schema);

    let record = model
        .record_from_json(&json!({
            "name": "grace",
            "score": 3,
            "active": false,
            "rating": 2,
            "joined": "2024-05-01T08:00:00Z"
        }))
        .unwrap();
    assert_eq!(record.get("rating"), Some(&Value::Float(2.0)));

    let stored = model.insert(&record).await.unwrap();
    let json = model.get(stored.id().unwrap()).await.unwrap().unwrap().to_json();
    assert_eq!(json["name"], "grace");
    assert_eq!(json["active"], false);
    assert_eq!(json["joined"], "2024-05-01T08:00:00Z");

    assert!(model.record_from_json(&json!({"score": "x"})).is_err());
    assert!(model.record_from_json(&json!([1, 2])).is_err());
}
