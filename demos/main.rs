use std::sync::Arc;

use dynaschema::*;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub views: i64,
}

#[tokio::main]
async fn main() -> dynaschema::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EngineConfig::from_env().unwrap_or_else(|_| EngineConfig::sqlite_memory());
    let engine = SchemaEngine::connect(config).await?;
    let store = SqlDescriptionStore::new(engine.pool().clone(), engine.dialect());
    store.ensure_tables().await?;
    let engine = engine.with_store(Arc::new(store.clone()));

    // describe a model and materialize its table
    let mut posts = engine.new_model("blog posts")?;
    posts.add_field(FieldSchema::new("title", DataType::Character { max_length: 120 })?)?;
    engine.table_editor(&mut posts).create().await?;

    let views = posts.add_field(FieldSchema::new("views", DataType::Integer)?)?;
    engine.field_editor(&mut posts, views)?.create().await?;

    let model = engine.current_model(&posts);
    model
        .insert(&model.new_record().with("title", "Hello").with("views", 3))
        .await?;
    model
        .insert(&model.new_record().with("title", "Again").with("views", 12))
        .await?;

    let popular: Vec<Post> = model
        .query()
        .filter("views", ">", 5)
        .fetch_as()
        .await?;
    println!("popular posts: {:?}", popular);

    // rename the model; the old runtime model is now stale
    posts.set_name("articles")?;
    engine.table_editor(&mut posts).alter().await?;
    println!(
        "{} still current: {}",
        model.table_name(),
        engine.checker(&posts).is_current(&model)
    );

    let model = engine.current_model(&posts);
    println!("{} holds {} rows", model.table_name(), model.count().await?);

    let stored = store.list_models().await?;
    println!("stored descriptions: {:?}", stored.iter().map(|m| m.name()).collect::<Vec<_>>());

    engine.table_editor(&mut posts).drop().await?;
    store.delete_model(posts.id()).await?;
    engine.close().await;
    Ok(())
}
