pub mod checker;
pub mod config;
pub mod dialect;
pub mod dynamic;
pub mod error;
pub mod field_editor;
pub mod inspector;
pub mod orm;
pub mod query_builder;
pub mod registry;
pub mod schema;
pub mod store;
pub mod table_editor;
pub mod value;

// Re-export them for easier access from main.rs
pub use checker::*;
pub use config::*;
pub use dialect::*;
pub use dynamic::*;
pub use error::*;
pub use field_editor::*;
pub use inspector::*;
pub use orm::*;
pub use query_builder::*;
pub use registry::*;
pub use schema::*;
pub use store::*;
pub use table_editor::*;
pub use value::*;
