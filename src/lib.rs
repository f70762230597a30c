//! Runtime-defined database models.
//!
//! A [`ModelSchema`] describes a table and its fields. The [`SchemaEngine`]
//! reconciles the database with that description through table and field
//! editors, builds [`DynamicModel`]s from it, and tells callers when a
//! model they hold has gone stale.

pub mod libs;

pub use libs::*;
