//! Engine-owned caches keyed by table name.
//!
//! `ModelRegistry` holds the most recently built runtime model per table:
//! created empty with the engine, an entry is replaced by every `as_model`
//! and removed when the table is dropped or renamed away.
//!
//! `LastModifiedCache` holds the `modified` timestamp a caller last
//! acknowledged through the staleness checker.
//!
//! The locks only make the engine shareable by reference. Callers still
//! serialize schema edits to the same model themselves.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::libs::dynamic::DynamicModel;

#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<String, Arc<DynamicModel>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `model` under its table name, returning the entry it replaced.
    pub fn register(&self, model: Arc<DynamicModel>) -> Option<Arc<DynamicModel>> {
        let key = model.table_name().to_string();
        self.models
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, model)
    }

    pub fn get(&self, table_name: &str) -> Option<Arc<DynamicModel>> {
        self.models
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(table_name)
            .cloned()
    }

    pub fn contains(&self, table_name: &str) -> bool {
        self.models
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(table_name)
    }

    pub fn evict(&self, table_name: &str) -> Option<Arc<DynamicModel>> {
        self.models
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(table_name)
    }

    pub fn len(&self) -> usize {
        self.models.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct LastModifiedCache {
    markers: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl LastModifiedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, table_name: &str) -> Option<DateTime<Utc>> {
        self.markers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(table_name)
            .copied()
    }

    pub fn set(&self, table_name: &str, modified: DateTime<Utc>) {
        self.markers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(table_name.to_string(), modified);
    }

    pub fn remove(&self, table_name: &str) -> Option<DateTime<Utc>> {
        self.markers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(table_name)
    }
}
