//! Staleness checks for runtime models.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::libs::dynamic::DynamicModel;
use crate::libs::registry::LastModifiedCache;
use crate::libs::schema::ModelSchema;

/// Compares runtime models against one description and manages its
/// last-modified marker. Markers are keyed by the table name.
pub struct SchemaChecker<'a> {
    schema: &'a ModelSchema,
    markers: &'a LastModifiedCache,
}

impl<'a> SchemaChecker<'a> {
    pub fn new(schema: &'a ModelSchema, markers: &'a LastModifiedCache) -> Self {
        Self { schema, markers }
    }

    /// True when `model` was built no earlier than the description's last
    /// modification.
    pub fn is_current(&self, model: &DynamicModel) -> bool {
        let current = model.built_at() >= self.schema.modified();
        if !current {
            debug!(
                table = model.table_name(),
                built_at = %model.built_at(),
                modified = %self.schema.modified(),
                "runtime model is stale"
            );
        }
        current
    }

    /// Record the description's current `modified` as the marker.
    pub fn update(&self) {
        self.markers
            .set(&self.schema.table_name(), self.schema.modified());
    }

    pub fn get_last_modified(&self) -> Option<DateTime<Utc>> {
        self.markers.get(&self.schema.table_name())
    }

    pub fn delete(&self) {
        self.markers.remove(&self.schema.table_name());
    }
}
