use super::record::{ResourceInstance, ResourceRecord};
use crate::error::InvalidResourceError;
use crate::lifecycle::ObjectFactory;
use crate::metadata::{collect, CollectMode, LocatedClass, ResourceMetadata};
use crate::uri_template::path;
use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace};

/// Root resource records kept in match order.
///
/// The ordered list is published through [`ArcSwap`]; registration rebuilds
/// it under a writer lock. Sub-resource metadata is collected once and
/// cached per concrete located type.
pub struct ResourceRegistry {
    records: ArcSwap<Vec<Arc<ResourceRecord>>>,
    write_lock: Mutex<()>,
    seq: AtomicU64,
    sub_resources: DashMap<TypeId, Arc<ResourceMetadata>>,
    dynamic_sub_resources: DashMap<TypeId, Arc<ResourceMetadata>>,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: ArcSwap::from_pointee(Vec::new()),
            write_lock: Mutex::new(()),
            seq: AtomicU64::new(0),
            sub_resources: DashMap::new(),
            dynamic_sub_resources: DashMap::new(),
        }
    }

    /// Insert a record; equal records keep insertion order.
    pub fn add(
        &self,
        metadata: Arc<ResourceMetadata>,
        factory: Arc<dyn ObjectFactory>,
        priority: f64,
    ) -> Arc<ResourceRecord> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let record = Arc::new(ResourceRecord::new(metadata, factory, priority, seq));

        let mut records: Vec<Arc<ResourceRecord>> = self.records.load().as_ref().clone();
        records.push(Arc::clone(&record));
        records.sort_by(|a, b| a.compare(b));
        self.records.store(Arc::new(records));

        debug!(
            resource = record.metadata().name(),
            path = record.metadata().path(),
            priority,
            seq,
            "Resource registered"
        );
        record
    }

    /// Roots whose template matches `path`, best first. A root whose match
    /// leaves a remainder qualifies only if it has sub-resources.
    #[must_use]
    pub fn matching_root_resources(&self, path: &str) -> Vec<ResourceInstance> {
        let clean = if path.contains(';') {
            path::strip_matrix_params(path).0
        } else {
            path.to_string()
        };
        let records = self.records.load();
        let mut matching = Vec::new();
        for record in records.iter() {
            let Some(template) = record.metadata().template() else {
                continue;
            };
            if let Some(matched) = template.match_path(&clean) {
                if matched.is_exact() || record.metadata().has_sub_resources() {
                    trace!(
                        resource = record.metadata().name(),
                        template = template.as_str(),
                        tail = matched.tail(),
                        "Root resource matched"
                    );
                    matching.push(ResourceInstance::root(Arc::clone(record), matched));
                }
            }
        }
        matching
    }

    /// First record registered for the resource type `id`.
    #[must_use]
    pub fn get_record(&self, id: TypeId) -> Option<Arc<ResourceRecord>> {
        self.records
            .load()
            .iter()
            .filter(|r| r.metadata().resource_type().id() == id)
            .min_by_key(|r| r.seq())
            .cloned()
    }

    /// Snapshot of all records in match order.
    #[must_use]
    pub fn records(&self) -> Arc<Vec<Arc<ResourceRecord>>> {
        self.records.load_full()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remove_all(&self) {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.records.store(Arc::new(Vec::new()));
        self.sub_resources.clear();
        self.dynamic_sub_resources.clear();
        debug!("All resources removed");
    }

    /// Metadata for an object returned by a locator.
    pub(crate) fn sub_resource_metadata(
        &self,
        class: &LocatedClass,
    ) -> Result<Arc<ResourceMetadata>, InvalidResourceError> {
        match class {
            LocatedClass::Static { id, describe } => {
                if let Some(cached) = self.sub_resources.get(id) {
                    return Ok(Arc::clone(cached.value()));
                }
                let metadata = Arc::new(collect(&describe(), CollectMode::SubResource)?);
                self.sub_resources.insert(*id, Arc::clone(&metadata));
                Ok(metadata)
            }
            LocatedClass::Dynamic { id, class } => {
                if let Some(cached) = self.dynamic_sub_resources.get(id) {
                    return Ok(Arc::clone(cached.value()));
                }
                let metadata = Arc::new(collect(class, CollectMode::SubResource)?);
                self.dynamic_sub_resources.insert(*id, Arc::clone(&metadata));
                Ok(metadata)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MethodDecl, Outcome, ResourceClass};

    struct Panel;

    fn panel_class(methods: &[&str]) -> LocatedClass {
        let mut class = ResourceClass::new::<Panel>();
        for name in methods {
            class = class.method(
                MethodDecl::get(name)
                    .path(name)
                    .handler(|_: &Panel, _| Ok(Outcome::Empty)),
            );
        }
        LocatedClass::Dynamic {
            id: TypeId::of::<Panel>(),
            class: Arc::new(class),
        }
    }

    #[test]
    fn dynamic_metadata_is_collected_once_per_type() {
        let registry = ResourceRegistry::new();
        let first = registry
            .sub_resource_metadata(&panel_class(&["a"]))
            .unwrap();
        let second = registry
            .sub_resource_metadata(&panel_class(&["a", "b"]))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.sub_resource_methods().count(), 1);

        registry.remove_all();
        let fresh = registry
            .sub_resource_metadata(&panel_class(&["a", "b"]))
            .unwrap();
        assert_eq!(fresh.sub_resource_methods().count(), 2);
    }
}
