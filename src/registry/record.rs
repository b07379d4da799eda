use crate::lifecycle::ObjectFactory;
use crate::metadata::{Instance, ResourceMetadata, Scope};
use crate::uri_template::TemplateMatch;
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// A registered root resource: metadata, how to get an instance, and its
/// registration priority. Immutable once created.
pub struct ResourceRecord {
    metadata: Arc<ResourceMetadata>,
    factory: Arc<dyn ObjectFactory>,
    priority: f64,
    seq: u64,
}

impl ResourceRecord {
    pub(crate) fn new(
        metadata: Arc<ResourceMetadata>,
        factory: Arc<dyn ObjectFactory>,
        priority: f64,
        seq: u64,
    ) -> Self {
        Self {
            metadata,
            factory,
            priority,
            seq,
        }
    }

    #[must_use]
    pub fn metadata(&self) -> &Arc<ResourceMetadata> {
        &self.metadata
    }

    #[must_use]
    pub fn factory(&self) -> &Arc<dyn ObjectFactory> {
        &self.factory
    }

    #[must_use]
    pub fn priority(&self) -> f64 {
        self.priority
    }

    /// Registration sequence number.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    #[must_use]
    pub fn scope(&self) -> Scope {
        self.factory.scope()
    }

    /// Root ordering: more specific template first, then higher priority,
    /// then earlier registration.
    pub(crate) fn compare(&self, other: &Self) -> Ordering {
        let by_template = match (self.metadata.template(), other.metadata.template()) {
            (Some(a), Some(b)) => b.compare(a),
            _ => Ordering::Equal,
        };
        by_template
            .then_with(|| other.priority.total_cmp(&self.priority))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl Debug for ResourceRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRecord")
            .field("resource", &self.metadata.name())
            .field("path", &self.metadata.path())
            .field("scope", &self.scope())
            .field("priority", &self.priority)
            .field("seq", &self.seq)
            .finish()
    }
}

/// A resource resolved for one request: a root record or a located
/// sub-resource object, with the template match that reached it.
#[derive(Clone)]
pub struct ResourceInstance {
    metadata: Arc<ResourceMetadata>,
    record: Option<Arc<ResourceRecord>>,
    instance: Option<Instance>,
    matched: TemplateMatch,
}

impl ResourceInstance {
    pub(crate) fn root(record: Arc<ResourceRecord>, matched: TemplateMatch) -> Self {
        Self {
            metadata: Arc::clone(record.metadata()),
            record: Some(record),
            instance: None,
            matched,
        }
    }

    pub(crate) fn located(
        metadata: Arc<ResourceMetadata>,
        instance: Instance,
        matched: TemplateMatch,
    ) -> Self {
        Self {
            metadata,
            record: None,
            instance: Some(instance),
            matched,
        }
    }

    #[must_use]
    pub fn metadata(&self) -> &Arc<ResourceMetadata> {
        &self.metadata
    }

    /// The root record; `None` for located sub-resources.
    #[must_use]
    pub fn record(&self) -> Option<&Arc<ResourceRecord>> {
        self.record.as_ref()
    }

    /// The object methods are invoked on, once acquired.
    #[must_use]
    pub fn instance(&self) -> Option<&Instance> {
        self.instance.as_ref()
    }

    pub(crate) fn set_instance(&mut self, instance: Instance) {
        self.instance = Some(instance);
    }

    #[must_use]
    pub fn matched(&self) -> &TemplateMatch {
        &self.matched
    }
}

impl Debug for ResourceInstance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceInstance")
            .field("resource", &self.metadata.name())
            .field("root", &self.record.is_some())
            .field("matched", &self.matched)
            .finish()
    }
}
