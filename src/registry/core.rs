use super::application::{Application, ApplicationReport, ApplicationResource, ApplicationValidator};
use super::record::{ResourceInstance, ResourceRecord};
use super::resources::ResourceRegistry;
use crate::error::InvalidResourceError;
use crate::lifecycle::{factory_for, ObjectFactory};
use crate::metadata::{collect, CollectMode, Instance, LocatedClass, Resource, ResourceClass, ResourceMetadata};
use crate::providers::{ProviderRecord, ProvidersRegistry};
use crate::runtime_config::RuntimeConfig;
use std::any::{Any, TypeId};
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

/// Resources, providers and the registration policy of one application.
///
/// A `Registry` is an ordinary value: build one per application (or per
/// test), register everything at startup, then share it with a
/// [`Dispatcher`](crate::dispatcher::Dispatcher) behind an `Arc`. Lookups
/// never block; registration takes a short writer lock.
pub struct Registry {
    resources: ResourceRegistry,
    providers: Arc<ProvidersRegistry>,
    validator: Mutex<ApplicationValidator>,
    config: RuntimeConfig,
}

impl Registry {
    /// A registry with the built-in providers at system priority.
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        let providers =
            ProvidersRegistry::with_builtins(config.default_priority, config.system_priority);
        Self::with_providers(config, providers)
    }

    /// A registry with no providers at all.
    #[must_use]
    pub fn without_builtins(config: RuntimeConfig) -> Self {
        let providers =
            ProvidersRegistry::with_priorities(config.default_priority, config.system_priority);
        Self::with_providers(config, providers)
    }

    fn with_providers(config: RuntimeConfig, providers: ProvidersRegistry) -> Self {
        Self {
            resources: ResourceRegistry::new(),
            providers: Arc::new(providers),
            validator: Mutex::new(ApplicationValidator::new()),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[must_use]
    pub fn providers(&self) -> &Arc<ProvidersRegistry> {
        &self.providers
    }

    #[must_use]
    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    /// Register `T` as a class; instances come from its constructor.
    pub fn add_resource<T: Resource>(&self) -> Result<Arc<ResourceRecord>, InvalidResourceError> {
        self.add_resource_class(T::describe(), None)
    }

    pub fn add_resource_class(
        &self,
        class: ResourceClass,
        priority: Option<f64>,
    ) -> Result<Arc<ResourceRecord>, InvalidResourceError> {
        self.validate_resource(&class)?;
        let metadata = collect(&class, CollectMode::RootClass)?;
        let factory = factory_for(&metadata, None)?;
        Ok(self.insert(metadata, factory, priority))
    }

    /// Register a ready instance of `T`, served as a singleton.
    pub fn add_resource_instance<T: Resource>(
        &self,
        value: T,
        priority: Option<f64>,
    ) -> Result<Arc<ResourceRecord>, InvalidResourceError> {
        self.add_instance(Arc::new(value), T::describe(), priority)
    }

    /// Register a ready instance described by `class`.
    pub fn add_instance(
        &self,
        instance: Instance,
        class: ResourceClass,
        priority: Option<f64>,
    ) -> Result<Arc<ResourceRecord>, InvalidResourceError> {
        self.validate_resource(&class)?;
        let metadata = collect(&class, CollectMode::RootInstance)?;
        let factory = factory_for(&metadata, Some(instance))?;
        Ok(self.insert(metadata, factory, priority))
    }

    /// Register a class with a caller-supplied factory.
    pub fn add_resource_with_factory(
        &self,
        class: ResourceClass,
        factory: Arc<dyn ObjectFactory>,
        priority: Option<f64>,
    ) -> Result<Arc<ResourceRecord>, InvalidResourceError> {
        self.validate_resource(&class)?;
        let metadata = collect(&class, CollectMode::RootInstance)?;
        Ok(self.insert(metadata, factory, priority))
    }

    /// Register a provider at its declared priority, or the default one.
    pub fn add_provider(&self, record: ProviderRecord) -> Result<u64, InvalidResourceError> {
        self.validator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .validate_provider(record.provider_type())?;
        Ok(self.providers.add_provider(record))
    }

    fn validate_resource(&self, class: &ResourceClass) -> Result<(), InvalidResourceError> {
        self.validator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .validate_resource(class.resource_type())
    }

    fn insert(
        &self,
        metadata: ResourceMetadata,
        factory: Arc<dyn ObjectFactory>,
        priority: Option<f64>,
    ) -> Arc<ResourceRecord> {
        let priority = priority.unwrap_or(self.config.default_priority);
        self.resources.add(Arc::new(metadata), factory, priority)
    }

    /// Apply an [`Application`]. Invalid entries are logged and skipped.
    pub fn register_application(&self, application: Application) -> ApplicationReport {
        let mut report = ApplicationReport::default();

        for record in application.providers {
            let provider = record.provider_type().name();
            match self.add_provider(record) {
                Ok(_) => report.providers += 1,
                Err(error) => {
                    warn!(provider, %error, "Skipping invalid provider");
                    report.rejected.push(error);
                }
            }
        }

        for entry in application.resources {
            let (resource, result) = match entry {
                ApplicationResource::Class { class, priority } => {
                    (class.resource_type().name(), self.add_resource_class(class, priority))
                }
                ApplicationResource::Instance {
                    instance,
                    class,
                    priority,
                } => (
                    class.resource_type().name(),
                    self.add_instance(instance, class, priority),
                ),
            };
            match result {
                Ok(_) => report.resources += 1,
                Err(error) => {
                    warn!(resource, %error, "Skipping invalid resource");
                    report.rejected.push(error);
                }
            }
        }

        info!(
            resources = report.resources,
            providers = report.providers,
            rejected = report.rejected.len(),
            "Application registered"
        );
        report
    }

    /// Root resources matching `path`, most specific first.
    #[must_use]
    pub fn get_matching_root_resources(&self, path: &str) -> Vec<ResourceInstance> {
        self.resources.matching_root_resources(path)
    }

    #[must_use]
    pub fn get_record(&self, id: TypeId) -> Option<Arc<ResourceRecord>> {
        self.resources.get_record(id)
    }

    #[must_use]
    pub fn get_record_of<T: Any>(&self) -> Option<Arc<ResourceRecord>> {
        self.get_record(TypeId::of::<T>())
    }

    #[must_use]
    pub fn records(&self) -> Arc<Vec<Arc<ResourceRecord>>> {
        self.resources.records()
    }

    /// Drop every resource. Providers stay registered.
    pub fn remove_all_resources(&self) {
        self.resources.remove_all();
        self.validator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear_resources();
    }

    pub(crate) fn sub_resource_metadata(
        &self,
        class: &LocatedClass,
    ) -> Result<Arc<ResourceMetadata>, InvalidResourceError> {
        self.resources.sub_resource_metadata(class)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl Debug for Registry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("resources", &self.resources.len())
            .field("providers", &self.providers)
            .field("config", &self.config)
            .finish()
    }
}
