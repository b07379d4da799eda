//! # Lifecycle Module
//!
//! Object factories decide how the dispatcher obtains a resource instance for
//! a request and what happens to it afterwards.
//!
//! | Factory | Created | Released |
//! |---------|---------|----------|
//! | [`SingletonFactory`] | at registration (given instance) | never |
//! | [`LazySingletonFactory`] | on first request | never |
//! | [`PrototypeFactory`] | on every request | at the end of the request |
//!
//! Prototype construction binds the selected constructor's parameters from
//! the current request, so a constructor can take query, header, path or
//! context values. Lazy singletons may only take context parameters.

use crate::binding::{bind, BindFailure, RuntimeContext};
use crate::error::{InvalidResourceError, ResourceError};
use crate::metadata::{ConstructorMetadata, Instance, ReleaseHook, ResourceMetadata, Scope};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{debug, warn};

/// Supplies and recycles resource instances.
pub trait ObjectFactory: Send + Sync {
    fn get_instance(&self, ctx: &RuntimeContext) -> Result<Instance, ResourceError>;

    /// Called once per `get_instance` when the request completes.
    fn release_instance(&self, _instance: Instance, _ctx: &RuntimeContext) {}

    fn scope(&self) -> Scope;
}

fn construct(
    constructor: &ConstructorMetadata,
    ctx: &RuntimeContext,
) -> Result<Instance, ResourceError> {
    let args = bind(constructor.parameters(), ctx).map_err(|failure| match failure {
        BindFailure::Binding(error) => ResourceError::new(error),
        BindFailure::Resource(error) => error,
    })?;
    (constructor.build())(args)
}

/// A pre-built instance shared by every request.
pub struct SingletonFactory {
    instance: Instance,
}

impl SingletonFactory {
    #[must_use]
    pub fn new(instance: Instance) -> Self {
        Self { instance }
    }
}

impl ObjectFactory for SingletonFactory {
    fn get_instance(&self, _ctx: &RuntimeContext) -> Result<Instance, ResourceError> {
        Ok(Arc::clone(&self.instance))
    }

    fn scope(&self) -> Scope {
        Scope::Singleton
    }
}

/// A singleton built by the first request that needs it.
pub struct LazySingletonFactory {
    constructor: Arc<ConstructorMetadata>,
    instance: OnceCell<Instance>,
    resource: &'static str,
}

impl LazySingletonFactory {
    #[must_use]
    pub fn new(constructor: Arc<ConstructorMetadata>, resource: &'static str) -> Self {
        Self {
            constructor,
            instance: OnceCell::new(),
            resource,
        }
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.instance.get().is_some()
    }
}

impl ObjectFactory for LazySingletonFactory {
    fn get_instance(&self, ctx: &RuntimeContext) -> Result<Instance, ResourceError> {
        self.instance
            .get_or_try_init(|| {
                debug!(resource = self.resource, "Creating singleton instance");
                construct(&self.constructor, ctx)
            })
            .map(Arc::clone)
    }

    fn scope(&self) -> Scope {
        Scope::Singleton
    }
}

/// A fresh instance per request.
pub struct PrototypeFactory {
    constructor: Arc<ConstructorMetadata>,
    release: Option<ReleaseHook>,
}

impl PrototypeFactory {
    #[must_use]
    pub fn new(constructor: Arc<ConstructorMetadata>, release: Option<ReleaseHook>) -> Self {
        Self {
            constructor,
            release,
        }
    }
}

impl ObjectFactory for PrototypeFactory {
    fn get_instance(&self, ctx: &RuntimeContext) -> Result<Instance, ResourceError> {
        construct(&self.constructor, ctx)
    }

    fn release_instance(&self, instance: Instance, _ctx: &RuntimeContext) {
        if let Some(hook) = &self.release {
            hook(&instance);
        }
    }

    fn scope(&self) -> Scope {
        Scope::Prototype
    }
}

/// The factory implied by the metadata and the registration kind.
///
/// An `instance` is always served as a singleton.
pub fn factory_for(
    metadata: &ResourceMetadata,
    instance: Option<Instance>,
) -> Result<Arc<dyn ObjectFactory>, InvalidResourceError> {
    if let Some(instance) = instance {
        if metadata.declared_scope() == Some(Scope::Prototype) {
            warn!(
                resource = metadata.name(),
                "Prototype scope declared on a registered instance; serving it as a singleton"
            );
        }
        return Ok(Arc::new(SingletonFactory::new(instance)));
    }

    let constructor = metadata
        .constructor()
        .cloned()
        .ok_or(InvalidResourceError::NoUsableConstructor(metadata.name()))?;
    Ok(match metadata.scope() {
        Scope::Singleton => Arc::new(LazySingletonFactory::new(constructor, metadata.name())),
        Scope::Prototype => Arc::new(PrototypeFactory::new(
            constructor,
            metadata.release_hook().cloned(),
        )),
    })
}
