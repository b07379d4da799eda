use crate::entity::EntityType;
use crate::error::InvalidResourceError;
use crate::metadata::{Instance, Resource, ResourceClass};
use crate::providers::ProviderRecord;
use std::any::TypeId;
use std::collections::HashSet;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

pub(crate) enum ApplicationResource {
    Class {
        class: ResourceClass,
        priority: Option<f64>,
    },
    Instance {
        instance: Instance,
        class: ResourceClass,
        priority: Option<f64>,
    },
}

/// The set of resources and providers an application starts with.
///
/// ```rust
/// use jaxrouter::metadata::{MethodDecl, Outcome, Resource, ResourceClass};
/// use jaxrouter::registry::{Application, Registry};
/// use jaxrouter::runtime_config::RuntimeConfig;
///
/// #[derive(Default)]
/// struct Ping;
///
/// impl Resource for Ping {
///     fn describe() -> ResourceClass {
///         ResourceClass::new::<Ping>()
///             .path("/ping")
///             .default_constructor::<Ping>()
///             .method(MethodDecl::get("ping").handler(|_: &Ping, _| Ok(Outcome::entity("pong"))))
///     }
/// }
///
/// let registry = Registry::new(RuntimeConfig::default());
/// let report = registry.register_application(Application::new().resource::<Ping>());
/// assert_eq!(report.resources, 1);
/// assert!(report.rejected.is_empty());
/// ```
#[derive(Default)]
pub struct Application {
    pub(crate) resources: Vec<ApplicationResource>,
    pub(crate) providers: Vec<ProviderRecord>,
    priority: Option<f64>,
}

impl Application {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Priority for entries added after this call that declare none.
    #[must_use]
    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = Some(priority);
        self
    }

    /// A resource class instantiated by the runtime.
    #[must_use]
    pub fn resource<T: Resource>(self) -> Self {
        self.resource_class(T::describe())
    }

    #[must_use]
    pub fn resource_class(mut self, class: ResourceClass) -> Self {
        self.resources.push(ApplicationResource::Class {
            class,
            priority: self.priority,
        });
        self
    }

    /// A ready instance served as a singleton.
    #[must_use]
    pub fn singleton<T: Resource>(self, value: T) -> Self {
        self.singleton_with(Arc::new(value), T::describe())
    }

    #[must_use]
    pub fn singleton_with(mut self, instance: Instance, class: ResourceClass) -> Self {
        self.resources.push(ApplicationResource::Instance {
            instance,
            class,
            priority: self.priority,
        });
        self
    }

    #[must_use]
    pub fn provider(mut self, record: ProviderRecord) -> Self {
        let record = match (record.declared_priority(), self.priority) {
            (None, Some(priority)) => record.priority(priority),
            _ => record,
        };
        self.providers.push(record);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len() + self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Debug for Application {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("resources", &self.resources.len())
            .field("providers", &self.providers.len())
            .field("priority", &self.priority)
            .finish()
    }
}

/// Remembers which types were registered as resources and which as
/// providers. Registering the same type again in the same role is allowed.
#[derive(Debug, Default)]
pub struct ApplicationValidator {
    resources: HashSet<TypeId>,
    providers: HashSet<TypeId>,
}

impl ApplicationValidator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate_resource(&mut self, ty: EntityType) -> Result<(), InvalidResourceError> {
        if self.providers.contains(&ty.id()) {
            return Err(InvalidResourceError::ResourceAndProvider(ty.name()));
        }
        self.resources.insert(ty.id());
        Ok(())
    }

    pub fn validate_provider(&mut self, ty: EntityType) -> Result<(), InvalidResourceError> {
        if self.resources.contains(&ty.id()) {
            return Err(InvalidResourceError::ResourceAndProvider(ty.name()));
        }
        self.providers.insert(ty.id());
        Ok(())
    }

    pub fn clear_resources(&mut self) {
        self.resources.clear();
    }
}

/// What [`Registry::register_application`](super::Registry::register_application)
/// accepted and rejected.
#[derive(Debug, Default)]
pub struct ApplicationReport {
    pub resources: usize,
    pub providers: usize,
    pub rejected: Vec<InvalidResourceError>,
}
