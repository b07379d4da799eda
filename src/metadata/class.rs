use super::types::{ContextKind, ParamAnnotation, ParamType, Scope};
use crate::binding::Arguments;
use crate::entity::{Entity, EntityType};
use crate::error::{InstanceMismatch, ResourceError};
use crate::server::Response;
use http::Method;
use std::any::{type_name, Any, TypeId};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// A live resource object.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Type-erased resource method body.
pub type Handler =
    Arc<dyn Fn(&Instance, Arguments) -> Result<Outcome, ResourceError> + Send + Sync>;

/// Type-erased constructor.
pub type ConstructorFn = Arc<dyn Fn(Arguments) -> Result<Instance, ResourceError> + Send + Sync>;

/// Called when a prototype-scoped instance is released.
pub type ReleaseHook = Arc<dyn Fn(&Instance) + Send + Sync>;

/// A type that can describe itself as a resource class.
pub trait Resource: Any + Send + Sync {
    fn describe() -> ResourceClass;
}

/// What a resource method or locator returned.
pub enum Outcome {
    /// No entity (`204 No Content`)
    Empty,
    /// A bare entity, written with the negotiated media type
    Entity(Entity),
    /// A full response with explicit status and headers
    Response(Response),
    /// A sub-resource object to continue matching against
    Located(Located),
}

impl Outcome {
    pub fn entity<T: Any + Send + Sync>(value: T) -> Self {
        Outcome::Entity(Entity::new(value))
    }

    #[must_use]
    pub fn response(response: Response) -> Self {
        Outcome::Response(response)
    }

    pub fn located<T: Resource>(value: T) -> Self {
        Outcome::Located(Located::new(value))
    }
}

impl From<Response> for Outcome {
    fn from(response: Response) -> Self {
        Outcome::Response(response)
    }
}

impl Debug for Outcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Empty => f.write_str("Empty"),
            Outcome::Entity(e) => f.debug_tuple("Entity").field(e).finish(),
            Outcome::Response(r) => f.debug_tuple("Response").field(&r.status()).finish(),
            Outcome::Located(l) => f.debug_tuple("Located").field(&l.type_name()).finish(),
        }
    }
}

#[derive(Clone)]
pub(crate) enum LocatedClass {
    /// Described by a [`Resource`] impl; metadata is cached per type.
    Static {
        id: TypeId,
        describe: fn() -> ResourceClass,
    },
    /// Described ad hoc by the locator; collected the first time its
    /// concrete type is located and reused for that type afterwards.
    Dynamic { id: TypeId, class: Arc<ResourceClass> },
}

/// A sub-resource returned by a locator.
pub struct Located {
    instance: Instance,
    class: LocatedClass,
    type_name: &'static str,
}

impl Located {
    pub fn new<T: Resource>(value: T) -> Self {
        Self::shared(Arc::new(value))
    }

    pub fn shared<T: Resource>(value: Arc<T>) -> Self {
        Self {
            instance: value,
            class: LocatedClass::Static {
                id: TypeId::of::<T>(),
                describe: T::describe,
            },
            type_name: type_name::<T>(),
        }
    }

    /// A runtime-typed sub-resource described by `class`.
    ///
    /// Metadata is collected once per concrete type `T`; later descriptions
    /// of the same type are ignored.
    pub fn dynamic<T: Any + Send + Sync>(value: T, class: ResourceClass) -> Self {
        Self {
            instance: Arc::new(value),
            class: LocatedClass::Dynamic {
                id: TypeId::of::<T>(),
                class: Arc::new(class),
            },
            type_name: type_name::<T>(),
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn into_parts(self) -> (Instance, LocatedClass) {
        (self.instance, self.class)
    }
}

/// One declared parameter before classification.
#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub(crate) annotations: Vec<ParamAnnotation>,
    pub(crate) ty: ParamType,
    pub(crate) default_value: Option<String>,
    pub(crate) encoded: bool,
    pub(crate) tags: Vec<&'static str>,
}

impl ParamDecl {
    /// An unannotated parameter of type `ty`.
    #[must_use]
    pub fn new(ty: ParamType) -> Self {
        Self {
            annotations: Vec::new(),
            ty,
            default_value: None,
            encoded: false,
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub fn path(name: &str, ty: ParamType) -> Self {
        Self::new(ty).annotated(ParamAnnotation::Path(name.to_string()))
    }

    #[must_use]
    pub fn query(name: &str, ty: ParamType) -> Self {
        Self::new(ty).annotated(ParamAnnotation::Query(name.to_string()))
    }

    #[must_use]
    pub fn header(name: &str, ty: ParamType) -> Self {
        Self::new(ty).annotated(ParamAnnotation::Header(name.to_string()))
    }

    #[must_use]
    pub fn cookie(name: &str, ty: ParamType) -> Self {
        Self::new(ty).annotated(ParamAnnotation::Cookie(name.to_string()))
    }

    #[must_use]
    pub fn matrix(name: &str, ty: ParamType) -> Self {
        Self::new(ty).annotated(ParamAnnotation::Matrix(name.to_string()))
    }

    #[must_use]
    pub fn form(name: &str, ty: ParamType) -> Self {
        Self::new(ty).annotated(ParamAnnotation::Form(name.to_string()))
    }

    #[must_use]
    pub fn context(kind: ContextKind) -> Self {
        Self::new(ParamType::Context(kind)).annotated(ParamAnnotation::Context)
    }

    /// The request entity, read by a message body reader.
    #[must_use]
    pub fn entity<T: Any>() -> Self {
        Self::new(ParamType::entity::<T>())
    }

    #[must_use]
    pub fn annotated(mut self, annotation: ParamAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: &str) -> Self {
        self.default_value = Some(value.to_string());
        self
    }

    /// Bind the raw, still percent-encoded value.
    #[must_use]
    pub fn encoded(mut self) -> Self {
        self.encoded = true;
        self
    }

    /// Tag passed through to entity providers.
    #[must_use]
    pub fn tag(mut self, tag: &'static str) -> Self {
        self.tags.push(tag);
        self
    }
}

/// One declared method before validation.
pub struct MethodDecl {
    pub(crate) name: String,
    pub(crate) http_method: Option<Method>,
    pub(crate) path: Option<String>,
    pub(crate) params: Vec<ParamDecl>,
    pub(crate) consumes: Vec<String>,
    pub(crate) produces: Vec<String>,
    pub(crate) returns: Option<EntityType>,
    pub(crate) tags: Vec<&'static str>,
    pub(crate) handler: Option<Handler>,
}

impl MethodDecl {
    /// A method with neither verb nor path yet.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            http_method: None,
            path: None,
            params: Vec::new(),
            consumes: Vec::new(),
            produces: Vec::new(),
            returns: None,
            tags: Vec::new(),
            handler: None,
        }
    }

    #[must_use]
    pub fn verb(method: Method, name: &str) -> Self {
        let mut decl = Self::new(name);
        decl.http_method = Some(method);
        decl
    }

    #[must_use]
    pub fn get(name: &str) -> Self {
        Self::verb(Method::GET, name)
    }

    #[must_use]
    pub fn post(name: &str) -> Self {
        Self::verb(Method::POST, name)
    }

    #[must_use]
    pub fn put(name: &str) -> Self {
        Self::verb(Method::PUT, name)
    }

    #[must_use]
    pub fn delete(name: &str) -> Self {
        Self::verb(Method::DELETE, name)
    }

    #[must_use]
    pub fn patch(name: &str) -> Self {
        Self::verb(Method::PATCH, name)
    }

    #[must_use]
    pub fn head(name: &str) -> Self {
        Self::verb(Method::HEAD, name)
    }

    #[must_use]
    pub fn options(name: &str) -> Self {
        Self::verb(Method::OPTIONS, name)
    }

    /// A sub-resource locator: a path and no verb.
    #[must_use]
    pub fn locator(name: &str, path: &str) -> Self {
        Self::new(name).path(path)
    }

    #[must_use]
    pub fn path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    #[must_use]
    pub fn consumes(mut self, media_types: &[&str]) -> Self {
        self.consumes
            .extend(media_types.iter().map(|m| (*m).to_string()));
        self
    }

    #[must_use]
    pub fn produces(mut self, media_types: &[&str]) -> Self {
        self.produces
            .extend(media_types.iter().map(|m| (*m).to_string()));
        self
    }

    #[must_use]
    pub fn param(mut self, param: ParamDecl) -> Self {
        self.params.push(param);
        self
    }

    /// Declare the entity type this method returns.
    #[must_use]
    pub fn returns<T: Any>(mut self) -> Self {
        self.returns = Some(EntityType::of::<T>());
        self
    }

    /// Tag passed through to entity writers.
    #[must_use]
    pub fn tag(mut self, tag: &'static str) -> Self {
        self.tags.push(tag);
        self
    }

    /// Set the method body. It receives the resource instance, downcast to
    /// `T`, and the bound arguments in declaration order.
    #[must_use]
    pub fn handler<T, F>(mut self, body: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, Arguments) -> Result<Outcome, ResourceError> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(move |instance: &Instance, args: Arguments| {
            let target = instance
                .downcast_ref::<T>()
                .ok_or(InstanceMismatch {
                    expected: type_name::<T>(),
                })?;
            body(target, args)
        }));
        self
    }
}

/// A declared constructor.
pub struct ConstructorDecl {
    pub(crate) params: Vec<ParamDecl>,
    pub(crate) build: ConstructorFn,
}

impl ConstructorDecl {
    pub fn new<T, F>(build: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(Arguments) -> Result<T, ResourceError> + Send + Sync + 'static,
    {
        Self {
            params: Vec::new(),
            build: Arc::new(move |args: Arguments| build(args).map(|value| Arc::new(value) as Instance)),
        }
    }

    #[must_use]
    pub fn param(mut self, param: ParamDecl) -> Self {
        self.params.push(param);
        self
    }
}

/// Explicit description of a resource class.
pub struct ResourceClass {
    pub(crate) ty: EntityType,
    pub(crate) path: Option<String>,
    pub(crate) scope: Option<Scope>,
    pub(crate) methods: Vec<MethodDecl>,
    pub(crate) constructors: Vec<ConstructorDecl>,
    pub(crate) release: Option<ReleaseHook>,
    pub(crate) provider: bool,
}

impl ResourceClass {
    #[must_use]
    pub fn new<T: Any + Send + Sync>() -> Self {
        Self {
            ty: EntityType::of::<T>(),
            path: None,
            scope: None,
            methods: Vec::new(),
            constructors: Vec::new(),
            release: None,
            provider: false,
        }
    }

    /// Root path template.
    #[must_use]
    pub fn path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    /// Override the scope implied by the registration kind.
    #[must_use]
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    #[must_use]
    pub fn method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }

    #[must_use]
    pub fn constructor(mut self, constructor: ConstructorDecl) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// A zero-argument constructor from `Default`.
    #[must_use]
    pub fn default_constructor<T: Default + Any + Send + Sync>(self) -> Self {
        self.constructor(ConstructorDecl::new(|_| Ok(T::default())))
    }

    /// Run `hook` on each per-request instance when the request ends.
    #[must_use]
    pub fn on_release<T, F>(mut self, hook: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.release = Some(Arc::new(move |instance: &Instance| {
            if let Some(target) = instance.downcast_ref::<T>() {
                hook(target);
            }
        }));
        self
    }

    /// Mark the class as also declaring provider characteristics, which
    /// makes it invalid as a resource.
    #[must_use]
    pub fn provider(mut self) -> Self {
        self.provider = true;
        self
    }

    #[must_use]
    pub fn resource_type(&self) -> EntityType {
        self.ty
    }

    #[must_use]
    pub fn path_str(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

impl Debug for ResourceClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceClass")
            .field("type", &self.ty)
            .field("path", &self.path)
            .field("methods", &self.methods.len())
            .field("constructors", &self.constructors.len())
            .finish()
    }
}
