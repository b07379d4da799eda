use super::class::{ConstructorFn, Handler, ReleaseHook};
use crate::entity::EntityType;
use crate::media::MediaType;
use crate::uri_template::UriTemplate;
use http::Method;
use std::any::{type_name, Any};
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

/// Where a parameter value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamSource {
    Path,
    Query,
    Header,
    Cookie,
    Matrix,
    Form,
    Context,
    Entity,
}

impl ParamSource {
    /// Conversion failures for these sources fail the request even when a
    /// default value is declared.
    #[must_use]
    pub fn is_strict(self) -> bool {
        matches!(self, ParamSource::Path | ParamSource::Matrix)
    }

    /// Sources a constructor can be bound from without reading the body.
    #[must_use]
    pub fn is_constructor_safe(self) -> bool {
        !matches!(self, ParamSource::Entity | ParamSource::Form)
    }
}

impl Display for ParamSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ParamSource::Path => "path",
            ParamSource::Query => "query",
            ParamSource::Header => "header",
            ParamSource::Cookie => "cookie",
            ParamSource::Matrix => "matrix",
            ParamSource::Form => "form",
            ParamSource::Context => "context",
            ParamSource::Entity => "entity",
        };
        f.write_str(name)
    }
}

/// Injectable request context objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    HttpHeaders,
    UriInfo,
    Providers,
}

/// A source annotation declared on a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamAnnotation {
    Context,
    Path(String),
    Matrix(String),
    Query(String),
    Form(String),
    Header(String),
    Cookie(String),
}

impl ParamAnnotation {
    /// Lower rank wins when a parameter carries several annotations.
    #[must_use]
    pub fn rank(&self) -> u8 {
        match self {
            ParamAnnotation::Context => 0,
            ParamAnnotation::Path(_) => 1,
            ParamAnnotation::Matrix(_) => 2,
            ParamAnnotation::Query(_) => 3,
            ParamAnnotation::Form(_) => 4,
            ParamAnnotation::Header(_) => 5,
            ParamAnnotation::Cookie(_) => 6,
        }
    }

    #[must_use]
    pub fn source(&self) -> ParamSource {
        match self {
            ParamAnnotation::Context => ParamSource::Context,
            ParamAnnotation::Path(_) => ParamSource::Path,
            ParamAnnotation::Matrix(_) => ParamSource::Matrix,
            ParamAnnotation::Query(_) => ParamSource::Query,
            ParamAnnotation::Form(_) => ParamSource::Form,
            ParamAnnotation::Header(_) => ParamSource::Header,
            ParamAnnotation::Cookie(_) => ParamSource::Cookie,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            ParamAnnotation::Context => "",
            ParamAnnotation::Path(n)
            | ParamAnnotation::Matrix(n)
            | ParamAnnotation::Query(n)
            | ParamAnnotation::Form(n)
            | ParamAnnotation::Header(n)
            | ParamAnnotation::Cookie(n) => n,
        }
    }
}

/// String-to-value conversion used by [`CustomType`].
pub type Converter =
    Arc<dyn Fn(&str) -> Result<Arc<dyn Any + Send + Sync>, String> + Send + Sync>;

/// A user type bound from a string.
///
/// A `value_of` factory is preferred over a `from_string` constructor when
/// both are present.
#[derive(Clone)]
pub struct CustomType {
    name: &'static str,
    value_of: Option<Converter>,
    from_string: Option<Converter>,
}

impl CustomType {
    #[must_use]
    pub fn new<T: Any>() -> Self {
        Self {
            name: type_name::<T>(),
            value_of: None,
            from_string: None,
        }
    }

    /// A type bound through its `FromStr` implementation.
    #[must_use]
    pub fn parsed<T>() -> Self
    where
        T: FromStr + Any + Send + Sync,
        T::Err: Display,
    {
        Self::new::<T>().with_value_of(|raw| raw.parse::<T>().map_err(|e| e.to_string()))
    }

    #[must_use]
    pub fn with_value_of<T, F>(mut self, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&str) -> Result<T, String> + Send + Sync + 'static,
    {
        self.value_of = Some(erase(factory));
        self
    }

    #[must_use]
    pub fn with_from_string<T, F>(mut self, constructor: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&str) -> Result<T, String> + Send + Sync + 'static,
    {
        self.from_string = Some(erase(constructor));
        self
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn convert(&self, raw: &str) -> Result<Arc<dyn Any + Send + Sync>, String> {
        match (&self.value_of, &self.from_string) {
            (Some(value_of), _) => value_of(raw),
            (None, Some(from_string)) => from_string(raw),
            (None, None) => Err(format!("`{}` declares no string conversion", self.name)),
        }
    }
}

fn erase<T, F>(f: F) -> Converter
where
    T: Any + Send + Sync,
    F: Fn(&str) -> Result<T, String> + Send + Sync + 'static,
{
    Arc::new(move |raw| f(raw).map(|v| Arc::new(v) as Arc<dyn Any + Send + Sync>))
}

impl Debug for CustomType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomType")
            .field("name", &self.name)
            .field("value_of", &self.value_of.is_some())
            .field("from_string", &self.from_string.is_some())
            .finish()
    }
}

/// Declared target type of a parameter.
#[derive(Debug, Clone)]
pub enum ParamType {
    String,
    Bool,
    I32,
    I64,
    U64,
    F64,
    List(Box<ParamType>),
    Custom(CustomType),
    Entity(EntityType),
    Context(ContextKind),
}

impl ParamType {
    #[must_use]
    pub fn list(inner: ParamType) -> Self {
        ParamType::List(Box::new(inner))
    }

    #[must_use]
    pub fn entity<T: Any>() -> Self {
        ParamType::Entity(EntityType::of::<T>())
    }

    /// True for types only a message body reader can produce.
    #[must_use]
    pub fn is_body_eligible(&self) -> bool {
        matches!(self, ParamType::Entity(_))
    }

    /// True for types that can be converted from request strings.
    #[must_use]
    pub fn is_string_convertible(&self) -> bool {
        match self {
            ParamType::Entity(_) | ParamType::Context(_) => false,
            ParamType::List(inner) => inner.is_string_convertible(),
            _ => true,
        }
    }

    #[must_use]
    pub fn is_collection(&self) -> bool {
        matches!(self, ParamType::List(_))
    }

    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            ParamType::String => "String".to_string(),
            ParamType::Bool => "bool".to_string(),
            ParamType::I32 => "i32".to_string(),
            ParamType::I64 => "i64".to_string(),
            ParamType::U64 => "u64".to_string(),
            ParamType::F64 => "f64".to_string(),
            ParamType::List(inner) => format!("List<{}>", inner.describe()),
            ParamType::Custom(custom) => custom.name().to_string(),
            ParamType::Entity(ty) => ty.name().to_string(),
            ParamType::Context(kind) => format!("{kind:?}"),
        }
    }
}

/// A classified parameter.
#[derive(Debug, Clone)]
pub struct ParameterMetadata {
    pub source: ParamSource,
    /// Lookup name; empty for entity and context parameters.
    pub name: String,
    pub ty: ParamType,
    pub default_value: Option<String>,
    /// Skip percent-decoding of the raw value.
    pub encoded: bool,
    /// Free-form tags handed to entity providers.
    pub annotations: Vec<&'static str>,
}

/// Instance lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Singleton,
    Prototype,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    /// Verb, no path
    ResourceMethod,
    /// Verb and path
    SubResourceMethod,
    /// Path, no verb
    SubResourceLocator,
}

pub struct MethodMetadata {
    pub(crate) name: String,
    pub(crate) kind: MethodKind,
    pub(crate) http_method: Option<Method>,
    pub(crate) template: Option<Arc<UriTemplate>>,
    pub(crate) parameters: Vec<ParameterMetadata>,
    pub(crate) consumes: Vec<MediaType>,
    pub(crate) produces: Vec<MediaType>,
    pub(crate) return_type: Option<EntityType>,
    pub(crate) annotations: Vec<&'static str>,
    pub(crate) index: usize,
    pub(crate) handler: Handler,
}

impl MethodMetadata {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    /// HTTP verb; `None` for sub-resource locators.
    #[must_use]
    pub fn http_method(&self) -> Option<&Method> {
        self.http_method.as_ref()
    }

    /// Sub-path template; `None` for resource methods.
    #[must_use]
    pub fn template(&self) -> Option<&Arc<UriTemplate>> {
        self.template.as_ref()
    }

    #[must_use]
    pub fn parameters(&self) -> &[ParameterMetadata] {
        &self.parameters
    }

    /// Declared consumed types; empty means `*/*`.
    #[must_use]
    pub fn consumes(&self) -> &[MediaType] {
        &self.consumes
    }

    /// Declared produced types; empty means `*/*`.
    #[must_use]
    pub fn produces(&self) -> &[MediaType] {
        &self.produces
    }

    #[must_use]
    pub fn return_type(&self) -> Option<EntityType> {
        self.return_type
    }

    #[must_use]
    pub fn annotations(&self) -> &[&'static str] {
        &self.annotations
    }

    /// Declaration order within the resource class.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn entity_parameter(&self) -> Option<&ParameterMetadata> {
        self.parameters
            .iter()
            .find(|p| p.source == ParamSource::Entity)
    }

    pub(crate) fn handler(&self) -> &Handler {
        &self.handler
    }
}

impl Debug for MethodMetadata {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodMetadata")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("http_method", &self.http_method)
            .field("template", &self.template.as_ref().map(|t| t.as_str()))
            .field("parameters", &self.parameters.len())
            .field("consumes", &self.consumes)
            .field("produces", &self.produces)
            .finish()
    }
}

/// The constructor chosen for per-request or lazy instantiation.
pub struct ConstructorMetadata {
    pub(crate) parameters: Vec<ParameterMetadata>,
    pub(crate) build: ConstructorFn,
    pub(crate) index: usize,
}

impl ConstructorMetadata {
    #[must_use]
    pub fn parameters(&self) -> &[ParameterMetadata] {
        &self.parameters
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn build(&self) -> &ConstructorFn {
        &self.build
    }
}

impl Debug for ConstructorMetadata {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstructorMetadata")
            .field("index", &self.index)
            .field("parameters", &self.parameters.len())
            .finish()
    }
}

/// Immutable, validated description of a resource class.
pub struct ResourceMetadata {
    pub(crate) resource_type: EntityType,
    pub(crate) template: Option<Arc<UriTemplate>>,
    pub(crate) resource_methods: Vec<Arc<MethodMetadata>>,
    pub(crate) sub_resources: Vec<Arc<MethodMetadata>>,
    pub(crate) declared_scope: Option<Scope>,
    pub(crate) scope: Scope,
    pub(crate) constructor: Option<Arc<ConstructorMetadata>>,
    pub(crate) release_hook: Option<ReleaseHook>,
    pub(crate) ambiguous_locators: bool,
}

impl ResourceMetadata {
    /// Identity of the resource type.
    #[must_use]
    pub fn resource_type(&self) -> EntityType {
        self.resource_type
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.resource_type.name()
    }

    /// Root path template; `None` for sub-resources.
    #[must_use]
    pub fn template(&self) -> Option<&Arc<UriTemplate>> {
        self.template.as_ref()
    }

    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.template.as_deref().map(UriTemplate::as_str)
    }

    #[must_use]
    pub fn resource_methods(&self) -> &[Arc<MethodMetadata>] {
        &self.resource_methods
    }

    /// Sub-resource methods and locators, most specific template first,
    /// methods ahead of locators for equal templates.
    #[must_use]
    pub fn sub_resources(&self) -> &[Arc<MethodMetadata>] {
        &self.sub_resources
    }

    pub fn sub_resource_methods(&self) -> impl Iterator<Item = &Arc<MethodMetadata>> {
        self.sub_resources
            .iter()
            .filter(|m| m.kind == MethodKind::SubResourceMethod)
    }

    pub fn sub_resource_locators(&self) -> impl Iterator<Item = &Arc<MethodMetadata>> {
        self.sub_resources
            .iter()
            .filter(|m| m.kind == MethodKind::SubResourceLocator)
    }

    #[must_use]
    pub fn has_sub_resources(&self) -> bool {
        !self.sub_resources.is_empty()
    }

    #[must_use]
    pub fn declared_scope(&self) -> Option<Scope> {
        self.declared_scope
    }

    /// Effective scope after applying the registration kind.
    #[must_use]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    #[must_use]
    pub fn constructor(&self) -> Option<&Arc<ConstructorMetadata>> {
        self.constructor.as_ref()
    }

    /// Two or more locators share an identical template.
    #[must_use]
    pub fn has_ambiguous_locators(&self) -> bool {
        self.ambiguous_locators
    }

    pub(crate) fn release_hook(&self) -> Option<&ReleaseHook> {
        self.release_hook.as_ref()
    }
}

impl Debug for ResourceMetadata {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceMetadata")
            .field("resource", &self.resource_type)
            .field("path", &self.path())
            .field("resource_methods", &self.resource_methods)
            .field("sub_resources", &self.sub_resources)
            .field("scope", &self.scope)
            .field("constructor", &self.constructor)
            .finish_non_exhaustive()
    }
}
