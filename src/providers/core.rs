use crate::entity::{Entity, EntityType};
use crate::error::{ErrorClass, ResourceError};
use crate::media::MediaType;
use crate::metadata::Instance;
use crate::server::Response;
use http::HeaderMap;
use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::warn;

/// Reads a request entity from the body stream.
pub trait MessageBodyReader: Send + Sync {
    /// Whether this reader can produce `ty` from `media_type`.
    fn is_readable(&self, ty: EntityType, annotations: &[&'static str], media_type: &MediaType)
        -> bool;

    fn read_from(
        &self,
        ty: EntityType,
        annotations: &[&'static str],
        media_type: &MediaType,
        headers: &HeaderMap,
        body: &mut dyn Read,
    ) -> Result<Entity, ResourceError>;
}

/// Writes a response entity to the body sink.
pub trait MessageBodyWriter: Send + Sync {
    fn is_writeable(
        &self,
        ty: EntityType,
        annotations: &[&'static str],
        media_type: &MediaType,
    ) -> bool;

    /// Advisory serialized size; `None` when unknown.
    fn size(&self, _entity: &Entity, _media_type: &MediaType) -> Option<u64> {
        None
    }

    /// Serialize `entity`. Headers may still be added.
    fn write_to(
        &self,
        entity: &Entity,
        annotations: &[&'static str],
        media_type: &MediaType,
        headers: &mut HeaderMap,
        out: &mut dyn Write,
    ) -> Result<(), ResourceError>;
}

/// Turns a resource failure into a response.
pub trait ExceptionMapper: Send + Sync {
    fn to_response(&self, error: &ResourceError) -> Response;
}

impl<F> ExceptionMapper for F
where
    F: Fn(&ResourceError) -> Response + Send + Sync,
{
    fn to_response(&self, error: &ResourceError) -> Response {
        self(error)
    }
}

/// Supplies a context object for a requested type.
pub trait ContextResolver: Send + Sync {
    fn get_context(&self, ty: EntityType) -> Option<Instance>;
}

impl<F> ContextResolver for F
where
    F: Fn(EntityType) -> Option<Instance> + Send + Sync,
{
    fn get_context(&self, ty: EntityType) -> Option<Instance> {
        self(ty)
    }
}

/// The capability a provider registers under.
#[derive(Clone)]
pub enum ProviderKind {
    Reader(Arc<dyn MessageBodyReader>),
    Writer(Arc<dyn MessageBodyWriter>),
    /// Mapper for one error class of a [`ResourceError`] lineage
    ExceptionMapper(ErrorClass, Arc<dyn ExceptionMapper>),
    /// Resolver for one context type
    ContextResolver(EntityType, Arc<dyn ContextResolver>),
}

impl ProviderKind {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Reader(_) => "reader",
            ProviderKind::Writer(_) => "writer",
            ProviderKind::ExceptionMapper(..) => "exception_mapper",
            ProviderKind::ContextResolver(..) => "context_resolver",
        }
    }
}

/// A provider ready for registration.
///
/// ```rust
/// use jaxrouter::providers::{ProviderRecord, StringProvider};
///
/// let record = ProviderRecord::writer(StringProvider)
///     .media_types(&["text/plain"])
///     .priority(1.0);
/// assert_eq!(record.kind().name(), "writer");
/// ```
#[derive(Clone)]
pub struct ProviderRecord {
    pub(crate) kind: ProviderKind,
    pub(crate) media_types: Vec<MediaType>,
    pub(crate) priority: Option<f64>,
    pub(crate) provider_type: EntityType,
}

impl ProviderRecord {
    fn with_kind<P: Any>(kind: ProviderKind) -> Self {
        Self {
            kind,
            media_types: Vec::new(),
            priority: None,
            provider_type: EntityType::of::<P>(),
        }
    }

    pub fn reader<R: MessageBodyReader + 'static>(reader: R) -> Self {
        Self::with_kind::<R>(ProviderKind::Reader(Arc::new(reader)))
    }

    pub fn writer<W: MessageBodyWriter + 'static>(writer: W) -> Self {
        Self::with_kind::<W>(ProviderKind::Writer(Arc::new(writer)))
    }

    /// A mapper for errors whose lineage contains `E`.
    pub fn exception_mapper<E, M>(mapper: M) -> Self
    where
        E: Any + ?Sized,
        M: ExceptionMapper + 'static,
    {
        Self::with_kind::<M>(ProviderKind::ExceptionMapper(
            ErrorClass::of::<E>(),
            Arc::new(mapper),
        ))
    }

    /// A resolver for context objects of type `T`.
    pub fn context_resolver<T, R>(resolver: R) -> Self
    where
        T: Any,
        R: ContextResolver + 'static,
    {
        Self::with_kind::<R>(ProviderKind::ContextResolver(
            EntityType::of::<T>(),
            Arc::new(resolver),
        ))
    }

    /// Declared media types; none means `*/*`. Unparseable entries are
    /// logged and skipped.
    #[must_use]
    pub fn media_types(mut self, media_types: &[&str]) -> Self {
        for raw in media_types {
            match MediaType::parse(raw) {
                Ok(mt) => self.media_types.push(mt),
                Err(error) => warn!(
                    provider = self.provider_type.name(),
                    media_type = raw,
                    %error,
                    "Skipping invalid provider media type"
                ),
            }
        }
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: f64) -> Self {
        self.priority = Some(priority);
        self
    }

    #[must_use]
    pub fn kind(&self) -> &ProviderKind {
        &self.kind
    }

    #[must_use]
    pub fn provider_type(&self) -> EntityType {
        self.provider_type
    }

    #[must_use]
    pub fn declared_media_types(&self) -> &[MediaType] {
        &self.media_types
    }

    #[must_use]
    pub fn declared_priority(&self) -> Option<f64> {
        self.priority
    }
}

impl Debug for ProviderRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRecord")
            .field("kind", &self.kind.name())
            .field("provider", &self.provider_type)
            .field("media_types", &self.media_types)
            .field("priority", &self.priority)
            .finish()
    }
}

