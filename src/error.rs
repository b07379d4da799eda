//! # Error Module
//!
//! Error types shared across the runtime.
//!
//! - [`ResourceError`]: what resource methods, locators, constructors and
//!   entity providers fail with. It wraps any `std::error::Error` and carries
//!   an *error lineage*: the concrete [`ErrorClass`] followed by declared
//!   ancestors. Exception mappers are looked up along that lineage.
//! - [`WebApplicationError`]: a failure that already knows its HTTP response.
//! - [`InvalidResourceError`]: registration-time rejection of one resource.
//! - [`BindingError`]: a request parameter could not be converted (400).
//! - [`ProviderSelectionError`]: no reader or writer fits an entity.
//!
//! Routing outcomes (404/405/406/415) are not errors; see
//! [`crate::dispatcher::MatchResult`].

use crate::media::{MediaType, MediaTypeError};
use crate::metadata::ParamSource;
use crate::server::Response;
use crate::uri_template::TemplateError;
use http::StatusCode;
use smallvec::SmallVec;
use std::any::{type_name, Any, TypeId};
use std::error::Error as StdError;
use std::fmt::{Debug, Display, Formatter};
use thiserror::Error;

/// Identity of an error type used for exception-mapper lookup.
#[derive(Clone, Copy)]
pub struct ErrorClass {
    id: TypeId,
    name: &'static str,
}

/// Marker for the root of every lineage. A mapper registered for it
/// catches everything no closer mapper claims.
pub enum AnyError {}

impl ErrorClass {
    #[must_use]
    pub fn of<T: Any + ?Sized>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// The root class shared by every error.
    #[must_use]
    pub fn any() -> Self {
        Self::of::<AnyError>()
    }

    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ErrorClass {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ErrorClass {}

impl std::hash::Hash for ErrorClass {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Debug for ErrorClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
struct MessageError(String);

/// Type-erased failure raised by application code.
///
/// Built from any error with `?` or [`ResourceError::new`]. Ancestors added
/// with [`with_ancestor`](Self::with_ancestor) let a mapper registered for a
/// broader class claim this error when no mapper targets the concrete one.
pub struct ResourceError {
    inner: Box<dyn StdError + Send + Sync>,
    lineage: SmallVec<[ErrorClass; 4]>,
}

impl ResourceError {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        let mut lineage = SmallVec::new();
        lineage.push(ErrorClass::of::<E>());
        Self {
            inner: Box::new(error),
            lineage,
        }
    }

    /// A plain message error.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(MessageError(message.into()))
    }

    /// Declare `A` as the next broader class in this error's lineage.
    #[must_use]
    pub fn with_ancestor<A: Any + ?Sized>(mut self) -> Self {
        let class = ErrorClass::of::<A>();
        if !self.lineage.contains(&class) {
            self.lineage.push(class);
        }
        self
    }

    /// The concrete class of the wrapped error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        self.lineage[0]
    }

    /// Concrete class, declared ancestors, then [`ErrorClass::any`].
    pub fn lineage(&self) -> impl Iterator<Item = ErrorClass> + '_ {
        self.lineage
            .iter()
            .copied()
            .chain(std::iter::once(ErrorClass::any()))
    }

    #[must_use]
    pub fn is<E: StdError + 'static>(&self) -> bool {
        self.inner.is::<E>()
    }

    #[must_use]
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    /// Take the wrapped error back when it is an `E`.
    pub fn downcast<E: StdError + 'static>(self) -> Result<E, Self> {
        let lineage = self.lineage;
        self.inner
            .downcast::<E>()
            .map(|boxed| *boxed)
            .map_err(|inner| Self { inner, lineage })
    }

    #[must_use]
    pub fn as_std(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.inner.as_ref()
    }
}

impl<E> From<E> for ResourceError
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl Display for ResourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.inner, f)
    }
}

impl Debug for ResourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceError")
            .field("class", &self.class())
            .field("error", &self.inner)
            .finish()
    }
}

/// A failure that carries the response to send.
#[derive(Debug, Error)]
#[error("web application error ({})", .response.status())]
pub struct WebApplicationError {
    response: Response,
}

impl WebApplicationError {
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            response: Response::new(status),
        }
    }

    #[must_use]
    pub fn with_response(response: Response) -> Self {
        Self { response }
    }

    #[must_use]
    pub fn response(&self) -> &Response {
        &self.response
    }

    #[must_use]
    pub fn into_response(self) -> Response {
        self.response
    }
}

/// A resource method body panicked.
#[derive(Debug, Error)]
#[error("resource method `{method}` panicked: {message}")]
pub struct HandlerPanic {
    pub method: String,
    pub message: String,
}

/// A handler was called with an instance of the wrong type.
#[derive(Debug, Error)]
#[error("resource instance is not a `{expected}`")]
pub struct InstanceMismatch {
    pub expected: &'static str,
}

/// Sub-resource locators kept returning resources past the configured limit.
#[derive(Debug, Error)]
#[error("sub-resource locator chain exceeded {limit} levels")]
pub struct LocatorDepthExceeded {
    pub limit: usize,
}

/// Registration-time rejection of a resource class or instance.
#[derive(Debug, Error)]
pub enum InvalidResourceError {
    #[error("`{0}` is registered both as a resource and as a provider")]
    ResourceAndProvider(&'static str),
    #[error("`{0}` declares no usable constructor")]
    NoUsableConstructor(&'static str),
    #[error("root resource `{0}` has no path")]
    MissingPath(&'static str),
    #[error("`{resource}::{method}` declares {count} entity parameters; at most one is allowed")]
    MultipleEntityParameters {
        resource: &'static str,
        method: String,
        count: usize,
    },
    #[error("`{resource}::{method}` is a sub-resource locator and cannot take an entity parameter")]
    EntityOnLocator {
        resource: &'static str,
        method: String,
    },
    #[error("`{resource}::{method}` parameter {index} has no source and is not an entity type")]
    UnboundParameter {
        resource: &'static str,
        method: String,
        index: usize,
    },
    #[error("`{resource}::{method}` has no handler")]
    MissingHandler {
        resource: &'static str,
        method: String,
    },
    #[error("invalid path template on `{resource}`")]
    Template {
        resource: &'static str,
        #[source]
        source: TemplateError,
    },
    #[error("invalid media type on `{resource}::{method}`")]
    MediaType {
        resource: &'static str,
        method: String,
        #[source]
        source: MediaTypeError,
    },
}

/// A request parameter could not be bound.
#[derive(Debug, Error)]
pub enum BindingError {
    #[error("cannot convert {source_kind} parameter `{name}` value `{value}` to {target}: {reason}")]
    Conversion {
        source_kind: ParamSource,
        name: String,
        value: String,
        target: String,
        reason: String,
    },
    #[error("malformed `{header}` header: {source}")]
    MalformedHeader {
        header: &'static str,
        #[source]
        source: MediaTypeError,
    },
    #[error("failed to read request body")]
    Body(#[from] std::io::Error),
}

/// No provider can read or write an entity.
#[derive(Debug, Error)]
pub enum ProviderSelectionError {
    #[error("no message body reader for `{entity_type}` as {media_type}")]
    NoReader {
        entity_type: &'static str,
        media_type: MediaType,
    },
    #[error("no message body writer for `{entity_type}` as {media_type}")]
    NoWriter {
        entity_type: &'static str,
        media_type: MediaType,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("not found: {0}")]
    struct NotFound(u32);

    struct Lookup;

    #[test]
    fn lineage_ends_with_any() {
        let err = ResourceError::new(NotFound(3)).with_ancestor::<Lookup>();
        let lineage: Vec<_> = err.lineage().collect();
        assert_eq!(
            lineage,
            vec![
                ErrorClass::of::<NotFound>(),
                ErrorClass::of::<Lookup>(),
                ErrorClass::any()
            ]
        );
        assert_eq!(err.to_string(), "not found: 3");
    }

    #[test]
    fn downcast_keeps_lineage_on_miss() {
        let err: ResourceError = NotFound(7).into();
        let err = err.downcast::<HandlerPanic>().unwrap_err();
        assert!(err.is::<NotFound>());
        assert_eq!(err.downcast::<NotFound>().unwrap().0, 7);
    }

    #[test]
    fn web_application_error_carries_status() {
        let err = ResourceError::new(WebApplicationError::new(StatusCode::CONFLICT));
        let wae = err.downcast_ref::<WebApplicationError>().unwrap();
        assert_eq!(wae.response().status(), StatusCode::CONFLICT);
    }
}
