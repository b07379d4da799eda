use crate::entity::Entity;
use crate::media::MediaType;
use http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use std::any::Any;
use std::io::Write;
use tracing::warn;

/// An application-level response: status, headers and an optional entity
/// that still has to be serialized by a message body writer.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    entity: Option<Entity>,
}

impl Response {
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            entity: None,
        }
    }

    #[must_use]
    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    #[must_use]
    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT)
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_entity<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.entity = Some(Entity::new(value));
        self
    }

    #[must_use]
    pub fn with_boxed_entity(mut self, entity: Entity) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Append a header. Invalid names or values are logged and skipped.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => warn!(header = name, "Skipping invalid response header"),
        }
        self
    }

    /// Set an explicit `Content-Type`, bypassing negotiation.
    #[must_use]
    pub fn with_media_type(mut self, media_type: &MediaType) -> Self {
        if let Ok(value) = HeaderValue::from_str(&media_type.to_string()) {
            self.headers.insert(CONTENT_TYPE, value);
        }
        self
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    #[must_use]
    pub fn entity(&self) -> Option<&Entity> {
        self.entity.as_ref()
    }

    pub fn take_entity(&mut self) -> Option<Entity> {
        self.entity.take()
    }

    /// Media type from an explicit `Content-Type` header, if parseable.
    #[must_use]
    pub fn media_type(&self) -> Option<MediaType> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| MediaType::parse(v).ok())
    }

    pub(crate) fn into_parts(self) -> (StatusCode, HeaderMap, Option<Entity>) {
        (self.status, self.headers, self.entity)
    }
}

/// The wire-level result of a dispatch: status, headers and body bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ServerResponse {
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// First value of a header as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body as UTF-8, if it is valid.
    #[must_use]
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Parse the body as JSON.
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }

    /// Copy the body to a transport sink.
    pub fn write_body<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_all(&self.body)
    }
}
