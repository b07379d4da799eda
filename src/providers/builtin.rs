//! Built-in entity providers, registered at system priority.

use super::core::{MessageBodyReader, MessageBodyWriter, ProviderRecord};
use crate::entity::{Entity, EntityType, Form};
use crate::error::{ResourceError, WebApplicationError};
use crate::media::MediaType;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::io::{Read, Write};
use std::marker::PhantomData;
use tracing::debug;

const JSON_TYPES: [&str; 2] = ["application/json", "application/javascript"];
const TEXT_TYPES: [&str; 2] = ["text/plain", "*/*"];

/// The providers every registry starts with.
#[must_use]
pub fn builtin_providers() -> Vec<ProviderRecord> {
    vec![
        ProviderRecord::reader(JsonValueProvider).media_types(&JSON_TYPES),
        ProviderRecord::writer(JsonValueProvider).media_types(&JSON_TYPES),
        ProviderRecord::reader(StringProvider).media_types(&TEXT_TYPES),
        ProviderRecord::writer(StringProvider).media_types(&TEXT_TYPES),
        ProviderRecord::reader(BytesProvider),
        ProviderRecord::writer(BytesProvider),
        ProviderRecord::reader(FormProvider).media_types(&["application/x-www-form-urlencoded"]),
        ProviderRecord::writer(FormProvider).media_types(&["application/x-www-form-urlencoded"]),
    ]
}

fn unreadable(error: impl std::fmt::Display, entity: EntityType) -> ResourceError {
    debug!(entity = entity.name(), %error, "Request entity could not be read");
    WebApplicationError::new(StatusCode::BAD_REQUEST).into()
}

fn wrong_entity(expected: &'static str) -> ResourceError {
    ResourceError::msg(format!("writer expected a `{expected}` entity"))
}

/// `serde_json::Value` as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonValueProvider;

impl MessageBodyReader for JsonValueProvider {
    fn is_readable(&self, ty: EntityType, _: &[&'static str], _: &MediaType) -> bool {
        ty.is::<Value>()
    }

    fn read_from(
        &self,
        ty: EntityType,
        _: &[&'static str],
        _: &MediaType,
        _: &HeaderMap,
        body: &mut dyn Read,
    ) -> Result<Entity, ResourceError> {
        let value: Value = serde_json::from_reader(body).map_err(|e| unreadable(e, ty))?;
        Ok(Entity::new(value))
    }
}

impl MessageBodyWriter for JsonValueProvider {
    fn is_writeable(&self, ty: EntityType, _: &[&'static str], _: &MediaType) -> bool {
        ty.is::<Value>()
    }

    fn write_to(
        &self,
        entity: &Entity,
        _: &[&'static str],
        _: &MediaType,
        _: &mut HeaderMap,
        out: &mut dyn Write,
    ) -> Result<(), ResourceError> {
        let value = entity
            .downcast_ref::<Value>()
            .ok_or_else(|| wrong_entity("serde_json::Value"))?;
        serde_json::to_writer(out, value)?;
        Ok(())
    }
}

/// Any serde type as `application/json`.
///
/// ```rust
/// use jaxrouter::providers::{JsonProvider, ProviderRecord};
///
/// #[derive(serde::Serialize, serde::Deserialize)]
/// struct Pet { name: String }
///
/// let reader = ProviderRecord::reader(JsonProvider::<Pet>::new());
/// let writer = ProviderRecord::writer(JsonProvider::<Pet>::new());
/// # let _ = (reader, writer);
/// ```
pub struct JsonProvider<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonProvider<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonProvider<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn is_json(media_type: &MediaType) -> bool {
    media_type.is_compatible(&MediaType::application_json())
        || media_type.subtype().ends_with("+json")
}

impl<T> MessageBodyReader for JsonProvider<T>
where
    T: DeserializeOwned + Any + Send + Sync,
{
    fn is_readable(&self, ty: EntityType, _: &[&'static str], media_type: &MediaType) -> bool {
        ty.is::<T>() && is_json(media_type)
    }

    fn read_from(
        &self,
        ty: EntityType,
        _: &[&'static str],
        _: &MediaType,
        _: &HeaderMap,
        body: &mut dyn Read,
    ) -> Result<Entity, ResourceError> {
        let value: T = serde_json::from_reader(body).map_err(|e| unreadable(e, ty))?;
        Ok(Entity::new(value))
    }
}

impl<T> MessageBodyWriter for JsonProvider<T>
where
    T: Serialize + Any + Send + Sync,
{
    fn is_writeable(&self, ty: EntityType, _: &[&'static str], media_type: &MediaType) -> bool {
        ty.is::<T>() && is_json(media_type)
    }

    fn write_to(
        &self,
        entity: &Entity,
        _: &[&'static str],
        _: &MediaType,
        _: &mut HeaderMap,
        out: &mut dyn Write,
    ) -> Result<(), ResourceError> {
        let value = entity
            .downcast_ref::<T>()
            .ok_or_else(|| wrong_entity(std::any::type_name::<T>()))?;
        serde_json::to_writer(out, value)?;
        Ok(())
    }
}

/// UTF-8 text for any media type. Also writes `&'static str`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringProvider;

impl MessageBodyReader for StringProvider {
    fn is_readable(&self, ty: EntityType, _: &[&'static str], _: &MediaType) -> bool {
        ty.is::<String>()
    }

    fn read_from(
        &self,
        ty: EntityType,
        _: &[&'static str],
        _: &MediaType,
        _: &HeaderMap,
        body: &mut dyn Read,
    ) -> Result<Entity, ResourceError> {
        let mut text = String::new();
        body.read_to_string(&mut text)
            .map_err(|e| unreadable(e, ty))?;
        Ok(Entity::new(text))
    }
}

impl MessageBodyWriter for StringProvider {
    fn is_writeable(&self, ty: EntityType, _: &[&'static str], _: &MediaType) -> bool {
        ty.is::<String>() || ty.is::<&'static str>()
    }

    fn size(&self, entity: &Entity, _: &MediaType) -> Option<u64> {
        text_of(entity).map(|s| s.len() as u64)
    }

    fn write_to(
        &self,
        entity: &Entity,
        _: &[&'static str],
        _: &MediaType,
        _: &mut HeaderMap,
        out: &mut dyn Write,
    ) -> Result<(), ResourceError> {
        let text = text_of(entity).ok_or_else(|| wrong_entity("String"))?;
        out.write_all(text.as_bytes())?;
        Ok(())
    }
}

fn text_of(entity: &Entity) -> Option<&str> {
    entity
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| entity.downcast_ref::<&'static str>().copied())
}

/// Raw bytes for any media type.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesProvider;

impl MessageBodyReader for BytesProvider {
    fn is_readable(&self, ty: EntityType, _: &[&'static str], _: &MediaType) -> bool {
        ty.is::<Vec<u8>>()
    }

    fn read_from(
        &self,
        _: EntityType,
        _: &[&'static str],
        _: &MediaType,
        _: &HeaderMap,
        body: &mut dyn Read,
    ) -> Result<Entity, ResourceError> {
        let mut bytes = Vec::new();
        body.read_to_end(&mut bytes)?;
        Ok(Entity::new(bytes))
    }
}

impl MessageBodyWriter for BytesProvider {
    fn is_writeable(&self, ty: EntityType, _: &[&'static str], _: &MediaType) -> bool {
        ty.is::<Vec<u8>>()
    }

    fn size(&self, entity: &Entity, _: &MediaType) -> Option<u64> {
        entity.downcast_ref::<Vec<u8>>().map(|b| b.len() as u64)
    }

    fn write_to(
        &self,
        entity: &Entity,
        _: &[&'static str],
        _: &MediaType,
        _: &mut HeaderMap,
        out: &mut dyn Write,
    ) -> Result<(), ResourceError> {
        let bytes = entity
            .downcast_ref::<Vec<u8>>()
            .ok_or_else(|| wrong_entity("Vec<u8>"))?;
        out.write_all(bytes)?;
        Ok(())
    }
}

/// `application/x-www-form-urlencoded` as [`Form`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FormProvider;

impl MessageBodyReader for FormProvider {
    fn is_readable(&self, ty: EntityType, _: &[&'static str], _: &MediaType) -> bool {
        ty.is::<Form>()
    }

    fn read_from(
        &self,
        ty: EntityType,
        _: &[&'static str],
        _: &MediaType,
        _: &HeaderMap,
        body: &mut dyn Read,
    ) -> Result<Entity, ResourceError> {
        let mut text = String::new();
        body.read_to_string(&mut text)
            .map_err(|e| unreadable(e, ty))?;
        Ok(Entity::new(Form::parse(&text)))
    }
}

impl MessageBodyWriter for FormProvider {
    fn is_writeable(&self, ty: EntityType, _: &[&'static str], _: &MediaType) -> bool {
        ty.is::<Form>()
    }

    fn write_to(
        &self,
        entity: &Entity,
        _: &[&'static str],
        _: &MediaType,
        _: &mut HeaderMap,
        out: &mut dyn Write,
    ) -> Result<(), ResourceError> {
        let form = entity.downcast_ref::<Form>().ok_or_else(|| wrong_entity("Form"))?;
        out.write_all(form.encode().as_bytes())?;
        Ok(())
    }
}
