//! Type-erased request and response entities.
//!
//! Resource methods, message body readers and writers exchange values as an
//! [`Entity`]: a boxed value tagged with its [`EntityType`]. The type tag
//! stands in for a Java `Class` + generic type pair when providers are asked
//! whether they can read or write a value.

use crate::uri_template::path;
use std::any::{type_name, Any, TypeId};
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};

/// Runtime identity of an entity type.
#[derive(Clone, Copy)]
pub struct EntityType {
    id: TypeId,
    name: &'static str,
}

impl EntityType {
    #[must_use]
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EntityType {}

impl Hash for EntityType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Debug for EntityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// A boxed entity value with its type tag.
pub struct Entity {
    value: Box<dyn Any + Send + Sync>,
    ty: EntityType,
}

impl Entity {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Box::new(value),
            ty: EntityType::of::<T>(),
        }
    }

    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        self.ty
    }

    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.ty.is::<T>()
    }

    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Take the value out, or get the entity back when the type differs.
    pub fn downcast<T: Any>(self) -> Result<T, Entity> {
        let ty = self.ty;
        self.value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|value| Entity { value, ty })
    }
}

impl Debug for Entity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity").field("type", &self.ty).finish()
    }
}

/// Decoded `application/x-www-form-urlencoded` body: an ordered multimap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    fields: Vec<(String, String)>,
}

impl Form {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and decode an urlencoded body.
    #[must_use]
    pub fn parse(body: &str) -> Self {
        let fields = body
            .split('&')
            .filter(|p| !p.is_empty())
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                (
                    path::decode_form_component(k),
                    path::decode_form_component(v),
                )
            })
            .collect();
        Self { fields }
    }

    #[must_use]
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.fields.push((name.to_string(), value.to_string()));
        self
    }

    /// First value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[must_use]
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Encode back to `a=1&b=2`.
    #[must_use]
    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.fields.iter())
            .finish()
    }
}
