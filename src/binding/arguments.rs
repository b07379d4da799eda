use super::context::{HttpHeaders, UriInfo};
use crate::entity::Entity;
use crate::providers::ProvidersRegistry;
use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// An injected context object.
#[derive(Debug, Clone)]
pub enum ContextValue {
    HttpHeaders(HttpHeaders),
    UriInfo(UriInfo),
    Providers(Arc<ProvidersRegistry>),
}

/// One bound parameter value.
pub enum Argument {
    /// No value in the request and no default declared
    Absent,
    Str(String),
    Bool(bool),
    I32(i32),
    I64(i64),
    U64(u64),
    F64(f64),
    List(Vec<Argument>),
    Custom(Arc<dyn Any + Send + Sync>),
    Entity(Entity),
    Context(ContextValue),
}

impl Debug for Argument {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Argument::Absent => f.write_str("Absent"),
            Argument::Str(v) => f.debug_tuple("Str").field(v).finish(),
            Argument::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Argument::I32(v) => f.debug_tuple("I32").field(v).finish(),
            Argument::I64(v) => f.debug_tuple("I64").field(v).finish(),
            Argument::U64(v) => f.debug_tuple("U64").field(v).finish(),
            Argument::F64(v) => f.debug_tuple("F64").field(v).finish(),
            Argument::List(v) => f.debug_tuple("List").field(v).finish(),
            Argument::Custom(_) => f.write_str("Custom(..)"),
            Argument::Entity(e) => f.debug_tuple("Entity").field(e).finish(),
            Argument::Context(c) => f.debug_tuple("Context").field(c).finish(),
        }
    }
}

/// Bound arguments in declaration order.
///
/// Typed accessors return `None` for an absent value or a mismatched
/// declaration.
#[derive(Debug, Default)]
pub struct Arguments {
    values: Vec<Argument>,
}

impl Arguments {
    #[must_use]
    pub fn new(values: Vec<Argument>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Argument> {
        self.values.get(index)
    }

    #[must_use]
    pub fn is_absent(&self, index: usize) -> bool {
        matches!(self.values.get(index), None | Some(Argument::Absent))
    }

    #[must_use]
    pub fn str(&self, index: usize) -> Option<&str> {
        match self.values.get(index)? {
            Argument::Str(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn bool(&self, index: usize) -> Option<bool> {
        match self.values.get(index)? {
            Argument::Bool(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn i32(&self, index: usize) -> Option<i32> {
        match self.values.get(index)? {
            Argument::I32(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn i64(&self, index: usize) -> Option<i64> {
        match self.values.get(index)? {
            Argument::I64(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn u64(&self, index: usize) -> Option<u64> {
        match self.values.get(index)? {
            Argument::U64(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn f64(&self, index: usize) -> Option<f64> {
        match self.values.get(index)? {
            Argument::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Elements of a list parameter; empty for anything else.
    #[must_use]
    pub fn list(&self, index: usize) -> &[Argument] {
        match self.values.get(index) {
            Some(Argument::List(items)) => items,
            _ => &[],
        }
    }

    /// String elements of a list parameter.
    #[must_use]
    pub fn strings(&self, index: usize) -> Vec<&str> {
        self.list(index)
            .iter()
            .filter_map(|a| match a {
                Argument::Str(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    /// A custom-type value converted from a string.
    #[must_use]
    pub fn custom<T: Any>(&self, index: usize) -> Option<&T> {
        match self.values.get(index)? {
            Argument::Custom(v) => v.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Move the request entity out.
    pub fn take_entity<T: Any>(&mut self, index: usize) -> Option<T> {
        let slot = self.values.get_mut(index)?;
        match std::mem::replace(slot, Argument::Absent) {
            Argument::Entity(entity) => match entity.downcast::<T>() {
                Ok(value) => Some(value),
                Err(entity) => {
                    *slot = Argument::Entity(entity);
                    None
                }
            },
            other => {
                *slot = other;
                None
            }
        }
    }

    #[must_use]
    pub fn entity(&self, index: usize) -> Option<&Entity> {
        match self.values.get(index)? {
            Argument::Entity(e) => Some(e),
            _ => None,
        }
    }

    #[must_use]
    pub fn context(&self, index: usize) -> Option<&ContextValue> {
        match self.values.get(index)? {
            Argument::Context(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn headers(&self, index: usize) -> Option<&HttpHeaders> {
        match self.context(index)? {
            ContextValue::HttpHeaders(h) => Some(h),
            _ => None,
        }
    }

    #[must_use]
    pub fn uri_info(&self, index: usize) -> Option<&UriInfo> {
        match self.context(index)? {
            ContextValue::UriInfo(u) => Some(u),
            _ => None,
        }
    }

    #[must_use]
    pub fn providers(&self, index: usize) -> Option<&Arc<ProvidersRegistry>> {
        match self.context(index)? {
            ContextValue::Providers(p) => Some(p),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_access_checks_variant() {
        let args = Arguments::new(vec![
            Argument::I64(5),
            Argument::Str("x".to_string()),
            Argument::Absent,
            Argument::List(vec![Argument::Str("a".into()), Argument::Str("b".into())]),
        ]);
        assert_eq!(args.i64(0), Some(5));
        assert_eq!(args.i32(0), None);
        assert_eq!(args.str(1), Some("x"));
        assert!(args.is_absent(2));
        assert!(args.is_absent(9));
        assert_eq!(args.strings(3), vec!["a", "b"]);
    }

    #[test]
    fn take_entity_keeps_value_on_type_mismatch() {
        let mut args = Arguments::new(vec![Argument::Entity(Entity::new(String::from("body")))]);
        assert_eq!(args.take_entity::<Vec<u8>>(0), None);
        assert_eq!(args.take_entity::<String>(0).as_deref(), Some("body"));
        assert_eq!(args.take_entity::<String>(0), None);
    }
}
