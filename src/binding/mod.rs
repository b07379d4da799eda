//! # Binding Module
//!
//! Turns request data into resource method arguments.
//!
//! ## Sources
//!
//! | Source | Raw values | Decoding |
//! |--------|------------|----------|
//! | path | last capture of the variable | percent |
//! | matrix | every `;name=` in the path | percent |
//! | query | every `name=` in the query | form (`+` is a space) |
//! | header | every header value | none |
//! | cookie | first cookie of that name | none |
//! | form | every field of an urlencoded body | form |
//!
//! `encoded` parameters skip decoding.
//!
//! ## Conversion
//!
//! Values convert to primitives by parsing, to custom types through their
//! `value_of` factory or else their `from_string` constructor. When a value
//! does not convert:
//!
//! - path and matrix parameters fail the request with `400`;
//! - other sources fall back to the declared default, then to an empty list
//!   for list types, and otherwise fail with `400`.
//!
//! A missing value binds the default, an empty list, or
//! [`Argument::Absent`].
//!
//! Entity parameters are read through the providers registry; context
//! parameters receive an [`HttpHeaders`], [`UriInfo`] or the providers
//! handle.

mod arguments;
mod context;
mod core;

pub use arguments::{Argument, Arguments, ContextValue};
pub use context::{HttpHeaders, RuntimeContext, UriInfo};
pub use core::{bind, convert, BindFailure};
