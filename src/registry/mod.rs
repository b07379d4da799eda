//! # Registry Module
//!
//! Owns every root resource record and, through
//! [`ProvidersRegistry`](crate::providers::ProvidersRegistry), every
//! provider of an application.
//!
//! ## Ordering
//!
//! Root records are kept sorted by template specificity (literal characters,
//! then variables, then regex variables), then registration priority (higher
//! first), then registration order. Registering the same class twice keeps
//! both records.
//!
//! ## Concurrency
//!
//! The record list is published through `arc_swap::ArcSwap`, so dispatch
//! reads never take a lock. Registration clones the list under a mutex and
//! swaps the new one in.
//!
//! ## Validation
//!
//! [`ApplicationValidator`] rejects a type registered both as a resource and
//! as a provider. [`Registry::register_application`] logs and skips invalid
//! entries instead of failing the whole application.

mod application;
mod core;
mod record;
mod resources;

pub use application::{Application, ApplicationReport, ApplicationValidator};
pub use core::Registry;
pub use record::{ResourceInstance, ResourceRecord};
pub use resources::ResourceRegistry;
