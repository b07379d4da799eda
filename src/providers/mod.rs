//! # Providers Module
//!
//! Entity providers, exception mappers and context resolvers, and the
//! registry that selects among them during dispatch.
//!
//! ## Selection
//!
//! For readers, writers and context resolvers the registry
//!
//! 1. keeps the providers whose declared media types are compatible with the
//!    requested one (no declaration means `*/*`),
//! 2. orders them by the specificity of the best compatible declaration,
//!    then by priority (higher first), then by registration order,
//! 3. probes `is_readable` / `is_writeable` in that order and returns the
//!    first provider that answers `true`.
//!
//! Exception mappers are looked up along the error lineage of a
//! [`ResourceError`](crate::error::ResourceError): the concrete class first,
//! then declared ancestors, then the catch-all class.
//!
//! ## Example
//!
//! ```rust
//! use jaxrouter::entity::Entity;
//! use jaxrouter::media::MediaType;
//! use jaxrouter::providers::ProvidersRegistry;
//! use http::HeaderMap;
//!
//! let providers = ProvidersRegistry::with_builtins(0.5, 0.1);
//! let body = providers
//!     .write_entity(
//!         &Entity::new(serde_json::json!({"ok": true})),
//!         &[],
//!         &MediaType::application_json(),
//!         &mut HeaderMap::new(),
//!     )
//!     .unwrap();
//! assert_eq!(body, br#"{"ok":true}"#);
//! ```

mod builtin;
mod core;
mod registry;

pub use builtin::{
    builtin_providers, BytesProvider, FormProvider, JsonProvider, JsonValueProvider,
    StringProvider,
};
pub use core::{
    ContextResolver, ExceptionMapper, MessageBodyReader, MessageBodyWriter, ProviderKind,
    ProviderRecord,
};
pub use registry::{ProvidersRegistry, DEFAULT_PRIORITY, SYSTEM_PRIORITY};
