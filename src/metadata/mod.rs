//! # Resource Metadata Module
//!
//! Describes resource classes and turns those descriptions into immutable
//! metadata that the registry and dispatcher consume.
//!
//! ## Overview
//!
//! Resource types implement [`Resource`] and return a [`ResourceClass`]:
//! an explicit builder listing the path, scope, constructors and methods
//! with their verbs, sub-paths, media types and parameter declarations.
//! [`collect`] validates a class once at registration time and produces
//! [`ResourceMetadata`]:
//!
//! - parameter sources are classified (`@Context` > `@PathParam` >
//!   `@MatrixParam` > `@QueryParam` > `@FormParam` > `@HeaderParam` >
//!   `@CookieParam`; an unannotated entity type becomes the entity)
//! - at most one entity parameter per method
//! - methods split into resource methods (verb only), sub-resource methods
//!   (verb + path) and sub-resource locators (path only)
//! - sub-resources are pre-sorted by template specificity
//! - for class registrations, the constructor with the most satisfiable
//!   parameters is selected
//!
//! ## Example
//!
//! ```rust
//! use jaxrouter::metadata::{collect, CollectMode, MethodDecl, Outcome, ParamDecl, ParamType, Resource, ResourceClass};
//!
//! #[derive(Default)]
//! struct Items;
//!
//! impl Resource for Items {
//!     fn describe() -> ResourceClass {
//!         ResourceClass::new::<Items>()
//!             .path("/items")
//!             .default_constructor::<Items>()
//!             .method(
//!                 MethodDecl::get("find")
//!                     .path("{id}")
//!                     .produces(&["application/json"])
//!                     .param(ParamDecl::path("id", ParamType::I64))
//!                     .handler(|_: &Items, args| {
//!                         Ok(Outcome::entity(serde_json::json!({ "id": args.i64(0) })))
//!                     }),
//!             )
//!     }
//! }
//!
//! let metadata = collect(&Items::describe(), CollectMode::RootClass).unwrap();
//! assert_eq!(metadata.sub_resources().len(), 1);
//! ```

mod class;
mod collector;
mod types;

pub use class::{
    ConstructorDecl, ConstructorFn, Handler, Instance, Located, MethodDecl, Outcome, ParamDecl,
    ReleaseHook, Resource, ResourceClass,
};
pub(crate) use class::LocatedClass;
pub use collector::{collect, CollectMode};
pub use types::{
    ConstructorMetadata, ContextKind, Converter, CustomType, MethodKind, MethodMetadata,
    ParamAnnotation, ParamSource, ParamType, ParameterMetadata, ResourceMetadata, Scope,
};
