//! # jaxrouter
//!
//! **jaxrouter** is a JAX-RS style resource dispatch runtime for Rust. Resource types describe
//! their paths, HTTP verbs, media types and parameters; the runtime matches decoded requests to
//! one resource method, binds its parameters, invokes it and serializes what it returns.
//!
//! ## Overview
//!
//! The runtime sits between an HTTP transport and application code. The transport hands a
//! decoded [`server::Request`] to the [`dispatcher::Dispatcher`] (directly, or through the
//! coroutine-backed [`worker_pool::WorkerPool`]) and writes back the [`server::ServerResponse`].
//! Parsing HTTP, TLS and connection handling stay with the transport.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - **[`uri_template`]** - Path templates compiled to anchored regexes, with specificity ordering
//! - **[`media`]** - Media types, `Accept` parsing and content negotiation
//! - **[`metadata`]** - Resource class declarations and the collector that validates them
//! - **[`registry`]** - Root resources and providers, applied from an [`registry::Application`]
//! - **[`lifecycle`]** - Object factories for singleton and per-request instances
//! - **[`binding`]** - Per-request context and parameter binding
//! - **[`providers`]** - Message body readers/writers, exception mappers, context resolvers
//! - **[`dispatcher`]** - Matching, method selection, invocation and response writing
//! - **[`worker_pool`]** - Bounded `may` coroutine pool in front of the dispatcher
//! - **[`runtime_config`]** - TOML and `JAXR_*` environment configuration
//! - **[`logging`]** - `tracing` subscriber setup for binaries
//! - **[`cli`]** - The `jaxrouter` inspection commands
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant T as Transport
//!     participant D as Dispatcher
//!     participant R as Registry
//!     participant F as ObjectFactory
//!     participant P as ProvidersRegistry
//!
//!     T->>D: dispatch(Request)
//!     D->>R: get_matching_root_resources(path)
//!     R-->>D: most specific first
//!     loop while the path has a remainder
//!         D->>F: get_instance (locator owner)
//!         D->>D: invoke locator, match sub-resource
//!     end
//!     D->>D: select method (verb, Content-Type, Accept)
//!     D->>F: get_instance
//!     D->>P: read entity parameter
//!     D->>D: invoke resource method
//!     D->>P: write entity / map error
//!     D->>F: release_instance
//!     D-->>T: ServerResponse
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use jaxrouter::dispatcher::Dispatcher;
//! use jaxrouter::metadata::{MethodDecl, Outcome, ParamDecl, Resource, ResourceClass};
//! use jaxrouter::registry::{Application, Registry};
//! use jaxrouter::server::Request;
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Echo;
//!
//! impl Resource for Echo {
//!     fn describe() -> ResourceClass {
//!         ResourceClass::new::<Echo>()
//!             .path("/echo")
//!             .default_constructor::<Echo>()
//!             .method(
//!                 MethodDecl::post("echo")
//!                     .consumes(&["application/json"])
//!                     .produces(&["application/json"])
//!                     .param(ParamDecl::entity::<serde_json::Value>())
//!                     .handler(|_: &Echo, mut args| {
//!                         let body: serde_json::Value = args.take_entity(0).unwrap_or_default();
//!                         Ok(Outcome::entity(body))
//!                     }),
//!             )
//!     }
//! }
//!
//! let registry = Registry::default();
//! let report = registry.register_application(Application::new().resource::<Echo>());
//! assert_eq!(report.resources, 1);
//!
//! let dispatcher = Dispatcher::new(Arc::new(registry));
//! let response = dispatcher.dispatch(
//!     Request::new(http::Method::POST, "/echo")
//!         .with_header("Content-Type", "application/json")
//!         .with_body(r#"{"a":1}"#),
//! );
//! assert_eq!(response.status, 200);
//! assert_eq!(response.json().unwrap()["a"], 1);
//! ```
//!
//! ## Runtime Considerations
//!
//! - The registry is read-mostly: dispatch reads a published snapshot without locking, and
//!   registration swaps in a new one under a coarse write lock.
//! - Per-request state ([`binding::RuntimeContext`]) never crosses threads.
//! - Singleton resource methods may be invoked concurrently; their bodies must be thread-safe.
//! - Worker coroutines run with the configured `stack_size`; deep recursion inside resource
//!   methods needs a larger one.

pub mod binding;
pub mod cli;
pub mod dispatcher;
pub mod entity;
pub mod error;
pub mod ids;
pub mod lifecycle;
pub mod logging;
pub mod media;
pub mod metadata;
pub mod providers;
pub mod registry;
pub mod runtime_config;
pub mod server;
pub mod uri_template;
pub mod worker_pool;

pub use dispatcher::{Dispatcher, MatchResult};
pub use error::{ResourceError, WebApplicationError};
pub use registry::{Application, Registry};
pub use runtime_config::RuntimeConfig;
