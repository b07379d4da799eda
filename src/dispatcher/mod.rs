//! # Dispatcher Module
//!
//! Matches a decoded [`Request`](crate::server::Request) to one resource
//! method, invokes it and writes the result.
//!
//! ## Request Flow
//!
//! 1. **Root match**: the registry returns every root resource whose
//!    template matches the path, most specific first. The best one is used
//!    (every one in turn with `continued_search`).
//! 2. **Sub-resource resolution**: while the match leaves a remainder, the
//!    resource's sub-resource methods and locators are matched against it.
//!    Sub-resource methods sharing a template go to method selection.
//!    A locator is invoked and the object it returns is matched against
//!    the rest of the path, up to `max_locator_depth` levels.
//! 3. **Method selection**: candidates are filtered by verb (`405`), by
//!    `Content-Type` against `consumes` (`415`) and by `Accept` against
//!    `produces` (`406`), then ranked by accept quality, produced type
//!    specificity, consumed type specificity, parameter count and
//!    declaration order. `HEAD` falls back to `GET` and `OPTIONS` is
//!    answered with an `Allow` header when not declared.
//! 4. **Invoke**: the instance comes from the record's object factory,
//!    parameters are bound from the request, panics are caught.
//! 5. **Response write**: a returned entity is written by the best message
//!    body writer for the negotiated media type. Failures go through
//!    exception mappers and otherwise become an empty `500`.
//!
//! Every response carries `Content-Length` and `x-request-id`.
//!
//! ## Example
//!
//! ```rust
//! use jaxrouter::dispatcher::Dispatcher;
//! use jaxrouter::metadata::{MethodDecl, Outcome, ParamDecl, ParamType, Resource, ResourceClass};
//! use jaxrouter::registry::Registry;
//! use jaxrouter::server::Request;
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Greeter;
//!
//! impl Resource for Greeter {
//!     fn describe() -> ResourceClass {
//!         ResourceClass::new::<Greeter>()
//!             .path("/hello/{name}")
//!             .default_constructor::<Greeter>()
//!             .method(
//!                 MethodDecl::get("hello")
//!                     .produces(&["text/plain"])
//!                     .param(ParamDecl::path("name", ParamType::String))
//!                     .handler(|_: &Greeter, args| {
//!                         Ok(Outcome::entity(format!("hello {}", args.str(0).unwrap_or("?"))))
//!                     }),
//!             )
//!     }
//! }
//!
//! let registry = Registry::default();
//! registry.add_resource::<Greeter>().unwrap();
//! let dispatcher = Dispatcher::new(Arc::new(registry));
//!
//! let response = dispatcher.dispatch(Request::get("/hello/world"));
//! assert_eq!(response.status, 200);
//! assert_eq!(response.body_str(), Some("hello world"));
//! assert_eq!(response.header("content-type"), Some("text/plain"));
//! ```

mod core;
mod selection;

pub use core::{Dispatcher, MatchResult, MatchedMethod};
