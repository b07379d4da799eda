//! # Server Module
//!
//! Transport-facing request and response types.
//!
//! The runtime does not parse HTTP itself. A transport hands the
//! [`Dispatcher`](crate::dispatcher::Dispatcher) a decoded [`Request`]
//! (method, URI, case-insensitive header multimap, body stream) and gets a
//! [`ServerResponse`] back (status, headers, body bytes).
//!
//! Resource methods build the richer [`Response`], whose entity is still a
//! typed value until a message body writer serializes it.

pub mod request;
pub mod response;

pub use request::{parse_cookies, Request};
pub use response::{Response, ServerResponse};
