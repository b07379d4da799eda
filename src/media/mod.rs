//! # Media Type Module
//!
//! Media types and `Accept` header negotiation shared by method selection,
//! provider lookup and response writing.
//!
//! ## Overview
//!
//! - [`MediaType`] parses `type/subtype;param=value` values, answers
//!   wildcard-aware compatibility questions and ranks specificity
//!   (`text/plain` > `text/*` > `*/*`).
//! - [`AcceptHeader`] parses one or more `Accept` header values, orders the
//!   acceptable ranges by quality then specificity, keeps `q=0` ranges as
//!   explicit denials and picks the best produced type for a request.
//!
//! ## Example
//!
//! ```rust
//! use jaxrouter::media::{AcceptHeader, MediaType};
//!
//! let accept = AcceptHeader::parse("text/*;q=0.5, application/json");
//! let produced = [MediaType::text_plain(), MediaType::application_json()];
//! let best = accept.best_match(&produced).unwrap();
//! assert_eq!(best.produced().essence(), "application/json");
//! ```

mod accept;
mod media_type;

pub use accept::{AcceptEntry, AcceptHeader, NegotiatedMatch};
pub use media_type::{MediaType, MediaTypeError};
