//! # URI Template Module
//!
//! Compiles JAX-RS style path templates into anchored regexes and matches
//! request paths against them.
//!
//! ## Template Syntax
//!
//! - literal text: `items/special`
//! - `{name}`: one path segment, non-greedy (`[^/]+?`)
//! - `{name: regex}`: a user regex, e.g. `{id: [0-9]+}` or `{rest: .*}`
//!
//! A leading `/` is ignored, and a trailing `/` on the last literal is
//! dropped. Every compiled template has the shape `^(head)(/.*)?$`: group 1
//! is the consumed part of the path, the last group is the unmatched
//! remainder. An empty template matches anything and leaves the whole path
//! as remainder so a root resource at `/` can still host sub-resources.
//!
//! ## Matching
//!
//! A match whose remainder is empty or `/` is *exact* and may select a
//! resource method. Any other remainder is only useful to sub-resource
//! locators, which continue matching against it.
//!
//! ## Specificity
//!
//! [`UriTemplate::compare`] orders templates by literal characters, then by
//! number of variables, then by number of variables with an explicit regex.
//!
//! ## Example
//!
//! ```rust
//! use jaxrouter::uri_template::UriTemplate;
//!
//! let template = UriTemplate::compile("/a/{x}/b").unwrap();
//! let m = template.match_path("/a/123/b/c").unwrap();
//! assert_eq!(m.variable("x"), Some("123"));
//! assert_eq!(m.tail(), "/c");
//! assert!(!m.is_exact());
//! ```

mod core;
mod matcher;
pub mod path;

pub use core::{TemplateError, TemplateVariable, UriTemplate, DEFAULT_VARIABLE_PATTERN};
pub use matcher::{ParamVec, TemplateMatch, UriTemplateMatcher, MAX_INLINE_PARAMS};
