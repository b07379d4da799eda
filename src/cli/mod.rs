//! # CLI Module
//!
//! Command-line inspection of the pieces dispatch is built from. Every
//! command prints a JSON report.
//!
//! ## Commands
//!
//! ### `match`
//!
//! Match a path against a URI template and show the captured variables,
//! the unmatched remainder and the template's specificity:
//!
//! ```bash
//! jaxrouter match --template '/items/{id: [0-9]+}' --path /items/42/tags
//! ```
//!
//! ### `negotiate`
//!
//! Pick the produced media type an `Accept` header prefers:
//!
//! ```bash
//! jaxrouter negotiate --accept 'text/*;q=0.5, application/json' \
//!     --produces text/plain,application/json
//! ```
//!
//! ### `config`
//!
//! Print the effective [`RuntimeConfig`](crate::runtime_config::RuntimeConfig)
//! after the file (if any) and `JAXR_*` overrides are applied:
//!
//! ```bash
//! jaxrouter config --file jaxrouter.toml
//! ```
//!
//! ## Usage from Code
//!
//! ```rust
//! use clap::Parser;
//! use jaxrouter::cli::{run_cli, Cli};
//!
//! let cli = Cli::try_parse_from(["jaxrouter", "--format", "compact", "match", "-t", "/a/{x}", "-p", "/a/1"]).unwrap();
//! let mut out = Vec::new();
//! run_cli(cli, &mut out).unwrap();
//! assert!(String::from_utf8(out).unwrap().contains("\"exact\":true"));
//! ```

mod commands;


pub use commands::{
    match_report, negotiate_report, run_cli, Cli, Commands, MatchReport, NegotiateReport,
    OutputFormat, Specificity,
};
