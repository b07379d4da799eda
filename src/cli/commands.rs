use crate::media::{AcceptHeader, MediaType};
use crate::runtime_config::RuntimeConfig;
use crate::uri_template::UriTemplate;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

/// Command-line interface for jaxrouter
///
/// Inspects how templates match paths, how `Accept` headers negotiate and
/// which runtime configuration is in effect.
#[derive(Parser, Debug)]
#[command(name = "jaxrouter", version)]
#[command(about = "jaxrouter dispatch inspection CLI", long_about = None)]
pub struct Cli {
    /// Output layout
    #[arg(long, value_enum, default_value_t = OutputFormat::Pretty, global = true)]
    pub format: OutputFormat,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Indented JSON
    Pretty,
    /// Single-line JSON
    Compact,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Match a path against a URI template
    Match {
        /// Template such as `/items/{id: [0-9]+}`
        #[arg(short, long)]
        template: String,

        /// Request path to match
        #[arg(short, long)]
        path: String,
    },
    /// Negotiate an Accept header against produced media types
    Negotiate {
        /// Accept header value
        #[arg(short, long, default_value = "*/*")]
        accept: String,

        /// Produced media types, comma-separated or repeated
        #[arg(short, long, num_args = 1.., value_delimiter = ',', required = true)]
        produces: Vec<String>,
    },
    /// Print the effective runtime configuration
    Config {
        /// TOML file to load before applying `JAXR_*` overrides
        #[arg(short, long, env = "JAXR_CONFIG")]
        file: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
pub struct Specificity {
    pub literal_chars: usize,
    pub variables: usize,
    pub non_default_patterns: usize,
}

/// Result of the `match` command.
#[derive(Debug, Serialize)]
pub struct MatchReport {
    pub template: String,
    pub pattern: String,
    pub path: String,
    pub matched: bool,
    pub exact: bool,
    pub head: Option<String>,
    pub tail: Option<String>,
    pub variables: Vec<(String, String)>,
    pub specificity: Specificity,
}

/// Result of the `negotiate` command.
#[derive(Debug, Serialize)]
pub struct NegotiateReport {
    pub accept: Vec<String>,
    pub denied: Vec<String>,
    pub selected: Option<String>,
    pub resolved: Option<String>,
    pub quality: Option<f32>,
}

/// Run one parsed command, writing its JSON report to `out`.
pub fn run_cli<W: Write>(cli: Cli, out: &mut W) -> Result<()> {
    let report = match &cli.command {
        Commands::Match { template, path } => serde_json::to_value(match_report(template, path)?)?,
        Commands::Negotiate { accept, produces } => {
            serde_json::to_value(negotiate_report(accept, produces)?)?
        }
        Commands::Config { file } => {
            let config = RuntimeConfig::load(file.as_deref()).with_context(|| match file {
                Some(file) => format!("failed to load config from {}", file.display()),
                None => "failed to load config from the environment".to_string(),
            })?;
            serde_json::to_value(config)?
        }
    };
    match cli.format {
        OutputFormat::Pretty => serde_json::to_writer_pretty(&mut *out, &report)?,
        OutputFormat::Compact => serde_json::to_writer(&mut *out, &report)?,
    }
    writeln!(out)?;
    Ok(())
}

pub fn match_report(template: &str, path: &str) -> Result<MatchReport> {
    let compiled =
        UriTemplate::compile(template).with_context(|| format!("invalid template `{template}`"))?;
    let matched = compiled.match_path(path);
    Ok(MatchReport {
        template: compiled.as_str().to_string(),
        pattern: compiled.pattern().to_string(),
        path: path.to_string(),
        matched: matched.is_some(),
        exact: matched.as_ref().is_some_and(|m| m.is_exact()),
        head: matched.as_ref().map(|m| m.head().to_string()),
        tail: matched.as_ref().map(|m| m.tail().to_string()),
        variables: matched
            .as_ref()
            .map(|m| {
                m.variables()
                    .iter()
                    .map(|(name, value)| (name.to_string(), value.clone()))
                    .collect()
            })
            .unwrap_or_default(),
        specificity: Specificity {
            literal_chars: compiled.literal_chars(),
            variables: compiled.variables().len(),
            non_default_patterns: compiled.non_default_patterns(),
        },
    })
}

pub fn negotiate_report(accept: &str, produces: &[String]) -> Result<NegotiateReport> {
    let produced = produces
        .iter()
        .map(|p| MediaType::parse(p.trim()).with_context(|| format!("invalid media type `{p}`")))
        .collect::<Result<Vec<_>>>()?;
    let header = AcceptHeader::parse(accept);
    let best = header.best_match(&produced);
    Ok(NegotiateReport {
        accept: header
            .acceptable()
            .iter()
            .map(|entry| format!("{};q={}", entry.media_type(), quality(entry.quality())))
            .collect(),
        denied: header.denied().iter().map(ToString::to_string).collect(),
        selected: best.as_ref().map(|m| m.produced().to_string()),
        resolved: best.as_ref().map(|m| m.resolved().to_string()),
        quality: best.as_ref().map(|m| quality(m.quality())),
    })
}

fn quality(q: u16) -> f32 {
    f32::from(q) / 1000.0
}
