use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// Failure to parse a media type string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaTypeError {
    #[error("media type is empty")]
    Empty,
    #[error("media type `{0}` has no subtype")]
    MissingSubtype(String),
    #[error("media type `{0}` contains an invalid token")]
    InvalidToken(String),
    #[error("media type `{value}` has a malformed parameter `{parameter}`")]
    MalformedParameter { value: String, parameter: String },
}

/// A parsed media type (`type/subtype;key=value`).
///
/// Type, subtype and parameter names are lowercased on parse; parameter
/// values keep their case and declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType {
    main: String,
    sub: String,
    params: Vec<(String, String)>,
}

pub const WILDCARD: &str = "*";

impl MediaType {
    /// Build a media type from already-valid type and subtype tokens.
    #[must_use]
    pub fn new(main: &str, sub: &str) -> Self {
        Self {
            main: main.to_ascii_lowercase(),
            sub: sub.to_ascii_lowercase(),
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn wildcard() -> Self {
        Self::new(WILDCARD, WILDCARD)
    }

    #[must_use]
    pub fn application_json() -> Self {
        Self::new("application", "json")
    }

    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain")
    }

    #[must_use]
    pub fn octet_stream() -> Self {
        Self::new("application", "octet-stream")
    }

    #[must_use]
    pub fn form_urlencoded() -> Self {
        Self::new("application", "x-www-form-urlencoded")
    }

    /// Parse a single media type.
    ///
    /// A bare `*` is accepted as shorthand for `*/*`.
    pub fn parse(value: &str) -> Result<Self, MediaTypeError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(MediaTypeError::Empty);
        }
        let mut parts = trimmed.split(';');
        let essence = parts.next().unwrap_or_default().trim();
        let (main, sub) = if essence == WILDCARD {
            (WILDCARD, WILDCARD)
        } else {
            let (main, sub) = essence
                .split_once('/')
                .ok_or_else(|| MediaTypeError::MissingSubtype(trimmed.to_string()))?;
            (main.trim(), sub.trim())
        };
        if sub.is_empty() {
            return Err(MediaTypeError::MissingSubtype(trimmed.to_string()));
        }
        if !is_token(main) || !is_token(sub) || (main == WILDCARD && sub != WILDCARD) {
            return Err(MediaTypeError::InvalidToken(trimmed.to_string()));
        }

        let mut params = Vec::new();
        for raw in parts {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let (key, val) = raw
                .split_once('=')
                .ok_or_else(|| MediaTypeError::MalformedParameter {
                    value: trimmed.to_string(),
                    parameter: raw.to_string(),
                })?;
            let key = key.trim();
            if !is_token(key) {
                return Err(MediaTypeError::MalformedParameter {
                    value: trimmed.to_string(),
                    parameter: raw.to_string(),
                });
            }
            let val = val.trim().trim_matches('"');
            params.push((key.to_ascii_lowercase(), val.to_string()));
        }

        Ok(Self {
            main: main.to_ascii_lowercase(),
            sub: sub.to_ascii_lowercase(),
            params,
        })
    }

    #[must_use]
    pub fn main_type(&self) -> &str {
        &self.main
    }

    #[must_use]
    pub fn subtype(&self) -> &str {
        &self.sub
    }

    #[must_use]
    pub fn parameters(&self) -> &[(String, String)] {
        &self.params
    }

    /// Value of the named parameter (case-insensitive name).
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn with_parameter(mut self, name: &str, value: &str) -> Self {
        self.params.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.params
            .push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    #[must_use]
    pub fn without_parameters(&self) -> Self {
        Self::new(&self.main, &self.sub)
    }

    /// `type/subtype` without parameters.
    #[must_use]
    pub fn essence(&self) -> String {
        format!("{}/{}", self.main, self.sub)
    }

    #[must_use]
    pub fn is_wildcard_type(&self) -> bool {
        self.main == WILDCARD
    }

    #[must_use]
    pub fn is_wildcard_subtype(&self) -> bool {
        self.sub == WILDCARD
    }

    /// True when neither the type nor the subtype is a wildcard.
    #[must_use]
    pub fn is_concrete(&self) -> bool {
        !self.is_wildcard_type() && !self.is_wildcard_subtype()
    }

    /// Symmetric wildcard-aware compatibility: `text/*` and `text/plain` are
    /// compatible in both directions, `*/*` is compatible with everything.
    #[must_use]
    pub fn is_compatible(&self, other: &MediaType) -> bool {
        if self.is_wildcard_type() || other.is_wildcard_type() {
            return true;
        }
        if self.main != other.main {
            return false;
        }
        self.is_wildcard_subtype() || other.is_wildcard_subtype() || self.sub == other.sub
    }

    /// One-directional compatibility: true when this range covers `other`.
    ///
    /// `text/*` includes `text/plain` but `text/plain` does not include
    /// `text/*`. Used to apply `q=0` denials from an `Accept` header.
    #[must_use]
    pub fn includes(&self, other: &MediaType) -> bool {
        if self.is_wildcard_type() {
            return true;
        }
        if self.main != other.main {
            return false;
        }
        self.is_wildcard_subtype() || self.sub == other.sub
    }

    /// Specificity rank: concrete `2`, `type/*` `1`, `*/*` `0`.
    #[must_use]
    pub fn specificity(&self) -> u8 {
        if self.is_wildcard_type() {
            0
        } else if self.is_wildcard_subtype() {
            1
        } else {
            2
        }
    }

    /// Total order on specificity; more parameters rank higher among equal
    /// wildcard levels. `Greater` means `self` is more specific.
    #[must_use]
    pub fn compare_specificity(&self, other: &MediaType) -> Ordering {
        self.specificity()
            .cmp(&other.specificity())
            .then_with(|| self.params.len().cmp(&other.params.len()))
    }

    /// The more specific of two compatible types, preferring `self` on ties.
    #[must_use]
    pub fn most_specific<'a>(&'a self, other: &'a MediaType) -> &'a MediaType {
        if other.compare_specificity(self) == Ordering::Greater {
            other
        } else {
            self
        }
    }
}

fn is_token(value: &str) -> bool {
    !value.is_empty()
        && value.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#' | b'$' | b'&' | b'^' | b'_' | b'.' | b'+' | b'-' | b'*' | b'\''
                )
        })
}

impl Display for MediaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.main, self.sub)?;
        for (k, v) in &self.params {
            write!(f, ";{k}={v}")?;
        }
        Ok(())
    }
}

impl FromStr for MediaType {
    type Err = MediaTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MediaType::parse(s)
    }
}

impl Serialize for MediaType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}
