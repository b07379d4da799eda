use super::matcher::{ParamVec, TemplateMatch};
use super::path;
use regex::Regex;
use std::cmp::Ordering;
use std::sync::Arc;
use thiserror::Error;

/// Pattern used for `{name}` variables without an explicit regex.
pub const DEFAULT_VARIABLE_PATTERN: &str = "[^/]+?";

/// Template syntax or regex failure.
#[derive(Debug, Clone, Error)]
pub enum TemplateError {
    #[error("template `{template}`: unclosed variable starting at byte {position}")]
    UnclosedVariable { template: String, position: usize },
    #[error("template `{template}`: unexpected `}}` at byte {position}")]
    UnexpectedBrace { template: String, position: usize },
    #[error("template `{template}`: invalid variable name `{name}`")]
    InvalidVariableName { template: String, name: String },
    #[error("template `{template}`: variable `{name}` declares an empty regex")]
    EmptyRegex { template: String, name: String },
    #[error("template `{template}` does not compile to a valid regex")]
    InvalidRegex {
        template: String,
        #[source]
        source: regex::Error,
    },
    #[error("no value supplied for template variable `{0}`")]
    MissingValue(String),
}

/// A `{name}` or `{name: regex}` declaration inside a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateVariable {
    name: Arc<str>,
    pattern: Option<String>,
    group: usize,
}

impl TemplateVariable {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The user regex, `None` for the default segment pattern.
    #[must_use]
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Variable(usize),
}

/// A compiled path template.
#[derive(Debug, Clone)]
pub struct UriTemplate {
    template: String,
    regex: Regex,
    variables: Vec<TemplateVariable>,
    segments: Vec<Segment>,
    literal_chars: usize,
    non_default_patterns: usize,
    tail_group: usize,
}

impl UriTemplate {
    /// Compile a template into an anchored `^(head)(/.*)?$` regex.
    pub fn compile(template: &str) -> Result<Self, TemplateError> {
        let normalized = path::normalize(template.trim());
        let parsed = parse_declarations(normalized)?;

        let mut pattern = String::from("^(");
        let mut variables = Vec::new();
        let mut literal_chars = 0;
        let mut non_default_patterns = 0;
        let mut next_group = 2;

        let last_literal = parsed
            .iter()
            .rposition(|d| matches!(d, Declaration::Literal(_)));
        let total = parsed.len();
        let mut segments = Vec::with_capacity(total);

        for (index, decl) in parsed.into_iter().enumerate() {
            match decl {
                Declaration::Literal(mut text) => {
                    if Some(index) == last_literal && index + 1 == total {
                        while text.ends_with('/') {
                            text.pop();
                        }
                        if text.is_empty() {
                            continue;
                        }
                    }
                    let encoded = path::encode_literal(&text);
                    literal_chars += encoded.chars().count();
                    pattern.push_str(&regex::escape(&encoded));
                    segments.push(Segment::Literal(encoded));
                }
                Declaration::Variable { name, pattern: user } => {
                    pattern.push('(');
                    match &user {
                        Some(p) => {
                            non_default_patterns += 1;
                            pattern.push_str(&non_capturing(p));
                        }
                        None => pattern.push_str(DEFAULT_VARIABLE_PATTERN),
                    }
                    pattern.push(')');
                    segments.push(Segment::Variable(variables.len()));
                    variables.push(TemplateVariable {
                        name: Arc::from(name),
                        pattern: user,
                        group: next_group,
                    });
                    next_group += 1;
                }
            }
        }

        pattern.push(')');
        if segments.is_empty() {
            pattern.push_str("(.*)?$");
        } else {
            pattern.push_str("(/.*)?$");
        }

        let regex = Regex::new(&pattern).map_err(|source| TemplateError::InvalidRegex {
            template: template.to_string(),
            source,
        })?;

        Ok(Self {
            template: normalized.to_string(),
            regex,
            variables,
            segments,
            literal_chars,
            non_default_patterns,
            tail_group: next_group,
        })
    }

    /// The normalized template text (no leading `/`).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// The compiled regex source.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    #[must_use]
    pub fn variables(&self) -> &[TemplateVariable] {
        &self.variables
    }

    #[must_use]
    pub fn literal_chars(&self) -> usize {
        self.literal_chars
    }

    #[must_use]
    pub fn non_default_patterns(&self) -> usize {
        self.non_default_patterns
    }

    /// True when the template consumes nothing (`""` or `"/"`).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Two templates are interchangeable when they compile to the same regex.
    #[must_use]
    pub fn same_pattern(&self, other: &UriTemplate) -> bool {
        self.regex.as_str() == other.regex.as_str()
    }

    /// Specificity order; `Greater` means `self` is more specific.
    #[must_use]
    pub fn compare(&self, other: &UriTemplate) -> Ordering {
        self.literal_chars
            .cmp(&other.literal_chars)
            .then_with(|| self.variables.len().cmp(&other.variables.len()))
            .then_with(|| self.non_default_patterns.cmp(&other.non_default_patterns))
    }

    /// Match `path` (leading `/` optional). Captured values stay encoded.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<TemplateMatch> {
        let path = path::normalize(path);
        let captures = self.regex.captures(path)?;
        let head = captures.get(1).map_or("", |m| m.as_str());
        let tail = captures.get(self.tail_group).map_or("", |m| m.as_str());

        let mut variables = ParamVec::new();
        for var in &self.variables {
            let value = captures.get(var.group).map_or("", |m| m.as_str());
            variables.push((Arc::clone(&var.name), value.to_string()));
        }

        Some(TemplateMatch::new(head.to_string(), tail.to_string(), variables))
    }

    /// Build a path (with leading `/`) by substituting percent-encoded values.
    pub fn expand(&self, values: &[(&str, &str)]) -> Result<String, TemplateError> {
        let mut out = String::from("/");
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(index) => {
                    let name = self.variables[*index].name();
                    let value = values
                        .iter()
                        .rev()
                        .find(|(k, _)| *k == name)
                        .map(|(_, v)| *v)
                        .ok_or_else(|| TemplateError::MissingValue(name.to_string()))?;
                    out.push_str(&urlencoding::encode(value));
                }
            }
        }
        Ok(out)
    }
}

impl PartialEq for UriTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.same_pattern(other)
    }
}

impl Eq for UriTemplate {}

enum Declaration {
    Literal(String),
    Variable {
        name: String,
        pattern: Option<String>,
    },
}

fn parse_declarations(template: &str) -> Result<Vec<Declaration>, TemplateError> {
    let mut out = Vec::new();
    let mut literal = String::new();
    let bytes = template.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' => {
                let start = i;
                let mut depth = 1;
                let mut j = i + 1;
                while j < bytes.len() && depth > 0 {
                    match bytes[j] {
                        b'\\' => j += 1,
                        b'{' => depth += 1,
                        b'}' => depth -= 1,
                        _ => {}
                    }
                    j += 1;
                }
                if depth != 0 {
                    return Err(TemplateError::UnclosedVariable {
                        template: template.to_string(),
                        position: start,
                    });
                }
                if !literal.is_empty() {
                    out.push(Declaration::Literal(std::mem::take(&mut literal)));
                }
                let body = &template[start + 1..j - 1];
                out.push(parse_variable(template, body)?);
                i = j;
            }
            b'}' => {
                return Err(TemplateError::UnexpectedBrace {
                    template: template.to_string(),
                    position: i,
                });
            }
            _ => {
                let ch_len = template[i..].chars().next().map_or(1, char::len_utf8);
                literal.push_str(&template[i..i + ch_len]);
                i += ch_len;
            }
        }
    }
    if !literal.is_empty() {
        out.push(Declaration::Literal(literal));
    }
    Ok(out)
}

fn parse_variable(template: &str, body: &str) -> Result<Declaration, TemplateError> {
    let (name, pattern) = match body.split_once(':') {
        Some((name, pattern)) => {
            let pattern = pattern.trim();
            if pattern.is_empty() {
                return Err(TemplateError::EmptyRegex {
                    template: template.to_string(),
                    name: name.trim().to_string(),
                });
            }
            (name.trim(), Some(pattern.to_string()))
        }
        None => (body.trim(), None),
    };
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if !valid {
        return Err(TemplateError::InvalidVariableName {
            template: template.to_string(),
            name: name.to_string(),
        });
    }
    Ok(Declaration::Variable {
        name: name.to_string(),
        pattern,
    })
}

/// Rewrite capturing groups in a user regex as non-capturing so the
/// template's own group numbering stays fixed.
fn non_capturing(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars().peekable();
    let mut in_class = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '[' if !in_class => {
                in_class = true;
                out.push(c);
            }
            ']' if in_class => {
                in_class = false;
                out.push(c);
            }
            '(' if !in_class => {
                out.push('(');
                if chars.peek() != Some(&'?') {
                    out.push_str("?:");
                }
            }
            _ => out.push(c),
        }
    }
    out
}
