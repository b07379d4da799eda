use super::core::UriTemplate;
use smallvec::SmallVec;
use std::sync::Arc;

/// Maximum number of captured variables before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated `(name, value)` storage for captured path variables.
///
/// Names are `Arc<str>` shared with the compiled template; values are
/// per-request data.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// The result of matching one template against one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateMatch {
    head: String,
    tail: String,
    variables: ParamVec,
}

impl TemplateMatch {
    pub(crate) fn new(head: String, tail: String, variables: ParamVec) -> Self {
        Self {
            head,
            tail,
            variables,
        }
    }

    /// A match that consumed nothing, leaving `tail` for the next level.
    #[must_use]
    pub fn unconsumed(tail: &str) -> Self {
        Self::new(String::new(), tail.to_string(), ParamVec::new())
    }

    /// The consumed part of the path.
    #[must_use]
    pub fn head(&self) -> &str {
        &self.head
    }

    /// The unmatched remainder, starting with `/` unless empty.
    #[must_use]
    pub fn tail(&self) -> &str {
        &self.tail
    }

    #[must_use]
    pub fn variables(&self) -> &ParamVec {
        &self.variables
    }

    /// Value of a captured variable; the last capture wins when a name
    /// repeats.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Nothing meaningful left: the remainder is empty or a lone `/`.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        self.tail.is_empty() || self.tail == "/"
    }
}

/// Stateful matcher bound to one template.
///
/// Holds the state of the last successful [`matches`](Self::matches) call;
/// a failed call clears it so no partial captures survive.
#[derive(Debug, Clone)]
pub struct UriTemplateMatcher {
    template: Arc<UriTemplate>,
    state: Option<TemplateMatch>,
}

impl UriTemplateMatcher {
    #[must_use]
    pub fn new(template: Arc<UriTemplate>) -> Self {
        Self {
            template,
            state: None,
        }
    }

    #[must_use]
    pub fn template(&self) -> &UriTemplate {
        &self.template
    }

    pub fn matches(&mut self, path: &str) -> bool {
        self.state = self.template.match_path(path);
        self.state.is_some()
    }

    #[must_use]
    pub fn head(&self) -> Option<&str> {
        self.state.as_ref().map(TemplateMatch::head)
    }

    #[must_use]
    pub fn tail(&self) -> Option<&str> {
        self.state.as_ref().map(TemplateMatch::tail)
    }

    /// Captured variables of the last match; empty when there is none.
    #[must_use]
    pub fn variables(&self) -> &[(Arc<str>, String)] {
        self.state
            .as_ref()
            .map_or(&[][..], |m| m.variables().as_slice())
    }

    #[must_use]
    pub fn is_exact_match(&self) -> bool {
        self.state.as_ref().is_some_and(TemplateMatch::is_exact)
    }

    #[must_use]
    pub fn last_match(&self) -> Option<&TemplateMatch> {
        self.state.as_ref()
    }

    /// Consume the matcher, keeping the last match.
    #[must_use]
    pub fn into_match(self) -> Option<TemplateMatch> {
        self.state
    }
}
