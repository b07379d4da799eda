#![allow(clippy::unwrap_used, clippy::expect_used)]

use jaxrouter::uri_template::{TemplateError, UriTemplate, UriTemplateMatcher};
use std::sync::Arc;

#[test]
fn test_specificity_ordering() {
    let mut templates: Vec<UriTemplate> = [
        "/{a}/{b}",
        "/users",
        "/users/{id}",
        "/users/me",
        "/users/{id: [0-9]+}",
    ]
    .iter()
    .map(|t| UriTemplate::compile(t).unwrap())
    .collect();
    templates.sort_by(|a, b| b.compare(a));

    let order: Vec<&str> = templates.iter().map(UriTemplate::as_str).collect();
    assert_eq!(
        order,
        vec![
            "users/me",
            "users/{id: [0-9]+}",
            "users/{id}",
            "users",
            "{a}/{b}"
        ]
    );
}

#[test]
fn test_head_tail_and_variables() {
    let t = UriTemplate::compile("/shops/{shop}/items/{item}").unwrap();
    let m = t.match_path("/shops/north/items/42/reviews/1").unwrap();
    assert_eq!(m.head(), "shops/north/items/42");
    assert_eq!(m.tail(), "/reviews/1");
    assert_eq!(m.variable("shop"), Some("north"));
    assert_eq!(m.variable("item"), Some("42"));
    assert!(!m.is_exact());

    let exact = t.match_path("shops/north/items/42/").unwrap();
    assert!(exact.is_exact());
    assert!(t.match_path("/shops/north").is_none());
}

#[test]
fn test_literal_must_end_on_segment_boundary() {
    let t = UriTemplate::compile("/item").unwrap();
    assert!(t.match_path("/item/1").is_some());
    assert!(t.match_path("/items").is_none());
}

#[test]
fn test_regex_variable_may_span_segments() {
    let t = UriTemplate::compile("/files/{path: .+}").unwrap();
    let m = t.match_path("/files/docs/2024/report.pdf").unwrap();
    assert_eq!(m.variable("path"), Some("docs/2024/report.pdf"));
    assert!(m.is_exact());
}

#[test]
fn test_captured_values_stay_encoded() {
    let t = UriTemplate::compile("/users/{id}/posts/{slug}").unwrap();
    let path = t.expand(&[("id", "7"), ("slug", "hello world")]).unwrap();
    assert_eq!(path, "/users/7/posts/hello%20world");
    let m = t.match_path(&path).unwrap();
    assert_eq!(m.variable("slug"), Some("hello%20world"));
}

#[test]
fn test_expand_requires_every_variable() {
    let t = UriTemplate::compile("/users/{id}").unwrap();
    assert!(matches!(
        t.expand(&[]),
        Err(TemplateError::MissingValue(name)) if name == "id"
    ));
}

#[test]
fn test_repeated_variable_last_capture_wins() {
    let t = UriTemplate::compile("/{x}/and/{x}").unwrap();
    let m = t.match_path("/first/and/second").unwrap();
    assert_eq!(m.variable("x"), Some("second"));
    assert_eq!(m.variables().len(), 2);
}

#[test]
fn test_equal_templates_compile_identically() {
    let a = UriTemplate::compile("/a/{id}/").unwrap();
    let b = UriTemplate::compile("a/{other}").unwrap();
    assert!(a.same_pattern(&b));
    assert_eq!(a, b);
    assert_eq!(a.compare(&b), std::cmp::Ordering::Equal);
}

#[test]
fn test_syntax_errors() {
    assert!(matches!(
        UriTemplate::compile("/a/{id"),
        Err(TemplateError::UnclosedVariable { .. })
    ));
    assert!(matches!(
        UriTemplate::compile("/a/id}"),
        Err(TemplateError::UnexpectedBrace { .. })
    ));
    assert!(matches!(
        UriTemplate::compile("/a/{ }"),
        Err(TemplateError::InvalidVariableName { .. })
    ));
    assert!(matches!(
        UriTemplate::compile("/a/{id:  }"),
        Err(TemplateError::EmptyRegex { .. })
    ));
    assert!(matches!(
        UriTemplate::compile("/a/{id: [0-9}"),
        Err(TemplateError::InvalidRegex { .. })
    ));
}

#[test]
fn test_matcher_tracks_last_match() {
    let mut matcher = UriTemplateMatcher::new(Arc::new(UriTemplate::compile("/orders/{id}").unwrap()));
    assert!(matcher.matches("/orders/9/lines"));
    assert_eq!(matcher.head(), Some("orders/9"));
    assert_eq!(matcher.tail(), Some("/lines"));
    assert!(!matcher.is_exact_match());

    assert!(!matcher.matches("/invoices/9"));
    assert!(matcher.variables().is_empty());
    assert!(matcher.last_match().is_none());

    assert!(matcher.matches("/orders/10"));
    assert!(matcher.is_exact_match());
    assert_eq!(matcher.into_match().unwrap().variable("id"), Some("10"));
}
