#![allow(clippy::unwrap_used, clippy::expect_used)]

use jaxrouter::media::{AcceptHeader, MediaType, MediaTypeError};
use jaxrouter::server::Request;

fn mt(value: &str) -> MediaType {
    MediaType::parse(value).unwrap()
}

#[test]
fn test_parse_normalizes_case_and_keeps_parameters() {
    let parsed = mt(" Application/JSON ; Charset=\"UTF-8\" ; version=2");
    assert_eq!(parsed.essence(), "application/json");
    assert_eq!(parsed.parameter("charset"), Some("UTF-8"));
    assert_eq!(parsed.parameter("VERSION"), Some("2"));
    assert_eq!(parsed.to_string(), "application/json;charset=UTF-8;version=2");
}

#[test]
fn test_parse_errors() {
    assert_eq!(MediaType::parse("  "), Err(MediaTypeError::Empty));
    assert!(matches!(
        MediaType::parse("text"),
        Err(MediaTypeError::MissingSubtype(_))
    ));
    assert!(matches!(
        MediaType::parse("*/json"),
        Err(MediaTypeError::InvalidToken(_))
    ));
    assert!(matches!(
        MediaType::parse("text/plain;charset"),
        Err(MediaTypeError::MalformedParameter { .. })
    ));
    assert_eq!(mt("*"), MediaType::wildcard());
}

#[test]
fn test_compatibility_is_symmetric_but_inclusion_is_not() {
    let any_text = mt("text/*");
    let plain = MediaType::text_plain();
    assert!(any_text.is_compatible(&plain));
    assert!(plain.is_compatible(&any_text));
    assert!(any_text.includes(&plain));
    assert!(!plain.includes(&any_text));
    assert!(!plain.is_compatible(&MediaType::application_json()));
    assert!(MediaType::wildcard().is_compatible(&MediaType::application_json()));
}

#[test]
fn test_specificity_ranks() {
    assert_eq!(MediaType::wildcard().specificity(), 0);
    assert_eq!(mt("text/*").specificity(), 1);
    assert_eq!(mt("text/html").specificity(), 2);
    assert_eq!(
        mt("text/html;level=1").compare_specificity(&mt("text/html")),
        std::cmp::Ordering::Greater
    );
}

#[test]
fn test_accept_from_several_header_values() {
    let request = Request::get("/")
        .with_header("Accept", "text/plain;q=0.5")
        .with_header("Accept", "application/json");
    let accept = request.accept();
    let types: Vec<String> = accept.media_types().iter().map(ToString::to_string).collect();
    assert_eq!(types, vec!["application/json", "text/plain"]);
}

#[test]
fn test_best_match_prefers_quality_over_declaration_order() {
    let accept = AcceptHeader::parse("text/plain;q=0.4, application/json;q=0.8");
    let best = accept
        .best_match(&[MediaType::text_plain(), MediaType::application_json()])
        .unwrap();
    assert_eq!(best.produced(), &MediaType::application_json());
    assert_eq!(best.quality(), 800);
}

#[test]
fn test_wildcard_produce_resolves_to_accepted_type() {
    let accept = AcceptHeader::parse("text/csv");
    let best = accept.best_match(&[mt("text/*")]).unwrap();
    assert_eq!(best.resolved(), mt("text/csv"));
    assert!(accept.best_match(&[MediaType::application_json()]).is_none());
}

#[test]
fn test_only_denials_accepts_nothing_else() {
    let accept = AcceptHeader::parse("application/xml;q=0");
    assert!(accept.acceptable().is_empty());
    assert!(accept.best_match(&[mt("application/xml")]).is_none());
    assert!(accept.best_match(&[MediaType::application_json()]).is_none());
}

#[test]
fn test_invalid_quality_entries_are_dropped() {
    let accept = AcceptHeader::parse("text/html;q=2, application/json");
    let types: Vec<String> = accept.media_types().iter().map(ToString::to_string).collect();
    assert_eq!(types, vec!["application/json"]);
}
