#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::harness::{dispatcher_with, get, get_accept};
use http::{HeaderMap, Method, StatusCode};
use jaxrouter::entity::{Entity, EntityType, Form};
use jaxrouter::error::{ProviderSelectionError, ResourceError};
use jaxrouter::media::MediaType;
use jaxrouter::metadata::{ContextKind, MethodDecl, Outcome, ParamDecl, Resource, ResourceClass};
use jaxrouter::providers::{
    JsonProvider, MessageBodyReader, MessageBodyWriter, ProviderRecord, ProvidersRegistry,
};
use jaxrouter::server::Request;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Note {
    text: String,
}

/// Writes a fixed tag so tests can tell writers apart.
struct TaggedWriter(&'static str);

impl MessageBodyWriter for TaggedWriter {
    fn is_writeable(&self, ty: EntityType, _: &[&'static str], _: &MediaType) -> bool {
        ty.is::<Note>()
    }

    fn write_to(
        &self,
        _: &Entity,
        _: &[&'static str],
        _: &MediaType,
        _: &mut HeaderMap,
        out: &mut dyn Write,
    ) -> Result<(), ResourceError> {
        out.write_all(self.0.as_bytes())?;
        Ok(())
    }
}

struct UpperReader;

impl MessageBodyReader for UpperReader {
    fn is_readable(&self, ty: EntityType, _: &[&'static str], _: &MediaType) -> bool {
        ty.is::<Note>()
    }

    fn read_from(
        &self,
        _: EntityType,
        _: &[&'static str],
        _: &MediaType,
        _: &HeaderMap,
        body: &mut dyn Read,
    ) -> Result<Entity, ResourceError> {
        let mut text = String::new();
        body.read_to_string(&mut text)?;
        Ok(Entity::new(Note {
            text: text.to_uppercase(),
        }))
    }
}

fn note() -> Entity {
    Entity::new(Note {
        text: "hi".to_string(),
    })
}

fn write(providers: &ProvidersRegistry, entity: &Entity, media_type: &str) -> Vec<u8> {
    providers
        .write_entity(entity, &[], &MediaType::parse(media_type).unwrap(), &mut HeaderMap::new())
        .unwrap()
}

#[test]
fn test_higher_priority_writer_wins() {
    let providers = ProvidersRegistry::new();
    providers.add_provider(
        ProviderRecord::writer(TaggedWriter("low"))
            .media_types(&["text/plain"])
            .priority(1.0),
    );
    providers.add_provider(
        ProviderRecord::writer(TaggedWriter("high"))
            .media_types(&["text/plain"])
            .priority(2.0),
    );
    assert_eq!(write(&providers, &note(), "text/plain"), b"high");
}

#[test]
fn test_equal_priority_keeps_registration_order() {
    let providers = ProvidersRegistry::new();
    providers.add_provider(ProviderRecord::writer(TaggedWriter("first")).media_types(&["text/plain"]));
    providers.add_provider(ProviderRecord::writer(TaggedWriter("second")).media_types(&["text/plain"]));
    assert_eq!(write(&providers, &note(), "text/plain"), b"first");
}

#[test]
fn test_specific_media_type_beats_priority() {
    let providers = ProvidersRegistry::new();
    providers.add_provider(ProviderRecord::writer(TaggedWriter("wildcard")).priority(9.0));
    providers.add_provider(
        ProviderRecord::writer(TaggedWriter("exact"))
            .media_types(&["text/plain"])
            .priority(0.1),
    );
    assert_eq!(write(&providers, &note(), "text/plain"), b"exact");
    assert_eq!(write(&providers, &note(), "text/html"), b"wildcard");
}

#[test]
fn test_user_provider_beats_builtin_for_same_type() {
    let providers = ProvidersRegistry::with_builtins(0.5, 0.1);
    let builtin = write(
        &providers,
        &Entity::new("plain".to_string()),
        "text/plain",
    );
    assert_eq!(builtin, b"plain");

    providers.add_provider(ProviderRecord::writer(TaggedWriter("user")).media_types(&["text/plain"]));
    assert_eq!(write(&providers, &note(), "text/plain"), b"user");
}

#[test]
fn test_missing_writer_is_selection_error() {
    let providers = ProvidersRegistry::new();
    let err = providers
        .write_entity(&note(), &[], &MediaType::application_json(), &mut HeaderMap::new())
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ProviderSelectionError>(),
        Some(ProviderSelectionError::NoWriter { .. })
    ));
}

#[test]
fn test_reader_selection() {
    let providers = ProvidersRegistry::with_builtins(0.5, 0.1);
    providers.add_provider(ProviderRecord::reader(UpperReader).media_types(&["text/plain"]));
    let entity = providers
        .read_entity(
            EntityType::of::<Note>(),
            &[],
            &MediaType::text_plain(),
            &HeaderMap::new(),
            &mut "quiet".as_bytes(),
        )
        .unwrap();
    assert_eq!(entity.downcast_ref::<Note>().unwrap().text, "QUIET");
}

#[test]
fn test_builtin_json_provider_for_serde_types() {
    let providers = ProvidersRegistry::with_builtins(0.5, 0.1);
    providers.add_provider(ProviderRecord::reader(JsonProvider::<Note>::new()));
    providers.add_provider(ProviderRecord::writer(JsonProvider::<Note>::new()));

    let entity = providers
        .read_entity(
            EntityType::of::<Note>(),
            &[],
            &MediaType::application_json(),
            &HeaderMap::new(),
            &mut r#"{"text":"x"}"#.as_bytes(),
        )
        .unwrap();
    assert_eq!(entity.downcast_ref::<Note>().unwrap().text, "x");
    assert_eq!(write(&providers, &entity, "application/json"), br#"{"text":"x"}"#);
}

#[test]
fn test_form_provider_reads_urlencoded() {
    let providers = ProvidersRegistry::with_builtins(0.5, 0.1);
    let entity = providers
        .read_entity(
            EntityType::of::<Form>(),
            &[],
            &MediaType::form_urlencoded(),
            &HeaderMap::new(),
            &mut "a=1&b=two+words&a=3".as_bytes(),
        )
        .unwrap();
    let form = entity.downcast_ref::<Form>().unwrap();
    assert_eq!(form.get_all("a"), vec!["1", "3"]);
    assert_eq!(form.get("b"), Some("two words"));
}

#[test]
fn test_bytes_provider_handles_any_media_type() {
    let providers = ProvidersRegistry::with_builtins(0.5, 0.1);
    let body = write(&providers, &Entity::new(vec![1u8, 2, 3]), "image/png");
    assert_eq!(body, vec![1, 2, 3]);
}

#[test]
fn test_context_resolver_lookup() {
    struct Settings(&'static str);
    let providers = ProvidersRegistry::new();
    providers.add_provider(ProviderRecord::context_resolver::<Settings, _>(
        |_: EntityType| Some(Arc::new(Settings("resolved")) as jaxrouter::metadata::Instance),
    ));
    let found = providers
        .get_context(EntityType::of::<Settings>(), &MediaType::wildcard())
        .unwrap();
    assert_eq!(found.downcast_ref::<Settings>().unwrap().0, "resolved");
    assert!(providers
        .get_context(EntityType::of::<String>(), &MediaType::wildcard())
        .is_none());
}

// Providers through dispatch

#[derive(Default)]
struct Notes;

impl Resource for Notes {
    fn describe() -> ResourceClass {
        ResourceClass::new::<Notes>()
            .path("/notes")
            .default_constructor::<Notes>()
            .method(MethodDecl::get("get").handler(|_: &Notes, _| {
                Ok(Outcome::entity(Note {
                    text: "n".to_string(),
                }))
            }))
            .method(
                MethodDecl::post("shout")
                    .path("shout")
                    .consumes(&["text/plain"])
                    .produces(&["application/json"])
                    .param(ParamDecl::entity::<Note>())
                    .param(ParamDecl::context(ContextKind::Providers))
                    .handler(|_: &Notes, mut args| {
                        let note: Note = args.take_entity(0).unwrap_or(Note {
                            text: String::new(),
                        });
                        assert!(args.providers(1).is_some());
                        Ok(Outcome::entity(serde_json::json!({ "text": note.text })))
                    }),
            )
    }
}

#[test]
fn test_dispatch_uses_priority_ordered_writer() {
    let dispatcher = dispatcher_with(|r| {
        r.add_resource::<Notes>().unwrap();
        r.add_provider(ProviderRecord::writer(TaggedWriter("one")).media_types(&["text/plain"]).priority(1.0))
            .unwrap();
        r.add_provider(ProviderRecord::writer(TaggedWriter("two")).media_types(&["text/plain"]).priority(2.0))
            .unwrap();
    });
    let response = get(&dispatcher, "/notes");
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body_str(), Some("two"));
    assert_eq!(response.header("content-type"), Some("text/plain"));
}

#[test]
fn test_dispatch_without_writer_is_internal_error() {
    let dispatcher = dispatcher_with(|r| {
        r.add_resource::<Notes>().unwrap();
    });
    assert_eq!(
        get_accept(&dispatcher, "/notes", "application/json").status,
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn test_dispatch_reads_entity_with_custom_reader() {
    let dispatcher = dispatcher_with(|r| {
        r.add_resource::<Notes>().unwrap();
        r.add_provider(ProviderRecord::reader(UpperReader).media_types(&["text/plain"]))
            .unwrap();
    });
    let response = dispatcher.dispatch(
        Request::new(Method::POST, "/notes/shout")
            .with_header("Content-Type", "text/plain")
            .with_body("hello"),
    );
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json().unwrap()["text"], "HELLO");
}
