//! Shared fixtures for the integration tests.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

pub mod fixtures {
    use http::{Method, StatusCode};
    use jaxrouter::error::ResourceError;
    use jaxrouter::metadata::{MethodDecl, Outcome, ParamDecl, ParamType, Resource, ResourceClass};
    use jaxrouter::server::Response;
    use serde_json::{json, Value};
    use thiserror::Error;

    /// A stored item was not found.
    #[derive(Debug, Error)]
    #[error("item {0} not found")]
    pub struct MissingItem(pub i64);

    /// `/items` collection with sub-resource methods.
    #[derive(Default)]
    pub struct Items;

    impl Resource for Items {
        fn describe() -> ResourceClass {
            ResourceClass::new::<Items>()
                .path("/items")
                .default_constructor::<Items>()
                .method(
                    MethodDecl::get("list")
                        .produces(&["application/json"])
                        .param(ParamDecl::query("limit", ParamType::I32).default_value("2"))
                        .handler(|_: &Items, args| {
                            let limit = args.i32(0).unwrap_or(0);
                            let ids: Vec<i32> = (1..=limit).collect();
                            Ok(Outcome::entity(json!(ids)))
                        }),
                )
                .method(
                    MethodDecl::post("create")
                        .consumes(&["application/json"])
                        .produces(&["application/json"])
                        .param(ParamDecl::entity::<Value>())
                        .handler(|_: &Items, mut args| {
                            let body: Value = args.take_entity(0).unwrap_or_default();
                            Ok(Outcome::response(
                                Response::new(StatusCode::CREATED)
                                    .with_header("Location", "/items/7")
                                    .with_entity(body),
                            ))
                        }),
                )
                .method(
                    MethodDecl::get("find")
                        .path("{id: [0-9]+}")
                        .produces(&["application/json"])
                        .param(ParamDecl::path("id", ParamType::I64))
                        .handler(|_: &Items, args| {
                            let id = args.i64(0).unwrap_or_default();
                            if id == 404 {
                                return Err(ResourceError::new(MissingItem(id)));
                            }
                            Ok(Outcome::entity(json!({ "id": id })))
                        }),
                )
                .method(
                    MethodDecl::delete("remove")
                        .path("{id: [0-9]+}")
                        .handler(|_: &Items, _| Ok(Outcome::Empty)),
                )
                .method(
                    MethodDecl::get("special")
                        .path("special")
                        .produces(&["text/plain"])
                        .handler(|_: &Items, _| Ok(Outcome::entity("special".to_string()))),
                )
        }
    }

    /// `/greeting` offering the same verb as JSON and as plain text.
    #[derive(Default)]
    pub struct Greeting;

    impl Resource for Greeting {
        fn describe() -> ResourceClass {
            ResourceClass::new::<Greeting>()
                .path("/greeting")
                .default_constructor::<Greeting>()
                .method(
                    MethodDecl::get("as_json")
                        .produces(&["application/json"])
                        .handler(|_: &Greeting, _| Ok(Outcome::entity(json!({"greeting": "hello"})))),
                )
                .method(
                    MethodDecl::get("as_text")
                        .produces(&["text/plain"])
                        .handler(|_: &Greeting, _| Ok(Outcome::entity("hello".to_string()))),
                )
        }
    }

    /// `/echo` returns the posted JSON document.
    #[derive(Default)]
    pub struct Echo;

    impl Resource for Echo {
        fn describe() -> ResourceClass {
            ResourceClass::new::<Echo>()
                .path("/echo")
                .default_constructor::<Echo>()
                .method(
                    MethodDecl::verb(Method::POST, "echo")
                        .consumes(&["application/json"])
                        .produces(&["application/json"])
                        .param(ParamDecl::entity::<Value>())
                        .handler(|_: &Echo, mut args| {
                            let body: Value = args.take_entity(0).unwrap_or_default();
                            Ok(Outcome::entity(body))
                        }),
                )
        }
    }
}

pub mod harness {
    use jaxrouter::dispatcher::Dispatcher;
    use jaxrouter::registry::Registry;
    use jaxrouter::runtime_config::RuntimeConfig;
    use jaxrouter::server::{Request, ServerResponse};
    use std::sync::{Arc, Once};

    static TRACING: Once = Once::new();

    /// Route test logs through the test writer when `RUST_LOG` is set.
    pub fn init_tracing() {
        TRACING.call_once(|| {
            if std::env::var_os("RUST_LOG").is_some() {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                    .with_test_writer()
                    .try_init();
            }
        });
    }

    /// A dispatcher over a registry prepared by `setup`.
    pub fn dispatcher_with<F>(setup: F) -> Dispatcher
    where
        F: FnOnce(&Registry),
    {
        dispatcher_with_config(RuntimeConfig::default(), setup)
    }

    pub fn dispatcher_with_config<F>(config: RuntimeConfig, setup: F) -> Dispatcher
    where
        F: FnOnce(&Registry),
    {
        init_tracing();
        let registry = Registry::new(config);
        setup(&registry);
        Dispatcher::new(Arc::new(registry))
    }

    pub fn get(dispatcher: &Dispatcher, uri: &str) -> ServerResponse {
        dispatcher.dispatch(Request::get(uri))
    }

    pub fn get_accept(dispatcher: &Dispatcher, uri: &str, accept: &str) -> ServerResponse {
        dispatcher.dispatch(Request::get(uri).with_header("Accept", accept))
    }
}

pub mod may_runtime {
    use std::sync::Once;

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }
}
