#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::harness::{dispatcher_with, get};
use http::StatusCode;
use jaxrouter::binding::RuntimeContext;
use jaxrouter::error::ResourceError;
use jaxrouter::lifecycle::ObjectFactory;
use jaxrouter::metadata::{
    ConstructorDecl, Instance, MethodDecl, Outcome, ParamDecl, ParamType, Resource, ResourceClass,
    Scope,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static PER_REQUEST_CREATED: AtomicUsize = AtomicUsize::new(0);
static PER_REQUEST_RELEASED: AtomicUsize = AtomicUsize::new(0);

/// Prototype resource that counts its own construction and release.
struct PerRequest {
    serial: usize,
}

impl Resource for PerRequest {
    fn describe() -> ResourceClass {
        ResourceClass::new::<PerRequest>()
            .path("/per-request")
            .constructor(ConstructorDecl::new(|_| {
                let serial = PER_REQUEST_CREATED.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(PerRequest { serial })
            }))
            .on_release(|_: &PerRequest| {
                PER_REQUEST_RELEASED.fetch_add(1, Ordering::SeqCst);
            })
            .method(
                MethodDecl::get("serial")
                    .produces(&["text/plain"])
                    .handler(|r: &PerRequest, _| Ok(Outcome::entity(r.serial.to_string()))),
            )
            .method(
                MethodDecl::get("fail")
                    .path("fail")
                    .handler(|_: &PerRequest, _| Err(ResourceError::msg("boom"))),
            )
    }
}

#[test]
fn test_prototype_is_created_and_released_per_request() {
    let dispatcher = dispatcher_with(|r| {
        r.add_resource::<PerRequest>().unwrap();
    });

    let first = get(&dispatcher, "/per-request");
    let second = get(&dispatcher, "/per-request");
    assert_eq!(first.status, StatusCode::OK);
    assert_ne!(first.body_str(), second.body_str());
    assert_eq!(
        get(&dispatcher, "/per-request/fail").status,
        StatusCode::INTERNAL_SERVER_ERROR
    );

    assert_eq!(PER_REQUEST_CREATED.load(Ordering::SeqCst), 3);
    // Failed invocations still release their instance.
    assert_eq!(PER_REQUEST_RELEASED.load(Ordering::SeqCst), 3);
}

static VISITS: AtomicUsize = AtomicUsize::new(0);

struct Visits;

impl Resource for Visits {
    fn describe() -> ResourceClass {
        ResourceClass::new::<Visits>().path("/visits").method(
            MethodDecl::get("count")
                .produces(&["text/plain"])
                .handler(|_: &Visits, _| {
                    let n = VISITS.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok(Outcome::entity(n.to_string()))
                }),
        )
    }
}

#[test]
fn test_registered_instance_is_singleton_without_constructor() {
    let dispatcher = dispatcher_with(|r| {
        let record = r.add_resource_instance(Visits, None).unwrap();
        assert_eq!(record.scope(), Scope::Singleton);
    });
    assert_eq!(get(&dispatcher, "/visits").body_str(), Some("1"));
    assert_eq!(get(&dispatcher, "/visits").body_str(), Some("2"));
}

static LAZY_BUILT: AtomicUsize = AtomicUsize::new(0);

struct Lazy {
    label: String,
}

impl Resource for Lazy {
    fn describe() -> ResourceClass {
        ResourceClass::new::<Lazy>()
            .path("/lazy")
            .scope(Scope::Singleton)
            .constructor(ConstructorDecl::new(|_| {
                LAZY_BUILT.fetch_add(1, Ordering::SeqCst);
                Ok(Lazy {
                    label: "lazy".to_string(),
                })
            }))
            .method(
                MethodDecl::get("label")
                    .produces(&["text/plain"])
                    .handler(|l: &Lazy, _| Ok(Outcome::entity(l.label.clone()))),
            )
    }
}

#[test]
fn test_lazy_singleton_is_built_on_first_request_only() {
    let dispatcher = dispatcher_with(|r| {
        let record = r.add_resource::<Lazy>().unwrap();
        assert_eq!(record.scope(), Scope::Singleton);
    });
    assert_eq!(LAZY_BUILT.load(Ordering::SeqCst), 0);
    for _ in 0..3 {
        assert_eq!(get(&dispatcher, "/lazy").body_str(), Some("lazy"));
    }
    assert_eq!(LAZY_BUILT.load(Ordering::SeqCst), 1);
}

/// Prototype whose constructor binds request values.
struct Page {
    size: i32,
    owner: i64,
}

impl Resource for Page {
    fn describe() -> ResourceClass {
        ResourceClass::new::<Page>()
            .path("/owners/{owner}/page")
            .constructor(
                ConstructorDecl::new(|args| {
                    Ok(Page {
                        size: args.i32(0).unwrap_or_default(),
                        owner: args.i64(1).unwrap_or_default(),
                    })
                })
                .param(ParamDecl::query("size", ParamType::I32).default_value("10"))
                .param(ParamDecl::path("owner", ParamType::I64)),
            )
            .method(
                MethodDecl::get("describe")
                    .produces(&["text/plain"])
                    .handler(|p: &Page, _| {
                        Ok(Outcome::entity(format!("owner {} size {}", p.owner, p.size)))
                    }),
            )
    }
}

#[test]
fn test_constructor_parameters_bind_from_request() {
    let dispatcher = dispatcher_with(|r| {
        r.add_resource::<Page>().unwrap();
    });
    assert_eq!(
        get(&dispatcher, "/owners/3/page?size=25").body_str(),
        Some("owner 3 size 25")
    );
    assert_eq!(
        get(&dispatcher, "/owners/4/page").body_str(),
        Some("owner 4 size 10")
    );
    assert_eq!(
        get(&dispatcher, "/owners/x/page").status,
        StatusCode::BAD_REQUEST
    );
}

#[derive(Default)]
struct Counts {
    gets: AtomicUsize,
    releases: AtomicUsize,
}

/// Factory that builds a fresh instance per call and counts the calls.
struct CountingFactory(Arc<Counts>);

struct Pooled;

impl ObjectFactory for CountingFactory {
    fn get_instance(&self, _ctx: &RuntimeContext) -> Result<Instance, ResourceError> {
        self.0.gets.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(Pooled))
    }

    fn release_instance(&self, _instance: Instance, _ctx: &RuntimeContext) {
        self.0.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn scope(&self) -> Scope {
        Scope::Prototype
    }
}

#[test]
fn test_custom_factory_pairs_get_and_release() {
    let counts = Arc::new(Counts::default());
    let factory: Arc<dyn ObjectFactory> = Arc::new(CountingFactory(Arc::clone(&counts)));
    let dispatcher = dispatcher_with(|r| {
        r.add_resource_with_factory(
            ResourceClass::new::<Pooled>().path("/pooled").method(
                MethodDecl::get("get").handler(|_: &Pooled, _| Ok(Outcome::Empty)),
            ),
            factory,
            None,
        )
        .unwrap();
    });

    for _ in 0..2 {
        assert_eq!(get(&dispatcher, "/pooled").status, StatusCode::NO_CONTENT);
    }
    assert_eq!(counts.gets.load(Ordering::SeqCst), 2);
    assert_eq!(counts.releases.load(Ordering::SeqCst), 2);
}
