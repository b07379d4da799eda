use criterion::{criterion_group, criterion_main, Criterion};
use jaxrouter::metadata::{MethodDecl, Outcome, ParamDecl, ParamType, Resource, ResourceClass};
use jaxrouter::server::Request;
use jaxrouter::uri_template::UriTemplate;
use jaxrouter::{Dispatcher, Registry, RuntimeConfig};
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;

const TEMPLATES: &[&str] = &[
    "/zoo/animals",
    "/zoo/animals/{id}",
    "/zoo/animals/{id}/toys/{toy_id}",
    "/zoo/{category}/animals/{id}/habitats/{habitat_id}/sections/{section_id}",
    "/inventory/{warehouse_id}/feeds/{feed_id}/items/{item_id: [0-9]+}",
    "/complex/{a}/{b}/{c}/{d}/{e}/{f}/{g}/{h}/{i}",
];

#[derive(Default)]
struct Animals;

impl Resource for Animals {
    fn describe() -> ResourceClass {
        ResourceClass::new::<Animals>()
            .path("/zoo/animals")
            .default_constructor::<Animals>()
            .method(
                MethodDecl::get("list")
                    .produces(&["application/json"])
                    .handler(|_: &Animals, _| Ok(Outcome::entity(json!([1, 2, 3])))),
            )
            .method(
                MethodDecl::get("toy")
                    .path("{id}/toys/{toy_id}")
                    .produces(&["application/json", "text/plain"])
                    .param(ParamDecl::path("id", ParamType::I64))
                    .param(ParamDecl::path("toy_id", ParamType::String))
                    .handler(|_: &Animals, args| {
                        Ok(Outcome::entity(json!({
                            "animal": args.i64(0),
                            "toy": args.str(1),
                        })))
                    }),
            )
    }
}

fn bench_template_match(c: &mut Criterion) {
    let templates: Vec<UriTemplate> = TEMPLATES
        .iter()
        .map(|t| UriTemplate::compile(t).expect("template"))
        .collect();
    let paths = [
        "/zoo/animals/123",
        "/zoo/animals/123/toys/456",
        "/zoo/cats/animals/123/habitats/88/sections/5",
        "/inventory/1/feeds/2/items/3",
        "/complex/1/2/3/4/5/6/7/8/9",
    ];
    c.bench_function("template_match", |b| {
        b.iter(|| {
            for path in &paths {
                let found = templates.iter().find_map(|t| t.match_path(path));
                black_box(&found);
            }
        })
    });
}

fn bench_dispatch(c: &mut Criterion) {
    let registry = Registry::new(RuntimeConfig::default());
    registry.add_resource::<Animals>().expect("register");
    let dispatcher = Dispatcher::new(Arc::new(registry));

    c.bench_function("dispatch_sub_resource_method", |b| {
        b.iter(|| {
            let request = Request::get("/zoo/animals/7/toys/ball")
                .with_header("Accept", "text/plain;q=0.5, application/json");
            black_box(dispatcher.dispatch(request))
        })
    });
}

criterion_group!(benches, bench_template_match, bench_dispatch);
criterion_main!(benches);
