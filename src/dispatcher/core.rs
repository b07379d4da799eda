use super::selection::{select, Selection};
use crate::binding::{bind, BindFailure, RuntimeContext};
use crate::entity::EntityType;
use crate::error::{BindingError, HandlerPanic, LocatorDepthExceeded, ResourceError, WebApplicationError};
use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::lifecycle::ObjectFactory;
use crate::media::{MediaType, NegotiatedMatch};
use crate::metadata::{Instance, MethodKind, MethodMetadata, Outcome};
use crate::registry::{Registry, ResourceInstance};
use crate::runtime_config::RuntimeConfig;
use crate::server::{Request, Response, ServerResponse};
use crate::uri_template::TemplateMatch;
use http::header::{HeaderValue, ALLOW, CONTENT_LENGTH, CONTENT_TYPE};
use http::{Method, StatusCode};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// A resource method chosen for a request.
#[derive(Debug)]
pub struct MatchedMethod {
    pub resource: ResourceInstance,
    pub method: Arc<MethodMetadata>,
    pub negotiated: Option<NegotiatedMatch>,
}

/// Outcome of matching a request against the registry.
///
/// Routing failures are ordinary values, not errors.
#[derive(Debug)]
pub enum MatchResult {
    Matched(MatchedMethod),
    NotFound,
    MethodNotAllowed { allow: Vec<Method> },
    NotAcceptable,
    UnsupportedMediaType,
    /// Built-in `OPTIONS` answer for a path without an `OPTIONS` method
    Options { allow: Vec<Method> },
    /// A locator, constructor or the locator depth limit failed
    Failed(ResourceError),
}

impl MatchResult {
    /// Status sent for this result when nothing else decides it.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            MatchResult::Matched(_) | MatchResult::Options { .. } => StatusCode::OK,
            MatchResult::NotFound => StatusCode::NOT_FOUND,
            MatchResult::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            MatchResult::NotAcceptable => StatusCode::NOT_ACCEPTABLE,
            MatchResult::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            MatchResult::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn from_selection(resource: ResourceInstance, selection: Selection) -> Self {
        match selection {
            Selection::Selected { method, negotiated } => MatchResult::Matched(MatchedMethod {
                resource,
                method,
                negotiated,
            }),
            Selection::Options { allow } => MatchResult::Options { allow },
            Selection::MethodNotAllowed { allow } => MatchResult::MethodNotAllowed { allow },
            Selection::UnsupportedMediaType => MatchResult::UnsupportedMediaType,
            Selection::NotAcceptable => MatchResult::NotAcceptable,
        }
    }
}

/// Instances obtained from factories during one request, released in
/// reverse order when it completes.
struct Exchange<'a> {
    ctx: &'a RuntimeContext,
    acquired: Vec<(Arc<dyn ObjectFactory>, Instance)>,
}

impl<'a> Exchange<'a> {
    fn new(ctx: &'a RuntimeContext) -> Self {
        Self {
            ctx,
            acquired: Vec::new(),
        }
    }

    fn instance_for(&mut self, resource: &mut ResourceInstance) -> Result<Instance, ResourceError> {
        if let Some(instance) = resource.instance() {
            return Ok(Arc::clone(instance));
        }
        let Some(record) = resource.record() else {
            return Err(ResourceError::msg(format!(
                "no instance available for `{}`",
                resource.metadata().name()
            )));
        };
        let factory = Arc::clone(record.factory());
        let instance = factory.get_instance(self.ctx)?;
        self.acquired.push((factory, Arc::clone(&instance)));
        resource.set_instance(Arc::clone(&instance));
        Ok(instance)
    }

    fn release(self) {
        for (factory, instance) in self.acquired.into_iter().rev() {
            factory.release_instance(instance, self.ctx);
        }
    }
}

/// Matches requests against a [`Registry`] and runs the selected method.
///
/// Cheap to clone; every clone shares the registry.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    config: RuntimeConfig,
}

impl Dispatcher {
    /// A dispatcher using the registry's configuration.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        let config = registry.config().clone();
        Self { registry, config }
    }

    #[must_use]
    pub fn with_config(registry: Arc<Registry>, config: RuntimeConfig) -> Self {
        Self { registry, config }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Process one request to completion.
    pub fn dispatch(&self, request: Request) -> ServerResponse {
        let start = Instant::now();
        let request_id = RequestId::from_header_or_new(request.header(REQUEST_ID_HEADER));
        let method = request.method().clone();
        let path = request.path().to_string();

        // D1: request accepted
        debug!(request_id = %request_id, method = %method, path = %path, "Dispatch start");

        let response = match RuntimeContext::from_request(
            request,
            request_id,
            Arc::clone(self.registry.providers()),
        ) {
            Ok(ctx) => {
                let mut exchange = Exchange::new(&ctx);
                let result = self.match_request(&mut exchange);
                let response = self.respond(&mut exchange, result);
                exchange.release();
                response
            }
            Err(error) => {
                debug!(request_id = %request_id, %error, "Malformed request");
                ServerResponse::new(StatusCode::BAD_REQUEST)
            }
        };

        let response = finish(response, request_id, method == Method::HEAD);

        // D9: request complete
        info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = response.status.as_u16(),
            duration_us = start.elapsed().as_micros() as u64,
            "Request dispatched"
        );
        response
    }

    /// Run matching only; the returned result still holds the resolved
    /// resource. Instances acquired while resolving locators are released
    /// before returning.
    pub fn resolve(&self, ctx: &RuntimeContext) -> MatchResult {
        let mut exchange = Exchange::new(ctx);
        let result = self.match_request(&mut exchange);
        exchange.release();
        result
    }

    fn match_request(&self, exchange: &mut Exchange<'_>) -> MatchResult {
        let ctx = exchange.ctx;
        let roots = self.registry.get_matching_root_resources(ctx.path());

        // D2: root match
        debug!(
            request_id = %ctx.request_id(),
            path = ctx.path(),
            candidates = roots.len(),
            "Root resources matched"
        );

        if !self.config.continued_search {
            return match roots.into_iter().next() {
                Some(root) => self.resolve_resource(exchange, root, 0),
                None => MatchResult::NotFound,
            };
        }

        let mut first_failure = None;
        for root in roots {
            let mark = ctx.mark();
            match self.resolve_resource(exchange, root, 0) {
                result @ (MatchResult::Matched(_) | MatchResult::Failed(_)) => return result,
                other => {
                    ctx.rewind(mark);
                    first_failure.get_or_insert(other);
                }
            }
        }
        first_failure.unwrap_or(MatchResult::NotFound)
    }

    fn resolve_resource(
        &self,
        exchange: &mut Exchange<'_>,
        mut resource: ResourceInstance,
        depth: usize,
    ) -> MatchResult {
        let ctx = exchange.ctx;
        ctx.push_match(resource.matched());

        if resource.matched().is_exact() && !resource.metadata().resource_methods().is_empty() {
            // D3: terminal resource
            let selection = select(resource.metadata().resource_methods(), ctx);
            return MatchResult::from_selection(resource, selection);
        }

        let tail = resource.matched().tail().to_string();
        let matching: Vec<(Arc<MethodMetadata>, TemplateMatch)> = resource
            .metadata()
            .sub_resources()
            .iter()
            .filter_map(|method| {
                let matched = method.template()?.match_path(&tail)?;
                let usable = method.kind() == MethodKind::SubResourceLocator || matched.is_exact();
                usable.then(|| (Arc::clone(method), matched))
            })
            .collect();

        if matching.is_empty() {
            debug!(
                request_id = %ctx.request_id(),
                resource = resource.metadata().name(),
                tail = %tail,
                "No sub-resource matches the remainder"
            );
            return MatchResult::NotFound;
        }

        let mut first_failure = None;
        let mut used = vec![false; matching.len()];
        for leader in 0..matching.len() {
            if used[leader] {
                continue;
            }
            let (first, _) = &matching[leader];
            let Some(template) = first.template() else {
                used[leader] = true;
                continue;
            };
            let kind = first.kind();
            // Same-kind entries on an equal template form one group even when
            // other templates of equal specificity sort between them.
            let mut group: Vec<&(Arc<MethodMetadata>, TemplateMatch)> = Vec::new();
            for (index, entry) in matching.iter().enumerate().skip(leader) {
                let (m, _) = entry;
                if !used[index]
                    && m.kind() == kind
                    && m.template().is_some_and(|t| t.same_pattern(template))
                {
                    used[index] = true;
                    group.push(entry);
                }
            }

            let mark = ctx.mark();
            let result = match kind {
                MethodKind::SubResourceMethod => {
                    // D4: sub-resource methods sharing one template
                    ctx.push_match(&group[0].1);
                    let methods: Vec<Arc<MethodMetadata>> =
                        group.iter().map(|(m, _)| Arc::clone(m)).collect();
                    let selection = select(&methods, ctx);
                    MatchResult::from_selection(resource.clone(), selection)
                }
                _ => {
                    // Ambiguous locators: the lexically last name wins.
                    let Some((locator, matched)) =
                        group.iter().max_by(|(a, _), (b, _)| a.name().cmp(b.name()))
                    else {
                        continue;
                    };
                    self.invoke_locator(exchange, &mut resource, locator, matched, depth)
                }
            };

            match result {
                MatchResult::Matched(_) | MatchResult::Failed(_) => return result,
                other if !self.config.continued_search => return other,
                other => {
                    ctx.rewind(mark);
                    first_failure.get_or_insert(other);
                }
            }
        }
        first_failure.unwrap_or(MatchResult::NotFound)
    }

    fn invoke_locator(
        &self,
        exchange: &mut Exchange<'_>,
        parent: &mut ResourceInstance,
        locator: &Arc<MethodMetadata>,
        matched: &TemplateMatch,
        depth: usize,
    ) -> MatchResult {
        let ctx = exchange.ctx;

        if depth >= self.config.max_locator_depth {
            error!(
                request_id = %ctx.request_id(),
                limit = self.config.max_locator_depth,
                locator = locator.name(),
                "Sub-resource locator depth exceeded"
            );
            return MatchResult::Failed(ResourceError::new(LocatorDepthExceeded {
                limit: self.config.max_locator_depth,
            }));
        }
        if matched.head().is_empty() && !matched.is_exact() {
            debug!(
                request_id = %ctx.request_id(),
                locator = locator.name(),
                tail = matched.tail(),
                "Locator consumes nothing of the remainder"
            );
            return MatchResult::NotFound;
        }

        ctx.push_match(matched);
        let instance = match exchange.instance_for(parent) {
            Ok(instance) => instance,
            Err(error) => return MatchResult::Failed(error),
        };
        let args = match bind(locator.parameters(), ctx) {
            Ok(args) => args,
            Err(BindFailure::Binding(error)) => return MatchResult::Failed(ResourceError::new(error)),
            Err(BindFailure::Resource(error)) => return MatchResult::Failed(error),
        };

        // D5: locator invocation
        debug!(
            request_id = %ctx.request_id(),
            resource = parent.metadata().name(),
            locator = locator.name(),
            depth,
            "Invoking sub-resource locator"
        );
        let located = match call(locator, &instance, args) {
            Ok(Outcome::Located(located)) => located,
            Ok(other) => {
                warn!(
                    request_id = %ctx.request_id(),
                    locator = locator.name(),
                    outcome = ?other,
                    "Locator returned no sub-resource"
                );
                return MatchResult::NotFound;
            }
            Err(error) => return MatchResult::Failed(error),
        };

        let type_name = located.type_name();
        let (instance, class) = located.into_parts();
        let metadata = match self.registry.sub_resource_metadata(&class) {
            Ok(metadata) => metadata,
            Err(error) => {
                error!(
                    request_id = %ctx.request_id(),
                    sub_resource = type_name,
                    %error,
                    "Invalid sub-resource"
                );
                return MatchResult::Failed(ResourceError::new(error));
            }
        };
        let next = ResourceInstance::located(
            metadata,
            instance,
            TemplateMatch::unconsumed(matched.tail()),
        );
        self.resolve_resource(exchange, next, depth + 1)
    }

    fn respond(&self, exchange: &mut Exchange<'_>, result: MatchResult) -> ServerResponse {
        let status = result.status();
        match result {
            MatchResult::Matched(matched) => self.invoke(exchange, matched),
            MatchResult::Options { allow } | MatchResult::MethodNotAllowed { allow } => {
                let mut response = ServerResponse::new(status);
                if let Ok(value) = HeaderValue::from_str(&join_methods(&allow)) {
                    response.headers.insert(ALLOW, value);
                }
                response
            }
            MatchResult::Failed(error) => self.map_error(exchange.ctx, error),
            MatchResult::NotFound | MatchResult::NotAcceptable | MatchResult::UnsupportedMediaType => {
                ServerResponse::new(status)
            }
        }
    }

    fn invoke(&self, exchange: &mut Exchange<'_>, matched: MatchedMethod) -> ServerResponse {
        let ctx = exchange.ctx;
        let MatchedMethod {
            mut resource,
            method,
            negotiated,
        } = matched;

        let instance = match exchange.instance_for(&mut resource) {
            Ok(instance) => instance,
            Err(error) => return self.map_error(ctx, error),
        };
        let args = match bind(method.parameters(), ctx) {
            Ok(args) => args,
            Err(BindFailure::Binding(error)) => {
                debug!(request_id = %ctx.request_id(), %error, "Parameter binding failed");
                return ServerResponse::new(StatusCode::BAD_REQUEST);
            }
            Err(BindFailure::Resource(error)) => return self.map_error(ctx, error),
        };

        // D6: resource method invocation
        debug!(
            request_id = %ctx.request_id(),
            resource = resource.metadata().name(),
            method = method.name(),
            "Invoking resource method"
        );

        let written = match call(&method, &instance, args) {
            Ok(Outcome::Empty) => Ok(ServerResponse::new(StatusCode::NO_CONTENT)),
            Ok(Outcome::Entity(entity)) => self.write_response(
                ctx,
                Response::ok().with_boxed_entity(entity),
                Some((method.as_ref(), negotiated.as_ref())),
            ),
            Ok(Outcome::Response(response)) => self.write_response(
                ctx,
                response,
                Some((method.as_ref(), negotiated.as_ref())),
            ),
            Ok(Outcome::Located(located)) => Err(ResourceError::msg(format!(
                "resource method `{}` returned sub-resource `{}`",
                method.name(),
                located.type_name()
            ))),
            Err(error) => Err(error),
        };
        written.unwrap_or_else(|error| self.map_error(ctx, error))
    }

    /// Serialize `response` with the negotiated or computed media type.
    fn write_response(
        &self,
        ctx: &RuntimeContext,
        response: Response,
        method: Option<(&MethodMetadata, Option<&NegotiatedMatch>)>,
    ) -> Result<ServerResponse, ResourceError> {
        let explicit = response.media_type();
        let (status, mut headers, entity) = response.into_parts();
        let Some(entity) = entity else {
            return Ok(ServerResponse {
                status,
                headers,
                body: Vec::new(),
            });
        };

        let media_type = match explicit {
            Some(media_type) => media_type,
            None => self.response_media_type(ctx, entity.entity_type(), method),
        };
        let annotations = method.map_or(&[][..], |(m, _)| m.annotations());
        let body = ctx
            .providers()
            .write_entity(&entity, annotations, &media_type, &mut headers)?;

        // D7: entity written
        debug!(
            request_id = %ctx.request_id(),
            entity = entity.entity_type().name(),
            media_type = %media_type,
            bytes = body.len(),
            "Response entity written"
        );

        if let Ok(value) = HeaderValue::from_str(&media_type.to_string()) {
            headers.insert(CONTENT_TYPE, value);
        }
        Ok(ServerResponse {
            status,
            headers,
            body,
        })
    }

    /// Content type for an entity without an explicit one.
    fn response_media_type(
        &self,
        ctx: &RuntimeContext,
        ty: EntityType,
        method: Option<(&MethodMetadata, Option<&NegotiatedMatch>)>,
    ) -> MediaType {
        if let Some((_, Some(negotiated))) = method {
            let resolved = negotiated.resolved();
            if resolved.is_concrete() {
                return resolved;
            }
        }

        let declared = method.map(|(m, _)| m.produces()).unwrap_or_default();
        let candidates = if declared.is_empty() {
            let writable = ctx.providers().writer_media_types(ty);
            if writable.is_empty() {
                vec![MediaType::wildcard()]
            } else {
                writable
            }
        } else {
            declared.to_vec()
        };

        let accept = ctx.accept();
        let mut compatible = false;
        for entry in accept.acceptable() {
            for candidate in &candidates {
                if !candidate.is_compatible(entry.media_type()) {
                    continue;
                }
                let resolved = candidate.most_specific(entry.media_type());
                if accept.is_denied(resolved) {
                    continue;
                }
                if resolved.is_concrete() {
                    return resolved.clone();
                }
                compatible = true;
            }
        }

        if compatible {
            return MediaType::octet_stream();
        }
        candidates
            .into_iter()
            .find(MediaType::is_concrete)
            .unwrap_or_else(MediaType::octet_stream)
    }

    /// Turn a failure into a response: a registered exception mapper first,
    /// then the carried response of a [`WebApplicationError`], else `500`.
    fn map_error(&self, ctx: &RuntimeContext, error: ResourceError) -> ServerResponse {
        if error.is::<BindingError>() {
            debug!(request_id = %ctx.request_id(), %error, "Parameter binding failed");
            return ServerResponse::new(StatusCode::BAD_REQUEST);
        }

        if let Some(mapper) = ctx.providers().get_exception_mapper(&error) {
            debug!(
                request_id = %ctx.request_id(),
                error_class = error.class().name(),
                "Exception mapper selected"
            );
            let mapped = mapper.to_response(&error);
            return self.write_final(ctx, mapped, error.class().name());
        }

        match error.downcast::<WebApplicationError>() {
            Ok(wae) => self.write_final(ctx, wae.into_response(), "WebApplicationError"),
            Err(error) => {
                // D8: unmapped failure
                error!(
                    request_id = %ctx.request_id(),
                    error_class = error.class().name(),
                    %error,
                    "Unmapped error"
                );
                ServerResponse::new(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    /// Write a response produced while handling an error of class `cause`;
    /// a failure here is not mapped again.
    fn write_final(&self, ctx: &RuntimeContext, response: Response, cause: &'static str) -> ServerResponse {
        self.write_response(ctx, response, None)
            .unwrap_or_else(|error| {
                error!(
                    request_id = %ctx.request_id(),
                    cause,
                    %error,
                    "Failed to write error response"
                );
                ServerResponse::new(StatusCode::INTERNAL_SERVER_ERROR)
            })
    }
}

/// Invoke a handler, turning a panic into a [`HandlerPanic`] error.
fn call(
    method: &MethodMetadata,
    instance: &Instance,
    args: crate::binding::Arguments,
) -> Result<Outcome, ResourceError> {
    match panic::catch_unwind(AssertUnwindSafe(|| (method.handler())(instance, args))) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(method = method.name(), panic_message = %message, "Resource method panicked");
            Err(ResourceError::new(HandlerPanic {
                method: method.name().to_string(),
                message,
            }))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn join_methods(methods: &[Method]) -> String {
    methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Headers every response carries; `HEAD` drops the body but keeps its
/// length.
fn finish(mut response: ServerResponse, request_id: RequestId, head: bool) -> ServerResponse {
    if response.status != StatusCode::NO_CONTENT && !response.headers.contains_key(CONTENT_LENGTH) {
        response
            .headers
            .insert(CONTENT_LENGTH, HeaderValue::from(response.body.len()));
    }
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers.insert(REQUEST_ID_HEADER, value);
    }
    if head {
        response.body.clear();
    }
    response
}
