use super::class::{MethodDecl, ParamDecl, ResourceClass};
use super::types::{
    ConstructorMetadata, MethodKind, MethodMetadata, ParamAnnotation, ParamSource, ParamType,
    ParameterMetadata, ResourceMetadata, Scope,
};
use crate::error::InvalidResourceError;
use crate::media::MediaType;
use crate::uri_template::UriTemplate;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};

/// How a class is being registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectMode {
    /// A root resource instantiated by the runtime; needs a path and a
    /// usable constructor.
    RootClass,
    /// A root resource registered as a ready instance; needs a path.
    RootInstance,
    /// An object returned by a locator; needs neither.
    SubResource,
}

/// Validate `class` and build its immutable metadata.
pub fn collect(
    class: &ResourceClass,
    mode: CollectMode,
) -> Result<ResourceMetadata, InvalidResourceError> {
    let resource = class.ty.name();

    if class.provider {
        return Err(InvalidResourceError::ResourceAndProvider(resource));
    }

    let template = match (&class.path, mode) {
        (Some(path), _) => Some(Arc::new(UriTemplate::compile(path).map_err(|source| {
            InvalidResourceError::Template { resource, source }
        })?)),
        (None, CollectMode::SubResource) => None,
        (None, _) => return Err(InvalidResourceError::MissingPath(resource)),
    };

    let mut resource_methods = Vec::new();
    let mut sub_resources = Vec::new();
    for (index, decl) in class.methods.iter().enumerate() {
        let Some(method) = collect_method(resource, index, decl)? else {
            continue;
        };
        match method.kind {
            MethodKind::ResourceMethod => resource_methods.push(Arc::new(method)),
            _ => sub_resources.push(Arc::new(method)),
        }
    }

    sub_resources.sort_by(|a, b| compare_sub_resources(a, b));
    let ambiguous_locators = report_ambiguous_locators(resource, &sub_resources);

    let scope = class.scope.unwrap_or(match mode {
        CollectMode::RootClass => Scope::Prototype,
        CollectMode::RootInstance | CollectMode::SubResource => Scope::Singleton,
    });

    let constructor = match mode {
        CollectMode::RootClass => Some(Arc::new(select_constructor(class, scope)?)),
        CollectMode::RootInstance | CollectMode::SubResource => None,
    };

    if resource_methods.is_empty() && sub_resources.is_empty() {
        warn!(resource, "Resource declares no resource methods or locators");
    }

    debug!(
        resource,
        path = template.as_deref().map(UriTemplate::as_str),
        resource_methods = resource_methods.len(),
        sub_resources = sub_resources.len(),
        scope = ?scope,
        "Collected resource metadata"
    );

    Ok(ResourceMetadata {
        resource_type: class.ty,
        template,
        resource_methods,
        sub_resources,
        declared_scope: class.scope,
        scope,
        constructor,
        release_hook: class.release.clone(),
        ambiguous_locators,
    })
}

fn collect_method(
    resource: &'static str,
    index: usize,
    decl: &MethodDecl,
) -> Result<Option<MethodMetadata>, InvalidResourceError> {
    let kind = match (decl.http_method.is_some(), decl.path.is_some()) {
        (true, false) => MethodKind::ResourceMethod,
        (true, true) => MethodKind::SubResourceMethod,
        (false, true) => MethodKind::SubResourceLocator,
        (false, false) => {
            warn!(
                resource,
                method = %decl.name,
                "Method has neither an HTTP verb nor a path; ignoring it"
            );
            return Ok(None);
        }
    };

    let handler = decl
        .handler
        .clone()
        .ok_or_else(|| InvalidResourceError::MissingHandler {
            resource,
            method: decl.name.clone(),
        })?;

    let template = match &decl.path {
        Some(path) => Some(Arc::new(UriTemplate::compile(path).map_err(|source| {
            InvalidResourceError::Template { resource, source }
        })?)),
        None => None,
    };

    let mut parameters = Vec::with_capacity(decl.params.len());
    for (position, param) in decl.params.iter().enumerate() {
        let classified =
            classify(param).ok_or_else(|| InvalidResourceError::UnboundParameter {
                resource,
                method: decl.name.clone(),
                index: position,
            })?;
        parameters.push(classified);
    }

    let entities = parameters
        .iter()
        .filter(|p| p.source == ParamSource::Entity)
        .count();
    if entities > 1 {
        return Err(InvalidResourceError::MultipleEntityParameters {
            resource,
            method: decl.name.clone(),
            count: entities,
        });
    }
    if entities == 1 && kind == MethodKind::SubResourceLocator {
        return Err(InvalidResourceError::EntityOnLocator {
            resource,
            method: decl.name.clone(),
        });
    }

    let parse_all = |values: &[String]| -> Result<Vec<MediaType>, InvalidResourceError> {
        values
            .iter()
            .map(|v| {
                MediaType::parse(v).map_err(|source| InvalidResourceError::MediaType {
                    resource,
                    method: decl.name.clone(),
                    source,
                })
            })
            .collect()
    };

    Ok(Some(MethodMetadata {
        name: decl.name.clone(),
        kind,
        http_method: decl.http_method.clone(),
        template,
        parameters,
        consumes: parse_all(&decl.consumes)?,
        produces: parse_all(&decl.produces)?,
        return_type: decl.returns,
        annotations: decl.tags.clone(),
        index,
        handler,
    }))
}

/// Classify one declared parameter; `None` when it cannot be bound.
fn classify(param: &ParamDecl) -> Option<ParameterMetadata> {
    let chosen = param.annotations.iter().min_by_key(|a| a.rank());

    let (source, name) = match chosen {
        None if param.ty.is_body_eligible() => (ParamSource::Entity, String::new()),
        None => return None,
        Some(ParamAnnotation::Context) => {
            if !matches!(param.ty, ParamType::Context(_)) {
                return None;
            }
            (ParamSource::Context, String::new())
        }
        Some(annotation) => {
            if !param.ty.is_string_convertible() {
                return None;
            }
            (annotation.source(), annotation.name().to_string())
        }
    };

    if param.annotations.len() > 1 {
        debug!(
            source = %source,
            name = %name,
            "Parameter declares several sources; using the highest-priority one"
        );
    }

    Some(ParameterMetadata {
        source,
        name,
        ty: param.ty.clone(),
        default_value: param.default_value.clone(),
        encoded: param.encoded,
        annotations: param.tags.clone(),
    })
}

/// Most specific template first; for equal templates sub-resource methods
/// precede locators; then declaration order.
fn compare_sub_resources(a: &MethodMetadata, b: &MethodMetadata) -> Ordering {
    let by_template = match (&a.template, &b.template) {
        (Some(ta), Some(tb)) => tb.compare(ta),
        _ => Ordering::Equal,
    };
    by_template
        .then_with(|| kind_rank(a.kind).cmp(&kind_rank(b.kind)))
        .then_with(|| a.index.cmp(&b.index))
}

fn kind_rank(kind: MethodKind) -> u8 {
    match kind {
        MethodKind::SubResourceMethod => 0,
        MethodKind::SubResourceLocator => 1,
        MethodKind::ResourceMethod => 2,
    }
}

fn report_ambiguous_locators(resource: &'static str, sub_resources: &[Arc<MethodMetadata>]) -> bool {
    let locators: Vec<&Arc<MethodMetadata>> = sub_resources
        .iter()
        .filter(|m| m.kind == MethodKind::SubResourceLocator)
        .collect();
    let mut ambiguous = false;
    for (i, a) in locators.iter().enumerate() {
        for b in &locators[i + 1..] {
            if let (Some(ta), Some(tb)) = (&a.template, &b.template) {
                if ta.same_pattern(tb) {
                    ambiguous = true;
                    warn!(
                        resource,
                        template = ta.as_str(),
                        first = %a.name,
                        second = %b.name,
                        "Ambiguous sub-resource locators; the lexically last method name wins"
                    );
                }
            }
        }
    }
    ambiguous
}

fn select_constructor(
    class: &ResourceClass,
    scope: Scope,
) -> Result<ConstructorMetadata, InvalidResourceError> {
    let resource = class.ty.name();
    let mut chosen: Option<ConstructorMetadata> = None;
    let mut tied = false;

    for (index, decl) in class.constructors.iter().enumerate() {
        let parameters: Option<Vec<ParameterMetadata>> = decl.params.iter().map(classify).collect();
        let Some(parameters) = parameters else {
            debug!(resource, constructor = index, "Constructor has unbindable parameters");
            continue;
        };
        let usable = parameters.iter().all(|p| match scope {
            // Singletons are built outside any request.
            Scope::Singleton => p.source == ParamSource::Context,
            Scope::Prototype => p.source.is_constructor_safe(),
        });
        if !usable {
            debug!(resource, constructor = index, "Constructor is not usable for this scope");
            continue;
        }

        match &chosen {
            Some(current) if parameters.len() < current.parameters.len() => {}
            Some(current) if parameters.len() == current.parameters.len() => tied = true,
            _ => {
                tied = false;
                chosen = Some(ConstructorMetadata {
                    parameters,
                    build: Arc::clone(&decl.build),
                    index,
                });
            }
        }
    }

    let chosen = chosen.ok_or(InvalidResourceError::NoUsableConstructor(resource))?;
    if tied {
        warn!(
            resource,
            constructor = chosen.index,
            parameters = chosen.parameters.len(),
            "Several constructors share the highest parameter count; using the first declared"
        );
    }
    Ok(chosen)
}
