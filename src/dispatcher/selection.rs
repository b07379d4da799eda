use crate::binding::RuntimeContext;
use crate::media::{MediaType, NegotiatedMatch};
use crate::metadata::MethodMetadata;
use http::Method;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Result of choosing one method among those sharing a path.
#[derive(Debug)]
pub(crate) enum Selection {
    Selected {
        method: Arc<MethodMetadata>,
        negotiated: Option<NegotiatedMatch>,
    },
    /// Built-in `OPTIONS` answer.
    Options { allow: Vec<Method> },
    MethodNotAllowed { allow: Vec<Method> },
    UnsupportedMediaType,
    NotAcceptable,
}

struct Candidate<'a> {
    method: &'a Arc<MethodMetadata>,
    consumes_specificity: u8,
    negotiated: NegotiatedMatch,
}

/// Verbs answered at a path: the declared ones, `HEAD` when `GET` exists,
/// and `OPTIONS`.
pub(crate) fn allowed_methods(methods: &[Arc<MethodMetadata>]) -> Vec<Method> {
    let mut allow: Vec<Method> = methods
        .iter()
        .filter_map(|m| m.http_method().cloned())
        .collect();
    if allow.contains(&Method::GET) {
        allow.push(Method::HEAD);
    }
    allow.push(Method::OPTIONS);
    allow.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    allow.dedup();
    allow
}

/// Filter `methods` by verb, then `Content-Type`, then `Accept`, and rank
/// the survivors.
pub(crate) fn select(methods: &[Arc<MethodMetadata>], ctx: &RuntimeContext) -> Selection {
    let request_method = ctx.method();

    // S1: verb
    let mut by_verb: Vec<&Arc<MethodMetadata>> = methods
        .iter()
        .filter(|m| m.http_method() == Some(request_method))
        .collect();
    if by_verb.is_empty() && *request_method == Method::HEAD {
        by_verb = methods
            .iter()
            .filter(|m| m.http_method() == Some(&Method::GET))
            .collect();
    }
    if by_verb.is_empty() {
        let allow = allowed_methods(methods);
        if *request_method == Method::OPTIONS {
            return Selection::Options { allow };
        }
        debug!(
            request_id = %ctx.request_id(),
            method = %request_method,
            "No method for verb"
        );
        return Selection::MethodNotAllowed { allow };
    }

    // S2: consumes
    let content_type = ctx
        .content_type()
        .cloned()
        .or_else(|| ctx.has_body().then(MediaType::octet_stream));
    let by_consumes: Vec<(&Arc<MethodMetadata>, u8)> = by_verb
        .into_iter()
        .filter_map(|m| consumes_specificity(m, content_type.as_ref()).map(|s| (m, s)))
        .collect();
    if by_consumes.is_empty() {
        debug!(
            request_id = %ctx.request_id(),
            content_type = ?content_type,
            "No method consumes the request content type"
        );
        return Selection::UnsupportedMediaType;
    }

    // S3: produces
    let mut candidates: Vec<Candidate<'_>> = by_consumes
        .into_iter()
        .filter_map(|(method, consumes_specificity)| {
            ctx.accept()
                .best_match(method.produces())
                .map(|negotiated| Candidate {
                    method,
                    consumes_specificity,
                    negotiated,
                })
        })
        .collect();
    if candidates.is_empty() {
        debug!(request_id = %ctx.request_id(), "No method produces an acceptable type");
        return Selection::NotAcceptable;
    }

    // S4: rank
    candidates.sort_by(rank);
    let best = candidates.swap_remove(0);
    debug!(
        request_id = %ctx.request_id(),
        selected = best.method.name(),
        produces = %best.negotiated.produced(),
        "Method selected"
    );
    Selection::Selected {
        method: Arc::clone(best.method),
        negotiated: Some(best.negotiated),
    }
}

/// `None` when the method cannot consume `content_type`; otherwise the
/// specificity of the best compatible declaration (`0` for none).
fn consumes_specificity(method: &MethodMetadata, content_type: Option<&MediaType>) -> Option<u8> {
    let Some(content_type) = content_type else {
        return Some(
            method
                .consumes()
                .iter()
                .map(MediaType::specificity)
                .max()
                .unwrap_or(0),
        );
    };
    if method.consumes().is_empty() {
        return Some(0);
    }
    method
        .consumes()
        .iter()
        .filter(|declared| declared.is_compatible(content_type))
        .map(MediaType::specificity)
        .max()
}

fn rank(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    b.negotiated
        .quality()
        .cmp(&a.negotiated.quality())
        .then_with(|| {
            b.negotiated
                .produced()
                .compare_specificity(a.negotiated.produced())
        })
        .then_with(|| b.consumes_specificity.cmp(&a.consumes_specificity))
        .then_with(|| {
            b.method
                .parameters()
                .len()
                .cmp(&a.method.parameters().len())
        })
        .then_with(|| a.method.index().cmp(&b.method.index()))
}
