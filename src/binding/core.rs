use super::arguments::{Argument, Arguments, ContextValue};
use super::context::RuntimeContext;
use crate::error::{BindingError, ResourceError};
use crate::metadata::{ContextKind, ParamSource, ParamType, ParameterMetadata};
use crate::uri_template::path;
use std::sync::Arc;
use tracing::debug;

/// Why a parameter list could not be bound.
#[derive(Debug)]
pub enum BindFailure {
    /// A value could not be converted; answered with `400`.
    Binding(BindingError),
    /// The entity reader failed; goes through exception mapping.
    Resource(ResourceError),
}

impl From<BindingError> for BindFailure {
    fn from(error: BindingError) -> Self {
        BindFailure::Binding(error)
    }
}

/// Bind `parameters` in declaration order from the request.
pub fn bind(
    parameters: &[ParameterMetadata],
    ctx: &RuntimeContext,
) -> Result<Arguments, BindFailure> {
    let mut values = Vec::with_capacity(parameters.len());
    for param in parameters {
        let value = match param.source {
            ParamSource::Entity => {
                let ParamType::Entity(ty) = &param.ty else {
                    return Err(BindFailure::Resource(ResourceError::msg(format!(
                        "entity parameter declared with non-entity type {}",
                        param.ty.describe()
                    ))));
                };
                let entity = ctx
                    .read_entity(*ty, &param.annotations)
                    .map_err(BindFailure::Resource)?;
                Argument::Entity(entity)
            }
            ParamSource::Context => bind_context(param, ctx),
            _ => {
                let raw = raw_values(param, ctx)?;
                bind_strings(param, raw)?
            }
        };
        values.push(value);
    }
    Ok(Arguments::new(values))
}

fn bind_context(param: &ParameterMetadata, ctx: &RuntimeContext) -> Argument {
    let value = match &param.ty {
        ParamType::Context(ContextKind::HttpHeaders) => ContextValue::HttpHeaders(ctx.http_headers()),
        ParamType::Context(ContextKind::UriInfo) => ContextValue::UriInfo(ctx.uri_info()),
        ParamType::Context(ContextKind::Providers) => {
            ContextValue::Providers(Arc::clone(ctx.providers()))
        }
        _ => return Argument::Absent,
    };
    Argument::Context(value)
}

/// Collect and decode the raw strings for a string-sourced parameter.
fn raw_values(param: &ParameterMetadata, ctx: &RuntimeContext) -> Result<Vec<String>, BindingError> {
    let name = param.name.as_str();
    let decode_path = |v: &str| {
        if param.encoded {
            v.to_string()
        } else {
            path::decode(v)
        }
    };

    let values = match param.source {
        ParamSource::Path => ctx
            .path_variable(name)
            .map(|v| decode_path(&v))
            .into_iter()
            .collect(),
        ParamSource::Matrix => ctx
            .matrix_params()
            .iter()
            .filter(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| decode_path(v))
            .collect(),
        ParamSource::Query => ctx
            .query_params()
            .iter()
            .filter(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| {
                if param.encoded {
                    v.clone()
                } else {
                    path::decode_form_component(v)
                }
            })
            .collect(),
        ParamSource::Header => ctx
            .headers()
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect(),
        ParamSource::Cookie => ctx
            .cookies()
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
            .into_iter()
            .collect(),
        ParamSource::Form => ctx
            .form()?
            .get_all(name)
            .into_iter()
            .map(str::to_string)
            .collect(),
        ParamSource::Context | ParamSource::Entity => Vec::new(),
    };
    Ok(values)
}

fn bind_strings(param: &ParameterMetadata, raw: Vec<String>) -> Result<Argument, BindingError> {
    if raw.is_empty() {
        return match (&param.default_value, &param.ty) {
            (Some(default), ty) => convert_all(param, ty, &[default.clone()]),
            (None, ParamType::List(_)) => Ok(Argument::List(Vec::new())),
            (None, _) => Ok(Argument::Absent),
        };
    }

    match convert_all(param, &param.ty, &raw) {
        Ok(value) => Ok(value),
        Err(error) if param.source.is_strict() => Err(error),
        Err(error) => {
            debug!(
                source = %param.source,
                name = %param.name,
                %error,
                "Parameter conversion failed; trying fallback"
            );
            match (&param.default_value, &param.ty) {
                (Some(default), ty) => convert_all(param, ty, &[default.clone()]),
                (None, ParamType::List(_)) => Ok(Argument::List(Vec::new())),
                (None, _) => Err(error),
            }
        }
    }
}

fn convert_all(
    param: &ParameterMetadata,
    ty: &ParamType,
    raw: &[String],
) -> Result<Argument, BindingError> {
    match ty {
        ParamType::List(inner) => raw
            .iter()
            .map(|v| convert(param, inner, v))
            .collect::<Result<Vec<_>, _>>()
            .map(Argument::List),
        _ => {
            // Single-valued parameters take the first value.
            let first = raw.first().map_or("", String::as_str);
            convert(param, ty, first)
        }
    }
}

/// Convert one string into the declared type.
pub fn convert(
    param: &ParameterMetadata,
    ty: &ParamType,
    raw: &str,
) -> Result<Argument, BindingError> {
    let failed = |reason: String| BindingError::Conversion {
        source_kind: param.source,
        name: param.name.clone(),
        value: raw.to_string(),
        target: ty.describe(),
        reason,
    };

    match ty {
        ParamType::String => Ok(Argument::Str(raw.to_string())),
        ParamType::Bool => match raw.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Argument::Bool(true)),
            "false" => Ok(Argument::Bool(false)),
            _ => Err(failed("expected `true` or `false`".to_string())),
        },
        ParamType::I32 => raw
            .parse()
            .map(Argument::I32)
            .map_err(|e: std::num::ParseIntError| failed(e.to_string())),
        ParamType::I64 => raw
            .parse()
            .map(Argument::I64)
            .map_err(|e: std::num::ParseIntError| failed(e.to_string())),
        ParamType::U64 => raw
            .parse()
            .map(Argument::U64)
            .map_err(|e: std::num::ParseIntError| failed(e.to_string())),
        ParamType::F64 => raw
            .parse()
            .map(Argument::F64)
            .map_err(|e: std::num::ParseFloatError| failed(e.to_string())),
        ParamType::Custom(custom) => custom.convert(raw).map(Argument::Custom).map_err(failed),
        ParamType::List(inner) => convert(param, inner, raw).map(|v| Argument::List(vec![v])),
        ParamType::Entity(_) | ParamType::Context(_) => Err(failed(
            "type cannot be converted from a string".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RequestId;
    use crate::metadata::CustomType;
    use crate::providers::ProvidersRegistry;
    use crate::server::Request;
    use crate::uri_template::UriTemplate;

    fn param(source: ParamSource, name: &str, ty: ParamType) -> ParameterMetadata {
        ParameterMetadata {
            source,
            name: name.to_string(),
            ty,
            default_value: None,
            encoded: false,
            annotations: Vec::new(),
        }
    }

    fn context(uri: &str, template: &str) -> RuntimeContext {
        let ctx = RuntimeContext::from_request(
            Request::get(uri).with_header("X-Limit", "abc"),
            RequestId::new(),
            Arc::new(ProvidersRegistry::new()),
        )
        .unwrap();
        let matched = UriTemplate::compile(template)
            .unwrap()
            .match_path(ctx.path())
            .unwrap();
        ctx.push_match(&matched);
        ctx
    }

    #[test]
    fn path_conversion_failure_is_fatal_even_with_default() {
        let ctx = context("/items/abc", "/items/{id}");
        let mut id = param(ParamSource::Path, "id", ParamType::I64);
        id.default_value = Some("1".to_string());
        let err = bind(&[id], &ctx).unwrap_err();
        assert!(matches!(
            err,
            BindFailure::Binding(BindingError::Conversion {
                source_kind: ParamSource::Path,
                ..
            })
        ));
    }

    #[test]
    fn query_failure_falls_back_to_default() {
        let ctx = context("/items?limit=ten", "/items");
        let mut limit = param(ParamSource::Query, "limit", ParamType::I32);
        limit.default_value = Some("25".to_string());
        let args = bind(&[limit], &ctx).unwrap();
        assert_eq!(args.i32(0), Some(25));
    }

    #[test]
    fn list_failure_without_default_binds_empty_list() {
        let ctx = context("/items?n=1&n=x", "/items");
        let header = param(ParamSource::Header, "x-limit", ParamType::I32);
        let list = param(ParamSource::Query, "n", ParamType::list(ParamType::I32));
        assert!(bind(&[header], &ctx).is_err());
        let args = bind(&[list], &ctx).unwrap();
        assert!(args.list(0).is_empty());
    }

    #[test]
    fn missing_values_are_absent_or_empty() {
        let ctx = context("/items", "/items");
        let args = bind(
            &[
                param(ParamSource::Query, "q", ParamType::String),
                param(ParamSource::Query, "tags", ParamType::list(ParamType::String)),
            ],
            &ctx,
        )
        .unwrap();
        assert!(args.is_absent(0));
        assert!(args.list(1).is_empty());
    }

    #[test]
    fn decodes_unless_encoded() {
        let ctx = context("/files/a%20b", "/files/{name}");
        let mut raw = param(ParamSource::Path, "name", ParamType::String);
        raw.encoded = true;
        let args = bind(&[param(ParamSource::Path, "name", ParamType::String), raw], &ctx).unwrap();
        assert_eq!(args.str(0), Some("a b"));
        assert_eq!(args.str(1), Some("a%20b"));
    }

    #[test]
    fn custom_types_use_value_of() {
        #[derive(Debug, PartialEq)]
        struct Celsius(f64);

        let ctx = context("/t?c=21.5", "/t");
        let ty = ParamType::Custom(
            CustomType::new::<Celsius>()
                .with_from_string(|_| Err::<Celsius, _>("unused".to_string()))
                .with_value_of(|raw| raw.parse::<f64>().map(Celsius).map_err(|e| e.to_string())),
        );
        let args = bind(&[param(ParamSource::Query, "c", ty)], &ctx).unwrap();
        assert_eq!(args.custom::<Celsius>(0), Some(&Celsius(21.5)));
    }
}
