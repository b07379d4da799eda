use crate::entity::{Entity, EntityType, Form};
use crate::error::{BindingError, ResourceError};
use crate::ids::RequestId;
use crate::media::{AcceptHeader, MediaType};
use crate::providers::ProvidersRegistry;
use crate::server::{parse_cookies, Request};
use crate::uri_template::{path, ParamVec, TemplateMatch};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Method};
use once_cell::unsync::OnceCell;
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::io::Read;
use std::sync::Arc;
use tracing::debug;

/// Per-request state shared by matching, binding and invocation.
///
/// Owned by the request being dispatched and never shared across threads.
/// Matched templates are pushed as the dispatcher descends through root and
/// sub-resources so path parameters and matched URIs accumulate.
pub struct RuntimeContext {
    request_id: RequestId,
    method: Method,
    path: String,
    query: ParamVec,
    matrix: ParamVec,
    headers: HeaderMap,
    cookies: Vec<(String, String)>,
    content_type: Option<MediaType>,
    accept: AcceptHeader,
    body: RefCell<Option<Box<dyn Read + Send>>>,
    form: OnceCell<Form>,
    variables: RefCell<ParamVec>,
    matched_uris: RefCell<Vec<String>>,
    providers: Arc<ProvidersRegistry>,
}

impl RuntimeContext {
    /// Decode the parts of `request` that binding needs.
    ///
    /// Fails only on a malformed `Content-Type` header.
    pub fn from_request(
        request: Request,
        request_id: RequestId,
        providers: Arc<ProvidersRegistry>,
    ) -> Result<Self, BindingError> {
        let content_type = request
            .content_type()
            .map_err(|source| BindingError::MalformedHeader {
                header: "content-type",
                source,
            })?;
        let accept = request.accept();
        let query = request.query().map(path::split_query).unwrap_or_default();
        let (path, matrix) = path::strip_matrix_params(request.path());
        let (method, _uri, headers, body) = request.into_parts();
        let cookies = parse_cookies(&headers);

        Ok(Self {
            request_id,
            method,
            path,
            query,
            matrix,
            headers,
            cookies,
            content_type,
            accept,
            body: RefCell::new(body),
            form: OnceCell::new(),
            variables: RefCell::new(ParamVec::new()),
            matched_uris: RefCell::new(Vec::new()),
            providers,
        })
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path with matrix parameters removed.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameters; keys decoded, values still encoded.
    #[must_use]
    pub fn query_params(&self) -> &ParamVec {
        &self.query
    }

    /// Matrix parameters from every path segment, values still encoded.
    #[must_use]
    pub fn matrix_params(&self) -> &ParamVec {
        &self.matrix
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    /// Declared `Content-Type`, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<&MediaType> {
        self.content_type.as_ref()
    }

    #[must_use]
    pub fn accept(&self) -> &AcceptHeader {
        &self.accept
    }

    #[must_use]
    pub fn providers(&self) -> &Arc<ProvidersRegistry> {
        &self.providers
    }

    /// Whether an unread body is still attached.
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.body.borrow().is_some()
    }

    /// Media type used to pick a reader: the declared one, or
    /// `application/octet-stream`.
    #[must_use]
    pub fn body_media_type(&self) -> MediaType {
        self.content_type
            .clone()
            .unwrap_or_else(MediaType::octet_stream)
    }

    fn take_body(&self) -> Box<dyn Read + Send> {
        self.body
            .borrow_mut()
            .take()
            .unwrap_or_else(|| Box::new(std::io::empty()))
    }

    /// Read the body as an entity of type `ty` through the providers.
    pub fn read_entity(
        &self,
        ty: EntityType,
        annotations: &[&'static str],
    ) -> Result<Entity, ResourceError> {
        let media_type = self.body_media_type();
        let mut body = self.take_body();
        self.providers
            .read_entity(ty, annotations, &media_type, &self.headers, &mut body)
    }

    /// The urlencoded form body, read once and cached. Requests with another
    /// content type yield an empty form.
    pub fn form(&self) -> Result<&Form, BindingError> {
        self.form.get_or_try_init(|| {
            let is_form = self
                .content_type
                .as_ref()
                .is_some_and(|ct| ct.is_compatible(&MediaType::form_urlencoded()));
            if !is_form {
                return Ok(Form::new());
            }
            let mut text = String::new();
            self.take_body().read_to_string(&mut text)?;
            Ok(Form::parse(&text))
        })
    }

    /// Record a matched template level.
    pub fn push_match(&self, matched: &TemplateMatch) {
        self.variables
            .borrow_mut()
            .extend(matched.variables().iter().cloned());
        if matched.head().is_empty() {
            return;
        }
        let mut uris = self.matched_uris.borrow_mut();
        let consumed = match uris.first() {
            Some(parent) if !parent.is_empty() => format!("{parent}/{}", matched.head()),
            _ => matched.head().to_string(),
        };
        debug!(request_id = %self.request_id, matched = %consumed, "Matched path level");
        uris.insert(0, consumed);
    }

    /// Position to [`rewind`](Self::rewind) to after an abandoned match.
    pub(crate) fn mark(&self) -> (usize, usize) {
        (self.variables.borrow().len(), self.matched_uris.borrow().len())
    }

    pub(crate) fn rewind(&self, (variables, uris): (usize, usize)) {
        self.variables.borrow_mut().truncate(variables);
        let mut matched = self.matched_uris.borrow_mut();
        let extra = matched.len().saturating_sub(uris);
        matched.drain(..extra);
    }

    /// Raw value of a path variable; the most recent capture wins.
    #[must_use]
    pub fn path_variable(&self, name: &str) -> Option<String> {
        self.variables
            .borrow()
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.clone())
    }

    /// All captured path variables, still encoded, in match order.
    #[must_use]
    pub fn path_variables(&self) -> ParamVec {
        self.variables.borrow().clone()
    }

    /// Consumed URIs, most recent first.
    #[must_use]
    pub fn matched_uris(&self) -> Vec<String> {
        self.matched_uris.borrow().clone()
    }

    /// Snapshot for `@Context HttpHeaders` parameters.
    #[must_use]
    pub fn http_headers(&self) -> HttpHeaders {
        HttpHeaders {
            headers: self.headers.clone(),
            acceptable: self.accept.media_types(),
            media_type: self.content_type.clone(),
            cookies: self.cookies.clone(),
        }
    }

    /// Snapshot for `@Context UriInfo` parameters.
    #[must_use]
    pub fn uri_info(&self) -> UriInfo {
        UriInfo {
            path: self.path.clone(),
            path_parameters: self
                .variables
                .borrow()
                .iter()
                .map(|(k, v)| (Arc::clone(k), path::decode(v)))
                .collect(),
            query_parameters: self
                .query
                .iter()
                .map(|(k, v)| (Arc::clone(k), path::decode_form_component(v)))
                .collect(),
            matched_uris: self.matched_uris(),
        }
    }
}

impl Debug for RuntimeContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeContext")
            .field("request_id", &self.request_id)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Request headers as seen by a resource method.
#[derive(Debug, Clone)]
pub struct HttpHeaders {
    headers: HeaderMap,
    acceptable: Vec<MediaType>,
    media_type: Option<MediaType>,
    cookies: Vec<(String, String)>,
}

impl HttpHeaders {
    /// First value of a header.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    #[must_use]
    pub fn raw(&self) -> &HeaderMap {
        &self.headers
    }

    /// Acceptable media types in preference order.
    #[must_use]
    pub fn acceptable_media_types(&self) -> &[MediaType] {
        &self.acceptable
    }

    #[must_use]
    pub fn media_type(&self) -> Option<&MediaType> {
        self.media_type.as_ref()
    }

    #[must_use]
    pub fn content_type_header(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Request URI details as seen by a resource method. Values are decoded.
#[derive(Debug, Clone)]
pub struct UriInfo {
    path: String,
    path_parameters: ParamVec,
    query_parameters: ParamVec,
    matched_uris: Vec<String>,
}

impl UriInfo {
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn path_parameter(&self, name: &str) -> Option<&str> {
        self.path_parameters
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn path_parameters(&self) -> &ParamVec {
        &self.path_parameters
    }

    #[must_use]
    pub fn query_parameter(&self, name: &str) -> Option<&str> {
        self.query_parameters
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn query_parameters(&self) -> &ParamVec {
        &self.query_parameters
    }

    /// Consumed URIs, most recent first.
    #[must_use]
    pub fn matched_uris(&self) -> &[String] {
        &self.matched_uris
    }
}
