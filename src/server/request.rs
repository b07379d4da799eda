use crate::media::{AcceptHeader, MediaType, MediaTypeError};
use http::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE};
use http::Method;
use std::fmt::{Debug, Formatter};
use std::io::{Cursor, Read};
use tracing::warn;

/// A decoded HTTP request as handed over by the transport.
///
/// The header map is case-insensitive with ordered values; the body is a
/// readable stream consumed at most once.
pub struct Request {
    method: Method,
    uri: String,
    headers: HeaderMap,
    body: Option<Box<dyn Read + Send>>,
}

impl Request {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Shorthand for `Request::new(Method::GET, uri)`.
    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::GET, uri)
    }

    /// Append a header value. Invalid names or values are logged and skipped.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => warn!(header = name, "Skipping invalid request header"),
        }
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(Box::new(Cursor::new(body.into())));
        self
    }

    #[must_use]
    pub fn with_body_reader<R: Read + Send + 'static>(mut self, reader: R) -> Self {
        self.body = Some(Box::new(reader));
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The full request URI as received (path and query).
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The path part of the URI, without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        let without_fragment = self.uri.split('#').next().unwrap_or_default();
        let path = without_fragment.split('?').next().unwrap_or_default();
        // Absolute-form targets carry scheme and authority.
        match path.find("://") {
            Some(scheme_end) => {
                let rest = &path[scheme_end + 3..];
                rest.find('/').map_or("/", |i| &rest[i..])
            }
            None => path,
        }
    }

    /// The raw query string, if any.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        let without_fragment = self.uri.split('#').next().unwrap_or_default();
        without_fragment.split_once('?').map(|(_, q)| q)
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if it is valid visible ASCII.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Parsed `Content-Type`; `Ok(None)` when absent.
    pub fn content_type(&self) -> Result<Option<MediaType>, MediaTypeError> {
        match self
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            Some(raw) => MediaType::parse(raw).map(Some),
            None => Ok(None),
        }
    }

    /// All `Accept` header values combined.
    #[must_use]
    pub fn accept(&self) -> AcceptHeader {
        let values: Vec<&str> = self
            .headers
            .get_all(ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        if values.is_empty() {
            AcceptHeader::wildcard()
        } else {
            AcceptHeader::from_values(values)
        }
    }

    #[must_use]
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Take the body stream, leaving an empty one behind.
    pub fn take_body(&mut self) -> Box<dyn Read + Send> {
        self.body
            .take()
            .unwrap_or_else(|| Box::new(std::io::empty()))
    }

    pub(crate) fn into_parts(self) -> (Method, String, HeaderMap, Option<Box<dyn Read + Send>>) {
        (self.method, self.uri, self.headers, self.body)
    }
}

impl Debug for Request {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("headers", &self.headers)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Parse every `Cookie` header into ordered `(name, value)` pairs.
#[must_use]
pub fn parse_cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|c| c.split(';'))
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let value = parts.next().unwrap_or("").trim().trim_matches('"');
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_path_and_query() {
        let req = Request::get("/items/5?limit=10#frag");
        assert_eq!(req.path(), "/items/5");
        assert_eq!(req.query(), Some("limit=10"));

        let absolute = Request::get("http://example.com/a/b?x=1");
        assert_eq!(absolute.path(), "/a/b");
    }

    #[test]
    fn headers_are_case_insensitive() {
        let req = Request::get("/")
            .with_header("Content-Type", "application/json; charset=utf-8")
            .with_header("accept", "text/plain")
            .with_header("ACCEPT", "application/json;q=0.5");
        assert_eq!(
            req.content_type().unwrap().unwrap().essence(),
            "application/json"
        );
        assert_eq!(req.accept().acceptable().len(), 2);
    }

    #[test]
    fn parses_cookies_from_all_headers() {
        let req = Request::get("/")
            .with_header("Cookie", "a=1; b=\"two\"")
            .with_header("Cookie", "c=3");
        let cookies = parse_cookies(req.headers());
        assert_eq!(
            cookies,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "two".to_string()),
                ("c".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn missing_body_reads_empty() {
        let mut req = Request::get("/");
        assert!(!req.has_body());
        let mut buf = Vec::new();
        req.take_body().read_to_end(&mut buf).unwrap();
        assert!(buf.is_empty());
    }
}
