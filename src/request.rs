//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::HeaderMap;
use http::header::CONTENT_TYPE;

use crate::cookie;
use crate::method::Method;

/// An incoming HTTP request with its body read and its parameters decoded.
#[derive(Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
}

impl Request {
    pub(crate) fn new(
        method: Method,
        path: String,
        query: Option<&str>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Self {
        let params = decode_params(&method, query, &headers, &body);
        Self { method, path, headers, body, params }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup. Returns the first value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a decoded query or form parameter.
    ///
    /// For `/search?q=rust&page=2`, `req.param("q")` returns `Some("rust")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> { &self.params }

    /// Raw value of the request cookie called `name`.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        cookie::find(&self.headers, name)
    }
}

/// Merges urlencoded form fields and query fields into one map.
///
/// The first occurrence of a key wins. Form fields (`POST`, `PUT` and `PATCH`
/// with an `application/x-www-form-urlencoded` body) come before query
/// fields, so a form value shadows a query value of the same name.
fn decode_params(method: &Method, query: Option<&str>, headers: &HeaderMap, body: &[u8]) -> HashMap<String, String> {
    let mut params = HashMap::new();

    let is_form = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|ct| ct.trim().eq_ignore_ascii_case("application/x-www-form-urlencoded"));

    if is_form && matches!(method, Method::Post | Method::Put | Method::Patch) {
        for (k, v) in url::form_urlencoded::parse(body) {
            params.entry(k.into_owned()).or_insert_with(|| v.into_owned());
        }
    }
    if let Some(query) = query {
        for (k, v) in url::form_urlencoded::parse(query.as_bytes()) {
            params.entry(k.into_owned()).or_insert_with(|| v.into_owned());
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "application/x-www-form-urlencoded; charset=utf-8".parse().unwrap());
        headers
    }

    #[test]
    fn query_is_decoded() {
        let req = Request::new(Method::Get, "/s".into(), Some("q=hello+world&tag=a%26b"), HeaderMap::new(), Bytes::new());
        assert_eq!(req.param("q"), Some("hello world"));
        assert_eq!(req.param("tag"), Some("a&b"));
        assert_eq!(req.param("missing"), None);
    }

    #[test]
    fn first_occurrence_wins() {
        let req = Request::new(Method::Get, "/".into(), Some("k=1&k=2"), HeaderMap::new(), Bytes::new());
        assert_eq!(req.param("k"), Some("1"));
    }

    #[test]
    fn form_fields_shadow_query_fields() {
        let req = Request::new(
            Method::Post,
            "/".into(),
            Some("name=query&page=3"),
            form_headers(),
            Bytes::from_static(b"name=form&extra=x"),
        );
        assert_eq!(req.param("name"), Some("form"));
        assert_eq!(req.param("page"), Some("3"));
        assert_eq!(req.param("extra"), Some("x"));
    }

    #[test]
    fn non_form_bodies_are_not_decoded() {
        let req = Request::new(Method::Post, "/".into(), None, HeaderMap::new(), Bytes::from_static(b"a=1"));
        assert!(req.params().is_empty());

        let req = Request::new(Method::Get, "/".into(), None, form_headers(), Bytes::from_static(b"a=1"));
        assert!(req.params().is_empty());
    }

    #[test]
    fn header_and_cookie_lookup() {
        let mut headers = HeaderMap::new();
        headers.insert("x-token", "abc".parse().unwrap());
        headers.insert(http::header::COOKIE, "sid=42".parse().unwrap());
        let req = Request::new(Method::Get, "/".into(), None, headers, Bytes::new());
        assert_eq!(req.header("X-Token"), Some("abc"));
        assert_eq!(req.cookie("sid"), Some("42"));
        assert_eq!(req.cookie("other"), None);
    }
}
