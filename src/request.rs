//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::SocketAddr;

use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};

use crate::body::Body;
use crate::error::{BoxError, Error};
use crate::method::Method;

/// Path variables bound by the router, e.g. `id` for `/users/{id}`.
pub type PathParams = HashMap<String, String>;

/// Query parameters; repeated keys keep every value in arrival order.
pub type QueryParams = HashMap<String, Vec<String>>;

/// Everything about a request except its body.
///
/// Cheap enough to clone once per exchange: the pipeline snapshots it before
/// dispatch so the exception funnel can still see what was asked for after
/// the request itself has been moved into the handler chain.
#[derive(Clone, Debug)]
pub struct RequestHead {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: QueryParams,
    pub(crate) headers: HeaderMap,
    pub(crate) remote_addr: Option<SocketAddr>,
}

impl RequestHead {
    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// First value of a header, if present and valid UTF-8. Case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// First value of a query parameter.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).and_then(|v| v.first()).map(String::as_str)
    }

    /// Every value of a query parameter, in the order they appeared.
    pub fn query_all(&self, name: &str) -> &[String] {
        self.query.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// An incoming HTTP request.
///
/// Read-only once built, apart from the body, which can be taken exactly
/// once.
#[derive(Debug)]
pub struct Request {
    head: RequestHead,
    params: PathParams,
    body: Body,
}

impl Request {
    /// Starts an in-memory request; `target` may carry a query string.
    ///
    /// ```rust
    /// use ferrule::{Method, Request};
    ///
    /// let req = Request::builder(Method::Get, "/search?q=rust&tag=a&tag=b")
    ///     .header("Accept", "text/plain")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(req.path(), "/search");
    /// assert_eq!(req.query("q"), Some("rust"));
    /// assert_eq!(req.query_all("tag"), ["a", "b"]);
    /// assert_eq!(req.header("accept"), Some("text/plain"));
    /// ```
    pub fn builder(method: Method, target: &str) -> RequestBuilder {
        RequestBuilder {
            method,
            target: target.to_owned(),
            headers: HeaderMap::new(),
            body: Body::empty(),
            remote_addr: None,
            error: None,
        }
    }

    /// Bodiless `GET`.
    pub fn get(target: &str) -> Self {
        Self::from_parts(Method::Get, target, HeaderMap::new(), Body::empty(), None)
    }

    /// `POST` with a body.
    pub fn post(target: &str, body: impl Into<Body>) -> Self {
        Self::from_parts(Method::Post, target, HeaderMap::new(), body.into(), None)
    }

    /// Adapts a request decoded by the transport.
    ///
    /// Fails with [`Error::UnsupportedMethod`] for methods outside [`Method`].
    pub fn from_http<B>(req: http::Request<B>, remote_addr: Option<SocketAddr>) -> Result<Self, Error>
    where
        B: hyper::body::Body<Data = bytes::Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        let method = Method::try_from(&parts.method)?;
        let target = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
        Ok(Self::from_parts(method, target, parts.headers, Body::new(body), remote_addr))
    }

    fn from_parts(
        method: Method,
        target: &str,
        headers: HeaderMap,
        body: Body,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (target, QueryParams::new()),
        };
        let head = RequestHead { method, path: path.to_owned(), query, headers, remote_addr };
        Self { head, params: PathParams::new(), body }
    }

    pub fn head(&self) -> &RequestHead { &self.head }
    pub fn method(&self) -> Method { self.head.method }
    pub fn path(&self) -> &str { &self.head.path }
    pub fn headers(&self) -> &HeaderMap { &self.head.headers }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.head.remote_addr }
    pub fn params(&self) -> &PathParams { &self.params }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.header(name)
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.head.query(name)
    }

    pub fn query_all(&self, name: &str) -> &[String] {
        self.head.query_all(name)
    }

    /// Returns a named path variable.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Takes the body, leaving an empty one behind.
    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }

    pub fn into_body(self) -> Body {
        self.body
    }

    pub(crate) fn set_params(&mut self, params: PathParams) {
        self.params = params;
    }
}

fn parse_query(query: &str) -> QueryParams {
    let mut params = QueryParams::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        params.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    params
}

// ── RequestBuilder ────────────────────────────────────────────────────────────

/// Builder for in-memory requests, mostly useful in tests.
///
/// Header errors are remembered and reported by [`build`](RequestBuilder::build).
pub struct RequestBuilder {
    method: Method,
    target: String,
    headers: HeaderMap,
    body: Body,
    remote_addr: Option<SocketAddr>,
    error: Option<Error>,
}

impl RequestBuilder {
    /// Appends a header value; repeated names keep every value.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => self.error = Some(Error::InvalidHeader(format!("{name}: {value}"))),
        }
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn build(self) -> Result<Request, Error> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(Request::from_parts(self.method, &self.target, self.headers, self.body, self.remote_addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_path_and_decodes_query() {
        let req = Request::get("/items?name=big+box&size=a%20b&size=c");
        assert_eq!(req.path(), "/items");
        assert_eq!(req.query("name"), Some("big box"));
        assert_eq!(req.query_all("size"), ["a b", "c"]);
        assert!(req.query_all("missing").is_empty());
    }

    #[test]
    fn headers_are_case_insensitive_and_multi_valued() {
        let req = Request::builder(Method::Get, "/")
            .header("X-Trace", "one")
            .header("x-trace", "two")
            .build()
            .unwrap();
        assert_eq!(req.header("X-TRACE"), Some("one"));
        let all: Vec<_> = req.headers().get_all("x-trace").iter().collect();
        assert_eq!(all, ["one", "two"]);
    }

    #[test]
    fn invalid_header_is_reported_at_build() {
        let res = Request::builder(Method::Get, "/").header("bad name", "v").build();
        assert!(matches!(res, Err(Error::InvalidHeader(_))));
    }

    #[tokio::test]
    async fn body_is_taken_once() {
        let mut req = Request::post("/upload", "payload");
        let first = req.take_body().collect().await.unwrap();
        let second = req.take_body().collect().await.unwrap();
        assert_eq!(&first[..], b"payload");
        assert!(second.is_empty());
    }

    #[test]
    fn adapts_http_request() {
        let raw = http::Request::builder()
            .method("PUT")
            .uri("http://localhost/things/7?force=true")
            .header("content-type", "text/plain")
            .body(http_body_util::Full::new(bytes::Bytes::from_static(b"x")))
            .unwrap();
        let req = Request::from_http(raw, None).unwrap();
        assert_eq!(req.method(), Method::Put);
        assert_eq!(req.path(), "/things/7");
        assert_eq!(req.query("force"), Some("true"));
        assert_eq!(req.header("Content-Type"), Some("text/plain"));
    }

    #[test]
    fn rejects_unknown_methods() {
        let raw = http::Request::builder()
            .method("PURGE")
            .uri("/cache")
            .body(http_body_util::Empty::<bytes::Bytes>::new())
            .unwrap();
        assert!(matches!(Request::from_http(raw, None), Err(Error::UnsupportedMethod(_))));
    }
}
