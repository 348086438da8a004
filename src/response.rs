//! Outgoing HTTP response type and the conversion traits handlers return through.
//!
//! A [`Response`] stays mutable until its body starts streaming. From then on
//! it is *committed*: the head is frozen and any further header write fails
//! with [`Error::LateHeaderWrite`].

use std::fmt;

use http::HeaderMap;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};

use crate::body::{Body, BodyWriter};
use crate::error::Error;
use crate::status::Status;

/// What every handler, filter and funnel eventually produces.
pub type Outcome = Result<Response, Error>;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// # Shortcuts (infallible)
///
/// ```rust
/// use ferrule::{Response, Status};
///
/// Response::text("hello");
/// Response::status(Status::NO_CONTENT);
/// ```
///
/// # Builder (custom status or headers)
///
/// Header names and values are validated, so the builder's terminal methods
/// return a `Result`, which is itself a valid handler return value.
///
/// ```rust
/// use ferrule::{Response, Status};
///
/// let res = Response::builder()
///     .status(Status::CREATED)
///     .header("location", "/users/42")
///     .bytes("application/json", br#"{"id":42}"#.to_vec())
///     .unwrap();
/// assert_eq!(res.header("Location"), Some("/users/42"));
/// ```
///
/// # Streaming
///
/// ```rust
/// # async fn demo() -> Result<(), ferrule::Error> {
/// use ferrule::Response;
///
/// let mut res = Response::status(ferrule::Status::OK);
/// res.set_header("content-type", "text/plain")?;
/// let mut writer = res.start_body();
/// writer.send("first chunk").await?;
/// assert!(res.set_header("x-late", "1").is_err());
/// # Ok(()) }
/// ```
pub struct Response {
    status: Status,
    headers: HeaderMap,
    body: Body,
    committed: bool,
}

impl Response {
    /// `200 OK`, `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
        Self { status: Status::OK, headers, body: body.into().into(), committed: false }
    }

    /// Response with no body.
    pub fn status(code: Status) -> Self {
        Self { status: code, headers: HeaderMap::new(), body: Body::empty(), committed: false }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { status: Status::OK, headers: HeaderMap::new(), error: None }
    }

    pub fn status_code(&self) -> Status { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }

    /// First value of a header, if present and valid UTF-8. Case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Whether the body has started streaming and the head is frozen.
    pub fn is_committed(&self) -> bool { self.committed }

    pub fn set_status(&mut self, code: Status) -> Result<&mut Self, Error> {
        self.ensure_open(":status")?;
        self.status = code;
        Ok(self)
    }

    /// Replaces every value of `name` with `value`.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<&mut Self, Error> {
        self.ensure_open(name)?;
        let (name, value) = parse_header(name, value)?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds `value` after any existing values of `name`.
    pub fn append_header(&mut self, name: &str, value: &str) -> Result<&mut Self, Error> {
        self.ensure_open(name)?;
        let (name, value) = parse_header(name, value)?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// Commits the response and returns the sink its body is written through.
    ///
    /// Whatever body the response carried before is discarded.
    pub fn start_body(&mut self) -> BodyWriter {
        let (writer, body) = Body::channel();
        self.body = body;
        self.committed = true;
        writer
    }

    /// Commits the response with `body` as its producer.
    pub fn write_with(&mut self, body: impl Into<Body>) -> Result<(), Error> {
        if self.committed {
            return Err(Error::Body("response body already committed".into()));
        }
        self.body = body.into();
        self.committed = true;
        Ok(())
    }

    pub fn into_body(self) -> Body {
        self.body
    }

    /// Converts into the transport's response type.
    pub fn into_http(self) -> http::Response<Body> {
        let mut res = http::Response::new(self.body);
        *res.status_mut() = self.status.into();
        *res.headers_mut() = self.headers;
        res
    }

    fn ensure_open(&self, name: &str) -> Result<(), Error> {
        if self.committed {
            return Err(Error::LateHeaderWrite { name: name.to_owned() });
        }
        Ok(())
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("committed", &self.committed)
            .finish_non_exhaustive()
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), Error> {
    let invalid = || Error::InvalidHeader(format!("{name}: {value}"));
    let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
    let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
    Ok((name, value))
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`. Terminated by a
/// body method; the first invalid header, if any, is reported there.
pub struct ResponseBuilder {
    status: Status,
    headers: HeaderMap,
    error: Option<Error>,
}

impl ResponseBuilder {
    pub fn status(mut self, code: Status) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_none() {
            match parse_header(name, value) {
                Ok((name, value)) => {
                    self.headers.append(name, value);
                }
                Err(e) => self.error = Some(e),
            }
        }
        self
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8` unless a
    /// content type was already set).
    pub fn text(self, body: impl Into<String>) -> Result<Response, Error> {
        self.finish(Some(TEXT_PLAIN), body.into().into())
    }

    /// Terminate with a typed body.
    pub fn bytes(self, content_type: &str, body: impl Into<Body>) -> Result<Response, Error> {
        self.finish(Some(content_type), body.into())
    }

    /// Terminate with any body and no implied content type.
    pub fn body(self, body: impl Into<Body>) -> Result<Response, Error> {
        self.finish(None, body.into())
    }

    /// Terminate with no body (e.g. `204`, redirects).
    pub fn empty(self) -> Result<Response, Error> {
        self.finish(None, Body::empty())
    }

    fn finish(mut self, content_type: Option<&str>, body: Body) -> Result<Response, Error> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if let Some(ct) = content_type {
            if !self.headers.contains_key(CONTENT_TYPE) {
                let value = HeaderValue::from_str(ct)
                    .map_err(|_| Error::InvalidHeader(format!("content-type: {ct}")))?;
                self.headers.insert(CONTENT_TYPE, value);
            }
        }
        Ok(Response { status: self.status, headers: self.headers, body, committed: false })
    }
}

// ── IntoResponse / IntoOutcome ───────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Implement on your own types to return them directly from handlers.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a [`Status`] directly from a handler: `return Status::NOT_FOUND`
impl IntoResponse for Status {
    fn into_response(self) -> Response { Response::status(self) }
}

/// What a handler, filter or funnel may return: a response, or a failure
/// for the exception funnel.
///
/// Covers every [`IntoResponse`] type in this crate plus `Result<T, E>` for
/// any `T: IntoResponse` and `E: Into<Error>`.
pub trait IntoOutcome {
    fn into_outcome(self) -> Outcome;
}

impl<T, E> IntoOutcome for Result<T, E>
where
    T: IntoResponse,
    E: Into<Error>,
{
    fn into_outcome(self) -> Outcome {
        self.map(IntoResponse::into_response).map_err(Into::into)
    }
}

macro_rules! infallible_outcome {
    ($($ty:ty),*) => {
        $(impl IntoOutcome for $ty {
            fn into_outcome(self) -> Outcome { Ok(self.into_response()) }
        })*
    };
}

infallible_outcome!(Response, &'static str, String, Status);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_sets_status_and_content_type() {
        let res = Response::text("hi");
        assert_eq!(res.status_code(), Status::OK);
        assert_eq!(res.header("content-type"), Some(TEXT_PLAIN));
        assert!(!res.is_committed());
    }

    #[test]
    fn builder_keeps_explicit_content_type() {
        let res = Response::builder()
            .header("Content-Type", "text/csv")
            .text("a,b")
            .unwrap();
        assert_eq!(res.header("content-type"), Some("text/csv"));
    }

    #[test]
    fn builder_reports_first_invalid_header() {
        let res = Response::builder().header("bad name", "x").header("ok", "y").empty();
        assert!(matches!(res, Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn headers_are_mutable_until_commit() {
        let mut res = Response::status(Status::OK);
        res.set_header("x-a", "1").unwrap().append_header("x-a", "2").unwrap();
        res.set_status(Status::ACCEPTED).unwrap();
        assert_eq!(res.headers().get_all("x-a").iter().count(), 2);
        assert_eq!(res.status_code(), Status::ACCEPTED);
    }

    #[tokio::test]
    async fn late_header_write_keeps_sent_bytes_and_head_intact() {
        let mut res = Response::status(Status::OK);
        res.set_header("content-type", "text/plain").unwrap();
        let mut writer = res.start_body();
        writer.send("already sent").await.unwrap();

        let err = res.set_header("x-late", "1").unwrap_err();
        assert!(matches!(err, Error::LateHeaderWrite { ref name } if name == "x-late"));
        assert!(res.append_header("x-late", "1").is_err());
        assert!(res.set_status(Status::NOT_FOUND).is_err());

        drop(writer);
        assert_eq!(res.status_code(), Status::OK);
        assert_eq!(res.headers().len(), 1);
        assert!(res.header("x-late").is_none());
        let body = res.into_body().collect().await.unwrap();
        assert_eq!(&body[..], b"already sent");
    }

    #[test]
    fn body_can_only_be_committed_once() {
        let mut res = Response::status(Status::OK);
        res.write_with("first").unwrap();
        assert!(res.is_committed());
        assert!(res.write_with("second").is_err());
    }

    #[test]
    fn result_outcomes_convert_errors() {
        let ok: Result<&'static str, Error> = Ok("fine");
        assert_eq!(ok.into_outcome().unwrap().status_code(), Status::OK);

        let failed: Result<Response, std::io::Error> =
            Err(std::io::Error::other("disk on fire"));
        assert!(matches!(failed.into_outcome(), Err(Error::Io(_))));
    }

    #[test]
    fn into_http_carries_status_and_headers() {
        let http = Response::builder()
            .status(Status::CREATED)
            .header("location", "/x")
            .empty()
            .unwrap()
            .into_http();
        assert_eq!(http.status(), http::StatusCode::CREATED);
        assert_eq!(http.headers()["location"], "/x");
    }
}
