//! The outgoing response sink and the [`IntoBody`] conversion trait.
//!
//! Handlers shape the response through [`Context`](crate::Context), which
//! writes into a [`ResponseSink`]. The sink behaves like a streaming writer:
//! the first status or body write commits the head, and header changes made
//! after that are dropped. The dispatcher turns the sink into the
//! `http::Response` hyper sends.

use std::convert::Infallible;
use std::fmt;
use std::io;

use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_LENGTH, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use tracing::debug;

/// Body of every response the dispatcher produces: buffered bytes, or a
/// file streamed from disk.
pub type ResponseBody = UnsyncBoxBody<Bytes, io::Error>;

pub(crate) fn full_body(bytes: Bytes) -> ResponseBody {
    Full::new(bytes).map_err(|never: Infallible| -> io::Error { match never {} }).boxed_unsync()
}

// ── ResponseSink ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct ResponseSink {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
    /// A streamed body and its length. Takes the place of `body`.
    stream: Option<(ResponseBody, u64)>,
}

impl fmt::Debug for ResponseSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseSink")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("buffered", &self.body.len())
            .field("streamed", &self.stream.as_ref().map(|(_, len)| *len))
            .finish()
    }
}

impl ResponseSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// `true` once a status or body byte has been written.
    pub(crate) fn is_committed(&self) -> bool {
        self.status.is_some()
    }

    pub(crate) fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub(crate) fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[cfg(test)]
    pub(crate) fn body(&self) -> &[u8] {
        &self.body
    }

    /// Replaces (`exclusive`) or appends a header value. Invalid names or
    /// values and mutations after commit are dropped.
    pub(crate) fn set_header(&mut self, name: &str, value: &str, exclusive: bool) {
        if self.is_committed() {
            debug!(header = name, "response already committed, header dropped");
            return;
        }
        let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) else {
            debug!(header = name, "invalid header, dropped");
            return;
        };
        if exclusive {
            self.headers.insert(name, value);
        } else {
            self.headers.append(name, value);
        }
    }

    /// Commits `status`. Only the first call takes effect.
    pub(crate) fn write_status(&mut self, status: StatusCode) {
        match self.status {
            None => self.status = Some(status),
            Some(prev) if prev != status => {
                debug!(%prev, %status, "status already written, ignored");
            }
            Some(_) => {}
        }
    }

    /// Appends to the body, committing `200 OK` if nothing was written yet.
    pub(crate) fn write(&mut self, bytes: &[u8]) {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(bytes);
    }

    /// Commits `200 OK` with a body of `len` bytes read from `body` when the
    /// response is sent.
    pub(crate) fn stream(&mut self, body: ResponseBody, len: u64) {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.stream = Some((body, len));
    }

    /// Throws away everything a failed handler produced except the
    /// `preserve`d headers and writes `status` with `body`.
    pub(crate) fn replace(&mut self, status: StatusCode, body: &str, preserve: &[HeaderName]) {
        let mut headers = HeaderMap::new();
        for name in preserve {
            for value in self.headers.get_all(name) {
                headers.append(name.clone(), value.clone());
            }
        }
        *self = Self { headers, ..Self::default() };
        self.set_header("content-type", "text/plain; charset=utf-8", true);
        self.write_status(status);
        self.write(body.as_bytes());
    }

    /// Builds the wire response. `Content-Length` always reflects the bytes
    /// actually written, except where the status forbids a body.
    pub(crate) fn into_response(self) -> http::Response<ResponseBody> {
        let status = self.status();
        let mut headers = self.headers;
        let body = if status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
            headers.remove(CONTENT_LENGTH);
            full_body(Bytes::new())
        } else if let Some((stream, len)) = self.stream {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
            stream
        } else {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(self.body.len()));
            full_body(self.body.freeze())
        };

        let mut response = http::Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

// ── IntoBody ──────────────────────────────────────────────────────────────────

/// Conversion of a handler's return value into a response body.
///
/// `()` means the handler already wrote its response through the
/// [`Context`](crate::Context). Text and bytes become the full body with a
/// matching `Content-Length`.
///
/// ```rust
/// use tsuji::IntoBody;
///
/// assert_eq!("hi".into_body().as_deref(), Some(&b"hi"[..]));
/// assert_eq!(().into_body(), None);
/// ```
pub trait IntoBody {
    fn into_body(self) -> Option<Bytes>;
}

impl IntoBody for () {
    fn into_body(self) -> Option<Bytes> { None }
}

impl IntoBody for &'static str {
    fn into_body(self) -> Option<Bytes> { Some(Bytes::from_static(self.as_bytes())) }
}

impl IntoBody for String {
    fn into_body(self) -> Option<Bytes> { Some(Bytes::from(self)) }
}

impl IntoBody for Vec<u8> {
    fn into_body(self) -> Option<Bytes> { Some(Bytes::from(self)) }
}

impl IntoBody for Bytes {
    fn into_body(self) -> Option<Bytes> { Some(self) }
}

/// `None` leaves the response to whatever the handler wrote.
impl<T: IntoBody> IntoBody for Option<T> {
    fn into_body(self) -> Option<Bytes> { self.and_then(IntoBody::into_body) }
}
