//! Per-request context handed to handlers.
//!
//! A [`Context`] is built for one request and dropped when its response has
//! been produced. Every response operation writes straight into the
//! request's response sink; as with any HTTP writer, set headers before the
//! first status or body write.

use std::sync::Arc;

use http::StatusCode;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION, SET_COOKIE};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::error;

use crate::config::ServerConfig;
use crate::content_type::resolve_content_type;
use crate::cookie::{Cookie, CookieSigner};
use crate::request::Request;
use crate::response::ResponseSink;

/// Request parameter naming a JSONP callback for [`Context::json`].
const JSONP_PARAM: &str = "jsoncallback";

/// The request, its decoded parameters, the response being written and the
/// server settings, bundled for one handler invocation.
///
/// Declare it as a handler's first parameter to receive it:
///
/// ```rust,no_run
/// use tsuji::{Context, StatusCode};
///
/// async fn login(ctx: Context) {
///     match ctx.param("user") {
///         Some(user) => {
///             ctx.set_signed_cookie("user", user, 3600);
///             ctx.redirect(StatusCode::SEE_OTHER, "/");
///         }
///         None => ctx.abort(StatusCode::BAD_REQUEST, "missing user"),
///     }
/// }
/// ```
pub struct Context {
    request: Request,
    config: Arc<ServerConfig>,
    response: Arc<Mutex<ResponseSink>>,
}

impl Context {
    pub(crate) fn new(request: Request, config: Arc<ServerConfig>, response: Arc<Mutex<ResponseSink>>) -> Self {
        Self { request, config, response }
    }

    pub fn request(&self) -> &Request { &self.request }
    pub fn config(&self) -> &ServerConfig { &self.config }

    /// Shorthand for `ctx.request().param(key)`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.request.param(key)
    }

    // ── Body and status ──────────────────────────────────────────────────────

    /// Appends bytes to the response body, committing `200 OK` if no status
    /// was written yet.
    pub fn write_body(&self, bytes: impl AsRef<[u8]>) {
        self.response.lock().write(bytes.as_ref());
    }

    /// Writes `status` followed by `body`.
    pub fn abort(&self, status: StatusCode, body: &str) {
        let mut sink = self.response.lock();
        sink.write_status(status);
        sink.write(body.as_bytes());
    }

    /// Sets `Location` and writes `status` with a short explanatory body.
    pub fn redirect(&self, status: StatusCode, location: &str) {
        let mut sink = self.response.lock();
        sink.set_header(LOCATION.as_str(), location, true);
        sink.write_status(status);
        sink.write(format!("Redirecting to: {location}").as_bytes());
    }

    pub fn not_modified(&self) {
        self.response.lock().write_status(StatusCode::NOT_MODIFIED);
    }

    pub fn not_found(&self, message: &str) {
        self.abort(StatusCode::NOT_FOUND, message);
    }

    // ── Structured bodies ────────────────────────────────────────────────────

    /// Writes `value` as JSON.
    ///
    /// When the request carries a non-empty `jsoncallback` parameter the
    /// payload is wrapped as `callback(payload)` and sent as JavaScript.
    /// If `value` cannot be serialised the failure is logged and nothing is
    /// written.
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) {
        let payload = match serde_json::to_vec(value) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, path = self.request.path(), "json encoding failed");
                return;
            }
        };

        match self.param(JSONP_PARAM).filter(|cb| !cb.is_empty()) {
            None => self.send(payload, "application/json"),
            Some(callback) => {
                let mut wrapped = Vec::with_capacity(callback.len() + payload.len() + 2);
                wrapped.extend_from_slice(callback.as_bytes());
                wrapped.push(b'(');
                wrapped.extend_from_slice(&payload);
                wrapped.push(b')');
                self.send(wrapped, "application/javascript");
            }
        }
    }

    /// Writes `value` as XML, with the same failure behaviour as
    /// [`json`](Self::json).
    pub fn xml<T: Serialize + ?Sized>(&self, value: &T) {
        match quick_xml::se::to_string(value) {
            Ok(payload) => self.send(payload.into_bytes(), "application/xml"),
            Err(e) => error!(error = %e, path = self.request.path(), "xml encoding failed"),
        }
    }

    fn send(&self, body: Vec<u8>, content_type: &str) {
        let mut sink = self.response.lock();
        sink.set_header(CONTENT_LENGTH.as_str(), &body.len().to_string(), true);
        sink.set_header(CONTENT_TYPE.as_str(), content_type, true);
        sink.write(&body);
    }

    // ── Headers ──────────────────────────────────────────────────────────────

    /// Resolves `token` (a MIME type or a file extension) and, when the
    /// result is non-empty, sets it as the `Content-Type`. Returns the
    /// resolved type, empty for an unknown extension.
    pub fn content_type(&self, token: &str) -> String {
        let resolved = resolve_content_type(token);
        if !resolved.is_empty() {
            self.set_header(CONTENT_TYPE.as_str(), &resolved, true);
        }
        resolved
    }

    /// Sets a response header. `exclusive` replaces every existing value of
    /// `name`; otherwise the value is added alongside them.
    pub fn set_header(&self, name: &str, value: &str, exclusive: bool) {
        self.response.lock().set_header(name, value, exclusive);
    }

    // ── Cookies ──────────────────────────────────────────────────────────────

    /// Raw value of the request cookie called `name`.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.request.cookie(name)
    }

    /// Adds a `Set-Cookie` header scoped to the configured cookie domain.
    /// `max_age` is in seconds; `0` keeps the cookie as long as possible.
    pub fn set_cookie(&self, name: &str, value: &str, max_age: i64) {
        let cookie = Cookie::new(name, value, max_age, &self.config.cookie_domain);
        self.set_header(SET_COOKIE.as_str(), &cookie.to_string(), false);
    }

    /// Like [`set_cookie`](Self::set_cookie), but the value is signed with the
    /// configured cookie secret. Without a secret nothing is written.
    pub fn set_signed_cookie(&self, name: &str, value: &str, max_age: i64) {
        if self.config.cookie_secret.is_empty() {
            error!(cookie = name, "cookie_secret is not configured, signed cookie not set");
            return;
        }
        let signed = CookieSigner::new(self.config.cookie_secret.as_bytes()).sign(value);
        self.set_cookie(name, &signed, max_age);
    }

    /// Returns the value of a signed request cookie, or `None` if it is
    /// missing, malformed, tampered with or older than 31 days. Always `None`
    /// while no cookie secret is configured.
    pub fn signed_cookie(&self, name: &str) -> Option<String> {
        if self.config.cookie_secret.is_empty() {
            return None;
        }
        let raw = self.request.cookie(name)?;
        CookieSigner::new(self.config.cookie_secret.as_bytes()).verify(raw)
    }
}

#[cfg(test)]
impl Context {
    /// A context for a bare `GET /` with default settings.
    pub(crate) fn detached() -> Self {
        Self::for_test(
            Request::new(crate::Method::Get, "/".into(), None, http::HeaderMap::new(), bytes::Bytes::new()),
            ServerConfig::default(),
        )
        .0
    }

    pub(crate) fn for_test(request: Request, config: ServerConfig) -> (Self, Arc<Mutex<ResponseSink>>) {
        let sink = Arc::new(Mutex::new(ResponseSink::new()));
        (Self::new(request, Arc::new(config), Arc::clone(&sink)), sink)
    }
}
