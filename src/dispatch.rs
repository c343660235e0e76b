//! Request dispatch: one request in, one response out.
//!
//! For every request the [`Dispatcher`]:
//!
//! 1. reads the body and decodes query and form parameters,
//! 2. stamps the `Server` and `Date` headers,
//! 3. serves a matching static file for `GET`/`HEAD` without consulting routes,
//! 4. otherwise runs the first matching route's handler,
//! 5. otherwise falls back to `index.html`/`index.htm` under the path, then 404.
//!
//! A handler that panics produces exactly one `500 Server Error` response and
//! one error log line carrying the panic message and a backtrace. The server
//! keeps serving.

use std::fmt::Display;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use http::StatusCode;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, DATE, SERVER};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;
use parking_lot::Mutex;
use percent_encoding::percent_decode_str;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::context::Context;
use crate::isolation::isolate;
use crate::method::Method;
use crate::request::Request;
use crate::response::{ResponseBody, ResponseSink};
use crate::router::{Route, Router};
use crate::static_files::StaticFiles;

/// Value of the `Server` header on every response.
pub const SERVER_NAME: &str = "tsuji";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const DEFAULT_CONTENT_TYPE: &str = "text/html; charset=utf-8";
const INDEX_FILES: [&str; 2] = ["index.html", "index.htm"];

/// Routes requests through a frozen [`Router`] under one [`ServerConfig`].
///
/// `Dispatcher` is independent of any listener, so it can be driven directly
/// with in-memory requests:
///
/// ```rust
/// use bytes::Bytes;
/// use http_body_util::Full;
/// use tsuji::{Dispatcher, Router, ServerConfig, StatusCode};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let router = Router::new().get(r"/hello/(\w+)", |name: String| async move { format!("hi {name}") });
/// let dispatcher = Dispatcher::new(router, ServerConfig::default());
///
/// let req = http::Request::get("/hello/bo").body(Full::new(Bytes::new())).unwrap();
/// let res = dispatcher.dispatch(req).await;
/// assert_eq!(res.status(), StatusCode::OK);
/// assert_eq!(res.headers()["server"], "tsuji");
/// # });
/// ```
pub struct Dispatcher {
    router: Router,
    config: Arc<ServerConfig>,
    statics: StaticFiles,
}

impl Dispatcher {
    pub fn new(router: Router, config: ServerConfig) -> Self {
        let statics = StaticFiles::new(config.static_dirs());
        Self { router, config: Arc::new(config), statics }
    }

    pub fn router(&self) -> &Router { &self.router }
    pub fn config(&self) -> &ServerConfig { &self.config }

    /// Produces the response for `req`. Never fails: every outcome,
    /// including a panicking handler, is an HTTP response.
    pub async fn dispatch<B>(&self, req: http::Request<B>) -> http::Response<ResponseBody>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        let method = Method::from(&parts.method);
        let path = percent_decode_str(parts.uri.path()).decode_utf8_lossy().into_owned();

        let mut sink = ResponseSink::new();
        sink.set_header(SERVER.as_str(), SERVER_NAME, true);
        sink.set_header(DATE.as_str(), &httpdate::fmt_http_date(SystemTime::now()), true);

        let body = match Limited::new(body, self.config.max_body_bytes).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.is::<LengthLimitError>() => {
                warn!(%method, path, limit = self.config.max_body_bytes, "request body too large");
                sink.set_header(CONTENT_TYPE.as_str(), "text/plain; charset=utf-8", true);
                sink.write_status(StatusCode::PAYLOAD_TOO_LARGE);
                sink.write(b"Request body too large");
                return sink.into_response();
            }
            Err(e) => {
                warn!(error = %e, "failed to read request body");
                Bytes::new()
            }
        };

        let request = Request::new(method, path, parts.uri.query(), parts.headers, body);

        info!(method = %request.method(), path = request.path(), "request");
        if !request.params().is_empty() {
            debug!(params = ?request.params(), "request params");
        }

        if request.method().is_read() && self.statics.serve(request.path(), request.headers(), &mut sink).await {
            return sink.into_response();
        }

        sink.set_header(CONTENT_TYPE.as_str(), DEFAULT_CONTENT_TYPE, true);

        match self.router.lookup(request.method(), request.path()) {
            Some((route, captures)) => self.invoke(route, captures, request, sink).await,
            None => self.fallback(request, sink).await,
        }
    }

    async fn invoke(
        &self,
        route: &Route,
        captures: Vec<String>,
        request: Request,
        sink: ResponseSink,
    ) -> http::Response<ResponseBody> {
        let shared = Arc::new(Mutex::new(sink));
        let ctx = Context::new(request, Arc::clone(&self.config), Arc::clone(&shared));
        let future = route.handler().call(ctx, captures);

        let outcome = if self.config.recover_panic {
            isolate(future).await
        } else {
            Ok(future.await)
        };

        let mut sink = std::mem::take(&mut *shared.lock());
        match outcome {
            Ok(None) => {}
            Ok(Some(body)) => {
                sink.set_header(CONTENT_LENGTH.as_str(), &body.len().to_string(), true);
                sink.write(&body);
            }
            Err(crash) => {
                error!(
                    method = %route.method(),
                    route = route.pattern(),
                    panic = %crash.message,
                    backtrace = %crash.backtrace,
                    "handler panicked"
                );
                sink.replace(StatusCode::INTERNAL_SERVER_ERROR, "Server Error", &[SERVER, DATE]);
            }
        }
        sink.into_response()
    }

    /// No route matched: try an index file under the path, then 404.
    async fn fallback(&self, request: Request, mut sink: ResponseSink) -> http::Response<ResponseBody> {
        if request.method().is_read() {
            let dir = request.path().trim_end_matches('/');
            for index in INDEX_FILES {
                let candidate = format!("{dir}/{index}");
                if self.statics.serve(&candidate, request.headers(), &mut sink).await {
                    return sink.into_response();
                }
            }
        }
        sink.write_status(StatusCode::NOT_FOUND);
        sink.write(b"Page not found");
        sink.into_response()
    }
}
