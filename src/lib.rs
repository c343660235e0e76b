//! # tsuji
//!
//! A small HTTP dispatcher for hyper: an ordered table of regular-expression
//! routes, plain async functions as handlers, signed cookies and a static
//! file fallback.
//!
//! ## How a request is answered
//!
//! - A `GET`/`HEAD` request naming a file in a static directory is served
//!   straight from disk. Routes are not consulted.
//! - Otherwise routes are tried in registration order. The first route whose
//!   method accepts the request and whose pattern matches the **whole** path
//!   runs its handler, with the pattern's capture groups as string arguments.
//! - Otherwise `index.html` or `index.htm` under the path is served, or
//!   `404 Page not found`.
//!
//! A handler that panics is contained: the client gets `500 Server Error`,
//! the log gets the panic message and a backtrace, and the server carries
//! on. Set [`ServerConfig::recover_panic`] to `false` to let panics through.
//!
//! ## Handlers
//!
//! Three shapes are accepted, checked against the pattern when the route is
//! registered:
//!
//! ```text
//! async fn index() -> impl IntoBody
//! async fn show(year: String, slug: String) -> impl IntoBody
//! async fn save(ctx: Context, id: String) -> impl IntoBody
//! ```
//!
//! A returned string or byte buffer becomes the body. Returning `()` leaves
//! the response to whatever was written through the [`Context`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use serde::Serialize;
//! use tsuji::{Context, Dispatcher, Router, Server, ServerConfig, StatusCode};
//!
//! #[derive(Serialize)]
//! struct Post { year: u16, slug: String }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tsuji::Error> {
//!     let config = ServerConfig::load("tsuji.toml")?;
//!     let router = Router::new()
//!         .get("/", index)
//!         .get(r"/(\d{4})/([a-z0-9-]+)", show)
//!         .post("/login", login);
//!
//!     Server::bind("0.0.0.0:9999").serve(Dispatcher::new(router, config)).await
//! }
//!
//! async fn index() -> &'static str {
//!     "<h1>hello</h1>"
//! }
//!
//! async fn show(ctx: Context, year: String, slug: String) {
//!     match year.parse() {
//!         Ok(year) => ctx.json(&Post { year, slug }),
//!         Err(_) => ctx.not_found("no such year"),
//!     }
//! }
//!
//! async fn login(ctx: Context) {
//!     let user = ctx.param("user").unwrap_or("guest").to_owned();
//!     ctx.set_signed_cookie("user", &user, 0);
//!     ctx.redirect(StatusCode::SEE_OTHER, "/");
//! }
//! ```

mod config;
mod content_type;
mod context;
mod cookie;
mod dispatch;
mod error;
mod handler;
mod isolation;
mod method;
mod request;
mod response;
mod router;
mod server;
mod static_files;

pub use config::{DEFAULT_MAX_BODY_BYTES, ServerConfig};
pub use content_type::resolve_content_type;
pub use context::Context;
pub use cookie::{Cookie, CookieSigner, SIGNED_COOKIE_MAX_AGE};
pub use dispatch::{Dispatcher, SERVER_NAME};
pub use error::Error;
pub use handler::Handler;
pub use http::StatusCode;
pub use method::Method;
pub use request::Request;
pub use response::{IntoBody, ResponseBody};
pub use router::{Route, Router};
pub use server::Server;
