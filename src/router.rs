//! Ordered regex route table.
//!
//! Routes are tried in registration order. A route matches when its method
//! accepts the request method (a `GET` route also answers `HEAD`) and the
//! leftmost match of its pattern covers the entire request path. Patterns
//! are not anchored for you: `/a` does not match `/ab`, but neither does
//! `a` match `/a`. The first matching route wins; later ones are never
//! consulted.

use regex::Regex;
use tracing::{debug, error};

use crate::error::Error;
use crate::handler::{Handler, RouteHandler};
use crate::method::Method;

/// One registered route.
pub struct Route {
    pattern: String,
    regex: Regex,
    method: Method,
    handler: RouteHandler,
}

impl Route {
    /// The pattern source as registered.
    pub fn pattern(&self) -> &str { &self.pattern }
    pub fn method(&self) -> &Method { &self.method }

    pub(crate) fn handler(&self) -> &RouteHandler { &self.handler }

    /// Capture group values if the pattern covers all of `path`. Groups that
    /// did not participate in the match bind as empty strings.
    fn captures(&self, path: &str) -> Option<Vec<String>> {
        let caps = self.regex.captures(path)?;
        let whole = caps.get(0)?;
        if whole.start() != 0 || whole.end() != path.len() {
            return None;
        }
        Some(
            caps.iter()
                .skip(1)
                .map(|m| m.map_or_else(String::new, |m| m.as_str().to_owned()))
                .collect(),
        )
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("arity", &self.handler.arity())
            .finish()
    }
}

/// The application's route table.
///
/// Build it once at startup and hand it to [`Dispatcher::new`]; the
/// dispatcher owns it from then on, so the table cannot change while
/// requests are being served. The chaining methods return `self`:
///
/// ```rust
/// use tsuji::{Context, Router};
///
/// async fn home() -> &'static str { "home" }
/// async fn post(year: String, slug: String) -> String { format!("{year}/{slug}") }
/// async fn save(ctx: Context, id: String) { ctx.write_body(id) }
///
/// let router = Router::new()
///     .get("/", home)
///     .get(r"/(\d{4})/([a-z-]+)", post)
///     .post(r"/posts/(\d+)", save);
/// assert_eq!(router.len(), 3);
/// ```
///
/// A pattern that fails to compile, or whose capture group count differs
/// from the handler's string parameter count, is logged at error level and
/// skipped. Use [`Router::register`] to get that failure as an [`Error`].
///
/// [`Dispatcher::new`]: crate::Dispatcher::new
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T>(self, pattern: &str, handler: impl Handler<T>) -> Self {
        self.on(Method::Get, pattern, handler)
    }

    pub fn post<T>(self, pattern: &str, handler: impl Handler<T>) -> Self {
        self.on(Method::Post, pattern, handler)
    }

    pub fn put<T>(self, pattern: &str, handler: impl Handler<T>) -> Self {
        self.on(Method::Put, pattern, handler)
    }

    pub fn delete<T>(self, pattern: &str, handler: impl Handler<T>) -> Self {
        self.on(Method::Delete, pattern, handler)
    }

    /// Registers a route for any method, including nonstandard ones:
    /// `router.on("PURGE", "/cache", purge)`.
    pub fn on<T>(mut self, method: impl Into<Method>, pattern: &str, handler: impl Handler<T>) -> Self {
        let method = method.into();
        if let Err(e) = self.register(method.clone(), pattern, handler) {
            error!(%method, pattern, error = %e, "route not registered");
        }
        self
    }

    /// Compiles `pattern` and appends the route.
    ///
    /// # Errors
    ///
    /// [`Error::Pattern`] if the pattern is not a valid regular expression,
    /// [`Error::ArityMismatch`] if its capture groups do not line up with the
    /// handler's string parameters. The table is unchanged on error.
    pub fn register<T>(&mut self, method: impl Into<Method>, pattern: &str, handler: impl Handler<T>) -> Result<(), Error> {
        let regex = Regex::new(pattern).map_err(|source| Error::Pattern { pattern: pattern.to_owned(), source })?;
        let handler = handler.into_route_handler();

        let groups = regex.captures_len() - 1;
        if groups != handler.arity() {
            return Err(Error::ArityMismatch { pattern: pattern.to_owned(), groups, params: handler.arity() });
        }

        let method = method.into();
        debug!(%method, pattern, groups, context = handler.wants_context(), "route registered");
        self.routes.push(Route { pattern: pattern.to_owned(), regex, method, handler });
        Ok(())
    }

    pub fn len(&self) -> usize { self.routes.len() }
    pub fn is_empty(&self) -> bool { self.routes.is_empty() }

    /// Registered routes in match order.
    pub fn routes(&self) -> &[Route] { &self.routes }

    /// First route accepting `method` whose pattern covers `path`, with its
    /// capture values.
    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Option<(&Route, Vec<String>)> {
        self.routes
            .iter()
            .filter(|route| route.method.accepts(method))
            .find_map(|route| route.captures(path).map(|captures| (route, captures)))
    }
}
