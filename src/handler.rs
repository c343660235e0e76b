//! Handler trait and type erasure.
//!
//! # Handler shapes
//!
//! A route handler is any `async fn` (or closure returning a future) of one
//! of three shapes:
//!
//! ```text
//! async fn home() -> impl IntoBody                              ← bare
//! async fn post(year: String, slug: String) -> impl IntoBody    ← string args
//! async fn edit(ctx: Context, id: String) -> impl IntoBody      ← context + string args
//! ```
//!
//! String arguments are bound, in order, from the route pattern's capture
//! groups. The shape is read off the function's Rust signature when the
//! route is registered and stored as a [`RouteHandler`] variant, so the
//! dispatcher never inspects a handler at request time.
//!
//! # How handlers are stored
//!
//! The router keeps handlers of different concrete types in one `Vec`, so
//! each is erased behind an `Arc<dyn Fn(..) -> BoxFuture>`:
//!
//! ```text
//! async fn post(year: String, slug: String) -> String { … }
//!        ↓ router.get(r"/(\d+)/(\w+)", post)
//! post.into_route_handler()                 ← Handler<(String, String)> impl
//!        ↓
//! RouteHandler::Args { arity: 2, call }     ← call: Arc<dyn Fn(Vec<String>) -> BoxFuture>
//!        ↓ at request time
//! call(captures)                            ← one vtable dispatch, one Arc clone
//! ```
//!
//! The handler function itself runs inside the returned future, so a panic
//! anywhere in it surfaces while the dispatcher polls that future.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;

use crate::context::Context;
use crate::response::IntoBody;

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased handler future resolving to the handler's
/// body, if it returned one.
pub type BoxFuture = Pin<Box<dyn Future<Output = Option<Bytes>> + Send + 'static>>;

pub type BareFn = dyn Fn() -> BoxFuture + Send + Sync + 'static;
pub type ArgsFn = dyn Fn(Vec<String>) -> BoxFuture + Send + Sync + 'static;
pub type ContextFn = dyn Fn(Context, Vec<String>) -> BoxFuture + Send + Sync + 'static;

/// A registered handler, tagged with the shape it was declared with.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_route_handler` method.
#[doc(hidden)]
#[derive(Clone)]
pub enum RouteHandler {
    /// Takes nothing.
    Bare(Arc<BareFn>),
    /// Takes `arity` captured strings.
    Args { arity: usize, call: Arc<ArgsFn> },
    /// Takes the request context, then `arity` captured strings.
    WithContext { arity: usize, call: Arc<ContextFn> },
}

impl RouteHandler {
    /// Number of captured strings the handler expects.
    pub(crate) fn arity(&self) -> usize {
        match self {
            Self::Bare(_) => 0,
            Self::Args { arity, .. } | Self::WithContext { arity, .. } => *arity,
        }
    }

    pub(crate) fn wants_context(&self) -> bool {
        matches!(self, Self::WithContext { .. })
    }

    /// Starts the handler. `ctx` is passed on only to context handlers and
    /// dropped otherwise.
    pub(crate) fn call(&self, ctx: Context, captures: Vec<String>) -> BoxFuture {
        match self {
            Self::Bare(call) => call(),
            Self::Args { call, .. } => call(captures),
            Self::WithContext { call, .. } => call(ctx, captures),
        }
    }
}

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. `T` is a marker naming the handler's
/// argument list (`()`, `(String,)`, `(Context, String)`, ...), which lets
/// one function type satisfy exactly one shape. Up to six string arguments
/// are supported, with or without a leading [`Context`].
///
/// The trait is **sealed**: only the blanket impls below can satisfy it.
pub trait Handler<T>: private::Sealed<T> + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_route_handler(self) -> RouteHandler;
}

mod private {
    pub trait Sealed<T> {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut, R> private::Sealed<()> for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoBody,
{
}

impl<F, Fut, R> Handler<()> for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoBody,
{
    fn into_route_handler(self) -> RouteHandler {
        let f = Arc::new(self);
        RouteHandler::Bare(Arc::new(move || -> BoxFuture {
            let f = Arc::clone(&f);
            Box::pin(async move { (*f)().await.into_body() })
        }))
    }
}

macro_rules! args_handler {
    (@string $arg:ident) => { String };
    ($arity:literal; $($arg:ident),+) => {
        impl<F, Fut, R> private::Sealed<($(args_handler!(@string $arg),)+)> for F
        where
            F: Fn($(args_handler!(@string $arg)),+) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = R> + Send + 'static,
            R: IntoBody,
        {
        }

        impl<F, Fut, R> Handler<($(args_handler!(@string $arg),)+)> for F
        where
            F: Fn($(args_handler!(@string $arg)),+) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = R> + Send + 'static,
            R: IntoBody,
        {
            fn into_route_handler(self) -> RouteHandler {
                let f = Arc::new(self);
                RouteHandler::Args {
                    arity: $arity,
                    call: Arc::new(move |captures: Vec<String>| -> BoxFuture {
                        let f = Arc::clone(&f);
                        Box::pin(async move {
                            let mut captures = captures.into_iter();
                            $(let $arg = captures.next().unwrap_or_default();)+
                            (*f)($($arg),+).await.into_body()
                        })
                    }),
                }
            }
        }
    };
}

macro_rules! context_handler {
    (@string $arg:ident) => { String };
    ($arity:literal; $($arg:ident),*) => {
        impl<F, Fut, R> private::Sealed<(Context, $(context_handler!(@string $arg),)*)> for F
        where
            F: Fn(Context, $(context_handler!(@string $arg)),*) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = R> + Send + 'static,
            R: IntoBody,
        {
        }

        impl<F, Fut, R> Handler<(Context, $(context_handler!(@string $arg),)*)> for F
        where
            F: Fn(Context, $(context_handler!(@string $arg)),*) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = R> + Send + 'static,
            R: IntoBody,
        {
            #[allow(unused_mut, unused_variables)]
            fn into_route_handler(self) -> RouteHandler {
                let f = Arc::new(self);
                RouteHandler::WithContext {
                    arity: $arity,
                    call: Arc::new(move |ctx: Context, captures: Vec<String>| -> BoxFuture {
                        let f = Arc::clone(&f);
                        Box::pin(async move {
                            let mut captures = captures.into_iter();
                            $(let $arg = captures.next().unwrap_or_default();)*
                            (*f)(ctx, $($arg),*).await.into_body()
                        })
                    }),
                }
            }
        }
    };
}

args_handler!(1; a1);
args_handler!(2; a1, a2);
args_handler!(3; a1, a2, a3);
args_handler!(4; a1, a2, a3, a4);
args_handler!(5; a1, a2, a3, a4, a5);
args_handler!(6; a1, a2, a3, a4, a5, a6);

context_handler!(0;);
context_handler!(1; a1);
context_handler!(2; a1, a2);
context_handler!(3; a1, a2, a3);
context_handler!(4; a1, a2, a3, a4);
context_handler!(5; a1, a2, a3, a4, a5);
context_handler!(6; a1, a2, a3, a4, a5, a6);

#[cfg(test)]
mod tests {
    use super::*;

    fn classify<T>(h: impl Handler<T>) -> RouteHandler {
        h.into_route_handler()
    }

    async fn bare() -> &'static str { "bare" }
    async fn two(a: String, b: String) -> String { format!("{a}+{b}") }
    async fn with_ctx(_ctx: Context, id: String) -> String { id }
    async fn ctx_only(_ctx: Context) {}

    #[test]
    fn shapes_are_classified_from_signatures() {
        let h = classify(bare);
        assert!(matches!(h, RouteHandler::Bare(_)));
        assert_eq!(h.arity(), 0);
        assert!(!h.wants_context());

        let h = classify(two);
        assert!(matches!(h, RouteHandler::Args { arity: 2, .. }));
        assert!(!h.wants_context());

        let h = classify(with_ctx);
        assert_eq!(h.arity(), 1);
        assert!(h.wants_context());

        let h = classify(ctx_only);
        assert_eq!(h.arity(), 0);
        assert!(h.wants_context());
    }

    #[test]
    fn closures_are_handlers() {
        let h = classify(|a: String| async move { a });
        assert_eq!(h.arity(), 1);
        assert!(!h.wants_context());
    }

    #[tokio::test]
    async fn captures_bind_in_order() {
        let h = classify(two);
        let body = h.call(Context::detached(), vec!["x".into(), "y".into()]).await;
        assert_eq!(body, Some(Bytes::from("x+y")));
    }

    #[tokio::test]
    async fn missing_captures_bind_empty() {
        let h = classify(two);
        let body = h.call(Context::detached(), vec!["x".into()]).await;
        assert_eq!(body, Some(Bytes::from("x+")));
    }

    #[tokio::test]
    async fn unit_return_has_no_body() {
        let h = classify(ctx_only);
        assert_eq!(h.call(Context::detached(), Vec::new()).await, None);
    }
}
