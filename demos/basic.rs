//! A small blog: regex routes, JSON, signed-cookie login and static files.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:9999/
//!   curl http://localhost:9999/2024/hello-world
//!   curl 'http://localhost:9999/posts.json?jsoncallback=show'
//!   curl -i -X POST -d user=mika http://localhost:9999/login
//!   curl -b 'user=<value from Set-Cookie>' http://localhost:9999/me
//!   curl http://localhost:9999/boom

use serde::Serialize;
use tracing_subscriber::EnvFilter;
use tsuji::{Context, Dispatcher, Router, Server, ServerConfig, StatusCode};

#[derive(Serialize)]
struct Post {
    year: u16,
    slug: String,
}

#[tokio::main]
async fn main() -> Result<(), tsuji::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::var("TSUJI_CONFIG") {
        Ok(path) => ServerConfig::load(path)?,
        Err(_) => ServerConfig { cookie_secret: "demo-secret".into(), ..ServerConfig::default() },
    };

    let router = Router::new()
        .get("/", index)
        .get(r"/(\d{4})/([a-z0-9-]+)", show)
        .get(r"/posts\.json", list)
        .post("/login", login)
        .get("/me", me)
        .get("/boom", boom);

    Server::bind("0.0.0.0:9999").serve(Dispatcher::new(router, config)).await
}

async fn index() -> &'static str {
    "<h1>tsuji blog</h1>"
}

// Two capture groups, two string arguments, plus the context.
async fn show(ctx: Context, year: String, slug: String) {
    match year.parse() {
        Ok(year) => ctx.json(&Post { year, slug }),
        Err(_) => ctx.not_found("no such year"),
    }
}

// `?jsoncallback=fn` turns the answer into JSONP.
async fn list(ctx: Context) {
    let posts = [Post { year: 2024, slug: "hello-world".into() }];
    ctx.json(&posts);
}

async fn login(ctx: Context) {
    match ctx.param("user") {
        Some(user) if !user.is_empty() => {
            let user = user.to_owned();
            ctx.set_signed_cookie("user", &user, 3600);
            ctx.redirect(StatusCode::SEE_OTHER, "/me");
        }
        _ => ctx.abort(StatusCode::BAD_REQUEST, "missing user"),
    }
}

async fn me(ctx: Context) -> String {
    match ctx.signed_cookie("user") {
        Some(user) => format!("hello, {user}"),
        None => "not logged in".to_owned(),
    }
}

// Answers 500; the server keeps running.
async fn boom() -> String {
    let slugs: Vec<String> = Vec::new();
    slugs[0].clone()
}
