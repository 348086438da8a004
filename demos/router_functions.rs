//! Routers built independently, each with its own filters, then merged.
//!
//! Run with:
//!   cargo run --example router_functions
//!
//! Try:
//!   curl http://localhost:8080/examples
//!   curl http://localhost:8080/examples/42
//!   curl http://localhost:8080/suspend/7     # ~2 s: the filter and the handler both wait
//!   curl http://localhost:8080/suspend2/7

use std::time::Duration;

use clap::Parser;
use ferrule::{Error, Next, Outcome, Request, Response, Router, Server, ServerConfig, middleware};
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(about = "Serve nested, merged routers")]
struct Args {
    #[arg(long, env = "HOST", default_value = "localhost")]
    host: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "router_functions=info,ferrule=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let examples = Router::new().nest(
        "/examples",
        Router::new()
            .get("/", examples_root)
            .get("/{id}", example_by_id),
    );

    let suspend = Router::new().nest(
        "/suspend",
        Router::new()
            .get("/", suspend_root)
            .get("/{id}", suspend_by_id)
            .filter(slow_log),
    );

    let suspend2 = Router::new().nest(
        "/suspend2",
        Router::new()
            .get("/", suspend_root)
            .get("/{id}", suspend_by_id)
            .filter(middleware::trace()),
    );

    let app = examples.merge(suspend).merge(suspend2);

    let args = Args::parse();
    Server::new(ServerConfig::new(args.host, args.port)).serve(app).await?;

    info!("server closed");
    Ok(())
}

async fn examples_root(req: Request) -> Response {
    info!(method = %req.method(), path = req.path(), "request received");
    Response::text("Hello world, from /examples")
}

async fn example_by_id(req: Request) -> Response {
    let id = req.param("id").unwrap_or_default();
    info!(method = %req.method(), path = req.path(), id, "request received");
    Response::text(format!("Hello world, from /examples/{{id}}, with id={id}"))
}

async fn suspend_root(req: Request) -> Response {
    info!(method = %req.method(), path = req.path(), "request received");
    sleep(Duration::from_secs(1)).await;
    Response::text("Hello world, from /suspend")
}

async fn suspend_by_id(req: Request) -> Response {
    let id = req.param("id").unwrap_or_default().to_owned();
    info!(method = %req.method(), path = req.path(), id = %id, "request received");
    sleep(Duration::from_secs(1)).await;
    Response::text(format!("Hello world, from /suspend/{{id}}, with id={id}"))
}

/// Waits before handing the request on, then logs what came back.
async fn slow_log(req: Request, next: Next) -> Outcome {
    info!(method = %req.method(), path = req.path(), "filter inbound");
    sleep(Duration::from_secs(1)).await;
    let res = next.run(req).await?;
    info!(status = %res.status_code(), "filter outbound");
    Ok(res)
}
