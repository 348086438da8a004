//! A leaf handler inside a pipeline with a filter and an exception funnel.
//!
//! Run with:
//!   cargo run --example web_handler
//!
//! Try:
//!   curl -i http://localhost:8080/
//!   curl -i http://localhost:8080/exception/synchronous
//!   curl -i http://localhost:8080/exception/asynchronous

use std::future::Future;

use clap::Parser;
use ferrule::{Error, Next, Outcome, Pipeline, Request, RequestHead, Response, Server, ServerConfig, Status};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const MESSAGE: &str =
    "Hello World, from a web handler. Try 'exception/synchronous' and 'exception/asynchronous'";

#[derive(Parser, Debug)]
#[command(about = "Serve a filtered handler with an exception funnel")]
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
                .unwrap_or_else(|_| "web_handler=info,ferrule=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pipeline = Pipeline::builder(hello)
        .filter(inbound_outbound)
        .funnel(exception_funnel)
        .build();

    let args = Args::parse();
    Server::new(ServerConfig::new(args.host, args.port)).serve(pipeline).await?;

    info!("server closed");
    Ok(())
}

// Not an `async fn`: the synchronous panic happens before any future exists.
fn hello(req: Request) -> impl Future<Output = Result<Response, Error>> {
    info!(method = %req.method(), path = req.path(), accept = ?req.header("accept"), "request");

    if req.path().ends_with("exception/synchronous") {
        panic!("Synchronous exception");
    }

    respond(req)
}

async fn respond(req: Request) -> Result<Response, Error> {
    let mut res = Response::status(Status::OK);
    res.set_header("content-type", "text/plain")?
        .set_header("content-length", &MESSAGE.len().to_string())?;

    if req.path().ends_with("exception/asynchronous") {
        tokio::task::yield_now().await;
        return Err(Error::handler("Asynchronous exception"));
    }

    res.write_with(MESSAGE)?;
    Ok(res)
}

async fn inbound_outbound(req: Request, next: Next) -> Outcome {
    info!("filter inbound");
    let outcome = next.run(req).await;
    let committed = outcome.as_ref().is_ok_and(Response::is_committed);
    info!(committed, "filter outbound");
    outcome
}

async fn exception_funnel(_head: RequestHead, err: Error) -> Result<Response, Error> {
    warn!(error = %err, "handling exception");
    let message = format!("An exception occurred: {err}");
    Response::builder()
        .status(Status::INTERNAL_SERVER_ERROR)
        .header("content-type", "text/plain")
        .header("content-length", &message.len().to_string())
        .header("my-header", "My-Value")
        .text(message)
}
