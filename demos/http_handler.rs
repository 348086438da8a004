//! The lowest-level handler: one function, no routing, no filters.
//!
//! Run with:
//!   cargo run --example http_handler -- --port 8080
//!
//! Try:
//!   curl -i http://localhost:8080/anything

use clap::Parser;
use ferrule::{Error, Pipeline, Request, Response, Server, ServerConfig, Status};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const MESSAGE: &str = "Hello World, from an HttpHandler";

#[derive(Parser, Debug)]
#[command(about = "Serve a single handler for every request")]
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
                .unwrap_or_else(|_| "http_handler=info,ferrule=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    Server::new(ServerConfig::new(args.host, args.port))
        .serve(Pipeline::new(hello))
        .await?;

    info!("server closed");
    Ok(())
}

async fn hello(req: Request) -> Result<Response, Error> {
    info!(method = %req.method(), path = req.path(), accept = ?req.header("accept"), "request");

    let mut res = Response::status(Status::OK);
    res.set_header("content-type", "text/plain")?
        .set_header("content-length", &MESSAGE.len().to_string())?;
    res.write_with(MESSAGE)?;
    Ok(res)
}
