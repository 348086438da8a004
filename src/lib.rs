//! # ferrule
//!
//! A composable async request pipeline served over hyper.
//!
//! An application is assembled once from three kinds of parts and then
//! shared read-only by every exchange:
//!
//! - **Handlers** turn a [`Request`] into a [`Response`], asynchronously.
//! - **Filters** wrap the rest of the chain in onion order: the first filter
//!   added sees the request first and the response last.
//! - **Routers** dispatch on method and path, in declaration order, with
//!   nested routers carrying their own filters.
//!
//! A [`Pipeline`] puts a single exception funnel around all of it. Whatever
//! goes wrong inside (an `Err` return, a panic, before or after the first
//! `.await`) is mapped to a response in exactly one place.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use ferrule::{Error, Pipeline, Request, RequestHead, Response, Router, Server, ServerConfig, Status};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let app = Router::new()
//!         .get("/", |_req: Request| async { "Hello world" })
//!         .nest("/users", Router::new().get("/{id}", get_user))
//!         .filter(ferrule::middleware::trace());
//!
//!     let pipeline = Pipeline::builder(app)
//!         .funnel(|_head: RequestHead, err: Error| async move {
//!             Response::builder()
//!                 .status(err.status())
//!                 .text(format!("An exception occurred: {err}"))
//!         })
//!         .build();
//!
//!     Server::new(ServerConfig::new("0.0.0.0", 3000)).serve(pipeline).await
//! }
//!
//! async fn get_user(req: Request) -> Result<Response, Error> {
//!     match req.param("id") {
//!         Some(id) => Ok(Response::text(format!("user {id}"))),
//!         None => Ok(Response::status(Status::BAD_REQUEST)),
//!     }
//! }
//! ```

mod body;
mod config;
mod error;
mod filter;
mod handler;
mod method;
mod path;
mod pipeline;
mod request;
mod response;
mod router;
mod server;
mod status;

pub mod middleware;

pub use body::{Body, BodyWriter};
pub use config::ServerConfig;
pub use error::{BoxError, Error};
pub use filter::{BoxedFilter, Filter, Next, compose};
pub use handler::{BoxFuture, BoxedHandler, Handler};
pub use method::Method;
pub use path::PathPattern;
pub use pipeline::{Funnel, Pipeline, PipelineBuilder};
pub use request::{PathParams, QueryParams, Request, RequestBuilder, RequestHead};
pub use response::{IntoOutcome, IntoResponse, Outcome, Response, ResponseBuilder};
pub use router::{RouteTable, Router};
pub use server::{RunningServer, Server, shutdown_signal};
pub use status::{Status, StatusClass};
