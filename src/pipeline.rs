//! The composed pipeline and its exception funnel.
//!
//! ```text
//! Pipeline::handle(req)
//!   └─ funnel guard            ← catches errors and panics, exactly once
//!        └─ pipeline filters   ← PipelineBuilder::filter, onion order
//!             └─ handler       ← a Router, a plain fn, a composed chain
//! ```
//!
//! [`Pipeline::handle`] never fails. A handler or filter failure, whether
//! returned as an `Err` or raised as a panic, before or after the first
//! suspension point, reaches the funnel through the same path. If the funnel
//! itself fails the exchange ends with a bodyless `500`.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::error::Error;
use crate::filter::{BoxedFilter, Filter, compose};
use crate::handler::{BoxFuture, BoxedHandler, Handler, guarded};
use crate::request::{Request, RequestHead};
use crate::response::{IntoOutcome, Response};
use crate::router::Router;
use crate::status::Status;

/// Maps a failure to the response the client sees.
///
/// Implemented for any `Fn(RequestHead, Error) -> impl Future<Output = impl IntoOutcome>`.
/// Returning an `Err` (or panicking) counts as a funnel failure.
pub trait Funnel: Send + Sync + 'static {
    fn recover(&self, head: RequestHead, err: Error) -> BoxFuture;
}

impl<F, Fut, R> Funnel for F
where
    F: Fn(RequestHead, Error) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn recover(&self, head: RequestHead, err: Error) -> BoxFuture {
        let fut = self(head, err);
        Box::pin(async move { fut.await.into_outcome() })
    }
}

/// A fully composed request pipeline, built once and shared read-only.
pub struct Pipeline {
    handler: BoxedHandler,
    funnel: Option<Arc<dyn Funnel>>,
}

impl Pipeline {
    /// A pipeline with no extra filters and no funnel: unmatched routes
    /// answer `404`, every other failure a bodyless `500`.
    pub fn new(handler: impl Handler) -> Self {
        Self { handler: handler.into_boxed_handler(), funnel: None }
    }

    pub fn builder(handler: impl Handler) -> PipelineBuilder {
        PipelineBuilder { handler: handler.into_boxed_handler(), filters: Vec::new(), funnel: None }
    }

    /// Runs one exchange to its single response.
    pub async fn handle(&self, req: Request) -> Response {
        let head = req.head().clone();
        let handler = &self.handler;
        match guarded(move || handler.call(req)).await {
            Ok(res) => res,
            Err(err) => self.recover(head, err).await,
        }
    }

    async fn recover(&self, head: RequestHead, err: Error) -> Response {
        let Some(funnel) = &self.funnel else {
            match err {
                Error::NoRouteMatched { .. } => debug!(error = %err, "no route matched"),
                _ => warn!(method = %head.method(), path = head.path(), error = %err, "unhandled failure"),
            }
            return Response::status(err.status());
        };

        warn!(method = %head.method(), path = head.path(), error = %err, "handing failure to exception funnel");
        let funnel = Arc::clone(funnel);
        match guarded(move || funnel.recover(head, err)).await {
            Ok(res) => res,
            Err(failure) => {
                error!(error = %Error::Funnel(Box::new(failure)), "falling back to bare 500");
                Response::status(Status::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

impl From<Router> for Pipeline {
    fn from(router: Router) -> Self {
        Self::new(router)
    }
}

/// Builder for a [`Pipeline`] with filters and an exception funnel.
///
/// ```rust
/// use ferrule::{Error, Next, Pipeline, Request, RequestHead, Response, Status};
///
/// let pipeline = Pipeline::builder(|_req: Request| async { "hello" })
///     .filter(|req: Request, next: Next| next.run(req))
///     .funnel(|_head: RequestHead, err: Error| async move {
///         Response::builder()
///             .status(Status::INTERNAL_SERVER_ERROR)
///             .text(format!("An exception occurred: {err}"))
///     })
///     .build();
/// ```
pub struct PipelineBuilder {
    handler: BoxedHandler,
    filters: Vec<BoxedFilter>,
    funnel: Option<Arc<dyn Funnel>>,
}

impl PipelineBuilder {
    /// Adds a filter around the handler. The first filter added is the
    /// outermost.
    pub fn filter(mut self, filter: impl Filter) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Installs the exception funnel.
    ///
    /// # Panics
    ///
    /// Panics if a funnel is already installed; a pipeline has exactly one.
    pub fn funnel(mut self, funnel: impl Funnel) -> Self {
        assert!(self.funnel.is_none(), "an exception funnel is already installed");
        self.funnel = Some(Arc::new(funnel));
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline { handler: compose(self.filters, self.handler), funnel: self.funnel }
    }
}
