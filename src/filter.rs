//! Filters and onion-ordered composition.
//!
//! A filter sees the request on the way in and the outcome on the way out,
//! around a single call to [`Next::run`]:
//!
//! ```text
//! compose([A, B], leaf)
//!
//!   A before ─┐
//!             B before ─┐
//!                       leaf
//!             B after  ─┘
//!   A after  ─┘
//! ```
//!
//! `Next` is consumed by `run`, so a filter can call the rest of the chain at
//! most once. Not calling it at all is a legitimate short-circuit (an auth
//! rejection, a cached answer). A failure coming back out of `next` may be
//! turned into a response by the filter; otherwise it keeps propagating
//! toward the exception funnel.

use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler, guarded};
use crate::request::Request;
use crate::response::IntoOutcome;

/// Middleware wrapping the rest of a handler chain.
///
/// Implemented for any `Fn(Request, Next) -> impl Future<Output = impl IntoOutcome>`;
/// implement it by hand for filters that carry configuration, such as
/// [`Trace`](crate::middleware::trace::Trace).
pub trait Filter: Send + Sync + 'static {
    fn filter(&self, req: Request, next: Next) -> BoxFuture;
}

/// A type-erased filter, shared by every route it applies to.
pub type BoxedFilter = Arc<dyn Filter>;

impl<F, Fut, R> Filter for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn filter(&self, req: Request, next: Next) -> BoxFuture {
        let fut = self(req, next);
        Box::pin(async move { fut.await.into_outcome() })
    }
}

struct Chain {
    filters: Vec<BoxedFilter>,
    leaf: BoxedHandler,
}

/// The remainder of a filter chain, bound for one exchange.
pub struct Next {
    chain: Arc<Chain>,
    index: usize,
}

impl Next {
    /// Hands the request to the next filter, or to the leaf handler.
    ///
    /// A panic further in, before or after its first suspension point, comes
    /// back as `Err(Error::Handler(message))` like any other failure.
    pub fn run(self, req: Request) -> BoxFuture {
        let Next { chain, index } = self;
        match chain.filters.get(index).cloned() {
            Some(filter) => guarded(move || filter.filter(req, Next { chain, index: index + 1 })),
            None => guarded(move || chain.leaf.call(req)),
        }
    }
}

struct Composed(Arc<Chain>);

impl ErasedHandler for Composed {
    fn call(&self, req: Request) -> BoxFuture {
        Next { chain: Arc::clone(&self.0), index: 0 }.run(req)
    }
}

/// Builds one handler where `filters[0]` wraps `filters[1]` wraps … wraps `leaf`.
pub fn compose(filters: Vec<BoxedFilter>, leaf: impl Handler) -> BoxedHandler {
    let leaf = leaf.into_boxed_handler();
    if filters.is_empty() {
        return leaf;
    }
    BoxedHandler::new(Composed(Arc::new(Chain { filters, leaf })))
}
