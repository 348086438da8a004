//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! Routers, filter chains and pipelines hold handlers of *different* types
//! side by side, so every handler is erased behind one trait object and
//! shared through an `Arc`:
//!
//! ```text
//! async fn hello(req: Request) -> Response { … }   ← user writes this
//!        ↓ router.get("/", hello)
//! hello.into_boxed_handler()                       ← Handler blanket impl
//!        ↓
//! BoxedHandler(Arc::new(FnHandler(hello)))         ← cloneable, shareable
//!        ↓
//! handler.call(req)  at request time               ← one vtable dispatch
//!        ↓
//! Box::pin(async { hello(req).await.into_outcome() })  ← BoxFuture
//! ```
//!
//! Plain functions, closures returning futures, routers and already-composed
//! chains all end up as the same [`BoxedHandler`], so any of them can be
//! wrapped in filters, nested into a router or handed to a pipeline.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;

use crate::error::Error;
use crate::request::Request;
use crate::response::{IntoOutcome, Outcome};

/// A heap-allocated, type-erased future resolving to an [`Outcome`].
///
/// `Send + 'static` lets tokio move it across worker threads.
pub type BoxFuture = Pin<Box<dyn Future<Output = Outcome> + Send + 'static>>;

/// Internal dispatch interface.
pub(crate) trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
///
/// Cloning is one atomic increment.
#[derive(Clone)]
pub struct BoxedHandler(Arc<dyn ErasedHandler + Send + Sync + 'static>);

impl BoxedHandler {
    pub(crate) fn new(handler: impl ErasedHandler + Send + Sync + 'static) -> Self {
        Self(Arc::new(handler))
    }

    /// Runs the handler for one exchange.
    ///
    /// Whatever the handler does before its first `.await` runs right here,
    /// synchronously; the rest runs when the returned future is polled.
    pub fn call(&self, req: Request) -> BoxFuture {
        self.0.call(req)
    }
}

impl fmt::Debug for BoxedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BoxedHandler").finish_non_exhaustive()
    }
}

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid handler.
///
/// You never implement this yourself. It is satisfied by:
///
/// - any `async fn name(req: Request) -> impl IntoOutcome`, or a closure
///   returning such a future;
/// - a [`Router`](crate::Router), which resolves and delegates;
/// - a [`BoxedHandler`], e.g. the result of [`compose`](crate::compose).
///
/// The trait is **sealed**: only the impls in this crate can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

pub(crate) mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        BoxedHandler::new(FnHandler(self))
    }
}

impl private::Sealed for BoxedHandler {}

impl Handler for BoxedHandler {
    fn into_boxed_handler(self) -> BoxedHandler {
        self
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Bridges a concrete handler function to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_outcome() })
    }
}

// ── Panic capture ─────────────────────────────────────────────────────────────

/// Runs `call` and polls its future, turning a panic at either stage into a
/// handler failure.
///
/// Every hop of a filter chain goes through here, so a panicking handler
/// looks like an ordinary `Err` to the filters around it.
pub(crate) fn guarded(call: impl FnOnce() -> BoxFuture) -> BoxFuture {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(fut) => Box::pin(
            AssertUnwindSafe(fut)
                .catch_unwind()
                .map(|polled| polled.unwrap_or_else(|payload| Err(panic_error(payload)))),
        ),
        Err(payload) => {
            let err = panic_error(payload);
            Box::pin(async move { Err(err) })
        }
    }
}

fn panic_error(payload: Box<dyn Any + Send>) -> Error {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_owned()
    };
    Error::handler(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Response;
    use crate::status::Status;

    async fn hello(_req: Request) -> Response {
        Response::text("hello")
    }

    async fn missing(_req: Request) -> Status {
        Status::NOT_FOUND
    }

    async fn broken(_req: Request) -> Result<Response, Error> {
        Err(Error::handler("broken"))
    }

    async fn panics_after_yield(_req: Request) -> Response {
        tokio::task::yield_now().await;
        panic!("later")
    }

    #[tokio::test]
    async fn adapts_every_return_shape() {
        let ok = hello.into_boxed_handler().call(Request::get("/")).await.unwrap();
        assert_eq!(ok.status_code(), Status::OK);

        let nf = missing.into_boxed_handler().call(Request::get("/")).await.unwrap();
        assert_eq!(nf.status_code(), Status::NOT_FOUND);

        let err = broken.into_boxed_handler().call(Request::get("/")).await.unwrap_err();
        assert_eq!(err.to_string(), "broken");
    }

    #[tokio::test]
    async fn closures_capture_state() {
        let greeting = String::from("hi there");
        let handler = move |_req: Request| {
            let greeting = greeting.clone();
            async move { greeting }
        };
        let res = handler.into_boxed_handler().call(Request::get("/")).await.unwrap();
        let body = res.into_body().collect().await.unwrap();
        assert_eq!(&body[..], b"hi there");
    }

    #[tokio::test]
    async fn panic_payloads_become_messages() {
        let caught = guarded(|| panic!("boom {}", 7)).await.unwrap_err();
        assert_eq!(caught.to_string(), "boom 7");

        let handler = panics_after_yield.into_boxed_handler();
        let caught = guarded(move || handler.call(Request::get("/"))).await.unwrap_err();
        assert_eq!(caught.to_string(), "later");
    }
}
