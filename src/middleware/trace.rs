//! Request logging as a filter.
//!
//! ```rust
//! use ferrule::{Request, Router, middleware};
//!
//! let app = Router::new()
//!     .get("/", |_req: Request| async { "hello" })
//!     .filter(middleware::trace());
//! ```
//!
//! Every exchange passing through gets a `request` span carrying the method
//! and path; `inbound` is logged before the rest of the chain runs and
//! `outbound` (or `outbound failure`) after it. Failures are logged and then
//! passed on unchanged.

use std::time::Instant;

use tracing::{Instrument, Level, info_span};

use crate::filter::{Filter, Next};
use crate::handler::BoxFuture;
use crate::request::Request;

/// Logs each exchange at a configurable level.
#[derive(Clone, Copy, Debug)]
pub struct Trace {
    level: Level,
}

/// A [`Trace`] filter logging at `INFO`.
pub fn trace() -> Trace {
    Trace::default()
}

impl Trace {
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

impl Default for Trace {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

// `tracing` macros need the level as a constant.
macro_rules! at_level {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            Level::ERROR => tracing::error!($($arg)+),
            Level::WARN => tracing::warn!($($arg)+),
            Level::INFO => tracing::info!($($arg)+),
            Level::DEBUG => tracing::debug!($($arg)+),
            _ => tracing::trace!($($arg)+),
        }
    };
}

impl Filter for Trace {
    fn filter(&self, req: Request, next: Next) -> BoxFuture {
        let level = self.level;
        let span = info_span!("request", method = %req.method(), path = req.path());
        Box::pin(
            async move {
                let started = Instant::now();
                at_level!(level, remote = ?req.remote_addr(), "inbound");

                let outcome = next.run(req).await;

                let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                match &outcome {
                    Ok(res) => at_level!(
                        level,
                        status = %res.status_code(),
                        committed = res.is_committed(),
                        latency_ms,
                        "outbound"
                    ),
                    Err(err) => tracing::warn!(error = %err, latency_ms, "outbound failure"),
                }
                outcome
            }
            .instrument(span),
        )
    }
}
