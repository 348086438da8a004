//! Built-in filters.
//!
//! Cross-cutting concerns such as request tracing live here rather than in
//! handlers. Everything in this module is an ordinary
//! [`Filter`](crate::Filter) and composes like one.
//!
//! - [`trace`]: per-request span, logging the outcome and its latency

pub mod trace;

pub use trace::{Trace, trace};
