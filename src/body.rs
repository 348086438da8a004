//! Lazy, single-use byte streams for request and response bodies.
//!
//! A [`Body`] is a producer of byte chunks: finite, pulled on demand, and not
//! restartable. The same type carries an inbound hyper body, a fully buffered
//! payload, or a stream fed chunk by chunk through a [`BodyWriter`].

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::channel::mpsc;
use futures::{SinkExt, Stream, StreamExt};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::{Body as HttpBody, Frame, SizeHint};

use crate::error::{BoxError, Error};

/// Number of chunks a [`BodyWriter`] may buffer before `send` waits for the
/// transport to catch up.
const WRITER_BUFFER: usize = 16;

/// A message body. Consumed at most once.
pub struct Body {
    inner: BoxBody<Bytes, BoxError>,
}

impl Body {
    pub fn empty() -> Self {
        Self { inner: Empty::<Bytes>::new().map_err(|never| match never {}).boxed() }
    }

    /// Wraps any `http_body` implementation, e.g. hyper's `Incoming`.
    pub fn new<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        Self { inner: body.map_err(|e| e.into()).boxed() }
    }

    /// A body produced lazily by `stream`, one chunk per item.
    ///
    /// The stream is polled only when the transport asks for more bytes. An
    /// `Err` item aborts the body; the transport then closes the connection.
    pub fn from_stream<S, B, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<B, E>> + Send + Sync + 'static,
        B: Into<Bytes> + 'static,
        E: Into<BoxError> + 'static,
    {
        let frames = stream.map(|chunk| -> Result<Frame<Bytes>, BoxError> {
            chunk.map(|b| Frame::data(b.into())).map_err(Into::into)
        });
        Self { inner: BoxBody::new(StreamBody::new(frames)) }
    }

    /// A body fed through the returned writer; see [`BodyWriter`].
    pub fn channel() -> (BodyWriter, Body) {
        let (tx, rx) = mpsc::channel::<Result<Bytes, BoxError>>(WRITER_BUFFER);
        (BodyWriter { tx }, Body::from_stream(rx))
    }

    /// Drains every chunk into one contiguous buffer.
    pub async fn collect(self) -> Result<Bytes, Error> {
        let collected = self.inner.collect().await.map_err(Error::Body)?;
        Ok(collected.to_bytes())
    }

    pub fn is_end_stream(&self) -> bool {
        HttpBody::is_end_stream(&self.inner)
    }
}

impl Default for Body {
    fn default() -> Self { Self::empty() }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body").finish_non_exhaustive()
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self { inner: Full::new(bytes).map_err(|never| match never {}).boxed() }
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self { Bytes::from(bytes).into() }
}

impl From<String> for Body {
    fn from(s: String) -> Self { Bytes::from(s).into() }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self { Bytes::from_static(s.as_bytes()).into() }
}

impl HttpBody for Body {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
        HttpBody::poll_frame(Pin::new(&mut self.inner), cx)
    }

    fn is_end_stream(&self) -> bool {
        HttpBody::is_end_stream(&self.inner)
    }

    fn size_hint(&self) -> SizeHint {
        HttpBody::size_hint(&self.inner)
    }
}

// ── BodyWriter ────────────────────────────────────────────────────────────────

/// The sending half of a streamed body.
///
/// Chunks are buffered up to a small bound; once it is full, [`send`]
/// suspends until the reader pulls. A handler that streams more than a few
/// chunks must therefore return its [`Response`](crate::Response) first and
/// keep writing from a spawned task. Dropping the writer ends the body.
///
/// [`send`]: BodyWriter::send
pub struct BodyWriter {
    tx: mpsc::Sender<Result<Bytes, BoxError>>,
}

impl BodyWriter {
    pub async fn send(&mut self, chunk: impl Into<Bytes>) -> Result<(), Error> {
        self.tx
            .send(Ok(chunk.into()))
            .await
            .map_err(|_| Error::Body("body reader dropped".into()))
    }

    /// Ends the body with an error. The peer sees a truncated message.
    pub async fn abort(mut self, err: impl Into<BoxError>) {
        // Nobody left to tell if the reader is gone.
        let _ = self.tx.send(Err(err.into())).await;
    }
}

impl fmt::Debug for BodyWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyWriter").finish_non_exhaustive()
    }
}
