//! Chunked HTTP response bodies
//!
//! A [`ResponseStream`] is the write side of one streaming response. The
//! status line and headers are committed as soon as the paired [`Response`]
//! is handed back to the HTTP engine; every [`ResponseStream::append_chunk`]
//! is then flushed as its own chunk and [`ResponseStream::done`] ends the
//! body. `done` consumes the stream, so nothing can be written afterwards.

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::trace;

/// Chunks buffered between the writer and the socket before writes wait
const STREAM_BUFFER: usize = 16;

/// Write side of a streaming response
#[derive(Debug)]
pub struct ResponseStream {
    tx: mpsc::Sender<Result<Bytes, Infallible>>,
    chunks: usize,
}

impl ResponseStream {
    /// Open a stream; the response must be returned to the engine right away
    pub fn open(status: StatusCode) -> (ResponseStream, Response) {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let body = Body::from_stream(ReceiverStream::new(rx));
        (ResponseStream { tx, chunks: 0 }, (status, body).into_response())
    }

    /// Append one chunk. Returns `false` once the client is gone.
    pub async fn append_chunk(&mut self, chunk: impl Into<Bytes>) -> bool {
        let chunk = chunk.into();
        if chunk.is_empty() {
            // An empty chunk would read as end-of-body on the wire.
            return !self.tx.is_closed();
        }
        trace!("Writing chunk {} ({} bytes)", self.chunks, chunk.len());
        if self.tx.send(Ok(chunk)).await.is_err() {
            return false;
        }
        self.chunks += 1;
        true
    }

    /// Number of chunks written so far
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Finish the body
    pub fn done(self) {
        trace!("Response stream done after {} chunks", self.chunks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chunks_then_done() {
        let (mut stream, response) = ResponseStream::open(StatusCode::OK);
        assert_eq!(response.status(), StatusCode::OK);

        let writer = tokio::spawn(async move {
            assert!(stream.append_chunk("{\"a\":1}\n").await);
            assert!(stream.append_chunk("").await);
            assert!(stream.append_chunk("{\"b\":2}\n").await);
            assert_eq!(stream.chunks(), 2);
            stream.done();
        });

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        writer.await.unwrap();
        assert_eq!(&body[..], b"{\"a\":1}\n{\"b\":2}\n");
    }

    #[tokio::test]
    async fn test_done_without_chunks_is_empty_body() {
        let (stream, response) = ResponseStream::open(StatusCode::OK);
        stream.done();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_closed_client_is_reported() {
        let (mut stream, response) = ResponseStream::open(StatusCode::OK);
        drop(response);
        assert!(!stream.append_chunk("x").await);
        assert_eq!(stream.chunks(), 0);
    }
}
