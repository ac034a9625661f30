//! The observing transport.
//!
//! # Responsibilities
//! - Mint one sequence id per round trip
//! - Snapshot the outgoing request and the incoming response
//! - Hand both bodies on byte-for-byte unchanged
//! - Emit one transcript per successful round trip
//!
//! # Design Decisions
//! - Implemented as a `tower` layer around the real client
//! - No lock is held across the upstream call; only the counter is shared
//! - Upstream errors pass through untouched and are never retried

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::http::{HeaderMap, Request, Response};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use http_body::Body as HttpBody;
use serde::{Deserialize, Serialize};
use tower::{BoxError, Layer, Service};

use crate::capture::{self, render_request, render_response, BodySnapshot, CaptureError};
use crate::observability::metrics;

use super::{RoundTripError, SequenceCounter, Transcript, TranscriptSink};

/// What to do when a body cannot be captured for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapturePolicy {
    /// Fail the whole round trip.
    #[default]
    Fail,
    /// Deliver the raw message and skip the transcript when only decoding
    /// failed. Read failures still fail the round trip.
    Deliver,
}

#[derive(Clone)]
struct Observer {
    counter: SequenceCounter,
    sink: Arc<dyn TranscriptSink>,
    policy: CapturePolicy,
}

/// Layer that wraps a client service in an [`ObservingTransport`].
#[derive(Clone)]
pub struct ObservingLayer {
    observer: Observer,
}

impl ObservingLayer {
    pub fn new(sink: impl TranscriptSink) -> Self {
        Self::from_shared(Arc::new(sink))
    }

    pub fn from_shared(sink: Arc<dyn TranscriptSink>) -> Self {
        Self {
            observer: Observer {
                counter: SequenceCounter::new(),
                sink,
                policy: CapturePolicy::default(),
            },
        }
    }

    /// Share an existing counter instead of starting a fresh one.
    pub fn with_counter(mut self, counter: SequenceCounter) -> Self {
        self.observer.counter = counter;
        self
    }

    pub fn with_policy(mut self, policy: CapturePolicy) -> Self {
        self.observer.policy = policy;
        self
    }
}

impl<S> Layer<S> for ObservingLayer {
    type Service = ObservingTransport<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ObservingTransport {
            inner,
            observer: self.observer.clone(),
        }
    }
}

/// Service that records a [`Transcript`] for every round trip through `S`.
#[derive(Clone)]
pub struct ObservingTransport<S> {
    inner: S,
    observer: Observer,
}

impl<S> ObservingTransport<S> {
    pub fn counter(&self) -> &SequenceCounter {
        &self.observer.counter
    }

    pub fn policy(&self) -> CapturePolicy {
        self.observer.policy
    }
}

impl<S, B> Service<Request<Body>> for ObservingTransport<S>
where
    S: Service<Request<Body>, Response = Response<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
    B: HttpBody<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    type Response = Response<Body>;
    type Error = RoundTripError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(|e| RoundTripError::Upstream(e.into()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        // Take the instance that was driven to readiness.
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let observer = self.observer.clone();

        Box::pin(async move { observer.round_trip(inner, request).await })
    }
}

impl Observer {
    async fn round_trip<S, B>(
        self,
        mut inner: S,
        request: Request<Body>,
    ) -> Result<Response<Body>, RoundTripError>
    where
        S: Service<Request<Body>, Response = Response<B>>,
        S::Error: Into<BoxError>,
        B: HttpBody<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let sequence = self.counter.next();

        let (parts, body) = request.into_parts();
        let (body, request_view) = self.capture(sequence, "request", &parts.headers, body).await?;
        let rendered_request = request_view.map(|view| render_request(&parts, &view));
        let request = Request::from_parts(parts, body);

        tracing::debug!(
            sequence,
            method = %request.method(),
            uri = %request.uri(),
            "Forwarding request"
        );

        let start = Instant::now();
        let response = match inner.call(request).await {
            Ok(response) => response,
            Err(e) => {
                let error: BoxError = e.into();
                tracing::warn!(sequence, error = %error, "Upstream round trip failed");
                metrics::record_upstream_error();
                return Err(RoundTripError::Upstream(error));
            }
        };
        let elapsed = start.elapsed();

        let (parts, body) = response.into_parts();
        let (body, response_view) = self.capture(sequence, "response", &parts.headers, body).await?;
        let rendered_response = response_view.map(|view| render_response(&parts, &view));

        metrics::record_round_trip(parts.status.as_u16(), elapsed);

        if let (Some(request), Some(response)) = (rendered_request, rendered_response) {
            self.sink.emit(&Transcript {
                sequence,
                request,
                response,
                elapsed,
            });
        }

        Ok(Response::from_parts(parts, body))
    }

    /// Buffer one body. Returns the body to deliver and, unless the policy
    /// allowed skipping it, the display snapshot.
    async fn capture<B>(
        &self,
        sequence: u64,
        side: &'static str,
        headers: &HeaderMap,
        body: B,
    ) -> Result<(Body, Option<BodySnapshot>), CaptureError>
    where
        B: HttpBody<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let raw = match capture::buffer(headers, body).await {
            Ok(raw) => raw,
            Err(e) => {
                self.capture_failed(sequence, side, &e);
                return Err(e);
            }
        };
        let delivered = capture::delivered_body(raw.as_ref());

        let Some(raw) = raw else {
            return Ok((delivered, Some(BodySnapshot::default())));
        };

        match capture::snapshot(headers, &raw) {
            Ok(view) => Ok((delivered, Some(view))),
            Err(e) => {
                self.capture_failed(sequence, side, &e);
                match self.policy {
                    CapturePolicy::Deliver => {
                        tracing::warn!(sequence, side, "Delivering message without transcript");
                        Ok((delivered, None))
                    }
                    CapturePolicy::Fail => Err(e),
                }
            }
        }
    }

    fn capture_failed(&self, sequence: u64, side: &'static str, error: &CaptureError) {
        tracing::error!(sequence, side, error = %error, "Body capture failed");
        metrics::record_capture_error(side, error.kind());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemorySink;
    use axum::http::{header, StatusCode};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use http_body_util::BodyExt;
    use std::collections::HashSet;
    use std::io::Write;
    use tower::{service_fn, ServiceExt};

    /// Upstream that answers every request with the same response.
    #[derive(Clone)]
    struct Fixed {
        headers: Vec<(header::HeaderName, &'static str)>,
        body: Vec<u8>,
    }

    impl Service<Request<Body>> for Fixed {
        type Response = Response<Body>;
        type Error = std::io::Error;
        type Future = std::future::Ready<Result<Response<Body>, std::io::Error>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _request: Request<Body>) -> Self::Future {
            let mut builder = Response::builder().status(StatusCode::OK);
            for (name, value) in &self.headers {
                builder = builder.header(name, *value);
            }
            std::future::ready(Ok(builder.body(Body::from(self.body.clone())).unwrap()))
        }
    }

    fn fixed_response(headers: Vec<(header::HeaderName, &'static str)>, body: Vec<u8>) -> Fixed {
        Fixed { headers, body }
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    async fn read_all(body: Body) -> Bytes {
        body.collect().await.unwrap().to_bytes()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_echo_round_trip_is_transparent() {
        let sink = MemorySink::new();
        let echo = service_fn(|req: Request<Body>| async move {
            let body = req.into_body().collect().await.unwrap().to_bytes();
            Ok::<_, std::io::Error>(Response::new(Body::from(body)))
        });
        let transport = ObservingLayer::new(sink.clone()).layer(echo);

        let request = Request::builder()
            .method("POST")
            .uri("http://upstream.test/echo")
            .header(header::CONTENT_LENGTH, "11")
            .body(Body::from("hello world"))
            .unwrap();

        let response = transport.oneshot(request).await.unwrap();
        assert_eq!(&read_all(response.into_body()).await[..], b"hello world");

        let transcripts = sink.transcripts();
        assert_eq!(transcripts.len(), 1);
        let transcript = &transcripts[0];
        assert_eq!(transcript.sequence, 1);
        assert!(transcript.request.head().starts_with("POST /echo HTTP/1.1\r\n"));
        assert_eq!(&transcript.request.body()[..], b"hello world");
        assert_eq!(&transcript.response.body()[..], b"hello world");
    }

    #[tokio::test]
    async fn test_request_without_body_renders_empty() {
        let sink = MemorySink::new();
        let echo = service_fn(|req: Request<Body>| async move {
            let body = req.into_body().collect().await.unwrap().to_bytes();
            Ok::<_, std::io::Error>(Response::new(Body::from(body)))
        });
        let transport = ObservingLayer::new(sink.clone()).layer(echo);

        let response = transport.oneshot(get("http://upstream.test/")).await.unwrap();
        assert!(read_all(response.into_body()).await.is_empty());

        let transcript = &sink.transcripts()[0];
        assert!(transcript.request.body().is_empty());
        assert!(transcript.response.body().is_empty());
    }

    #[tokio::test]
    async fn test_large_response_is_truncated_in_transcript_only() {
        let mut payload = vec![b'A'; 400];
        payload.push(b'B');
        payload.extend(std::iter::repeat(b'C').take(400));

        let sink = MemorySink::new();
        let transport = ObservingLayer::new(sink.clone()).layer(fixed_response(vec![], payload.clone()));

        let response = transport.oneshot(get("http://upstream.test/")).await.unwrap();
        assert_eq!(&read_all(response.into_body()).await[..], &payload[..]);

        let rendered = sink.transcripts()[0].response.clone();
        assert_eq!(rendered.body().len(), 804);
        assert_eq!(&rendered.body()[..400], &[b'A'; 400][..]);
        assert_eq!(&rendered.body()[400..403], b"...");
        assert_eq!(rendered.body()[403], b'B');
        assert_eq!(&rendered.body()[404..], &[b'C'; 400][..]);
    }

    #[tokio::test]
    async fn test_gzip_response_delivered_compressed() {
        let plain = b"{\"status\":\"ok\"}".to_vec();
        let compressed = gzip(&plain);

        let sink = MemorySink::new();
        let transport = ObservingLayer::new(sink.clone()).layer(fixed_response(
            vec![(header::CONTENT_ENCODING, "gzip")],
            compressed.clone(),
        ));

        let response = transport.oneshot(get("http://upstream.test/")).await.unwrap();
        assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
        assert_eq!(&read_all(response.into_body()).await[..], &compressed[..]);

        assert_eq!(&sink.transcripts()[0].response.body()[..], &plain[..]);
    }

    #[tokio::test]
    async fn test_upstream_error_passes_through() {
        let sink = MemorySink::new();
        let failing = service_fn(|_req: Request<Body>| async move {
            Err::<Response<Body>, _>(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))
        });
        let transport = ObservingLayer::new(sink.clone()).layer(failing);
        let counter = transport.counter().clone();

        let err = transport.oneshot(get("http://upstream.test/")).await.unwrap_err();

        let source = err.upstream().expect("upstream error");
        let io = source.downcast_ref::<std::io::Error>().expect("io error");
        assert_eq!(io.kind(), std::io::ErrorKind::ConnectionRefused);
        assert!(sink.transcripts().is_empty());
        assert_eq!(counter.next(), 2);
    }

    #[tokio::test]
    async fn test_malformed_gzip_fails_round_trip() {
        let sink = MemorySink::new();
        let transport = ObservingLayer::new(sink.clone()).layer(fixed_response(
            vec![(header::CONTENT_ENCODING, "gzip")],
            b"not actually gzip".to_vec(),
        ));

        let err = transport.oneshot(get("http://upstream.test/")).await.unwrap_err();

        assert!(matches!(err, RoundTripError::Capture(CaptureError::Decompress(_))));
        assert!(sink.transcripts().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_gzip_delivered_under_deliver_policy() {
        let sink = MemorySink::new();
        let transport = ObservingLayer::new(sink.clone())
            .with_policy(CapturePolicy::Deliver)
            .layer(fixed_response(
                vec![(header::CONTENT_ENCODING, "gzip")],
                b"not actually gzip".to_vec(),
            ));

        let response = transport.oneshot(get("http://upstream.test/")).await.unwrap();

        assert_eq!(&read_all(response.into_body()).await[..], b"not actually gzip");
        assert!(sink.transcripts().is_empty());
    }

    #[tokio::test]
    async fn test_zero_length_response() {
        let sink = MemorySink::new();
        let transport = ObservingLayer::new(sink.clone())
            .layer(fixed_response(vec![(header::CONTENT_LENGTH, "0")], Vec::new()));

        let response = transport.oneshot(get("http://upstream.test/")).await.unwrap();
        assert!(read_all(response.into_body()).await.is_empty());

        let rendered = &sink.transcripts()[0].response;
        assert!(rendered.body().is_empty());
        assert!(rendered.head().contains("content-length: 0\r\n"));
    }

    #[tokio::test]
    async fn test_concurrent_round_trips_get_distinct_ids() {
        let sink = MemorySink::new();
        let transport = ObservingLayer::new(sink.clone()).layer(fixed_response(vec![], b"ok".to_vec()));

        let tasks = 64;
        let handles: Vec<_> = (0..tasks)
            .map(|i| {
                let transport = transport.clone();
                tokio::spawn(async move {
                    let uri = format!("http://upstream.test/{i}");
                    let response = transport.oneshot(get(&uri)).await.unwrap();
                    read_all(response.into_body()).await
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(&handle.await.unwrap()[..], b"ok");
        }

        let ids: HashSet<u64> = sink.transcripts().iter().map(|t| t.sequence).collect();
        assert_eq!(ids.len(), tasks);
        assert_eq!(ids, (1..=tasks as u64).collect());
    }

    #[tokio::test]
    async fn test_shared_counter_continues_across_layers() {
        let counter = SequenceCounter::new();
        counter.next();

        let sink = MemorySink::new();
        let transport = ObservingLayer::new(sink.clone())
            .with_counter(counter.clone())
            .layer(fixed_response(vec![], Vec::new()));

        transport.oneshot(get("http://upstream.test/")).await.unwrap();

        assert_eq!(sink.transcripts()[0].sequence, 2);
        assert_eq!(counter.current(), 2);
    }
}
