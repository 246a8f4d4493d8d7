use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Error;
use bytes::Bytes;
use futures::future::BoxFuture;
use http_body_util::combinators::BoxBody;
use http_body_util::Full;
use hyper::{Request, Response};

use crate::http::dialer::{Dialer, TcpDialer};
use crate::http::engine::HttpEngine;
use crate::http::store::{self, TimingHandle};
use crate::http::trace::{self, ClientTrace};
use crate::timing::clock::Clock;
use crate::timing::record::{RequestTimings, TimingCell};
use crate::tls;

/// Response body type flowing out of a [`Transport`].
pub type ResponseBody = BoxBody<Bytes, hyper::Error>;

/// The round-trip seam between the timing layer and whatever actually
/// executes the request. The default implementation is [`HttpEngine`];
/// wrapping a different engine (or a stub in tests) goes through
/// [`Builder::wrap`].
pub trait Transport: Send + Sync {
    fn round_trip(
        &self,
        req: Request<Full<Bytes>>,
    ) -> BoxFuture<'_, Result<Response<ResponseBody>, Error>>;
}

/// Decorator that captures a per-request timing record around a wrapped
/// [`Transport`].
///
/// Strictly observational: the request is forwarded untouched apart from
/// the extensions carrying its trace, and the inner outcome comes back
/// verbatim. Failures are never swallowed, rewritten, or retried; the only
/// side effect of a failed round trip is a sealed record with the error
/// message on it.
///
/// One instance supports any number of concurrent `execute` calls. All
/// per-request state lives in per-call `Arc`s, so calls cannot corrupt each
/// other's records.
pub struct TimingTransport<T = HttpEngine> {
    next: T,
    clock: Clock,
}

impl TimingTransport<HttpEngine> {
    /// Transport over the default engine with default settings.
    pub fn new() -> Result<Self, Error> {
        Builder::default().build()
    }

    pub fn builder() -> Builder {
        Builder::default()
    }
}

impl<T: Transport> TimingTransport<T> {
    /// Executes the request, returning the inner transport's outcome
    /// unchanged. On success the sealed record rides on the response's
    /// extensions (see [`store::timings`]); on failure use [`measure`]
    /// instead, since there is no response to carry the handle.
    ///
    /// [`measure`]: TimingTransport::measure
    pub async fn execute(&self, req: Request<Full<Bytes>>) -> Result<Response<ResponseBody>, Error> {
        self.run(req).await.0
    }

    /// Like [`execute`](TimingTransport::execute), but also hands back the
    /// sealed record snapshot, covering the error path.
    pub async fn measure(
        &self,
        req: Request<Full<Bytes>>,
    ) -> (Result<Response<ResponseBody>, Error>, RequestTimings) {
        let (outcome, cell) = self.run(req).await;
        let timings = cell.snapshot();
        (outcome, timings)
    }

    async fn run(
        &self,
        mut req: Request<Full<Bytes>>,
    ) -> (Result<Response<ResponseBody>, Error>, Arc<TimingCell>) {
        let cell = Arc::new(TimingCell::new(self.clock.now()));
        let handle = TimingHandle::new(Arc::clone(&cell));
        store::attach(&mut req, handle.clone());
        trace::attach(&mut req, Arc::new(ClientTrace::for_cell(&cell, &self.clock)));

        let outcome = self.next.round_trip(req).await;

        let end = self.clock.now();
        match outcome {
            Ok(mut resp) => {
                cell.seal(end, None, true);
                store::attach_response(&mut resp, handle);
                (Ok(resp), cell)
            }
            Err(err) => {
                cell.seal(end, Some(format!("{err:#}")), false);
                (Err(err), cell)
            }
        }
    }
}

impl<T> TimingTransport<T> {
    /// Always zero. Duration fields on a shared transport cannot be read
    /// safely once requests run concurrently; this accessor exists only for
    /// callers ported from that pattern.
    #[deprecated(note = "read timings from the exchange via http::store")]
    pub fn request_duration(&self) -> Duration {
        Duration::ZERO
    }

    /// Always zero, see [`request_duration`](TimingTransport::request_duration).
    #[deprecated(note = "read timings from the exchange via http::store")]
    pub fn connection_duration(&self) -> Duration {
        Duration::ZERO
    }

    /// Always zero, see [`request_duration`](TimingTransport::request_duration).
    #[deprecated(note = "read timings from the exchange via http::store")]
    pub fn total_duration(&self) -> Duration {
        Duration::ZERO
    }
}

/// Configuration for a [`TimingTransport`] and its default engine.
pub struct Builder {
    keep_alives: bool,
    connect_timeout: Duration,
    total_timeout: Option<Duration>,
    tls_handshake_timeout: Duration,
    clock: Clock,
    dialer: Option<Arc<dyn Dialer>>,
    insecure: bool,
    ca_bundle: Option<PathBuf>,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            keep_alives: true,
            connect_timeout: Duration::from_secs(30),
            total_timeout: None,
            tls_handshake_timeout: Duration::from_secs(10),
            clock: Clock::system(),
            dialer: None,
            insecure: false,
            ca_bundle: None,
        }
    }
}

impl Builder {
    /// Keep-alives are on by default; turning them off makes the engine
    /// send `Connection: close` for cleaner per-request measurements.
    pub fn keep_alives(mut self, enabled: bool) -> Self {
        self.keep_alives = enabled;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Bound on the whole round trip. Unset by default.
    pub fn total_timeout(mut self, timeout: Duration) -> Self {
        self.total_timeout = Some(timeout);
        self
    }

    pub fn tls_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.tls_handshake_timeout = timeout;
        self
    }

    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = Some(dialer);
        self
    }

    /// Skip server certificate verification.
    pub fn insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Trust the PEM bundle at `path` instead of the webpki roots.
    pub fn ca_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_bundle = Some(path.into());
        self
    }

    /// Builds a transport over the default hyper engine.
    pub fn build(self) -> Result<TimingTransport<HttpEngine>, Error> {
        let tls_config = tls::config::client_config(self.ca_bundle.as_deref(), self.insecure)?;
        let dialer = self.dialer.unwrap_or_else(|| {
            Arc::new(TcpDialer {
                connect_timeout: self.connect_timeout,
            })
        });
        let engine = HttpEngine::new(
            dialer,
            tls_config,
            self.keep_alives,
            self.tls_handshake_timeout,
            self.total_timeout,
        );
        Ok(TimingTransport {
            next: engine,
            clock: self.clock,
        })
    }

    /// Wraps an existing transport instead of building the default engine.
    /// Engine-level options (timeouts, dialer, tls) do not apply to a
    /// wrapped transport; only the clock is used.
    pub fn wrap<T: Transport>(self, base: T) -> TimingTransport<T> {
        TimingTransport {
            next: base,
            clock: self.clock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::time::SystemTime;

    fn empty_body() -> ResponseBody {
        Full::new(Bytes::new())
            .map_err(|never| match never {})
            .boxed()
    }

    fn request() -> Request<Full<Bytes>> {
        Request::builder()
            .uri("http://example.test/")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    struct OkTransport;

    impl Transport for OkTransport {
        fn round_trip(
            &self,
            req: Request<Full<Bytes>>,
        ) -> BoxFuture<'_, Result<Response<ResponseBody>, Error>> {
            // fire a couple of milestones the way a real engine would
            let trace = trace::from_request(&req);
            Box::pin(async move {
                trace.connect_start();
                trace.connect_done();
                Ok(Response::new(empty_body()))
            })
        }
    }

    struct FailTransport;

    impl Transport for FailTransport {
        fn round_trip(
            &self,
            _req: Request<Full<Bytes>>,
        ) -> BoxFuture<'_, Result<Response<ResponseBody>, Error>> {
            Box::pin(async { Err(anyhow!("connection refused")) })
        }
    }

    fn stepped_clock() -> Clock {
        Clock::stepped(SystemTime::UNIX_EPOCH, Duration::from_millis(10))
    }

    #[tokio::test]
    async fn success_seals_record_onto_response() {
        let transport = Builder::default().clock(stepped_clock()).wrap(OkTransport);
        let resp = transport.execute(request()).await.unwrap();

        let handle = store::from_response(&resp).unwrap();
        assert!(handle.is_sealed());
        let t = handle.snapshot();
        // stepped clock: start=0ms, connect=10..20ms, end=30ms
        assert_eq!(t.total_duration(), Duration::from_millis(30));
        assert_eq!(t.connection_duration(), Duration::from_millis(10));
        // engine never reported first byte; it defaults to end
        assert_eq!(t.first_byte, t.end);
        assert_eq!(t.ttfb(), t.total_duration());
        assert!(t.error.is_none());
    }

    #[tokio::test]
    async fn failure_passes_error_through_verbatim() {
        let transport = Builder::default()
            .clock(stepped_clock())
            .wrap(FailTransport);
        let (outcome, timings) = transport.measure(request()).await;

        let err = outcome.unwrap_err();
        assert_eq!(err.to_string(), "connection refused");

        assert_eq!(timings.error.as_deref(), Some("connection refused"));
        assert!(timings.start.is_some());
        assert!(timings.end.is_some());
        assert_eq!(timings.first_byte, None);
        assert_eq!(timings.to_string(), "Error: connection refused");
    }

    #[tokio::test]
    async fn measure_on_success_matches_response_record() {
        let transport = Builder::default().clock(stepped_clock()).wrap(OkTransport);
        let (outcome, timings) = transport.measure(request()).await;
        let resp = outcome.unwrap();
        let from_resp = store::timings(&resp).unwrap();
        assert_eq!(timings.total_duration(), from_resp.total_duration());
        assert_eq!(timings.connect_end, from_resp.connect_end);
    }

    #[tokio::test]
    async fn legacy_transport_accessors_report_zero() {
        let transport = Builder::default().wrap(OkTransport);
        let _ = transport.execute(request()).await.unwrap();
        #[allow(deprecated)]
        {
            assert_eq!(transport.request_duration(), Duration::ZERO);
            assert_eq!(transport.connection_duration(), Duration::ZERO);
            assert_eq!(transport.total_duration(), Duration::ZERO);
        }
    }
}
