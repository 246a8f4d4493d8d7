use std::fmt;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::timing::record::RequestTimings;

/// Span between two optional timestamps. Zero when either bound is unset
/// and zero when the span would be negative (out-of-order stamps, clock
/// skew): histogram and percentile consumers must never see a negative
/// phase duration.
fn span(from: Option<SystemTime>, to: Option<SystemTime>) -> Duration {
    match (from, to) {
        (Some(from), Some(to)) => to.duration_since(from).unwrap_or(Duration::ZERO),
        _ => Duration::ZERO,
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Phase durations, derived on every call. Each accessor is a pure function
/// of the record, so repeated queries on a sealed record are idempotent.
/// Querying a record that is still in flight is not an error; absent bounds
/// simply yield zero.
impl RequestTimings {
    pub fn dns_duration(&self) -> Duration {
        span(self.dns_start, self.dns_end)
    }

    /// Measured from the explicit connect-start milestone when the engine
    /// provided one, else from the overall request start.
    pub fn connection_duration(&self) -> Duration {
        span(self.connect_start.or(self.start), self.connect_end)
    }

    pub fn tls_duration(&self) -> Duration {
        span(self.tls_start, self.tls_end)
    }

    pub fn ttfb(&self) -> Duration {
        span(self.start, self.first_byte)
    }

    /// Time the remote side spent between the end of connection setup
    /// (handshake end for TLS, connect end for plaintext) and the first
    /// response byte.
    pub fn server_processing_duration(&self) -> Duration {
        span(self.tls_end.or(self.connect_end), self.first_byte)
    }

    pub fn data_transfer_duration(&self) -> Duration {
        span(self.first_byte, self.end)
    }

    pub fn total_duration(&self) -> Duration {
        span(self.start, self.end)
    }

    /// Legacy alias: connection established to first byte.
    pub fn request_duration(&self) -> Duration {
        span(self.connect_end, self.first_byte)
    }

    /// Millisecond-granularity structured form for exporters and `--json`
    /// output.
    pub fn report(&self) -> TimingReport {
        TimingReport {
            dns_ms: millis(self.dns_duration()),
            connect_ms: millis(self.connection_duration()),
            tls_ms: millis(self.tls_duration()),
            ttfb_ms: millis(self.ttfb()),
            total_ms: millis(self.total_duration()),
            request_ms: millis(self.request_duration()),
            error: self.error.clone(),
        }
    }
}

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

/// Serialized view of a record. The dns and tls fields are omitted when
/// their duration is zero; an unobserved phase and a genuinely
/// instantaneous one are indistinguishable from timestamps alone and are
/// treated the same.
#[derive(Debug, Clone, Serialize)]
pub struct TimingReport {
    #[serde(skip_serializing_if = "is_zero")]
    pub dns_ms: f64,
    pub connect_ms: f64,
    #[serde(skip_serializing_if = "is_zero")]
    pub tls_ms: f64,
    pub ttfb_ms: f64,
    pub total_ms: f64,
    pub request_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Serialize for RequestTimings {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.report().serialize(serializer)
    }
}

impl fmt::Display for RequestTimings {
    /// Compact rendering: `total=` followed by the phases that actually
    /// took time. A failed request renders solely as `Error: <message>`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(err) = &self.error {
            return write!(f, "Error: {err}");
        }
        write!(f, "total={:?}", self.total_duration())?;
        let dns = self.dns_duration();
        if dns > Duration::ZERO {
            write!(f, " dns={dns:?}")?;
        }
        let connect = self.connection_duration();
        if connect > Duration::ZERO {
            write!(f, " connect={connect:?}")?;
        }
        let tls = self.tls_duration();
        if tls > Duration::ZERO {
            write!(f, " tls={tls:?}")?;
        }
        let ttfb = self.ttfb();
        if ttfb > Duration::ZERO {
            write!(f, " ttfb={ttfb:?}")?;
        }
        Ok(())
    }
}
