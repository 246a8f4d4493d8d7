//! HTTP client timing instrumentation.
//!
//! [`TimingTransport`] wraps a request-executing transport and captures a
//! per-request record of connection-lifecycle timestamps (DNS, TCP connect,
//! TLS handshake, first byte, completion). The sealed record rides on the
//! response's extensions; [`RequestTimings`] derives the phase durations
//! with zero-fallback rules so consumers never see a negative span.
//!
//! ```no_run
//! use bytes::Bytes;
//! use http_body_util::Full;
//! use httptick::{http::store, TimingTransport};
//! use hyper::Request;
//!
//! # async fn demo() -> Result<(), anyhow::Error> {
//! let transport = TimingTransport::new()?;
//! let req = Request::builder()
//!     .uri("http://example.com/")
//!     .body(Full::new(Bytes::new()))?;
//! let resp = transport.execute(req).await?;
//! if let Some(timings) = store::timings(&resp) {
//!     println!("{timings}");
//! }
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate tracing;

pub mod app;
pub mod cli;
pub mod http;
pub mod timing;
pub mod tls;

pub use crate::http::store::TimingHandle;
pub use crate::http::transport::{Builder, TimingTransport, Transport};
pub use crate::timing::clock::Clock;
pub use crate::timing::record::{Milestone, RequestTimings, TimingCell};
pub use crate::timing::result::TimingReport;
