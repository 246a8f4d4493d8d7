use std::sync::Arc;

use http::Request;

use crate::timing::clock::Clock;
use crate::timing::record::{Milestone, TimingCell};

type Hook = Box<dyn Fn() + Send + Sync>;

/// Per-request lifecycle hooks, one per connection milestone, each a
/// closure over that request's own [`TimingCell`]. The hooks ride on the
/// request's extensions to whichever engine executes it; the engine fires
/// the ones it can observe and skips the rest. A missing hook, like a
/// missing trace altogether, is a no-op.
///
/// Single-fire is enforced by the cell's first-stamp-wins rule, so an
/// engine that reports a milestone twice does no harm.
#[derive(Default)]
pub struct ClientTrace {
    on_dns_start: Option<Hook>,
    on_dns_done: Option<Hook>,
    on_connect_start: Option<Hook>,
    on_connect_done: Option<Hook>,
    on_tls_start: Option<Hook>,
    on_tls_done: Option<Hook>,
    on_first_byte: Option<Hook>,
}

impl ClientTrace {
    /// Builds the full hook set, stamping `cell` with `clock` readings.
    pub fn for_cell(cell: &Arc<TimingCell>, clock: &Clock) -> Self {
        let hook = |milestone: Milestone| -> Option<Hook> {
            let cell = Arc::clone(cell);
            let clock = clock.clone();
            Some(Box::new(move || cell.stamp(milestone, clock.now())))
        };
        Self {
            on_dns_start: hook(Milestone::DnsStart),
            on_dns_done: hook(Milestone::DnsEnd),
            on_connect_start: hook(Milestone::ConnectStart),
            on_connect_done: hook(Milestone::ConnectEnd),
            on_tls_start: hook(Milestone::TlsStart),
            on_tls_done: hook(Milestone::TlsEnd),
            on_first_byte: hook(Milestone::FirstByte),
        }
    }

    pub fn dns_start(&self) {
        fire(&self.on_dns_start);
    }

    pub fn dns_done(&self) {
        fire(&self.on_dns_done);
    }

    pub fn connect_start(&self) {
        fire(&self.on_connect_start);
    }

    pub fn connect_done(&self) {
        fire(&self.on_connect_done);
    }

    pub fn tls_start(&self) {
        fire(&self.on_tls_start);
    }

    pub fn tls_done(&self) {
        fire(&self.on_tls_done);
    }

    pub fn first_byte(&self) {
        fire(&self.on_first_byte);
    }
}

fn fire(hook: &Option<Hook>) {
    if let Some(hook) = hook {
        hook();
    }
}

// Extensions require Clone; ClientTrace itself holds boxed closures, so it
// travels wrapped in an Arc.
#[derive(Clone)]
struct TraceRef(Arc<ClientTrace>);

/// Attaches the trace to the request so the engine can reach it.
pub fn attach<B>(req: &mut Request<B>, trace: Arc<ClientTrace>) {
    req.extensions_mut().insert(TraceRef(trace));
}

/// The trace carried by `req`, or a no-op trace when none was attached.
pub fn from_request<B>(req: &Request<B>) -> Arc<ClientTrace> {
    req.extensions()
        .get::<TraceRef>()
        .map(|t| Arc::clone(&t.0))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    #[test]
    fn hooks_stamp_their_cell() {
        let cell = Arc::new(TimingCell::new(SystemTime::UNIX_EPOCH));
        let clock = Clock::stepped(
            SystemTime::UNIX_EPOCH + Duration::from_millis(10),
            Duration::from_millis(10),
        );
        let trace = ClientTrace::for_cell(&cell, &clock);

        trace.dns_start();
        trace.dns_done();
        trace.first_byte();

        let t = cell.snapshot();
        assert_eq!(t.dns_duration(), Duration::from_millis(10));
        assert_eq!(
            t.first_byte,
            Some(SystemTime::UNIX_EPOCH + Duration::from_millis(30))
        );
        assert_eq!(t.connect_end, None);
    }

    #[test]
    fn default_trace_is_a_noop() {
        let trace = ClientTrace::default();
        trace.dns_start();
        trace.connect_done();
        trace.tls_done();
        trace.first_byte();
    }

    #[test]
    fn missing_trace_yields_noop_trace() {
        let req = Request::builder().body(()).unwrap();
        let trace = from_request(&req);
        trace.connect_start();
    }

    #[test]
    fn attached_trace_round_trips_through_extensions() {
        let cell = Arc::new(TimingCell::new(SystemTime::UNIX_EPOCH));
        let clock = Clock::fixed(SystemTime::UNIX_EPOCH + Duration::from_millis(7));
        let mut req = Request::builder().body(()).unwrap();
        attach(&mut req, Arc::new(ClientTrace::for_cell(&cell, &clock)));

        from_request(&req).connect_done();
        assert_eq!(
            cell.snapshot().connect_end,
            Some(SystemTime::UNIX_EPOCH + Duration::from_millis(7))
        );
    }
}
