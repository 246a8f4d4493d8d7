use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

/// Timestamps for one request attempt. Every field stays unset until the
/// corresponding connection milestone is reached; not all milestones fire
/// for every request (a literal-address target skips DNS, plaintext skips
/// TLS, a failed connect never reaches first byte).
///
/// Redirects and retries are separate attempts and get their own record.
#[derive(Debug, Default, Clone)]
pub struct RequestTimings {
    pub start: Option<SystemTime>,
    pub dns_start: Option<SystemTime>,
    pub dns_end: Option<SystemTime>,
    pub connect_start: Option<SystemTime>,
    pub connect_end: Option<SystemTime>,
    pub tls_start: Option<SystemTime>,
    pub tls_end: Option<SystemTime>,
    pub first_byte: Option<SystemTime>,
    pub end: Option<SystemTime>,
    pub error: Option<String>,
}

/// Lifecycle milestones stamped through a [`TimingCell`]. `start` and `end`
/// are not milestones; the transport sets them when it creates and seals
/// the cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    DnsStart,
    DnsEnd,
    ConnectStart,
    ConnectEnd,
    TlsStart,
    TlsEnd,
    FirstByte,
}

/// Shared holder for one request's [`RequestTimings`], mutable until sealed.
///
/// Milestone hooks stamp it while the request is in flight; sealing sets
/// `end` exactly once, after which every stamp is dropped and the record is
/// effectively immutable.
#[derive(Debug)]
pub struct TimingCell {
    inner: Mutex<RequestTimings>,
    sealed: AtomicBool,
}

impl TimingCell {
    pub fn new(start: SystemTime) -> Self {
        Self {
            inner: Mutex::new(RequestTimings {
                start: Some(start),
                ..Default::default()
            }),
            sealed: AtomicBool::new(false),
        }
    }

    /// Stamps a milestone. The first stamp wins; later stamps for the same
    /// milestone and stamps arriving after sealing are dropped. An `*End`
    /// milestone may land without its `*Start` ever having fired.
    pub fn stamp(&self, milestone: Milestone, at: SystemTime) {
        let mut timings = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if self.sealed.load(Ordering::Acquire) {
            return;
        }
        let slot = match milestone {
            Milestone::DnsStart => &mut timings.dns_start,
            Milestone::DnsEnd => &mut timings.dns_end,
            Milestone::ConnectStart => &mut timings.connect_start,
            Milestone::ConnectEnd => &mut timings.connect_end,
            Milestone::TlsStart => &mut timings.tls_start,
            Milestone::TlsEnd => &mut timings.tls_end,
            Milestone::FirstByte => &mut timings.first_byte,
        };
        if slot.is_none() {
            *slot = Some(at);
        }
    }

    /// Completes the record. Runs at most once: the success path and a
    /// cancellation path may race here, and only the first caller wins
    /// (the loser gets `false` and the record keeps the winner's outcome).
    ///
    /// When a response was obtained without the first-byte milestone ever
    /// firing, `first_byte` defaults to `end` so first-byte-derived
    /// durations degrade to zero instead of going undefined.
    pub fn seal(&self, end: SystemTime, error: Option<String>, got_response: bool) -> bool {
        let mut timings = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if self
            .sealed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        timings.end = Some(end);
        timings.error = error;
        if got_response && timings.first_byte.is_none() {
            timings.first_byte = Some(end);
        }
        true
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Clone of the current record: partial while the request is in flight,
    /// complete once sealed.
    pub fn snapshot(&self) -> RequestTimings {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(ms: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_millis(ms)
    }

    #[test]
    fn new_cell_carries_only_start() {
        let cell = TimingCell::new(at(5));
        let t = cell.snapshot();
        assert_eq!(t.start, Some(at(5)));
        assert_eq!(t.end, None);
        assert_eq!(t.first_byte, None);
        assert!(!cell.is_sealed());
    }

    #[test]
    fn first_stamp_wins() {
        let cell = TimingCell::new(at(0));
        cell.stamp(Milestone::DnsStart, at(10));
        cell.stamp(Milestone::DnsStart, at(99));
        assert_eq!(cell.snapshot().dns_start, Some(at(10)));
    }

    #[test]
    fn end_milestone_without_start_is_kept() {
        let cell = TimingCell::new(at(0));
        cell.stamp(Milestone::ConnectEnd, at(30));
        let t = cell.snapshot();
        assert_eq!(t.connect_start, None);
        assert_eq!(t.connect_end, Some(at(30)));
    }

    #[test]
    fn stamps_after_seal_are_dropped() {
        let cell = TimingCell::new(at(0));
        assert!(cell.seal(at(100), None, false));
        cell.stamp(Milestone::FirstByte, at(150));
        assert_eq!(cell.snapshot().first_byte, None);
    }

    #[test]
    fn seal_runs_exactly_once() {
        let cell = TimingCell::new(at(0));
        assert!(cell.seal(at(100), None, false));
        assert!(!cell.seal(at(999), Some("late".into()), false));
        let t = cell.snapshot();
        assert_eq!(t.end, Some(at(100)));
        assert_eq!(t.error, None);
        assert!(cell.is_sealed());
    }

    #[test]
    fn seal_defaults_first_byte_when_response_was_obtained() {
        let cell = TimingCell::new(at(0));
        assert!(cell.seal(at(100), None, true));
        let t = cell.snapshot();
        assert_eq!(t.first_byte, Some(at(100)));
        assert_eq!(t.ttfb(), t.total_duration());
    }

    #[test]
    fn seal_without_response_leaves_first_byte_unset() {
        let cell = TimingCell::new(at(0));
        assert!(cell.seal(at(100), Some("connection refused".into()), false));
        let t = cell.snapshot();
        assert_eq!(t.first_byte, None);
        assert_eq!(t.error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn stamped_first_byte_survives_sealing() {
        let cell = TimingCell::new(at(0));
        cell.stamp(Milestone::FirstByte, at(60));
        assert!(cell.seal(at(100), None, true));
        assert_eq!(cell.snapshot().first_byte, Some(at(60)));
    }
}
