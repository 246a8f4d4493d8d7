use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Injectable time source. Production code reads the system wall clock;
/// tests swap in a fixed or stepped clock for deterministic timestamps.
#[derive(Clone)]
pub struct Clock(Arc<dyn Fn() -> SystemTime + Send + Sync>);

impl Clock {
    pub fn system() -> Self {
        Clock(Arc::new(SystemTime::now))
    }

    /// Always returns `at`.
    pub fn fixed(at: SystemTime) -> Self {
        Clock(Arc::new(move || at))
    }

    /// Returns `start` on the first reading and advances by `step` on each
    /// subsequent one.
    pub fn stepped(start: SystemTime, step: Duration) -> Self {
        let ticks = AtomicU32::new(0);
        Clock(Arc::new(move || {
            let n = ticks.fetch_add(1, Ordering::Relaxed);
            start + step * n
        }))
    }

    pub fn now(&self) -> SystemTime {
        (self.0)()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Clock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_never_moves() {
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(42);
        let clock = Clock::fixed(at);
        assert_eq!(clock.now(), at);
        assert_eq!(clock.now(), at);
    }

    #[test]
    fn stepped_clock_advances_per_reading() {
        let start = SystemTime::UNIX_EPOCH;
        let clock = Clock::stepped(start, Duration::from_millis(10));
        assert_eq!(clock.now(), start);
        assert_eq!(clock.now(), start + Duration::from_millis(10));
        assert_eq!(clock.now(), start + Duration::from_millis(20));
    }

    #[test]
    fn stepped_clock_is_shared_across_clones() {
        let start = SystemTime::UNIX_EPOCH;
        let clock = Clock::stepped(start, Duration::from_millis(10));
        let other = clock.clone();
        assert_eq!(clock.now(), start);
        assert_eq!(other.now(), start + Duration::from_millis(10));
    }
}
