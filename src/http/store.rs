use std::sync::Arc;

use http::{Request, Response};

use crate::timing::record::{RequestTimings, TimingCell};

/// Cheap cloneable handle to one exchange's timing record, carried in the
/// request and response extensions. Extension-scoped storage is what keeps
/// concurrent requests on one transport from ever seeing each other's
/// records: the association lives on the exchange, not on the transport or
/// in any global map.
///
/// The handle does not synchronize mutation; only the engine-side hooks
/// write, and only until the transport seals the record.
#[derive(Clone, Debug)]
pub struct TimingHandle(Arc<TimingCell>);

impl TimingHandle {
    pub(crate) fn new(cell: Arc<TimingCell>) -> Self {
        Self(cell)
    }

    /// Clone of the record: partial mid-flight, complete once sealed.
    pub fn snapshot(&self) -> RequestTimings {
        self.0.snapshot()
    }

    pub fn is_sealed(&self) -> bool {
        self.0.is_sealed()
    }
}

pub fn attach<B>(req: &mut Request<B>, handle: TimingHandle) {
    req.extensions_mut().insert(handle);
}

pub fn attach_response<B>(resp: &mut Response<B>, handle: TimingHandle) {
    resp.extensions_mut().insert(handle);
}

/// The handle carried by `req`, if any. Absence means no timing layer saw
/// this request; callers should skip emission rather than fail.
pub fn from_request<B>(req: &Request<B>) -> Option<TimingHandle> {
    req.extensions().get::<TimingHandle>().cloned()
}

pub fn from_response<B>(resp: &Response<B>) -> Option<TimingHandle> {
    resp.extensions().get::<TimingHandle>().cloned()
}

/// Snapshot convenience for callers that only hold the response.
pub fn timings<B>(resp: &Response<B>) -> Option<RequestTimings> {
    from_response(resp).map(|h| h.snapshot())
}
