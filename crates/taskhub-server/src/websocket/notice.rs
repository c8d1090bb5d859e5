//! Admission policy for client-originated notices.

use taskhub_core::Envelope;
use taskhub_core::ids::ConnectionId;

/// Decides whether a client notice may be relayed to other viewers.
///
/// The channel itself is unauthenticated; a gate is the hook for adding
/// per-connection authorization without touching the relay path.
pub trait NoticeGate: Send + Sync {
    /// Return `true` to relay `notice` from `origin`.
    fn admit(&self, origin: &ConnectionId, notice: &Envelope) -> bool;
}

/// Admits every notice.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl NoticeGate for AllowAll {
    fn admit(&self, _origin: &ConnectionId, _notice: &Envelope) -> bool {
        true
    }
}

impl<F> NoticeGate for F
where
    F: Fn(&ConnectionId, &Envelope) -> bool + Send + Sync,
{
    fn admit(&self, origin: &ConnectionId, notice: &Envelope) -> bool {
        self(origin, notice)
    }
}
