//! Holding back remote ICE candidates until a remote description exists.

use std::cell::{Cell, RefCell};

use crate::platform::{IceCandidate, RtcPeerConnection};

/// Buffer of remote [`IceCandidate`]s received before the remote description
/// was applied.
#[derive(Debug, Default)]
pub struct IceCandidateBuffer {
    pending: RefCell<Vec<IceCandidate>>,

    /// Whether the remote description was applied and the buffer drained.
    flushed: Cell<bool>,
}

impl IceCandidateBuffer {
    /// Creates a new empty [`IceCandidateBuffer`].
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers a remote [`IceCandidate`] to this buffer.
    ///
    /// Returns the candidate back if it may be applied right away, or queues
    /// it and returns [`None`] otherwise.
    pub fn offer(&self, candidate: IceCandidate) -> Option<IceCandidate> {
        if self.flushed.get() {
            Some(candidate)
        } else {
            self.pending.borrow_mut().push(candidate);
            None
        }
    }

    /// Number of queued candidates.
    #[inline]
    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Indicates whether no candidates are queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    /// Indicates whether this buffer has been flushed already.
    #[inline]
    pub fn is_flushed(&self) -> bool {
        self.flushed.get()
    }

    /// Applies all the queued candidates to the provided
    /// [`RtcPeerConnection`] in their arrival order, so every further
    /// candidate bypasses this buffer.
    ///
    /// A candidate failing to apply is logged and skipped. Returns the number
    /// of applied candidates.
    pub async fn flush(&self, peer: &dyn RtcPeerConnection) -> usize {
        self.flushed.set(true);
        let pending = self.pending.replace(Vec::new());

        let mut applied = 0;
        for candidate in &pending {
            match peer.add_ice_candidate(candidate).await {
                Ok(()) => applied += 1,
                Err(e) => log::error!(
                    "Failed to apply buffered ICE candidate: {}",
                    e,
                ),
            }
        }
        applied
    }
}
