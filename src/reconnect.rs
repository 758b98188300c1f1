//! Reactions of a session to its counterpart coming and going.

use std::{future::Future, rc::Rc};

use tracerr::Traced;

use crate::{
    participants::{ParticipantId, RegistryEvent, Role},
    peer::HandleId,
    platform::RtcPeerConnectionError,
    session::{HandleSlot, SessionHandle},
};

/// What a session must do in response to a [`RegistryEvent`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Reaction {
    /// Replace the [`SessionHandle`] and negotiate from scratch.
    Rebuild,

    /// Counterpart confirmed the negotiated connection; keep it.
    AcknowledgeJoin,

    /// Local participant was removed from the session; tear down.
    ForceDisconnect,

    /// Nothing to do.
    Ignore,
}

/// Decides on [`Reaction`]s to [`RegistryEvent`]s and performs
/// [`SessionHandle`] replacements.
#[derive(Debug)]
pub struct ReconnectionController {
    role: Role,
    local_id: ParticipantId,
}

impl ReconnectionController {
    /// Creates a new [`ReconnectionController`] of the local participant.
    pub fn new(role: Role, local_id: ParticipantId) -> Self {
        Self { role, local_id }
    }

    /// Returns the [`Reaction`] to the provided [`RegistryEvent`], given the
    /// live [`SessionHandle`].
    ///
    /// The join announcement a responder sends after answering acknowledges
    /// the live connection instead of rebuilding it, and is consumed by this
    /// call.
    pub fn react(
        &self,
        event: &RegistryEvent,
        handle: Option<&SessionHandle>,
    ) -> Reaction {
        match event {
            RegistryEvent::Joined(participant) => {
                if self.role != Role::Initiator
                    || participant.role != Role::Responder
                {
                    return Reaction::Ignore;
                }
                let acknowledged = handle.map_or(false, |h| {
                    !h.is_closed() && h.negotiator().take_join_ack()
                });
                if acknowledged {
                    Reaction::AcknowledgeJoin
                } else {
                    Reaction::Rebuild
                }
            }
            RegistryEvent::Kicked(id) => {
                if id == &self.local_id {
                    Reaction::ForceDisconnect
                } else {
                    Reaction::Ignore
                }
            }
        }
    }

    /// Replaces the live [`SessionHandle`] of the provided [`HandleSlot`]
    /// with the one produced by `build`.
    ///
    /// The predecessor is closed before `build` is invoked, so no two
    /// connections of a session are ever open at once.
    ///
    /// # Errors
    ///
    /// If `build` fails. The slot stays empty then.
    pub async fn rebuild<F, Fut>(
        &self,
        slot: &HandleSlot,
        build: F,
    ) -> Result<Rc<SessionHandle>, Traced<RtcPeerConnectionError>>
    where
        F: FnOnce(HandleId) -> Fut,
        Fut: Future<
            Output = Result<SessionHandle, Traced<RtcPeerConnectionError>>,
        >,
    {
        if let Some(old) = slot.take() {
            old.close();
            log::info!("SessionHandle [id = {}] closed for rebuild", old.id());
        }

        let handle = build(slot.next_id())
            .await
            .map_err(tracerr::wrap!())?;
        let handle = Rc::new(handle);
        slot.set(Rc::clone(&handle));
        Ok(handle)
    }

    /// Closes and removes the live [`SessionHandle`], if any.
    ///
    /// Returns `true` if there was one.
    pub fn teardown(&self, slot: &HandleSlot) -> bool {
        if let Some(handle) = slot.take() {
            handle.close();
            log::debug!("SessionHandle [id = {}] torn down", handle.id());
            true
        } else {
            false
        }
    }
}
