//! Acquiring local capture tracks with graceful degradation.

use std::rc::Rc;

use derive_more::Display;

use crate::{
    media::{GetUserMediaError, LocalStream, MediaMode, CAPABILITY_PROBES},
    platform::{self, MediaDevices},
};

/// Failures observed while acquiring media.
///
/// None of them is fatal: acquisition degrades down to [`MediaMode::Text`].
#[derive(Clone, Debug, Display)]
pub enum MediaManagerError {
    /// Input devices cannot be listed.
    #[display(fmt = "Failed to enumerate devices: {}", _0)]
    EnumerateDevices(platform::Error),

    /// A capability probe was refused.
    #[display(fmt = "Capability probe `{}` failed: {}", _0, _1)]
    ProbeFailed(&'static str, GetUserMediaError),
}

/// Acquires local capture tracks.
pub struct MediaManager {
    devices: Rc<dyn MediaDevices>,
}

impl MediaManager {
    /// Creates a new [`MediaManager`] capturing from the provided
    /// [`MediaDevices`].
    #[inline]
    pub fn new(devices: Rc<dyn MediaDevices>) -> Self {
        Self { devices }
    }

    /// Acquires the best [`LocalStream`] the devices allow.
    ///
    /// Walks [`CAPABILITY_PROBES`] in order and stops at the first one
    /// yielding any track. Never fails: no usable device results in
    /// [`MediaMode::Text`] and no stream.
    pub async fn acquire(&self) -> (Option<LocalStream>, MediaMode) {
        match self.devices.enumerate_devices().await {
            Ok(devices) if devices.is_empty() => {
                log::info!("No input devices found, using text mode");
                return (None, MediaMode::Text);
            }
            Ok(devices) => {
                log::debug!("Found {} input devices", devices.len());
            }
            Err(e) => {
                log::warn!("{}", MediaManagerError::EnumerateDevices(e));
            }
        }

        for probe in CAPABILITY_PROBES.iter() {
            match self.devices.get_user_media(&probe.constraints).await {
                Ok(tracks) if !tracks.is_empty() => {
                    let stream = LocalStream::new(tracks);
                    let mode = stream.media_mode();
                    log::info!(
                        "Capability probe `{}` succeeded, media mode: {}",
                        probe.name,
                        mode,
                    );
                    return (Some(stream), mode);
                }
                Ok(_) => {
                    log::warn!(
                        "Capability probe `{}` yielded no tracks",
                        probe.name,
                    );
                }
                Err(e) => {
                    log::warn!(
                        "{} ({})",
                        MediaManagerError::ProbeFailed(probe.name, e.clone()),
                        e.name(),
                    );
                }
            }
        }

        log::info!("No capture media available, using text mode");
        (None, MediaMode::Text)
    }
}
