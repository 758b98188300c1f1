use std::{fmt, rc::Rc};

use async_trait::async_trait;

use crate::{
    media::{
        GetUserMediaError, InputDeviceInfo, MediaKind, MediaStreamConstraints,
    },
    platform,
};

/// Capture track produced by the platform.
pub trait MediaStreamTrack: fmt::Debug {
    /// Returns unique identifier of this track.
    fn id(&self) -> String;

    /// Returns [`MediaKind`] of this track.
    fn kind(&self) -> MediaKind;

    /// Indicates whether this track currently produces media.
    fn enabled(&self) -> bool;

    /// Sets the `enabled` flag of this track.
    fn set_enabled(&self, enabled: bool);

    /// Stops this track, releasing its capture device.
    fn stop(&self);
}

/// Access to the capture devices of the platform.
#[async_trait(?Send)]
pub trait MediaDevices {
    /// Collects information about the available media input devices.
    ///
    /// # Errors
    ///
    /// If the platform refuses to list its devices.
    async fn enumerate_devices(
        &self,
    ) -> Result<Vec<InputDeviceInfo>, platform::Error>;

    /// Prompts for access to the devices satisfying the provided
    /// [`MediaStreamConstraints`].
    ///
    /// # Errors
    ///
    /// With a [`GetUserMediaError`] describing why the capture was refused.
    async fn get_user_media(
        &self,
        constraints: &MediaStreamConstraints,
    ) -> Result<Vec<Rc<dyn MediaStreamTrack>>, GetUserMediaError>;
}
