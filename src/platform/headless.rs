//! [`MediaDevices`] of a machine without capture hardware.

use std::rc::Rc;

use async_trait::async_trait;

use crate::{
    media::{GetUserMediaError, InputDeviceInfo, MediaStreamConstraints},
    platform::{self, MediaDevices, MediaStreamTrack},
};

/// [`MediaDevices`] exposing no input devices at all.
///
/// Sessions using it always end up in text mode.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeadlessMediaDevices;

#[async_trait(?Send)]
impl MediaDevices for HeadlessMediaDevices {
    async fn enumerate_devices(
        &self,
    ) -> Result<Vec<InputDeviceInfo>, platform::Error> {
        Ok(Vec::new())
    }

    async fn get_user_media(
        &self,
        _: &MediaStreamConstraints,
    ) -> Result<Vec<Rc<dyn MediaStreamTrack>>, GetUserMediaError> {
        Err(GetUserMediaError::NotFound(
            "no capture devices are attached".to_owned(),
        ))
    }
}
