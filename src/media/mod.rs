//! Acquiring and owning local capture media.

pub mod constraints;
mod manager;
mod track;

use derive_more::Display;

use crate::platform;

#[doc(inline)]
pub use self::{
    constraints::{
        AudioTrackConstraints, CapabilityProbe, MediaStreamConstraints,
        VideoTrackConstraints, CAPABILITY_PROBES,
    },
    manager::{MediaManager, MediaManagerError},
    track::LocalStream,
};

/// Kind of a media track.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum MediaKind {
    /// Audio track.
    #[display(fmt = "audio")]
    Audio,

    /// Video track.
    #[display(fmt = "video")]
    Video,
}

/// Media capability the local side ended up with.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum MediaMode {
    /// At least one video track was acquired.
    #[display(fmt = "video")]
    Video,

    /// Audio only.
    #[display(fmt = "audio")]
    Audio,

    /// No capture media at all.
    #[display(fmt = "text")]
    Text,
}

impl Default for MediaMode {
    #[inline]
    fn default() -> Self {
        Self::Text
    }
}

/// Information about a media input device.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InputDeviceInfo {
    /// Unique identifier of the device.
    pub device_id: String,

    /// [`MediaKind`] this device captures.
    pub kind: MediaKind,

    /// Human readable label of the device.
    pub label: String,
}

/// Reasons of a refused capture request.
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum GetUserMediaError {
    /// User or platform denied access to the device.
    #[display(fmt = "Permission denied: {}", _0)]
    NotAllowed(String),

    /// No device satisfies the request.
    #[display(fmt = "Device not found: {}", _0)]
    NotFound(String),

    /// The device is present but cannot be read (busy or broken).
    #[display(fmt = "Device is not readable: {}", _0)]
    NotReadable(String),

    /// The device cannot satisfy the requested constraints.
    #[display(fmt = "Constraints cannot be satisfied: {}", _0)]
    Overconstrained(String),

    /// Any other platform failure.
    #[display(fmt = "Failed to get user media: {}", _0)]
    Other(platform::Error),
}

impl GetUserMediaError {
    /// Maps a [DOMException] name reported by a capture backend to the
    /// matching [`GetUserMediaError`].
    ///
    /// [DOMException]: https://webidl.spec.whatwg.org/#idl-DOMException
    pub fn from_name(name: &str, message: String) -> Self {
        match name {
            "NotAllowedError" | "PermissionDeniedError" | "SecurityError" => {
                Self::NotAllowed(message)
            }
            "NotFoundError" | "DevicesNotFoundError" => Self::NotFound(message),
            "NotReadableError" | "TrackStartError" | "AbortError" => {
                Self::NotReadable(message)
            }
            "OverconstrainedError" | "ConstraintNotSatisfiedError" => {
                Self::Overconstrained(message)
            }
            _ => Self::Other(platform::Error::new(message)),
        }
    }

    /// Returns a short machine-readable name of this error.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotAllowed(_) => "NotAllowed",
            Self::NotFound(_) => "NotFound",
            Self::NotReadable(_) => "NotReadable",
            Self::Overconstrained(_) => "Overconstrained",
            Self::Other(_) => "Other",
        }
    }
}
