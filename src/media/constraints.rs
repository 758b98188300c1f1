//! Capture constraints and the ordered capability probes.

/// Constraints of an audio capture track.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AudioTrackConstraints {
    /// Whether echo cancellation is required.
    pub echo_cancellation: Option<bool>,

    /// Whether noise suppression is required.
    pub noise_suppression: Option<bool>,

    /// Whether automatic gain control is required.
    pub auto_gain_control: Option<bool>,
}

impl AudioTrackConstraints {
    /// Audio with all the voice processing enabled.
    pub const PROCESSED: Self = Self {
        echo_cancellation: Some(true),
        noise_suppression: Some(true),
        auto_gain_control: Some(true),
    };

    /// Whatever the default device produces.
    pub const ANY: Self = Self {
        echo_cancellation: None,
        noise_suppression: None,
        auto_gain_control: None,
    };
}

/// Constraints of a video capture track.
///
/// All the values are ideal, so a device never fails to satisfy them.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct VideoTrackConstraints {
    /// Ideal frame width in pixels.
    pub width: Option<u32>,

    /// Ideal frame height in pixels.
    pub height: Option<u32>,

    /// Ideal frames per second.
    pub frame_rate: Option<u32>,
}

impl VideoTrackConstraints {
    /// 720p at 30 frames per second.
    pub const HD: Self = Self {
        width: Some(1280),
        height: Some(720),
        frame_rate: Some(30),
    };

    /// Whatever the default device produces.
    pub const ANY: Self = Self {
        width: None,
        height: None,
        frame_rate: None,
    };
}

/// Request of a capture session: each kind is requested if present.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MediaStreamConstraints {
    /// Audio track to request.
    pub audio: Option<AudioTrackConstraints>,

    /// Video track to request.
    pub video: Option<VideoTrackConstraints>,
}

/// Named [`MediaStreamConstraints`] tried during media acquisition.
#[derive(Clone, Copy, Debug)]
pub struct CapabilityProbe {
    /// Name used when logging the outcome of this probe.
    pub name: &'static str,

    /// Constraints requested by this probe.
    pub constraints: MediaStreamConstraints,
}

/// Capability probes in the order of preference.
///
/// Acquisition stops at the first one that yields any track.
pub const CAPABILITY_PROBES: [CapabilityProbe; 4] = [
    CapabilityProbe {
        name: "hd-video+processed-audio",
        constraints: MediaStreamConstraints {
            audio: Some(AudioTrackConstraints::PROCESSED),
            video: Some(VideoTrackConstraints::HD),
        },
    },
    CapabilityProbe {
        name: "video+audio",
        constraints: MediaStreamConstraints {
            audio: Some(AudioTrackConstraints::ANY),
            video: Some(VideoTrackConstraints::ANY),
        },
    },
    CapabilityProbe {
        name: "audio",
        constraints: MediaStreamConstraints {
            audio: Some(AudioTrackConstraints::ANY),
            video: None,
        },
    },
    CapabilityProbe {
        name: "video",
        constraints: MediaStreamConstraints {
            audio: None,
            video: Some(VideoTrackConstraints::ANY),
        },
    },
];
