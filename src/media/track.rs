//! Acquired local capture tracks.

use std::{cell::Cell, rc::Rc};

use crate::{
    media::{MediaKind, MediaMode},
    platform::MediaStreamTrack,
};

/// Set of local capture tracks acquired by a [`MediaManager`].
///
/// Tracks are released with [`LocalStream::stop`], which takes effect only
/// once.
///
/// [`MediaManager`]: crate::media::MediaManager
#[derive(Debug)]
pub struct LocalStream {
    tracks: Vec<Rc<dyn MediaStreamTrack>>,
    stopped: Cell<bool>,
}

impl LocalStream {
    /// Wraps the provided acquired tracks.
    #[inline]
    pub fn new(tracks: Vec<Rc<dyn MediaStreamTrack>>) -> Self {
        Self {
            tracks,
            stopped: Cell::new(false),
        }
    }

    /// Returns all the tracks of this [`LocalStream`].
    #[inline]
    pub fn tracks(&self) -> &[Rc<dyn MediaStreamTrack>] {
        &self.tracks
    }

    /// Returns the first track of the provided [`MediaKind`].
    pub fn track(&self, kind: MediaKind) -> Option<&Rc<dyn MediaStreamTrack>> {
        self.tracks.iter().find(|t| t.kind() == kind)
    }

    /// Derives the [`MediaMode`] these tracks provide.
    pub fn media_mode(&self) -> MediaMode {
        if self.track(MediaKind::Video).is_some() {
            MediaMode::Video
        } else if self.track(MediaKind::Audio).is_some() {
            MediaMode::Audio
        } else {
            MediaMode::Text
        }
    }

    /// Flips the `enabled` flag of the track of the provided [`MediaKind`].
    ///
    /// Returns the new value, or [`None`] if there is no such track.
    pub fn toggle(&self, kind: MediaKind) -> Option<bool> {
        let track = self.track(kind)?;
        let enabled = !track.enabled();
        track.set_enabled(enabled);
        Some(enabled)
    }

    /// Stops all the tracks.
    ///
    /// Returns `false` if this [`LocalStream`] has been stopped already.
    pub fn stop(&self) -> bool {
        if self.stopped.replace(true) {
            return false;
        }
        for track in &self.tracks {
            track.stop();
        }
        true
    }

    /// Indicates whether [`LocalStream::stop`] has been called.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped.get()
    }
}
