use std::fmt;
use std::sync::Arc;

use crate::traits::media_platform::{MediaTrack, TrackKind};

/// A set of live media tracks.
///
/// Tracks are shared handles: adding a track to another stream transfers the
/// same underlying source, it does not duplicate it.
#[derive(Clone, Default)]
pub struct MediaStream {
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl MediaStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tracks(tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self { tracks }
    }

    pub fn add_track(&mut self, track: Arc<dyn MediaTrack>) {
        self.tracks.push(track);
    }

    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    pub fn video_tracks(&self) -> Vec<Arc<dyn MediaTrack>> {
        self.tracks_of(TrackKind::Video)
    }

    pub fn audio_tracks(&self) -> Vec<Arc<dyn MediaTrack>> {
        self.tracks_of(TrackKind::Audio)
    }

    pub fn has_audio(&self) -> bool {
        self.tracks.iter().any(|t| t.kind() == TrackKind::Audio)
    }

    /// Stop every track, releasing the underlying device.
    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    fn tracks_of(&self, kind: TrackKind) -> Vec<Arc<dyn MediaTrack>> {
        self.tracks.iter().filter(|t| t.kind() == kind).cloned().collect()
    }
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.tracks.iter().map(|t| t.id()).collect();
        f.debug_struct("MediaStream").field("tracks", &ids).finish()
    }
}
