use std::sync::Arc;

use crate::models::error::RecorderError;
use crate::models::stream::MediaStream;
use crate::traits::media_platform::{AudioMixContext, MediaPlatform, MediaTrack};

/// A stream ready for the capture engine, plus the audio context that feeds
/// its audio track. The context must stay open while capturing and be closed
/// on release.
pub struct MixedStream {
    pub stream: MediaStream,
    pub audio_context: Option<Box<dyn AudioMixContext>>,
}

/// Combines a display stream and a microphone stream into one stream with
/// at most one audio track.
///
/// ```text
/// [Display video tracks] ──────────────────────────────→ [Mixed stream]
/// [Display audio] ─┐                                          ↑
///                  ├→ [AudioMixContext destination] → 1 audio track
/// [Mic audio] ─────┘
/// ```
///
/// Capture engines behave inconsistently with more than one audio track, so
/// every audio source is folded into a single destination track.
pub struct StreamMixer {
    platform: Arc<dyn MediaPlatform>,
}

impl StreamMixer {
    pub fn new(platform: Arc<dyn MediaPlatform>) -> Self {
        Self { platform }
    }

    pub fn mix(&self, display: &MediaStream, microphone: &MediaStream) -> Result<MixedStream, RecorderError> {
        let mut stream = MediaStream::new();
        for track in display.video_tracks() {
            stream.add_track(track);
        }

        let audio_sources: Vec<&MediaStream> = [display, microphone]
            .into_iter()
            .filter(|s| s.has_audio())
            .collect();

        if audio_sources.is_empty() {
            log::debug!("no audio sources, mixed stream is video-only");
            return Ok(MixedStream {
                stream,
                audio_context: None,
            });
        }

        let mut context = self.platform.create_audio_context()?;
        match Self::route(context.as_mut(), &audio_sources) {
            Ok(track) => {
                log::debug!("mixed {} audio source(s) into track {}", audio_sources.len(), track.id());
                stream.add_track(track);
                Ok(MixedStream {
                    stream,
                    audio_context: Some(context),
                })
            }
            Err(e) => {
                context.close();
                Err(e)
            }
        }
    }

    fn route(
        context: &mut dyn AudioMixContext,
        sources: &[&MediaStream],
    ) -> Result<Arc<dyn MediaTrack>, RecorderError> {
        // Contexts can start suspended until a user gesture.
        context.resume()?;
        let destination = context.create_destination()?;
        for source in sources {
            context.connect_source(source)?;
        }
        Ok(destination)
    }
}
