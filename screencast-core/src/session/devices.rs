use crate::models::stream::MediaStream;
use crate::traits::media_platform::AudioMixContext;

/// Capture device handles owned by a recording session.
///
/// Released exactly once, either explicitly or when dropped, so every exit
/// from recording (stop, engine error, failed acquisition, reset) stops the
/// tracks and closes the audio context.
#[derive(Default)]
pub(crate) struct DeviceHandles {
    pub display: Option<MediaStream>,
    pub microphone: Option<MediaStream>,
    pub mixed: Option<MediaStream>,
    pub audio_context: Option<Box<dyn AudioMixContext>>,
}

impl DeviceHandles {
    pub fn is_empty(&self) -> bool {
        self.display.is_none() && self.microphone.is_none() && self.mixed.is_none() && self.audio_context.is_none()
    }

    pub fn release(&mut self) {
        if self.is_empty() {
            return;
        }
        for stream in [self.display.take(), self.microphone.take(), self.mixed.take()]
            .into_iter()
            .flatten()
        {
            stream.stop_all();
        }
        if let Some(mut context) = self.audio_context.take() {
            context.close();
        }
        log::debug!("released capture devices");
    }
}

impl Drop for DeviceHandles {
    fn drop(&mut self) {
        self.release();
    }
}
