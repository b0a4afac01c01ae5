//! Speech-to-text collaborator.
//!
//! A capture is three phases: ambient-noise calibration, a bounded listen,
//! then transcription. Each phase may fail on its own; [`capture_once`]
//! drives all three and reports the first failure.

pub mod detector;
#[cfg(feature = "audio-io")]
pub mod microphone;
pub mod stream;
pub mod transcriber;

use std::path::PathBuf;
use std::time::Duration;

use crate::error::CaptureError;

#[cfg(feature = "audio-io")]
pub use microphone::MicrophoneSource;
pub use stream::{SampleSource, StreamingRecognizer};
pub use transcriber::{CommandTranscriber, Transcriber};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenSettings {
    pub calibration: Duration,
    pub timeout: Duration,
    pub phrase_limit: Duration,
}

impl Default for ListenSettings {
    fn default() -> Self {
        Self {
            calibration: Duration::from_secs(1),
            timeout: Duration::from_secs(5),
            phrase_limit: Duration::from_secs(10),
        }
    }
}

/// Audio captured by [`SpeechRecognizer::listen`], handed back for transcription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    pub path: PathBuf,
}

impl Recording {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

pub trait SpeechRecognizer {
    fn name(&self) -> &str;
    fn calibrate(&mut self, duration: Duration) -> Result<(), CaptureError>;
    fn listen(
        &mut self,
        timeout: Duration,
        phrase_limit: Duration,
    ) -> Result<Recording, CaptureError>;
    fn transcribe(&mut self, recording: Recording) -> Result<String, CaptureError>;
}

/// Run one full capture attempt. Timeouts are terminal for the attempt.
pub fn capture_once<R: SpeechRecognizer + ?Sized>(
    recognizer: &mut R,
    settings: &ListenSettings,
) -> Result<String, CaptureError> {
    tracing::info!(recognizer = recognizer.name(), "calibrating for ambient noise");
    recognizer.calibrate(settings.calibration)?;

    tracing::info!(
        timeout_secs = settings.timeout.as_secs_f64(),
        phrase_limit_secs = settings.phrase_limit.as_secs_f64(),
        "listening for speech"
    );
    let recording = recognizer.listen(settings.timeout, settings.phrase_limit)?;

    let transcript = recognizer.transcribe(recording)?;
    let transcript = transcript.trim();
    if transcript.is_empty() {
        return Err(CaptureError::Unintelligible);
    }

    tracing::info!(chars = transcript.len(), "speech recognized");
    Ok(transcript.to_string())
}

/// Stands in when no microphone or transcriber is available; every capture fails with `error`.
#[derive(Debug, Clone)]
pub struct UnavailableRecognizer {
    error: CaptureError,
}

impl UnavailableRecognizer {
    pub fn new(error: CaptureError) -> Self {
        Self { error }
    }
}

impl Default for UnavailableRecognizer {
    fn default() -> Self {
        Self::new(CaptureError::Service(
            "speech capture is not configured".into(),
        ))
    }
}

impl SpeechRecognizer for UnavailableRecognizer {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn calibrate(&mut self, _duration: Duration) -> Result<(), CaptureError> {
        Err(self.error.clone())
    }

    fn listen(&mut self, _: Duration, _: Duration) -> Result<Recording, CaptureError> {
        Err(self.error.clone())
    }

    fn transcribe(&mut self, _recording: Recording) -> Result<String, CaptureError> {
        Err(self.error.clone())
    }
}
