use serde::{Deserialize, Serialize};

use crate::error::{CaptureError, InputError};
use crate::speech::{capture_once, ListenSettings, SpeechRecognizer};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    #[default]
    Typed,
    Spoken,
}

impl InputMode {
    pub fn toggled(self) -> Self {
        match self {
            InputMode::Typed => InputMode::Spoken,
            InputMode::Spoken => InputMode::Typed,
        }
    }
}

/// Persistent text buffer for typed responses.
#[derive(Debug, Default, Clone)]
pub struct TypedInput {
    buffer: String,
}

impl TypedInput {
    pub fn push(&mut self, c: char) {
        self.buffer.push(c);
    }

    pub fn backspace(&mut self) {
        self.buffer.pop();
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.buffer = text.into();
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// The trimmed buffer, or `NoResponse` if nothing but whitespace was typed.
    pub fn current_response(&self) -> Result<String, InputError> {
        match self.buffer.trim() {
            "" => Err(InputError::NoResponse),
            text => Ok(text.to_string()),
        }
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CaptureStatus {
    #[default]
    Idle,
    Pending,
    Captured(String),
    Failed(CaptureError),
}

/// Spoken responses: at most one capture attempt in flight.
#[derive(Debug, Clone, Default)]
pub struct SpokenInput {
    status: CaptureStatus,
    settings: ListenSettings,
}

impl SpokenInput {
    pub fn new(settings: ListenSettings) -> Self {
        Self {
            status: CaptureStatus::Idle,
            settings,
        }
    }

    pub fn status(&self) -> &CaptureStatus {
        &self.status
    }

    pub fn settings(&self) -> &ListenSettings {
        &self.settings
    }

    pub fn is_pending(&self) -> bool {
        self.status == CaptureStatus::Pending
    }

    /// Mark a capture as in flight. Returns false (and does nothing) if one already is.
    pub fn begin_capture(&mut self) -> bool {
        if self.is_pending() {
            tracing::debug!("capture already pending, ignoring request");
            return false;
        }
        self.status = CaptureStatus::Pending;
        true
    }

    /// Run the pending capture to completion. Does nothing unless a capture is pending.
    pub fn complete_capture<R: SpeechRecognizer + ?Sized>(
        &mut self,
        recognizer: &mut R,
    ) -> Option<&CaptureStatus> {
        if !self.is_pending() {
            return None;
        }

        self.status = match capture_once(recognizer, &self.settings) {
            Ok(text) => CaptureStatus::Captured(text),
            Err(err) => {
                tracing::warn!(error = %err, "speech capture failed");
                CaptureStatus::Failed(err)
            }
        };
        Some(&self.status)
    }

    /// Drop a pending capture and any transcript not yet submitted.
    pub fn cancel(&mut self) -> bool {
        let was_pending = self.is_pending();
        if was_pending {
            tracing::info!("pending speech capture cancelled");
        }
        self.status = CaptureStatus::Idle;
        was_pending
    }

    pub fn current_response(&self) -> Result<String, InputError> {
        match &self.status {
            CaptureStatus::Captured(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            CaptureStatus::Pending => Err(InputError::CapturePending),
            _ => Err(InputError::NoResponse),
        }
    }

    pub fn clear(&mut self) {
        self.status = CaptureStatus::Idle;
    }
}

/// The two mutually exclusive response channels and which one is active.
#[derive(Debug, Clone, Default)]
pub struct InputCapture {
    mode: InputMode,
    pub typed: TypedInput,
    pub spoken: SpokenInput,
}

impl InputCapture {
    pub fn new(mode: InputMode, settings: ListenSettings) -> Self {
        Self {
            mode,
            typed: TypedInput::default(),
            spoken: SpokenInput::new(settings),
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// Switch channels. Any pending capture is cancelled; returns whether one was.
    pub fn switch_mode(&mut self, mode: InputMode) -> bool {
        if mode == self.mode {
            return false;
        }
        let cancelled = self.spoken.cancel();
        tracing::info!(from = %self.mode, to = %mode, "input mode switched");
        self.mode = mode;
        cancelled
    }

    pub fn current_response(&self) -> Result<String, InputError> {
        match self.mode {
            InputMode::Typed => self.typed.current_response(),
            InputMode::Spoken => self.spoken.current_response(),
        }
    }

    /// Clear the active channel once its response has been accepted.
    pub fn commit(&mut self) {
        match self.mode {
            InputMode::Typed => self.typed.clear(),
            InputMode::Spoken => self.spoken.clear(),
        }
    }

    pub fn reset(&mut self) {
        self.typed.clear();
        self.spoken.cancel();
    }
}
