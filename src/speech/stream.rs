//! Recognizer built on a live sample stream.
//!
//! Calibration measures the ambient noise floor, listening waits for speech
//! above it and keeps the phrase until a pause or the phrase limit, and the
//! phrase is written as a 16-bit mono WAV for the [`Transcriber`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use hound::{SampleFormat, WavSpec, WavWriter};

use super::detector::{samples_for, NoiseGate, Phrase, PhraseDetector, DEFAULT_PAUSE};
use super::transcriber::Transcriber;
use super::{Recording, SpeechRecognizer};
use crate::error::CaptureError;

/// How long to block for each chunk before checking the wall clock.
const CHUNK_WAIT: Duration = Duration::from_millis(100);

static CAPTURE_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Mono audio delivered in chunks, such as a microphone.
pub trait SampleSource {
    fn name(&self) -> &str;
    fn sample_rate(&self) -> u32;
    fn start(&mut self) -> Result<(), CaptureError>;
    /// Next chunk, or `None` if nothing arrived within `wait`.
    fn next_chunk(&mut self, wait: Duration) -> Result<Option<Vec<f32>>, CaptureError>;
    fn stop(&mut self);
}

pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
    }
    writer.finalize()
}

pub struct StreamingRecognizer<S, T> {
    source: S,
    transcriber: T,
    gate: NoiseGate,
    pause: Duration,
    scratch_dir: PathBuf,
}

impl<S: SampleSource, T: Transcriber> StreamingRecognizer<S, T> {
    pub fn new(source: S, transcriber: T) -> Self {
        Self {
            source,
            transcriber,
            gate: NoiseGate::default(),
            pause: DEFAULT_PAUSE,
            scratch_dir: std::env::temp_dir(),
        }
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_scratch_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.scratch_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn gate(&self) -> NoiseGate {
        self.gate
    }

    fn next_scratch_path(&self) -> PathBuf {
        let n = CAPTURE_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.scratch_dir
            .join(format!("speakwell-capture-{}-{n}.wav", std::process::id()))
    }

    fn collect_noise(&mut self, duration: Duration) -> Result<Vec<f32>, CaptureError> {
        let wanted = samples_for(duration, self.source.sample_rate());
        let deadline = Instant::now() + duration + CHUNK_WAIT;
        let mut noise = Vec::with_capacity(wanted);
        while noise.len() < wanted {
            match self.source.next_chunk(CHUNK_WAIT)? {
                Some(chunk) => noise.extend(chunk),
                None if Instant::now() >= deadline => break,
                None => {}
            }
        }
        Ok(noise)
    }

    fn record_phrase(
        &mut self,
        timeout: Duration,
        phrase_limit: Duration,
    ) -> Result<Vec<f32>, CaptureError> {
        let mut detector = PhraseDetector::new(
            self.gate,
            self.source.sample_rate(),
            timeout,
            phrase_limit,
            self.pause,
        );
        // a stalled device must not hang the capture
        let deadline = Instant::now() + timeout + phrase_limit + CHUNK_WAIT;
        loop {
            match self.source.next_chunk(CHUNK_WAIT)? {
                Some(chunk) => {
                    if detector.push(&chunk)? == Phrase::Finished {
                        break;
                    }
                }
                None if Instant::now() >= deadline => break,
                None => {}
            }
        }

        match detector.state() {
            Phrase::Waiting => Err(CaptureError::SilenceTimeout),
            _ => Ok(detector.into_samples()),
        }
    }
}

impl<S: SampleSource, T: Transcriber> SpeechRecognizer for StreamingRecognizer<S, T> {
    fn name(&self) -> &str {
        self.source.name()
    }

    fn calibrate(&mut self, duration: Duration) -> Result<(), CaptureError> {
        self.source.start()?;
        if duration.is_zero() {
            self.gate = NoiseGate::default();
            return Ok(());
        }

        let noise = match self.collect_noise(duration) {
            Ok(noise) if !noise.is_empty() => noise,
            Ok(_) => {
                self.source.stop();
                return Err(CaptureError::Service(
                    "no audio received from the input device".into(),
                ));
            }
            Err(err) => {
                self.source.stop();
                return Err(err);
            }
        };
        self.gate = NoiseGate::calibrated(&noise);
        tracing::debug!(
            threshold = self.gate.threshold(),
            samples = noise.len(),
            "noise floor calibrated"
        );
        Ok(())
    }

    fn listen(
        &mut self,
        timeout: Duration,
        phrase_limit: Duration,
    ) -> Result<Recording, CaptureError> {
        let phrase = self.record_phrase(timeout, phrase_limit);
        self.source.stop();
        let samples = phrase?;

        let path = self.next_scratch_path();
        if let Err(err) = write_wav(&path, &samples, self.source.sample_rate()) {
            if let Err(rm) = fs::remove_file(&path) {
                tracing::debug!(path = %path.display(), error = %rm, "no partial recording to remove");
            }
            return Err(CaptureError::Service(format!(
                "failed to write {}: {err}",
                path.display()
            )));
        }
        tracing::debug!(path = %path.display(), samples = samples.len(), "phrase recorded");
        Ok(Recording::new(path))
    }

    fn transcribe(&mut self, recording: Recording) -> Result<String, CaptureError> {
        let result = self.transcriber.transcribe(&recording.path);
        if let Err(err) = fs::remove_file(&recording.path) {
            tracing::warn!(path = %recording.path.display(), error = %err, "could not remove recording");
        }
        result
    }
}
