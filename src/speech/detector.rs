//! Energy based speech detection over mono sample chunks.

use std::time::Duration;

use crate::error::CaptureError;

/// Floor for the speech threshold, so a silent room still needs audible speech.
pub const MIN_THRESHOLD: f32 = 0.01;
/// Speech has to be this much louder than the calibrated noise.
pub const ENERGY_RATIO: f32 = 1.5;
/// Trailing quiet that ends a phrase.
pub const DEFAULT_PAUSE: Duration = Duration::from_millis(800);

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

/// Average interleaved frames down to one channel.
pub fn to_mono(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

pub fn samples_for(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * f64::from(sample_rate)).round() as usize
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseGate {
    threshold: f32,
}

impl Default for NoiseGate {
    fn default() -> Self {
        Self {
            threshold: MIN_THRESHOLD,
        }
    }
}

impl NoiseGate {
    /// Gate tuned to the ambient noise in `noise`.
    pub fn calibrated(noise: &[f32]) -> Self {
        Self {
            threshold: (rms(noise) * ENERGY_RATIO).max(MIN_THRESHOLD),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn is_speech(&self, chunk: &[f32]) -> bool {
        rms(chunk) > self.threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phrase {
    Waiting,
    Speaking,
    Finished,
}

/// Collects a single phrase from a stream of chunks.
///
/// Waits up to `timeout` worth of samples for speech to begin, then records
/// until a pause of `pause` or until `phrase_limit` worth of samples is held.
#[derive(Debug)]
pub struct PhraseDetector {
    gate: NoiseGate,
    timeout: usize,
    limit: usize,
    pause: usize,
    waited: usize,
    quiet: usize,
    samples: Vec<f32>,
    state: Phrase,
}

impl PhraseDetector {
    pub fn new(
        gate: NoiseGate,
        sample_rate: u32,
        timeout: Duration,
        phrase_limit: Duration,
        pause: Duration,
    ) -> Self {
        Self {
            gate,
            timeout: samples_for(timeout, sample_rate),
            limit: samples_for(phrase_limit, sample_rate),
            pause: samples_for(pause, sample_rate),
            waited: 0,
            quiet: 0,
            samples: Vec::new(),
            state: Phrase::Waiting,
        }
    }

    /// Feed the next chunk. Fails with `SilenceTimeout` once the wait for speech runs out.
    pub fn push(&mut self, chunk: &[f32]) -> Result<Phrase, CaptureError> {
        match self.state {
            Phrase::Finished => {}
            Phrase::Waiting => {
                if self.gate.is_speech(chunk) {
                    self.state = Phrase::Speaking;
                    self.record(chunk, false);
                } else {
                    self.waited += chunk.len();
                    if self.waited >= self.timeout {
                        return Err(CaptureError::SilenceTimeout);
                    }
                }
            }
            Phrase::Speaking => {
                let quiet = !self.gate.is_speech(chunk);
                self.record(chunk, quiet);
            }
        }
        Ok(self.state)
    }

    fn record(&mut self, chunk: &[f32], quiet: bool) {
        let room = self.limit.saturating_sub(self.samples.len());
        self.samples
            .extend_from_slice(&chunk[..chunk.len().min(room)]);
        self.quiet = if quiet { self.quiet + chunk.len() } else { 0 };
        if self.samples.len() >= self.limit || self.quiet >= self.pause {
            self.state = Phrase::Finished;
        }
    }

    pub fn state(&self) -> Phrase {
        self.state
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}
