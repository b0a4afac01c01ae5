//! Default input device through cpal.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};

use super::detector::to_mono;
use super::stream::SampleSource;
use crate::error::CaptureError;

fn device_error(context: &str, err: impl std::fmt::Display) -> CaptureError {
    CaptureError::Service(format!("{context}: {err}"))
}

/// Streams mono chunks from the default microphone while started.
pub struct MicrophoneSource {
    device: Device,
    config: StreamConfig,
    name: String,
    stream: Option<(Stream, Receiver<Vec<f32>>)>,
}

impl MicrophoneSource {
    pub fn open_default() -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| CaptureError::Service("no input device available".into()))?;
        let config: StreamConfig = device
            .default_input_config()
            .map_err(|e| device_error("failed to get input config", e))?
            .into();
        let name = device.name().unwrap_or_else(|_| "microphone".to_string());

        tracing::info!(
            device = %name,
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "using input device"
        );
        Ok(Self {
            device,
            config,
            name,
            stream: None,
        })
    }
}

impl SampleSource for MicrophoneSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let (tx, rx) = mpsc::channel();
        let channels = usize::from(self.config.channels);
        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // the receiver goes away when a capture stops
                    let _ = tx.send(to_mono(data, channels));
                },
                |err: cpal::StreamError| tracing::error!(error = %err, "audio input stream error"),
                None,
            )
            .map_err(|e| device_error("failed to build input stream", e))?;
        stream
            .play()
            .map_err(|e| device_error("failed to start input stream", e))?;

        self.stream = Some((stream, rx));
        Ok(())
    }

    fn next_chunk(&mut self, wait: Duration) -> Result<Option<Vec<f32>>, CaptureError> {
        let Some((_, rx)) = &self.stream else {
            return Err(CaptureError::Service("input stream is not running".into()));
        };
        match rx.recv_timeout(wait) {
            Ok(chunk) => Ok(Some(chunk)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(CaptureError::Service("input stream closed".into()))
            }
        }
    }

    fn stop(&mut self) {
        if let Some((stream, _)) = self.stream.take() {
            if let Err(err) = stream.pause() {
                tracing::debug!(error = %err, "input stream did not pause before drop");
            }
        }
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        self.stop();
    }
}
