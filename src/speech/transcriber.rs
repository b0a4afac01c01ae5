use std::path::Path;
use std::process::{Command, Output};

use crate::error::CaptureError;

/// Turns a recorded WAV file into text.
pub trait Transcriber {
    fn transcribe(&mut self, audio: &Path) -> Result<String, CaptureError>;
}

/// Runs an external speech-to-text program.
///
/// `{input}` in the argv is replaced with the WAV path; the transcript is
/// read from stdout.
#[derive(Debug, Clone)]
pub struct CommandTranscriber {
    argv: Vec<String>,
}

impl CommandTranscriber {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

fn expand(template: &[String], vars: &[(&str, String)]) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            vars.iter().fold(arg.clone(), |acc, (key, value)| {
                acc.replace(&format!("{{{key}}}"), value)
            })
        })
        .collect()
}

fn run(argv: &[String]) -> Result<Output, CaptureError> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| CaptureError::Service("empty transcribe command".into()))?;

    Command::new(program)
        .args(args)
        .output()
        .map_err(|e| CaptureError::Service(format!("failed to run {program}: {e}")))
}

fn stderr_summary(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    match stderr.trim() {
        "" => format!("exited with {}", output.status),
        msg => msg.to_string(),
    }
}

impl Transcriber for CommandTranscriber {
    fn transcribe(&mut self, audio: &Path) -> Result<String, CaptureError> {
        let argv = expand(&self.argv, &[("input", audio.display().to_string())]);
        let output = run(&argv)?;
        if !output.status.success() {
            return Err(CaptureError::Service(stderr_summary(&output)));
        }

        let transcript = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if transcript.is_empty() {
            return Err(CaptureError::Unintelligible);
        }
        Ok(transcript)
    }
}
