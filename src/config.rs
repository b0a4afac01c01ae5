use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app_dirs::AppDirs;
use crate::error::ConfigError;
use crate::grammar::LanguageToolConfig;
use crate::input::InputMode;
use crate::report::ReportFormat;
use crate::speech::ListenSettings;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GrammarSettings {
    pub endpoint: String,
    pub language: String,
    pub timeout_secs: u64,
}

impl Default for GrammarSettings {
    fn default() -> Self {
        let lt = LanguageToolConfig::default();
        Self {
            endpoint: lt.endpoint,
            language: lt.language,
            timeout_secs: lt.timeout.as_secs(),
        }
    }
}

impl From<&GrammarSettings> for LanguageToolConfig {
    fn from(gs: &GrammarSettings) -> Self {
        Self {
            endpoint: gs.endpoint.clone(),
            language: gs.language.clone(),
            timeout: Duration::from_secs(gs.timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeechSettings {
    pub calibration_secs: u64,
    pub listen_timeout_secs: u64,
    pub phrase_limit_secs: u64,
    /// Trailing quiet that ends a spoken answer.
    pub pause_millis: u64,
    /// Speech-to-text program; `{input}` is replaced with the recorded WAV.
    pub transcribe_command: Option<Vec<String>>,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            calibration_secs: 1,
            listen_timeout_secs: 5,
            phrase_limit_secs: 10,
            pause_millis: 800,
            transcribe_command: None,
        }
    }
}

impl SpeechSettings {
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_millis)
    }
}

impl From<&SpeechSettings> for ListenSettings {
    fn from(ss: &SpeechSettings) -> Self {
        Self {
            calibration: Duration::from_secs(ss.calibration_secs),
            timeout: Duration::from_secs(ss.listen_timeout_secs),
            phrase_limit: Duration::from_secs(ss.phrase_limit_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportSettings {
    pub output_dir: Option<PathBuf>,
    pub format: ReportFormat,
    pub page_lines: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            output_dir: None,
            format: ReportFormat::Text,
            page_lines: 55,
        }
    }
}

impl ReportSettings {
    pub fn resolved_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(AppDirs::default_results_dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub question_part: u8,
    pub require_identity: bool,
    pub input_mode: InputMode,
    pub grammar: GrammarSettings,
    pub speech: SpeechSettings,
    pub report: ReportSettings,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            question_part: 5,
            require_identity: true,
            input_mode: InputMode::Typed,
            grammar: GrammarSettings::default(),
            speech: SpeechSettings::default(),
            report: ReportSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("speakwell_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file yields the defaults; an unreadable or invalid one is an error.
    pub fn try_load(&self) -> Result<Config, ConfigError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        self.try_load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring unreadable config");
            Config::default()
        })
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).map_err(std::io::Error::other)?;
        fs::write(&self.path, data)
    }
}
