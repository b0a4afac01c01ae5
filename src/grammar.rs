//! Grammar checking collaborator.
//!
//! The aggregator only sees the [`GrammarChecker`] trait; the LanguageTool
//! client below is the production implementation.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::error::GrammarError;

/// One flagged problem in a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarIssue {
    pub message: String,
    pub replacements: Vec<String>,
}

impl GrammarIssue {
    pub fn new<I, S>(message: impl Into<String>, replacements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            message: message.into(),
            replacements: replacements.into_iter().map(Into::into).collect(),
        }
    }
}

pub trait GrammarChecker {
    /// Check `text` and return issues in the order the engine reports them.
    fn check(&self, text: &str) -> Result<Vec<GrammarIssue>, GrammarError>;
}

impl<G: GrammarChecker + ?Sized> GrammarChecker for &G {
    fn check(&self, text: &str) -> Result<Vec<GrammarIssue>, GrammarError> {
        (**self).check(text)
    }
}

impl<G: GrammarChecker + ?Sized> GrammarChecker for Box<G> {
    fn check(&self, text: &str) -> Result<Vec<GrammarIssue>, GrammarError> {
        (**self).check(text)
    }
}

#[derive(Clone, Debug)]
pub struct LanguageToolConfig {
    pub endpoint: String,
    pub language: String,
    pub timeout: Duration,
}

impl Default for LanguageToolConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.languagetool.org/v2/check".into(),
            language: "en-US".into(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Client for a LanguageTool `/v2/check` endpoint (public or self-hosted).
#[derive(Clone, Debug)]
pub struct LanguageToolChecker {
    client: Client,
    config: LanguageToolConfig,
}

impl LanguageToolChecker {
    /// # Errors
    ///
    /// Returns `GrammarError::Http` if the HTTP client cannot be built.
    pub fn new(config: LanguageToolConfig) -> Result<Self, GrammarError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

impl GrammarChecker for LanguageToolChecker {
    fn check(&self, text: &str) -> Result<Vec<GrammarIssue>, GrammarError> {
        tracing::debug!(endpoint = %self.config.endpoint, chars = text.len(), "checking grammar");

        let response = self
            .client
            .post(&self.config.endpoint)
            .form(&[("text", text), ("language", self.config.language.as_str())])
            .send()?;

        if !response.status().is_success() {
            return Err(GrammarError::HttpStatus(response.status()));
        }

        let body = response.text()?;
        parse_check_response(&body)
    }
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    matches: Vec<CheckMatch>,
}

#[derive(Debug, Deserialize)]
struct CheckMatch {
    message: String,
    #[serde(default)]
    replacements: Vec<Replacement>,
}

#[derive(Debug, Deserialize)]
struct Replacement {
    value: String,
}

fn parse_check_response(body: &str) -> Result<Vec<GrammarIssue>, GrammarError> {
    let parsed: CheckResponse =
        serde_json::from_str(body).map_err(|e| GrammarError::Malformed(e.to_string()))?;

    Ok(parsed
        .matches
        .into_iter()
        .map(|m| GrammarIssue {
            message: m.message,
            replacements: m.replacements.into_iter().map(|r| r.value).collect(),
        })
        .collect())
}
