use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::feedback::{FeedbackAggregator, FeedbackReport};
use crate::grammar::GrammarChecker;
use crate::questions::Question;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum SessionState {
    #[strum(to_string = "not started")]
    NotStarted,
    #[strum(to_string = "awaiting user info")]
    AwaitingUserInfo,
    #[strum(to_string = "ready")]
    Ready,
    #[strum(to_string = "awaiting a response")]
    AwaitingResponse,
    #[strum(to_string = "complete")]
    Complete,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Feedback after every response.
    Practice,
    /// Feedback deferred until the last question is answered.
    Test,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceOutcome {
    /// Feedback for the response just recorded (practice mode only).
    pub feedback: Option<FeedbackReport>,
    pub completed: bool,
}

/// One question with its response and feedback, as exported.
#[derive(Debug, Clone, Copy)]
pub struct SessionRecord<'a> {
    pub question: &'a Question,
    pub response: &'a str,
    pub feedback: Option<&'a FeedbackReport>,
}

/// Aggregate root for one sitting: questions, responses, feedback and progress.
#[derive(Debug, Clone)]
pub struct Session {
    questions: Vec<Question>,
    responses: Vec<String>,
    feedback: Vec<FeedbackReport>,
    index: usize,
    mode: Option<SessionMode>,
    state: SessionState,
    identity: Option<Identity>,
    require_identity: bool,
    started_at: Option<DateTime<Local>>,
    completed_at: Option<DateTime<Local>>,
}

impl Session {
    pub fn new(questions: Vec<Question>, require_identity: bool) -> Self {
        Self {
            questions,
            responses: Vec::new(),
            feedback: Vec::new(),
            index: 0,
            mode: None,
            state: SessionState::NotStarted,
            identity: None,
            require_identity,
            started_at: None,
            completed_at: None,
        }
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        tracing::debug!(action, state = %self.state, "rejected session transition");
        SessionError::InvalidTransition {
            action,
            state: self.state,
        }
    }

    fn idle_state(&self) -> SessionState {
        if self.require_identity {
            SessionState::AwaitingUserInfo
        } else {
            SessionState::Ready
        }
    }

    /// Leave `NotStarted`, asking for identity first if required.
    pub fn open(&mut self) -> Result<SessionState, SessionError> {
        if self.state != SessionState::NotStarted {
            return Err(self.invalid("open the session"));
        }
        self.state = self.idle_state();
        tracing::info!(state = %self.state, "session opened");
        Ok(self.state)
    }

    pub fn submit_identity(&mut self, name: &str, user_id: &str) -> Result<(), SessionError> {
        if self.state != SessionState::AwaitingUserInfo {
            return Err(self.invalid("submit user info"));
        }

        let (name, user_id) = (name.trim(), user_id.trim());
        if name.is_empty() || user_id.is_empty() {
            return Err(SessionError::MissingIdentity);
        }

        self.identity = Some(Identity {
            name: name.to_string(),
            user_id: user_id.to_string(),
        });
        self.state = SessionState::Ready;
        tracing::info!("user info saved");
        Ok(())
    }

    /// Begin answering. The mode is fixed until the next reset.
    pub fn start(&mut self, mode: SessionMode) -> Result<(), SessionError> {
        if self.state != SessionState::Ready {
            return Err(self.invalid("start"));
        }

        self.index = 0;
        self.responses.clear();
        self.feedback.clear();
        self.mode = Some(mode);
        self.started_at = Some(Local::now());
        self.completed_at = None;
        self.state = if self.questions.is_empty() {
            SessionState::Complete
        } else {
            SessionState::AwaitingResponse
        };
        tracing::info!(%mode, questions = self.questions.len(), "session started");
        Ok(())
    }

    /// Record a response for the current question and move on.
    ///
    /// Empty responses are rejected without touching any session data.
    pub fn advance<G: GrammarChecker>(
        &mut self,
        response: &str,
        aggregator: &FeedbackAggregator<G>,
    ) -> Result<AdvanceOutcome, SessionError> {
        if self.state != SessionState::AwaitingResponse {
            return Err(self.invalid("submit a response"));
        }
        if response.trim().is_empty() {
            return Err(SessionError::EmptyResponse);
        }

        let question = &self.questions[self.index];
        let feedback = match self.mode {
            Some(SessionMode::Practice) => {
                let report = aggregator.aggregate(response, question);
                self.feedback.push(report.clone());
                Some(report)
            }
            _ => None,
        };
        self.responses.push(response.to_string());
        self.index += 1;
        tracing::info!(answered = self.index, total = self.questions.len(), "response recorded");

        let completed = self.index == self.questions.len();
        if completed {
            self.finalize(aggregator);
        }

        Ok(AdvanceOutcome {
            feedback,
            completed,
        })
    }

    fn finalize<G: GrammarChecker>(&mut self, aggregator: &FeedbackAggregator<G>) {
        let pending = self.feedback.len()..self.responses.len();
        for i in pending {
            let report = aggregator.aggregate(&self.responses[i], &self.questions[i]);
            self.feedback.push(report);
        }
        self.state = SessionState::Complete;
        self.completed_at = Some(Local::now());
        tracing::info!(responses = self.responses.len(), "session complete");
    }

    /// Clear everything, identity included, and return to the pre-session state.
    pub fn reset(&mut self) {
        self.index = 0;
        self.responses.clear();
        self.feedback.clear();
        self.mode = None;
        self.identity = None;
        self.started_at = None;
        self.completed_at = None;
        self.state = match self.state {
            SessionState::NotStarted => SessionState::NotStarted,
            _ => self.idle_state(),
        };
        tracing::info!(state = %self.state, "session reset");
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mode(&self) -> Option<SessionMode> {
        self.mode
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn responses(&self) -> &[String] {
        &self.responses
    }

    pub fn feedback(&self) -> &[FeedbackReport] {
        &self.feedback
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn requires_identity(&self) -> bool {
        self.require_identity
    }

    pub fn started_at(&self) -> Option<DateTime<Local>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Local>> {
        self.completed_at
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.state {
            SessionState::AwaitingResponse => self.questions.get(self.index),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == SessionState::Complete
    }

    pub fn records(&self) -> impl Iterator<Item = SessionRecord<'_>> {
        self.questions
            .iter()
            .zip(self.responses.iter())
            .enumerate()
            .map(move |(i, (question, response))| SessionRecord {
                question,
                response,
                feedback: self.feedback.get(i),
            })
    }
}
