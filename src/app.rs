//! Adapter between terminal events and the session state machine.
//!
//! `App` owns the single `Session` and every collaborator. Key presses are
//! translated into `submit_identity` / `start` / `advance` / `reset`, capture
//! and export calls; everything the user needs to see ends up in `status`.

use std::path::PathBuf;

use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::error::InputError;
use crate::feedback::{FeedbackAggregator, FeedbackReport};
use crate::grammar::GrammarChecker;
use crate::input::{CaptureStatus, InputCapture, InputMode};
use crate::report::ReportExporter;
use crate::runtime::{AppEvent, EventSource, Runner, Ticker};
use crate::session::{Session, SessionMode, SessionState};
use crate::speech::SpeechRecognizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormField {
    #[default]
    Name,
    UserId,
}

/// Name / User ID fields shown before a session may start.
#[derive(Debug, Clone, Default)]
pub struct IdentityForm {
    pub name: String,
    pub user_id: String,
    pub focus: FormField,
}

impl IdentityForm {
    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            FormField::Name => &mut self.name,
            FormField::UserId => &mut self.user_id,
        }
    }

    fn next_field(&mut self) {
        self.focus = match self.focus {
            FormField::Name => FormField::UserId,
            FormField::UserId => FormField::Name,
        };
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

pub struct App {
    pub session: Session,
    pub input: InputCapture,
    pub form: IdentityForm,
    pub status: String,
    pub last_feedback: Option<FeedbackReport>,
    pub last_export: Option<PathBuf>,
    pub should_quit: bool,
    aggregator: FeedbackAggregator<Box<dyn GrammarChecker>>,
    recognizer: Box<dyn SpeechRecognizer>,
    exporter: ReportExporter,
}

fn mode_message(mode: InputMode) -> &'static str {
    match mode {
        InputMode::Spoken => "Speech Mode enabled. Press L to listen for your response.",
        InputMode::Typed => "Text Input Mode enabled. Type your response in the text box.",
    }
}

impl App {
    pub fn new(
        mut session: Session,
        input: InputCapture,
        aggregator: FeedbackAggregator<Box<dyn GrammarChecker>>,
        recognizer: Box<dyn SpeechRecognizer>,
        exporter: ReportExporter,
    ) -> Self {
        if session.state() == SessionState::NotStarted {
            if let Err(err) = session.open() {
                tracing::debug!(error = %err, "session already open");
            }
        }
        let status = match session.state() {
            SessionState::AwaitingUserInfo => "Enter your Name and User ID to begin.",
            _ => "Choose a mode to begin: (p)ractice or (t)est.",
        };

        Self {
            session,
            input,
            form: IdentityForm::default(),
            status: status.to_string(),
            last_feedback: None,
            last_export: None,
            should_quit: false,
            aggregator,
            recognizer,
            exporter,
        }
    }

    pub fn exporter(&self) -> &ReportExporter {
        &self.exporter
    }

    pub fn is_listening(&self) -> bool {
        self.input.spoken.is_pending()
    }

    /// Handle one event from `runner`. Returns whether the frame needs a redraw.
    ///
    /// A capture blocks the loop, so keys pressed while speaking pile up in the
    /// queue. Once it finishes, queued listen and submit keys are dropped so the
    /// answer is shown before anything acts on it.
    pub fn step<E: EventSource, T: Ticker>(&mut self, runner: &Runner<E, T>) -> bool {
        let event = runner.step();
        let was_listening = self.is_listening();
        let redraw = !matches!(event, AppEvent::Tick) || was_listening;
        self.handle_event(event);

        if was_listening && !self.is_listening() {
            for queued in runner.drain() {
                if is_capture_key(&queued) {
                    tracing::debug!(?queued, "dropped key pressed during capture");
                    continue;
                }
                self.handle_event(queued);
            }
        }
        redraw
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Key(key) => self.handle_key(key),
            AppEvent::Paste(text) => self.handle_paste(&text),
            AppEvent::Tick => self.on_tick(),
            AppEvent::Resize => {}
        }
    }

    /// Runs a capture requested on the previous event, after the UI has shown "Listening".
    pub fn on_tick(&mut self) {
        if !self.input.spoken.is_pending() {
            return;
        }
        let status = self
            .input
            .spoken
            .complete_capture(self.recognizer.as_mut())
            .cloned();

        self.status = match status {
            Some(CaptureStatus::Captured(text)) => {
                format!("Speech recognized: {text}. Press Enter to submit or L to try again.")
            }
            Some(CaptureStatus::Failed(err)) => format!("Error: {err}. Press L to try again."),
            _ => return,
        };
    }

    pub fn handle_paste(&mut self, text: &str) {
        match self.session.state() {
            SessionState::AwaitingUserInfo => self.form.focused_mut().push_str(text.trim()),
            SessionState::AwaitingResponse if self.input.mode() == InputMode::Typed => {
                let mut buffer = self.input.typed.text().to_string();
                buffer.push_str(text);
                self.input.typed.set_text(buffer);
            }
            _ => {}
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => {
                self.should_quit = true;
                return;
            }
            KeyCode::Char('c') if ctrl => {
                self.should_quit = true;
                return;
            }
            KeyCode::Char('r') if ctrl => {
                self.reset();
                return;
            }
            _ => {}
        }
        if matches!(key.code, KeyCode::Char(_)) && !is_plain(&key) {
            return;
        }

        match self.session.state() {
            SessionState::NotStarted => {}
            SessionState::AwaitingUserInfo => self.handle_form_key(key),
            SessionState::Ready => match key.code {
                KeyCode::Char('p') => self.start(SessionMode::Practice),
                KeyCode::Char('t') => self.start(SessionMode::Test),
                KeyCode::Tab | KeyCode::Char('i') => self.toggle_input_mode(),
                _ => {}
            },
            SessionState::AwaitingResponse => self.handle_answer_key(key),
            SessionState::Complete => match key.code {
                KeyCode::Char('d') => self.export_report(),
                KeyCode::Char('r') => self.reset(),
                _ => {}
            },
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Tab | KeyCode::Down | KeyCode::Up | KeyCode::BackTab => self.form.next_field(),
            KeyCode::Backspace => {
                self.form.focused_mut().pop();
            }
            KeyCode::Enter => self.submit_identity(),
            KeyCode::Char(c) => self.form.focused_mut().push(c),
            _ => {}
        }
    }

    fn handle_answer_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Tab {
            self.toggle_input_mode();
            return;
        }
        if key.code == KeyCode::Enter {
            self.submit_response();
            return;
        }

        match self.input.mode() {
            InputMode::Typed => match key.code {
                KeyCode::Backspace => self.input.typed.backspace(),
                KeyCode::Char(c) => self.input.typed.push(c),
                _ => {}
            },
            InputMode::Spoken => {
                if matches!(key.code, KeyCode::Char('l') | KeyCode::Char(' ')) {
                    self.listen();
                }
            }
        }
    }

    pub fn submit_identity(&mut self) {
        match self
            .session
            .submit_identity(&self.form.name, &self.form.user_id)
        {
            Ok(()) => {
                self.status =
                    "User info saved. You can now start (p)ractice or (t)est mode.".to_string()
            }
            Err(err) => self.status = format!("{}.", capitalize(&err.to_string())),
        }
    }

    pub fn start(&mut self, mode: SessionMode) {
        if let Err(err) = self.session.start(mode) {
            self.status = capitalize(&err.to_string());
            return;
        }
        self.last_feedback = None;
        self.last_export = None;
        self.input.reset();
        self.status = format!("{mode} Mode started. {}", mode_message(self.input.mode()));
    }

    pub fn toggle_input_mode(&mut self) {
        let next = self.input.mode().toggled();
        let cancelled = self.input.switch_mode(next);
        self.status = if cancelled {
            format!("Listening cancelled. {}", mode_message(next))
        } else {
            mode_message(next).to_string()
        };
    }

    /// Request a capture; it runs on the next tick. Ignored while one is pending.
    pub fn listen(&mut self) {
        if self.session.state() != SessionState::AwaitingResponse
            || self.input.mode() != InputMode::Spoken
        {
            return;
        }
        if self.input.spoken.begin_capture() {
            self.status = "Listening... Speak now.".to_string();
        }
    }

    pub fn submit_response(&mut self) {
        let response = match self.input.current_response() {
            Ok(response) => response,
            Err(InputError::CapturePending) => {
                self.status = "Still listening, please wait.".to_string();
                return;
            }
            Err(InputError::NoResponse) => {
                if self.input.mode() == InputMode::Spoken {
                    self.listen();
                } else {
                    self.status =
                        "Please provide a response before moving to the next question.".to_string();
                }
                return;
            }
        };

        match self.session.advance(&response, &self.aggregator) {
            Ok(outcome) => {
                self.input.commit();
                self.last_feedback = outcome.feedback;
                self.status = if outcome.completed {
                    "Session complete! Press (d) to download your results.".to_string()
                } else if self.session.mode() == Some(SessionMode::Test) {
                    "Test Mode - Proceeding to next question...".to_string()
                } else {
                    "Feedback ready. Answer the next question.".to_string()
                };
            }
            Err(err) => self.status = capitalize(&err.to_string()),
        }
    }

    pub fn export_report(&mut self) {
        match self.exporter.export(&self.session, Local::now()) {
            Ok(path) => {
                self.status = format!("Results saved to {}", path.display());
                self.last_export = Some(path);
            }
            Err(err) => {
                tracing::error!(path = ?err.path(), error = %err, "report export failed");
                self.status = format!("Could not save results: {err}");
            }
        }
    }

    pub fn reset(&mut self) {
        self.session.reset();
        self.input.reset();
        self.form.clear();
        self.last_feedback = None;
        self.last_export = None;
        self.status = match self.session.state() {
            SessionState::AwaitingUserInfo => "Session reset. Enter your Name and User ID.",
            _ => "Session reset. Choose (p)ractice or (t)est mode.",
        }
        .to_string();
    }
}

/// Characters typed without Ctrl or Alt; Shift still counts as plain.
fn is_plain(key: &KeyEvent) -> bool {
    !key
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
}

fn is_capture_key(event: &AppEvent) -> bool {
    matches!(
        event,
        AppEvent::Key(KeyEvent {
            code: KeyCode::Char('l') | KeyCode::Char('L') | KeyCode::Char(' ') | KeyCode::Enter,
            ..
        })
    )
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
