use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use speakwell::app::App;
use speakwell::error::{CaptureError, GrammarError};
use speakwell::feedback::{BandScore, FeedbackAggregator, NO_GRAMMAR_ISSUES};
use speakwell::grammar::{GrammarChecker, GrammarIssue};
use speakwell::input::{CaptureStatus, InputCapture, InputMode};
use speakwell::questions::QuestionBank;
use speakwell::report::{ReportExporter, ReportFormat};
use speakwell::runtime::{AppEvent, FixedTicker, Runner, TestEventSource};
use speakwell::session::{Session, SessionMode, SessionState};
use speakwell::speech::{ListenSettings, Recording, SpeechRecognizer};

// Headless integration: drives App through Runner/TestEventSource without a TTY.

/// Flags one issue for every response containing "goed".
struct KeywordGrammar {
    checked: Rc<RefCell<Vec<String>>>,
}

impl GrammarChecker for KeywordGrammar {
    fn check(&self, text: &str) -> Result<Vec<GrammarIssue>, GrammarError> {
        self.checked.borrow_mut().push(text.to_string());
        if text.contains("goed") {
            Ok(vec![GrammarIssue::new(
                "Possible verb form error",
                ["went"],
            )])
        } else {
            Ok(Vec::new())
        }
    }
}

struct OfflineGrammar;

impl GrammarChecker for OfflineGrammar {
    fn check(&self, _text: &str) -> Result<Vec<GrammarIssue>, GrammarError> {
        Err(GrammarError::Malformed("connection refused".into()))
    }
}

/// Replays queued transcripts, one per capture.
struct QueueRecognizer {
    transcripts: VecDeque<Result<String, CaptureError>>,
}

impl SpeechRecognizer for QueueRecognizer {
    fn name(&self) -> &str {
        "queue"
    }

    fn calibrate(&mut self, _duration: Duration) -> Result<(), CaptureError> {
        Ok(())
    }

    fn listen(&mut self, _: Duration, _: Duration) -> Result<Recording, CaptureError> {
        Ok(Recording::new("queued.wav"))
    }

    fn transcribe(&mut self, _recording: Recording) -> Result<String, CaptureError> {
        self.transcripts
            .pop_front()
            .unwrap_or(Err(CaptureError::SilenceTimeout))
    }
}

/// Queues more key presses while "speaking", as an impatient user would.
struct ImpatientRecognizer {
    keys: mpsc::Sender<AppEvent>,
    captures: Rc<RefCell<u32>>,
}

impl SpeechRecognizer for ImpatientRecognizer {
    fn name(&self) -> &str {
        "impatient"
    }

    fn calibrate(&mut self, _duration: Duration) -> Result<(), CaptureError> {
        Ok(())
    }

    fn listen(&mut self, _: Duration, _: Duration) -> Result<Recording, CaptureError> {
        *self.captures.borrow_mut() += 1;
        self.keys.send(key('l')).unwrap();
        self.keys.send(code(KeyCode::Enter)).unwrap();
        Ok(Recording::new("impatient.wav"))
    }

    fn transcribe(&mut self, _recording: Recording) -> Result<String, CaptureError> {
        Ok(format!(
            "I mostly read history books, attempt {}",
            self.captures.borrow()
        ))
    }
}

fn key(c: char) -> AppEvent {
    AppEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
}

fn code(code: KeyCode) -> AppEvent {
    AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
}

fn send_text(tx: &mpsc::Sender<AppEvent>, text: &str) {
    for c in text.chars() {
        tx.send(key(c)).unwrap();
    }
}

fn build_app(
    grammar: Box<dyn GrammarChecker>,
    transcripts: Vec<Result<String, CaptureError>>,
    mode: InputMode,
    require_identity: bool,
    out: &std::path::Path,
) -> App {
    let bank = QuestionBank::for_part(5).unwrap();
    App::new(
        Session::new(bank.into_questions(), require_identity),
        InputCapture::new(mode, ListenSettings::default()),
        FeedbackAggregator::new(grammar),
        Box::new(QueueRecognizer {
            transcripts: transcripts.into(),
        }),
        ReportExporter::new(out, ReportFormat::Text, 55),
    )
}

/// Pump events until the channel is drained, ticking in between.
fn drive(app: &mut App, runner: &Runner<TestEventSource, FixedTicker>, max_steps: u32) {
    let mut idle_ticks = 0;
    for _ in 0..max_steps {
        let redraw = app.step(runner);
        if app.should_quit {
            break;
        }
        if !redraw {
            idle_ticks += 1;
            if idle_ticks > 3 {
                break;
            }
        } else {
            idle_ticks = 0;
        }
    }
}

fn runner(rx: mpsc::Receiver<AppEvent>) -> Runner<TestEventSource, FixedTicker> {
    Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(2)),
    )
}

#[test]
fn headless_practice_session_with_identity_and_export() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("results");
    let checked = Rc::new(RefCell::new(Vec::new()));
    let mut app = build_app(
        Box::new(KeywordGrammar {
            checked: checked.clone(),
        }),
        Vec::new(),
        InputMode::Typed,
        true,
        &out,
    );

    let (tx, rx) = mpsc::channel();
    let runner = runner(rx);

    send_text(&tx, "Zoë");
    tx.send(code(KeyCode::Tab)).unwrap();
    send_text(&tx, "A-17");
    tx.send(code(KeyCode::Enter)).unwrap();
    tx.send(key('p')).unwrap();

    let answers = [
        "I like fishing.",
        "My favourite film is a very old detective story from Japan.",
        "Last year I goed to Lisbon with my family and we loved it.",
        "I would like to improve my public speaking skills this year.",
        "I usually spend my weekends hiking in the hills near my town.",
    ];
    for answer in answers {
        send_text(&tx, answer);
        tx.send(code(KeyCode::Enter)).unwrap();
    }
    tx.send(key('d')).unwrap();

    drive(&mut app, &runner, 1_000);

    assert_eq!(app.session.state(), SessionState::Complete);
    assert_eq!(app.session.mode(), Some(SessionMode::Practice));
    assert_eq!(app.session.responses().len(), 5);
    assert_eq!(app.session.feedback().len(), 5);
    assert_eq!(checked.borrow().len(), 5);

    let first = &app.session.feedback()[0];
    assert_eq!(first.entries()[0], NO_GRAMMAR_ISSUES);
    assert!(first.entries().iter().any(|e| e.contains("hobbies")));
    assert_eq!(first.band(), BandScore::Band9);

    let second = &app.session.feedback()[1];
    assert!(second.entries().iter().any(|e| e.contains("'very'")));

    let third = &app.session.feedback()[2];
    assert_eq!(
        third.entries()[0],
        "Issue: Possible verb form error Suggestion: went"
    );
    assert_eq!(third.band(), BandScore::Band8);

    let path = app.last_export.clone().expect("report exported");
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("A-17_Zoe_IELTS_"), "{name}");
    let doc = std::fs::read_to_string(&path).unwrap();
    assert!(doc.contains("User ID: A-17"));
    assert!(doc.contains("Name: Zoe"));
    assert!(doc.contains("Question 5: How do you usually spend your weekends?"));
}

#[test]
fn headless_test_mode_defers_feedback() {
    let dir = tempfile::tempdir().unwrap();
    let checked = Rc::new(RefCell::new(Vec::new()));
    let mut app = build_app(
        Box::new(KeywordGrammar {
            checked: checked.clone(),
        }),
        Vec::new(),
        InputMode::Typed,
        false,
        dir.path(),
    );
    let (tx, rx) = mpsc::channel();
    let runner = runner(rx);

    tx.send(key('t')).unwrap();
    for i in 0..4 {
        send_text(&tx, &format!("Answer number {i} with enough words."));
        tx.send(code(KeyCode::Enter)).unwrap();
    }
    drive(&mut app, &runner, 1_000);

    assert_eq!(app.session.index(), 4);
    assert!(app.session.feedback().is_empty());
    assert!(app.last_feedback.is_none());
    assert!(checked.borrow().is_empty());
    assert_eq!(app.status, "Test Mode - Proceeding to next question...");

    send_text(&tx, "The final answer, spoken with care.");
    tx.send(code(KeyCode::Enter)).unwrap();
    drive(&mut app, &runner, 1_000);

    assert!(app.session.is_complete());
    assert_eq!(app.session.feedback().len(), 5);
    assert_eq!(checked.borrow().len(), 5);
}

#[test]
fn headless_spoken_answers_with_retry() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = build_app(
        Box::new(OfflineGrammar),
        vec![
            Err(CaptureError::SilenceTimeout),
            Ok("I really enjoy painting landscapes on quiet afternoons".into()),
        ],
        InputMode::Spoken,
        false,
        dir.path(),
    );
    let (tx, rx) = mpsc::channel();
    let runner = runner(rx);

    tx.send(key('p')).unwrap();
    tx.send(key('l')).unwrap();
    drive(&mut app, &runner, 100);

    // silence: nothing recorded, retry allowed
    assert_eq!(app.session.index(), 0);
    assert!(app.status.starts_with("Error: no speech detected"));

    tx.send(key('l')).unwrap();
    drive(&mut app, &runner, 100);
    assert!(app.status.starts_with("Speech recognized"));

    tx.send(code(KeyCode::Enter)).unwrap();
    drive(&mut app, &runner, 100);

    assert_eq!(app.session.index(), 1);
    let fb = app.last_feedback.as_ref().unwrap();
    assert!(fb.entries()[0].starts_with("Grammar analysis unavailable"));
    assert_eq!(
        fb.band_line(),
        "IELTS Band Score: Band unavailable (grammar analysis failed)"
    );
}

#[test]
fn headless_reset_and_quit() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = build_app(
        Box::new(OfflineGrammar),
        Vec::new(),
        InputMode::Typed,
        true,
        dir.path(),
    );
    let (tx, rx) = mpsc::channel();
    let runner = runner(rx);

    send_text(&tx, "Ada");
    tx.send(code(KeyCode::Tab)).unwrap();
    send_text(&tx, "42");
    tx.send(code(KeyCode::Enter)).unwrap();
    tx.send(key('p')).unwrap();
    send_text(&tx, "half an answer");
    tx.send(AppEvent::Key(KeyEvent::new(
        KeyCode::Char('r'),
        KeyModifiers::CONTROL,
    )))
    .unwrap();
    drive(&mut app, &runner, 1_000);

    assert_eq!(app.session.state(), SessionState::AwaitingUserInfo);
    assert!(app.session.identity().is_none());
    assert!(app.session.responses().is_empty());

    tx.send(code(KeyCode::Esc)).unwrap();
    drive(&mut app, &runner, 100);
    assert!(app.should_quit);
}

#[test]
fn headless_keys_pressed_while_speaking_do_not_restart_capture() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, rx) = mpsc::channel();
    let captures = Rc::new(RefCell::new(0));
    let bank = QuestionBank::for_part(5).unwrap();
    let mut app = App::new(
        Session::new(bank.into_questions(), false),
        InputCapture::new(InputMode::Spoken, ListenSettings::default()),
        FeedbackAggregator::new(Box::new(OfflineGrammar) as Box<dyn GrammarChecker>),
        Box::new(ImpatientRecognizer {
            keys: tx.clone(),
            captures: captures.clone(),
        }),
        ReportExporter::new(dir.path(), ReportFormat::Text, 55),
    );
    let runner = runner(rx);

    tx.send(key('p')).unwrap();
    tx.send(key('l')).unwrap();
    drive(&mut app, &runner, 100);

    assert_eq!(*captures.borrow(), 1);
    assert_eq!(
        app.input.spoken.status(),
        &CaptureStatus::Captured("I mostly read history books, attempt 1".into())
    );
    assert!(app.status.starts_with("Speech recognized"));
    assert!(app.session.responses().is_empty());

    tx.send(code(KeyCode::Enter)).unwrap();
    drive(&mut app, &runner, 100);

    assert_eq!(*captures.borrow(), 1);
    assert_eq!(
        app.session.responses(),
        &["I mostly read history books, attempt 1".to_string()]
    );
}
