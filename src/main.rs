use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{DisableBracketedPaste, EnableBracketedPaste},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};

use speakwell::{
    app::App,
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore, SpeechSettings},
    feedback::FeedbackAggregator,
    grammar::{GrammarChecker, LanguageToolChecker, LanguageToolConfig},
    input::{InputCapture, InputMode},
    logging,
    questions::{QuestionBank, AVAILABLE_PARTS},
    report::{ReportExporter, ReportFormat},
    runtime::{CrosstermEventSource, FixedTicker, Runner},
    session::Session,
    speech::{CommandTranscriber, ListenSettings, SpeechRecognizer, UnavailableRecognizer},
    ui,
};

const TICK_RATE_MS: u64 = 100;

/// IELTS speaking practice in the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Answer IELTS speaking questions by typing or speaking, get grammar, structure, vocabulary and context feedback with an estimated band score, and save the session as a report."
)]
pub struct Cli {
    /// question set to practise (1, 2, 3 or 5 for the composite set)
    #[clap(short = 'p', long)]
    part: Option<u8>,

    /// how responses are captured
    #[clap(short = 'i', long, value_enum)]
    input_mode: Option<InputMode>,

    /// skip the Name / User ID form
    #[clap(long)]
    no_identity: bool,

    /// directory reports are written to
    #[clap(short = 'o', long)]
    output_dir: Option<PathBuf>,

    /// report layout
    #[clap(short = 'f', long, value_enum)]
    format: Option<ReportFormat>,

    /// LanguageTool compatible check endpoint
    #[clap(long)]
    grammar_endpoint: Option<String>,

    /// read settings from this file instead of the default location
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// write the merged settings back to the config file
    #[clap(long)]
    save_config: bool,
}

impl Cli {
    fn config_store(&self) -> FileConfigStore {
        match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        }
    }

    /// Command line flags win over the config file.
    fn apply(&self, cfg: &mut Config) {
        if let Some(part) = self.part {
            cfg.question_part = part;
        }
        if let Some(mode) = self.input_mode {
            cfg.input_mode = mode;
        }
        if self.no_identity {
            cfg.require_identity = false;
        }
        if let Some(dir) = &self.output_dir {
            cfg.report.output_dir = Some(dir.clone());
        }
        if let Some(format) = self.format {
            cfg.report.format = format;
        }
        if let Some(endpoint) = &self.grammar_endpoint {
            cfg.grammar.endpoint = endpoint.clone();
        }
    }
}

fn recognizer_for(cfg: &Config) -> Box<dyn SpeechRecognizer> {
    let Some(argv) = cfg.speech.transcribe_command.clone() else {
        tracing::info!("no transcribe command configured, spoken input unavailable");
        return Box::new(UnavailableRecognizer::default());
    };
    microphone_recognizer(CommandTranscriber::new(argv), &cfg.speech)
}

#[cfg(feature = "audio-io")]
fn microphone_recognizer(
    transcriber: CommandTranscriber,
    speech: &SpeechSettings,
) -> Box<dyn SpeechRecognizer> {
    use speakwell::speech::{MicrophoneSource, StreamingRecognizer};

    match MicrophoneSource::open_default() {
        Ok(source) => {
            Box::new(StreamingRecognizer::new(source, transcriber).with_pause(speech.pause()))
        }
        Err(err) => {
            tracing::warn!(error = %err, "microphone unavailable, spoken input disabled");
            Box::new(UnavailableRecognizer::new(err))
        }
    }
}

#[cfg(not(feature = "audio-io"))]
fn microphone_recognizer(
    _transcriber: CommandTranscriber,
    _speech: &SpeechSettings,
) -> Box<dyn SpeechRecognizer> {
    tracing::info!("built without the audio-io feature, spoken input unavailable");
    Box::new(UnavailableRecognizer::new(speakwell::error::CaptureError::Service(
        "built without microphone support (enable the audio-io feature)".into(),
    )))
}

fn build_app(cfg: &Config, bank: QuestionBank) -> Result<App, Box<dyn Error>> {
    let checker = LanguageToolChecker::new(LanguageToolConfig::from(&cfg.grammar))?;
    tracing::info!(endpoint = checker.endpoint(), "grammar checks enabled");
    let grammar: Box<dyn GrammarChecker> = Box::new(checker);

    Ok(App::new(
        Session::new(bank.into_questions(), cfg.require_identity),
        InputCapture::new(cfg.input_mode, ListenSettings::from(&cfg.speech)),
        FeedbackAggregator::new(grammar),
        recognizer_for(cfg),
        ReportExporter::new(
            cfg.report.resolved_output_dir(),
            cfg.report.format,
            cfg.report.page_lines,
        ),
    ))
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    // logging is not up yet, so an unusable config file is reported on stderr
    let store = cli.config_store();
    let (mut cfg, config_error) = match store.try_load() {
        Ok(cfg) => (cfg, None),
        Err(e) => {
            eprintln!("warning: {e}; using default settings");
            (Config::default(), Some(e))
        }
    };
    cli.apply(&mut cfg);

    let bank = match QuestionBank::for_part(cfg.question_part) {
        Ok(bank) => bank,
        Err(e) => {
            let mut cmd = Cli::command();
            cmd.error(
                ErrorKind::InvalidValue,
                format!("{e} (available parts: {AVAILABLE_PARTS:?})"),
            )
            .exit();
        }
    };

    if cli.save_config {
        if let Some(e) = &config_error {
            let mut cmd = Cli::command();
            cmd.error(
                ErrorKind::Io,
                format!("{e}; fix or remove it before using --save-config"),
            )
            .exit();
        }
        store.save(&cfg)?;
    }

    if let Some(log_path) = AppDirs::log_path() {
        if let Err(e) = logging::init(&log_path, &cfg.log_level) {
            eprintln!("warning: logging disabled ({}): {e}", log_path.display());
        }
    }
    if let Some(e) = &config_error {
        tracing::warn!(error = %e, "ignoring unreadable config");
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    tracing::info!(part = bank.part, questions = bank.len(), "starting");
    let mut app = build_app(&cfg, bank)?;

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        LeaveAlternateScreen,
    )?;
    terminal.show_cursor()?;

    if let Some(path) = &app.last_export {
        println!("Results saved to {}", path.display());
    }

    result
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    terminal.draw(|f| ui::draw(app, f))?;

    while !app.should_quit {
        if app.step(&runner) {
            terminal.draw(|f| ui::draw(app, f))?;
        }
    }

    Ok(())
}
