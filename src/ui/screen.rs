use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthChar;

use crate::app::{App, FormField};
use crate::feedback::FeedbackReport;
use crate::input::{CaptureStatus, InputMode};
use crate::session::{SessionMode, SessionState};

/// A UI Screen boundary: draws the body area for one session state
pub trait Screen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer);
}

/// Longest suffix of `text` that fits in `width` columns, so the cursor end stays visible.
pub fn visible_tail(text: &str, width: usize) -> &str {
    let mut used = 0;
    let mut start = text.len();
    for (idx, c) in text.char_indices().rev() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        start = idx;
    }
    &text[start..]
}

fn feedback_lines(report: &FeedbackReport) -> Vec<Line<'static>> {
    let band_style = Style::default()
        .fg(Color::Green)
        .add_modifier(Modifier::BOLD);
    let mut lines: Vec<Line> = report
        .entries()
        .iter()
        .map(|entry| Line::from(format!("- {entry}")))
        .collect();
    lines.push(Line::from(Span::styled(report.band_line(), band_style)));
    lines
}

/// Name / User ID form
pub struct IdentityScreen;

impl Screen for IdentityScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(0),
            ])
            .split(area);

        Paragraph::new("Please enter your details before starting.").render(chunks[0], buf);

        let fields = [
            (FormField::Name, "Name", app.form.name.as_str(), chunks[1]),
            (
                FormField::UserId,
                "User ID",
                app.form.user_id.as_str(),
                chunks[2],
            ),
        ];
        for (field, title, value, rect) in fields {
            let focused = app.form.focus == field;
            let border_style = if focused {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().add_modifier(Modifier::DIM)
            };
            let inner_width = rect.width.saturating_sub(3) as usize;
            let mut shown = visible_tail(value, inner_width).to_string();
            if focused {
                shown.push('_');
            }
            Paragraph::new(shown)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(title)
                        .border_style(border_style),
                )
                .render(rect, buf);
        }
    }
}

/// Mode selection
pub struct ReadyScreen;

impl Screen for ReadyScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        let total = app.session.questions().len();
        let lines = vec![
            Line::from(Span::styled(
                format!("{total} questions are ready."),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Practice Mode: feedback after every answer."),
            Line::from("Test Mode: feedback is revealed when the last question is answered."),
            Line::from(""),
            Line::from(format!("Responses will be {}.", match app.input.mode() {
                InputMode::Typed => "typed",
                InputMode::Spoken => "spoken",
            })),
        ];
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .render(area, buf);
    }
}

/// Current question, the response being composed and the latest feedback
pub struct AnswerScreen;

impl Screen for AnswerScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        let show_feedback = app.session.mode() == Some(SessionMode::Practice);
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(5),
                Constraint::Min(if show_feedback { 3 } else { 0 }),
            ])
            .split(area);

        if let Some(question) = app.session.current_question() {
            let title = format!(
                "Question {} of {}",
                question.number(),
                app.session.questions().len()
            );
            Paragraph::new(question.text.as_str())
                .block(Block::default().borders(Borders::BOTTOM).title(title))
                .wrap(Wrap { trim: true })
                .render(chunks[0], buf);
        }

        let (title, body, style) = match app.input.mode() {
            InputMode::Typed => (
                "Your response",
                format!("{}_", app.input.typed.text()),
                Style::default(),
            ),
            InputMode::Spoken => match app.input.spoken.status() {
                CaptureStatus::Idle => (
                    "Spoken response",
                    format!(
                        "Press L to listen. Start speaking within {}s; answers stop after {}s.",
                        app.input.spoken.settings().timeout.as_secs(),
                        app.input.spoken.settings().phrase_limit.as_secs()
                    ),
                    Style::default().add_modifier(Modifier::DIM),
                ),
                CaptureStatus::Pending => (
                    "Spoken response",
                    "Listening... Speak now.".to_string(),
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD | Modifier::ITALIC),
                ),
                CaptureStatus::Captured(text) => {
                    ("Spoken response", text.clone(), Style::default())
                }
                CaptureStatus::Failed(err) => (
                    "Spoken response",
                    format!("{err}. Press L to try again."),
                    Style::default().fg(Color::Red),
                ),
            },
        };
        Paragraph::new(Span::styled(body, style))
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: false })
            .render(chunks[1], buf);

        if show_feedback {
            if let Some(report) = &app.last_feedback {
                Paragraph::new(feedback_lines(report))
                    .block(Block::default().borders(Borders::TOP).title("Feedback"))
                    .wrap(Wrap { trim: true })
                    .render(chunks[2], buf);
            }
        }
    }
}

/// Every question with its response and feedback
pub struct CompleteScreen;

impl Screen for CompleteScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let mut lines = vec![Line::from(Span::styled("Session complete!", bold))];

        for record in app.session.records() {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                format!("Question {}: {}", record.question.number(), record.question.text),
                bold,
            )));
            lines.push(Line::from(format!("Response: {}", record.response)));
            if let Some(report) = record.feedback {
                lines.extend(feedback_lines(report));
            }
        }

        lines.push(Line::from(""));
        lines.push(Line::from(match &app.last_export {
            Some(path) => format!("Saved: {}", path.display()),
            None => format!(
                "Press D to save the report in {}",
                app.exporter().output_dir().display()
            ),
        }));

        // keep the tail visible when there is more than fits
        let overflow = (lines.len() as u16).saturating_sub(area.height);
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .scroll((overflow, 0))
            .render(area, buf);
    }
}

/// Nothing to draw until the session is opened
pub struct IdleScreen;

impl Screen for IdleScreen {
    fn render(&self, _app: &App, _area: Rect, _buf: &mut Buffer) {}
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(state: SessionState) -> Box<dyn Screen> {
    match state {
        SessionState::NotStarted => Box::new(IdleScreen),
        SessionState::AwaitingUserInfo => Box::new(IdentityScreen),
        SessionState::Ready => Box::new(ReadyScreen),
        SessionState::AwaitingResponse => Box::new(AnswerScreen),
        SessionState::Complete => Box::new(CompleteScreen),
    }
}
