pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
    Frame,
};

use crate::app::App;
use crate::input::InputMode;
use crate::session::SessionState;
use screen::current_screen;

const HORIZONTAL_MARGIN: u16 = 2;

pub fn draw(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}

fn help_text(app: &App) -> &'static str {
    match app.session.state() {
        SessionState::NotStarted => "(esc)ape",
        SessionState::AwaitingUserInfo => "(tab) next field | (enter) save | (esc)ape",
        SessionState::Ready => "(p)ractice | (t)est | (tab) input mode | (esc)ape",
        SessionState::AwaitingResponse => match app.input.mode() {
            InputMode::Typed => {
                "(enter) submit | (tab) speech mode | (ctrl+r) reset | (esc)ape"
            }
            InputMode::Spoken => {
                "(l)isten | (enter) submit | (tab) text mode | (ctrl+r) reset | (esc)ape"
            }
        },
        SessionState::Complete => "(d)ownload results | (r)eset | (esc)ape",
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(3),
                Constraint::Length(3),
                Constraint::Length(1),
            ])
            .split(area);

        let mut header = vec![Span::styled("IELTS Speaking Practice", bold_style)];
        if let Some(mode) = self.session.mode() {
            header.push(Span::raw(format!("  |  {mode} Mode")));
        }
        header.push(Span::raw(format!("  |  {} input", self.input.mode())));
        if let Some(identity) = self.session.identity() {
            header.push(Span::styled(
                format!("  |  {} ({})", identity.name, identity.user_id),
                dim_style,
            ));
        }
        Paragraph::new(Line::from(header))
            .alignment(Alignment::Center)
            .render(chunks[0], buf);

        current_screen(self.session.state()).render(self, chunks[1], buf);

        let status_style = if self.is_listening() {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::ITALIC)
        } else {
            Style::default().fg(Color::Cyan)
        };
        Paragraph::new(Span::styled(self.status.as_str(), status_style))
            .block(Block::default().borders(Borders::TOP))
            .wrap(Wrap { trim: true })
            .render(chunks[2], buf);

        Paragraph::new(Span::styled(
            help_text(self),
            Style::default().add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);
    }
}
