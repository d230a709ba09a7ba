//! User interface rendering
//!
//! A single screen: title, status line, progress gauge, path prompt, recent
//! activity and a key hint bar. Rendering only reads `AppState`.

use crate::app::{AppMode, AppState, LastResult, PromptTarget};
use crate::theme::{Colors, Styles};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
    Frame,
};

/// Draw the whole screen
pub fn render(f: &mut Frame, state: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Length(3), // Status
            Constraint::Length(3), // Progress
            Constraint::Length(3), // Prompt / trigger
            Constraint::Min(3),    // Activity
            Constraint::Length(1), // Key hints
        ])
        .split(f.area());

    render_title(f, chunks[0]);
    render_status(f, chunks[1], state);
    render_progress(f, chunks[2], state);
    render_prompt(f, chunks[3], state);
    render_activity(f, chunks[4], state);
    render_hints(f, chunks[5], state);
}

fn render_title(f: &mut Frame, area: Rect) {
    let title = Paragraph::new("Sideload - APK + OBB installer")
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center)
        .style(Styles::title());
    f.render_widget(title, area);
}

fn render_status(f: &mut Frame, area: Rect, state: &AppState) {
    let mut spans = vec![Span::styled(state.status_message.clone(), Styles::text())];
    if state.mode == AppMode::Ready {
        match &state.last_result {
            Some(LastResult::Dispatched) => {
                spans.push(Span::styled("   last run: installer launched", Styles::success()));
            }
            Some(LastResult::Failed(message)) => {
                spans.push(Span::styled(format!("   last run: {}", message), Styles::error()));
            }
            None => {}
        }
    }

    let status = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .wrap(Wrap { trim: true });
    f.render_widget(status, area);
}

fn render_progress(f: &mut Frame, area: Rect, state: &AppState) {
    // Hidden outside of a run, like a progress bar set to GONE
    if state.mode != AppMode::Running {
        let idle = Block::default()
            .borders(Borders::ALL)
            .title("Progress")
            .border_style(Styles::text_muted());
        f.render_widget(idle, area);
        return;
    }

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Progress"))
        .gauge_style(Styles::gauge())
        .percent(u16::from(state.progress_percent()));
    f.render_widget(gauge, area);
}

fn render_prompt(f: &mut Frame, area: Rect, state: &AppState) {
    let widget = match state.mode {
        AppMode::Prompt(target) => {
            let title = match target {
                PromptTarget::Archive => "Path to the APK file",
                PromptTarget::Blob => "Path to the OBB file",
            };
            Paragraph::new(Line::from(vec![
                Span::styled(format!("{}: ", target.label()), Styles::prompt()),
                Span::styled(state.input.clone(), Styles::text()),
                Span::styled("_", Styles::prompt()),
            ]))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .border_style(Style::default().fg(Colors::SECONDARY)),
            )
        }
        AppMode::Ready | AppMode::Running => {
            Paragraph::new(Span::styled(" Add game ", Styles::trigger(state.trigger_enabled)))
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL))
        }
    };
    f.render_widget(widget, area);
}

fn render_activity(f: &mut Frame, area: Rect, state: &AppState) {
    let visible = usize::from(area.height.saturating_sub(2));
    let start = state.log.len().saturating_sub(visible);
    let lines: Vec<Line> = state.log[start..]
        .iter()
        .map(|line| Line::from(line.as_str()))
        .collect();

    let activity = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Activity"))
        .wrap(Wrap { trim: true });
    f.render_widget(activity, area);
}

fn render_hints(f: &mut Frame, area: Rect, state: &AppState) {
    let hints = match state.mode {
        AppMode::Ready => "[Enter] Add game   [q] Quit",
        AppMode::Prompt(_) => "[Enter] Confirm   [Esc] Cancel",
        AppMode::Running => "Working... the trigger is disabled until this run finishes",
    };
    let bar = Paragraph::new(hints)
        .alignment(Alignment::Center)
        .style(Styles::text_muted());
    f.render_widget(bar, area);
}
