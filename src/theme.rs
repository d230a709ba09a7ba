//! Colors and styles for the TUI
//!
//! All colors used by `ui` are defined here.

use ratatui::style::{Color, Modifier, Style};

/// Color palette
pub struct Colors;

impl Colors {
    /// Primary accent color - borders, titles
    pub const PRIMARY: Color = Color::Cyan;

    /// Secondary accent color - prompts, emphasis
    pub const SECONDARY: Color = Color::Yellow;

    pub const FG_PRIMARY: Color = Color::White;

    /// Disabled/inactive text color
    pub const FG_MUTED: Color = Color::DarkGray;

    pub const SUCCESS: Color = Color::Green;

    pub const ERROR: Color = Color::Red;

    /// Progress bar fill
    pub const PROGRESS: Color = Color::Green;

    /// Gauge background
    pub const BG_GAUGE: Color = Color::Rgb(40, 40, 50);
}

/// Pre-built styles
pub struct Styles;

impl Styles {
    pub fn text() -> Style {
        Style::default().fg(Colors::FG_PRIMARY)
    }

    pub fn text_muted() -> Style {
        Style::default().fg(Colors::FG_MUTED)
    }

    pub fn title() -> Style {
        Style::default()
            .fg(Colors::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    pub fn prompt() -> Style {
        Style::default().fg(Colors::SECONDARY)
    }

    pub fn success() -> Style {
        Style::default().fg(Colors::SUCCESS)
    }

    pub fn error() -> Style {
        Style::default()
            .fg(Colors::ERROR)
            .add_modifier(Modifier::BOLD)
    }

    pub fn gauge() -> Style {
        Style::default().fg(Colors::PROGRESS).bg(Colors::BG_GAUGE)
    }

    /// Style for the trigger button, dimmed while disabled
    pub fn trigger(enabled: bool) -> Style {
        if enabled {
            Style::default()
                .fg(Color::Black)
                .bg(Colors::SECONDARY)
                .add_modifier(Modifier::BOLD)
        } else {
            Self::text_muted()
        }
    }
}
