use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};
use std::path::PathBuf;

use crate::theme::Base16Palette;
use crate::widget::centered_rect_fixed;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptAction {
    Open(PathBuf),
    Cancel,
}

/// Single-line path input for picking a floor plan.
#[derive(Debug, Default)]
pub struct OpenFilePrompt {
    input: String,
}

impl OpenFilePrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<PromptAction> {
        match key.code {
            KeyCode::Esc => Some(PromptAction::Cancel),
            KeyCode::Enter => {
                let trimmed = self.input.trim();
                if trimmed.is_empty() {
                    return None;
                }
                Some(PromptAction::Open(expand_home(trimmed)))
            }
            KeyCode::Backspace => {
                self.input.pop();
                None
            }
            KeyCode::Char(c) => {
                self.input.push(c);
                None
            }
            _ => None,
        }
    }

    pub fn render(&self, f: &mut Frame, area: Rect, error: Option<&str>, palette: &Base16Palette) {
        let popup_area = centered_rect_fixed(60, 6, area);
        f.render_widget(Clear, popup_area);

        let mut lines = vec![
            Line::from(vec![
                Span::styled(" Path: ", Style::default().fg(palette.base_04)),
                Span::styled(
                    format!("{}_", self.input),
                    Style::default()
                        .fg(palette.base_07)
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::default(),
        ];
        match error {
            Some(message) => lines.push(Line::from(Span::styled(
                format!(" {message}"),
                Style::default().fg(palette.base_08),
            ))),
            None => lines.push(Line::from(Span::styled(
                " Enter open  Esc cancel",
                Style::default().fg(palette.base_03),
            ))),
        }

        let paragraph = Paragraph::new(lines).block(
            Block::default()
                .title(" Open PDF Floor Plan ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.base_0d))
                .style(Style::default().bg(palette.base_00)),
        );
        f.render_widget(paragraph, popup_area);
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
