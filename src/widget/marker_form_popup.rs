//! Add-marker dialog drawn over the page.

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::form::{Choice, FormField, MarkerForm};
use crate::theme::Base16Palette;
use crate::widget::centered_rect_fixed;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormAction {
    Submit,
    Cancel,
}

const ADD_NEW: &str = "+ Add new…";

/// Route a key to the form. Returns an action when the dialog should close.
pub fn handle_key(form: &mut MarkerForm, key: KeyEvent) -> Option<FormAction> {
    match key.code {
        KeyCode::Enter => return Some(FormAction::Submit),
        KeyCode::Esc => return Some(FormAction::Cancel),
        KeyCode::Tab | KeyCode::Down => form.focus_next(),
        KeyCode::BackTab | KeyCode::Up => form.focus_prev(),
        KeyCode::Right => form.cycle(true),
        KeyCode::Left => form.cycle(false),
        KeyCode::Backspace => form.backspace(),
        KeyCode::Char('+') if form.focus() == FormField::Quantity => form.increment_quantity(),
        KeyCode::Char('-') if form.focus() == FormField::Quantity => form.decrement_quantity(),
        KeyCode::Char(c) => form.input_char(c),
        _ => {}
    }
    None
}

fn choice_text(choice: &Choice, value: Option<&str>) -> String {
    match choice {
        Choice::Unset => "Select…".to_string(),
        Choice::Existing(_) => value.unwrap_or_default().to_string(),
        Choice::New(text) => format!("{ADD_NEW} {text}_"),
    }
}

pub fn render(f: &mut Frame, area: Rect, form: &MarkerForm, palette: &Base16Palette) {
    let popup_area = centered_rect_fixed(52, 12, area);
    f.render_widget(Clear, popup_area);

    let field_line = |field: FormField, value: String| {
        let focused = form.focus() == field;
        let label_style = if focused {
            Style::default()
                .fg(palette.base_0a)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.base_04)
        };
        let value_style = if focused {
            Style::default().fg(palette.base_07).bg(palette.base_02)
        } else {
            Style::default().fg(palette.base_05)
        };
        Line::from(vec![
            Span::styled(format!(" {:<10}", field.title()), label_style),
            Span::styled(format!(" ‹ {value} › "), value_style),
        ])
    };

    let purpose_color = palette.purpose_color(form.purpose().category());
    let position = form.position();

    let mut lines = vec![
        Line::from(Span::styled(
            format!(
                " Page {}  at {:.0}%, {:.0}%",
                position.page_index + 1,
                position.x * 100.0,
                position.y * 100.0
            ),
            Style::default().fg(palette.base_03),
        )),
        Line::default(),
        field_line(FormField::Quantity, form.quantity().to_string()),
        field_line(
            FormField::Type,
            choice_text(form.type_choice(), form.type_value()),
        ),
        field_line(
            FormField::Location,
            choice_text(form.location_choice(), form.location_value()),
        ),
        field_line(FormField::Purpose, form.purpose().to_string())
            .patch_style(Style::default().fg(purpose_color)),
        Line::default(),
    ];

    if let Some(error) = form.error() {
        lines.push(Line::from(Span::styled(
            format!(" {error}"),
            Style::default()
                .fg(palette.base_08)
                .add_modifier(Modifier::BOLD),
        )));
    } else {
        lines.push(Line::default());
    }
    lines.push(Line::from(Span::styled(
        " Tab field  ←/→ choose  type to add  Enter save  Esc cancel",
        Style::default().fg(palette.base_03),
    )));

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .title(" Add Cable Drop ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.base_0c))
            .style(Style::default().bg(palette.base_00)),
    );
    f.render_widget(paragraph, popup_area);
}
