use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};

use crate::marker::Marker;
use crate::theme::Base16Palette;

/// Sidebar listing the markers visible under the current filter.
pub struct MarkerList {
    state: ListState,
    last_area: Option<Rect>,
    len: usize,
}

impl Default for MarkerList {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkerList {
    pub fn new() -> Self {
        Self {
            state: ListState::default(),
            last_area: None,
            len: 0,
        }
    }

    pub fn selected(&self) -> Option<usize> {
        self.state.selected()
    }

    /// Keep the highlight on `index` (the selected marker's position in the
    /// visible list), or clear it.
    pub fn sync(&mut self, index: Option<usize>, len: usize) {
        self.len = len;
        self.state.select(index.filter(|i| *i < len));
    }

    /// Index after moving the highlight down, wrapping
    pub fn next_index(&self) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        Some(match self.state.selected() {
            Some(i) if i + 1 < self.len => i + 1,
            Some(_) => 0,
            None => 0,
        })
    }

    pub fn prev_index(&self) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        Some(match self.state.selected() {
            Some(0) | None => self.len - 1,
            Some(i) => i - 1,
        })
    }

    pub fn render(
        &mut self,
        f: &mut Frame,
        area: Rect,
        markers: &[&Marker],
        show_all_pages: bool,
        palette: &Base16Palette,
    ) {
        self.last_area = Some(area);
        self.len = markers.len();

        let scope = if show_all_pages {
            "all pages"
        } else {
            "this page"
        };
        let (text_color, border_color, bg) = palette.get_panel_colors(true);
        let block = Block::default()
            .title(format!(" Markers ({scope}): {} ", markers.len()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_color))
            .style(Style::default().fg(text_color).bg(bg));

        if markers.is_empty() {
            let headline = if show_all_pages {
                "No markers yet"
            } else {
                "No markers on this page"
            };
            let lines = vec![
                Line::default(),
                Line::from(Span::styled(headline, Style::default().fg(palette.base_04))).centered(),
                Line::from(Span::styled(
                    "Click on the PDF to add markers",
                    Style::default().fg(palette.base_03),
                ))
                .centered(),
            ];
            f.render_widget(
                Paragraph::new(lines).wrap(Wrap { trim: true }).block(block),
                area,
            );
            return;
        }

        let items: Vec<ListItem> = markers
            .iter()
            .map(|marker| {
                let color = palette.purpose_color(marker.category());
                let mut spans = vec![
                    Span::styled("● ", Style::default().fg(color)),
                    Span::styled(
                        marker.label.clone(),
                        Style::default()
                            .fg(palette.base_07)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!(" {} ×{}", marker.kind, marker.quantity),
                        Style::default().fg(palette.base_05),
                    ),
                    Span::styled(
                        format!("  {}", marker.location),
                        Style::default().fg(palette.base_04),
                    ),
                ];
                if show_all_pages {
                    spans.push(Span::styled(
                        format!("  p.{}", marker.page_index + 1),
                        Style::default().fg(palette.base_03),
                    ));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();

        let (selection_bg, selection_fg) = palette.get_selection_colors(true);

        let list = List::new(items)
            .block(block)
            .highlight_style(
                Style::default()
                    .bg(selection_bg)
                    .fg(selection_fg)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("» ");

        f.render_stateful_widget(list, area, &mut self.state);
    }

    /// Row index under a mouse click, if it hit a list item
    pub fn index_at(&self, x: u16, y: u16) -> Option<usize> {
        let area = self.last_area?;
        if x <= area.x
            || x >= area.x + area.width.saturating_sub(1)
            || y <= area.y
            || y >= area.y + area.height.saturating_sub(1)
        {
            return None;
        }
        let relative_y = usize::from(y - area.y - 1);
        let index = self.state.offset() + relative_y;
        (index < self.len).then_some(index)
    }

    pub fn contains(&self, x: u16, y: u16) -> bool {
        self.last_area.is_some_and(|area| {
            x >= area.x && x < area.x + area.width && y >= area.y && y < area.y + area.height
        })
    }
}
