pub mod test_helpers {
    use crate::document::{DocumentInfo, LoadError, PagePreview, PageSize, PdfBackend};
    use crate::event_source::{Event, KeyCode, SimulatedEventSource};
    use crossterm::event::KeyModifiers;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use std::path::{Path, PathBuf};

    /// Builder for creating test scenarios with simulated user input
    #[derive(Default)]
    pub struct TestScenarioBuilder {
        events: Vec<Event>,
    }

    impl TestScenarioBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a character key press
        pub fn press_char(mut self, c: char) -> Self {
            self.events.push(SimulatedEventSource::char_key(c));
            self
        }

        pub fn press_key(mut self, code: KeyCode) -> Self {
            self.events
                .push(SimulatedEventSource::key_event(code, KeyModifiers::empty()));
            self
        }

        /// Type every character of `text`
        pub fn type_text(mut self, text: &str) -> Self {
            for c in text.chars() {
                self.events.push(SimulatedEventSource::char_key(c));
            }
            self
        }

        pub fn press_enter(self) -> Self {
            self.press_key(KeyCode::Enter)
        }

        pub fn press_tab(self) -> Self {
            self.press_key(KeyCode::Tab)
        }

        pub fn press_esc(self) -> Self {
            self.press_key(KeyCode::Esc)
        }

        /// Left click at a terminal cell
        pub fn click_at(mut self, column: u16, row: u16) -> Self {
            self.events
                .push(SimulatedEventSource::left_click(column, row));
            self
        }

        pub fn next_page(self) -> Self {
            self.press_char('l')
        }

        pub fn prev_page(self) -> Self {
            self.press_char('h')
        }

        /// Move the marker list highlight down n times
        pub fn select_down(mut self, times: usize) -> Self {
            for _ in 0..times {
                self.events.push(SimulatedEventSource::char_key('j'));
            }
            self
        }

        /// Ctrl+C quits even while a dialog is open
        pub fn press_ctrl_c(mut self) -> Self {
            self.events.push(SimulatedEventSource::ctrl_char_key('c'));
            self
        }

        /// Quit the application (press 'q')
        pub fn quit(mut self) -> Self {
            self.events.push(SimulatedEventSource::char_key('q'));
            self
        }

        /// Build the simulated event source
        pub fn build(self) -> SimulatedEventSource {
            SimulatedEventSource::new(self.events)
        }
    }

    /// Backend that "opens" any path as a document with fixed page sizes and
    /// renders flat gray previews.
    #[derive(Debug, Clone)]
    pub struct FixedPageBackend {
        page_sizes: Vec<PageSize>,
        opened: bool,
    }

    impl FixedPageBackend {
        pub fn new(page_count: usize) -> Self {
            Self::with_sizes(vec![PageSize::LETTER; page_count])
        }

        pub fn with_sizes(page_sizes: Vec<PageSize>) -> Self {
            Self {
                page_sizes,
                opened: false,
            }
        }
    }

    impl PdfBackend for FixedPageBackend {
        fn open(&mut self, path: &Path) -> Result<DocumentInfo, LoadError> {
            if self.page_sizes.is_empty() {
                return Err(LoadError::Empty);
            }
            self.opened = true;
            Ok(DocumentInfo {
                path: path.to_path_buf(),
                title: None,
                page_count: self.page_sizes.len(),
                page_sizes: self.page_sizes.clone(),
            })
        }

        fn render_preview(
            &mut self,
            page_index: usize,
            columns: u16,
            rows: u16,
        ) -> Result<PagePreview, LoadError> {
            if !self.opened {
                return Err(LoadError::NotOpen);
            }
            if page_index >= self.page_sizes.len() {
                return Err(LoadError::PageOutOfRange(page_index));
            }
            let pixel_rows = rows.saturating_mul(2);
            Ok(PagePreview {
                page_index,
                columns,
                pixel_rows,
                luma: vec![230; usize::from(columns) * usize::from(pixel_rows)],
            })
        }
    }

    /// Write a file with a `.pdf` name so upload validation accepts it
    pub fn write_pdf_stub(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"%PDF-1.4\n%%EOF\n").expect("write pdf stub");
        path
    }

    /// Create a test terminal for snapshot testing
    pub fn create_test_terminal(width: u16, height: u16) -> Terminal<TestBackend> {
        let backend = TestBackend::new(width, height);
        Terminal::new(backend).expect("test terminal")
    }

    /// Capture the current terminal buffer as a string
    pub fn capture_terminal_state(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut lines = Vec::new();

        for y in 0..buffer.area.height {
            let mut line = String::new();
            for x in 0..buffer.area.width {
                line.push_str(buffer[(x, y)].symbol());
            }
            // Trim trailing whitespace from each line
            lines.push(line.trim_end().to_string());
        }

        // Remove trailing empty lines
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::test_helpers::*;
    use crate::document::PdfBackend;
    use std::path::Path;

    #[test]
    fn test_scenario_builder() {
        let scenario = TestScenarioBuilder::new()
            .type_text("ab")
            .click_at(3, 4)
            .press_enter()
            .press_tab()
            .select_down(1)
            .quit()
            .build();

        assert_eq!(scenario.events.len(), 7);
    }

    #[test]
    fn fixed_backend_requires_open_before_render() {
        let mut backend = FixedPageBackend::new(2);
        assert!(backend.render_preview(0, 4, 4).is_err());
        let info = backend.open(Path::new("plan.pdf")).unwrap();
        assert_eq!(info.page_count, 2);
        let preview = backend.render_preview(1, 4, 3).unwrap();
        assert_eq!(preview.luma.len(), 24);
        assert!(backend.render_preview(2, 4, 3).is_err());
    }
}
