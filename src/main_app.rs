use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use log::{debug, info, warn};
use ratatui::{
    Frame, Terminal,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::coords::{RenderedPage, ScreenPoint};
use crate::document::{DocumentLoader, DocumentState, Generation, LoaderResponse};
use crate::event_source::EventSource;
use crate::marker::MarkerId;
use crate::session::{Session, SessionEvent};
use crate::storage::KeyValueStore;
use crate::theme::{Base16Palette, current_theme};
use crate::view::ViewCommand;
use crate::widget::hud_message::HudMessage;
use crate::widget::marker_form_popup::{self, FormAction};
use crate::widget::marker_list::MarkerList;
use crate::widget::open_file_prompt::{OpenFilePrompt, PromptAction};
use crate::widget::page_canvas::{PageCanvas, fit_page, preview_size};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Quit,
}

/// Where the last frame put the page, for click mapping and preview sizing.
#[derive(Debug, Clone, Copy)]
struct PageLayout {
    viewport: Rect,
    page: RenderedPage,
}

/// Preview request in flight, to avoid asking twice for the same raster
type PreviewKey = (Generation, usize, u16, u16);

pub struct App<S: KeyValueStore> {
    pub session: Session<S>,
    loader: Option<DocumentLoader>,
    pending_events: Rc<RefCell<Vec<SessionEvent>>>,
    export_path: PathBuf,
    open_prompt: Option<OpenFilePrompt>,
    marker_list: MarkerList,
    page_layout: Option<PageLayout>,
    requested_preview: Option<PreviewKey>,
    pub hud_message: Option<HudMessage>,
}

impl<S: KeyValueStore + 'static> App<S> {
    pub fn new(mut session: Session<S>, loader: Option<DocumentLoader>, export_path: PathBuf) -> Self {
        let pending_events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&pending_events);
        session.subscribe(move |event| sink.borrow_mut().push(event.clone()));

        Self {
            session,
            loader,
            pending_events,
            export_path,
            open_prompt: None,
            marker_list: MarkerList::new(),
            page_layout: None,
            requested_preview: None,
            hud_message: None,
        }
    }

    pub fn export_path(&self) -> &Path {
        &self.export_path
    }

    pub fn is_prompt_open(&self) -> bool {
        self.open_prompt.is_some()
    }

    pub fn has_active_popup(&self) -> bool {
        self.open_prompt.is_some() || self.session.form().is_some()
    }

    /// Validate `path` and hand it to the loader.
    pub fn open_file(&mut self, path: &Path) {
        let Ok(generation) = self.session.open_file(path) else {
            self.process_session_events();
            return;
        };
        self.requested_preview = None;

        let sent = match &self.loader {
            Some(loader) => loader.open(generation, path).map_err(|e| e.to_string()),
            None => Err("PDF support is not available".to_string()),
        };
        if let Err(message) = sent {
            warn!("Could not start loading {}: {message}", path.display());
            self.session.fail_document(message);
        }
        self.process_session_events();
    }

    /// Apply every loader response that is ready. Returns true when anything
    /// changed on screen.
    pub fn poll_loader(&mut self) -> bool {
        let responses = match &self.loader {
            Some(loader) => loader.poll(),
            None => return false,
        };
        let changed = !responses.is_empty();
        for response in responses {
            self.apply_loader_response(response);
        }
        self.process_session_events();
        changed
    }

    /// Block until the current load settles or `timeout` passes.
    pub fn wait_for_document(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while matches!(self.session.document().state(), DocumentState::Loading { .. }) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let response = self
                .loader
                .as_ref()
                .and_then(|loader| loader.recv_timeout(remaining));
            match response {
                Some(response) => self.apply_loader_response(response),
                None => return false,
            }
        }
        self.process_session_events();
        self.session.document().is_ready()
    }

    fn apply_loader_response(&mut self, response: LoaderResponse) {
        match response {
            LoaderResponse::Opened { generation, result } => {
                self.session.apply_load(generation, result);
            }
            LoaderResponse::Preview {
                generation,
                preview,
            } => {
                self.session.apply_preview(generation, preview);
            }
            LoaderResponse::PreviewFailed {
                generation,
                page_index,
                error,
            } => {
                if generation == self.session.document().generation() {
                    warn!("Failed to render page {}: {error}", page_index + 1);
                    self.session
                        .fail_document(format!("Failed to render page {}: {error}", page_index + 1));
                }
            }
        }
    }

    /// React to what the session reported since the last call.
    fn process_session_events(&mut self) {
        let events: Vec<SessionEvent> = self.pending_events.borrow_mut().drain(..).collect();
        for event in events {
            match event {
                SessionEvent::UploadRejected(message) => {
                    self.hud_message = Some(HudMessage::error(message));
                }
                SessionEvent::MarkerAdded(id) => {
                    if let Some(marker) = self.session.store().get(&id) {
                        self.hud_message = Some(HudMessage::info(format!("Added {}", marker.label)));
                    }
                }
                SessionEvent::MarkerRemoved(_) => {
                    self.hud_message = Some(HudMessage::info("Marker deleted"));
                }
                SessionEvent::DocumentChanged => match self.session.document().state() {
                    DocumentState::Ready { upload, info } => {
                        self.hud_message = Some(HudMessage::info(format!(
                            "Loaded {} ({} pages)",
                            upload.name, info.page_count
                        )));
                    }
                    DocumentState::Failed { message, .. } => {
                        self.hud_message = Some(HudMessage::error(message.clone()));
                    }
                    DocumentState::Empty => {
                        self.page_layout = None;
                        self.requested_preview = None;
                        self.hud_message = Some(HudMessage::info("Document closed"));
                    }
                    DocumentState::Loading { .. } => {}
                },
                SessionEvent::NavigationRequested(page) => {
                    debug!("Jumped to page {}", page + 1);
                }
                SessionEvent::PageChanged(_)
                | SessionEvent::ZoomChanged(_)
                | SessionEvent::FilterChanged(_)
                | SessionEvent::SelectionChanged(_)
                | SessionEvent::FormOpened(_)
                | SessionEvent::FormClosed => {}
            }
        }
        self.sync_marker_list();
    }

    fn sync_marker_list(&mut self) {
        let visible = self.session.visible_markers();
        let index = self
            .session
            .view()
            .selected
            .as_ref()
            .and_then(|id| visible.iter().position(|m| &m.id == id));
        let len = visible.len();
        self.marker_list.sync(index, len);
    }

    fn select_visible(&mut self, index: usize) {
        let id: Option<MarkerId> = self
            .session
            .visible_markers()
            .get(index)
            .map(|m| m.id.clone());
        if let Some(id) = id {
            self.session.select(&id);
        }
    }

    pub fn export(&mut self) {
        match self.session.export_csv(&self.export_path) {
            Ok(path) => {
                self.hud_message = Some(HudMessage::info(format!(
                    "Exported {} markers to {}",
                    self.session.store().len(),
                    path.display()
                )));
            }
            Err(e) => {
                warn!("Export failed: {e}");
                self.hud_message = Some(HudMessage::error(e.to_string()));
            }
        }
    }

    pub fn handle_key_event(&mut self, key: KeyEvent) -> Option<AppAction> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(AppAction::Quit);
        }

        if let Some(prompt) = self.open_prompt.as_mut() {
            match prompt.handle_key(key) {
                Some(PromptAction::Open(path)) => {
                    self.open_file(&path);
                    if self.session.upload_error().is_none() {
                        self.open_prompt = None;
                    }
                }
                Some(PromptAction::Cancel) => self.open_prompt = None,
                None => {}
            }
            return None;
        }

        if let Some(form) = self.session.form_mut() {
            match marker_form_popup::handle_key(form, key) {
                Some(FormAction::Submit) => {
                    if let Err(e) = self.session.submit_form() {
                        debug!("Marker form incomplete: {e}");
                    }
                }
                Some(FormAction::Cancel) => self.session.cancel_form(),
                None => {}
            }
            self.process_session_events();
            return None;
        }

        match key.code {
            KeyCode::Char('q') => return Some(AppAction::Quit),
            KeyCode::Char('o') => {
                let prompt = match self.session.document().upload() {
                    Some(upload) => OpenFilePrompt::with_input(upload.path.display().to_string()),
                    None => OpenFilePrompt::new(),
                };
                self.open_prompt = Some(prompt);
            }
            KeyCode::Char('c') => {
                self.session.close_document();
            }
            KeyCode::Char('l') | KeyCode::Right | KeyCode::PageDown => {
                self.session.navigate(ViewCommand::NextPage)
            }
            KeyCode::Char('h') | KeyCode::Left | KeyCode::PageUp => {
                self.session.navigate(ViewCommand::PrevPage)
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.session.navigate(ViewCommand::ZoomIn),
            KeyCode::Char('-') => self.session.navigate(ViewCommand::ZoomOut),
            KeyCode::Char('H') => self.session.navigate(ViewCommand::Pan { dx: -1.0, dy: 0.0 }),
            KeyCode::Char('L') => self.session.navigate(ViewCommand::Pan { dx: 1.0, dy: 0.0 }),
            KeyCode::Char('K') => self.session.navigate(ViewCommand::Pan { dx: 0.0, dy: -1.0 }),
            KeyCode::Char('J') => self.session.navigate(ViewCommand::Pan { dx: 0.0, dy: 1.0 }),
            KeyCode::Char('a') => self.session.toggle_show_all(),
            KeyCode::Char('j') | KeyCode::Down => {
                if let Some(index) = self.marker_list.next_index() {
                    self.select_visible(index);
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if let Some(index) = self.marker_list.prev_index() {
                    self.select_visible(index);
                }
            }
            KeyCode::Enter => {
                if let Some(index) = self.marker_list.selected() {
                    self.select_visible(index);
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(id) = self.session.view().selected.clone() {
                    self.session.remove(&id);
                }
            }
            KeyCode::Esc => self.session.clear_selection(),
            KeyCode::Char('e') => self.export(),
            _ => {}
        }
        self.process_session_events();
        None
    }

    pub fn handle_mouse_event(&mut self, mouse: MouseEvent) {
        if mouse.kind != MouseEventKind::Down(MouseButton::Left) || self.has_active_popup() {
            return;
        }
        let (column, row) = (mouse.column, mouse.row);

        if self.marker_list.contains(column, row) {
            if let Some(index) = self.marker_list.index_at(column, row) {
                self.select_visible(index);
            }
        } else if let Some(layout) = self.page_layout {
            let inside_viewport = column >= layout.viewport.x
                && column < layout.viewport.right()
                && row >= layout.viewport.y
                && row < layout.viewport.bottom();
            if inside_viewport {
                let point = ScreenPoint::cell_center(column, row);
                if self.session.click(point, &[layout.page]).is_none() {
                    debug!("Click at ({column}, {row}) missed the page");
                }
            }
        }
        self.process_session_events();
    }

    /// Ask the loader for a preview that matches the last laid-out page.
    pub fn request_preview_if_needed(&mut self) {
        let (Some(loader), Some(layout)) = (&self.loader, self.page_layout) else {
            return;
        };
        let document = self.session.document();
        if !document.is_ready() {
            return;
        }

        let (columns, rows) = preview_size(&layout.page.rect);
        let page_index = layout.page.page_index;
        if document
            .preview()
            .is_some_and(|p| p.fits(page_index, columns, rows))
        {
            return;
        }

        let key = (document.generation(), page_index, columns, rows);
        if self.requested_preview == Some(key) {
            return;
        }
        if loader
            .request_preview(key.0, page_index, columns, rows)
            .is_ok()
        {
            self.requested_preview = Some(key);
        }
    }

    pub fn update_hud_message(&mut self) -> bool {
        if self.hud_message.as_ref().is_some_and(|m| m.is_expired()) {
            self.hud_message = None;
            return true;
        }
        false
    }

    pub fn draw(&mut self, f: &mut Frame) {
        let palette = current_theme();
        let area = f.area();

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(1)])
            .split(area);
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(68), Constraint::Percentage(32)])
            .split(rows[0]);
        let sidebar = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(6)])
            .split(columns[1]);

        self.draw_page_area(f, columns[0], palette);

        let visible = self.session.visible_markers();
        self.marker_list.render(
            f,
            sidebar[0],
            &visible,
            self.session.view().show_all_pages,
            palette,
        );
        self.draw_details(f, sidebar[1], palette);
        self.draw_status_bar(f, rows[1], palette);

        if let Some(form) = self.session.form() {
            marker_form_popup::render(f, area, form, palette);
        }
        if let Some(prompt) = &self.open_prompt {
            prompt.render(f, area, self.session.upload_error(), palette);
        }
    }

    fn page_title(&self) -> String {
        let view = self.session.view();
        match self.session.document().info() {
            Some(info) => format!(
                " {} - Page {}/{} - {:.0}% ",
                info.display_name(),
                view.current_page + 1,
                info.page_count,
                view.zoom * 100.0
            ),
            None => " No document ".to_string(),
        }
    }

    fn draw_page_area(&mut self, f: &mut Frame, area: Rect, palette: &Base16Palette) {
        let (text_color, border_color, bg) = palette.get_panel_colors(true);
        let block = Block::default()
            .title(self.page_title())
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_color))
            .style(Style::default().fg(text_color).bg(bg));
        let inner = block.inner(area);
        f.render_widget(block, area);

        let document = self.session.document();
        let Some(info) = document.info() else {
            let message = match document.state() {
                DocumentState::Loading { upload } => {
                    Line::from(Span::styled(
                        format!("Loading {}…", upload.name),
                        Style::default().fg(palette.base_0d),
                    ))
                }
                DocumentState::Failed { message, .. } => Line::from(Span::styled(
                    message.clone(),
                    Style::default()
                        .fg(palette.base_08)
                        .add_modifier(Modifier::BOLD),
                )),
                _ => Line::from(Span::styled(
                    "Press o to open a PDF floor plan",
                    Style::default().fg(palette.base_04),
                )),
            };
            let mut lines = vec![Line::default(), message.centered()];
            if let Some(error) = self.session.upload_error() {
                lines.push(Line::from(Span::styled(
                    error.to_string(),
                    Style::default().fg(palette.base_08),
                )).centered());
            }
            f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
            self.page_layout = None;
            return;
        };

        let view = self.session.view();
        let page_index = view.current_page;
        let rect = fit_page(
            inner,
            info.page_size(page_index),
            view.zoom,
            (view.pan_x, view.pan_y),
        );
        let layout = PageLayout {
            viewport: inner,
            page: RenderedPage { page_index, rect },
        };

        let markers = self
            .session
            .store()
            .on_page(page_index)
            .map(|m| (m, view.is_selected(&m.id)))
            .collect();
        let preview = document.preview().filter(|p| p.page_index == page_index);
        f.render_widget(
            PageCanvas::new(rect, palette).preview(preview).markers(markers),
            inner,
        );
        self.page_layout = Some(layout);
    }

    fn draw_details(&self, f: &mut Frame, area: Rect, palette: &Base16Palette) {
        let lines = match self.session.selected_marker() {
            Some(marker) => vec![
                Line::from(Span::styled(
                    marker.label.clone(),
                    Style::default()
                        .fg(palette.purpose_color(marker.category()))
                        .add_modifier(Modifier::BOLD),
                )),
                Line::from(format!("{} ×{} - {}", marker.kind, marker.quantity, marker.purpose)),
                Line::from(format!(
                    "{} - page {}",
                    marker.location,
                    marker.page_index + 1
                )),
                Line::from(Span::styled(
                    marker
                        .created_at
                        .with_timezone(&chrono::Local)
                        .format("%Y-%m-%d %H:%M")
                        .to_string(),
                    Style::default().fg(palette.base_03),
                )),
            ],
            None => vec![Line::from(Span::styled(
                "Click the page to place a marker",
                Style::default().fg(palette.base_03),
            ))],
        };

        let (_, border_color, bg) = palette.get_panel_colors(false);
        let paragraph = Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .title(" Details ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(border_color))
                    .style(Style::default().fg(palette.base_05).bg(bg)),
            );
        f.render_widget(paragraph, area);
    }

    fn draw_status_bar(&self, f: &mut Frame, area: Rect, palette: &Base16Palette) {
        let line = match &self.hud_message {
            Some(message) => message.styled_line(palette),
            None => Line::from(Span::styled(
                " o open  c close  h/l page  +/- zoom  HJKL pan  a all pages  j/k select  d delete  e export  q quit",
                Style::default().fg(palette.base_03),
            )),
        };
        f.render_widget(Paragraph::new(line), area);
    }
}

pub fn run_app_with_event_source<B: ratatui::backend::Backend, S: KeyValueStore + 'static>(
    terminal: &mut Terminal<B>,
    app: &mut App<S>,
    event_source: &mut dyn EventSource,
) -> Result<()>
where
    B::Error: Send + Sync + 'static,
{
    let tick_rate = Duration::from_millis(50);
    let mut last_tick = Instant::now();
    let mut first_render = true;

    loop {
        let mut events_processed = 0;
        let mut should_quit = false;

        while event_source.poll(Duration::from_millis(0))? && events_processed < 50 {
            let event = event_source.read()?;
            events_processed += 1;

            match event {
                Event::Key(key) => {
                    if app.handle_key_event(key) == Some(AppAction::Quit) {
                        should_quit = true;
                    }
                }
                Event::Mouse(mouse) => app.handle_mouse_event(mouse),
                Event::Resize(cols, rows) => {
                    debug!("Terminal resized to {cols}x{rows}");
                }
                _ => {}
            }

            if should_quit {
                break;
            }
        }

        let mut needs_redraw = events_processed > 0;
        if first_render {
            needs_redraw = true;
            first_render = false;
        }

        if last_tick.elapsed() >= tick_rate {
            if app.poll_loader() {
                needs_redraw = true;
            }
            if app.update_hud_message() {
                needs_redraw = true;
            }
            last_tick = Instant::now();
        }

        if needs_redraw {
            terminal.draw(|f| app.draw(f))?;
            app.request_preview_if_needed();
        }

        if should_quit {
            info!("Quitting");
            return Ok(());
        }

        // If no events were processed, wait a bit to avoid busy-waiting
        if events_processed == 0 {
            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_secs(0));
            let _ = event_source.poll(timeout);
        }
    }
}
