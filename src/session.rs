//! Application session: one object owning the marker store, view state,
//! document slot and the open form.
//!
//! Front ends drive it through method calls and observe it through
//! [`Session::subscribe`]. Nothing here touches the terminal, so the same
//! session backs the TUI, the headless CLI and the tests.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::coords::{PagePoint, RenderedPage, ScreenPoint, map_click};
use crate::document::{
    DocumentInfo, DocumentSlot, Generation, PagePreview, UploadError, validate_upload,
};
use crate::export::{CsvExporter, ExportError};
use crate::form::{FormError, MarkerForm, OptionSet};
use crate::marker::{Marker, MarkerDraft, MarkerId};
use crate::purpose::Purpose;
use crate::storage::KeyValueStore;
use crate::store::MarkerStore;
use crate::view::{ViewCommand, ViewEffect, ViewState};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    MarkerAdded(MarkerId),
    MarkerRemoved(MarkerId),
    SelectionChanged(Option<MarkerId>),
    /// Selection asked the view to bring another page into sight
    NavigationRequested(usize),
    PageChanged(usize),
    ZoomChanged(f32),
    FilterChanged(bool),
    FormOpened(PagePoint),
    FormClosed,
    DocumentChanged,
    UploadRejected(String),
}

type Listener = Box<dyn FnMut(&SessionEvent)>;

pub struct Session<S: KeyValueStore> {
    store: MarkerStore<S>,
    view: ViewState,
    document: DocumentSlot,
    form: Option<MarkerForm>,
    type_options: OptionSet,
    location_options: OptionSet,
    default_purpose: Purpose,
    upload_error: Option<String>,
    listeners: Vec<Listener>,
}

impl<S: KeyValueStore> Session<S> {
    /// Load markers from `storage` and seed the type/location options from
    /// what is already in use.
    pub fn new(storage: S) -> Self {
        let store = MarkerStore::load(storage);
        let type_options = OptionSet::from_values(store.distinct_types());
        let location_options = OptionSet::from_values(store.distinct_locations());

        Self {
            store,
            view: ViewState::new(),
            document: DocumentSlot::new(),
            form: None,
            type_options,
            location_options,
            default_purpose: Purpose::default(),
            upload_error: None,
            listeners: Vec::new(),
        }
    }

    pub fn with_default_purpose(mut self, purpose: Purpose) -> Self {
        self.default_purpose = purpose;
        self
    }

    pub fn with_zoom(mut self, zoom: f32) -> Self {
        self.view.zoom = zoom.clamp(ViewState::MIN_ZOOM, ViewState::MAX_ZOOM);
        self
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&SessionEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn emit(&mut self, event: SessionEvent) {
        debug!("Session event: {event:?}");
        for listener in &mut self.listeners {
            listener(&event);
        }
    }

    pub fn store(&self) -> &MarkerStore<S> {
        &self.store
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn document(&self) -> &DocumentSlot {
        &self.document
    }

    pub fn form(&self) -> Option<&MarkerForm> {
        self.form.as_ref()
    }

    pub fn form_mut(&mut self) -> Option<&mut MarkerForm> {
        self.form.as_mut()
    }

    pub fn upload_error(&self) -> Option<&str> {
        self.upload_error.as_deref()
    }

    pub fn type_options(&self) -> &OptionSet {
        &self.type_options
    }

    pub fn location_options(&self) -> &OptionSet {
        &self.location_options
    }

    pub fn selected_marker(&self) -> Option<&Marker> {
        self.view.selected.as_ref().and_then(|id| self.store.get(id))
    }

    /// Validate and start loading a new file. An invalid file leaves the
    /// current document untouched and records a visible error.
    pub fn open_file(&mut self, path: &Path) -> Result<Generation, UploadError> {
        let upload = match validate_upload(path) {
            Ok(upload) => upload,
            Err(e) => {
                warn!("Rejected upload {}: {e}", path.display());
                let message = e.to_string();
                self.upload_error = Some(message.clone());
                self.emit(SessionEvent::UploadRejected(message));
                return Err(e);
            }
        };

        self.upload_error = None;
        if self.form.take().is_some() {
            self.emit(SessionEvent::FormClosed);
        }
        let had_selection = self.view.selected.is_some();
        let _ = self.view.apply(ViewCommand::Reset);
        if had_selection {
            self.emit(SessionEvent::SelectionChanged(None));
        }

        let generation = self.document.begin_load(upload);
        self.emit(SessionEvent::DocumentChanged);
        Ok(generation)
    }

    /// Apply a loader result. Results for superseded loads are dropped and
    /// `false` is returned.
    pub fn apply_load(
        &mut self,
        generation: Generation,
        result: Result<DocumentInfo, String>,
    ) -> bool {
        let page_count = result.as_ref().map(|info| info.page_count).unwrap_or(0);
        if !self.document.finish_load(generation, result) {
            return false;
        }

        let effects = self.view.apply(ViewCommand::SetPageCount(page_count));
        self.handle_effects(effects);
        self.emit(SessionEvent::DocumentChanged);
        true
    }

    pub fn apply_preview(&mut self, generation: Generation, preview: PagePreview) -> bool {
        self.document.set_preview(generation, preview)
    }

    pub fn fail_document(&mut self, message: impl Into<String>) {
        self.document.fail(message);
        self.emit(SessionEvent::DocumentChanged);
    }

    /// Close the current document, dropping any open form and the selection.
    /// Markers stay in the store. Returns false when nothing was open.
    pub fn close_document(&mut self) -> bool {
        if self.document.upload().is_none() {
            return false;
        }

        self.upload_error = None;
        if self.form.take().is_some() {
            self.emit(SessionEvent::FormClosed);
        }
        let had_selection = self.view.selected.is_some();
        let _ = self.view.apply(ViewCommand::Reset);
        if had_selection {
            self.emit(SessionEvent::SelectionChanged(None));
        }

        self.document.clear();
        self.emit(SessionEvent::DocumentChanged);
        true
    }

    /// Handle a click on the page area. Opens the marker form only when the
    /// document is ready and the click lands on a rendered page.
    pub fn click(&mut self, point: ScreenPoint, pages: &[RenderedPage]) -> Option<PagePoint> {
        if !self.document.is_ready() {
            debug!("Ignoring click: no document ready");
            return None;
        }
        let position = map_click(point, pages)?;
        if position.page_index >= self.view.page_count {
            debug!("Ignoring click on unknown page {}", position.page_index);
            return None;
        }

        self.form = Some(MarkerForm::open(
            position,
            self.type_options.clone(),
            self.location_options.clone(),
            self.default_purpose,
        ));
        self.emit(SessionEvent::FormOpened(position));
        Some(position)
    }

    /// Submit the open form. `Ok(None)` when no form is open; a validation
    /// error keeps the form open.
    pub fn submit_form(&mut self) -> Result<Option<MarkerId>, FormError> {
        let Some(form) = self.form.as_mut() else {
            return Ok(None);
        };
        let draft = form.submit()?;

        self.form = None;
        self.emit(SessionEvent::FormClosed);
        Ok(Some(self.add_marker(draft)))
    }

    pub fn cancel_form(&mut self) {
        if self.form.take().is_some() {
            self.emit(SessionEvent::FormClosed);
        }
    }

    /// Add a marker directly, bypassing the form
    pub fn add_marker(&mut self, draft: MarkerDraft) -> MarkerId {
        let marker = self.store.add(draft);
        let id = marker.id.clone();
        let kind = marker.kind.clone();
        let location = marker.location.clone();
        info!("Added marker {} on page {}", marker.label, marker.page_index + 1);

        self.type_options.observe(&kind);
        self.location_options.observe(&location);
        self.emit(SessionEvent::MarkerAdded(id.clone()));
        id
    }

    /// Remove a marker, clearing the selection if it pointed at it.
    /// Unknown ids are ignored.
    pub fn remove(&mut self, id: &MarkerId) -> Option<Marker> {
        let removed = self.store.remove(id)?;

        if self.view.is_selected(id) {
            let _ = self.view.apply(ViewCommand::ClearSelectionIf(id.clone()));
            self.emit(SessionEvent::SelectionChanged(None));
        }
        self.emit(SessionEvent::MarkerRemoved(removed.id.clone()));
        Some(removed)
    }

    /// Select a marker, jumping to its page when needed
    pub fn select(&mut self, id: &MarkerId) -> bool {
        let Some(page_index) = self.store.get(id).map(|m| m.page_index) else {
            return false;
        };
        let effects = self.view.apply(ViewCommand::Select {
            id: id.clone(),
            page_index,
        });
        self.emit(SessionEvent::SelectionChanged(Some(id.clone())));
        self.handle_effects(effects);
        true
    }

    pub fn clear_selection(&mut self) {
        if self.view.selected.is_some() {
            let _ = self.view.apply(ViewCommand::ClearSelection);
            self.emit(SessionEvent::SelectionChanged(None));
        }
    }

    pub fn navigate(&mut self, cmd: ViewCommand) {
        let zoom_before = self.view.zoom;
        let effects = self.view.apply(cmd);
        if (self.view.zoom - zoom_before).abs() > f32::EPSILON {
            let zoom = self.view.zoom;
            self.emit(SessionEvent::ZoomChanged(zoom));
        }
        self.handle_effects(effects);
    }

    pub fn toggle_show_all(&mut self) {
        let _ = self.view.apply(ViewCommand::ToggleShowAll);
        let show_all = self.view.show_all_pages;
        self.emit(SessionEvent::FilterChanged(show_all));
    }

    fn handle_effects(&mut self, effects: Vec<ViewEffect>) {
        for effect in effects {
            match effect {
                ViewEffect::RenderPage(page) => self.emit(SessionEvent::PageChanged(page)),
                ViewEffect::JumpToPage(page) => {
                    self.emit(SessionEvent::NavigationRequested(page));
                    self.emit(SessionEvent::PageChanged(page));
                }
            }
        }
    }

    /// Markers for the list and overlay under the current filter
    pub fn visible_markers(&self) -> Vec<&Marker> {
        self.view.visible(self.store.markers())
    }

    /// Export every marker, regardless of the current filter
    pub fn export_csv(&self, path: &Path) -> Result<PathBuf, ExportError> {
        CsvExporter::export_to_file(self.store.markers(), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::PageRect;
    use crate::document::PageSize;
    use crate::form::FormField;
    use crate::storage::MemoryStore;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    fn info(pages: usize) -> DocumentInfo {
        DocumentInfo {
            path: PathBuf::from("plan.pdf"),
            title: None,
            page_count: pages,
            page_sizes: vec![PageSize::LETTER; pages],
        }
    }

    fn ready_session(pages: usize) -> (Session<MemoryStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pdf = temp_dir.path().join("plan.pdf");
        std::fs::write(&pdf, "%PDF-1.4").unwrap();

        let mut session = Session::new(MemoryStore::new());
        let generation = session.open_file(&pdf).unwrap();
        assert!(session.apply_load(generation, Ok(info(pages))));
        (session, temp_dir)
    }

    fn page(index: usize, top: f64) -> RenderedPage {
        RenderedPage {
            page_index: index,
            rect: PageRect::new(10.0, top, 100.0, 200.0),
        }
    }

    fn draft(kind: &str, page_index: usize) -> MarkerDraft {
        MarkerDraft {
            x: 0.5,
            y: 0.5,
            page_index,
            quantity: 1,
            kind: kind.to_string(),
            location: "Lobby".to_string(),
            purpose: "Network".to_string(),
        }
    }

    fn record_events(session: &mut Session<MemoryStore>) -> Rc<RefCell<Vec<SessionEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        session.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        events
    }

    #[test]
    fn text_upload_is_rejected_and_pdf_clears_error() {
        let temp_dir = TempDir::new().unwrap();
        let txt = temp_dir.path().join("notes.txt");
        std::fs::write(&txt, "hello").unwrap();
        let pdf = temp_dir.path().join("plan.pdf");
        std::fs::write(&pdf, "%PDF-1.4").unwrap();

        let mut session = Session::new(MemoryStore::new());
        let events = record_events(&mut session);

        assert!(session.open_file(&txt).is_err());
        assert!(session.document().upload().is_none());
        assert_eq!(session.upload_error(), Some("Please upload a valid PDF file"));

        session.open_file(&pdf).unwrap();
        assert!(session.upload_error().is_none());
        assert_eq!(session.document().upload().unwrap().name, "plan.pdf");
        assert_eq!(
            *events.borrow(),
            vec![
                SessionEvent::UploadRejected("Please upload a valid PDF file".to_string()),
                SessionEvent::DocumentChanged
            ]
        );
    }

    #[test]
    fn click_outside_pages_does_not_open_form() {
        let (mut session, _dir) = ready_session(2);
        let pages = [page(0, 0.0), page(1, 210.0)];

        assert!(session.click(ScreenPoint::new(5.0, 50.0), &pages).is_none());
        assert!(session.click(ScreenPoint::new(50.0, 205.0), &pages).is_none());
        assert!(session.form().is_none());
        assert!(session.store().is_empty());
    }

    #[test]
    fn click_before_document_is_ready_is_ignored() {
        let mut session = Session::new(MemoryStore::new());
        assert!(session.click(ScreenPoint::new(50.0, 50.0), &[page(0, 0.0)]).is_none());
        assert!(session.form().is_none());
    }

    #[test]
    fn click_and_submit_creates_marker() {
        let (mut session, _dir) = ready_session(2);
        let events = record_events(&mut session);
        let pages = [page(0, 0.0), page(1, 210.0)];

        let point = session
            .click(ScreenPoint::new(60.0, 310.0), &pages)
            .unwrap();
        assert_eq!(point.page_index, 1);
        assert!((point.x - 0.5).abs() < 1e-9);
        assert!((point.y - 0.5).abs() < 1e-9);

        let form = session.form_mut().unwrap();
        form.set_focus(FormField::Type);
        for c in "Cat6".chars() {
            form.input_char(c);
        }
        form.set_focus(FormField::Location);
        for c in "Room 4".chars() {
            form.input_char(c);
        }

        let id = session.submit_form().unwrap().unwrap();
        let marker = session.store().get(&id).unwrap();
        assert_eq!(marker.label, "CAT-NET-1");
        assert_eq!(marker.page_index, 1);
        assert!(session.form().is_none());
        assert!(session.type_options().contains("Cat6"));
        assert!(session.location_options().contains("Room 4"));

        assert_eq!(
            *events.borrow(),
            vec![
                SessionEvent::FormOpened(point),
                SessionEvent::FormClosed,
                SessionEvent::MarkerAdded(id)
            ]
        );
    }

    #[test]
    fn invalid_form_stays_open() {
        let (mut session, _dir) = ready_session(1);
        session.click(ScreenPoint::new(20.0, 20.0), &[page(0, 0.0)]);

        assert_eq!(session.submit_form(), Err(FormError::MissingType));
        assert!(session.form().is_some());
        assert!(session.store().is_empty());

        session.cancel_form();
        assert!(session.form().is_none());
        assert_eq!(session.submit_form(), Ok(None));
    }

    #[test]
    fn selecting_marker_on_other_page_navigates_once() {
        let (mut session, _dir) = ready_session(5);
        let id = session.add_marker(draft("Fiber", 3));
        let events = record_events(&mut session);

        assert!(session.select(&id));
        assert_eq!(session.view().current_page, 3);
        assert_eq!(
            *events.borrow(),
            vec![
                SessionEvent::SelectionChanged(Some(id.clone())),
                SessionEvent::NavigationRequested(3),
                SessionEvent::PageChanged(3)
            ]
        );

        events.borrow_mut().clear();
        session.select(&id);
        assert_eq!(
            *events.borrow(),
            vec![SessionEvent::SelectionChanged(Some(id))]
        );
    }

    #[test]
    fn removing_selected_marker_clears_selection() {
        let (mut session, _dir) = ready_session(1);
        let keep = session.add_marker(draft("Fiber", 0));
        let gone = session.add_marker(draft("Fiber", 0));
        session.select(&gone);

        let removed = session.remove(&gone).unwrap();
        assert_eq!(removed.label, "FIB-NET-2");
        assert!(session.view().selected.is_none());
        assert_eq!(session.store().get(&keep).unwrap().label, "FIB-NET-1");

        assert!(session.remove(&MarkerId::from("unknown")).is_none());
        assert_eq!(session.store().len(), 1);
    }

    #[test]
    fn stale_load_does_not_replace_newer_document() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.pdf");
        let b = temp_dir.path().join("b.pdf");
        std::fs::write(&a, "%PDF").unwrap();
        std::fs::write(&b, "%PDF").unwrap();

        let mut session = Session::new(MemoryStore::new());
        let first = session.open_file(&a).unwrap();
        let second = session.open_file(&b).unwrap();

        assert!(session.apply_load(second, Ok(info(2))));
        assert!(!session.apply_load(first, Ok(info(40))));
        assert_eq!(session.view().page_count, 2);
        assert_eq!(session.document().upload().unwrap().name, "b.pdf");
    }

    #[test]
    fn closing_document_resets_view_and_keeps_markers() {
        let (mut session, _dir) = ready_session(3);
        let id = session.add_marker(draft("Fiber", 1));
        session.select(&id);
        session.navigate(ViewCommand::ZoomIn);
        session.click(ScreenPoint::new(20.0, 20.0), &[page(1, 0.0)]);
        assert!(session.form().is_some());
        let events = record_events(&mut session);

        assert!(session.close_document());
        assert_eq!(
            *events.borrow(),
            vec![
                SessionEvent::FormClosed,
                SessionEvent::SelectionChanged(None),
                SessionEvent::DocumentChanged
            ]
        );
        assert!(session.document().upload().is_none());
        assert!(session.form().is_none());
        assert_eq!(session.view().page_count, 0);
        assert_eq!(session.view().current_page, 0);
        assert!((session.view().zoom - ViewState::ZOOM_STEP).abs() < f32::EPSILON);
        assert_eq!(session.store().len(), 1);
        assert!(session.click(ScreenPoint::new(20.0, 20.0), &[page(0, 0.0)]).is_none());

        events.borrow_mut().clear();
        assert!(!session.close_document());
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn failed_load_disables_clicks() {
        let temp_dir = TempDir::new().unwrap();
        let pdf = temp_dir.path().join("bad.pdf");
        std::fs::write(&pdf, "garbage").unwrap();

        let mut session = Session::new(MemoryStore::new());
        let generation = session.open_file(&pdf).unwrap();
        session.apply_load(generation, Err("cannot open document".to_string()));

        assert_eq!(session.document().error(), Some("cannot open document"));
        assert!(session.click(ScreenPoint::new(20.0, 20.0), &[page(0, 0.0)]).is_none());
    }

    #[test]
    fn show_all_filter_and_navigation() {
        let (mut session, _dir) = ready_session(3);
        session.add_marker(draft("Fiber", 0));
        session.add_marker(draft("Fiber", 1));
        session.add_marker(draft("Fiber", 2));
        assert_eq!(session.visible_markers().len(), 1);

        session.navigate(ViewCommand::NextPage);
        assert_eq!(session.visible_markers()[0].page_index, 1);

        session.toggle_show_all();
        assert_eq!(session.visible_markers().len(), 3);
        session.toggle_show_all();
        assert_eq!(session.visible_markers().len(), 1);
    }

    #[test]
    fn options_are_seeded_from_stored_markers() {
        let (mut session, _dir) = ready_session(1);
        session.add_marker(draft("Fiber", 0));
        session.add_marker(draft("Coax", 0));

        let reloaded = Session::new(session.store().storage().clone());
        assert_eq!(
            reloaded.type_options().iter().collect::<Vec<_>>(),
            vec!["Fiber", "Coax"]
        );
        assert_eq!(reloaded.store().len(), 2);
    }

    #[test]
    fn export_ignores_filter() {
        let (mut session, dir) = ready_session(2);
        session.add_marker(draft("Fiber", 0));
        session.add_marker(draft("Fiber", 1));

        let path = dir.path().join("cable-markers.csv");
        session.export_csv(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
    }
}
