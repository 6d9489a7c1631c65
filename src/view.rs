//! Page, selection and filter state

use crate::marker::{Marker, MarkerId};

/// Current view over the marker set
#[derive(Clone, Debug, PartialEq)]
pub struct ViewState {
    /// Current page (0-indexed)
    pub current_page: usize,

    /// Total page count of the loaded document
    pub page_count: usize,

    /// Selected marker, by id
    pub selected: Option<MarkerId>,

    /// Show markers from every page instead of the current one
    pub show_all_pages: bool,

    /// Zoom factor (1.0 = fit to viewport)
    pub zoom: f32,

    /// Horizontal pan of a zoomed page, -1.0 (left edge) to 1.0 (right edge)
    pub pan_x: f32,

    /// Vertical pan of a zoomed page, -1.0 (top edge) to 1.0 (bottom edge)
    pub pan_y: f32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            current_page: 0,
            page_count: 0,
            selected: None,
            show_all_pages: false,
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }
}

impl ViewState {
    pub const ZOOM_STEP: f32 = 1.25;
    pub const MIN_ZOOM: f32 = 0.5;
    pub const MAX_ZOOM: f32 = 4.0;
    pub const PAN_STEP: f32 = 0.25;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: ViewCommand) -> Vec<ViewEffect> {
        match cmd {
            ViewCommand::GoToPage(page) => self.go_to(page),

            ViewCommand::NextPage => self.go_to(self.current_page.saturating_add(1)),

            ViewCommand::PrevPage => self.go_to(self.current_page.saturating_sub(1)),

            ViewCommand::SetPageCount(count) => {
                self.page_count = count;
                let last = count.saturating_sub(1);
                if self.current_page > last {
                    self.current_page = last;
                    vec![ViewEffect::RenderPage(last)]
                } else {
                    vec![]
                }
            }

            ViewCommand::Select { id, page_index } => {
                self.selected = Some(id);
                if page_index != self.current_page && page_index < self.page_count {
                    self.current_page = page_index;
                    vec![ViewEffect::JumpToPage(page_index)]
                } else {
                    vec![]
                }
            }

            ViewCommand::ClearSelection => {
                self.selected = None;
                vec![]
            }

            ViewCommand::ClearSelectionIf(id) => {
                if self.selected.as_ref() == Some(&id) {
                    self.selected = None;
                }
                vec![]
            }

            ViewCommand::ToggleShowAll => {
                self.show_all_pages = !self.show_all_pages;
                vec![]
            }

            ViewCommand::ZoomIn => self.set_zoom(self.zoom * Self::ZOOM_STEP),

            ViewCommand::ZoomOut => self.set_zoom(self.zoom / Self::ZOOM_STEP),

            ViewCommand::Pan { dx, dy } => {
                let pan_x = (self.pan_x + dx * Self::PAN_STEP).clamp(-1.0, 1.0);
                let pan_y = (self.pan_y + dy * Self::PAN_STEP).clamp(-1.0, 1.0);
                if (pan_x, pan_y) != (self.pan_x, self.pan_y) {
                    self.pan_x = pan_x;
                    self.pan_y = pan_y;
                    vec![ViewEffect::RenderPage(self.current_page)]
                } else {
                    vec![]
                }
            }

            ViewCommand::Reset => {
                *self = Self {
                    zoom: self.zoom,
                    ..Self::default()
                };
                vec![]
            }
        }
    }

    fn go_to(&mut self, page: usize) -> Vec<ViewEffect> {
        let clamped = page.min(self.page_count.saturating_sub(1));
        if self.current_page != clamped {
            self.current_page = clamped;
            vec![ViewEffect::RenderPage(clamped)]
        } else {
            vec![]
        }
    }

    fn set_zoom(&mut self, zoom: f32) -> Vec<ViewEffect> {
        let clamped = zoom.clamp(Self::MIN_ZOOM, Self::MAX_ZOOM);
        if (self.zoom - clamped).abs() > f32::EPSILON {
            self.zoom = clamped;
            vec![ViewEffect::RenderPage(self.current_page)]
        } else {
            vec![]
        }
    }

    pub fn is_selected(&self, id: &MarkerId) -> bool {
        self.selected.as_ref() == Some(id)
    }

    /// Markers shown in the list and overlay for the current filter mode
    pub fn visible<'a>(&self, markers: &'a [Marker]) -> Vec<&'a Marker> {
        markers
            .iter()
            .filter(|m| self.show_all_pages || m.page_index == self.current_page)
            .collect()
    }
}

/// Commands that modify view state
#[derive(Clone, Debug, PartialEq)]
pub enum ViewCommand {
    /// Go to a specific page (clamped)
    GoToPage(usize),
    NextPage,
    PrevPage,
    /// Update the page count after a document load
    SetPageCount(usize),
    /// Select a marker, bringing its page into view
    Select { id: MarkerId, page_index: usize },
    ClearSelection,
    /// Clear the selection only if it points at this marker
    ClearSelectionIf(MarkerId),
    ToggleShowAll,
    ZoomIn,
    ZoomOut,
    /// Shift a zoomed page by `dx`/`dy` pan steps
    Pan { dx: f32, dy: f32 },
    /// Back to page 0 with no selection or pan, keeping zoom
    Reset,
}

/// Effects produced by view changes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewEffect {
    /// The visible page changed through navigation or zoom
    RenderPage(usize),
    /// Selection moved the view to another page
    JumpToPage(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn view_with_pages(count: usize) -> ViewState {
        let mut view = ViewState::new();
        let _ = view.apply(ViewCommand::SetPageCount(count));
        view
    }

    fn marker(id: &str, page_index: usize) -> Marker {
        Marker {
            id: MarkerId::from(id),
            x: 0.5,
            y: 0.5,
            page_index,
            quantity: 1,
            kind: "Cat6".to_string(),
            location: "Lobby".to_string(),
            purpose: "Network".to_string(),
            label: format!("CAT-NET-{id}"),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn initial_state() {
        let view = ViewState::new();
        assert_eq!(view.current_page, 0);
        assert!(view.selected.is_none());
        assert!(!view.show_all_pages);
    }

    #[test]
    fn navigation_clamps_to_page_range() {
        let mut view = view_with_pages(5);
        assert!(view.apply(ViewCommand::PrevPage).is_empty());
        assert_eq!(view.current_page, 0);

        let effects = view.apply(ViewCommand::GoToPage(99));
        assert_eq!(view.current_page, 4);
        assert_eq!(effects, vec![ViewEffect::RenderPage(4)]);

        assert!(view.apply(ViewCommand::NextPage).is_empty());
        assert_eq!(view.apply(ViewCommand::PrevPage), vec![ViewEffect::RenderPage(3)]);
    }

    #[test]
    fn select_on_other_page_jumps_once() {
        let mut view = view_with_pages(6);
        let effects = view.apply(ViewCommand::Select {
            id: MarkerId::from("m1"),
            page_index: 3,
        });
        assert_eq!(view.current_page, 3);
        assert_eq!(effects, vec![ViewEffect::JumpToPage(3)]);

        // Selecting again on the same page does not request navigation
        let effects = view.apply(ViewCommand::Select {
            id: MarkerId::from("m1"),
            page_index: 3,
        });
        assert!(effects.is_empty());
    }

    #[test]
    fn clear_selection_if_only_matches_same_id() {
        let mut view = view_with_pages(2);
        let _ = view.apply(ViewCommand::Select {
            id: MarkerId::from("a"),
            page_index: 0,
        });
        let _ = view.apply(ViewCommand::ClearSelectionIf(MarkerId::from("b")));
        assert!(view.is_selected(&MarkerId::from("a")));
        let _ = view.apply(ViewCommand::ClearSelectionIf(MarkerId::from("a")));
        assert!(view.selected.is_none());
    }

    #[test]
    fn shrinking_page_count_clamps_current_page() {
        let mut view = view_with_pages(10);
        let _ = view.apply(ViewCommand::GoToPage(8));
        let effects = view.apply(ViewCommand::SetPageCount(3));
        assert_eq!(view.current_page, 2);
        assert_eq!(effects, vec![ViewEffect::RenderPage(2)]);
    }

    #[test]
    fn toggle_show_all_never_hides_markers() {
        let markers = vec![marker("1", 0), marker("2", 1), marker("3", 0), marker("4", 2)];
        let mut view = view_with_pages(3);
        let filtered = view.visible(&markers).len();
        assert_eq!(filtered, 2);

        let _ = view.apply(ViewCommand::ToggleShowAll);
        assert!(view.visible(&markers).len() >= filtered);
        assert_eq!(view.visible(&markers).len(), 4);

        let _ = view.apply(ViewCommand::ToggleShowAll);
        assert_eq!(view.visible(&markers).len(), filtered);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut view = view_with_pages(1);
        for _ in 0..20 {
            let _ = view.apply(ViewCommand::ZoomIn);
        }
        assert!((view.zoom - ViewState::MAX_ZOOM).abs() < f32::EPSILON);
        assert!(view.apply(ViewCommand::ZoomIn).is_empty());
        for _ in 0..20 {
            let _ = view.apply(ViewCommand::ZoomOut);
        }
        assert!((view.zoom - ViewState::MIN_ZOOM).abs() < f32::EPSILON);
    }

    #[test]
    fn pan_is_clamped_and_cleared_by_reset() {
        let mut view = view_with_pages(2);
        let effects = view.apply(ViewCommand::Pan { dx: -1.0, dy: 0.0 });
        assert_eq!(effects, vec![ViewEffect::RenderPage(0)]);
        assert_eq!((view.pan_x, view.pan_y), (-0.25, 0.0));

        for _ in 0..10 {
            let _ = view.apply(ViewCommand::Pan { dx: -1.0, dy: 1.0 });
        }
        assert_eq!((view.pan_x, view.pan_y), (-1.0, 1.0));
        assert!(view.apply(ViewCommand::Pan { dx: -1.0, dy: 1.0 }).is_empty());

        let _ = view.apply(ViewCommand::ZoomIn);
        let _ = view.apply(ViewCommand::Reset);
        assert_eq!((view.pan_x, view.pan_y), (0.0, 0.0));
        assert!((view.zoom - ViewState::ZOOM_STEP).abs() < f32::EPSILON);
    }
}
