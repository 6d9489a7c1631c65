// Export modules for use in tests and the binary
pub mod coords;
pub mod document;
pub mod event_source;
pub mod export;
pub mod form;
pub mod label;
pub mod main_app;
pub mod marker;
pub mod panic_handler;
pub mod purpose;
pub mod session;
pub mod settings;
pub mod storage;
pub mod store;
pub mod theme;
pub mod view;
pub mod widget;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export main app components
pub use main_app::{App, AppAction, run_app_with_event_source};
pub use marker::{Marker, MarkerDraft, MarkerId};
pub use session::{Session, SessionEvent};
