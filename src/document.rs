//! PDF document handling: upload validation, the load slot with its
//! generation counter, and the loader worker.
//!
//! The core never parses PDF structure. A [`PdfBackend`] supplies page
//! metadata and low-resolution previews; with the `pdf` feature that is
//! mupdf. Backends run on a single worker thread fed over flume channels, so
//! the UI stays responsive while a document opens.
//!
//! Each load is tagged with a generation. Picking a new file bumps the
//! generation, and any result that arrives for an older one is dropped.

use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Duration;

use flume::{Receiver, Sender};
use log::{debug, error, info, warn};

pub const PDF_MIME: &str = "application/pdf";

pub type Generation = u64;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("File not found: {}", .0.display())]
    Missing(PathBuf),
    #[error("Please upload a valid PDF file")]
    NotPdf { mime: String },
}

/// A file that passed upload validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfUpload {
    pub path: PathBuf,
    pub name: String,
}

/// Accept only files whose MIME type is `application/pdf`.
pub fn validate_upload(path: &Path) -> Result<PdfUpload, UploadError> {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if mime.essence_str() != PDF_MIME {
        return Err(UploadError::NotPdf {
            mime: mime.essence_str().to_string(),
        });
    }
    if !path.is_file() {
        return Err(UploadError::Missing(path.to_path_buf()));
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(PdfUpload {
        path: path.to_path_buf(),
        name,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[cfg(feature = "pdf")]
    #[error("PDF engine: {0}")]
    Pdf(#[from] mupdf::error::Error),

    #[error("document has no pages")]
    Empty,

    #[error("no document is open")]
    NotOpen,

    #[error("page {0} does not exist")]
    PageOutOfRange(usize),

    #[error("PDF support is not compiled in (build with the `pdf` feature)")]
    Unsupported,

    #[error("document loader stopped")]
    Disconnected,
}

/// Page size in PDF points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    /// US Letter, used when a page reports no usable bounds
    pub const LETTER: PageSize = PageSize {
        width: 612.0,
        height: 792.0,
    };

    pub fn aspect(&self) -> f32 {
        if self.width > 0.0 && self.height > 0.0 {
            self.width / self.height
        } else {
            Self::LETTER.width / Self::LETTER.height
        }
    }
}

/// Document metadata
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInfo {
    pub path: PathBuf,
    pub title: Option<String>,
    pub page_count: usize,
    pub page_sizes: Vec<PageSize>,
}

impl DocumentInfo {
    pub fn page_size(&self, page_index: usize) -> PageSize {
        self.page_sizes
            .get(page_index)
            .copied()
            .unwrap_or(PageSize::LETTER)
    }

    pub fn display_name(&self) -> String {
        self.title.clone().unwrap_or_else(|| {
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }
}

/// Grayscale raster of a page at two pixel rows per terminal row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePreview {
    pub page_index: usize,
    pub columns: u16,
    pub pixel_rows: u16,
    pub luma: Vec<u8>,
}

impl PagePreview {
    /// Luma at (column, pixel_row); white outside the raster
    pub fn luma_at(&self, column: u16, pixel_row: u16) -> u8 {
        if column >= self.columns || pixel_row >= self.pixel_rows {
            return u8::MAX;
        }
        let idx = usize::from(pixel_row) * usize::from(self.columns) + usize::from(column);
        self.luma.get(idx).copied().unwrap_or(u8::MAX)
    }

    pub fn fits(&self, page_index: usize, columns: u16, rows: u16) -> bool {
        self.page_index == page_index
            && self.columns == columns
            && self.pixel_rows == rows.saturating_mul(2)
    }
}

/// Source of page metadata and previews.
pub trait PdfBackend {
    fn open(&mut self, path: &Path) -> Result<DocumentInfo, LoadError>;
    fn render_preview(
        &mut self,
        page_index: usize,
        columns: u16,
        rows: u16,
    ) -> Result<PagePreview, LoadError>;
}

#[cfg(feature = "pdf")]
pub use mupdf_backend::MupdfBackend;

#[cfg(feature = "pdf")]
mod mupdf_backend {
    use super::{DocumentInfo, LoadError, PageSize, PagePreview, PdfBackend};
    use mupdf::{Colorspace, Document, Matrix};
    use std::path::Path;

    #[derive(Default)]
    pub struct MupdfBackend {
        doc: Option<Document>,
        page_count: usize,
    }

    impl PdfBackend for MupdfBackend {
        fn open(&mut self, path: &Path) -> Result<DocumentInfo, LoadError> {
            self.doc = None;
            let doc = Document::open(path.to_string_lossy().as_ref())?;
            let page_count = doc.page_count()?.max(0) as usize;
            if page_count == 0 {
                return Err(LoadError::Empty);
            }

            let mut page_sizes = Vec::with_capacity(page_count);
            for idx in 0..page_count {
                let page = doc.load_page(idx as i32)?;
                let bounds = page.bounds()?;
                page_sizes.push(PageSize {
                    width: bounds.x1 - bounds.x0,
                    height: bounds.y1 - bounds.y0,
                });
            }

            let title = doc
                .metadata(mupdf::MetadataName::Title)
                .ok()
                .filter(|t| !t.trim().is_empty());

            self.doc = Some(doc);
            self.page_count = page_count;

            Ok(DocumentInfo {
                path: path.to_path_buf(),
                title,
                page_count,
                page_sizes,
            })
        }

        fn render_preview(
            &mut self,
            page_index: usize,
            columns: u16,
            rows: u16,
        ) -> Result<PagePreview, LoadError> {
            let doc = self.doc.as_ref().ok_or(LoadError::NotOpen)?;
            if page_index >= self.page_count {
                return Err(LoadError::PageOutOfRange(page_index));
            }

            let page = doc.load_page(page_index as i32)?;
            let bounds = page.bounds()?;
            let page_width = (bounds.x1 - bounds.x0).max(1.0);
            let page_height = (bounds.y1 - bounds.y0).max(1.0);

            let target_width = columns.max(1);
            let target_height = rows.max(1).saturating_mul(2);
            let transform = Matrix::new_scale(
                f32::from(target_width) / page_width,
                f32::from(target_height) / page_height,
            );
            let pixmap = page.to_pixmap(&transform, &Colorspace::device_gray(), false, false)?;

            let n = (pixmap.n() as usize).max(1);
            let width = pixmap.width() as usize;
            let height = pixmap.height() as usize;
            let samples = pixmap.samples();

            // Pixmap dimensions are rounded by mupdf; resample to the exact grid.
            let mut luma = Vec::with_capacity(usize::from(target_width) * usize::from(target_height));
            for row in 0..usize::from(target_height) {
                let src_y = (row * height / usize::from(target_height)).min(height.saturating_sub(1));
                for col in 0..usize::from(target_width) {
                    let src_x = (col * width / usize::from(target_width)).min(width.saturating_sub(1));
                    let idx = (src_y * width + src_x) * n;
                    luma.push(samples.get(idx).copied().unwrap_or(u8::MAX));
                }
            }

            Ok(PagePreview {
                page_index,
                columns: target_width,
                pixel_rows: target_height,
                luma,
            })
        }
    }
}

/// Backend used when the crate is built without PDF support.
#[derive(Debug, Default)]
pub struct UnsupportedBackend;

impl PdfBackend for UnsupportedBackend {
    fn open(&mut self, _path: &Path) -> Result<DocumentInfo, LoadError> {
        Err(LoadError::Unsupported)
    }

    fn render_preview(&mut self, _: usize, _: u16, _: u16) -> Result<PagePreview, LoadError> {
        Err(LoadError::Unsupported)
    }
}

/// State of the currently selected document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentState {
    Empty,
    Loading { upload: PdfUpload },
    Ready { upload: PdfUpload, info: DocumentInfo },
    Failed { upload: PdfUpload, message: String },
}

#[derive(Debug, Clone)]
pub struct DocumentSlot {
    generation: Generation,
    state: DocumentState,
    preview: Option<PagePreview>,
}

impl Default for DocumentSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentSlot {
    pub fn new() -> Self {
        Self {
            generation: 0,
            state: DocumentState::Empty,
            preview: None,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn state(&self) -> &DocumentState {
        &self.state
    }

    /// Start loading `upload`, superseding anything in flight.
    pub fn begin_load(&mut self, upload: PdfUpload) -> Generation {
        self.generation += 1;
        info!(
            "Loading {} (generation {})",
            upload.path.display(),
            self.generation
        );
        self.state = DocumentState::Loading { upload };
        self.preview = None;
        self.generation
    }

    /// Drop the current document. Results still in flight become stale.
    pub fn clear(&mut self) {
        self.generation += 1;
        if let Some(upload) = self.upload() {
            info!("Closing {}", upload.name);
        }
        self.state = DocumentState::Empty;
        self.preview = None;
    }

    /// Apply a load result. Returns false when the result belongs to an older
    /// generation and was dropped.
    pub fn finish_load(
        &mut self,
        generation: Generation,
        result: Result<DocumentInfo, String>,
    ) -> bool {
        if generation != self.generation {
            debug!(
                "Dropping stale load result (generation {generation}, current {})",
                self.generation
            );
            return false;
        }
        let upload = match &self.state {
            DocumentState::Loading { upload } => upload.clone(),
            _ => {
                debug!("Dropping load result for generation {generation}: nothing is loading");
                return false;
            }
        };

        self.state = match result {
            Ok(info) => {
                info!("Loaded {} with {} pages", upload.name, info.page_count);
                DocumentState::Ready { upload, info }
            }
            Err(message) => {
                error!("Failed to load {}: {message}", upload.name);
                DocumentState::Failed { upload, message }
            }
        };
        true
    }

    /// Fail the current load without a backend result (e.g. loader gone).
    pub fn fail(&mut self, message: impl Into<String>) {
        let upload = match &self.state {
            DocumentState::Loading { upload }
            | DocumentState::Ready { upload, .. }
            | DocumentState::Failed { upload, .. } => upload.clone(),
            DocumentState::Empty => return,
        };
        self.state = DocumentState::Failed {
            upload,
            message: message.into(),
        };
        self.preview = None;
    }

    pub fn info(&self) -> Option<&DocumentInfo> {
        match &self.state {
            DocumentState::Ready { info, .. } => Some(info),
            _ => None,
        }
    }

    pub fn upload(&self) -> Option<&PdfUpload> {
        match &self.state {
            DocumentState::Empty => None,
            DocumentState::Loading { upload }
            | DocumentState::Ready { upload, .. }
            | DocumentState::Failed { upload, .. } => Some(upload),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, DocumentState::Ready { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            DocumentState::Failed { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn preview(&self) -> Option<&PagePreview> {
        self.preview.as_ref()
    }

    pub fn set_preview(&mut self, generation: Generation, preview: PagePreview) -> bool {
        if generation != self.generation || !self.is_ready() {
            debug!("Dropping stale preview for page {}", preview.page_index);
            return false;
        }
        self.preview = Some(preview);
        true
    }
}

/// Request sent to the loader worker
#[derive(Debug)]
pub enum LoaderRequest {
    Open {
        generation: Generation,
        path: PathBuf,
    },
    Preview {
        generation: Generation,
        page_index: usize,
        columns: u16,
        rows: u16,
    },
    Shutdown,
}

/// Response from the loader worker
#[derive(Debug)]
pub enum LoaderResponse {
    Opened {
        generation: Generation,
        result: Result<DocumentInfo, String>,
    },
    Preview {
        generation: Generation,
        preview: PagePreview,
    },
    PreviewFailed {
        generation: Generation,
        page_index: usize,
        error: String,
    },
}

/// Owns the worker thread that talks to the PDF backend.
pub struct DocumentLoader {
    request_tx: Sender<LoaderRequest>,
    response_rx: Receiver<LoaderResponse>,
    handle: Option<JoinHandle<()>>,
}

impl DocumentLoader {
    /// Spawn a worker. The backend is built on the worker thread because
    /// PDF engines are usually not `Send`.
    pub fn spawn<B, F>(make_backend: F) -> Self
    where
        B: PdfBackend,
        F: FnOnce() -> B + Send + 'static,
    {
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        let handle = std::thread::Builder::new()
            .name("dropmark-loader".to_string())
            .spawn(move || {
                let mut backend = make_backend();
                loader_worker(&mut backend, request_rx, response_tx);
            })
            .map_err(|e| error!("Failed to spawn document loader: {e}"))
            .ok();

        Self {
            request_tx,
            response_rx,
            handle,
        }
    }

    /// Loader with the backend selected by cargo features
    pub fn with_default_backend() -> Self {
        #[cfg(feature = "pdf")]
        {
            Self::spawn(MupdfBackend::default)
        }
        #[cfg(not(feature = "pdf"))]
        {
            Self::spawn(|| UnsupportedBackend)
        }
    }

    pub fn open(&self, generation: Generation, path: &Path) -> Result<(), LoadError> {
        self.request_tx
            .send(LoaderRequest::Open {
                generation,
                path: path.to_path_buf(),
            })
            .map_err(|_| LoadError::Disconnected)
    }

    pub fn request_preview(
        &self,
        generation: Generation,
        page_index: usize,
        columns: u16,
        rows: u16,
    ) -> Result<(), LoadError> {
        self.request_tx
            .send(LoaderRequest::Preview {
                generation,
                page_index,
                columns,
                rows,
            })
            .map_err(|_| LoadError::Disconnected)
    }

    /// Drain every response that is ready without blocking
    pub fn poll(&self) -> Vec<LoaderResponse> {
        self.response_rx.try_iter().collect()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<LoaderResponse> {
        self.response_rx.recv_timeout(timeout).ok()
    }
}

impl Drop for DocumentLoader {
    fn drop(&mut self) {
        let _ = self.request_tx.send(LoaderRequest::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Document loader thread panicked");
            }
        }
    }
}

fn loader_worker<B: PdfBackend>(
    backend: &mut B,
    requests: Receiver<LoaderRequest>,
    responses: Sender<LoaderResponse>,
) {
    let mut open_generation: Option<Generation> = None;

    for request in requests {
        match request {
            LoaderRequest::Open { generation, path } => {
                let result = backend.open(&path).map_err(|e| e.to_string());
                open_generation = result.is_ok().then_some(generation);
                let _ = responses.send(LoaderResponse::Opened { generation, result });
            }

            LoaderRequest::Preview {
                generation,
                page_index,
                columns,
                rows,
            } => {
                if open_generation != Some(generation) {
                    debug!("Skipping preview for stale generation {generation}");
                    continue;
                }
                let response = match backend.render_preview(page_index, columns, rows) {
                    Ok(preview) => LoaderResponse::Preview {
                        generation,
                        preview,
                    },
                    Err(e) => LoaderResponse::PreviewFailed {
                        generation,
                        page_index,
                        error: e.to_string(),
                    },
                };
                let _ = responses.send(response);
            }

            LoaderRequest::Shutdown => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn info(pages: usize) -> DocumentInfo {
        DocumentInfo {
            path: PathBuf::from("plan.pdf"),
            title: None,
            page_count: pages,
            page_sizes: vec![PageSize::LETTER; pages],
        }
    }

    fn upload(name: &str) -> PdfUpload {
        PdfUpload {
            path: PathBuf::from(name),
            name: name.to_string(),
        }
    }

    struct FakeBackend;

    impl PdfBackend for FakeBackend {
        fn open(&mut self, path: &Path) -> Result<DocumentInfo, LoadError> {
            if path.ends_with("broken.pdf") {
                return Err(LoadError::Empty);
            }
            Ok(DocumentInfo {
                path: path.to_path_buf(),
                ..info(3)
            })
        }

        fn render_preview(
            &mut self,
            page_index: usize,
            columns: u16,
            rows: u16,
        ) -> Result<PagePreview, LoadError> {
            Ok(PagePreview {
                page_index,
                columns,
                pixel_rows: rows * 2,
                luma: vec![128; usize::from(columns) * usize::from(rows) * 2],
            })
        }
    }

    #[test]
    fn rejects_non_pdf_mime() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let err = validate_upload(&path).unwrap_err();
        assert!(matches!(err, UploadError::NotPdf { ref mime } if mime == "text/plain"));
        assert_eq!(err.to_string(), "Please upload a valid PDF file");
    }

    #[test]
    fn accepts_pdf_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("Floor Plan.PDF");
        std::fs::write(&path, "%PDF-1.4").unwrap();

        let upload = validate_upload(&path).unwrap();
        assert_eq!(upload.name, "Floor Plan.PDF");
        assert!(matches!(
            validate_upload(&temp_dir.path().join("missing.pdf")),
            Err(UploadError::Missing(_))
        ));
    }

    #[test]
    fn stale_load_results_are_dropped() {
        let mut slot = DocumentSlot::new();
        let first = slot.begin_load(upload("a.pdf"));
        let second = slot.begin_load(upload("b.pdf"));

        assert!(!slot.finish_load(first, Ok(info(9))));
        assert!(!slot.is_ready());

        assert!(slot.finish_load(second, Ok(info(2))));
        assert_eq!(slot.info().unwrap().page_count, 2);
        assert_eq!(slot.upload().unwrap().name, "b.pdf");

        // A late duplicate for the same generation is ignored too
        assert!(!slot.finish_load(second, Ok(info(7))));
        assert_eq!(slot.info().unwrap().page_count, 2);
    }

    #[test]
    fn failed_load_records_message() {
        let mut slot = DocumentSlot::new();
        let generation = slot.begin_load(upload("a.pdf"));
        assert!(slot.finish_load(generation, Err("broken xref".to_string())));
        assert_eq!(slot.error(), Some("broken xref"));
        assert!(slot.info().is_none());
    }

    #[test]
    fn previews_from_old_generations_are_ignored() {
        let mut slot = DocumentSlot::new();
        let first = slot.begin_load(upload("a.pdf"));
        slot.finish_load(first, Ok(info(1)));
        let preview = PagePreview {
            page_index: 0,
            columns: 1,
            pixel_rows: 2,
            luma: vec![0, 255],
        };
        assert!(slot.set_preview(first, preview.clone()));

        let second = slot.begin_load(upload("b.pdf"));
        assert!(slot.preview().is_none());
        assert!(!slot.set_preview(first, preview));
        assert_ne!(first, second);
    }

    #[test]
    fn clear_empties_the_slot_and_drops_loads_in_flight() {
        let mut slot = DocumentSlot::new();
        let ready = slot.begin_load(upload("a.pdf"));
        slot.finish_load(ready, Ok(info(4)));
        slot.clear();
        assert!(matches!(slot.state(), DocumentState::Empty));
        assert!(slot.upload().is_none());

        let pending = slot.begin_load(upload("b.pdf"));
        slot.clear();
        assert!(!slot.finish_load(pending, Ok(info(2))));
        assert!(matches!(slot.state(), DocumentState::Empty));
    }

    #[test]
    fn loader_worker_opens_and_renders() {
        let loader = DocumentLoader::spawn(|| FakeBackend);
        loader.open(1, Path::new("plan.pdf")).unwrap();
        loader.request_preview(1, 2, 4, 3).unwrap();
        loader.request_preview(7, 0, 4, 3).unwrap();

        match loader.recv_timeout(Duration::from_secs(5)) {
            Some(LoaderResponse::Opened { generation, result }) => {
                assert_eq!(generation, 1);
                assert_eq!(result.unwrap().page_count, 3);
            }
            other => panic!("unexpected response: {other:?}"),
        }
        match loader.recv_timeout(Duration::from_secs(5)) {
            Some(LoaderResponse::Preview { generation, preview }) => {
                assert_eq!(generation, 1);
                assert!(preview.fits(2, 4, 3));
            }
            other => panic!("unexpected response: {other:?}"),
        }
        // The generation-7 preview was skipped
        assert!(loader.recv_timeout(Duration::from_millis(100)).is_none());
    }

    #[test]
    fn loader_reports_open_failures() {
        let loader = DocumentLoader::spawn(|| FakeBackend);
        loader.open(3, Path::new("broken.pdf")).unwrap();
        match loader.recv_timeout(Duration::from_secs(5)) {
            Some(LoaderResponse::Opened { result, .. }) => {
                assert_eq!(result.unwrap_err(), "document has no pages");
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
