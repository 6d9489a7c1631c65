//! Pointer → page coordinate mapping.
//!
//! Rendered pages are described by their on-screen rectangles in whatever
//! unit the front end uses (terminal cells here). A click is converted to a
//! fraction of the page it landed on, which stays valid across zoom levels.

/// Screen-space rectangle of a rendered page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl PageRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// A page that has not been laid out yet has no usable area.
    pub fn is_laid_out(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Left/top edges inclusive, right/bottom exclusive.
    pub fn contains(&self, point: ScreenPoint) -> bool {
        point.x >= self.left
            && point.x < self.left + self.width
            && point.y >= self.top
            && point.y < self.top + self.height
    }

    /// Screen position of a fractional page coordinate.
    pub fn project(&self, x: f64, y: f64) -> ScreenPoint {
        ScreenPoint {
            x: self.left + x * self.width,
            y: self.top + y * self.height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Center of a terminal cell
    pub fn cell_center(column: u16, row: u16) -> Self {
        Self {
            x: f64::from(column) + 0.5,
            y: f64::from(row) + 0.5,
        }
    }
}

/// A page currently mounted on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderedPage {
    pub page_index: usize,
    pub rect: PageRect,
}

/// Page-relative fractional position of a click.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PagePoint {
    pub x: f64,
    pub y: f64,
    pub page_index: usize,
}

/// Find the rendered page under `point` and express the point as fractions
/// of that page. Pages are searched in document order; `None` means the
/// click missed every page and no marker form should open.
pub fn map_click(point: ScreenPoint, pages: &[RenderedPage]) -> Option<PagePoint> {
    let page = pages
        .iter()
        .filter(|page| page.rect.is_laid_out())
        .find(|page| page.rect.contains(point))?;

    let rect = page.rect;
    let x = ((point.x - rect.left) / rect.width).clamp(0.0, 1.0);
    let y = ((point.y - rect.top) / rect.height).clamp(0.0, 1.0);

    Some(PagePoint {
        x,
        y,
        page_index: page.page_index,
    })
}
