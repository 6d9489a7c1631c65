//! Page area: the rasterized page preview with marker glyphs on top.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier},
    widgets::Widget,
};

use crate::coords::PageRect;
use crate::document::{PagePreview, PageSize};
use crate::marker::Marker;
use crate::theme::Base16Palette;

/// Terminal cells are roughly twice as tall as they are wide.
const CELL_ASPECT: f64 = 2.0;

const MARKER_GLYPH: char = '●';
const SELECTED_GLYPH: char = '◉';
const UPPER_HALF: char = '▀';

/// Lay a page out inside `area`: fit the whole page at zoom 1.0, scale by
/// `zoom`, center on the area. The result may extend past `area` when zoomed;
/// `pan` then slides it along each overflowing axis, -1.0 showing the
/// left/top edge and 1.0 the right/bottom edge.
pub fn fit_page(area: Rect, page: PageSize, zoom: f32, pan: (f32, f32)) -> PageRect {
    let avail_w = f64::from(area.width);
    let avail_h = f64::from(area.height);
    if avail_w <= 0.0 || avail_h <= 0.0 {
        return PageRect::new(f64::from(area.x), f64::from(area.y), 0.0, 0.0);
    }

    let aspect = f64::from(page.aspect()) * CELL_ASPECT;
    let mut height = avail_h;
    let mut width = height * aspect;
    if width > avail_w {
        width = avail_w;
        height = width / aspect;
    }
    width *= f64::from(zoom);
    height *= f64::from(zoom);

    PageRect::new(
        f64::from(area.x) + offset(avail_w, width, pan.0),
        f64::from(area.y) + offset(avail_h, height, pan.1),
        width,
        height,
    )
}

/// Leading offset of a page extent within the available extent
fn offset(avail: f64, extent: f64, pan: f32) -> f64 {
    let centered = (avail - extent) / 2.0;
    let overflow = extent - avail;
    if overflow > 0.0 {
        centered - f64::from(pan.clamp(-1.0, 1.0)) * overflow / 2.0
    } else {
        centered
    }
}

/// Preview grid size wanted for a laid-out page
pub fn preview_size(rect: &PageRect) -> (u16, u16) {
    let columns = rect.width.ceil().clamp(1.0, 1000.0) as u16;
    let rows = rect.height.ceil().clamp(1.0, 1000.0) as u16;
    (columns, rows)
}

pub struct PageCanvas<'a> {
    rect: PageRect,
    preview: Option<&'a PagePreview>,
    markers: Vec<(&'a Marker, bool)>,
    palette: &'a Base16Palette,
}

impl<'a> PageCanvas<'a> {
    pub fn new(rect: PageRect, palette: &'a Base16Palette) -> Self {
        Self {
            rect,
            preview: None,
            markers: Vec::new(),
            palette,
        }
    }

    pub fn preview(mut self, preview: Option<&'a PagePreview>) -> Self {
        self.preview = preview;
        self
    }

    /// Markers to draw, each with its selected flag
    pub fn markers(mut self, markers: Vec<(&'a Marker, bool)>) -> Self {
        self.markers = markers;
        self
    }

    fn shade(&self, column: u16, pixel_y: f64) -> Color {
        let Some(preview) = self.preview else {
            return self.palette.base_07;
        };
        let fx = (f64::from(column) + 0.5 - self.rect.left) / self.rect.width;
        let fy = (pixel_y - self.rect.top) / self.rect.height;
        let px = (fx * f64::from(preview.columns)).floor();
        let py = (fy * f64::from(preview.pixel_rows)).floor();
        if px < 0.0 || py < 0.0 {
            return self.palette.base_07;
        }
        let luma = preview.luma_at(px as u16, py as u16);
        Color::Rgb(luma, luma, luma)
    }
}

impl Widget for PageCanvas<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if !self.rect.is_laid_out() {
            return;
        }

        let x0 = self.rect.left.max(f64::from(area.left())).floor() as u16;
        let y0 = self.rect.top.max(f64::from(area.top())).floor() as u16;
        let x1 = (self.rect.left + self.rect.width).min(f64::from(area.right())).ceil() as u16;
        let y1 = (self.rect.top + self.rect.height).min(f64::from(area.bottom())).ceil() as u16;

        for row in y0..y1 {
            for column in x0..x1 {
                let top = self.shade(column, f64::from(row) + 0.25);
                let bottom = self.shade(column, f64::from(row) + 0.75);
                if let Some(cell) = buf.cell_mut((column, row)) {
                    cell.set_char(UPPER_HALF).set_fg(top).set_bg(bottom);
                }
            }
        }

        for (marker, selected) in &self.markers {
            let point = self.rect.project(marker.x, marker.y);
            let (column, row) = (point.x.floor(), point.y.floor());
            if column < f64::from(area.left())
                || row < f64::from(area.top())
                || column >= f64::from(area.right())
                || row >= f64::from(area.bottom())
            {
                continue;
            }
            let (column, row) = (column as u16, row as u16);
            let color = self.palette.purpose_color(marker.category());

            if let Some(cell) = buf.cell_mut((column, row)) {
                cell.set_char(if *selected { SELECTED_GLYPH } else { MARKER_GLYPH })
                    .set_fg(color)
                    .set_bg(self.palette.base_00);
                if *selected {
                    cell.modifier.insert(Modifier::BOLD);
                }
            }

            if *selected {
                // Label to the right of the selected marker, clipped to the area
                for (offset, ch) in format!(" {}", marker.label).chars().enumerate() {
                    let x = column.saturating_add(1 + offset as u16);
                    if x >= area.right() {
                        break;
                    }
                    if let Some(cell) = buf.cell_mut((x, row)) {
                        cell.set_char(ch)
                            .set_fg(self.palette.base_07)
                            .set_bg(self.palette.base_02);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{RenderedPage, ScreenPoint, map_click};
    use crate::marker::MarkerId;
    use crate::theme::current_theme;
    use chrono::Utc;

    fn marker(x: f64, y: f64) -> Marker {
        Marker {
            id: MarkerId::from("m"),
            x,
            y,
            page_index: 0,
            quantity: 1,
            kind: "Cat6".to_string(),
            location: "Lab".to_string(),
            purpose: "Power".to_string(),
            label: "CAT-POW-1".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn portrait_page_fits_height() {
        let area = Rect::new(0, 0, 100, 20);
        let page = PageSize {
            width: 600.0,
            height: 800.0,
        };
        let rect = fit_page(area, page, 1.0, (0.0, 0.0));
        assert!((rect.height - 20.0).abs() < 1e-9);
        assert!((rect.width - 30.0).abs() < 1e-9);
        assert!((rect.left - 35.0).abs() < 1e-9);
    }

    #[test]
    fn wide_page_fits_width() {
        let area = Rect::new(2, 1, 40, 30);
        let page = PageSize {
            width: 800.0,
            height: 400.0,
        };
        let rect = fit_page(area, page, 1.0, (0.0, 0.0));
        assert!((rect.width - 40.0).abs() < 1e-9);
        assert!((rect.height - 10.0).abs() < 1e-9);
        assert!((rect.top - 11.0).abs() < 1e-9);
    }

    #[test]
    fn zoom_scales_around_center() {
        let area = Rect::new(0, 0, 40, 20);
        let base = fit_page(area, PageSize::LETTER, 1.0, (0.0, 0.0));
        let zoomed = fit_page(area, PageSize::LETTER, 2.0, (0.0, 0.0));
        assert!((zoomed.width - base.width * 2.0).abs() < 1e-9);
        let center = |r: &PageRect| (r.left + r.width / 2.0, r.top + r.height / 2.0);
        let (bx, by) = center(&base);
        let (zx, zy) = center(&zoomed);
        assert!((bx - zx).abs() < 1e-9 && (by - zy).abs() < 1e-9);
    }

    #[test]
    fn pan_reaches_every_edge_of_a_zoomed_page() {
        let area = Rect::new(1, 1, 66, 27);
        let page = |pan| RenderedPage {
            page_index: 0,
            rect: fit_page(area, PageSize::LETTER, 4.0, pan),
        };
        let first = ScreenPoint::cell_center(area.left(), area.top());
        let last = ScreenPoint::cell_center(area.right() - 1, area.bottom() - 1);

        let top_left = map_click(first, &[page((-1.0, -1.0))]).unwrap();
        assert!(top_left.x < 0.01 && top_left.y < 0.01, "{top_left:?}");

        let bottom_right = map_click(last, &[page((1.0, 1.0))]).unwrap();
        assert!(bottom_right.x > 0.99 && bottom_right.y > 0.99, "{bottom_right:?}");

        // Centered, neither edge is reachable
        let centered = map_click(first, &[page((0.0, 0.0))]).unwrap();
        assert!(centered.x > 0.2 && centered.y > 0.2, "{centered:?}");
    }

    #[test]
    fn pan_does_not_move_a_page_that_fits() {
        let area = Rect::new(0, 0, 100, 20);
        let page = PageSize {
            width: 600.0,
            height: 800.0,
        };
        assert_eq!(
            fit_page(area, page, 1.0, (1.0, -1.0)),
            fit_page(area, page, 1.0, (0.0, 0.0))
        );
    }

    #[test]
    fn empty_area_is_not_laid_out() {
        let rect = fit_page(Rect::new(0, 0, 0, 10), PageSize::LETTER, 1.0, (0.0, 0.0));
        assert!(!rect.is_laid_out());
    }

    #[test]
    fn marker_glyph_lands_on_projected_cell() {
        let area = Rect::new(0, 0, 20, 10);
        let rect = PageRect::new(0.0, 0.0, 20.0, 10.0);
        let m = marker(0.5, 0.5);
        let mut buf = Buffer::empty(area);

        PageCanvas::new(rect, current_theme())
            .markers(vec![(&m, false)])
            .render(area, &mut buf);

        assert_eq!(buf[(10, 5)].symbol(), "●");
        assert_eq!(buf[(0, 0)].symbol(), "▀");
        let point = rect.project(m.x, m.y);
        assert_eq!(point, ScreenPoint::new(10.0, 5.0));
    }

    #[test]
    fn selected_marker_shows_label() {
        let area = Rect::new(0, 0, 30, 10);
        let rect = PageRect::new(0.0, 0.0, 30.0, 10.0);
        let m = marker(0.1, 0.2);
        let mut buf = Buffer::empty(area);

        PageCanvas::new(rect, current_theme())
            .markers(vec![(&m, true)])
            .render(area, &mut buf);

        assert_eq!(buf[(3, 2)].symbol(), "◉");
        let label: String = (5..14).map(|x| buf[(x, 2)].symbol().to_string()).collect();
        assert_eq!(label, "CAT-POW-1");
    }

    #[test]
    fn preview_shades_cells() {
        let area = Rect::new(0, 0, 2, 1);
        let rect = PageRect::new(0.0, 0.0, 2.0, 1.0);
        let preview = PagePreview {
            page_index: 0,
            columns: 2,
            pixel_rows: 2,
            luma: vec![0, 255, 10, 200],
        };
        let mut buf = Buffer::empty(area);
        PageCanvas::new(rect, current_theme())
            .preview(Some(&preview))
            .render(area, &mut buf);

        assert_eq!(buf[(0, 0)].fg, Color::Rgb(0, 0, 0));
        assert_eq!(buf[(0, 0)].bg, Color::Rgb(10, 10, 10));
        assert_eq!(buf[(1, 0)].fg, Color::Rgb(255, 255, 255));
    }
}
