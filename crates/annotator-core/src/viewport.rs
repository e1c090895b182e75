//! Viewport state: current page, zoom and container size
//!
//! None of this affects stored annotation coordinates; it only drives the
//! overlay projection and tells export which container width was in use.

use crate::config::EditorConfig;
use crate::geometry::Point;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Viewport {
    current_page: u32,
    page_count: u32,
    zoom: f64,
    container_width: f64,
    container_height: f64,
    min_zoom: f64,
    max_zoom: f64,
    zoom_step: f64,
    max_container_width: f64,
}

impl Viewport {
    pub fn new(page_count: u32, config: &EditorConfig) -> Self {
        Self {
            current_page: 1,
            page_count: page_count.max(1),
            zoom: 1.0_f64.clamp(config.min_zoom, config.max_zoom),
            container_width: config.max_container_width,
            container_height: 0.0,
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
            zoom_step: config.zoom_step,
            max_container_width: config.max_container_width,
        }
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Unscaled container width in pixels; this is the capture frame
    pub fn container_width(&self) -> f64 {
        self.container_width
    }

    pub fn container_height(&self) -> f64 {
        self.container_height
    }

    /// Go to `page`, clamped to `[1, page_count]`. Returns the page shown.
    pub fn set_page(&mut self, page: u32) -> u32 {
        self.current_page = page.clamp(1, self.page_count);
        self.current_page
    }

    pub fn next_page(&mut self) -> u32 {
        self.set_page(self.current_page.saturating_add(1))
    }

    pub fn previous_page(&mut self) -> u32 {
        self.set_page(self.current_page.saturating_sub(1))
    }

    pub fn set_zoom(&mut self, zoom: f64) -> f64 {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        }
        self.zoom
    }

    pub fn zoom_in(&mut self) -> f64 {
        self.set_zoom(self.zoom + self.zoom_step)
    }

    pub fn zoom_out(&mut self) -> f64 {
        self.set_zoom(self.zoom - self.zoom_step)
    }

    /// Derive the container width from the available screen width
    pub fn set_available_width(&mut self, available: f64) -> f64 {
        if available.is_finite() && available > 0.0 {
            self.container_width = available.min(self.max_container_width);
        }
        self.container_width
    }

    /// Record the rendered (unscaled) page height reported by the renderer
    pub fn set_container_height(&mut self, height: f64) {
        if height.is_finite() && height >= 0.0 {
            self.container_height = height;
        }
    }

    /// Geometric centre of the unscaled container
    pub fn visual_center(&self) -> Point {
        Point::new(self.container_width / 2.0, self.container_height / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport(pages: u32) -> Viewport {
        Viewport::new(pages, &EditorConfig::default())
    }

    #[test]
    fn test_page_clamping() {
        let mut vp = viewport(3);
        assert_eq!(vp.current_page(), 1);
        assert_eq!(vp.set_page(0), 1);
        assert_eq!(vp.set_page(7), 3);
        assert_eq!(vp.next_page(), 3);
        assert_eq!(vp.previous_page(), 2);
        assert_eq!(vp.previous_page(), 1);
        assert_eq!(vp.previous_page(), 1);
    }

    #[test]
    fn test_zoom_clamping() {
        let mut vp = viewport(1);
        assert_eq!(vp.zoom(), 1.0);
        assert_eq!(vp.zoom_in(), 1.25);
        assert_eq!(vp.set_zoom(10.0), 3.0);
        assert_eq!(vp.set_zoom(0.1), 0.5);
        assert_eq!(vp.zoom_out(), 0.5);
        assert_eq!(vp.set_zoom(f64::NAN), 0.5);
    }

    #[test]
    fn test_container_width_is_capped() {
        let mut vp = viewport(1);
        assert_eq!(vp.set_available_width(1200.0), 800.0);
        assert_eq!(vp.set_available_width(375.0), 375.0);
        // Unusable widths leave the previous value in place
        assert_eq!(vp.set_available_width(0.0), 375.0);
    }

    #[test]
    fn test_visual_center() {
        let mut vp = viewport(1);
        vp.set_available_width(600.0);
        vp.set_container_height(800.0);
        assert_eq!(vp.visual_center(), Point::new(300.0, 400.0));
    }

    #[test]
    fn test_empty_document_still_has_one_page() {
        let vp = viewport(0);
        assert_eq!(vp.page_count(), 1);
    }
}
