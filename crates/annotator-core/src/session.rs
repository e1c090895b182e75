//! One loaded document and everything drawn on it
//!
//! A session is created when a document is opened and dropped when it is
//! closed or replaced, so markup never leaks from one document to the next.

use crate::config::EditorConfig;
use crate::error::AnnotatorError;
use crate::export::{export_document, ExportOutput};
use crate::geometry::Point;
use crate::input::validate_pdf_bytes;
use crate::interaction::{CaptureOutcome, Interaction, PointerInput, Tool};
use crate::model::{AnnotationId, AnnotationStore};
use crate::overlay::{project_overlay, OverlayShape};
use crate::viewport::Viewport;
use tracing::{debug, info};

pub struct MarkupSession {
    name: String,
    source: Vec<u8>,
    page_count: u32,
    config: EditorConfig,
    store: AnnotationStore,
    interaction: Interaction,
    viewport: Viewport,
}

impl MarkupSession {
    /// Validate `bytes` and start an empty session for them
    pub fn open(
        name: impl Into<String>,
        bytes: Vec<u8>,
        config: EditorConfig,
    ) -> Result<Self, AnnotatorError> {
        config.validate()?;
        let page_count = validate_pdf_bytes(&bytes)?;
        let name = name.into();
        info!(name = %name, page_count, size = bytes.len(), "Opened document");

        Ok(Self {
            interaction: Interaction::new(&config),
            viewport: Viewport::new(page_count, &config),
            store: AnnotationStore::new(),
            name,
            source: bytes,
            page_count,
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &[u8] {
        &self.source
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Toggle a tool; `None` disarms whatever is armed
    pub fn select_tool(&mut self, tool: Option<Tool>) -> Option<Tool> {
        match tool {
            Some(tool) => self.interaction.select_tool(tool),
            None => {
                self.interaction.disarm();
                None
            }
        }
    }

    pub fn set_comment_text(&mut self, text: &str) {
        self.interaction.set_comment_text(text);
    }

    pub fn set_color(&mut self, color: Option<String>) {
        self.interaction.set_color(color);
    }

    pub fn pointer_down(&mut self, input: &PointerInput) -> CaptureOutcome {
        let page = self.viewport.current_page();
        self.interaction.press(input, page, &mut self.store)
    }

    pub fn pointer_move(&mut self, input: &PointerInput) -> CaptureOutcome {
        self.interaction.move_to(input)
    }

    pub fn pointer_up(&mut self) -> CaptureOutcome {
        let page = self.viewport.current_page();
        self.interaction.release(page, &mut self.store)
    }

    fn page_changed(&mut self, before: u32) -> u32 {
        let now = self.viewport.current_page();
        if now != before && self.interaction.cancel_gesture() {
            debug!(from = before, to = now, "Dropped gesture on page change");
        }
        now
    }

    pub fn set_page(&mut self, page: u32) -> u32 {
        let before = self.viewport.current_page();
        self.viewport.set_page(page);
        self.page_changed(before)
    }

    pub fn next_page(&mut self) -> u32 {
        let before = self.viewport.current_page();
        self.viewport.next_page();
        self.page_changed(before)
    }

    pub fn previous_page(&mut self) -> u32 {
        let before = self.viewport.current_page();
        self.viewport.previous_page();
        self.page_changed(before)
    }

    pub fn set_zoom(&mut self, zoom: f64) -> f64 {
        self.viewport.set_zoom(zoom)
    }

    pub fn zoom_in(&mut self) -> f64 {
        self.viewport.zoom_in()
    }

    pub fn zoom_out(&mut self) -> f64 {
        self.viewport.zoom_out()
    }

    /// Resize the page container. Marks are stored in container pixels, so
    /// the width is frozen while any markup exists and the current width is
    /// returned unchanged.
    pub fn set_available_width(&mut self, width: f64) -> f64 {
        if !self.store.is_empty() {
            debug!(
                requested = width,
                current = self.viewport.container_width(),
                "Container width locked while markup exists"
            );
            return self.viewport.container_width();
        }
        self.viewport.set_available_width(width)
    }

    pub fn set_container_height(&mut self, height: f64) {
        self.viewport.set_container_height(height);
    }

    /// Place a signature on the current page, centred in the view at the
    /// default size
    pub fn import_signature(&mut self, image_data: String) -> Result<AnnotationId, AnnotatorError> {
        let center = self.viewport.visual_center();
        let (width, height) = (self.config.signature_width, self.config.signature_height);
        let position = Point::new(center.x - width / 2.0, center.y - height / 2.0);

        let id = self.store.add_signature(
            self.viewport.current_page(),
            image_data,
            position,
            width,
            height,
        )?;
        self.interaction.close_signature_placement();
        Ok(id)
    }

    pub fn remove(&mut self, id: AnnotationId) -> bool {
        self.store.remove(id)
    }

    pub fn overlay(&self) -> Vec<OverlayShape> {
        project_overlay(&self.store, &self.interaction, &self.viewport, &self.config)
    }

    /// Flatten the current markup into a new document
    ///
    /// Works from a snapshot, so the session may keep changing once this
    /// returns without affecting the output.
    pub fn export(&self) -> Result<ExportOutput, AnnotatorError> {
        let snapshot = self.store.snapshot();
        export_document(
            &self.source,
            &self.name,
            &snapshot,
            self.viewport.container_width(),
            &self.config,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{create_test_pdf, signature_uri};
    use crate::input::RejectReason;
    use crate::interaction::IgnoreReason;
    use pretty_assertions::assert_eq;

    fn session(pages: u32) -> MarkupSession {
        MarkupSession::open("report.pdf", create_test_pdf(pages, 600, 800), EditorConfig::default())
            .unwrap()
    }

    fn at(x: f64, y: f64) -> PointerInput {
        PointerInput::Pointer(Point::new(x, y))
    }

    fn page_content(bytes: &[u8]) -> Vec<u8> {
        let doc = lopdf::Document::load_mem(bytes).unwrap();
        doc.get_page_content(doc.get_pages()[&1]).unwrap()
    }

    #[test]
    fn test_open_rejects_non_pdf() {
        let err = MarkupSession::open("notes.txt", b"hello".to_vec(), EditorConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, AnnotatorError::InputRejected(RejectReason::NotPdf)));
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let config = EditorConfig {
            highlight_opacity: 2.0,
            ..Default::default()
        };
        let result = MarkupSession::open("a.pdf", create_test_pdf(1, 600, 800), config);
        assert!(matches!(result, Err(AnnotatorError::ConfigError(_))));
    }

    #[test]
    fn test_highlight_lands_on_current_page() {
        let mut s = session(3);
        s.set_page(2);
        s.select_tool(Some(Tool::Highlight));
        s.pointer_down(&at(100.0, 100.0));
        s.pointer_move(&at(150.0, 105.0));
        let outcome = s.pointer_up();

        let CaptureOutcome::Committed(id) = outcome else {
            panic!("Expected commit, got {:?}", outcome);
        };
        let stored = &s.store().annotations()[0];
        assert_eq!(stored.id, id);
        assert_eq!(stored.page, 2);
        assert_eq!(s.interaction().armed_tool(), Some(Tool::Highlight));
    }

    #[test]
    fn test_empty_comment_is_ignored() {
        let mut s = session(1);
        s.select_tool(Some(Tool::Comment));
        assert_eq!(
            s.pointer_down(&at(10.0, 10.0)),
            CaptureOutcome::Ignored(IgnoreReason::EmptyComment)
        );
        assert!(s.store().is_empty());
    }

    #[test]
    fn test_page_change_drops_gesture() {
        let mut s = session(2);
        s.select_tool(Some(Tool::Freehand));
        s.pointer_down(&at(1.0, 1.0));
        s.pointer_move(&at(5.0, 5.0));
        s.next_page();
        assert_eq!(
            s.pointer_up(),
            CaptureOutcome::Ignored(IgnoreReason::NotCapturing)
        );
        assert!(s.store().is_empty());
        assert_eq!(s.interaction().armed_tool(), Some(Tool::Freehand));
    }

    #[test]
    fn test_signature_is_centred_and_closes_placement() {
        let mut s = session(1);
        s.set_available_width(600.0);
        s.set_container_height(800.0);
        s.select_tool(Some(Tool::Signature));

        let id = s.import_signature(signature_uri()).unwrap();
        let sig = &s.store().signatures()[0];
        assert_eq!(sig.id, id);
        assert_eq!(sig.position, Point::new(225.0, 375.0));
        assert_eq!((sig.width, sig.height), (150.0, 50.0));
        assert_eq!(s.interaction().armed_tool(), None);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut s = session(1);
        let id = s.import_signature(signature_uri()).unwrap();
        assert!(s.remove(id));
        assert!(!s.remove(id));
        assert!(s.overlay().is_empty());
    }

    #[test]
    fn test_overlay_follows_current_page() {
        let mut s = session(2);
        s.set_comment_text("Check this");
        s.select_tool(Some(Tool::Comment));
        s.pointer_down(&at(30.0, 40.0));

        assert!(matches!(s.overlay()[0], OverlayShape::Callout { .. }));
        s.next_page();
        assert!(s.overlay().is_empty());
    }

    #[test]
    fn test_export_uses_container_width() {
        let mut s = session(1);
        s.set_available_width(600.0);
        s.select_tool(Some(Tool::Underline));
        s.pointer_down(&at(10.0, 10.0));
        s.pointer_move(&at(60.0, 12.0));
        s.pointer_up();

        let output = s.export().unwrap();
        assert_eq!(output.file_name, "annotated_report.pdf");
        assert_eq!(output.report.annotations_drawn, 1);
        assert!(output.bytes.starts_with(b"%PDF-"));

        // Exporting does not consume the markup
        let again = s.export().unwrap();
        assert_eq!(again.report, output.report);
        assert_eq!(s.store().len(), 1);
    }

    #[test]
    fn test_container_width_is_locked_while_markup_exists() {
        let mut s = session(1);
        assert_eq!(s.set_available_width(800.0), 800.0);
        s.select_tool(Some(Tool::Highlight));
        s.pointer_down(&at(100.0, 100.0));
        s.pointer_move(&at(150.0, 100.0));
        let CaptureOutcome::Committed(id) = s.pointer_up() else {
            panic!("highlight was not committed");
        };
        let before = s.export().unwrap();

        assert_eq!(s.set_available_width(400.0), 800.0);
        let after = s.export().unwrap();
        assert_eq!(page_content(&after.bytes), page_content(&before.bytes));

        assert!(s.remove(id));
        assert_eq!(s.set_available_width(400.0), 400.0);
    }

    #[test]
    fn test_zero_container_width_is_rejected_at_open() {
        let config = EditorConfig {
            max_container_width: 0.0,
            ..Default::default()
        };
        assert!(MarkupSession::open("a.pdf", create_test_pdf(1, 600, 800), config).is_err());
    }
}
