//! Document markup and flattening
//!
//! This crate holds everything behind the annotator's page view: the
//! annotation model, pointer gesture capture, the overlay projection and the
//! export pipeline that draws markup permanently into the PDF using lopdf.
//!
//! Screen coordinates are captured relative to the unscaled page container
//! (origin top-left, Y down). Export maps them into native page space
//! (origin bottom-left, Y up) with a single scale factor:
//! - `scale = native page width / container width`
//! - `(x, y) -> (x * scale, page_height - y * scale)`

pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod image;
pub mod input;
pub mod interaction;
pub mod model;
pub mod overlay;
pub mod session;
pub mod viewport;

#[cfg(test)]
mod fixtures;

pub use config::EditorConfig;
pub use error::AnnotatorError;
pub use export::{export_document, ExportOutput, ExportReport, LopdfCanvas, MarkupCanvas};
pub use geometry::{to_target_coords, Point, Transform};
pub use input::{validate_pdf_bytes, validate_selection, FileCandidate, RejectReason};
pub use interaction::{CaptureOutcome, IgnoreReason, PointerInput, Tool};
pub use model::{Annotation, AnnotationId, AnnotationStore, Mark, MarkupSnapshot, Signature};
pub use overlay::OverlayShape;
pub use session::MarkupSession;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_deserializes_with_type_tag() {
        let json = r#"{"type":"comment","text":"Hi","position":{"x":1.0,"y":2.0}}"#;
        let mark: Mark = serde_json::from_str(json).unwrap();
        assert!(matches!(mark, Mark::Comment { .. }));
    }
}
