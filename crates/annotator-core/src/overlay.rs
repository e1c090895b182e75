//! Overlay projection for the page currently on screen
//!
//! Turns the store (plus any gesture in progress) into positioned shapes the
//! page view draws on top of the rendered PDF. This is a read-only
//! projection; shapes carry the annotation id so the view can wire up delete
//! buttons.

use crate::config::EditorConfig;
use crate::geometry::Point;
use crate::interaction::Interaction;
use crate::model::{AnnotationId, AnnotationStore, Mark, Signature};
use crate::viewport::Viewport;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum OverlayShape {
    /// Translucent filled band
    Highlight {
        id: Option<AnnotationId>,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: String,
        opacity: f64,
    },
    /// Thin bar sitting on the text baseline
    Underline {
        id: Option<AnnotationId>,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: String,
        opacity: f64,
    },
    /// Small callout with text and a delete button
    Callout {
        id: Option<AnnotationId>,
        x: f64,
        y: f64,
        text: String,
    },
    Polyline {
        id: Option<AnnotationId>,
        points: Vec<Point>,
        color: String,
        thickness: f64,
    },
    /// Signature image with a delete button
    Image {
        id: AnnotationId,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        src: String,
    },
}

impl OverlayShape {
    pub fn id(&self) -> Option<AnnotationId> {
        match self {
            OverlayShape::Highlight { id, .. }
            | OverlayShape::Underline { id, .. }
            | OverlayShape::Callout { id, .. }
            | OverlayShape::Polyline { id, .. } => *id,
            OverlayShape::Image { id, .. } => Some(*id),
        }
    }

    /// Whether the shape belongs to a gesture that has not been committed
    pub fn is_pending(&self) -> bool {
        self.id().is_none()
    }
}

fn mark_shape(
    id: Option<AnnotationId>,
    mark: &Mark,
    zoom: f64,
    config: &EditorConfig,
) -> OverlayShape {
    match mark {
        Mark::Highlight {
            color,
            position,
            width,
            height,
        } => OverlayShape::Highlight {
            id,
            x: position.x * zoom,
            y: position.y * zoom,
            width: width * zoom,
            height: height * zoom,
            color: color
                .clone()
                .unwrap_or_else(|| config.default_highlight_color.clone()),
            opacity: config.highlight_opacity,
        },
        Mark::Underline {
            color,
            position,
            width,
            height,
        } => OverlayShape::Underline {
            id,
            x: position.x * zoom,
            y: position.y * zoom,
            width: width * zoom,
            height: height * zoom,
            color: color
                .clone()
                .unwrap_or_else(|| config.default_underline_color.clone()),
            opacity: config.underline_opacity,
        },
        Mark::Comment { text, position } => OverlayShape::Callout {
            id,
            x: position.x * zoom,
            y: position.y * zoom,
            text: text.clone(),
        },
        Mark::Freehand { color, positions } => OverlayShape::Polyline {
            id,
            points: positions
                .iter()
                .map(|p| Point::new(p.x * zoom, p.y * zoom))
                .collect(),
            color: color
                .clone()
                .unwrap_or_else(|| config.default_freehand_color.clone()),
            thickness: config.freehand_thickness * zoom,
        },
    }
}

fn signature_shape(sig: &Signature, zoom: f64) -> OverlayShape {
    OverlayShape::Image {
        id: sig.id,
        x: sig.position.x * zoom,
        y: sig.position.y * zoom,
        width: sig.width * zoom,
        height: sig.height * zoom,
        src: sig.image_data.clone(),
    }
}

/// Shapes for the current page: committed annotations in creation order,
/// then signatures, then the gesture in progress (if any)
pub fn project_overlay(
    store: &AnnotationStore,
    interaction: &Interaction,
    viewport: &Viewport,
    config: &EditorConfig,
) -> Vec<OverlayShape> {
    let page = viewport.current_page();
    let zoom = viewport.zoom();

    let mut shapes: Vec<OverlayShape> = store
        .annotations_on_page(page)
        .map(|a| mark_shape(Some(a.id), &a.mark, zoom, config))
        .collect();
    shapes.extend(store.signatures_on_page(page).map(|s| signature_shape(s, zoom)));

    if let Some(pending) = interaction.pending_mark() {
        shapes.push(mark_shape(None, &pending, zoom, config));
    }

    shapes
}
