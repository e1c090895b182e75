//! Tool selection and pointer gesture capture
//!
//! Pointer and touch events are folded into one [`PointerInput`]. A press
//! with a drawing tool armed starts a capture, moves extend it, and a
//! release commits it into the [`AnnotationStore`]. Only one tool is armed
//! at a time.

use crate::config::EditorConfig;
use crate::geometry::Point;
use crate::model::{AnnotationId, AnnotationStore, Mark};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Highlight,
    Underline,
    Comment,
    Freehand,
    Signature,
}

impl Tool {
    /// Parse a toolbar name. `"none"` and unknown names map to `None`.
    pub fn from_name(name: &str) -> Option<Tool> {
        match name.trim().to_lowercase().as_str() {
            "highlight" => Some(Tool::Highlight),
            "underline" => Some(Tool::Underline),
            "comment" => Some(Tool::Comment),
            "freehand" | "draw" => Some(Tool::Freehand),
            "signature" => Some(Tool::Signature),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Tool::Highlight => "highlight",
            Tool::Underline => "underline",
            Tool::Comment => "comment",
            Tool::Freehand => "freehand",
            Tool::Signature => "signature",
        }
    }
}

/// Partial geometry of a gesture in progress
#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    /// Drag rectangle; `start` stays fixed, `end` follows the pointer
    Selection { start: Point, end: Point },
    /// Freehand path in temporal order
    Path(Vec<Point>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    ToolArmed(Tool),
    Capturing { tool: Tool, gesture: Gesture },
}

impl InteractionState {
    pub fn tool(&self) -> Option<Tool> {
        match self {
            InteractionState::Idle => None,
            InteractionState::ToolArmed(tool) => Some(*tool),
            InteractionState::Capturing { tool, .. } => Some(*tool),
        }
    }
}

/// A pointer or touch sample in unscaled container coordinates
#[derive(Debug, Clone, PartialEq)]
pub enum PointerInput {
    Pointer(Point),
    /// Active touch points; only the first one is read
    Touch(Vec<Point>),
}

impl PointerInput {
    pub fn point(&self) -> Option<Point> {
        match self {
            PointerInput::Pointer(p) => Some(*p),
            PointerInput::Touch(touches) => touches.first().copied(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    NoToolArmed,
    EmptyComment,
    SinglePointPath,
    NoPointer,
    NotCapturing,
    /// The store refused the finished mark
    Rejected,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Started,
    Updated,
    Committed(AnnotationId),
    /// The gesture was dropped without touching the store
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone)]
pub struct Interaction {
    state: InteractionState,
    comment_text: String,
    color: Option<String>,
    highlight_height: f64,
    underline_height: f64,
}

impl Interaction {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            state: InteractionState::Idle,
            comment_text: String::new(),
            color: None,
            highlight_height: config.highlight_height,
            underline_height: config.underline_height,
        }
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn armed_tool(&self) -> Option<Tool> {
        self.state.tool()
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self.state, InteractionState::Capturing { .. })
    }

    /// Toggle `tool`: re-selecting the armed tool disarms it, anything else
    /// replaces whatever was armed. Returns the tool now armed.
    pub fn select_tool(&mut self, tool: Tool) -> Option<Tool> {
        self.state = if self.state.tool() == Some(tool) {
            InteractionState::Idle
        } else {
            InteractionState::ToolArmed(tool)
        };
        self.state.tool()
    }

    pub fn disarm(&mut self) {
        self.state = InteractionState::Idle;
    }

    /// Drop an in-progress gesture, keeping its tool armed
    pub fn cancel_gesture(&mut self) -> bool {
        match self.state {
            InteractionState::Capturing { tool, .. } => {
                self.state = InteractionState::ToolArmed(tool);
                true
            }
            _ => false,
        }
    }

    pub fn comment_text(&self) -> &str {
        &self.comment_text
    }

    pub fn set_comment_text(&mut self, text: &str) {
        self.comment_text = text.to_string();
    }

    /// Colour given to subsequent highlight, underline and freehand marks
    pub fn set_color(&mut self, color: Option<String>) {
        self.color = color.filter(|c| !c.trim().is_empty());
    }

    /// Close the signature placement panel if it is open
    pub fn close_signature_placement(&mut self) {
        if self.state.tool() == Some(Tool::Signature) {
            self.state = InteractionState::Idle;
        }
    }

    pub fn press(
        &mut self,
        input: &PointerInput,
        page: u32,
        store: &mut AnnotationStore,
    ) -> CaptureOutcome {
        let Some(point) = input.point() else {
            return CaptureOutcome::Ignored(IgnoreReason::NoPointer);
        };

        let tool = match self.state.tool() {
            Some(tool) if tool != Tool::Signature => tool,
            _ => return CaptureOutcome::Ignored(IgnoreReason::NoToolArmed),
        };

        match tool {
            Tool::Comment => self.commit_comment(point, page, store),
            Tool::Freehand => {
                self.state = InteractionState::Capturing {
                    tool,
                    gesture: Gesture::Path(vec![point]),
                };
                CaptureOutcome::Started
            }
            Tool::Highlight | Tool::Underline => {
                self.state = InteractionState::Capturing {
                    tool,
                    gesture: Gesture::Selection {
                        start: point,
                        end: point,
                    },
                };
                CaptureOutcome::Started
            }
            Tool::Signature => CaptureOutcome::Ignored(IgnoreReason::NoToolArmed),
        }
    }

    pub fn move_to(&mut self, input: &PointerInput) -> CaptureOutcome {
        let Some(point) = input.point() else {
            return CaptureOutcome::Ignored(IgnoreReason::NoPointer);
        };

        match &mut self.state {
            InteractionState::Capturing {
                gesture: Gesture::Path(path),
                ..
            } => {
                path.push(point);
                CaptureOutcome::Updated
            }
            InteractionState::Capturing {
                gesture: Gesture::Selection { end, .. },
                ..
            } => {
                *end = point;
                CaptureOutcome::Updated
            }
            _ => CaptureOutcome::Ignored(IgnoreReason::NotCapturing),
        }
    }

    /// Finish the current gesture. The tool stays armed for the next one.
    pub fn release(&mut self, page: u32, store: &mut AnnotationStore) -> CaptureOutcome {
        let (tool, gesture) = match std::mem::take(&mut self.state) {
            InteractionState::Capturing { tool, gesture } => (tool, gesture),
            other => {
                self.state = other;
                return CaptureOutcome::Ignored(IgnoreReason::NotCapturing);
            }
        };
        self.state = InteractionState::ToolArmed(tool);

        let Some(mark) = self.build_mark(tool, &gesture) else {
            debug!(tool = tool.name(), "Discarding gesture without drag");
            return CaptureOutcome::Ignored(IgnoreReason::SinglePointPath);
        };

        match store.add(page, mark) {
            Ok(id) => CaptureOutcome::Committed(id),
            Err(e) => {
                debug!(tool = tool.name(), error = %e, "Gesture not committed");
                CaptureOutcome::Ignored(IgnoreReason::Rejected)
            }
        }
    }

    /// The mark the current gesture would commit, for live feedback
    pub fn pending_mark(&self) -> Option<Mark> {
        match &self.state {
            InteractionState::Capturing { tool, gesture } => match (tool, gesture) {
                (Tool::Freehand, Gesture::Path(path)) => Some(Mark::Freehand {
                    color: self.color.clone(),
                    positions: path.clone(),
                }),
                _ => self.build_mark(*tool, gesture),
            },
            _ => None,
        }
    }

    fn build_mark(&self, tool: Tool, gesture: &Gesture) -> Option<Mark> {
        match (tool, gesture) {
            (Tool::Freehand, Gesture::Path(path)) if path.len() > 1 => Some(Mark::Freehand {
                color: self.color.clone(),
                positions: path.clone(),
            }),
            (Tool::Highlight, Gesture::Selection { start, end }) => Some(Mark::Highlight {
                color: self.color.clone(),
                position: start.min(*end),
                width: (end.x - start.x).abs(),
                height: self.highlight_height,
            }),
            (Tool::Underline, Gesture::Selection { start, end }) => Some(Mark::Underline {
                color: self.color.clone(),
                position: start.min(*end),
                width: (end.x - start.x).abs(),
                height: self.underline_height,
            }),
            _ => None,
        }
    }

    fn commit_comment(
        &mut self,
        point: Point,
        page: u32,
        store: &mut AnnotationStore,
    ) -> CaptureOutcome {
        let text = self.comment_text.trim().to_string();
        self.comment_text.clear();
        self.state = InteractionState::Idle;

        if text.is_empty() {
            return CaptureOutcome::Ignored(IgnoreReason::EmptyComment);
        }

        match store.add(
            page,
            Mark::Comment {
                text,
                position: point,
            },
        ) {
            Ok(id) => CaptureOutcome::Committed(id),
            Err(e) => {
                debug!(error = %e, "Comment not committed");
                CaptureOutcome::Ignored(IgnoreReason::Rejected)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn setup() -> (Interaction, AnnotationStore) {
        (
            Interaction::new(&EditorConfig::default()),
            AnnotationStore::new(),
        )
    }

    fn at(x: f64, y: f64) -> PointerInput {
        PointerInput::Pointer(Point::new(x, y))
    }

    #[test]
    fn test_select_same_tool_toggles_off() {
        let (mut ui, _) = setup();
        assert_eq!(ui.select_tool(Tool::Highlight), Some(Tool::Highlight));
        assert_eq!(ui.select_tool(Tool::Highlight), None);
        assert_eq!(ui.state(), &InteractionState::Idle);
    }

    #[test]
    fn test_select_other_tool_replaces() {
        let (mut ui, _) = setup();
        ui.select_tool(Tool::Highlight);
        assert_eq!(ui.select_tool(Tool::Freehand), Some(Tool::Freehand));
        assert_eq!(ui.armed_tool(), Some(Tool::Freehand));
    }

    #[test]
    fn test_tool_names() {
        assert_eq!(Tool::from_name("Highlight"), Some(Tool::Highlight));
        assert_eq!(Tool::from_name("none"), None);
        assert_eq!(Tool::from_name("bogus"), None);
        assert_eq!(Tool::Freehand.name(), "freehand");
    }

    #[test]
    fn test_press_without_tool_is_ignored() {
        let (mut ui, mut store) = setup();
        let outcome = ui.press(&at(1.0, 1.0), 1, &mut store);
        assert_eq!(outcome, CaptureOutcome::Ignored(IgnoreReason::NoToolArmed));
        assert!(store.is_empty());
    }

    #[test]
    fn test_highlight_drag_commits_normalized_rect() {
        let (mut ui, mut store) = setup();
        ui.select_tool(Tool::Highlight);
        assert_eq!(ui.press(&at(150.0, 130.0), 2, &mut store), CaptureOutcome::Started);
        assert_eq!(ui.move_to(&at(120.0, 110.0)), CaptureOutcome::Updated);
        assert_eq!(ui.move_to(&at(100.0, 100.0)), CaptureOutcome::Updated);
        assert!(matches!(ui.release(2, &mut store), CaptureOutcome::Committed(_)));

        let annotation = &store.annotations()[0];
        assert_eq!(annotation.page, 2);
        assert_eq!(
            annotation.mark,
            Mark::Highlight {
                color: None,
                position: Point::new(100.0, 100.0),
                width: 50.0,
                height: 20.0,
            }
        );
        // Tool stays armed for repeated use
        assert_eq!(ui.state(), &InteractionState::ToolArmed(Tool::Highlight));
    }

    #[test]
    fn test_underline_uses_thin_height() {
        let (mut ui, mut store) = setup();
        ui.select_tool(Tool::Underline);
        ui.set_color(Some("#00FF00".to_string()));
        ui.press(&at(10.0, 50.0), 1, &mut store);
        ui.move_to(&at(90.0, 52.0));
        ui.release(1, &mut store);

        match &store.annotations()[0].mark {
            Mark::Underline {
                color,
                width,
                height,
                position,
            } => {
                assert_eq!(color.as_deref(), Some("#00FF00"));
                assert_eq!(*width, 80.0);
                assert_eq!(*height, 2.0);
                assert_eq!(*position, Point::new(10.0, 50.0));
            }
            other => panic!("Expected underline, got {:?}", other),
        }
    }

    #[test]
    fn test_freehand_click_without_drag_commits_nothing() {
        let (mut ui, mut store) = setup();
        ui.select_tool(Tool::Freehand);
        ui.press(&at(5.0, 5.0), 1, &mut store);
        let outcome = ui.release(1, &mut store);
        assert_eq!(outcome, CaptureOutcome::Ignored(IgnoreReason::SinglePointPath));
        assert!(store.is_empty());
        assert_eq!(ui.state(), &InteractionState::ToolArmed(Tool::Freehand));
    }

    #[test]
    fn test_freehand_records_every_move() {
        let (mut ui, mut store) = setup();
        ui.select_tool(Tool::Freehand);
        ui.press(&at(0.0, 0.0), 1, &mut store);
        ui.move_to(&at(0.0, 0.0));
        ui.move_to(&at(1.0, 1.0));
        ui.release(1, &mut store);

        match &store.annotations()[0].mark {
            Mark::Freehand { positions, .. } => assert_eq!(
                positions,
                &vec![Point::new(0.0, 0.0), Point::new(0.0, 0.0), Point::new(1.0, 1.0)]
            ),
            other => panic!("Expected freehand, got {:?}", other),
        }
    }

    #[test]
    fn test_comment_with_empty_text_disarms() {
        let (mut ui, mut store) = setup();
        ui.set_comment_text("");
        ui.select_tool(Tool::Comment);
        let outcome = ui.press(&at(40.0, 40.0), 1, &mut store);
        assert_eq!(outcome, CaptureOutcome::Ignored(IgnoreReason::EmptyComment));
        assert!(store.is_empty());
        assert_eq!(ui.state(), &InteractionState::Idle);
    }

    #[test]
    fn test_comment_commits_on_press_and_clears_text() {
        let (mut ui, mut store) = setup();
        ui.set_comment_text("  Needs a citation ");
        ui.select_tool(Tool::Comment);
        assert!(matches!(
            ui.press(&at(40.0, 60.0), 3, &mut store),
            CaptureOutcome::Committed(_)
        ));

        assert_eq!(
            store.annotations()[0].mark,
            Mark::Comment {
                text: "Needs a citation".to_string(),
                position: Point::new(40.0, 60.0),
            }
        );
        assert_eq!(ui.comment_text(), "");
        assert_eq!(ui.state(), &InteractionState::Idle);
    }

    #[test]
    fn test_touch_uses_first_point() {
        let (mut ui, mut store) = setup();
        ui.select_tool(Tool::Freehand);
        ui.press(
            &PointerInput::Touch(vec![Point::new(1.0, 2.0), Point::new(50.0, 50.0)]),
            1,
            &mut store,
        );
        ui.move_to(&PointerInput::Touch(vec![Point::new(3.0, 4.0)]));
        ui.release(1, &mut store);

        match &store.annotations()[0].mark {
            Mark::Freehand { positions, .. } => {
                assert_eq!(positions, &vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)])
            }
            other => panic!("Expected freehand, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_touch_list_is_ignored() {
        let (mut ui, mut store) = setup();
        ui.select_tool(Tool::Freehand);
        let outcome = ui.press(&PointerInput::Touch(vec![]), 1, &mut store);
        assert_eq!(outcome, CaptureOutcome::Ignored(IgnoreReason::NoPointer));
        assert!(!ui.is_capturing());
    }

    #[test]
    fn test_move_and_release_without_capture() {
        let (mut ui, mut store) = setup();
        ui.select_tool(Tool::Highlight);
        assert_eq!(
            ui.move_to(&at(1.0, 1.0)),
            CaptureOutcome::Ignored(IgnoreReason::NotCapturing)
        );
        assert_eq!(
            ui.release(1, &mut store),
            CaptureOutcome::Ignored(IgnoreReason::NotCapturing)
        );
        assert_eq!(ui.state(), &InteractionState::ToolArmed(Tool::Highlight));
    }

    #[test]
    fn test_signature_tool_does_not_capture() {
        let (mut ui, mut store) = setup();
        ui.select_tool(Tool::Signature);
        assert_eq!(
            ui.press(&at(1.0, 1.0), 1, &mut store),
            CaptureOutcome::Ignored(IgnoreReason::NoToolArmed)
        );
        ui.close_signature_placement();
        assert_eq!(ui.state(), &InteractionState::Idle);
    }

    #[test]
    fn test_pending_mark_tracks_capture() {
        let (mut ui, mut store) = setup();
        ui.select_tool(Tool::Freehand);
        assert_eq!(ui.pending_mark(), None);
        ui.press(&at(1.0, 1.0), 1, &mut store);
        // A single-point path is still shown while drawing
        assert!(matches!(ui.pending_mark(), Some(Mark::Freehand { .. })));
        ui.release(1, &mut store);
        assert_eq!(ui.pending_mark(), None);
    }

    #[test]
    fn test_refused_marks_report_rejection() {
        let (mut ui, mut store) = setup();
        ui.set_comment_text("Orphan");
        ui.select_tool(Tool::Comment);
        assert_eq!(
            ui.press(&at(1.0, 1.0), 0, &mut store),
            CaptureOutcome::Ignored(IgnoreReason::Rejected)
        );

        ui.select_tool(Tool::Highlight);
        ui.press(&at(1.0, 1.0), 0, &mut store);
        ui.move_to(&at(30.0, 1.0));
        assert_eq!(
            ui.release(0, &mut store),
            CaptureOutcome::Ignored(IgnoreReason::Rejected)
        );
        assert!(store.is_empty());
    }
}
