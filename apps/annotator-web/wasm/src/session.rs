//! Stateful annotator session exposed to JavaScript
//!
//! JavaScript forwards DOM events and renders what it gets back; the
//! document, markup and tool state live here.

use crate::object_url::ObjectUrl;
use annotator_core::{
    validate_selection, AnnotationId, CaptureOutcome, EditorConfig, ExportReport, FileCandidate,
    IgnoreReason, MarkupSession, OverlayShape, Point, PointerInput, Tool,
};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

/// File metadata as reported by the browser's `File` object
#[derive(Debug, Deserialize)]
struct FileMeta {
    name: String,
    #[serde(rename = "type", default)]
    mime: String,
}

/// Summary returned after a document loads
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub name: String,
    pub page_count: u32,
    pub size_bytes: usize,
}

/// Result of one pointer or touch event
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GestureStatus {
    pub status: &'static str,
    pub id: Option<String>,
    pub reason: Option<IgnoreReason>,
}

impl From<CaptureOutcome> for GestureStatus {
    fn from(outcome: CaptureOutcome) -> Self {
        let (status, id, reason) = match outcome {
            CaptureOutcome::Started => ("started", None, None),
            CaptureOutcome::Updated => ("updated", None, None),
            CaptureOutcome::Committed(id) => ("committed", Some(id.to_string()), None),
            CaptureOutcome::Ignored(reason) => ("ignored", None, Some(reason)),
        };
        Self { status, id, reason }
    }
}

/// Touch coordinates arrive flattened as `[x0, y0, x1, y1, ...]`
fn touch_points(coords: &[f64]) -> PointerInput {
    PointerInput::Touch(
        coords
            .chunks_exact(2)
            .map(|xy| Point::new(xy[0], xy[1]))
            .collect(),
    )
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

#[wasm_bindgen]
pub struct AnnotatorSession {
    config: EditorConfig,
    document: Option<MarkupSession>,
    document_url: Option<ObjectUrl>,
    last_export: Option<(String, ExportReport)>,
}

impl Default for AnnotatorSession {
    fn default() -> Self {
        Self::with_editor_config(EditorConfig::default())
    }
}

impl AnnotatorSession {
    fn with_editor_config(config: EditorConfig) -> Self {
        Self {
            config,
            document: None,
            document_url: None,
            last_export: None,
        }
    }

    fn document_mut(&mut self) -> Result<&mut MarkupSession, String> {
        self.document
            .as_mut()
            .ok_or_else(|| "No document loaded".to_string())
    }

    fn check_selection_internal(&self, files: &[FileCandidate]) -> Result<(), String> {
        validate_selection(files)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    /// Validate and open a document without touching the current one
    fn open_document_internal(
        &self,
        name: &str,
        mime: &str,
        bytes: Vec<u8>,
    ) -> Result<(MarkupSession, DocumentInfo), String> {
        let candidate = FileCandidate::new(name, mime);
        validate_selection(std::slice::from_ref(&candidate)).map_err(|e| e.to_string())?;

        let size_bytes = bytes.len();
        let session =
            MarkupSession::open(name, bytes, self.config.clone()).map_err(|e| e.to_string())?;
        let info = DocumentInfo {
            name: session.name().to_string(),
            page_count: session.page_count(),
            size_bytes,
        };
        Ok((session, info))
    }

    /// Swap in an opened document. The previous URL is revoked on drop.
    fn install_document(&mut self, session: MarkupSession, url: Option<ObjectUrl>) {
        self.document_url = url;
        self.last_export = None;
        self.document = Some(session);
    }

    fn close_internal(&mut self) {
        self.document = None;
        self.document_url = None;
        self.last_export = None;
    }

    fn select_tool_internal(&mut self, name: &str) -> Result<String, String> {
        let tool = Tool::from_name(name);
        let armed = self.document_mut()?.select_tool(tool);
        Ok(armed.map(Tool::name).unwrap_or("none").to_string())
    }

    fn pointer_down_internal(&mut self, input: &PointerInput) -> Result<GestureStatus, String> {
        Ok(self.document_mut()?.pointer_down(input).into())
    }

    fn pointer_move_internal(&mut self, input: &PointerInput) -> Result<GestureStatus, String> {
        Ok(self.document_mut()?.pointer_move(input).into())
    }

    fn pointer_up_internal(&mut self) -> Result<GestureStatus, String> {
        Ok(self.document_mut()?.pointer_up().into())
    }

    fn import_signature_internal(&mut self, data_uri: &str) -> Result<String, String> {
        let id = self
            .document_mut()?
            .import_signature(data_uri.to_string())
            .map_err(|e| e.to_string())?;
        Ok(id.to_string())
    }

    fn remove_internal(&mut self, id: &str) -> bool {
        let Ok(id) = id.parse::<AnnotationId>() else {
            return false;
        };
        self.document
            .as_mut()
            .map(|doc| doc.remove(id))
            .unwrap_or(false)
    }

    fn overlay_internal(&self) -> Vec<OverlayShape> {
        self.document
            .as_ref()
            .map(MarkupSession::overlay)
            .unwrap_or_default()
    }

    fn export_internal(&mut self) -> Result<Vec<u8>, String> {
        let doc = self
            .document
            .as_ref()
            .ok_or_else(|| "No document loaded".to_string())?;
        let output = doc.export().map_err(|e| e.to_string())?;
        self.last_export = Some((output.file_name, output.report));
        Ok(output.bytes)
    }
}

#[wasm_bindgen]
impl AnnotatorSession {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with settings from a JSON object string
    #[wasm_bindgen(js_name = withConfig)]
    pub fn with_config(json: &str) -> Result<AnnotatorSession, JsValue> {
        let config = EditorConfig::from_json(json).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(Self::with_editor_config(config))
    }

    /// Check a drop/pick selection (array of `{name, type}`) before reading it
    #[wasm_bindgen(js_name = checkSelection)]
    pub fn check_selection(&self, files: JsValue) -> Result<(), JsValue> {
        let files: Vec<FileMeta> = serde_wasm_bindgen::from_value(files)
            .map_err(|e| JsValue::from_str(&format!("Invalid file list: {}", e)))?;
        let candidates: Vec<FileCandidate> = files
            .into_iter()
            .map(|f| FileCandidate::new(f.name, f.mime))
            .collect();
        self.check_selection_internal(&candidates)
            .map_err(|e| JsValue::from_str(&e))
    }

    /// Load a document, discarding all markup on the previous one. Nothing
    /// changes unless the document opens and its URL is created.
    #[wasm_bindgen(js_name = loadDocument)]
    pub fn load_document(&mut self, name: &str, mime: &str, bytes: &[u8]) -> Result<JsValue, JsValue> {
        let (session, info) = self
            .open_document_internal(name, mime, bytes.to_vec())
            .map_err(|e| JsValue::from_str(&e))?;
        let url = ObjectUrl::from_bytes(bytes, "application/pdf")?;
        self.install_document(session, Some(url));

        web_sys::console::log_1(
            &format!("Loaded {} ({} pages)", info.name, info.page_count).into(),
        );
        to_js(&info)
    }

    #[wasm_bindgen(js_name = closeDocument)]
    pub fn close_document(&mut self) {
        self.close_internal();
    }

    /// Object URL for the renderer, if a document is loaded
    #[wasm_bindgen(getter, js_name = documentUrl)]
    pub fn document_url(&self) -> Option<String> {
        self.document_url.as_ref().map(|u| u.as_str().to_string())
    }

    #[wasm_bindgen(getter, js_name = hasDocument)]
    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }

    #[wasm_bindgen(getter, js_name = pageCount)]
    pub fn page_count(&self) -> u32 {
        self.document.as_ref().map(|d| d.page_count()).unwrap_or(0)
    }

    #[wasm_bindgen(getter, js_name = currentPage)]
    pub fn current_page(&self) -> u32 {
        self.document
            .as_ref()
            .map(|d| d.viewport().current_page())
            .unwrap_or(0)
    }

    #[wasm_bindgen(getter)]
    pub fn zoom(&self) -> f64 {
        self.document
            .as_ref()
            .map(|d| d.viewport().zoom())
            .unwrap_or(1.0)
    }

    #[wasm_bindgen(getter, js_name = containerWidth)]
    pub fn container_width(&self) -> f64 {
        self.document
            .as_ref()
            .map(|d| d.viewport().container_width())
            .unwrap_or(self.config.max_container_width)
    }

    #[wasm_bindgen(getter, js_name = activeTool)]
    pub fn active_tool(&self) -> String {
        self.document
            .as_ref()
            .and_then(|d| d.interaction().armed_tool())
            .map(Tool::name)
            .unwrap_or("none")
            .to_string()
    }

    #[wasm_bindgen(js_name = setPage)]
    pub fn set_page(&mut self, page: u32) -> Result<u32, JsValue> {
        Ok(self.document_mut().map_err(|e| JsValue::from_str(&e))?.set_page(page))
    }

    #[wasm_bindgen(js_name = nextPage)]
    pub fn next_page(&mut self) -> Result<u32, JsValue> {
        Ok(self.document_mut().map_err(|e| JsValue::from_str(&e))?.next_page())
    }

    #[wasm_bindgen(js_name = previousPage)]
    pub fn previous_page(&mut self) -> Result<u32, JsValue> {
        Ok(self.document_mut().map_err(|e| JsValue::from_str(&e))?.previous_page())
    }

    #[wasm_bindgen(js_name = setZoom)]
    pub fn set_zoom(&mut self, zoom: f64) -> Result<f64, JsValue> {
        Ok(self.document_mut().map_err(|e| JsValue::from_str(&e))?.set_zoom(zoom))
    }

    #[wasm_bindgen(js_name = zoomIn)]
    pub fn zoom_in(&mut self) -> Result<f64, JsValue> {
        Ok(self.document_mut().map_err(|e| JsValue::from_str(&e))?.zoom_in())
    }

    #[wasm_bindgen(js_name = zoomOut)]
    pub fn zoom_out(&mut self) -> Result<f64, JsValue> {
        Ok(self.document_mut().map_err(|e| JsValue::from_str(&e))?.zoom_out())
    }

    /// Report the width available for the page; returns the container width used
    #[wasm_bindgen(js_name = setAvailableWidth)]
    pub fn set_available_width(&mut self, width: f64) -> Result<f64, JsValue> {
        Ok(self
            .document_mut()
            .map_err(|e| JsValue::from_str(&e))?
            .set_available_width(width))
    }

    #[wasm_bindgen(js_name = setContainerHeight)]
    pub fn set_container_height(&mut self, height: f64) -> Result<(), JsValue> {
        self.document_mut()
            .map_err(|e| JsValue::from_str(&e))?
            .set_container_height(height);
        Ok(())
    }

    /// Toggle a tool by name; unknown names and "none" disarm.
    /// Returns the tool now armed.
    #[wasm_bindgen(js_name = selectTool)]
    pub fn select_tool(&mut self, name: &str) -> Result<String, JsValue> {
        self.select_tool_internal(name)
            .map_err(|e| JsValue::from_str(&e))
    }

    #[wasm_bindgen(js_name = setCommentText)]
    pub fn set_comment_text(&mut self, text: &str) -> Result<(), JsValue> {
        self.document_mut()
            .map_err(|e| JsValue::from_str(&e))?
            .set_comment_text(text);
        Ok(())
    }

    #[wasm_bindgen(js_name = setColor)]
    pub fn set_color(&mut self, color: Option<String>) -> Result<(), JsValue> {
        self.document_mut()
            .map_err(|e| JsValue::from_str(&e))?
            .set_color(color);
        Ok(())
    }

    #[wasm_bindgen(js_name = pointerDown)]
    pub fn pointer_down(&mut self, x: f64, y: f64) -> Result<JsValue, JsValue> {
        let status = self
            .pointer_down_internal(&PointerInput::Pointer(Point::new(x, y)))
            .map_err(|e| JsValue::from_str(&e))?;
        to_js(&status)
    }

    #[wasm_bindgen(js_name = pointerMove)]
    pub fn pointer_move(&mut self, x: f64, y: f64) -> Result<JsValue, JsValue> {
        let status = self
            .pointer_move_internal(&PointerInput::Pointer(Point::new(x, y)))
            .map_err(|e| JsValue::from_str(&e))?;
        to_js(&status)
    }

    #[wasm_bindgen(js_name = pointerUp)]
    pub fn pointer_up(&mut self) -> Result<JsValue, JsValue> {
        let status = self.pointer_up_internal().map_err(|e| JsValue::from_str(&e))?;
        to_js(&status)
    }

    #[wasm_bindgen(js_name = touchStart)]
    pub fn touch_start(&mut self, coords: &[f64]) -> Result<JsValue, JsValue> {
        let status = self
            .pointer_down_internal(&touch_points(coords))
            .map_err(|e| JsValue::from_str(&e))?;
        to_js(&status)
    }

    #[wasm_bindgen(js_name = touchMove)]
    pub fn touch_move(&mut self, coords: &[f64]) -> Result<JsValue, JsValue> {
        let status = self
            .pointer_move_internal(&touch_points(coords))
            .map_err(|e| JsValue::from_str(&e))?;
        to_js(&status)
    }

    #[wasm_bindgen(js_name = touchEnd)]
    pub fn touch_end(&mut self) -> Result<JsValue, JsValue> {
        self.pointer_up()
    }

    /// Place a signature image (data URI) at the centre of the view
    #[wasm_bindgen(js_name = importSignature)]
    pub fn import_signature(&mut self, data_uri: &str) -> Result<String, JsValue> {
        self.import_signature_internal(data_uri)
            .map_err(|e| JsValue::from_str(&e))
    }

    /// Delete an annotation or signature; unknown ids are ignored
    pub fn remove(&mut self, id: &str) -> bool {
        self.remove_internal(id)
    }

    /// Shapes to draw over the current page
    pub fn overlay(&self) -> Result<JsValue, JsValue> {
        to_js(&self.overlay_internal())
    }

    /// Flatten all markup into a new PDF
    #[wasm_bindgen(js_name = exportDocument)]
    pub fn export_document(&mut self) -> Result<js_sys::Uint8Array, JsValue> {
        let bytes = self.export_internal().map_err(|e| {
            web_sys::console::error_1(&format!("Export failed: {}", e).into());
            JsValue::from_str(&e)
        })?;

        if let Some((_, report)) = &self.last_export {
            for item in &report.skipped {
                web_sys::console::warn_1(
                    &format!("Skipped {} {}: {}", item.kind, item.id, item.reason).into(),
                );
            }
        }
        Ok(js_sys::Uint8Array::from(bytes.as_slice()))
    }

    /// Download name for the last export
    #[wasm_bindgen(getter, js_name = exportFileName)]
    pub fn export_file_name(&self) -> Option<String> {
        self.last_export.as_ref().map(|(name, _)| name.clone())
    }

    /// Counts and skipped items of the last export
    #[wasm_bindgen(js_name = exportReport)]
    pub fn export_report(&self) -> Result<JsValue, JsValue> {
        match &self.last_export {
            Some((_, report)) => to_js(report),
            None => Ok(JsValue::NULL),
        }
    }
}
