//! WASM bindings for the PDF annotator
//!
//! All document and markup state is held in Rust by [`AnnotatorSession`].
//! JavaScript renders pages, forwards pointer/touch events in unscaled
//! container coordinates and draws the overlay shapes it gets back.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { AnnotatorSession } from './pkg/annotator_wasm.js';
//!
//! await init();
//!
//! const session = new AnnotatorSession();
//! session.checkSelection([...files].map(f => ({ name: f.name, type: f.type })));
//! session.loadDocument(file.name, file.type, bytes);
//! viewer.src = session.documentUrl;
//!
//! session.selectTool("highlight");
//! session.pointerDown(x, y);
//! session.pointerMove(x2, y2);
//! session.pointerUp();
//! drawOverlay(session.overlay());
//!
//! const pdf = session.exportDocument();
//! download(pdf, session.exportFileName);
//! ```

pub mod object_url;
pub mod session;

use wasm_bindgen::prelude::*;

pub use session::{AnnotatorSession, DocumentInfo, GestureStatus};

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Get the library version
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Native PDF coordinates for a point captured in an unscaled container,
/// returned as `[x, y]`
#[wasm_bindgen(js_name = toPdfCoords)]
pub fn to_pdf_coords(
    x: f64,
    y: f64,
    page_width: f64,
    page_height: f64,
    container_width: f64,
) -> Result<Vec<f64>, JsValue> {
    let transform = annotator_core::Transform::new(page_width, page_height, container_width)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    let p = transform.point(annotator_core::Point::new(x, y));
    Ok(vec![p.x, p.y])
}
