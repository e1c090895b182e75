//! Flatten markup into PDF page content
//!
//! Export runs in two steps. [`plan_export`] turns a [`MarkupSnapshot`] into
//! an ordered list of native drawing operations per annotation; it is pure
//! and deterministic. [`apply_plan`] then replays those operations against a
//! [`MarkupCanvas`]. [`LopdfCanvas`] is the canvas that writes them into the
//! page content streams of a `lopdf` document, so the marks become part of
//! the page rather than annotations a viewer could hide or edit.
//!
//! A failure on one item is logged and the item skipped. Only loading the
//! source, an unusable scale and writing the output abort the export.

use crate::config::EditorConfig;
use crate::error::AnnotatorError;
use crate::geometry::{scale_factor, Point, Transform};
use crate::image::{decode_data_uri, RasterImage};
use crate::model::{Annotation, AnnotationId, Mark, MarkupSnapshot, Signature};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use tracing::{debug, info, warn};

/// RGB colour with components in 0-1
pub type Rgb = (f32, f32, f32);

/// Parse hex color string (e.g., "#FF0000" or "FF0000") to RGB floats (0-1 range)
pub fn parse_hex_color(color: &str) -> Option<Rgb> {
    let hex = color.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0))
}

fn resolve_color(color: Option<&str>, default: &str) -> Rgb {
    color
        .and_then(parse_hex_color)
        .or_else(|| parse_hex_color(default))
        .unwrap_or((0.0, 0.0, 0.0))
}

/// Rectangle in native page units, lower-left anchored
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NativeRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    FillRect {
        rect: NativeRect,
        color: Rgb,
        opacity: f64,
    },
    Line {
        from: Point,
        to: Point,
        thickness: f64,
        color: Rgb,
    },
    Text {
        origin: Point,
        size: f64,
        text: String,
        color: Rgb,
    },
    Image {
        rect: NativeRect,
        image: RasterImage,
    },
}

/// Native size and origin of one page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub origin: Point,
    pub width: f64,
    pub height: f64,
}

/// Drawing operations for one annotation or signature
#[derive(Debug, Clone, PartialEq)]
pub struct ItemPlan {
    pub id: AnnotationId,
    pub kind: &'static str,
    pub page: u32,
    pub ops: Vec<DrawOp>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedItem {
    pub id: AnnotationId,
    pub kind: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportPlan {
    pub items: Vec<ItemPlan>,
    pub skipped: Vec<SkippedItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportReport {
    pub annotations_drawn: usize,
    pub signatures_drawn: usize,
    pub skipped: Vec<SkippedItem>,
}

#[derive(Debug, Clone)]
pub struct ExportOutput {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub report: ExportReport,
}

fn skip(id: AnnotationId, kind: &str, error: &AnnotatorError) -> SkippedItem {
    warn!(id = %id, kind, error = %error, "Skipping item during export");
    SkippedItem {
        id,
        kind: kind.to_string(),
        reason: error.to_string(),
    }
}

fn page_transform(
    pages: &BTreeMap<u32, PageGeometry>,
    page: u32,
    scale: f64,
) -> Result<(Transform, Point), AnnotatorError> {
    let geometry = pages
        .get(&page)
        .ok_or_else(|| AnnotatorError::OperationError(format!("page {} does not exist", page)))?;
    Ok((Transform::with_scale(geometry.height, scale), geometry.origin))
}

fn offset(p: Point, origin: Point) -> Point {
    Point::new(p.x + origin.x, p.y + origin.y)
}

fn plan_annotation(
    annotation: &Annotation,
    pages: &BTreeMap<u32, PageGeometry>,
    scale: f64,
    config: &EditorConfig,
) -> Result<Vec<DrawOp>, AnnotatorError> {
    let (t, origin) = page_transform(pages, annotation.page, scale)?;

    let ops = match &annotation.mark {
        Mark::Highlight {
            color,
            position,
            width,
            height,
        } => {
            // Anchor from the lower edge because the page's Y axis points up
            let anchor = offset(t.point(Point::new(position.x, position.y + height)), origin);
            vec![DrawOp::FillRect {
                rect: NativeRect {
                    x: anchor.x,
                    y: anchor.y,
                    width: t.length(*width),
                    height: t.length(*height),
                },
                color: resolve_color(color.as_deref(), &config.default_highlight_color),
                opacity: config.highlight_opacity,
            }]
        }
        Mark::Underline {
            color,
            position,
            width,
            ..
        } => {
            let anchor = offset(t.point(*position), origin);
            vec![DrawOp::FillRect {
                rect: NativeRect {
                    x: anchor.x,
                    y: anchor.y - config.underline_offset,
                    width: t.length(*width),
                    height: config.underline_thickness,
                },
                color: resolve_color(color.as_deref(), &config.default_underline_color),
                opacity: config.underline_opacity,
            }]
        }
        Mark::Comment { text, position } => {
            let anchor = offset(t.point(*position), origin);
            let box_width = (text.chars().count() as f64 * config.comment_char_width)
                .max(config.comment_min_width);
            let box_y = anchor.y + config.comment_vertical_offset;
            let (inset_x, inset_y) = config.comment_text_inset;
            vec![
                DrawOp::FillRect {
                    rect: NativeRect {
                        x: anchor.x,
                        y: box_y,
                        width: box_width,
                        height: config.comment_box_height,
                    },
                    color: resolve_color(None, &config.comment_background),
                    opacity: 1.0,
                },
                DrawOp::Text {
                    origin: Point::new(anchor.x + inset_x, box_y + inset_y),
                    size: config.comment_font_size,
                    text: text.clone(),
                    color: (0.0, 0.0, 0.0),
                },
            ]
        }
        Mark::Freehand { color, positions } => {
            let color = resolve_color(color.as_deref(), &config.default_freehand_color);
            // One segment per consecutive pair; joins may show small seams
            positions
                .windows(2)
                .map(|pair| DrawOp::Line {
                    from: offset(t.point(pair[0]), origin),
                    to: offset(t.point(pair[1]), origin),
                    thickness: config.freehand_thickness,
                    color,
                })
                .collect()
        }
    };

    Ok(ops)
}

fn plan_signature(
    signature: &Signature,
    pages: &BTreeMap<u32, PageGeometry>,
    scale: f64,
) -> Result<Vec<DrawOp>, AnnotatorError> {
    let (t, origin) = page_transform(pages, signature.page, scale)?;
    let image = decode_data_uri(&signature.image_data)?;
    let anchor = offset(
        t.point(Point::new(
            signature.position.x,
            signature.position.y + signature.height,
        )),
        origin,
    );
    Ok(vec![DrawOp::Image {
        rect: NativeRect {
            x: anchor.x,
            y: anchor.y,
            width: t.length(signature.width),
            height: t.length(signature.height),
        },
        image,
    }])
}

/// Convert every annotation (in creation order) and then every signature
/// into native drawing operations
///
/// `scale` is the capture-time scale factor. The same factor is used for
/// every page, so pages narrower or wider than the first page get
/// misplaced marks.
pub fn plan_export(
    snapshot: &MarkupSnapshot,
    pages: &BTreeMap<u32, PageGeometry>,
    scale: f64,
    config: &EditorConfig,
) -> ExportPlan {
    let mut plan = ExportPlan::default();

    for annotation in &snapshot.annotations {
        let kind = annotation.mark.kind();
        match plan_annotation(annotation, pages, scale, config) {
            Ok(ops) => plan.items.push(ItemPlan {
                id: annotation.id,
                kind,
                page: annotation.page,
                ops,
            }),
            Err(e) => plan.skipped.push(skip(annotation.id, kind, &e)),
        }
    }

    for signature in &snapshot.signatures {
        match plan_signature(signature, pages, scale) {
            Ok(ops) => plan.items.push(ItemPlan {
                id: signature.id,
                kind: "signature",
                page: signature.page,
                ops,
            }),
            Err(e) => plan.skipped.push(skip(signature.id, "signature", &e)),
        }
    }

    plan
}

/// Drawing surface for flattened markup
///
/// `begin_item`/`abort_item` bracket the operations of one annotation so a
/// canvas can drop whatever a failed item already drew.
pub trait MarkupCanvas {
    type Image: Copy;

    fn fill_rect(
        &mut self,
        page: u32,
        rect: NativeRect,
        color: Rgb,
        opacity: f64,
    ) -> Result<(), AnnotatorError>;

    fn line(
        &mut self,
        page: u32,
        from: Point,
        to: Point,
        thickness: f64,
        color: Rgb,
    ) -> Result<(), AnnotatorError>;

    fn text(
        &mut self,
        page: u32,
        origin: Point,
        size: f64,
        text: &str,
        color: Rgb,
    ) -> Result<(), AnnotatorError>;

    fn embed_image(&mut self, image: &RasterImage) -> Result<Self::Image, AnnotatorError>;

    fn place_image(
        &mut self,
        page: u32,
        image: Self::Image,
        rect: NativeRect,
    ) -> Result<(), AnnotatorError>;

    fn begin_item(&mut self) {}

    fn abort_item(&mut self) {}
}

fn apply_item<C: MarkupCanvas>(canvas: &mut C, item: &ItemPlan) -> Result<(), AnnotatorError> {
    for op in &item.ops {
        match op {
            DrawOp::FillRect {
                rect,
                color,
                opacity,
            } => canvas.fill_rect(item.page, *rect, *color, *opacity)?,
            DrawOp::Line {
                from,
                to,
                thickness,
                color,
            } => canvas.line(item.page, *from, *to, *thickness, *color)?,
            DrawOp::Text {
                origin,
                size,
                text,
                color,
            } => canvas.text(item.page, *origin, *size, text, *color)?,
            DrawOp::Image { rect, image } => {
                let handle = canvas.embed_image(image)?;
                canvas.place_image(item.page, handle, *rect)?;
            }
        }
    }
    Ok(())
}

/// Replay a plan against a canvas, skipping items that fail
pub fn apply_plan<C: MarkupCanvas>(canvas: &mut C, plan: &ExportPlan) -> ExportReport {
    let mut report = ExportReport {
        skipped: plan.skipped.clone(),
        ..Default::default()
    };

    for item in &plan.items {
        canvas.begin_item();
        match apply_item(canvas, item) {
            Ok(()) if item.kind == "signature" => report.signatures_drawn += 1,
            Ok(()) => report.annotations_drawn += 1,
            Err(e) => {
                canvas.abort_item();
                report.skipped.push(skip(item.id, item.kind, &e));
            }
        }
    }

    report
}

fn obj_to_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some((*f).into()),
        _ => None,
    }
}

/// Read the MediaBox of a page, following inheritance through Parent
fn page_geometry(doc: &Document, page_id: ObjectId) -> Option<PageGeometry> {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let dict = doc.get_dictionary(id).ok()?;
        if let Ok(raw) = dict.get(b"MediaBox") {
            let resolved = match raw {
                Object::Reference(r) => doc.get_object(*r).ok()?,
                other => other,
            };
            let arr = resolved.as_array().ok()?;
            if arr.len() != 4 {
                return None;
            }
            let llx = obj_to_f64(&arr[0])?;
            let lly = obj_to_f64(&arr[1])?;
            let urx = obj_to_f64(&arr[2])?;
            let ury = obj_to_f64(&arr[3])?;
            return Some(PageGeometry {
                origin: Point::new(llx, lly),
                width: urx - llx,
                height: ury - lly,
            });
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

/// Resources dictionary that applies to a page, copied out of the document
fn owned_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let Ok(dict) = doc.get_dictionary(id) else {
            break;
        };
        if let Ok(res) = dict.get(b"Resources") {
            return match res {
                Object::Reference(r) => doc
                    .get_dictionary(*r)
                    .cloned()
                    .unwrap_or_else(|_| Dictionary::new()),
                Object::Dictionary(d) => d.clone(),
                _ => Dictionary::new(),
            };
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Dictionary::new()
}

/// Isolate a page's existing content in `q`/`Q` and append `markup` after it.
///
/// The source streams are left untouched. The markup always starts from the
/// default graphics state, whatever the original content leaves behind.
fn wrap_page_contents(
    doc: &mut Document,
    page_id: ObjectId,
    markup: Vec<u8>,
) -> Result<(), AnnotatorError> {
    let existing: Vec<Object> = {
        let page = doc
            .get_dictionary(page_id)
            .map_err(|e| AnnotatorError::SerializationError(e.to_string()))?;
        match page.get(b"Contents") {
            Ok(Object::Reference(id)) => match doc.get_object(*id) {
                Ok(Object::Array(streams)) => streams.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(streams)) => streams.clone(),
            _ => Vec::new(),
        }
    };

    let mut suffix = b"\nQ\n".to_vec();
    suffix.extend(markup);
    let prefix_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let suffix_id = doc.add_object(Stream::new(Dictionary::new(), suffix));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(prefix_id));
    contents.extend(existing);
    contents.push(Object::Reference(suffix_id));

    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| AnnotatorError::SerializationError(e.to_string()))?
        .set("Contents", Object::Array(contents));
    Ok(())
}

fn merge_resource_entries(
    doc: &Document,
    resources: &mut Dictionary,
    key: &[u8],
    entries: &BTreeMap<String, ObjectId>,
) {
    if entries.is_empty() {
        return;
    }
    let mut sub = match resources.get(key) {
        Ok(Object::Reference(r)) => doc
            .get_dictionary(*r)
            .cloned()
            .unwrap_or_else(|_| Dictionary::new()),
        Ok(Object::Dictionary(d)) => d.clone(),
        _ => Dictionary::new(),
    };
    for (name, id) in entries {
        sub.set(name.as_bytes().to_vec(), Object::Reference(*id));
    }
    resources.set(key.to_vec(), Object::Dictionary(sub));
}

/// Replace non-ASCII characters; the standard Helvetica font only covers Latin text
fn pdf_text_bytes(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c as u8 } else { b'?' })
        .collect()
}

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

fn color_operands(color: Rgb) -> Vec<Object> {
    vec![
        Object::Real(color.0),
        Object::Real(color.1),
        Object::Real(color.2),
    ]
}

fn compress(data: &[u8]) -> Result<Vec<u8>, AnnotatorError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| AnnotatorError::OperationError(format!("compression failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| AnnotatorError::OperationError(format!("compression failed: {}", e)))
}

const FONT_NAME: &str = "AnnotF1";

#[derive(Debug, Default)]
struct PageResources {
    ext_g_states: BTreeMap<String, ObjectId>,
    fonts: BTreeMap<String, ObjectId>,
    x_objects: BTreeMap<String, ObjectId>,
}

/// Embedded image XObject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRef {
    index: usize,
    id: ObjectId,
}

/// [`MarkupCanvas`] over a loaded `lopdf` document
///
/// Operations are buffered per page and appended as one extra content
/// stream per page in [`LopdfCanvas::finish`].
pub struct LopdfCanvas {
    doc: Document,
    page_ids: BTreeMap<u32, ObjectId>,
    content: BTreeMap<u32, Vec<Operation>>,
    resources: BTreeMap<u32, PageResources>,
    /// Opacity in thousandths -> ExtGState object
    ext_g_states: BTreeMap<u32, ObjectId>,
    font_id: Option<ObjectId>,
    image_count: usize,
    checkpoint: BTreeMap<u32, usize>,
}

impl LopdfCanvas {
    pub fn new(doc: Document) -> Self {
        let page_ids = doc.get_pages();
        Self {
            doc,
            page_ids,
            content: BTreeMap::new(),
            resources: BTreeMap::new(),
            ext_g_states: BTreeMap::new(),
            font_id: None,
            image_count: 0,
            checkpoint: BTreeMap::new(),
        }
    }

    /// Native geometry of every page that has a usable MediaBox
    pub fn page_geometries(&self) -> BTreeMap<u32, PageGeometry> {
        self.page_ids
            .iter()
            .filter_map(|(num, id)| page_geometry(&self.doc, *id).map(|g| (*num, g)))
            .collect()
    }

    fn ops(&mut self, page: u32) -> Result<&mut Vec<Operation>, AnnotatorError> {
        if !self.page_ids.contains_key(&page) {
            return Err(AnnotatorError::OperationError(format!(
                "page {} does not exist",
                page
            )));
        }
        Ok(self.content.entry(page).or_default())
    }

    fn ext_g_state(&mut self, page: u32, opacity: f64) -> String {
        let key = (opacity.clamp(0.0, 1.0) * 1000.0).round() as u32;
        let doc = &mut self.doc;
        let id = *self.ext_g_states.entry(key).or_insert_with(|| {
            doc.add_object(dictionary! {
                "Type" => "ExtGState",
                "CA" => Object::Real(key as f32 / 1000.0),
                "ca" => Object::Real(key as f32 / 1000.0),
            })
        });
        let name = format!("AnnotGS{}", key);
        self.resources
            .entry(page)
            .or_default()
            .ext_g_states
            .insert(name.clone(), id);
        name
    }

    fn font(&mut self, page: u32) -> ObjectId {
        let id = match self.font_id {
            Some(id) => id,
            None => {
                let id = self.doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Helvetica",
                    "Encoding" => "WinAnsiEncoding",
                });
                self.font_id = Some(id);
                id
            }
        };
        self.resources
            .entry(page)
            .or_default()
            .fonts
            .insert(FONT_NAME.to_string(), id);
        id
    }

    /// Append the buffered operations to each page and serialize the document
    pub fn finish(mut self) -> Result<Vec<u8>, AnnotatorError> {
        let content = std::mem::take(&mut self.content);
        for (page, operations) in content {
            if operations.is_empty() {
                continue;
            }
            let Some(&page_id) = self.page_ids.get(&page) else {
                continue;
            };

            let mut wrapped = Vec::with_capacity(operations.len() + 2);
            wrapped.push(Operation::new("q", vec![]));
            wrapped.extend(operations);
            wrapped.push(Operation::new("Q", vec![]));

            let count = wrapped.len();
            let bytes = Content {
                operations: wrapped,
            }
            .encode()
            .map_err(|e| AnnotatorError::SerializationError(e.to_string()))?;
            wrap_page_contents(&mut self.doc, page_id, bytes)?;

            if let Some(used) = self.resources.remove(&page) {
                let mut resources = owned_resources(&self.doc, page_id);
                merge_resource_entries(&self.doc, &mut resources, b"ExtGState", &used.ext_g_states);
                merge_resource_entries(&self.doc, &mut resources, b"Font", &used.fonts);
                merge_resource_entries(&self.doc, &mut resources, b"XObject", &used.x_objects);
                let page_dict = self
                    .doc
                    .get_object_mut(page_id)
                    .and_then(Object::as_dict_mut)
                    .map_err(|e| AnnotatorError::SerializationError(e.to_string()))?;
                page_dict.set("Resources", Object::Dictionary(resources));
            }
            debug!(page, operations = count, "Flattened markup into page");
        }

        let mut output = Vec::new();
        self.doc
            .save_to(&mut output)
            .map_err(|e| AnnotatorError::SerializationError(e.to_string()))?;
        Ok(output)
    }
}

impl MarkupCanvas for LopdfCanvas {
    type Image = ImageRef;

    fn fill_rect(
        &mut self,
        page: u32,
        rect: NativeRect,
        color: Rgb,
        opacity: f64,
    ) -> Result<(), AnnotatorError> {
        self.ops(page)?;
        let gs = (opacity < 1.0).then(|| self.ext_g_state(page, opacity));
        let ops = self.ops(page)?;
        ops.push(Operation::new("q", vec![]));
        if let Some(name) = gs {
            ops.push(Operation::new("gs", vec![Object::Name(name.into_bytes())]));
        }
        ops.push(Operation::new("rg", color_operands(color)));
        ops.push(Operation::new(
            "re",
            vec![
                real(rect.x),
                real(rect.y),
                real(rect.width),
                real(rect.height),
            ],
        ));
        ops.push(Operation::new("f", vec![]));
        ops.push(Operation::new("Q", vec![]));
        Ok(())
    }

    fn line(
        &mut self,
        page: u32,
        from: Point,
        to: Point,
        thickness: f64,
        color: Rgb,
    ) -> Result<(), AnnotatorError> {
        let ops = self.ops(page)?;
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new("RG", color_operands(color)));
        ops.push(Operation::new("w", vec![real(thickness)]));
        ops.push(Operation::new("m", vec![real(from.x), real(from.y)]));
        ops.push(Operation::new("l", vec![real(to.x), real(to.y)]));
        ops.push(Operation::new("S", vec![]));
        ops.push(Operation::new("Q", vec![]));
        Ok(())
    }

    fn text(
        &mut self,
        page: u32,
        origin: Point,
        size: f64,
        text: &str,
        color: Rgb,
    ) -> Result<(), AnnotatorError> {
        self.ops(page)?;
        self.font(page);
        let ops = self.ops(page)?;
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new("rg", color_operands(color)));
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![Object::Name(FONT_NAME.as_bytes().to_vec()), real(size)],
        ));
        ops.push(Operation::new("Td", vec![real(origin.x), real(origin.y)]));
        ops.push(Operation::new(
            "Tj",
            vec![Object::String(pdf_text_bytes(text), StringFormat::Literal)],
        ));
        ops.push(Operation::new("ET", vec![]));
        ops.push(Operation::new("Q", vec![]));
        Ok(())
    }

    fn embed_image(&mut self, image: &RasterImage) -> Result<ImageRef, AnnotatorError> {
        if image.width == 0 || image.height == 0 {
            return Err(AnnotatorError::ImageDecode("image has no pixels".to_string()));
        }

        let mut image_dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => image.width as i64,
            "Height" => image.height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8_i64,
            "Filter" => "FlateDecode",
        };

        if let Some(alpha) = &image.alpha {
            let smask = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => image.width as i64,
                    "Height" => image.height as i64,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8_i64,
                    "Filter" => "FlateDecode",
                },
                compress(alpha)?,
            );
            let smask_id = self.doc.add_object(smask);
            image_dict.set("SMask", Object::Reference(smask_id));
        }

        let id = self
            .doc
            .add_object(Stream::new(image_dict, compress(&image.rgb)?));
        let index = self.image_count;
        self.image_count += 1;
        Ok(ImageRef { index, id })
    }

    fn place_image(
        &mut self,
        page: u32,
        image: ImageRef,
        rect: NativeRect,
    ) -> Result<(), AnnotatorError> {
        self.ops(page)?;
        let name = format!("AnnotIm{}", image.index);
        self.resources
            .entry(page)
            .or_default()
            .x_objects
            .insert(name.clone(), image.id);

        let ops = self.ops(page)?;
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new(
            "cm",
            vec![
                real(rect.width),
                real(0.0),
                real(0.0),
                real(rect.height),
                real(rect.x),
                real(rect.y),
            ],
        ));
        ops.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
        ops.push(Operation::new("Q", vec![]));
        Ok(())
    }

    fn begin_item(&mut self) {
        self.checkpoint = self
            .content
            .iter()
            .map(|(page, ops)| (*page, ops.len()))
            .collect();
    }

    fn abort_item(&mut self) {
        for (page, ops) in self.content.iter_mut() {
            let keep = self.checkpoint.get(page).copied().unwrap_or(0);
            ops.truncate(keep);
        }
    }
}

/// Load `source`, flatten every annotation and signature of `snapshot` into
/// its page, and serialize the result
///
/// `container_width` is the unscaled viewport width the marks were captured
/// in. The scale factor is derived from the first page's native width and
/// applied to all pages.
pub fn export_document(
    source: &[u8],
    source_name: &str,
    snapshot: &MarkupSnapshot,
    container_width: f64,
    config: &EditorConfig,
) -> Result<ExportOutput, AnnotatorError> {
    let doc = Document::load_mem(source).map_err(|e| AnnotatorError::ParseError(e.to_string()))?;
    let file_name = format!("{}{}", config.output_prefix, source_name);

    let mut canvas = LopdfCanvas::new(doc);
    let pages = canvas.page_geometries();
    let first = pages
        .values()
        .next()
        .copied()
        .ok_or_else(|| AnnotatorError::ParseError("PDF has no pages".to_string()))?;
    let scale = scale_factor(first.width, container_width)?;

    if snapshot.is_empty() {
        // No changes, return original
        return Ok(ExportOutput {
            bytes: source.to_vec(),
            file_name,
            report: ExportReport::default(),
        });
    }

    let plan = plan_export(snapshot, &pages, scale, config);
    let report = apply_plan(&mut canvas, &plan);
    let bytes = canvas.finish()?;

    info!(
        annotations = report.annotations_drawn,
        signatures = report.signatures_drawn,
        skipped = report.skipped.len(),
        "Export complete"
    );

    Ok(ExportOutput {
        bytes,
        file_name,
        report,
    })
}
