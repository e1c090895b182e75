//! Coordinate transformation between the viewport and PDF page space
//!
//! The viewport has a top-left origin with y growing downward and is
//! measured in CSS pixels of the unscaled page container. PDF pages have a
//! bottom-left origin with y growing upward and are measured in points.

use crate::error::AnnotatorError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise minimum of two points
    pub fn min(self, other: Point) -> Point {
        Point::new(self.x.min(other.x), self.y.min(other.y))
    }
}

/// Ratio between a page's native width and the container width at capture time
///
/// Fails when the container width is zero, negative or not finite, since
/// any such value would turn every exported coordinate into NaN or infinity.
pub fn scale_factor(native_page_width: f64, container_width: f64) -> Result<f64, AnnotatorError> {
    if !(container_width.is_finite() && container_width > 0.0) {
        return Err(AnnotatorError::InvalidScale { container_width });
    }
    Ok(native_page_width / container_width)
}

/// Convert a viewport point to PDF coordinates (flip Y axis, apply scale)
pub fn to_target_coords(x: f64, y: f64, page_height: f64, scale: f64) -> (f64, f64) {
    (x * scale, page_height - y * scale)
}

/// Inverse of [`to_target_coords`]
pub fn from_target_coords(pdf_x: f64, pdf_y: f64, page_height: f64, scale: f64) -> (f64, f64) {
    (pdf_x / scale, (page_height - pdf_y) / scale)
}

/// Viewport-to-page transform for one page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    page_height: f64,
    scale: f64,
}

impl Transform {
    /// Build a transform for a page, failing fast on an unusable container width
    pub fn new(
        native_page_width: f64,
        page_height: f64,
        container_width: f64,
    ) -> Result<Self, AnnotatorError> {
        Ok(Self {
            page_height,
            scale: scale_factor(native_page_width, container_width)?,
        })
    }

    /// Transform with an already computed scale factor
    pub fn with_scale(page_height: f64, scale: f64) -> Self {
        Self { page_height, scale }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn page_height(&self) -> f64 {
        self.page_height
    }

    pub fn point(&self, p: Point) -> Point {
        let (x, y) = to_target_coords(p.x, p.y, self.page_height, self.scale);
        Point::new(x, y)
    }

    /// Scale a viewport length to native units
    pub fn length(&self, len: f64) -> f64 {
        len * self.scale
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn dimension() -> impl Strategy<Value = f64> {
        1.0f64..2000.0
    }

    proptest! {
        /// Property: viewport -> PDF -> viewport returns the original point
        #[test]
        fn roundtrip_viewport_to_pdf(
            x in 0.0f64..2000.0,
            y in 0.0f64..2000.0,
            page_height in dimension(),
            scale in 0.01f64..10.0,
        ) {
            let (pdf_x, pdf_y) = to_target_coords(x, y, page_height, scale);
            let (back_x, back_y) = from_target_coords(pdf_x, pdf_y, page_height, scale);

            let tolerance = 1e-6;
            prop_assert!((back_x - x).abs() < tolerance, "X roundtrip: {} -> {} -> {}", x, pdf_x, back_x);
            prop_assert!((back_y - y).abs() < tolerance, "Y roundtrip: {} -> {} -> {}", y, pdf_y, back_y);
        }

        /// Property: moving down in the viewport always moves down on the page
        #[test]
        fn y_axis_is_inverted(
            y in 0.0f64..1000.0,
            dy in 0.1f64..100.0,
            page_height in dimension(),
            scale in 0.01f64..10.0,
        ) {
            let (_, upper) = to_target_coords(0.0, y, page_height, scale);
            let (_, lower) = to_target_coords(0.0, y + dy, page_height, scale);
            prop_assert!(lower < upper);
        }

        /// Property: any positive finite container width yields a finite scale
        #[test]
        fn scale_factor_is_finite(native in dimension(), container in dimension()) {
            let scale = scale_factor(native, container).unwrap();
            prop_assert!(scale.is_finite() && scale > 0.0);
        }
    }
}
