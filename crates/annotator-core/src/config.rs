//! Editor configuration
//!
//! Every fixed size, colour, opacity and range used by capture, overlay and
//! export lives here. Fields default individually, so a partial TOML file or
//! JS object only needs to name what it overrides.

use crate::error::AnnotatorError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Band height of a highlight in viewport pixels
    #[serde(default = "default_highlight_height")]
    pub highlight_height: f64,
    /// Height of an underline in viewport pixels
    #[serde(default = "default_underline_height")]
    pub underline_height: f64,
    #[serde(default = "default_highlight_opacity")]
    pub highlight_opacity: f64,
    #[serde(default = "default_underline_opacity")]
    pub underline_opacity: f64,
    /// Native units between the underline anchor and the drawn bar
    #[serde(default = "default_underline_offset")]
    pub underline_offset: f64,
    /// Native height of the exported underline bar
    #[serde(default = "default_underline_thickness")]
    pub underline_thickness: f64,
    #[serde(default = "default_highlight_color")]
    pub default_highlight_color: String,
    #[serde(default = "default_underline_color")]
    pub default_underline_color: String,
    #[serde(default = "default_freehand_color")]
    pub default_freehand_color: String,
    #[serde(default = "default_freehand_thickness")]
    pub freehand_thickness: f64,
    /// Native width reserved per comment character
    #[serde(default = "default_comment_char_width")]
    pub comment_char_width: f64,
    #[serde(default = "default_comment_min_width")]
    pub comment_min_width: f64,
    #[serde(default = "default_comment_box_height")]
    pub comment_box_height: f64,
    /// Distance above the anchor where the comment box starts
    #[serde(default = "default_comment_vertical_offset")]
    pub comment_vertical_offset: f64,
    #[serde(default = "default_comment_font_size")]
    pub comment_font_size: f64,
    /// (x, y) offset of the comment text inside its box
    #[serde(default = "default_comment_text_inset")]
    pub comment_text_inset: (f64, f64),
    #[serde(default = "default_comment_background")]
    pub comment_background: String,
    #[serde(default = "default_signature_width")]
    pub signature_width: f64,
    #[serde(default = "default_signature_height")]
    pub signature_height: f64,
    #[serde(default = "default_max_container_width")]
    pub max_container_width: f64,
    #[serde(default = "default_min_zoom")]
    pub min_zoom: f64,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: f64,
    #[serde(default = "default_zoom_step")]
    pub zoom_step: f64,
    /// Prepended to the source file name when naming the export
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,
}

fn default_highlight_height() -> f64 {
    20.0
}

fn default_underline_height() -> f64 {
    2.0
}

fn default_highlight_opacity() -> f64 {
    0.4
}

fn default_underline_opacity() -> f64 {
    0.8
}

fn default_underline_offset() -> f64 {
    2.0
}

fn default_underline_thickness() -> f64 {
    2.0
}

fn default_highlight_color() -> String {
    "#FFFF00".to_string()
}

fn default_underline_color() -> String {
    "#0000FF".to_string()
}

fn default_freehand_color() -> String {
    "#FF0000".to_string()
}

fn default_freehand_thickness() -> f64 {
    2.0
}

fn default_comment_char_width() -> f64 {
    6.0
}

fn default_comment_min_width() -> f64 {
    50.0
}

fn default_comment_box_height() -> f64 {
    20.0
}

fn default_comment_vertical_offset() -> f64 {
    15.0
}

fn default_comment_font_size() -> f64 {
    10.0
}

fn default_comment_text_inset() -> (f64, f64) {
    (5.0, 6.0)
}

fn default_comment_background() -> String {
    "#FFFFCC".to_string()
}

fn default_signature_width() -> f64 {
    150.0
}

fn default_signature_height() -> f64 {
    50.0
}

fn default_max_container_width() -> f64 {
    800.0
}

fn default_min_zoom() -> f64 {
    0.5
}

fn default_max_zoom() -> f64 {
    3.0
}

fn default_zoom_step() -> f64 {
    0.25
}

fn default_output_prefix() -> String {
    "annotated_".to_string()
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            highlight_height: default_highlight_height(),
            underline_height: default_underline_height(),
            highlight_opacity: default_highlight_opacity(),
            underline_opacity: default_underline_opacity(),
            underline_offset: default_underline_offset(),
            underline_thickness: default_underline_thickness(),
            default_highlight_color: default_highlight_color(),
            default_underline_color: default_underline_color(),
            default_freehand_color: default_freehand_color(),
            freehand_thickness: default_freehand_thickness(),
            comment_char_width: default_comment_char_width(),
            comment_min_width: default_comment_min_width(),
            comment_box_height: default_comment_box_height(),
            comment_vertical_offset: default_comment_vertical_offset(),
            comment_font_size: default_comment_font_size(),
            comment_text_inset: default_comment_text_inset(),
            comment_background: default_comment_background(),
            signature_width: default_signature_width(),
            signature_height: default_signature_height(),
            max_container_width: default_max_container_width(),
            min_zoom: default_min_zoom(),
            max_zoom: default_max_zoom(),
            zoom_step: default_zoom_step(),
            output_prefix: default_output_prefix(),
        }
    }
}

impl EditorConfig {
    /// Parse a configuration from TOML text and validate it
    ///
    /// # Example
    ///
    /// ```
    /// use annotator_core::config::EditorConfig;
    ///
    /// # fn example() -> Result<(), annotator_core::AnnotatorError> {
    /// let config = EditorConfig::from_toml_str("highlight_height = 24.0")?;
    /// assert_eq!(config.highlight_height, 24.0);
    /// assert_eq!(config.underline_height, 2.0);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self, AnnotatorError> {
        let config: EditorConfig =
            toml::from_str(s).map_err(|e| AnnotatorError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration from JSON text and validate it
    pub fn from_json(json: &str) -> Result<Self, AnnotatorError> {
        let config: EditorConfig =
            serde_json::from_str(json).map_err(|e| AnnotatorError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AnnotatorError> {
        let sizes = [
            ("highlight_height", self.highlight_height),
            ("underline_height", self.underline_height),
            ("underline_thickness", self.underline_thickness),
            ("freehand_thickness", self.freehand_thickness),
            ("comment_char_width", self.comment_char_width),
            ("comment_min_width", self.comment_min_width),
            ("comment_box_height", self.comment_box_height),
            ("comment_font_size", self.comment_font_size),
            ("signature_width", self.signature_width),
            ("signature_height", self.signature_height),
            ("max_container_width", self.max_container_width),
            ("min_zoom", self.min_zoom),
            ("zoom_step", self.zoom_step),
        ];
        for (name, value) in sizes {
            if !(value.is_finite() && value > 0.0) {
                return Err(AnnotatorError::ConfigError(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }

        for (name, value) in [
            ("highlight_opacity", self.highlight_opacity),
            ("underline_opacity", self.underline_opacity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AnnotatorError::ConfigError(format!(
                    "{} must be within 0-1, got {}",
                    name, value
                )));
            }
        }

        if self.min_zoom > self.max_zoom {
            return Err(AnnotatorError::ConfigError(format!(
                "min_zoom {} > max_zoom {}",
                self.min_zoom, self.max_zoom
            )));
        }

        Ok(())
    }
}
