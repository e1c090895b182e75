//! Annotation store for user markup
//!
//! This module holds the committed highlights, underlines, comments,
//! freehand strokes and placed signatures of one document. Entries are
//! immutable once added; the only mutation is removal by id.

use crate::error::AnnotatorError;
use crate::geometry::Point;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type AnnotationId = Uuid;

/// Geometry and content of a single mark, without identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Mark {
    Highlight {
        color: Option<String>,
        position: Point,
        width: f64,
        height: f64,
    },
    Underline {
        color: Option<String>,
        position: Point,
        width: f64,
        height: f64,
    },
    /// Anchored at one point; the box size is derived from the text
    Comment { text: String, position: Point },
    Freehand {
        color: Option<String>,
        positions: Vec<Point>,
    },
}

impl Mark {
    pub fn kind(&self) -> &'static str {
        match self {
            Mark::Highlight { .. } => "highlight",
            Mark::Underline { .. } => "underline",
            Mark::Comment { .. } => "comment",
            Mark::Freehand { .. } => "freehand",
        }
    }

    fn validate(&self) -> Result<(), AnnotatorError> {
        match self {
            Mark::Comment { text, .. } if text.trim().is_empty() => Err(
                AnnotatorError::InvalidAnnotation("comment text is empty".to_string()),
            ),
            Mark::Freehand { positions, .. } if positions.len() < 2 => {
                Err(AnnotatorError::InvalidAnnotation(format!(
                    "freehand path needs at least 2 points, got {}",
                    positions.len()
                )))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Annotation {
    pub id: AnnotationId,
    /// 1-based page number
    pub page: u32,
    #[serde(flatten)]
    pub mark: Mark,
}

/// An imported raster signature placed on a page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Signature {
    pub id: AnnotationId,
    pub page: u32,
    /// Raster payload as a `data:` URI
    pub image_data: String,
    pub position: Point,
    pub width: f64,
    pub height: f64,
}

/// Owned copy of both collections, taken when an export starts
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MarkupSnapshot {
    pub annotations: Vec<Annotation>,
    pub signatures: Vec<Signature>,
}

impl MarkupSnapshot {
    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty() && self.signatures.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotationStore {
    annotations: Vec<Annotation>,
    signatures: Vec<Signature>,
}

fn check_page(page: u32) -> Result<(), AnnotatorError> {
    if page == 0 {
        return Err(AnnotatorError::InvalidAnnotation(
            "page numbers start at 1".to_string(),
        ));
    }
    Ok(())
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mark on `page` under a freshly generated id
    pub fn add(&mut self, page: u32, mark: Mark) -> Result<AnnotationId, AnnotatorError> {
        check_page(page)?;
        mark.validate()?;

        let id = Uuid::new_v4();
        self.annotations.push(Annotation { id, page, mark });
        Ok(id)
    }

    /// Append a signature placement under a freshly generated id
    pub fn add_signature(
        &mut self,
        page: u32,
        image_data: String,
        position: Point,
        width: f64,
        height: f64,
    ) -> Result<AnnotationId, AnnotatorError> {
        check_page(page)?;

        let id = Uuid::new_v4();
        self.signatures.push(Signature {
            id,
            page,
            image_data,
            position,
            width,
            height,
        });
        Ok(id)
    }

    /// Remove an annotation or signature by id
    ///
    /// Returns whether anything was removed; an unknown id is a no-op.
    pub fn remove(&mut self, id: AnnotationId) -> bool {
        if let Some(pos) = self.annotations.iter().position(|a| a.id == id) {
            self.annotations.remove(pos);
            return true;
        }
        if let Some(pos) = self.signatures.iter().position(|s| s.id == id) {
            self.signatures.remove(pos);
            return true;
        }
        false
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn annotations_on_page(&self, page: u32) -> impl Iterator<Item = &Annotation> + '_ {
        self.annotations.iter().filter(move |a| a.page == page)
    }

    pub fn signatures_on_page(&self, page: u32) -> impl Iterator<Item = &Signature> + '_ {
        self.signatures.iter().filter(move |s| s.page == page)
    }

    pub fn len(&self) -> usize {
        self.annotations.len() + self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty() && self.signatures.is_empty()
    }

    pub fn clear(&mut self) {
        self.annotations.clear();
        self.signatures.clear();
    }

    pub fn snapshot(&self) -> MarkupSnapshot {
        MarkupSnapshot {
            annotations: self.annotations.clone(),
            signatures: self.signatures.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: removing a present id drops exactly that entry
        #[test]
        fn remove_present_id_decrements_by_one(count in 1usize..20, pick in any::<prop::sample::Index>()) {
            let mut store = AnnotationStore::new();
            for i in 0..count {
                store.add(1, Mark::Highlight {
                    color: None,
                    position: Point::new(i as f64, 0.0),
                    width: 1.0,
                    height: 1.0,
                }).unwrap();
            }
            let before = store.snapshot();
            let victim = before.annotations[pick.index(count)].id;

            prop_assert!(store.remove(victim));
            prop_assert_eq!(store.len(), count - 1);

            let expected: Vec<_> = before
                .annotations
                .into_iter()
                .filter(|a| a.id != victim)
                .collect();
            prop_assert_eq!(store.annotations(), expected.as_slice());
        }
    }
}
