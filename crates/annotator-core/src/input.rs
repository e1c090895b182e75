//! Document selection and validation
//!
//! The upload area accepts a single PDF. Anything else is rejected with a
//! [`RejectReason`] before a session is created.

use crate::error::AnnotatorError;
use lopdf::Document;
use serde::Serialize;
use std::fmt;

const PDF_MIME: &str = "application/pdf";

/// Why a file selection was not accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NoFile,
    TooManyFiles(usize),
    WrongType(String),
    NotPdf,
    Unreadable(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NoFile => write!(f, "no file selected"),
            RejectReason::TooManyFiles(n) => write!(f, "expected one file, got {}", n),
            RejectReason::WrongType(mime) => write!(f, "not a PDF file (type {:?})", mime),
            RejectReason::NotPdf => write!(f, "missing %PDF- header"),
            RejectReason::Unreadable(e) => write!(f, "could not read PDF: {}", e),
        }
    }
}

/// A file offered by the upload area, before its contents are read
#[derive(Debug, Clone)]
pub struct FileCandidate {
    pub name: String,
    pub mime: String,
}

impl FileCandidate {
    pub fn new(name: impl Into<String>, mime: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
        }
    }

    pub fn looks_like_pdf(&self) -> bool {
        self.mime.eq_ignore_ascii_case(PDF_MIME) || self.name.to_ascii_lowercase().ends_with(".pdf")
    }
}

/// Pick the one acceptable file out of a selection
pub fn validate_selection(files: &[FileCandidate]) -> Result<&FileCandidate, AnnotatorError> {
    let file = match files {
        [] => return Err(AnnotatorError::InputRejected(RejectReason::NoFile)),
        [file] => file,
        many => {
            return Err(AnnotatorError::InputRejected(RejectReason::TooManyFiles(
                many.len(),
            )))
        }
    };

    if !file.looks_like_pdf() {
        return Err(AnnotatorError::InputRejected(RejectReason::WrongType(
            file.mime.clone(),
        )));
    }
    Ok(file)
}

/// Check the bytes of a selected file and return its page count
pub fn validate_pdf_bytes(bytes: &[u8]) -> Result<u32, AnnotatorError> {
    if !bytes.starts_with(b"%PDF-") {
        return Err(AnnotatorError::InputRejected(RejectReason::NotPdf));
    }

    let document = Document::load_mem(bytes)
        .map_err(|e| AnnotatorError::InputRejected(RejectReason::Unreadable(e.to_string())))?;

    let page_count = document.get_pages().len() as u32;
    if page_count == 0 {
        return Err(AnnotatorError::InputRejected(RejectReason::Unreadable(
            "PDF has no pages".to_string(),
        )));
    }
    Ok(page_count)
}
