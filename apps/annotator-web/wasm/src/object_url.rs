//! Blob-backed object URLs with scoped lifetime
//!
//! The page renderer needs a URL for the loaded document. Each one is owned
//! by an [`ObjectUrl`] and revoked when that value is dropped, so replacing
//! or closing a document can never leave a URL behind.

use wasm_bindgen::prelude::*;
use web_sys::{Blob, BlobPropertyBag, Url};

#[derive(Debug)]
pub struct ObjectUrl {
    url: String,
}

impl ObjectUrl {
    /// Wrap `bytes` in a Blob of type `mime` and create a URL for it
    pub fn from_bytes(bytes: &[u8], mime: &str) -> Result<Self, JsValue> {
        let array = js_sys::Uint8Array::from(bytes);
        let parts = js_sys::Array::new();
        parts.push(&array);

        let options = BlobPropertyBag::new();
        options.set_type(mime);

        let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &options)?;
        let url = Url::create_object_url_with_blob(&blob)?;
        Ok(Self { url })
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        if let Err(e) = Url::revoke_object_url(&self.url) {
            web_sys::console::warn_2(&"Failed to revoke object URL".into(), &e);
        }
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn test_url_is_blob_scheme() {
        let url = ObjectUrl::from_bytes(b"%PDF-1.7", "application/pdf").unwrap();
        assert!(url.as_str().starts_with("blob:"));
    }

    #[wasm_bindgen_test]
    fn test_drop_revokes_without_panicking() {
        let url = ObjectUrl::from_bytes(b"%PDF-1.7", "application/pdf").unwrap();
        drop(url);
    }
}
