//! Image encoding: `UploadedImage` → base64 `EncodedImage`.
//!
//! Vision APIs take images inline as base64 inside the JSON request body.
//! The bytes are sent exactly as uploaded: no re-encoding, no resizing, and
//! the declared MIME type passes through untouched.

use crate::error::ImageError;
use crate::pipeline::input::{ImageSource, UploadedImage};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// A base64 image payload plus its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Name of the file this payload came from.
    pub file_name: String,
    /// Standard-alphabet, padded base64.
    pub data: String,
    pub mime_type: String,
}

impl EncodedImage {
    /// Convert to the attachment type used by `edgequake-llm` providers.
    pub fn to_image_data(&self) -> edgequake_llm::ImageData {
        edgequake_llm::ImageData::new(self.data.clone(), self.mime_type.as_str()).with_detail("high")
    }
}

/// Read the whole image and base64-encode it.
///
/// Fails only when the bytes cannot be read; the error is scoped to this file.
pub async fn encode_image(image: UploadedImage) -> Result<EncodedImage, ImageError> {
    let UploadedImage {
        file_name,
        mime_type,
        source,
    } = image;

    let bytes = match source {
        ImageSource::Bytes(bytes) => bytes,
        ImageSource::Path(path) => {
            tokio::fs::read(&path)
                .await
                .map_err(|e| ImageError::ReadFailed {
                    file: file_name.clone(),
                    detail: format!("{}: {e}", path.display()),
                })?
        }
    };

    let data = STANDARD.encode(&bytes);
    debug!("Encoded {} → {} bytes base64", file_name, data.len());

    Ok(EncodedImage {
        file_name,
        data,
        mime_type,
    })
}
