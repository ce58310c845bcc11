//! Input collection: turn user-supplied paths into [`UploadedImage`]s.
//!
//! Directories are walked recursively and filtered to the formats the
//! vision endpoints accept (JPEG, PNG, WebP). A path named explicitly is
//! always submitted, even if missing or oddly named: whether it can be read
//! is the encoder's business, and a failure there only degrades that one
//! file's result.

use crate::error::NewsclipError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extensions picked up when walking a directory.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// MIME type used when neither the extension nor the bytes identify the image.
pub const FALLBACK_MIME: &str = "application/octet-stream";

/// Where an image's bytes come from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Read lazily from disk at encoding time.
    Path(PathBuf),
    /// Already in memory.
    Bytes(Vec<u8>),
}

/// One selected image. Immutable; consumed by encoding.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Display name (the path's file name), used as the result's `fileName`.
    pub file_name: String,
    /// Declared MIME type, passed through to the model unchanged.
    pub mime_type: String,
    pub source: ImageSource,
}

impl UploadedImage {
    /// An image on disk. The MIME type comes from the extension, or from the
    /// file's magic bytes when the extension is unknown.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = display_name(&path);
        let mime_type = mime_from_extension(&path)
            .map(str::to_string)
            .or_else(|| sniff_file(&path))
            .unwrap_or_else(|| FALLBACK_MIME.to_string());
        Self {
            file_name,
            mime_type,
            source: ImageSource::Path(path),
        }
    }

    /// An in-memory image. Without an explicit MIME type, the bytes are sniffed.
    pub fn from_bytes(
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        mime_type: Option<&str>,
    ) -> Self {
        let mime_type = mime_type
            .map(str::to_string)
            .or_else(|| sniff_mime(&bytes).map(str::to_string))
            .unwrap_or_else(|| FALLBACK_MIME.to_string());
        Self {
            file_name: file_name.into(),
            mime_type,
            source: ImageSource::Bytes(bytes),
        }
    }
}

/// Expand files and directories into the list of images to analyse.
///
/// Directory contents are sorted by path for deterministic submission order.
pub fn collect_images(inputs: &[PathBuf]) -> Result<Vec<UploadedImage>, NewsclipError> {
    let mut images = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut found = Vec::new();
            for entry in WalkDir::new(input).follow_links(true) {
                let entry = entry.map_err(|e| NewsclipError::ScanFailed {
                    path: input.clone(),
                    detail: e.to_string(),
                })?;
                let path = entry.path();
                if entry.file_type().is_file() && is_supported(path) {
                    found.push(path.to_path_buf());
                }
            }
            found.sort();
            if found.is_empty() {
                warn!("No supported images under {}", input.display());
            }
            debug!("{}: {} images", input.display(), found.len());
            images.extend(found.into_iter().map(UploadedImage::from_path));
        } else {
            images.push(UploadedImage::from_path(input.clone()));
        }
    }

    Ok(images)
}

/// Check if a file has a supported image extension.
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

/// Identify an image format from its leading bytes.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes).ok().map(|f| f.to_mime_type())
}

fn sniff_file(path: &Path) -> Option<String> {
    use std::io::Read;
    let mut head = [0u8; 32];
    let mut file = std::fs::File::open(path).ok()?;
    let n = file.read(&mut head).ok()?;
    sniff_mime(&head[..n]).map(str::to_string)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_is_supported() {
        assert!(is_supported(Path::new("page.jpg")));
        assert!(is_supported(Path::new("page.JPEG")));
        assert!(is_supported(Path::new("page.png")));
        assert!(is_supported(Path::new("page.webp")));
        assert!(!is_supported(Path::new("page.pdf")));
        assert!(!is_supported(Path::new("README")));
    }

    #[test]
    fn mime_from_extension_wins() {
        let img = UploadedImage::from_path("/nonexistent/scan_01.JPG");
        assert_eq!(img.mime_type, "image/jpeg");
        assert_eq!(img.file_name, "scan_01.JPG");
    }

    #[test]
    fn missing_file_without_extension_falls_back() {
        let img = UploadedImage::from_path("/nonexistent/scan");
        assert_eq!(img.mime_type, FALLBACK_MIME);
    }

    #[test]
    fn sniffs_bytes_when_mime_missing() {
        let img = UploadedImage::from_bytes("clip", PNG_MAGIC.to_vec(), None);
        assert_eq!(img.mime_type, "image/png");

        let img = UploadedImage::from_bytes("clip", vec![0xFF, 0xD8, 0xFF, 0xE0], None);
        assert_eq!(img.mime_type, "image/jpeg");
    }

    #[test]
    fn sniffs_webp_without_decoder() {
        let img = UploadedImage::from_bytes("clip", b"RIFF\x10\0\0\0WEBPVP8 ".to_vec(), None);
        assert_eq!(img.mime_type, "image/webp");
    }

    #[test]
    fn explicit_mime_is_kept() {
        let img = UploadedImage::from_bytes("clip", PNG_MAGIC.to_vec(), Some("image/webp"));
        assert_eq!(img.mime_type, "image/webp");
    }

    #[test]
    fn sniffs_file_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan");
        std::fs::write(&path, PNG_MAGIC).unwrap();
        assert_eq!(UploadedImage::from_path(&path).mime_type, "image/png");
    }

    #[test]
    fn collects_directory_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.png"), PNG_MAGIC).unwrap();
        std::fs::write(dir.path().join("a.jpg"), [0xFF, 0xD8, 0xFF]).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("c.webp"), b"RIFF").unwrap();

        let images = collect_images(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<&str> = images.iter().map(|i| i.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.png", "c.webp"]);
    }

    #[test]
    fn explicit_missing_file_is_still_submitted() {
        let images = collect_images(&[PathBuf::from("/nonexistent/page.png")]).unwrap();
        assert_eq!(images.len(), 1);
        assert!(matches!(images[0].source, ImageSource::Path(_)));
    }
}
