//! Reference images attached to vision prompts

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::clients::{ContentPart, ImageUrl};

#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub path: PathBuf,
    pub mime: &'static str,
    pub base64: String,
}

impl ImageAttachment {
    /// Read and base64-encode an image file
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        Ok(Self::from_bytes(path, &bytes))
    }

    pub fn from_bytes(path: impl Into<PathBuf>, bytes: &[u8]) -> Self {
        let path = path.into();
        let mime = mime_for(&path);
        Self {
            path,
            mime,
            base64: STANDARD.encode(bytes),
        }
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.base64)
    }

    pub fn as_part(&self) -> ContentPart {
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: self.data_url(),
            },
        }
    }
}

/// Unknown extensions fall back to JPEG
fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_encoding() {
        let img = ImageAttachment::from_bytes("shadow.PNG", b"abc");
        assert_eq!(img.mime, "image/png");
        assert_eq!(img.data_url(), "data:image/png;base64,YWJj");
    }

    #[test]
    fn test_unknown_extension_defaults_to_jpeg() {
        assert_eq!(mime_for(Path::new("scene.jpg")), "image/jpeg");
        assert_eq!(mime_for(Path::new("scene")), "image/jpeg");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(ImageAttachment::from_path("/definitely/not/here.png").is_err());
    }
}
