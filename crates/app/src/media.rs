use std::path::Path;

use snafu::{ResultExt, Snafu};

use salus_core::ImageInput;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum MediaError {
    #[snafu(display("failed to read image file {path}"))]
    ReadImage {
        stage: &'static str,
        path: String,
        source: std::io::Error,
    },
}

pub type MediaResult<T> = Result<T, MediaError>;

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_SIGNATURE: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// Reads an image file and sniffs its MIME type from the leading bytes.
pub fn load_image(path: &Path) -> MediaResult<ImageInput> {
    let data = std::fs::read(path).context(ReadImageSnafu {
        stage: "read-image",
        path: path.display().to_string(),
    })?;
    let mime_type = detect_mime(&data).to_string();

    Ok(ImageInput { data, mime_type })
}

// Signature sniffing instead of extension mapping: the remote service cares
// about the actual payload type, and files are routinely misnamed.
fn detect_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&PNG_SIGNATURE) {
        "image/png"
    } else if bytes.starts_with(&JPEG_SIGNATURE) {
        "image/jpeg"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/png"
    }
}
