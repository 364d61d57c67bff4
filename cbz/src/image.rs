use std::{fs::File, io::Read, path::Path};

use image::ImageFormat;
use tracing::debug;

/// Extension used when the format of a page can't be guessed
pub static FALLBACK_EXTENSION: &str = "jpg";

/// Length of the header inspected to guess a page format,
/// webp needs 12 bytes (`RIFF`, chunk size, `WEBP`)
pub static SIGNATURE_LENGTH: u64 = 12;

/// Guess a page extension from its leading bytes.
/// Only the formats a Cbz page is expected to use are recognized (jpeg, png, gif, and webp),
/// anything else falls back to `FALLBACK_EXTENSION`.
#[must_use]
pub fn extension_from_signature(header: &[u8]) -> &'static str {
    match image::guess_format(header) {
        Ok(ImageFormat::Jpeg) => "jpg",
        Ok(ImageFormat::Png) => "png",
        Ok(ImageFormat::Gif) => "gif",
        // Any RIFF container is reported as webp, the form type must be checked too
        Ok(ImageFormat::WebP) if header.get(8..12) == Some(&b"WEBP"[..]) => "webp",
        Ok(format) => {
            debug!("unsupported page format {format:?}");
            FALLBACK_EXTENSION
        }
        Err(_) => FALLBACK_EXTENSION,
    }
}

/// Read the first bytes of the file at `path` and guess its extension,
/// an unreadable file gets `FALLBACK_EXTENSION`
pub fn sniff_extension(path: impl AsRef<Path>) -> &'static str {
    let mut header = Vec::new();
    let read = File::open(path.as_ref()).and_then(|file| {
        file.take(SIGNATURE_LENGTH).read_to_end(&mut header)
    });

    match read {
        Ok(_) => extension_from_signature(&header),
        Err(err) => {
            debug!("couldn't read {:?} header: {err}", path.as_ref());
            FALLBACK_EXTENSION
        }
    }
}
