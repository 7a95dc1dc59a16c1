//! MIME type detection for stored files.
//!
//! Detection is best-effort and always runs against the file as written to disk. Magic-byte
//! sniffing is delegated to `infer`; text content that `infer` does not recognise falls back
//! to a few cheap checks (SVG, RFC 822 mail, plain text).

use crate::{FilesError, FilesResult};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Bytes inspected by the text fallbacks.
const SNIFF_LEN: u64 = 8192;

/// Header names that mark the start of an RFC 822 message.
const MAIL_HEADERS: &[&str] = &[
    "return-path:",
    "received:",
    "delivered-to:",
    "message-id:",
    "mime-version:",
    "from:",
];

/// Detects the MIME type of a file on disk.
pub trait MimeDetector {
    /// Returns a bare MIME type (`type/subtype`) with any parameters removed.
    fn detect(&self, path: &Path) -> FilesResult<String>;
}

/// Default detector built on the `infer` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct InferMimeDetector;

impl MimeDetector for InferMimeDetector {
    fn detect(&self, path: &Path) -> FilesResult<String> {
        if !path.is_file() {
            return Err(FilesError::NotFound(path.to_path_buf()));
        }

        let detected = infer::get_from_path(path)?.map(|kind| strip_parameters(kind.mime_type()));
        if let Some(mime) = &detected {
            if !mime.starts_with("text/") {
                return Ok(mime.clone());
            }
        }

        let mut sample = Vec::new();
        fs::File::open(path)?
            .take(SNIFF_LEN)
            .read_to_end(&mut sample)?;

        // `infer` reports SVG as generic XML; prefer the more specific answer.
        Ok(match (sniff_text(&sample), detected) {
            ("text/plain", Some(mime)) => mime,
            (sniffed, _) => sniffed.to_owned(),
        })
    }
}

/// Removes parameters such as `; charset=binary` from a raw MIME string.
pub fn strip_parameters(raw: &str) -> String {
    raw.split(';').next().unwrap_or_default().trim().to_owned()
}

fn sniff_text(sample: &[u8]) -> &'static str {
    if sample.is_empty() {
        return "application/x-empty";
    }

    let text = match std::str::from_utf8(sample) {
        Ok(text) => text,
        // A multi-byte character cut off by the sample boundary is still text.
        Err(e) if e.error_len().is_none() => {
            std::str::from_utf8(&sample[..e.valid_up_to()]).unwrap_or_default()
        }
        Err(_) => return "application/octet-stream",
    };

    if text.contains('\0') {
        return "application/octet-stream";
    }

    let head = text.trim_start().to_ascii_lowercase();
    if head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg")) {
        return "image/svg+xml";
    }

    if MAIL_HEADERS.iter().any(|header| head.starts_with(header)) {
        return "message/rfc822";
    }

    "text/plain"
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn detect_bytes(content: &[u8]) -> String {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("probe");
        fs::write(&path, content).unwrap();
        InferMimeDetector.detect(&path).unwrap()
    }

    #[test]
    fn test_strip_parameters() {
        assert_eq!(strip_parameters("text/plain; charset=us-ascii"), "text/plain");
        assert_eq!(strip_parameters("image/png"), "image/png");
        assert_eq!(strip_parameters("  application/pdf ;"), "application/pdf");
    }

    #[test]
    fn test_detect_png() {
        let png_header = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(detect_bytes(&png_header), "image/png");
    }

    #[test]
    fn test_detect_pdf() {
        assert_eq!(detect_bytes(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n"), "application/pdf");
    }

    #[test]
    fn test_detect_plain_text() {
        assert_eq!(detect_bytes(b"just some notes\n"), "text/plain");
    }

    #[test]
    fn test_detect_svg() {
        let svg = b"<?xml version=\"1.0\"?>\n<svg xmlns=\"http://www.w3.org/2000/svg\"></svg>";
        assert_eq!(detect_bytes(svg), "image/svg+xml");
    }

    #[test]
    fn test_detect_email() {
        let mail = b"Return-Path: <a@example.com>\r\nFrom: a@example.com\r\nSubject: hi\r\n\r\nbody";
        assert_eq!(detect_bytes(mail), "message/rfc822");
    }

    #[test]
    fn test_detect_empty_and_binary() {
        assert_eq!(detect_bytes(b""), "application/x-empty");
        assert_eq!(detect_bytes(&[0x00, 0xFF, 0xFE, 0x01]), "application/octet-stream");
    }

    #[test]
    fn test_detect_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = InferMimeDetector.detect(&temp.path().join("missing"));
        assert!(matches!(result, Err(FilesError::NotFound(_))));
    }
}
