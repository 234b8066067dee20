//! Resume document intake: data-URI decoding, media type inference, text extraction.

use std::panic::{self, AssertUnwindSafe};

use base64::{engine::general_purpose, Engine as _};
use tracing::warn;

use crate::triage::models::{ResumeDocument, TriageError};

/// Decodes a `data:<mime>;base64,<payload>` URI into a document for batch slot `index`.
pub fn decode_data_uri(index: usize, uri: &str) -> Result<ResumeDocument, TriageError> {
    let rest = uri
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| TriageError::precondition(Some(index), "resume is not a data URI"))?;

    let (header, payload) = rest.split_once(',').ok_or_else(|| {
        TriageError::precondition(Some(index), "data URI has no payload separator")
    })?;

    let media_type = header.strip_suffix(";base64").ok_or_else(|| {
        TriageError::precondition(Some(index), "data URI must be base64-encoded")
    })?;
    // Parameters such as `;charset=utf-8` are not part of the media type.
    let media_type = media_type.split(';').next().unwrap_or_default().trim();

    let content = general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| TriageError::precondition(Some(index), format!("invalid base64 payload: {e}")))?;

    Ok(ResumeDocument::new(media_type, content))
}

/// Best-effort media type for an uploaded file name.
pub fn media_type_for_filename(filename: &str) -> Option<&'static str> {
    let extension = std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())?
        .to_ascii_lowercase();
    match extension.as_str() {
        "pdf" => Some("application/pdf"),
        "doc" => Some("application/msword"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        "txt" => Some("text/plain"),
        "md" => Some("text/markdown"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

/// Plain-text rendition of a resume for prompts that can't take the raw document.
/// Never fails: unreadable content is described instead.
pub fn extract_text(doc: &ResumeDocument) -> String {
    let media_type = doc.media_type.to_ascii_lowercase();

    if media_type.starts_with("text/") {
        return String::from_utf8_lossy(&doc.content).trim().to_string();
    }

    if media_type == "application/pdf" {
        // pdf-extract panics on some malformed files.
        let extracted =
            panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(&doc.content)));
        match extracted {
            Ok(Ok(text)) if !text.trim().is_empty() => return text.trim().to_string(),
            Ok(Ok(_)) => warn!("PDF resume contained no extractable text"),
            Ok(Err(e)) => warn!("PDF text extraction failed: {e}"),
            Err(_) => warn!("PDF text extraction panicked"),
        }
    }

    describe(doc)
}

fn describe(doc: &ResumeDocument) -> String {
    format!("[{} document, {} bytes]", doc.media_type, doc.content.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_pdf_data_uri() {
        let doc = decode_data_uri(0, "data:application/pdf;base64,JVBERg==").unwrap();
        assert_eq!(doc.media_type, "application/pdf");
        assert_eq!(&doc.content[..], b"%PDF");
    }

    #[test]
    fn test_decode_strips_media_type_parameters() {
        let doc = decode_data_uri(1, "data:text/plain;charset=utf-8;base64,SmFuZQ==").unwrap();
        assert_eq!(doc.media_type, "text/plain");
        assert_eq!(&doc.content[..], b"Jane");
    }

    #[test]
    fn test_decode_rejects_non_data_uri_with_index() {
        let err = decode_data_uri(3, "https://example.com/cv.pdf").unwrap_err();
        assert!(matches!(err, TriageError::Precondition { index: Some(3), .. }));
    }

    #[test]
    fn test_decode_rejects_non_base64_encoding() {
        let err = decode_data_uri(0, "data:text/plain,hello").unwrap_err();
        assert!(err.to_string().contains("base64"));
    }

    #[test]
    fn test_decode_rejects_bad_payload() {
        assert!(decode_data_uri(0, "data:text/plain;base64,@@@").is_err());
    }

    #[test]
    fn test_decode_keeps_empty_media_type_for_scorer_to_reject() {
        let doc = decode_data_uri(0, "data:;base64,SmFuZQ==").unwrap();
        assert!(doc.media_type.is_empty());
    }

    #[test]
    fn test_media_type_for_filename() {
        assert_eq!(media_type_for_filename("cv.PDF"), Some("application/pdf"));
        assert_eq!(media_type_for_filename("notes.txt"), Some("text/plain"));
        assert_eq!(media_type_for_filename("archive.zip"), None);
        assert_eq!(media_type_for_filename("README"), None);
    }

    #[test]
    fn test_extract_text_from_plain_text() {
        let doc = ResumeDocument::new("text/plain", &b"  Jane Doe\nRust engineer  "[..]);
        assert_eq!(extract_text(&doc), "Jane Doe\nRust engineer");
    }

    #[test]
    fn test_extract_text_describes_unreadable_content() {
        let doc = ResumeDocument::new("application/msword", vec![0u8; 12]);
        assert_eq!(extract_text(&doc), "[application/msword document, 12 bytes]");
    }

    #[test]
    fn test_extract_text_falls_back_on_corrupt_pdf() {
        let doc = ResumeDocument::new("application/pdf", &b"not a pdf"[..]);
        assert_eq!(extract_text(&doc), "[application/pdf document, 9 bytes]");
    }
}
