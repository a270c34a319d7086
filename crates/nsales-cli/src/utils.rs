//! Shared utilities

use anyhow::Context;
use chrono::{DateTime, Local, Utc};
use nsales_client::Attachment;
use std::path::Path;

/// Truncate a string to `max` characters, appending "..." if truncated.
/// Operates on Unicode char boundaries, not bytes.
pub fn truncate_chars(s: &str, max: usize) -> String {
    let mut chars = s.chars();
    let truncated: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

/// Guess a MIME type from the file extension
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("txt" | "log") => "text/plain",
        Some("md") => "text/markdown",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("pptx") => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        _ => "application/octet-stream",
    }
}

/// Read a file from disk as an upload
pub async fn load_attachment(path: &Path) -> anyhow::Result<Attachment> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(Attachment {
        name,
        mime_type: mime_for_path(path).to_string(),
        data,
    })
}

/// Format an instant in local time for listings
pub fn local_time(instant: &DateTime<Utc>) -> String {
    instant.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("안녕하세요", 2), "안녕...");
        assert_eq!(truncate_chars("hi", 5), "hi");
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("report.PDF")), "application/pdf");
        assert_eq!(mime_for_path(Path::new("a/b/photo.jpeg")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("noext")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_load_attachment_missing_file() {
        let err = load_attachment(Path::new("/nonexistent/nsales-test.bin"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nsales-test.bin"));
    }
}
