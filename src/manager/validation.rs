//! Local input checks. Everything here runs before any request is issued.

use crate::client::types::UploadFile;
use crate::error::{ClientError, ClientResult};
use serde_json::Value;

pub const JSON_EXTENSIONS: &[&str] = &[".json"];
pub const TENDER_SOURCE_EXTENSIONS: &[&str] = &[".pdf", ".docx"];
pub const PARSER_EXTENSIONS: &[&str] = &[".pdf", ".docx", ".doc", ".txt", ".md"];

/// Shortest free-text input accepted
pub const MIN_TEXT_CHARS: usize = 10;

pub fn require_file(file: Option<UploadFile>) -> ClientResult<UploadFile> {
    file.ok_or_else(|| ClientError::Validation("Please select a file first".to_string()))
}

/// Case-insensitive extension check
pub fn require_extension(file_name: &str, allowed: &[&str]) -> ClientResult<()> {
    let lower = file_name.to_lowercase();
    if allowed.iter().any(|ext| lower.ends_with(ext)) {
        return Ok(());
    }
    Err(ClientError::Validation(format!(
        "Unsupported file type: {} (expected {})",
        file_name,
        allowed.join(", ")
    )))
}

pub fn require_size(file: &UploadFile, max_bytes: u64) -> ClientResult<()> {
    if file.bytes.is_empty() {
        return Err(ClientError::Validation(format!("{} is empty", file.file_name)));
    }
    if file.size() > max_bytes {
        return Err(ClientError::Validation(format!(
            "{} is too large ({} bytes, limit {} bytes)",
            file.file_name,
            file.size(),
            max_bytes
        )));
    }
    Ok(())
}

/// Trimmed text with at least `min_chars` characters
pub fn require_text(text: &str, min_chars: usize) -> ClientResult<&str> {
    let trimmed = text.trim();
    if trimmed.chars().count() < min_chars {
        return Err(ClientError::Validation(format!(
            "Please enter at least {} characters",
            min_chars
        )));
    }
    Ok(trimmed)
}

/// Validate a selected file in one go
pub fn check_upload(file: Option<UploadFile>, allowed: &[&str], max_bytes: u64) -> ClientResult<UploadFile> {
    let file = require_file(file)?;
    require_extension(&file.file_name, allowed)?;
    require_size(&file, max_bytes)?;
    Ok(file)
}

pub fn parse_json_file(file: &UploadFile) -> ClientResult<Value> {
    let text = std::str::from_utf8(&file.bytes).map_err(|_| {
        ClientError::Validation(format!("{} is not UTF-8 encoded", file.file_name))
    })?;
    serde_json::from_str(text)
        .map_err(|e| ClientError::Validation(format!("{} is not valid JSON: {}", file.file_name, e)))
}

/// A tender document must be a JSON object with non-empty `content`
pub fn require_tender_document(document: &Value) -> ClientResult<()> {
    let content = document
        .as_object()
        .and_then(|obj| obj.get("content"))
        .ok_or_else(|| {
            ClientError::Validation("Tender document JSON is missing the content field".to_string())
        })?;

    let empty = match content {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if empty {
        return Err(ClientError::Validation("Tender document content is empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_selection_is_rejected() {
        assert!(require_file(None).unwrap_err().is_validation());
    }

    #[test]
    fn test_extension_check_is_case_insensitive() {
        assert!(require_extension("TENDER.JSON", JSON_EXTENSIONS).is_ok());
        assert!(require_extension("scan.png", JSON_EXTENSIONS).is_err());
        assert!(require_extension("rfp.docx", TENDER_SOURCE_EXTENSIONS).is_ok());
        assert!(require_extension("rfp.doc", TENDER_SOURCE_EXTENSIONS).is_err());
        assert!(require_extension("notes.md", PARSER_EXTENSIONS).is_ok());
    }

    #[test]
    fn test_text_length_counts_characters() {
        assert!(require_text("   short   ", MIN_TEXT_CHARS).is_err());
        assert!(require_text("  招标项目需求描述内容  ", MIN_TEXT_CHARS).is_ok());
        assert!(require_text("招标项目需求描述内", MIN_TEXT_CHARS).unwrap_err().is_validation());
        assert_eq!(require_text(" 0123456789 ", MIN_TEXT_CHARS).unwrap(), "0123456789");
    }

    #[test]
    fn test_size_limits() {
        let file = UploadFile::new("a.json", vec![b'x'; 11]);
        assert!(require_size(&file, 10).is_err());
        assert!(require_size(&file, 11).is_ok());
        assert!(require_size(&UploadFile::new("a.json", Vec::new()), 10).is_err());
    }

    #[test]
    fn test_check_upload_order() {
        let err = check_upload(Some(UploadFile::new("a.png", Vec::new())), JSON_EXTENSIONS, 10).unwrap_err();
        assert!(err.user_message().contains("Unsupported file type"));
    }

    #[test]
    fn test_parse_json_file() {
        let ok = UploadFile::new("a.json", br#"{"content": ["x"]}"#.to_vec());
        assert_eq!(parse_json_file(&ok).unwrap(), json!({"content": ["x"]}));

        let bad = UploadFile::new("a.json", b"{not json".to_vec());
        assert!(parse_json_file(&bad).unwrap_err().is_validation());

        let binary = UploadFile::new("a.json", vec![0xff, 0xfe]);
        assert!(parse_json_file(&binary).unwrap_err().is_validation());
    }

    #[test]
    fn test_tender_document_content() {
        assert!(require_tender_document(&json!({"content": ["section"]})).is_ok());
        assert!(require_tender_document(&json!({"content": []})).is_err());
        assert!(require_tender_document(&json!({"content": "  "})).is_err());
        assert!(require_tender_document(&json!({"title": "x"})).is_err());
        assert!(require_tender_document(&json!([1, 2])).is_err());
    }
}
