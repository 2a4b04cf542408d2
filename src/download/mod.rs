//! Artifact delivery.
//!
//! Two styles are supported: server-hosted files, which are streamed to disk
//! straight from their download URL, and inline content from a status
//! payload, which is kept in a [`BlobStore`] until released.

pub mod blob;

pub use blob::{Blob, BlobHandle, BlobStore};

use crate::error::{ClientError, ClientResult};
use futures::StreamExt;
use percent_encoding::percent_decode_str;
use reqwest::Url;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Generated document formats served by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Word,
    Markdown,
}

impl ArtifactKind {
    pub fn as_segment(self) -> &'static str {
        match self {
            ArtifactKind::Word => "word",
            ArtifactKind::Markdown => "markdown",
        }
    }

    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "word" => Some(ArtifactKind::Word),
            "markdown" => Some(ArtifactKind::Markdown),
            _ => None,
        }
    }
}

/// Absolute download URL of an artifact: `{base}/api/gender_book/download/{kind}/{filename}`
pub fn artifact_url(base: &str, kind: ArtifactKind, filename: &str) -> String {
    let base = base.trim_end_matches('/');
    if let Ok(mut url) = Url::parse(base) {
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["api", "gender_book", "download", kind.as_segment(), filename]);
        }
        if !url.cannot_be_a_base() {
            return url.to_string();
        }
    }
    format!(
        "{}/api/gender_book/download/{}/{}",
        base,
        kind.as_segment(),
        filename
    )
}

/// `report.pdf` + `_parsed` + `json` -> `report_parsed.json`
pub fn derived_filename(original: &str, suffix: &str, extension: &str) -> String {
    let name = Path::new(original)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| original.to_string());
    let stem = match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name.as_str(),
    };
    format!("{}{}.{}", stem, suffix, extension)
}

/// Read the filename out of a `Content-Disposition` header value
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    for part in header.split(';').map(str::trim) {
        if let Some(encoded) = part.strip_prefix("filename*=") {
            let encoded = encoded
                .split_once("''")
                .map(|(_, value)| value)
                .unwrap_or(encoded);
            let decoded = percent_decode_str(encoded.trim_matches('"')).decode_utf8();
            if let Ok(decoded) = decoded {
                if !decoded.is_empty() {
                    return Some(decoded.into_owned());
                }
            }
        } else if let Some(value) = part.strip_prefix("filename=") {
            plain = Some(value.trim_matches('"').to_string());
        }
    }
    plain.filter(|name| !name.is_empty())
}

/// Stream a server-hosted file into `dest_dir` without buffering it in memory.
///
/// Only the final path component of `filename` is used.
pub async fn download_to_file(
    http: &reqwest::Client,
    url: &str,
    dest_dir: &Path,
    filename: &str,
) -> ClientResult<PathBuf> {
    let name = Path::new(filename)
        .file_name()
        .ok_or_else(|| ClientError::Validation(format!("Invalid file name: {}", filename)))?;
    let dest = dest_dir.join(name);

    tracing::debug!(url, dest = %dest.display(), "downloading artifact");

    let response = http
        .get(url)
        .send()
        .await
        .map_err(ClientError::from_reqwest)?;
    if !response.status().is_success() {
        return Err(crate::client::error_from_response(response, "Download failed").await);
    }

    tokio::fs::create_dir_all(dest_dir).await?;
    let mut partial_name = name.to_os_string();
    partial_name.push(".part");
    let partial = dest_dir.join(partial_name);

    let written = match stream_to_file(response, &partial).await {
        Ok(written) => written,
        Err(e) => {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                tracing::warn!(path = %partial.display(), error = %cleanup, "failed to remove partial download");
            }
            return Err(e);
        }
    };
    tokio::fs::rename(&partial, &dest).await?;

    tracing::info!(dest = %dest.display(), bytes = written, "artifact downloaded");
    Ok(dest)
}

/// Write the response body to `path`, returning the number of bytes written
async fn stream_to_file(response: reqwest::Response, path: &Path) -> ClientResult<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ClientError::from_reqwest)?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}
