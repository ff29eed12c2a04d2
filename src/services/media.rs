// ABOUTME: Upload naming, validation and storage on the local filesystem
// ABOUTME: Normalises stored upload references and builds their public URLs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use std::path::Path;

use chrono::{DateTime, Utc};
use cpoint_core::constants::uploads::{ALLOWED_EXTENSIONS, ALLOWED_SUBFOLDERS, UPLOADS_PREFIX};
use cpoint_core::errors::{AppError, AppResult};
use tokio::fs;
use tracing::info;

/// Reduce a client file name to ASCII letters, digits, `.`, `-` and `_`.
///
/// Spaces become `_`, path separators are dropped and leading dots are
/// stripped so the result can never name a hidden file or escape a directory.
#[must_use]
pub fn secure_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .trim()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            _ => None,
        })
        .collect();
    cleaned.trim_start_matches('.').to_owned()
}

/// Lowercase extension of a file name if it is an allowed upload type
#[must_use]
pub fn allowed_extension(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    let ext = ext.to_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Stored name `<stem>_<YYYYmmdd_HHMMSS>.<ext>`
///
/// # Errors
///
/// Returns `InvalidInput` for missing or disallowed extensions
pub fn stored_file_name(original: &str, now: DateTime<Utc>) -> AppResult<String> {
    let safe = secure_filename(original);
    let ext = allowed_extension(&safe)
        .ok_or_else(|| AppError::invalid_input(format!("File type not allowed: {original}")))?;
    let stem = safe
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .filter(|stem| !stem.is_empty())
        .unwrap_or("upload");
    Ok(format!("{stem}_{}.{ext}", now.format("%Y%m%d_%H%M%S")))
}

/// Validate an upload subfolder
///
/// # Errors
///
/// Returns `InvalidInput` for unknown subfolders
pub fn validate_subfolder(subfolder: &str) -> AppResult<&str> {
    ALLOWED_SUBFOLDERS
        .iter()
        .find(|allowed| **allowed == subfolder)
        .copied()
        .ok_or_else(|| AppError::invalid_input(format!("Unknown upload folder: {subfolder}")))
}

/// Write an upload under `<root>/<subfolder>/` and return its reference
/// `uploads/<subfolder>/<name>`.
///
/// # Errors
///
/// Returns `InvalidInput` for bad names or folders and `StorageError` when
/// the file cannot be written
pub async fn save_upload(
    root: &Path,
    subfolder: &str,
    original_name: &str,
    bytes: &[u8],
) -> AppResult<String> {
    let subfolder = validate_subfolder(subfolder)?;
    if bytes.is_empty() {
        return Err(AppError::invalid_input("Uploaded file is empty"));
    }
    let mut name = stored_file_name(original_name, Utc::now())?;
    let dir = root.join(subfolder);
    fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::storage(format!("Failed to create upload directory: {e}")))?;

    let mut counter = 1;
    while fs::try_exists(dir.join(&name)).await.unwrap_or(false) {
        let (stem, ext) = name.rsplit_once('.').unwrap_or((name.as_str(), ""));
        let stem = stem.split("__").next().unwrap_or(stem);
        name = format!("{stem}__{counter}.{ext}");
        counter += 1;
    }

    fs::write(dir.join(&name), bytes)
        .await
        .map_err(|e| AppError::storage(format!("Failed to store upload: {e}")))?;
    info!(subfolder, file = %name, size = bytes.len(), "Upload stored");
    Ok(format!("{UPLOADS_PREFIX}{subfolder}/{name}"))
}

/// Canonical form of an upload reference.
///
/// Absolute URLs pass through; `static/` and leading slashes are stripped and
/// the `uploads/` prefix is ensured. Blank input yields `None`.
#[must_use]
pub fn normalize_upload_reference(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return Some(trimmed.to_owned());
    }
    let path = trimmed.trim_start_matches('/');
    let path = path.strip_prefix("static/").unwrap_or(path);
    if path.starts_with(UPLOADS_PREFIX) {
        Some(path.to_owned())
    } else {
        Some(format!("{UPLOADS_PREFIX}{path}"))
    }
}

/// Absolute URL of an upload reference
#[must_use]
pub fn public_url(base_url: &str, reference: &str) -> String {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return reference.to_owned();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        reference.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_secure_filename() {
        assert_eq!(secure_filename("my photo.PNG"), "my_photo.PNG");
        assert_eq!(secure_filename("../../etc/passwd"), "passwd");
        assert_eq!(secure_filename("..hidden.jpg"), "hidden.jpg");
        assert_eq!(secure_filename("ünï©ode.gif"), "node.gif");
    }

    #[test]
    fn test_stored_file_name() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(
            stored_file_name("Beach Day.JPG", now).unwrap(),
            "Beach_Day_20250304_050607.jpg"
        );
        // a bare dotfile keeps no extension once the leading dot is stripped
        assert!(stored_file_name(".png", now).is_err());
        assert_eq!(
            stored_file_name("../Holiday.png", now).unwrap(),
            "Holiday_20250304_050607.png"
        );
        assert!(stored_file_name("script.exe", now).is_err());
        assert!(stored_file_name("noext", now).is_err());
    }

    #[test]
    fn test_validate_subfolder() {
        assert!(validate_subfolder("posts").is_ok());
        assert!(validate_subfolder("../secrets").is_err());
    }

    #[test]
    fn test_normalize_upload_reference() {
        assert_eq!(
            normalize_upload_reference("/static/uploads/posts/a.png").as_deref(),
            Some("uploads/posts/a.png")
        );
        assert_eq!(
            normalize_upload_reference("posts/a.png").as_deref(),
            Some("uploads/posts/a.png")
        );
        assert_eq!(
            normalize_upload_reference("https://cdn.example.com/a.png").as_deref(),
            Some("https://cdn.example.com/a.png")
        );
        assert_eq!(normalize_upload_reference("  "), None);
    }

    #[test]
    fn test_public_url() {
        assert_eq!(
            public_url("http://localhost:8081/", "uploads/posts/a.png"),
            "http://localhost:8081/uploads/posts/a.png"
        );
    }

    #[tokio::test]
    async fn test_save_upload_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let reference = save_upload(dir.path(), "posts", "pic.png", b"png-bytes")
            .await
            .unwrap();
        assert!(reference.starts_with("uploads/posts/pic_"));
        let name = reference.trim_start_matches("uploads/posts/");
        let stored = std::fs::read(dir.path().join("posts").join(name)).unwrap();
        assert_eq!(stored, b"png-bytes");
    }
}
