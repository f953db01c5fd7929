//! Upload file naming.
//!
//! Stored names look like `000042-my_dog.jpg`: a zero padded upload sequence
//! number, then the sanitized browser-supplied name.

use crate::error::{StorageError, StorageResult};

/// Extensions accepted as images (compared lowercase).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tif", "tiff"];

const MAX_NAME_LEN: usize = 100;
const FALLBACK_STEM: &str = "upload";

/// Lowercase extension of a file name, if any.
pub fn extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// True when the name ends in a known image extension.
pub fn is_image_name(name: &str) -> bool {
    extension(name).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Reduce a browser-supplied name to a safe single path component.
///
/// Directory parts are dropped, whitespace becomes `_`, anything outside
/// `[A-Za-z0-9._-]` is removed and leading dots are stripped. The extension
/// survives truncation.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");

    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            c if c.is_whitespace() => Some('_'),
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            _ => None,
        })
        .collect();

    let (stem, ext) = match cleaned.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => (stem, Some(ext)),
        _ => (cleaned.as_str(), None),
    };
    let stem = stem.trim_start_matches(['.', '_']);
    let stem = if stem.is_empty() { FALLBACK_STEM } else { stem };

    match ext {
        Some(ext) => {
            let keep = MAX_NAME_LEN.saturating_sub(ext.len() + 1).max(1);
            format!("{}.{}", truncate(&stem, keep), ext)
        }
        None => truncate(&stem, MAX_NAME_LEN).to_string(),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    // Sanitized names are ASCII, so byte slicing is safe.
    &s[..s.len().min(max)]
}

/// Stored name for upload number `seq`.
pub fn stored_name(seq: u64, original: &str) -> String {
    format!("{:06}-{}", seq, sanitize_file_name(original))
}

/// Split a stored name into its sequence number and sanitized original name.
pub fn parse_stored_name(name: &str) -> Option<(u64, &str)> {
    let (seq, rest) = name.split_once('-')?;
    if seq.is_empty() || !seq.bytes().all(|b| b.is_ascii_digit()) || rest.is_empty() {
        return None;
    }
    Some((seq.parse().ok()?, rest))
}

/// Check that `name` is a plain stored file name before touching the disk.
pub fn validate_stored_name(name: &str) -> StorageResult<()> {
    let plain = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
        && parse_stored_name(name).is_some();
    if plain {
        Ok(())
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_paths_and_symbols() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\My Dog!.JPG"), "My_Dog.JPG");
        assert_eq!(sanitize_file_name(".hidden.png"), "hidden.png");
        assert_eq!(sanitize_file_name("ÄÖÜ.png"), "upload.png");
        assert_eq!(sanitize_file_name(""), "upload");
    }

    #[test]
    fn test_sanitize_keeps_extension_when_truncating() {
        let long = format!("{}.jpeg", "a".repeat(300));
        let name = sanitize_file_name(&long);
        assert_eq!(name.len(), MAX_NAME_LEN);
        assert!(name.ends_with(".jpeg"));
    }

    #[test]
    fn test_image_extensions() {
        assert!(is_image_name("dog.JPG"));
        assert!(is_image_name("scan.tiff"));
        assert!(!is_image_name("notes.txt"));
        assert!(!is_image_name("png"));
        assert!(!is_image_name(".png"));
    }

    #[test]
    fn test_stored_name_round_trip() {
        let name = stored_name(7, "my dog.png");
        assert_eq!(name, "000007-my_dog.png");
        assert_eq!(parse_stored_name(&name), Some((7, "my_dog.png")));
        assert_eq!(parse_stored_name("dog.png"), None);
        assert_eq!(parse_stored_name("12-"), None);
    }

    #[test]
    fn test_validate_stored_name() {
        assert!(validate_stored_name("000001-dog.png").is_ok());
        assert!(validate_stored_name("../000001-dog.png").is_err());
        assert!(validate_stored_name("000001-a/b.png").is_err());
        assert!(validate_stored_name("dog.png").is_err());
    }
}
