//! Upload content hashing and naming

use sha2::{Digest, Sha256};
use std::path::Path;

/// Hex encoded SHA-256 of file content
///
/// # Examples
///
/// ```
/// use ferry::adapters::target::upload::content_checksum;
///
/// let checksum = content_checksum(b"hello");
/// assert_eq!(checksum.len(), 64);
/// ```
pub fn content_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    format!("{result:x}")
}

/// Storage file name of an upload: its checksum plus the original extension
pub fn stored_file_name(checksum: &str, original_filename: &str) -> String {
    match Path::new(original_filename)
        .extension()
        .and_then(|ext| ext.to_str())
    {
        Some(ext) if !ext.is_empty() => format!("{checksum}.{}", ext.to_lowercase()),
        _ => checksum.to_string(),
    }
}

/// Original file name to record for an upload
///
/// Falls back to the last component of `path` when no name is given.
pub fn original_filename(path: &Path, filename: &str) -> String {
    let trimmed = filename.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_deterministic() {
        assert_eq!(content_checksum(b"abc"), content_checksum(b"abc"));
        assert_ne!(content_checksum(b"abc"), content_checksum(b"abd"));
        assert_eq!(
            content_checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_stored_file_name_keeps_extension() {
        assert_eq!(stored_file_name("abc", "Photo.PNG"), "abc.png");
        assert_eq!(stored_file_name("abc", "README"), "abc");
    }

    #[test]
    fn test_original_filename_fallback() {
        assert_eq!(original_filename(Path::new("/a/b/c.txt"), ""), "c.txt");
        assert_eq!(original_filename(Path::new("/a/b/c.txt"), "d.txt"), "d.txt");
    }
}
