use std::path::{Component, Path};

use crate::TransferError;

/// Validates that a content-store data path stays inside the store root.
///
/// Rejects:
/// - Empty paths
/// - Absolute paths (Unix `/` or Windows `C:\`)
/// - Parent directory traversal (`..`)
/// - Windows prefix components (`C:`, `\\server`)
pub fn validate_data_path(data_path: &str) -> Result<(), TransferError> {
    if data_path.is_empty() {
        return Err(TransferError::InvalidPath("empty path".into()));
    }

    let path = Path::new(data_path);
    if path.is_absolute() {
        return Err(TransferError::InvalidPath(format!(
            "absolute path not allowed: {data_path}"
        )));
    }

    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(TransferError::InvalidPath(format!(
                    "parent directory traversal not allowed: {data_path}"
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(TransferError::InvalidPath(format!(
                    "absolute path not allowed: {data_path}"
                )));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    Ok(())
}

/// Validates an identifier used as a single path component
/// (store id, root hash).
pub fn validate_segment(value: &str) -> Result<(), TransferError> {
    if value.is_empty() || value == "." || value == ".." {
        return Err(TransferError::InvalidPath(format!(
            "invalid identifier: {value:?}"
        )));
    }
    if value.contains(['/', '\\']) || value.chars().any(char::is_control) {
        return Err(TransferError::InvalidPath(format!(
            "identifier must be a single path component: {value:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_path() {
        assert!(validate_data_path("").is_err());
    }

    #[test]
    fn rejects_parent_dir_traversal() {
        assert!(validate_data_path("../../../etc/passwd").is_err());
        assert!(validate_data_path("data/../../escape").is_err());
        assert!(validate_data_path("..").is_err());
    }

    #[test]
    fn rejects_absolute_unix_path() {
        assert!(validate_data_path("/tmp/malicious").is_err());
    }

    #[test]
    fn accepts_content_addressed_layout() {
        assert!(validate_data_path("data/ab/cd/abcdef").is_ok());
        assert!(validate_data_path("./data/ab").is_ok());
    }

    #[test]
    fn segment_rules() {
        assert!(validate_segment("a1b2").is_ok());
        assert!(validate_segment("").is_err());
        assert!(validate_segment("..").is_err());
        assert!(validate_segment("a/b").is_err());
        assert!(validate_segment("a\\b").is_err());
    }
}
