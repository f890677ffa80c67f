//! Snapshot storage path derivation

use std::path::{Path, PathBuf};

use snapfarm_ipc::TaskRequest;

/// Known capture extensions; anything else gets one appended
const CAPTURE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "gif", "png", "pdf"];

/// Where a snapshot is written and how its location is reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    /// Absolute-ish destination under the storage base
    pub full: PathBuf,
    /// Path reported back to the caller, relative to the base
    pub relative: String,
}

/// Derive the storage location for a snapshot task.
///
/// Uses the request's explicit `storage_path` when present, otherwise a
/// URL-encoded rendition of the URL itself (percent signs stripped so the
/// name stays filesystem-friendly). A recognized capture extension is kept
/// as-is; otherwise one is appended from the request's `format`, falling
/// back to `.jpg`.
pub fn storage_paths(base: &Path, request: &TaskRequest) -> StoragePaths {
    let mut relative = match request.storage_path.as_deref() {
        Some(path) if !path.is_empty() => path.to_string(),
        _ => url::form_urlencoded::byte_serialize(request.url.as_bytes())
            .collect::<String>()
            .replace('%', ""),
    };

    if !has_capture_extension(&relative) {
        match request.format.as_deref().and_then(normalize_format) {
            Some(ext) => {
                relative.push('.');
                relative.push_str(ext);
            }
            None => relative.push_str(".jpg"),
        }
    }

    let relative = relative.trim_start_matches('/').to_string();
    StoragePaths {
        full: base.join(&relative),
        relative,
    }
}

fn has_capture_extension(path: &str) -> bool {
    let Some((_, ext)) = path.rsplit_once('.') else {
        return false;
    };
    CAPTURE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known))
}

/// Accept `jpg` or `.jpg` (any case); reject anything unrecognized
fn normalize_format(format: &str) -> Option<&str> {
    let trimmed = format.strip_prefix('.').unwrap_or(format);
    CAPTURE_EXTENSIONS
        .iter()
        .any(|known| trimmed.eq_ignore_ascii_case(known))
        .then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str, storage_path: Option<&str>, format: Option<&str>) -> TaskRequest {
        let mut req = TaskRequest::for_url(url);
        req.storage_path = storage_path.map(str::to_string);
        req.format = format.map(str::to_string);
        req
    }

    #[test]
    fn test_explicit_path_with_extension_kept() {
        let paths = storage_paths(
            Path::new("/var/snapshots"),
            &request("http://example.com/", Some("shots/home.PNG"), None),
        );
        assert_eq!(paths.relative, "shots/home.PNG");
        assert_eq!(paths.full, PathBuf::from("/var/snapshots/shots/home.PNG"));
    }

    #[test]
    fn test_format_supplies_missing_extension() {
        let paths = storage_paths(
            Path::new("/srv"),
            &request("http://example.com/", Some("home"), Some("pdf")),
        );
        assert_eq!(paths.relative, "home.pdf");

        // Leading dot tolerated
        let paths = storage_paths(
            Path::new("/srv"),
            &request("http://example.com/", Some("home"), Some(".png")),
        );
        assert_eq!(paths.relative, "home.png");
    }

    #[test]
    fn test_unknown_format_falls_back_to_jpg() {
        let paths = storage_paths(
            Path::new("/srv"),
            &request("http://example.com/", Some("home"), Some("bmp")),
        );
        assert_eq!(paths.relative, "home.jpg");
    }

    #[test]
    fn test_path_derived_from_url_when_absent() {
        let paths = storage_paths(
            Path::new("/srv"),
            &request("http://example.com/a", None, None),
        );
        // URL-encoded with percent signs stripped, extension appended
        assert_eq!(paths.relative, "http3A2F2Fexample.com2Fa.jpg");
        assert_eq!(paths.full, PathBuf::from("/srv/http3A2F2Fexample.com2Fa.jpg"));
    }

    #[test]
    fn test_leading_slashes_trimmed_from_relative() {
        let paths = storage_paths(
            Path::new("/srv"),
            &request("http://example.com/", Some("/nested/shot.jpg"), None),
        );
        assert_eq!(paths.relative, "nested/shot.jpg");
        assert_eq!(paths.full, PathBuf::from("/srv/nested/shot.jpg"));
    }
}
