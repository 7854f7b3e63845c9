use once_cell::sync::Lazy;
use regex::Regex;

/// Recognized Google Drive share link shapes, tried in order. The first
/// capture group is the file id.
static DRIVE_LINK_PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"drive\.google\.com/file/d/([a-zA-Z0-9_-]+)").unwrap(),
        Regex::new(r"drive\.google\.com/uc\?export=view&id=([a-zA-Z0-9_-]+)").unwrap(),
        Regex::new(r"drive\.google\.com/open\?id=([a-zA-Z0-9_-]+)").unwrap(),
    ]
});

const THUMBNAIL_BASE_URL: &str = "https://drive.google.com/thumbnail";

/// Extract the Google Drive file id from a shareable link.
///
/// This is the only gate deciding whether a submitted link is usable; callers
/// must not attempt a write when it returns `None`.
pub fn extract_drive_file_id(url: &str) -> Option<String> {
    DRIVE_LINK_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(url)
            .and_then(|captures| captures.get(1))
            .map(|id| id.as_str().to_string())
    })
}

/// Thumbnail URL for a Drive file, derived from the file id alone.
pub fn thumbnail_url(file_id: &str) -> String {
    format!("{}?id={}", THUMBNAIL_BASE_URL, file_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_id_from_file_d_links() {
        let id = extract_drive_file_id("https://drive.google.com/file/d/ABC123/view?usp=sharing");
        assert_eq!(id.as_deref(), Some("ABC123"));
    }

    #[test]
    fn extracts_id_from_uc_export_links() {
        let id = extract_drive_file_id("https://drive.google.com/uc?export=view&id=xYz_-987");
        assert_eq!(id.as_deref(), Some("xYz_-987"));
    }

    #[test]
    fn extracts_id_from_open_links() {
        let id = extract_drive_file_id("https://drive.google.com/open?id=1a2B3c");
        assert_eq!(id.as_deref(), Some("1a2B3c"));
    }

    #[test]
    fn rejects_unrecognized_urls() {
        assert_eq!(extract_drive_file_id("https://example.com/file/d/ABC123"), None);
        assert_eq!(extract_drive_file_id("https://drive.google.com/drive/folders/ABC123"), None);
        assert_eq!(extract_drive_file_id("not a url at all"), None);
        assert_eq!(extract_drive_file_id(""), None);
    }

    #[test]
    fn id_stops_at_first_non_id_character() {
        let id = extract_drive_file_id("https://drive.google.com/file/d/ABC123/preview");
        assert_eq!(id.as_deref(), Some("ABC123"));
    }

    #[test]
    fn thumbnail_is_derived_from_file_id() {
        assert_eq!(
            thumbnail_url("ABC123"),
            "https://drive.google.com/thumbnail?id=ABC123"
        );
    }
}
