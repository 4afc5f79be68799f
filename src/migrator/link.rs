use regex::Regex;
use std::sync::LazyLock;

/// Pre-compiled patterns for share-link parsing
struct Patterns {
    // ...uc?export=view&id=<ID>&...
    query_id: Regex,
    // .../file/d/<ID>/view
    path_id: Regex,
}

impl Patterns {
    fn new() -> Self {
        Self {
            query_id: Regex::new(r"[?&]id=([^&#]+)").expect("Invalid query_id regex"),
            path_id: Regex::new(r"/file/d/([^/?#]+)").expect("Invalid path_id regex"),
        }
    }
}

static PATTERNS: LazyLock<Patterns> = LazyLock::new(Patterns::new);

/// Classification of a record's image reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareLink {
    /// No host marker, the reference is left alone
    NotRemote,
    /// Host marker present but no file id could be derived
    Unextractable,
    /// A drive-style link with its opaque file id
    Remote { file_id: String },
}

impl ShareLink {
    /// Classify an image reference against the remote host marker
    pub fn classify(image: &str, host_marker: &str) -> Self {
        if host_marker.is_empty() || !image.contains(host_marker) {
            return Self::NotRemote;
        }

        match extract_file_id(image) {
            Some(file_id) => Self::Remote {
                file_id: file_id.to_string(),
            },
            None => Self::Unextractable,
        }
    }

    pub fn file_id(&self) -> Option<&str> {
        match self {
            Self::Remote { file_id } => Some(file_id),
            _ => None,
        }
    }
}

/// Extract the file id from a share link.
///
/// The query form (`?id=<ID>` or `&id=<ID>`) is tried before the path form
/// (`/file/d/<ID>`).
/// The token is returned verbatim, its shape is not checked.
pub fn extract_file_id(url: &str) -> Option<&str> {
    PATTERNS
        .query_id
        .captures(url)
        .or_else(|| PATTERNS.path_id.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
