use percent_encoding::percent_decode_str;

use crate::api::API_V1_PREFIX;

/// Splits a request path below `/api/v1` into percent-decoded segments.
/// Returns `None` for paths outside the versioned API.
pub fn api_segments(path: &str) -> Option<Vec<String>> {
    let rest = path.strip_prefix(API_V1_PREFIX)?;
    if !(rest.is_empty() || rest.starts_with('/')) {
        return None;
    }
    Some(
        rest.split('/')
            .filter(|s| !s.is_empty())
            .map(|s| percent_decode_str(s).decode_utf8_lossy().to_string())
            .collect(),
    )
}

/// Extracts `{username}` from `/api/v1/kids/{username}/...`.
pub fn kid_username_from_path(path: &str) -> Option<String> {
    let segs = api_segments(path)?;
    match segs.as_slice() {
        [kids, username, ..] if kids == "kids" => Some(username.clone()),
        _ => None,
    }
}
