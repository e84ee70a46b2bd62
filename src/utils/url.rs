//! Endpoint URL helpers.

/// Strip trailing slashes so endpoints can be appended without doubling them.
///
/// ```
/// use jarvis::utils::url::normalize_base_url;
///
/// assert_eq!(
///     normalize_base_url("https://generativelanguage.googleapis.com/v1beta/"),
///     "https://generativelanguage.googleapis.com/v1beta"
/// );
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Join a base URL and an endpoint path with exactly one slash.
///
/// ```
/// use jarvis::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://example.test/v1beta/", "/models/m:generateContent"),
///     "https://example.test/v1beta/models/m:generateContent"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{normalized_base}/{endpoint}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_every_trailing_slash() {
        assert_eq!(
            normalize_base_url("https://example.test/v1beta///"),
            "https://example.test/v1beta"
        );
        assert_eq!(
            normalize_base_url(" https://example.test "),
            "https://example.test"
        );
        assert_eq!(normalize_base_url("///"), "");
    }

    #[test]
    fn construct_handles_slashes_on_both_sides() {
        assert_eq!(
            construct_api_url("https://example.test/v1beta", "models/x:generateContent"),
            "https://example.test/v1beta/models/x:generateContent"
        );
        assert_eq!(
            construct_api_url("https://example.test/v1beta//", "//models"),
            "https://example.test/v1beta/models"
        );
    }
}
