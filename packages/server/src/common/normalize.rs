//! Canonicalization helpers for dedup keys.
//!
//! `normalize_website_url` produces the key that makes two raw URLs resolve
//! to the same business; `normalize_label` does the same for free-text labels
//! (industries, keywords). Both are pure and total: bad input yields an empty
//! string, never an error.

/// Reduce a raw website URL to its canonical comparable form.
///
/// Lowercases, strips `http(s)://` and a leading `www.`, truncates at the
/// first `?` or `#`, and strips trailing slashes. Path segments are kept, so
/// `https://www.Example.com/About/` becomes `example.com/about`.
pub fn normalize_website_url(url: &str) -> String {
    let url = url.trim().to_lowercase();
    let url = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url.as_str());
    let url = url.strip_prefix("www.").unwrap_or(url);
    // Drop query string and fragment
    let url = url.split('?').next().unwrap_or(url);
    let url = url.split('#').next().unwrap_or(url);
    url.trim_end_matches('/').to_string()
}

/// Reduce a free-text label to its comparable form: trimmed, internal
/// whitespace collapsed, lowercased. Canonical storage keeps the first-seen
/// original casing; this is only the lookup key.
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_website_url_strips_scheme_and_www() {
        assert_eq!(normalize_website_url("https://www.example.com"), "example.com");
        assert_eq!(normalize_website_url("http://example.com"), "example.com");
        assert_eq!(normalize_website_url("www.example.com"), "example.com");
        assert_eq!(normalize_website_url("example.com"), "example.com");
    }

    #[test]
    fn test_normalize_website_url_drops_query_and_fragment() {
        assert_eq!(normalize_website_url("example.com?ref=x"), "example.com");
        assert_eq!(normalize_website_url("example.com/?utm_source=test"), "example.com");
        assert_eq!(normalize_website_url("example.com/page#section"), "example.com/page");
    }

    #[test]
    fn test_normalize_website_url_keeps_path_lowercased() {
        assert_eq!(
            normalize_website_url("https://www.Example.com/About/"),
            "example.com/about"
        );
    }

    #[test]
    fn test_normalize_website_url_equivalence_class() {
        // All of these must resolve to the same business key.
        let variants = [
            "https://www.Example.com/",
            "http://example.com",
            "example.com?ref=x",
            "EXAMPLE.COM///",
            "  https://example.com#top  ",
        ];
        for raw in variants {
            assert_eq!(normalize_website_url(raw), "example.com", "raw: {raw}");
        }
    }

    #[test]
    fn test_normalize_website_url_is_total() {
        assert_eq!(normalize_website_url(""), "");
        assert_eq!(normalize_website_url("   "), "");
        assert_eq!(normalize_website_url("https://"), "");
        assert_eq!(normalize_website_url("http://www./"), "");
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  Health   Care "), "health care");
        assert_eq!(normalize_label("HEALTH CARE"), normalize_label("health care"));
        assert_eq!(normalize_label(""), "");
    }
}
