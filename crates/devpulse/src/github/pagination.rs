//! `Link` header handling for paginated list endpoints.

/// Extract the `rel="next"` URL from a `Link` header value.
///
/// The header is a comma-separated list of `<url>; rel="name"` entries.
/// Returns `None` for a missing or empty header, or when no entry is
/// labelled `next`.
pub fn parse_next_page_url(link_header: Option<&str>) -> Option<String> {
    let link_header = link_header?;

    for part in link_header.split(',') {
        let mut url = None;
        let mut is_next = false;

        for segment in part.split(';') {
            let segment = segment.trim();
            if segment.starts_with('<') && segment.ends_with('>') && segment.len() > 2 {
                url = Some(&segment[1..segment.len() - 1]);
            } else if let Some(rel_value) = segment.strip_prefix("rel=") {
                is_next = rel_value
                    .trim_matches('"')
                    .split_whitespace()
                    .any(|rel| rel == "next");
            }
        }

        if is_next && let Some(url) = url {
            return Some(url.to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEXT: &str = "https://api.github.com/user/repos?per_page=100&page=2";
    const LAST: &str = "https://api.github.com/user/repos?per_page=100&page=5";
    const PREV: &str = "https://api.github.com/user/repos?per_page=100&page=1";

    #[test]
    fn finds_next_among_other_relations() {
        let header = format!(r#"<{PREV}>; rel="prev", <{NEXT}>; rel="next", <{LAST}>; rel="last""#);
        assert_eq!(parse_next_page_url(Some(&header)).as_deref(), Some(NEXT));
    }

    #[test]
    fn ignores_prev_and_last() {
        let header = format!(r#"<{PREV}>; rel="prev", <{LAST}>; rel="last""#);
        assert_eq!(parse_next_page_url(Some(&header)), None);
    }

    #[test]
    fn missing_or_empty_header_has_no_next() {
        assert_eq!(parse_next_page_url(None), None);
        assert_eq!(parse_next_page_url(Some("")), None);
        assert_eq!(parse_next_page_url(Some("   ")), None);
    }

    #[test]
    fn next_as_only_entry() {
        let header = format!(r#"<{NEXT}>; rel="next""#);
        assert_eq!(parse_next_page_url(Some(&header)).as_deref(), Some(NEXT));
    }

    #[test]
    fn tolerates_missing_space_after_semicolon() {
        let header = format!(r#"<{NEXT}>;rel="next""#);
        assert_eq!(parse_next_page_url(Some(&header)).as_deref(), Some(NEXT));
    }

    #[test]
    fn does_not_match_relations_that_only_contain_next() {
        let header = format!(r#"<{LAST}>; rel="nextish""#);
        assert_eq!(parse_next_page_url(Some(&header)), None);
    }
}
