//! Utility functions and helpers

/// Trim links and drop blank entries, keeping order and duplicates
pub fn normalize_links<I, S>(links: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    links
        .into_iter()
        .map(|l| l.as_ref().trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Split a CNL style text blob (CR, LF or NUL separated) into links
pub fn split_link_text(text: &str) -> Vec<String> {
    normalize_links(text.split(|c: char| c == '\r' || c == '\n' || c == '\0'))
}

/// Reduce an uploaded filename to its last path component.
/// Returns `None` when nothing usable remains.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let name = raw
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

/// Normalize a configured downloader host into a base URL.
/// An explicit scheme is kept, bare hosts default to `http`.
pub fn downloader_base_url(host: &str, port: u16) -> String {
    let host = host.trim();
    let (scheme, rest) = match host.split_once("://") {
        Some((scheme, rest)) => (scheme.to_ascii_lowercase(), rest),
        None => ("http".to_string(), host),
    };
    format!("{}://{}:{}", scheme, rest.trim_end_matches('/'), port)
}

/// Sanitize string for logging (cut long URLs)
pub fn sanitize_for_logging(s: &str) -> String {
    const MAX: usize = 64;
    if s.chars().count() <= MAX {
        return s.to_string();
    }
    let head: String = s.chars().take(MAX).collect();
    format!("{}...", head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_links() {
        let links = normalize_links(["  http://a ", "", "http://b", "   ", "http://a"]);
        assert_eq!(links, vec!["http://a", "http://b", "http://a"]);
    }

    #[test]
    fn test_split_link_text() {
        let links = split_link_text("http://a\r\nhttp://b\0\0\nhttp://c\n");
        assert_eq!(links, vec!["http://a", "http://b", "http://c"]);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("x.dlc").as_deref(), Some("x.dlc"));
        assert_eq!(sanitize_filename("C:\\Users\\me\\x.dlc").as_deref(), Some("x.dlc"));
        assert_eq!(sanitize_filename("../../etc/x.dlc").as_deref(), Some("x.dlc"));
        assert_eq!(sanitize_filename("dir/"), None);
        assert_eq!(sanitize_filename(".."), None);
        assert_eq!(sanitize_filename("  "), None);
    }

    #[test]
    fn test_downloader_base_url() {
        assert_eq!(downloader_base_url("127.0.0.1", 3128), "http://127.0.0.1:3128");
        assert_eq!(downloader_base_url("http://nas.local/", 3128), "http://nas.local:3128");
        assert_eq!(downloader_base_url(" https://nas.local", 3128), "https://nas.local:3128");
        assert_eq!(downloader_base_url("HTTPS://nas.local/", 443), "https://nas.local:443");
    }

    #[test]
    fn test_sanitize_for_logging() {
        assert_eq!(sanitize_for_logging("short"), "short");
        let long = "x".repeat(100);
        assert_eq!(sanitize_for_logging(&long).len(), 67);
    }
}
