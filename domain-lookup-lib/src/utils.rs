//! Helpers for turning user input into a domain candidate.
//!
//! Input arrives from command lines, forms and files, so it may be a full URL,
//! padded with whitespace or carry stray dots. Cleaning never fails; validation
//! happens later in the suffix resolver.

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("static regex");
    static ref DOT_RUNS: Regex = Regex::new(r"\.{2,}").expect("static regex");
}

/// Clean raw user input into a domain candidate.
///
/// - removes all whitespace and collapses runs of dots
/// - trims leading and trailing dots
/// - keeps only the host of a URL (`https://www.example.com/path` -> `www.example.com`)
/// - appends `default_extension` when the result has no dot
///
/// # Arguments
///
/// * `input` - Raw user input
/// * `default_extension` - Extension appended to dot-less input, if any
pub fn clean_domain_input(input: &str, default_extension: Option<&str>) -> String {
    let mut domain = collapse(input);

    if let Some(host) = extract_host(&domain) {
        domain = collapse(&host);
    }

    if let Some(extension) = default_extension {
        let extension = extension.trim().trim_matches('.');
        if !domain.is_empty() && !extension.is_empty() && !domain.contains('.') {
            domain = format!("{}.{}", domain, extension);
        }
    }

    domain
}

/// Parse a list of domains from file content, one per line.
///
/// Blank lines and `#` comments are skipped, and trailing comments are removed.
pub fn parse_domain_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Drop whitespace, collapse dot runs and trim outer dots.
pub(crate) fn collapse(input: &str) -> String {
    let compact = WHITESPACE.replace_all(input, "");
    let compact = DOT_RUNS.replace_all(&compact, ".");
    compact.trim_matches('.').to_string()
}

/// Host part of URL-shaped input, `None` for plain names.
fn extract_host(input: &str) -> Option<String> {
    if input.contains("://") {
        return Url::parse(input)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .filter(|host| !host.is_empty());
    }

    if input.contains(['/', '?', '#', '@', ':']) {
        return Url::parse(&format!("http://{}", input))
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .filter(|host| !host.is_empty());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_whitespace_and_dots() {
        assert_eq!(clean_domain_input("  EXAMPLE.COM..  ", None), "EXAMPLE.COM");
        assert_eq!(clean_domain_input("exa mple...com", None), "example.com");
        assert_eq!(clean_domain_input("..example.com.", None), "example.com");
        assert_eq!(clean_domain_input("   ", None), "");
    }

    #[test]
    fn test_clean_extracts_url_host() {
        assert_eq!(
            clean_domain_input("https://www.example.com/some/path?q=1", None),
            "www.example.com"
        );
        assert_eq!(
            clean_domain_input("example.org/index.html", None),
            "example.org"
        );
        assert_eq!(clean_domain_input("example.net:8080", None), "example.net");
    }

    #[test]
    fn test_clean_appends_default_extension() {
        assert_eq!(clean_domain_input("example", Some("com")), "example.com");
        assert_eq!(clean_domain_input("example", Some(".dev")), "example.dev");
        assert_eq!(clean_domain_input("example.org", Some("com")), "example.org");
        assert_eq!(clean_domain_input("example", None), "example");
        assert_eq!(clean_domain_input("", Some("com")), "");
    }

    #[test]
    fn test_parse_domain_list() {
        let content = "example.com\n\n# comment\nexample.org  # trailing\n   \nexample.net\n";
        assert_eq!(
            parse_domain_list(content),
            vec!["example.com", "example.org", "example.net"]
        );
    }
}
