//! Public-suffix aware domain classification.
//!
//! Splits a domain into its registrable part and its extension using
//! public suffix list rules (exact, `*` wildcard, `!` exception). The table is
//! built once and then only read.

use crate::error::DomainLookupError;
use crate::utils::collapse;
use lazy_static::lazy_static;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

const BUILTIN_RULES: &str = include_str!("../data/public_suffix_list.dat");

lazy_static! {
    static ref BUILTIN_TABLE: SuffixTable = SuffixTable::parse(BUILTIN_RULES);
}

/// Immutable set of public-suffix rules.
#[derive(Debug, Clone, Default)]
pub struct SuffixTable {
    /// `com`, `co.uk`
    exact: HashSet<String>,
    /// Parent of a wildcard rule: `*.ck` is stored as `ck`
    wildcard: HashSet<String>,
    /// Full name of an exception rule: `!www.ck` is stored as `www.ck`
    exception: HashSet<String>,
}

/// A domain split at its public suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDomain {
    /// Normalised (lowercase, punycode) form of the whole input
    pub domain: String,
    /// Public suffix plus one label
    pub registrable_domain: String,
    /// The matched public suffix
    pub extension: String,
}

impl SuffixTable {
    /// Parse rules in public suffix list format.
    ///
    /// Comments (`//`), blank lines and anything after the first whitespace on
    /// a line are ignored. Rules that do not survive IDNA conversion are
    /// skipped.
    pub fn parse(text: &str) -> Self {
        let mut table = Self::default();

        for line in text.lines() {
            let rule = match line.split_whitespace().next() {
                Some(rule) if !rule.starts_with("//") => rule,
                _ => continue,
            };

            if let Some(name) = rule.strip_prefix('!') {
                if let Some(name) = to_ascii_rule(name) {
                    table.exception.insert(name);
                }
            } else if let Some(parent) = rule.strip_prefix("*.") {
                if let Some(parent) = to_ascii_rule(parent) {
                    table.wildcard.insert(parent);
                }
            } else if let Some(name) = to_ascii_rule(rule) {
                table.exact.insert(name);
            }
        }

        table
    }

    /// Load rules from a public suffix list file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DomainLookupError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            DomainLookupError::file_error(
                path.to_string_lossy(),
                format!("Failed to read suffix list: {}", e),
            )
        })?;

        let table = Self::parse(&text);
        if table.is_empty() {
            return Err(DomainLookupError::config(format!(
                "Suffix list '{}' contains no rules",
                path.display()
            )));
        }
        Ok(table)
    }

    /// The embedded rule subset.
    pub fn builtin() -> Self {
        BUILTIN_TABLE.clone()
    }

    /// Number of rules in the table.
    pub fn len(&self) -> usize {
        self.exact.len() + self.wildcard.len() + self.exception.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the public suffix of a normalised domain.
    ///
    /// Returns the number of trailing labels that form the suffix, or `None`
    /// when no rule matches.
    fn suffix_label_count(&self, labels: &[&str]) -> Option<usize> {
        let n = labels.len();

        // Exception rules win over any wildcard or exact match.
        for i in 0..n {
            let candidate = labels[i..].join(".");
            if self.exception.contains(&candidate) {
                return Some(n - i - 1);
            }
        }

        for i in 0..n {
            let candidate = labels[i..].join(".");
            if self.exact.contains(&candidate) {
                return Some(n - i);
            }
            if i + 1 < n && self.wildcard.contains(&labels[i + 1..].join(".")) {
                return Some(n - i);
            }
        }

        None
    }

    /// True when `input` is itself a public suffix (e.g. `com`, `co.uk`).
    pub fn is_public_suffix(&self, input: &str) -> bool {
        match normalize_domain(input) {
            Ok(domain) => {
                let labels: Vec<&str> = domain.split('.').collect();
                self.suffix_label_count(&labels) == Some(labels.len())
            }
            Err(_) => false,
        }
    }

    /// Split `input` into registrable domain and extension.
    ///
    /// Fails with `InvalidDomain` when the input is malformed, when no rule
    /// matches, or when nothing is left of the input beyond its suffix.
    pub fn resolve(&self, input: &str) -> Result<ResolvedDomain, DomainLookupError> {
        let domain = normalize_domain(input)?;
        let labels: Vec<&str> = domain.split('.').collect();

        let suffix_len = self.suffix_label_count(&labels).ok_or_else(|| {
            DomainLookupError::invalid_domain(&domain, "no public suffix rule matches")
        })?;

        if suffix_len == 0 || labels.len() <= suffix_len {
            return Err(DomainLookupError::invalid_domain(
                &domain,
                "no registrable label before the public suffix",
            ));
        }

        let extension = labels[labels.len() - suffix_len..].join(".");
        let registrable_domain = labels[labels.len() - suffix_len - 1..].join(".");

        Ok(ResolvedDomain {
            domain,
            registrable_domain,
            extension,
        })
    }
}

/// Normalise a domain string for lookup.
///
/// Removes whitespace, collapses repeated dots, trims leading and trailing
/// dots, lowercases and converts to IDNA ASCII form. Every label must be LDH
/// and within DNS length limits.
pub fn normalize_domain(input: &str) -> Result<String, DomainLookupError> {
    let compact = collapse(input);
    let compact = compact.as_str();

    if compact.is_empty() {
        return Err(DomainLookupError::invalid_domain(
            input.trim(),
            "domain name cannot be empty",
        ));
    }

    let ascii = idna::domain_to_ascii(compact).map_err(|e| {
        DomainLookupError::invalid_domain(compact, format!("IDNA conversion failed: {:?}", e))
    })?;

    if ascii.len() > 253 {
        return Err(DomainLookupError::invalid_domain(
            &ascii,
            "domain name longer than 253 characters",
        ));
    }

    for label in ascii.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(DomainLookupError::invalid_domain(
                &ascii,
                "each label must be 1-63 characters",
            ));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(DomainLookupError::invalid_domain(
                &ascii,
                format!("label '{}' starts or ends with a hyphen", label),
            ));
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(DomainLookupError::invalid_domain(
                &ascii,
                format!("label '{}' contains invalid characters", label),
            ));
        }
    }

    Ok(ascii)
}

fn to_ascii_rule(rule: &str) -> Option<String> {
    let rule = rule.trim().trim_matches('.');
    if rule.is_empty() {
        return None;
    }
    idna::domain_to_ascii(rule).ok().filter(|r| !r.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SuffixTable {
        SuffixTable::parse(
            "// test rules\ncom\nuk\nco.uk\n*.ck\n!www.ck\njp\n*.kawasaki.jp\n!city.kawasaki.jp\n中国\n",
        )
    }

    #[test]
    fn test_parse_counts_rule_kinds() {
        let table = table();
        assert_eq!(table.exact.len(), 5);
        assert_eq!(table.wildcard.len(), 2);
        assert_eq!(table.exception.len(), 2);
        assert!(table.exact.contains("xn--fiqs8s"));
    }

    #[test]
    fn test_resolve_simple() {
        let resolved = table().resolve("www.example.com").unwrap();
        assert_eq!(resolved.domain, "www.example.com");
        assert_eq!(resolved.registrable_domain, "example.com");
        assert_eq!(resolved.extension, "com");
    }

    #[test]
    fn test_resolve_longest_match() {
        let resolved = table().resolve("shop.example.co.uk").unwrap();
        assert_eq!(resolved.extension, "co.uk");
        assert_eq!(resolved.registrable_domain, "example.co.uk");
    }

    #[test]
    fn test_resolve_wildcard() {
        let resolved = table().resolve("foo.bar.ck").unwrap();
        assert_eq!(resolved.extension, "bar.ck");
        assert_eq!(resolved.registrable_domain, "foo.bar.ck");
    }

    #[test]
    fn test_resolve_exception() {
        let resolved = table().resolve("www.ck").unwrap();
        assert_eq!(resolved.extension, "ck");
        assert_eq!(resolved.registrable_domain, "www.ck");

        let resolved = table().resolve("a.city.kawasaki.jp").unwrap();
        assert_eq!(resolved.extension, "kawasaki.jp");
        assert_eq!(resolved.registrable_domain, "city.kawasaki.jp");
    }

    #[test]
    fn test_resolve_idn() {
        let resolved = table().resolve("例子.中国").unwrap();
        assert_eq!(resolved.extension, "xn--fiqs8s");
        assert!(resolved.registrable_domain.starts_with("xn--"));
        assert!(resolved.domain.is_ascii());
    }

    #[test]
    fn test_resolve_rejects_bare_suffix_and_unknown() {
        assert!(table().resolve("co.uk").is_err());
        assert!(table().resolve("bar.ck").is_err());
        assert!(table().resolve("example.invalidtld").is_err());
        assert!(table().resolve("").is_err());
    }

    #[test]
    fn test_extension_is_strict_suffix_with_one_extra_label() {
        let table = table();
        for input in [
            "example.com",
            "a.b.example.co.uk",
            "x.y.ck",
            "deep.city.kawasaki.jp",
        ] {
            let resolved = table.resolve(input).unwrap();
            assert!(resolved.domain.ends_with(&format!(".{}", resolved.extension)));
            let extra = resolved
                .registrable_domain
                .strip_suffix(&format!(".{}", resolved.extension))
                .unwrap();
            assert!(!extra.is_empty() && !extra.contains('.'), "{}", input);
        }
    }

    #[test]
    fn test_normalize_domain_cleans_input() {
        assert_eq!(normalize_domain("  EXAMPLE.COM..  ").unwrap(), "example.com");
        assert_eq!(normalize_domain("ex ample..com").unwrap(), "example.com");
        assert_eq!(normalize_domain(".example.com.").unwrap(), "example.com");
        assert!(normalize_domain(" . ").is_err());
        assert!(normalize_domain("-bad.com").is_err());
        assert!(normalize_domain("bad!.com").is_err());
    }

    #[test]
    fn test_normalize_domain_agrees_with_input_cleaning() {
        for input in ["\tWWW.\n..Example.COM.\r\n", "..shop . example .. net", " example.org "] {
            let cleaned = crate::utils::clean_domain_input(input, None);
            assert_eq!(
                normalize_domain(input).unwrap(),
                normalize_domain(&cleaned).unwrap()
            );
        }
        assert_eq!(
            normalize_domain("\tWWW.\n..Example.COM.\r\n").unwrap(),
            "www.example.com"
        );
    }

    #[test]
    fn test_is_public_suffix() {
        let table = table();
        assert!(table.is_public_suffix("com"));
        assert!(table.is_public_suffix("CO.UK"));
        assert!(table.is_public_suffix("anything.ck"));
        assert!(!table.is_public_suffix("example.com"));
        assert!(!table.is_public_suffix("www.ck"));
    }

    #[test]
    fn test_builtin_table_loads() {
        let table = SuffixTable::builtin();
        assert!(table.len() > 100);
        assert_eq!(table.resolve("example.org.uk").unwrap().extension, "org.uk");
    }
}
