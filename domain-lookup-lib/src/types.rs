//! Core data types for domain lookups.
//!
//! This module defines the canonical record produced by a lookup, the raw
//! payloads kept alongside it, and the options that drive a lookup.

use crate::error::DomainLookupError;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Registry-data protocol used to answer a lookup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Source {
    #[serde(rename = "whois")]
    Whois,
    #[serde(rename = "rdap")]
    Rdap,
}

impl Source {
    /// Parse a source name as used in configuration (`whois` / `rdap`).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "whois" => Some(Self::Whois),
            "rdap" => Some(Self::Rdap),
            _ => None,
        }
    }
}

/// The set of protocols a caller wants queried.
///
/// An empty selection means "both", matching how the lookup treats a request
/// that names no source at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sources {
    pub whois: bool,
    pub rdap: bool,
}

impl Sources {
    /// Query both protocols.
    pub fn all() -> Self {
        Self {
            whois: true,
            rdap: true,
        }
    }

    /// Query a single protocol.
    pub fn only(source: Source) -> Self {
        Self {
            whois: source == Source::Whois,
            rdap: source == Source::Rdap,
        }
    }

    /// Build a selection from a list, treating an empty list as both.
    pub fn from_list(sources: &[Source]) -> Self {
        let selected = Self {
            whois: sources.contains(&Source::Whois),
            rdap: sources.contains(&Source::Rdap),
        };
        selected.or_all()
    }

    /// Parse a comma-separated list such as `"whois,rdap"`.
    pub fn parse_list(list: &str) -> Result<Self, DomainLookupError> {
        let mut sources = Vec::new();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let source = Source::parse(name).ok_or_else(|| {
                DomainLookupError::config(format!(
                    "Unknown data source '{}', expected 'whois' or 'rdap'",
                    name
                ))
            })?;
            sources.push(source);
        }
        Ok(Self::from_list(&sources))
    }

    pub fn contains(&self, source: Source) -> bool {
        match source {
            Source::Whois => self.whois,
            Source::Rdap => self.rdap,
        }
    }

    fn or_all(self) -> Self {
        if !self.whois && !self.rdap {
            Self::all()
        } else {
            self
        }
    }
}

impl Default for Sources {
    fn default() -> Self {
        Self::all()
    }
}

/// Registration status classification. Exactly one applies to a record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// No registry is known for the extension, or the reply was unusable
    #[default]
    Unknown,
    /// Blocked or held by the registry without ordinary registration data
    Reserved,
    /// Registration data is present
    Registered,
    /// The registry reports no registration
    Available,
}

/// Sponsoring registrar.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Registrar {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Registrar {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.url.is_none()
    }
}

/// A registry date as shown by the registry, plus the UTC instant when one
/// can be computed.
///
/// `instant` is `None` when the registry gave no timezone, which tells the
/// normaliser that the value is for display only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateField {
    pub display: String,
    #[serde(rename = "iso8601")]
    pub instant: Option<DateTime<Utc>>,
}

impl DateField {
    pub fn has_instant(&self) -> bool {
        self.instant.is_some()
    }
}

/// An EPP-style status entry with its optional reference URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusEntry {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Fields computed from the record's dates and status set.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DerivedFields {
    /// Seconds since creation, absent without a creation instant
    pub age_seconds: Option<i64>,
    /// Seconds until expiration, negative once expired
    pub remaining_seconds: Option<i64>,
    pub pending_delete: bool,
    pub grace_period: bool,
    pub redemption_period: bool,
    /// Registered less than a week ago
    pub new: bool,
    /// Expires within a week
    pub expiring_soon: bool,
    /// Past expiration and not already pending deletion
    pub expired: bool,
}

impl DerivedFields {
    pub fn age(&self) -> Option<ChronoDuration> {
        self.age_seconds.map(ChronoDuration::seconds)
    }

    pub fn remaining(&self) -> Option<ChronoDuration> {
        self.remaining_seconds.map(ChronoDuration::seconds)
    }
}

/// The canonical result of a lookup.
///
/// Plain data with stable field names: it serialises directly to JSON and
/// carries nothing presentation-specific.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DomainRecord {
    /// Lowercased, IDNA (punycode) form of the queried domain
    pub domain: String,
    /// Public suffix of the domain, or `iana` for suffix lookups
    pub extension: String,
    /// Extension plus one label
    pub registrable_domain: String,
    /// Name as echoed by the registry (`Domain Name` or RDAP `ldhName`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_domain: Option<String>,
    pub classification: Classification,
    pub registrar: Registrar,
    pub creation_date: Option<DateField>,
    pub updated_date: Option<DateField>,
    pub expiration_date: Option<DateField>,
    pub available_date: Option<DateField>,
    pub status: Vec<StatusEntry>,
    pub name_servers: Vec<String>,
    pub derived: DerivedFields,
}

impl DomainRecord {
    pub fn is_registered(&self) -> bool {
        self.classification == Classification::Registered
    }

    pub fn is_available(&self) -> bool {
        self.classification == Classification::Available
    }

    pub fn is_reserved(&self) -> bool {
        self.classification == Classification::Reserved
    }

    pub fn is_unknown(&self) -> bool {
        self.classification == Classification::Unknown
    }
}

/// A raw registry payload and the server that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawResponse {
    pub source: Source,
    /// WHOIS host or RDAP URL that answered
    pub server: String,
    /// HTTP status for RDAP replies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub body: String,
}

/// A protocol failure that was demoted because another source answered.
#[derive(Debug, Clone)]
pub struct SourceFailure {
    pub source: Source,
    pub error: DomainLookupError,
}

/// Everything a lookup returns: the merged record and the raw payloads of each
/// protocol that answered.
#[derive(Debug, Clone)]
pub struct LookupResult {
    pub record: DomainRecord,
    pub raw_whois: Option<RawResponse>,
    pub raw_rdap: Option<RawResponse>,
    pub diagnostics: Vec<SourceFailure>,
}

/// Configuration options for lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Protocols queried when the caller does not pick any
    pub sources: Sources,

    /// Budget for one WHOIS exchange, referral hop included
    /// Default: 10 seconds
    #[serde(skip)]
    pub whois_timeout: Duration,

    /// Budget for one RDAP request, redirects and base-URL fallbacks included
    /// Default: 10 seconds
    #[serde(skip)]
    pub rdap_timeout: Duration,

    /// TCP port used when a directory entry does not name one
    pub whois_port: u16,

    /// Upper bound on bytes read from a WHOIS server
    pub max_whois_response_bytes: usize,

    /// Whether a WHOIS referral is followed (at most one hop)
    pub follow_referrals: bool,

    /// Extension appended to input that contains no dot
    pub default_extension: Option<String>,
}

/// Redirects followed by the RDAP client before giving up.
pub const MAX_RDAP_REDIRECTS: usize = 3;

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            sources: Sources::all(),
            whois_timeout: Duration::from_secs(10),
            rdap_timeout: Duration::from_secs(10),
            whois_port: 43,
            max_whois_response_bytes: 1024 * 1024,
            follow_referrals: true,
            default_extension: None,
        }
    }
}

impl LookupConfig {
    /// Set the default source selection.
    pub fn with_sources(mut self, sources: Sources) -> Self {
        self.sources = sources;
        self
    }

    /// Set both protocol timeouts at once.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.whois_timeout = timeout;
        self.rdap_timeout = timeout;
        self
    }

    pub fn with_whois_timeout(mut self, timeout: Duration) -> Self {
        self.whois_timeout = timeout;
        self
    }

    pub fn with_rdap_timeout(mut self, timeout: Duration) -> Self {
        self.rdap_timeout = timeout;
        self
    }

    pub fn with_whois_port(mut self, port: u16) -> Self {
        self.whois_port = port;
        self
    }

    pub fn with_referrals(mut self, enabled: bool) -> Self {
        self.follow_referrals = enabled;
        self
    }

    /// Set the extension appended to dot-less input. Leading dots are ignored.
    pub fn with_default_extension<E: Into<String>>(mut self, extension: E) -> Self {
        let extension = extension.into();
        let extension = extension.trim().trim_start_matches('.').to_lowercase();
        self.default_extension = if extension.is_empty() {
            None
        } else {
            Some(extension)
        };
        self
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Whois => write!(f, "WHOIS"),
            Source::Rdap => write!(f, "RDAP"),
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Classification::Unknown => write!(f, "unknown"),
            Classification::Reserved => write!(f, "reserved"),
            Classification::Registered => write!(f, "registered"),
            Classification::Available => write!(f, "available"),
        }
    }
}

/// Append `value` unless an entry equal to it ignoring case is already present.
pub(crate) fn push_unique_ci(list: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    if !list.iter().any(|existing| existing.eq_ignore_ascii_case(value)) {
        list.push(value.to_string());
    }
}

/// Append a status entry unless its text is already present ignoring case.
pub(crate) fn push_status(list: &mut Vec<StatusEntry>, entry: StatusEntry) {
    if entry.text.trim().is_empty() {
        return;
    }
    if !list
        .iter()
        .any(|existing| existing.text.eq_ignore_ascii_case(&entry.text))
    {
        list.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sources_empty_means_both() {
        assert_eq!(Sources::from_list(&[]), Sources::all());
        assert_eq!(
            Sources::from_list(&[Source::Rdap]),
            Sources {
                whois: false,
                rdap: true
            }
        );
    }

    #[test]
    fn test_sources_parse_list() {
        let sources = Sources::parse_list("whois").unwrap();
        assert!(sources.whois && !sources.rdap);

        let sources = Sources::parse_list(" RDAP , whois ").unwrap();
        assert_eq!(sources, Sources::all());

        assert!(Sources::parse_list("ftp").is_err());
    }

    #[test]
    fn test_push_unique_ci() {
        let mut list = Vec::new();
        push_unique_ci(&mut list, "NS1.EXAMPLE.COM");
        push_unique_ci(&mut list, "ns1.example.com");
        push_unique_ci(&mut list, "ns2.example.com");
        push_unique_ci(&mut list, "  ");
        assert_eq!(list, vec!["NS1.EXAMPLE.COM", "ns2.example.com"]);
    }

    #[test]
    fn test_push_status_keeps_first() {
        let mut list = Vec::new();
        push_status(
            &mut list,
            StatusEntry {
                text: "clientHold".to_string(),
                url: Some("https://icann.org/epp#clientHold".to_string()),
            },
        );
        push_status(
            &mut list,
            StatusEntry {
                text: "CLIENTHOLD".to_string(),
                url: None,
            },
        );
        assert_eq!(list.len(), 1);
        assert!(list[0].url.is_some());
    }

    #[test]
    fn test_default_extension_normalised() {
        let config = LookupConfig::default().with_default_extension(".COM ");
        assert_eq!(config.default_extension.as_deref(), Some("com"));

        let config = LookupConfig::default().with_default_extension("");
        assert!(config.default_extension.is_none());
    }

    #[test]
    fn test_record_serialises_with_stable_names() {
        let record = DomainRecord {
            domain: "example.com".to_string(),
            extension: "com".to_string(),
            registrable_domain: "example.com".to_string(),
            classification: Classification::Registered,
            ..Default::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["classification"], "registered");
        assert_eq!(json["registrableDomain"], "example.com");
        assert!(json.get("registryDomain").is_none());
        assert!(json["derived"].get("pendingDelete").is_some());

        let echoed = DomainRecord {
            registry_domain: Some("example.com".to_string()),
            ..record
        };
        let json = serde_json::to_value(&echoed).unwrap();
        assert_eq!(json["registryDomain"], "example.com");
    }
}
