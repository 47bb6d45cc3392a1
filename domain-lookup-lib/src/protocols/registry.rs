//! Extension -> server tables and the snapshot holder that serves them.
//!
//! The WHOIS directory maps an extension to its authoritative WHOIS host and
//! the RDAP bootstrap maps an extension to an ordered list of RDAP base URLs.
//! Both ship with built-in defaults, can be loaded from JSON files, and are
//! published through [`Registry`] as immutable snapshots that are swapped
//! atomically on refresh.

use crate::error::DomainLookupError;
use crate::suffix::SuffixTable;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Root WHOIS server, used for extension lookups.
pub const IANA_WHOIS_HOST: &str = "whois.iana.org";

/// Root RDAP service, used for extension lookups.
pub const IANA_RDAP_BASE: &str = "https://rdap.iana.org/";

/// Location of the IANA RDAP bootstrap file for DNS.
pub const IANA_BOOTSTRAP_URL: &str = "https://data.iana.org/rdap/dns.json";

/// Extension reported for lookups answered by the IANA root.
pub const IANA_EXTENSION: &str = "iana";

/// Built-in WHOIS hosts: (extension, host, query template).
const BUILTIN_WHOIS: &[(&str, &str, Option<&str>)] = &[
    // Generic TLDs
    ("com", "whois.verisign-grs.com", Some("domain {domain}")),
    ("net", "whois.verisign-grs.com", Some("domain {domain}")),
    ("org", "whois.publicinterestregistry.org", None),
    ("info", "whois.nic.info", None),
    ("biz", "whois.nic.biz", None),
    ("name", "whois.nic.name", None),
    ("mobi", "whois.nic.mobi", None),
    ("pro", "whois.nic.pro", None),
    ("xyz", "whois.nic.xyz", None),
    ("top", "whois.nic.top", None),
    ("online", "whois.nic.online", None),
    ("site", "whois.nic.site", None),
    ("tech", "whois.nic.tech", None),
    ("store", "whois.nic.store", None),
    ("app", "whois.nic.google", None),
    ("dev", "whois.nic.google", None),
    ("page", "whois.nic.google", None),
    ("blog", "whois.nic.blog", None),
    ("shop", "whois.nic.shop", None),
    ("club", "whois.nic.club", None),
    ("cloud", "whois.nic.cloud", None),
    ("edu", "whois.educause.edu", None),
    ("gov", "whois.dotgov.gov", None),
    // Country code TLDs
    ("ai", "whois.nic.ai", None),
    ("io", "whois.nic.io", None),
    ("me", "whois.nic.me", None),
    ("co", "whois.nic.co", None),
    ("tv", "whois.nic.tv", None),
    ("cc", "ccwhois.verisign-grs.com", None),
    ("us", "whois.nic.us", None),
    ("uk", "whois.nic.uk", None),
    ("de", "whois.denic.de", Some("-T dn,ace {domain}")),
    ("fr", "whois.nic.fr", None),
    ("nl", "whois.domain-registry.nl", None),
    ("eu", "whois.eu", None),
    ("it", "whois.nic.it", None),
    ("es", "whois.nic.es", None),
    ("ch", "whois.nic.ch", None),
    ("at", "whois.nic.at", None),
    ("be", "whois.dns.be", None),
    ("pl", "whois.dns.pl", None),
    ("se", "whois.iis.se", None),
    ("ca", "whois.cira.ca", None),
    ("au", "whois.auda.org.au", None),
    ("nz", "whois.irs.net.nz", None),
    ("jp", "whois.jprs.jp", Some("{domain}/e")),
    ("cn", "whois.cnnic.cn", None),
    ("hk", "whois.hkirc.hk", None),
    ("tw", "whois.twnic.net.tw", None),
    ("kr", "whois.kr", None),
    ("sg", "whois.sgnic.sg", None),
    ("in", "whois.registry.in", None),
    ("br", "whois.registro.br", None),
    ("ru", "whois.tcinet.ru", None),
];

/// Built-in RDAP base URLs, in preference order.
const BUILTIN_RDAP: &[(&str, &[&str])] = &[
    ("com", &["https://rdap.verisign.com/com/v1/"]),
    ("net", &["https://rdap.verisign.com/net/v1/"]),
    ("org", &["https://rdap.publicinterestregistry.org/rdap/"]),
    ("info", &["https://rdap.identitydigital.services/rdap/"]),
    ("biz", &["https://rdap.nic.biz/"]),
    ("xyz", &["https://rdap.centralnic.com/xyz/"]),
    ("tech", &["https://rdap.centralnic.com/tech/"]),
    ("online", &["https://rdap.centralnic.com/online/"]),
    ("site", &["https://rdap.centralnic.com/site/"]),
    ("app", &["https://pubapi.registry.google/rdap/"]),
    ("dev", &["https://pubapi.registry.google/rdap/"]),
    ("page", &["https://pubapi.registry.google/rdap/"]),
    ("blog", &["https://rdap.blog.fury.ca/rdap/"]),
    ("shop", &["https://rdap.gmoregistry.net/rdap/"]),
    ("cloud", &["https://rdap.registry.cloud/rdap/"]),
    ("ai", &["https://rdap.identitydigital.services/rdap/"]),
    ("io", &["https://rdap.identitydigital.services/rdap/"]),
    ("me", &["https://rdap.identitydigital.services/rdap/"]),
    ("tv", &["https://rdap.nic.tv/"]),
    ("cc", &["https://tld-rdap.verisign.com/cc/v1/"]),
    ("us", &["https://rdap.nic.us/"]),
    ("uk", &["https://rdap.nominet.uk/uk/"]),
    ("de", &["https://rdap.denic.de/"]),
    ("fr", &["https://rdap.nic.fr/"]),
    ("nl", &["https://rdap.sidn.nl/"]),
    ("ca", &["https://rdap.ca.fury.ca/rdap/"]),
    ("au", &["https://rdap.cctld.au/rdap/"]),
    ("br", &["https://rdap.registro.br/"]),
    ("in", &["https://rdap.nixiregistry.in/rdap/"]),
];

/// A WHOIS server entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhoisServer {
    pub host: String,
    /// Port from a `host:port` entry; the configured default applies otherwise
    pub port: Option<u16>,
    /// Query template with a `{domain}` placeholder
    pub query: Option<String>,
}

impl WhoisServer {
    /// Parse a `host` or `host:port` entry.
    pub fn new(entry: &str) -> Self {
        let entry = entry.trim();
        if let Some((host, port)) = entry.rsplit_once(':') {
            if let Ok(port) = port.parse::<u16>() {
                return Self {
                    host: host.to_lowercase(),
                    port: Some(port),
                    query: None,
                };
            }
        }
        Self {
            host: entry.to_lowercase(),
            port: None,
            query: None,
        }
    }

    pub fn with_query<Q: Into<String>>(mut self, query: Q) -> Self {
        self.query = Some(query.into());
        self
    }

    /// The line sent to the server for `domain`, without terminator.
    pub fn query_for(&self, domain: &str) -> String {
        match &self.query {
            Some(template) if template.contains("{domain}") => template.replace("{domain}", domain),
            _ => domain.to_string(),
        }
    }

    pub fn port_or(&self, default_port: u16) -> u16 {
        self.port.unwrap_or(default_port)
    }
}

/// Mapping extension -> authoritative WHOIS server.
#[derive(Debug, Clone, Default)]
pub struct WhoisDirectory {
    servers: HashMap<String, WhoisServer>,
}

impl WhoisDirectory {
    /// An empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in directory.
    pub fn builtin() -> Self {
        let mut directory = Self::new();
        for (extension, host, query) in BUILTIN_WHOIS {
            let mut server = WhoisServer::new(host);
            if let Some(query) = query {
                server = server.with_query(*query);
            }
            directory.insert(extension, server);
        }
        directory
    }

    /// Load a directory from JSON.
    ///
    /// The document is an object keyed by extension. Each value is either a
    /// host string (`"whois.nic.io"`, `"whois.example:4343"`) or an object
    /// `{"host": ..., "query": "... {domain} ..."}`.
    pub fn from_json(text: &str) -> Result<Self, DomainLookupError> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        let entries = json.as_object().ok_or_else(|| {
            DomainLookupError::config("WHOIS directory must be a JSON object keyed by extension")
        })?;

        let mut directory = Self::new();
        for (extension, value) in entries {
            let server = match value {
                serde_json::Value::String(host) => WhoisServer::new(host),
                serde_json::Value::Object(entry) => {
                    let host = entry.get("host").and_then(|h| h.as_str()).ok_or_else(|| {
                        DomainLookupError::config(format!(
                            "WHOIS directory entry '{}' has no host",
                            extension
                        ))
                    })?;
                    let mut server = WhoisServer::new(host);
                    if let Some(query) = entry.get("query").and_then(|q| q.as_str()) {
                        server = server.with_query(query);
                    }
                    server
                }
                _ => {
                    return Err(DomainLookupError::config(format!(
                        "WHOIS directory entry '{}' must be a string or an object",
                        extension
                    )))
                }
            };

            if server.host.is_empty() {
                return Err(DomainLookupError::config(format!(
                    "WHOIS directory entry '{}' has an empty host",
                    extension
                )));
            }
            directory.insert(extension, server);
        }

        Ok(directory)
    }

    /// Load a directory from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DomainLookupError> {
        let path = path.as_ref();
        let text = read_table(path)?;
        Self::from_json(&text)
    }

    pub fn insert(&mut self, extension: &str, server: WhoisServer) {
        self.servers.insert(table_key(extension), server);
    }

    /// Server for an extension, falling back to its shorter suffixes
    /// (`co.uk` is served by the `uk` entry when it has none of its own).
    pub fn get(&self, extension: &str) -> Option<&WhoisServer> {
        suffix_candidates(extension).find_map(|candidate| self.servers.get(candidate))
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

/// Mapping extension -> ordered RDAP base URLs.
#[derive(Debug, Clone, Default)]
pub struct RdapBootstrap {
    services: HashMap<String, Vec<String>>,
}

impl RdapBootstrap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in bootstrap table.
    pub fn builtin() -> Self {
        let mut bootstrap = Self::new();
        for (extension, urls) in BUILTIN_RDAP {
            bootstrap.insert(extension, urls.iter().map(|u| u.to_string()).collect());
        }
        bootstrap
    }

    /// Parse the IANA bootstrap format (RFC 9224).
    ///
    /// ```text
    /// { "services": [ [ ["com", "net"], ["https://rdap.verisign.com/com/v1/"] ] ] }
    /// ```
    ///
    /// URL order within a service is preserved. HTTPS URLs are listed before
    /// plain HTTP ones.
    pub fn from_iana_json(text: &str) -> Result<Self, DomainLookupError> {
        let json: serde_json::Value = serde_json::from_str(text)?;

        let services = json
            .get("services")
            .and_then(|s| s.as_array())
            .ok_or_else(|| {
                DomainLookupError::malformed(
                    "Invalid bootstrap JSON: missing or invalid 'services' array",
                )
            })?;

        let mut bootstrap = Self::new();

        for service in services {
            let Some(service) = service.as_array() else {
                continue;
            };
            if service.len() < 2 {
                continue;
            }

            let mut urls: Vec<String> = service[1]
                .as_array()
                .map(|urls| {
                    urls.iter()
                        .filter_map(|u| u.as_str())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            urls.sort_by_key(|u| !u.starts_with("https://"));

            if urls.is_empty() {
                continue;
            }

            if let Some(extensions) = service[0].as_array() {
                for extension in extensions.iter().filter_map(|e| e.as_str()) {
                    bootstrap.insert(extension, urls.clone());
                }
            }
        }

        Ok(bootstrap)
    }

    /// Load a bootstrap table from a file in IANA format.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DomainLookupError> {
        let path = path.as_ref();
        let text = read_table(path)?;
        Self::from_iana_json(&text)
    }

    pub fn insert(&mut self, extension: &str, urls: Vec<String>) {
        self.services.insert(table_key(extension), urls);
    }

    /// Base URLs for an extension, falling back to its shorter suffixes.
    pub fn base_urls(&self, extension: &str) -> Option<&[String]> {
        suffix_candidates(extension)
            .find_map(|candidate| self.services.get(candidate))
            .map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Read-only view of all startup tables, taken once per lookup.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    pub suffixes: Arc<SuffixTable>,
    pub whois: Arc<WhoisDirectory>,
    pub rdap: Arc<RdapBootstrap>,
}

/// Holder of the shared startup tables.
///
/// The suffix table is fixed for the life of the registry. The two server
/// tables can be replaced at any time; a replacement is published as a new
/// snapshot and never changes a snapshot a lookup already holds.
#[derive(Debug)]
pub struct Registry {
    suffixes: Arc<SuffixTable>,
    whois: ArcSwap<WhoisDirectory>,
    rdap: ArcSwap<RdapBootstrap>,
}

impl Registry {
    pub fn new(suffixes: SuffixTable, whois: WhoisDirectory, rdap: RdapBootstrap) -> Self {
        Self {
            suffixes: Arc::new(suffixes),
            whois: ArcSwap::from_pointee(whois),
            rdap: ArcSwap::from_pointee(rdap),
        }
    }

    /// Registry backed by the built-in tables.
    pub fn builtin() -> Self {
        Self::new(
            SuffixTable::builtin(),
            WhoisDirectory::builtin(),
            RdapBootstrap::builtin(),
        )
    }

    /// Consistent view of all three tables.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            suffixes: Arc::clone(&self.suffixes),
            whois: self.whois.load_full(),
            rdap: self.rdap.load_full(),
        }
    }

    pub fn suffix_table(&self) -> &SuffixTable {
        &self.suffixes
    }

    pub fn whois_directory(&self) -> Arc<WhoisDirectory> {
        self.whois.load_full()
    }

    pub fn rdap_bootstrap(&self) -> Arc<RdapBootstrap> {
        self.rdap.load_full()
    }

    /// Publish a new WHOIS directory.
    pub fn replace_whois_directory(&self, directory: WhoisDirectory) {
        debug!(entries = directory.len(), "publishing WHOIS directory");
        self.whois.store(Arc::new(directory));
    }

    /// Publish a new RDAP bootstrap table.
    pub fn replace_rdap_bootstrap(&self, bootstrap: RdapBootstrap) {
        debug!(entries = bootstrap.len(), "publishing RDAP bootstrap");
        self.rdap.store(Arc::new(bootstrap));
    }

    /// Download a bootstrap file in IANA format and publish it.
    ///
    /// The current table stays in place if the download or parse fails.
    /// Returns the number of extensions in the new table.
    pub async fn refresh_rdap_bootstrap(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<usize, DomainLookupError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                DomainLookupError::network_with_source(
                    "Failed to create HTTP client",
                    e.to_string(),
                )
            })?;

        let response = client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DomainLookupError::timeout("RDAP bootstrap download", timeout)
            } else {
                DomainLookupError::network_with_source(
                    format!("Failed to fetch bootstrap registry from {}", url),
                    e.to_string(),
                )
            }
        })?;

        if !response.status().is_success() {
            return Err(DomainLookupError::network(format!(
                "Bootstrap registry returned HTTP {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let bootstrap = RdapBootstrap::from_iana_json(&body)?;
        if bootstrap.is_empty() {
            return Err(DomainLookupError::malformed(
                "Bootstrap registry lists no services",
            ));
        }

        let entries = bootstrap.len();
        self.replace_rdap_bootstrap(bootstrap);
        info!(entries, url, "RDAP bootstrap refreshed");
        Ok(entries)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn table_key(extension: &str) -> String {
    let extension = extension.trim().trim_matches('.').to_lowercase();
    idna::domain_to_ascii(&extension).unwrap_or(extension)
}

/// `a.b.c`, `b.c`, `c`
fn suffix_candidates(extension: &str) -> impl Iterator<Item = &str> {
    let extension = extension.trim_matches('.');
    std::iter::once(extension).chain(
        extension
            .match_indices('.')
            .map(move |(i, _)| &extension[i + 1..]),
    )
}

fn read_table(path: &Path) -> Result<String, DomainLookupError> {
    fs::read_to_string(path).map_err(|e| {
        DomainLookupError::file_error(path.to_string_lossy(), format!("Failed to read: {}", e))
    })
}
