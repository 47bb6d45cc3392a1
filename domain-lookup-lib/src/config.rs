//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files and `DL_*`
//! environment variables, merging them with proper precedence rules, and
//! turning the result into a [`LookupConfig`] and a loaded [`Registry`].

use crate::error::DomainLookupError;
use crate::protocols::registry::{RdapBootstrap, Registry, WhoisDirectory};
use crate::suffix::SuffixTable;
use crate::types::{LookupConfig, Sources};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration loaded from TOML files.
///
/// ```toml
/// [lookup]
/// sources = ["whois", "rdap"]
/// timeout = "10s"
/// default_extension = "com"
///
/// [data]
/// suffix_list = "/usr/share/publicsuffix/public_suffix_list.dat"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Lookup behaviour
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup: Option<LookupFileConfig>,

    /// Startup table files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DataConfig>,
}

/// The `[lookup]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LookupFileConfig {
    /// Sources queried by default (`whois`, `rdap`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,

    /// Timeout for both protocols (as string, e.g., "5s", "2m")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois_timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rdap_timeout: Option<String>,

    /// Extension appended to input without a dot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_extension: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_referrals: Option<bool>,

    /// Lookups run at once when several domains are given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
}

/// The `[data]` section: paths of startup tables replacing the built-in ones.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DataConfig {
    /// Public suffix list file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix_list: Option<String>,

    /// WHOIS directory JSON file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois_servers: Option<String>,

    /// RDAP bootstrap file in IANA `dns.json` format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rdap_bootstrap: Option<String>,
}

impl DataConfig {
    /// Fill each unset path from `other`.
    pub fn or(self, other: DataConfig) -> DataConfig {
        DataConfig {
            suffix_list: self.suffix_list.or(other.suffix_list),
            whois_servers: self.whois_servers.or(other.whois_servers),
            rdap_bootstrap: self.rdap_bootstrap.or(other.rdap_bootstrap),
        }
    }

    /// Build a registry, loading each configured table and using the built-in
    /// table for the rest.
    pub fn load_registry(&self) -> Result<Registry, DomainLookupError> {
        let suffixes = match &self.suffix_list {
            Some(path) => SuffixTable::from_file(path)?,
            None => SuffixTable::builtin(),
        };
        let whois = match &self.whois_servers {
            Some(path) => WhoisDirectory::from_file(path)?,
            None => WhoisDirectory::builtin(),
        };
        let rdap = match &self.rdap_bootstrap {
            Some(path) => RdapBootstrap::from_file(path)?,
            None => RdapBootstrap::builtin(),
        };

        debug!(
            suffix_rules = suffixes.len(),
            whois_servers = whois.len(),
            rdap_extensions = rdap.len(),
            "startup tables loaded"
        );
        Ok(Registry::new(suffixes, whois, rdap))
    }
}

/// Configuration discovery and loading functionality.
#[derive(Debug, Clone, Default)]
pub struct ConfigManager {
    /// Overrides `$HOME` for discovery
    home_dir: Option<PathBuf>,
    /// Overrides the current directory for discovery
    working_dir: Option<PathBuf>,
}

impl ConfigManager {
    /// Create a new configuration manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Discover files relative to the given home and working directories
    /// instead of `$HOME` and `.`.
    pub fn with_dirs<H: Into<PathBuf>, W: Into<PathBuf>>(home_dir: H, working_dir: W) -> Self {
        Self {
            home_dir: Some(home_dir.into()),
            working_dir: Some(working_dir.into()),
        }
    }

    /// Load configuration from a specific file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The parsed configuration or an error if reading, parsing or validation
    /// fails.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, DomainLookupError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DomainLookupError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            DomainLookupError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            DomainLookupError::config(format!(
                "Failed to parse TOML configuration {}: {}",
                path.display(),
                e
            ))
        })?;

        self.validate_config(&config)?;
        debug!(path = %path.display(), "configuration file loaded");

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config < `~/.domain-lookup.toml` < `./domain-lookup.toml`, merged
    /// field by field. A file that exists but does not parse is an error.
    pub fn discover_and_load(&self) -> Result<FileConfig, DomainLookupError> {
        let mut merged = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.xdg_config_path(),
            self.global_config_path(),
            self.local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            let config = self.load_file(&path)?;
            merged = self.merge_configs(merged, config);
            loaded_files.push(path);
        }

        if loaded_files.len() > 1 {
            debug!(
                files = ?loaded_files,
                "multiple configuration files merged, later files take precedence"
            );
        }

        Ok(merged)
    }

    fn home(&self) -> Option<PathBuf> {
        self.home_dir
            .clone()
            .or_else(|| env::var_os("HOME").map(PathBuf::from))
    }

    /// Configuration file in the current directory.
    fn local_config_path(&self) -> Option<PathBuf> {
        let dir = self
            .working_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));

        ["domain-lookup.toml", ".domain-lookup.toml"]
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }

    /// Configuration file in the user's home directory.
    fn global_config_path(&self) -> Option<PathBuf> {
        let home = self.home()?;
        [".domain-lookup.toml", "domain-lookup.toml"]
            .iter()
            .map(|name| home.join(name))
            .find(|path| path.exists())
    }

    /// Follows the XDG Base Directory Specification.
    fn xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = match &self.home_dir {
            Some(home) => home.join(".config"),
            None => env::var_os("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|| self.home().map(|home| home.join(".config")))?,
        };

        let path = config_dir.join("domain-lookup").join("config.toml");
        path.exists().then_some(path)
    }

    /// Merge two configurations. Values from `higher` take precedence.
    fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            lookup: match (lower.lookup, higher.lookup) {
                (Some(lower), Some(higher)) => Some(LookupFileConfig {
                    sources: higher.sources.or(lower.sources),
                    timeout: higher.timeout.or(lower.timeout),
                    whois_timeout: higher.whois_timeout.or(lower.whois_timeout),
                    rdap_timeout: higher.rdap_timeout.or(lower.rdap_timeout),
                    default_extension: higher.default_extension.or(lower.default_extension),
                    follow_referrals: higher.follow_referrals.or(lower.follow_referrals),
                    concurrency: higher.concurrency.or(lower.concurrency),
                }),
                (lower, higher) => higher.or(lower),
            },
            data: match (lower.data, higher.data) {
                (Some(lower), Some(higher)) => Some(higher.or(lower)),
                (lower, higher) => higher.or(lower),
            },
        }
    }

    /// Validate a configuration for common issues.
    fn validate_config(&self, config: &FileConfig) -> Result<(), DomainLookupError> {
        if let Some(lookup) = &config.lookup {
            if let Some(sources) = &lookup.sources {
                parse_sources(sources)?;
            }

            for (name, value) in [
                ("timeout", &lookup.timeout),
                ("whois_timeout", &lookup.whois_timeout),
                ("rdap_timeout", &lookup.rdap_timeout),
            ] {
                if let Some(value) = value {
                    if parse_timeout_string(value).is_none() {
                        return Err(DomainLookupError::config(format!(
                            "Invalid {} '{}'. Use format like '5s', '30s', '2m'",
                            name, value
                        )));
                    }
                }
            }

            if let Some(concurrency) = lookup.concurrency {
                if concurrency == 0 || concurrency > 100 {
                    return Err(DomainLookupError::config(
                        "Concurrency must be between 1 and 100",
                    ));
                }
            }

            if let Some(extension) = &lookup.default_extension {
                if extension.trim().trim_start_matches('.').contains(char::is_whitespace) {
                    return Err(DomainLookupError::config(format!(
                        "Invalid default_extension '{}'",
                        extension
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Configuration values taken from `DL_*` environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub sources: Option<Sources>,
    pub timeout: Option<Duration>,
    pub default_extension: Option<String>,
    pub config: Option<String>,
    pub data: DataConfig,
}

/// Load configuration from environment variables.
///
/// Invalid values are logged as warnings and ignored.
pub fn load_env_config() -> EnvConfig {
    EnvConfig::from_lookup(|key| env::var(key).ok())
}

impl EnvConfig {
    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| get(key).filter(|value| !value.trim().is_empty());
        let mut env_config = EnvConfig::default();

        // DL_SOURCES - comma-separated list of whois/rdap
        if let Some(value) = get("DL_SOURCES") {
            match Sources::parse_list(&value) {
                Ok(sources) => env_config.sources = Some(sources),
                Err(e) => warn!(value = %value, error = %e, "ignoring invalid DL_SOURCES"),
            }
        }

        // DL_TIMEOUT - timeout for both protocols
        if let Some(value) = get("DL_TIMEOUT") {
            match parse_timeout_string(&value) {
                Some(timeout) => env_config.timeout = Some(timeout),
                None => warn!(value = %value, "ignoring invalid DL_TIMEOUT, use format like '5s', '2m'"),
            }
        }

        env_config.default_extension = get("DL_DEFAULT_EXTENSION");
        env_config.config = get("DL_CONFIG");
        env_config.data = DataConfig {
            suffix_list: get("DL_SUFFIX_LIST"),
            whois_servers: get("DL_WHOIS_SERVERS"),
            rdap_bootstrap: get("DL_RDAP_BOOTSTRAP"),
        };

        env_config
    }
}

/// Combine file and environment configuration into lookup settings.
///
/// Precedence: defaults < file < environment. Command-line flags are applied
/// by the caller on top of the result.
pub fn build_lookup_config(
    file: &FileConfig,
    env: &EnvConfig,
) -> Result<LookupConfig, DomainLookupError> {
    let mut config = LookupConfig::default();

    if let Some(lookup) = &file.lookup {
        if let Some(sources) = &lookup.sources {
            config = config.with_sources(parse_sources(sources)?);
        }
        if let Some(timeout) = lookup.timeout.as_deref().and_then(parse_timeout_string) {
            config = config.with_timeout(timeout);
        }
        if let Some(timeout) = lookup.whois_timeout.as_deref().and_then(parse_timeout_string) {
            config = config.with_whois_timeout(timeout);
        }
        if let Some(timeout) = lookup.rdap_timeout.as_deref().and_then(parse_timeout_string) {
            config = config.with_rdap_timeout(timeout);
        }
        if let Some(extension) = &lookup.default_extension {
            config = config.with_default_extension(extension.as_str());
        }
        if let Some(follow) = lookup.follow_referrals {
            config = config.with_referrals(follow);
        }
    }

    if let Some(sources) = env.sources {
        config = config.with_sources(sources);
    }
    if let Some(timeout) = env.timeout {
        config = config.with_timeout(timeout);
    }
    if let Some(extension) = &env.default_extension {
        config = config.with_default_extension(extension.as_str());
    }

    Ok(config)
}

/// Data paths with environment values taking precedence over file values.
pub fn effective_data_config(file: &FileConfig, env: &EnvConfig) -> DataConfig {
    env.data
        .clone()
        .or(file.data.clone().unwrap_or_default())
}

fn parse_sources(names: &[String]) -> Result<Sources, DomainLookupError> {
    Sources::parse_list(&names.join(","))
}

/// Parse a timeout string like "500ms", "5s", "2m" or "30" (seconds).
///
/// Zero is rejected.
pub fn parse_timeout_string(timeout_str: &str) -> Option<Duration> {
    let timeout_str = timeout_str.trim().to_lowercase();

    let timeout = if let Some(ms) = timeout_str.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = timeout_str.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = timeout_str.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .map(|m| Duration::from_secs(m * 60))
    } else {
        // Assume seconds if no unit
        timeout_str.parse::<u64>().ok().map(Duration::from_secs)
    }?;

    (!timeout.is_zero()).then_some(timeout)
}
