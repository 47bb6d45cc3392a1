//! # Domain Lookup Library
//!
//! Resolves a domain name to its registration status and metadata by querying
//! WHOIS and RDAP and normalising both into one canonical record.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use domain_lookup_lib::{DomainLookup, Sources};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let lookup = DomainLookup::new()?;
//!     let result = lookup.lookup("example.com", Sources::all()).await?;
//!
//!     println!("{} is {}", result.record.domain, result.record.classification);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Public suffix aware**: `www.example.co.uk` is looked up as `example.co.uk`
//! - **Dual protocol**: WHOIS and RDAP queried concurrently, results merged
//! - **Partial data over failure**: one source failing never hides the other
//! - **Swappable tables**: server directories refresh without blocking lookups

// Re-export main public API types and functions
// This makes them available as domain_lookup_lib::TypeName
pub use config::{
    build_lookup_config, effective_data_config, load_env_config, parse_timeout_string,
    ConfigManager, DataConfig, EnvConfig, FileConfig, LookupFileConfig,
};
pub use error::{DomainLookupError, ErrorKind};
pub use lookup::{build_record, DomainLookup, LookupState};
pub use normalize::{normalize, normalize_record};
pub use parser::{parse_rdap, parse_whois, ParsedRecord};
pub use protocols::registry::{
    RdapBootstrap, Registry, RegistrySnapshot, WhoisDirectory, WhoisServer, IANA_BOOTSTRAP_URL,
};
pub use protocols::{RdapClient, RdapReply, WhoisClient};
pub use suffix::{normalize_domain, ResolvedDomain, SuffixTable};
pub use types::{
    Classification, DateField, DerivedFields, DomainRecord, LookupConfig, LookupResult,
    RawResponse, Registrar, Source, SourceFailure, Sources, StatusEntry,
};
pub use utils::{clean_domain_input, parse_domain_list};

// Public modules
pub mod normalize;
pub mod parser;
pub mod protocols;
pub mod suffix;

// Internal modules - re-exported above
mod config;
mod error;
mod lookup;
mod types;
mod utils;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, DomainLookupError>;

// Library version and metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");
