//! Protocol implementations for registry lookups.
//!
//! This module contains the WHOIS and RDAP clients and the server tables
//! they are resolved against.

/// RDAP (Registration Data Access Protocol) implementation
pub mod rdap;

/// WHOIS protocol implementation
pub mod whois;

/// Server directories, bootstrap tables and the snapshot holder
pub mod registry;

// Re-export commonly used types
pub use rdap::{domain_url, RdapClient, RdapReply};
pub use registry::{RdapBootstrap, Registry, RegistrySnapshot, WhoisDirectory, WhoisServer};
pub use whois::{find_referral, WhoisClient};
