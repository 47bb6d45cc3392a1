//! Registry response parsing.
//!
//! Both wire shapes (WHOIS text and RDAP JSON) are reduced to a
//! [`ParsedRecord`]: the canonical fields one source could supply, plus what
//! the reply said about the domain as a whole. Parsing never fails; fields the
//! reply does not carry stay absent.

pub mod date;
pub mod rdap;
pub mod whois;

pub use date::{parse_date, parse_instant};
pub use rdap::parse_rdap;
pub use whois::parse_whois;

use crate::types::{push_status, push_unique_ci, Classification, DateField, Registrar, StatusEntry};

/// Base of the ICANN page describing each EPP status code.
pub const EPP_STATUS_URL: &str = "https://icann.org/epp#";

/// EPP status codes (RFC 5731, RFC 3915).
const EPP_CODES: &[&str] = &[
    "addPeriod",
    "autoRenewPeriod",
    "clientDeleteProhibited",
    "clientHold",
    "clientRenewProhibited",
    "clientTransferProhibited",
    "clientUpdateProhibited",
    "inactive",
    "ok",
    "pendingCreate",
    "pendingDelete",
    "pendingRenew",
    "pendingRestore",
    "pendingTransfer",
    "pendingUpdate",
    "redemptionPeriod",
    "renewPeriod",
    "serverDeleteProhibited",
    "serverHold",
    "serverRenewProhibited",
    "serverTransferProhibited",
    "serverUpdateProhibited",
    "transferPeriod",
];

/// Canonical fields extracted from a single registry reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRecord {
    /// Domain name as echoed by the registry
    pub domain: Option<String>,
    pub registrar: Registrar,
    pub creation_date: Option<DateField>,
    pub updated_date: Option<DateField>,
    pub expiration_date: Option<DateField>,
    pub available_date: Option<DateField>,
    pub status: Vec<StatusEntry>,
    pub name_servers: Vec<String>,
    /// The reply was a real answer about the domain (not empty, not only a
    /// rate-limit notice)
    pub answered: bool,
    /// The reply marks the name as blocked or held by the registry
    pub reserved: bool,
}

impl ParsedRecord {
    /// A definite "no such domain" answer.
    pub fn not_found() -> Self {
        Self {
            answered: true,
            ..Self::default()
        }
    }

    pub fn has_dates(&self) -> bool {
        self.creation_date.is_some()
            || self.updated_date.is_some()
            || self.expiration_date.is_some()
    }

    /// Any date or any status: the registry holds a record for the name.
    pub fn has_registration_data(&self) -> bool {
        self.has_dates() || !self.status.is_empty()
    }

    /// Classification of this record.
    ///
    /// Precedence: unknown (nothing usable), reserved (registry hold without
    /// dates), registered (dates or status), available.
    pub fn classification(&self) -> Classification {
        if !self.answered && !self.has_registration_data() {
            Classification::Unknown
        } else if self.reserved && !self.has_dates() {
            Classification::Reserved
        } else if self.has_registration_data() {
            Classification::Registered
        } else {
            Classification::Available
        }
    }

    /// Fold a second source into this one.
    ///
    /// `self` is the first source. A date from `other` replaces ours only when
    /// it carries an instant; every other field of `other` only fills gaps.
    pub fn merge(mut self, other: ParsedRecord) -> ParsedRecord {
        merge_date(&mut self.creation_date, other.creation_date);
        merge_date(&mut self.updated_date, other.updated_date);
        merge_date(&mut self.expiration_date, other.expiration_date);
        merge_date(&mut self.available_date, other.available_date);

        if self.domain.is_none() {
            self.domain = other.domain;
        }
        if self.registrar.name.is_none() {
            self.registrar.name = other.registrar.name;
        }
        if self.registrar.url.is_none() {
            self.registrar.url = other.registrar.url;
        }
        if self.status.is_empty() {
            for entry in other.status {
                push_status(&mut self.status, entry);
            }
        }
        if self.name_servers.is_empty() {
            for server in &other.name_servers {
                push_unique_ci(&mut self.name_servers, server);
            }
        }

        self.answered |= other.answered;
        self.reserved |= other.reserved;
        self
    }
}

fn merge_date(ours: &mut Option<DateField>, theirs: Option<DateField>) {
    match theirs {
        Some(theirs) if theirs.has_instant() || ours.is_none() => *ours = Some(theirs),
        _ => {}
    }
}

/// The canonical EPP spelling of a status code, if `text` is one.
pub fn epp_code(text: &str) -> Option<&'static str> {
    let text = text.trim();
    EPP_CODES
        .iter()
        .find(|code| code.eq_ignore_ascii_case(text))
        .copied()
}

/// Status entry for `text`, with the EPP reference URL for known codes.
pub fn status_entry(text: &str, url: Option<String>) -> StatusEntry {
    match epp_code(text) {
        Some(code) => StatusEntry {
            text: code.to_string(),
            url: url.or_else(|| Some(format!("{}{}", EPP_STATUS_URL, code))),
        },
        None => StatusEntry {
            text: text.trim().to_string(),
            url,
        },
    }
}
