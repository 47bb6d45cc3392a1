//! WHOIS text extraction.
//!
//! Registries label the same concept in many ways, so extraction is driven by
//! an alias table: each canonical field lists the labels known to carry it.
//! Three layouts are understood:
//!
//! ```text
//! Creation Date: 1995-08-14T04:00:00Z        key: value
//! [Created on]   2001/02/03                  [key] value
//! Name servers:                              key: followed by an indented block
//!     ns1.example.net
//! ```

use super::{date::parse_date, status_entry, ParsedRecord};
use crate::types::{push_status, push_unique_ci};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Domain,
    Registrar,
    RegistrarUrl,
    Creation,
    Updated,
    Expiration,
    Available,
    Status,
    NameServer,
}

/// Known labels per field, compared after [`normalize_key`].
const FIELD_ALIASES: &[(Field, &[&str])] = &[
    (Field::Domain, &["domain name", "domain", "domainname", "domain name ace"]),
    (
        Field::Registrar,
        &[
            "registrar",
            "registrar name",
            "sponsoring registrar",
            "sponsoring registrar organization",
            "registrar organization",
            "registration service provider",
            "registrar handle",
        ],
    ),
    (
        Field::RegistrarUrl,
        &[
            "registrar url",
            "registrar website",
            "registrar web",
            "referral url",
            "registration service url",
        ],
    ),
    (
        Field::Creation,
        &[
            "creation date",
            "created",
            "created on",
            "created date",
            "create date",
            "created at",
            "registered",
            "registered on",
            "registered date",
            "registration date",
            "registration time",
            "domain registration date",
            "domain create date",
            "domain name commencement date",
            "record created",
            "domain record activated",
        ],
    ),
    (
        Field::Updated,
        &[
            "updated date",
            "updated",
            "updated on",
            "last updated",
            "last updated on",
            "last update",
            "last modified",
            "modified",
            "changed",
            "domain last updated date",
            "record last updated on",
        ],
    ),
    (
        Field::Expiration,
        &[
            "registry expiry date",
            "registry expiration date",
            "registrar registration expiration date",
            "expiry date",
            "expiration date",
            "expiration time",
            "expire date",
            "expires",
            "expires on",
            "expiry",
            "domain expiration date",
            "domain expires",
            "record expires on",
            "paid till",
            "renewal date",
            "valid until",
        ],
    ),
    (
        Field::Available,
        &[
            "available date",
            "release date",
            "expected release date",
            "date to be released",
            "free date",
            "delete date",
            "deletion date",
            "domain delete date",
        ],
    ),
    (
        Field::Status,
        &[
            "domain status",
            "status",
            "state",
            "epp status",
            "registration status",
            "domain state",
        ],
    ),
    (
        Field::NameServer,
        &[
            "name server",
            "name servers",
            "nameserver",
            "nameservers",
            "nserver",
            "domain servers in listed order",
            "dns",
        ],
    ),
];

/// Replies that say the name is not registered.
const NO_MATCH_PATTERNS: &[&str] = &[
    "no match",
    "not found",
    "no data found",
    "no entries found",
    "no matching record",
    "no matching entry",
    "no object found",
    "object does not exist",
    "domain not found",
    "domain name not found",
    "not registered",
    "this domain name has not been registered",
    "is available for registration",
    "domain available",
    "status: available",
    "status: free",
    "no information available",
];

/// Replies that say the registry holds the name back.
const RESERVED_PATTERNS: &[&str] = &[
    "reserved by the registry",
    "reserved by registry",
    "registry reserved",
    "reserved domain",
    "domain is reserved",
    "name is reserved",
    "reserved name",
    "status: reserved",
    "premium domain",
    "premium name",
    "not available for registration",
    "cannot be registered",
    "registration is prohibited",
];

const RATE_LIMIT_PATTERNS: &[&str] = &[
    "rate limit exceeded",
    "too many requests",
    "try again later",
    "quota exceeded",
    "limit exceeded",
    "throttled",
    "rate-limited",
    "query rate",
];

lazy_static! {
    static ref ALIASES: HashMap<&'static str, Field> = FIELD_ALIASES
        .iter()
        .flat_map(|(field, aliases)| aliases.iter().map(move |alias| (*alias, *field)))
        .collect();
    static ref KEY_VALUE: Regex =
        Regex::new(r"^([A-Za-z][A-Za-z0-9 _/().\-]{0,59}?)[ \t.]*:[ \t]*(.*)$").expect("static regex");
    static ref BRACKET_KEY: Regex = Regex::new(r"^\[([^\]]{1,60})\][ \t]*(.*)$").expect("static regex");
    static ref SPACES: Regex = Regex::new(r"\s+").expect("static regex");
}

/// An open `key:` block collecting the indented lines below it.
struct Block {
    key: String,
    field: Option<Field>,
    indent: usize,
}

/// Extract canonical fields from a WHOIS reply.
pub fn parse_whois(body: &str) -> ParsedRecord {
    let mut record = ParsedRecord::default();
    let mut block: Option<Block> = None;
    let mut content_lines = 0usize;
    let mut scanned = String::with_capacity(body.len());

    for raw_line in body.lines() {
        let line = raw_line.trim_end();
        let trimmed = line.trim_start();

        if trimmed.starts_with(">>>") {
            break;
        }
        scanned.push_str(&line.to_lowercase());
        scanned.push('\n');

        if trimmed.starts_with('%') || trimmed.starts_with('#') {
            continue;
        }
        if trimmed.is_empty() {
            block = None;
            continue;
        }
        content_lines += 1;

        let indent = line.len() - trimmed.len();
        if block.as_ref().is_some_and(|b| indent <= b.indent) {
            block = None;
        }

        // `ns1.example.net 2001:db8::1` is a host with IPv6 glue, not a key
        let in_name_servers = matches!(
            &block,
            Some(Block {
                field: Some(Field::NameServer),
                ..
            })
        );
        let pair = split_line(trimmed)
            .filter(|(key, _)| !(in_name_servers && key.contains(char::is_whitespace)));

        if let Some((key, value)) = pair {
            let key = normalize_key(&key);
            let field = block
                .as_ref()
                .and_then(|b| ALIASES.get(format!("{} {}", b.key, key).as_str()))
                .or_else(|| ALIASES.get(key.as_str()))
                .copied();

            if value.is_empty() {
                if block.is_none() {
                    block = Some(Block { key, field, indent });
                }
            } else if let Some(field) = field {
                apply(&mut record, field, &value);
            }
            continue;
        }

        if let Some(Block {
            field: Some(field), ..
        }) = &block
        {
            apply(&mut record, *field, trimmed);
        }
    }

    record.answered = content_lines > 0;

    if !record.has_dates() {
        if NO_MATCH_PATTERNS.iter().any(|p| scanned.contains(p)) {
            return ParsedRecord::not_found();
        }
        if !record.has_registration_data() && is_rate_limited(&scanned) {
            record.answered = false;
        }
    }

    record.reserved = RESERVED_PATTERNS.iter().any(|p| scanned.contains(p));
    record
}

/// True if the reply is a rate-limit notice.
pub fn is_rate_limited(body: &str) -> bool {
    let lower = body.to_lowercase();
    RATE_LIMIT_PATTERNS.iter().any(|p| lower.contains(p))
}

fn split_line(line: &str) -> Option<(String, String)> {
    let caps = BRACKET_KEY
        .captures(line)
        .or_else(|| KEY_VALUE.captures(line))?;
    let key = caps.get(1)?.as_str().to_string();
    let value = caps.get(2).map(|v| v.as_str().trim()).unwrap_or_default();

    // `http://...` on its own is a value, not a key
    if value.starts_with("//") {
        return None;
    }
    Some((key, value.to_string()))
}

/// Lowercase, `-`/`_` as spaces, single spaces, no trailing dots.
fn normalize_key(key: &str) -> String {
    let key = key.to_lowercase().replace(['-', '_'], " ");
    SPACES
        .replace_all(key.trim(), " ")
        .trim_end_matches('.')
        .trim()
        .to_string()
}

fn apply(record: &mut ParsedRecord, field: Field, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }

    match field {
        Field::Domain => {
            if record.domain.is_none() {
                record.domain = Some(value.to_lowercase());
            }
        }
        Field::Registrar => {
            if record.registrar.name.is_none() {
                record.registrar.name = Some(value.to_string());
            }
        }
        Field::RegistrarUrl => {
            if record.registrar.url.is_none() {
                record.registrar.url = Some(value.to_string());
            }
        }
        Field::Creation => set_date(&mut record.creation_date, value),
        Field::Updated => set_date(&mut record.updated_date, value),
        Field::Expiration => set_date(&mut record.expiration_date, value),
        Field::Available => set_date(&mut record.available_date, value),
        Field::Status => {
            for entry in split_status(value) {
                push_status(&mut record.status, entry);
            }
        }
        Field::NameServer => {
            if let Some(host) = value.split_whitespace().next() {
                let host = host.trim_end_matches('.').to_lowercase();
                push_unique_ci(&mut record.name_servers, &host);
            }
        }
    }
}

fn set_date(slot: &mut Option<crate::types::DateField>, value: &str) {
    if slot.is_none() {
        *slot = parse_date(value);
    }
}

/// Split a status value into entries.
///
/// `clientHold https://icann.org/epp#clientHold` carries its own URL;
/// `clientDeleteProhibited, clientTransferProhibited` lists several codes;
/// anything else is one free-text entry.
fn split_status(value: &str) -> Vec<crate::types::StatusEntry> {
    let parts: Vec<&str> = value.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
    if parts.len() > 1 && parts.iter().all(|p| !p.contains(char::is_whitespace)) {
        return parts.into_iter().map(|p| status_entry(p, None)).collect();
    }

    let url_token = value.split_whitespace().find(|token| {
        let token = token.trim_start_matches('(');
        token.starts_with("http://") || token.starts_with("https://")
    });
    let text = match url_token {
        Some(token) => value.replacen(token, "", 1),
        None => value.to_string(),
    };
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    let url = url_token.map(|token| token.trim_matches(['(', ')']).to_string());

    vec![status_entry(text, url)]
}
