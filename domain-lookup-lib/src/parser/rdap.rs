//! RDAP domain object extraction (RFC 9083).
//!
//! Standard members map directly onto the canonical record; members this
//! module does not know are ignored.

use super::{date::parse_date, epp_code, status_entry, ParsedRecord};
use crate::types::{push_status, push_unique_ci, StatusEntry};
use serde_json::Value;

/// Extract canonical fields from an RDAP domain object.
pub fn parse_rdap(json: &Value) -> ParsedRecord {
    let mut record = ParsedRecord {
        answered: true,
        ..ParsedRecord::default()
    };

    record.domain = json
        .get("ldhName")
        .and_then(|n| n.as_str())
        .map(|n| n.trim_end_matches('.').to_lowercase());

    if let Some(registrar) = registrar_entity(json) {
        record.registrar.name = extract_vcard_text(registrar, "fn")
            .or_else(|| extract_entity_identifier(registrar));
        record.registrar.url =
            extract_vcard_text(registrar, "url").or_else(|| extract_entity_link(registrar));
    }

    if let Some(events) = json.get("events").and_then(|e| e.as_array()) {
        for event in events {
            let (Some(action), Some(date)) = (
                event.get("eventAction").and_then(|a| a.as_str()),
                event.get("eventDate").and_then(|d| d.as_str()),
            ) else {
                continue;
            };

            let slot = match action.to_lowercase().as_str() {
                "registration" => &mut record.creation_date,
                "expiration" => &mut record.expiration_date,
                "last changed" => &mut record.updated_date,
                "deletion" => &mut record.available_date,
                _ => continue,
            };
            if slot.is_none() {
                *slot = parse_date(date);
            }
        }
    }

    if let Some(statuses) = json.get("status").and_then(|s| s.as_array()) {
        for status in statuses.iter().filter_map(|s| s.as_str()) {
            if status.to_lowercase().contains("reserved") {
                record.reserved = true;
            }
            push_status(&mut record.status, rdap_status(status));
        }
    }

    if let Some(nameservers) = json.get("nameservers").and_then(|ns| ns.as_array()) {
        for nameserver in nameservers {
            if let Some(name) = nameserver.get("ldhName").and_then(|n| n.as_str()) {
                push_unique_ci(
                    &mut record.name_servers,
                    &name.trim_end_matches('.').to_lowercase(),
                );
            }
        }
    }

    record
}

/// Map an RDAP status phrase onto the EPP vocabulary (RFC 8056).
///
/// `client transfer prohibited` becomes `clientTransferProhibited`; `active` is
/// the RDAP name of EPP `ok`. Phrases with no EPP counterpart are kept as sent.
fn rdap_status(phrase: &str) -> StatusEntry {
    let phrase = phrase.trim();
    if phrase.eq_ignore_ascii_case("active") {
        return status_entry("ok", None);
    }

    let camel: String = phrase
        .split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            let word = word.to_lowercase();
            if i == 0 {
                return word;
            }
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();

    match epp_code(&camel) {
        Some(code) => status_entry(code, None),
        None => status_entry(phrase, None),
    }
}

fn registrar_entity(json: &Value) -> Option<&Value> {
    json.get("entities")?.as_array()?.iter().find(|entity| {
        entity
            .get("roles")
            .and_then(|r| r.as_array())
            .is_some_and(|roles| roles.iter().any(|role| role.as_str() == Some("registrar")))
    })
}

/// First text value of a vCard property in an RDAP entity.
fn extract_vcard_text(entity: &Value, property: &str) -> Option<String> {
    let items = entity.get("vcardArray")?.as_array()?.get(1)?.as_array()?;

    items.iter().find_map(|item| {
        let item = item.as_array()?;
        if item.len() < 4 || item.first()?.as_str()? != property {
            return None;
        }
        item.get(3)?
            .as_str()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
    })
}

/// Entity identifier from publicIds, handle or name.
fn extract_entity_identifier(entity: &Value) -> Option<String> {
    if let Some(id) = entity
        .get("publicIds")
        .and_then(|p| p.as_array())
        .and_then(|ids| ids.first())
        .and_then(|id| id.get("identifier"))
        .and_then(|i| i.as_str())
    {
        return Some(id.to_string());
    }

    entity
        .get("handle")
        .or_else(|| entity.get("name"))
        .and_then(|h| h.as_str())
        .map(String::from)
}

/// The registrar's web site from its `links`: an `about` link, else any HTML link.
fn extract_entity_link(entity: &Value) -> Option<String> {
    let links = entity.get("links")?.as_array()?;

    links
        .iter()
        .find(|link| link_rel(link) == Some("about"))
        .or_else(|| links.iter().find(|link| link_rel(link) == Some("self") && is_html(link)))
        .or_else(|| links.iter().find(|link| is_html(link)))
        .and_then(|link| link.get("href"))
        .and_then(|href| href.as_str())
        .map(String::from)
}

fn link_rel(link: &Value) -> Option<&str> {
    link.get("rel").and_then(|r| r.as_str())
}

fn is_html(link: &Value) -> bool {
    link.get("type").and_then(|t| t.as_str()) == Some("text/html")
}
