//! PII redaction for RDAP records.
//!
//! Registrant, administrative, technical and similar contacts are personal
//! data in many jurisdictions. Their name, email, phone and postal address
//! are replaced with [`REDACTED`]. Registrar and abuse contacts are public
//! business data and pass through untouched, as do organization names and
//! handles.

use crate::types::{Contact, RdapRecord};
use serde_json::Value;

/// Replacement text for redacted values.
pub const REDACTED: &str = "REDACTED";

/// Roles whose contact details are never redacted.
const PUBLIC_ROLES: &[&str] = &["registrar", "abuse"];

/// jCard properties rewritten in raw entities.
const PII_VCARD_PROPERTIES: &[&str] = &["fn", "n", "email", "tel", "adr"];

/// Applies the redaction policy to normalized records and raw RDAP JSON.
#[derive(Debug, Clone, Default)]
pub struct Redactor;

impl Redactor {
    pub fn new() -> Self {
        Self
    }

    /// Redact personal contacts in place. Returns the number of contacts changed.
    pub fn redact_record(&self, record: &mut RdapRecord) -> usize {
        record
            .contacts_mut()
            .iter_mut()
            .filter(|c| !is_public(&c.roles))
            .map(redact_contact)
            .filter(|changed| *changed)
            .count()
    }

    /// Redact personal vCard properties of every non-public entity in a raw
    /// RDAP document, including nested entities.
    pub fn redact_json(&self, json: &mut Value) {
        let Some(entities) = json.get_mut("entities").and_then(|e| e.as_array_mut()) else {
            return;
        };

        for entity in entities {
            if !is_public(&entity_roles(entity)) {
                redact_vcard(entity);
            }
            self.redact_json(entity);
        }
    }
}

fn is_public(roles: &[String]) -> bool {
    roles
        .iter()
        .any(|r| PUBLIC_ROLES.iter().any(|p| r.eq_ignore_ascii_case(p)))
}

fn redact_contact(contact: &mut Contact) -> bool {
    let mut changed = false;
    for field in [
        &mut contact.name,
        &mut contact.email,
        &mut contact.phone,
        &mut contact.address,
    ] {
        if let Some(value) = field {
            if value.as_str() != REDACTED {
                *value = REDACTED.to_string();
                changed = true;
            }
        }
    }
    changed
}

fn entity_roles(entity: &Value) -> Vec<String> {
    entity
        .get("roles")
        .and_then(|r| r.as_array())
        .map(|roles| {
            roles
                .iter()
                .filter_map(|r| r.as_str())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn redact_vcard(entity: &mut Value) {
    let Some(properties) = entity
        .get_mut("vcardArray")
        .and_then(|v| v.as_array_mut())
        .and_then(|a| a.get_mut(1))
        .and_then(|p| p.as_array_mut())
    else {
        return;
    };

    for property in properties.iter_mut().filter_map(|p| p.as_array_mut()) {
        let is_pii = property
            .first()
            .and_then(|n| n.as_str())
            .map(|n| PII_VCARD_PROPERTIES.iter().any(|p| n.eq_ignore_ascii_case(p)))
            .unwrap_or(false);
        if !is_pii || property.len() < 4 {
            continue;
        }

        if let Some(params) = property[1].as_object_mut() {
            if params.contains_key("label") {
                params.insert("label".to_string(), Value::from(REDACTED));
            }
        }
        let replacement = match &property[3] {
            Value::Array(parts) => Value::Array(vec![Value::from(REDACTED); parts.len()]),
            _ => Value::from(REDACTED),
        };
        property[3] = replacement;
    }
}
