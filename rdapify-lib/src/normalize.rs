//! Conversion of raw RDAP JSON (RFC 9083) into the normalized record types.
//!
//! Registries differ in which optional members they fill in, so every field
//! is extracted defensively: missing or mistyped members simply stay empty.

use crate::error::RdapError;
use crate::types::{
    AutnumRecord, Contact, DomainRecord, Event, IpNetworkRecord, QueryTarget, QueryType,
    RdapRecord, Registrar,
};
use serde_json::Value;

/// Normalize an RDAP response body for the given query.
///
/// The object class is taken from `objectClassName` when present, otherwise
/// from the query type. A response whose class does not match the query
/// (e.g. an `entity` returned for a domain lookup) is a parse error.
pub fn normalize(target: &QueryTarget, json: &Value) -> Result<RdapRecord, RdapError> {
    if !json.is_object() {
        return Err(RdapError::parse("RDAP response is not a JSON object"));
    }

    let expected = target.query_type();
    if let Some(class) = json.get("objectClassName").and_then(|c| c.as_str()) {
        let actual = match class.to_lowercase().as_str() {
            "domain" => Some(QueryType::Domain),
            "ip network" => Some(QueryType::Ip),
            "autnum" => Some(QueryType::Autnum),
            _ => None,
        };
        if actual != Some(expected) {
            return Err(RdapError::parse(format!(
                "expected '{}' object for {}, got '{}'",
                expected, target, class
            )));
        }
    }

    Ok(match target {
        QueryTarget::Domain(name) => RdapRecord::Domain(normalize_domain(name, json)),
        QueryTarget::Ip(_) => RdapRecord::IpNetwork(normalize_ip_network(json)),
        QueryTarget::Autnum(_) => RdapRecord::Autnum(normalize_autnum(json)),
    })
}

fn normalize_domain(queried: &str, json: &Value) -> DomainRecord {
    let events = extract_events(json);
    let contacts = extract_contacts(json);

    let mut record = DomainRecord {
        handle: str_field(json, "handle"),
        name: str_field(json, "ldhName")
            .map(|n| n.to_lowercase())
            .unwrap_or_else(|| queried.to_string()),
        unicode_name: str_field(json, "unicodeName"),
        status: extract_status(json),
        nameservers: extract_nameservers(json),
        registrar: extract_registrar(json),
        dnssec_signed: json
            .get("secureDNS")
            .and_then(|s| s.get("delegationSigned"))
            .and_then(|d| d.as_bool()),
        contacts,
        ..Default::default()
    };

    for event in &events {
        match event.action.as_str() {
            "registration" => record.registration_date = Some(event.date.clone()),
            "expiration" => record.expiration_date = Some(event.date.clone()),
            "last changed" => record.last_changed_date = Some(event.date.clone()),
            "last update of rdap database" if record.last_changed_date.is_none() => {
                record.last_changed_date = Some(event.date.clone())
            }
            _ => {}
        }
    }
    record.events = events;

    record
}

fn normalize_ip_network(json: &Value) -> IpNetworkRecord {
    IpNetworkRecord {
        handle: str_field(json, "handle"),
        start_address: str_field(json, "startAddress"),
        end_address: str_field(json, "endAddress"),
        ip_version: str_field(json, "ipVersion"),
        name: str_field(json, "name"),
        network_type: str_field(json, "type"),
        country: str_field(json, "country"),
        parent_handle: str_field(json, "parentHandle"),
        cidrs: extract_cidrs(json),
        status: extract_status(json),
        events: extract_events(json),
        contacts: extract_contacts(json),
    }
}

fn normalize_autnum(json: &Value) -> AutnumRecord {
    AutnumRecord {
        handle: str_field(json, "handle"),
        start_autnum: u32_field(json, "startAutnum"),
        end_autnum: u32_field(json, "endAutnum"),
        name: str_field(json, "name"),
        autnum_type: str_field(json, "type"),
        country: str_field(json, "country"),
        status: extract_status(json),
        events: extract_events(json),
        contacts: extract_contacts(json),
    }
}

fn str_field(json: &Value, key: &str) -> Option<String> {
    json.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn u32_field(json: &Value, key: &str) -> Option<u32> {
    json.get(key)
        .and_then(|v| v.as_u64())
        .and_then(|n| u32::try_from(n).ok())
}

/// Extract lifecycle events. Actions are lowercased for stable matching.
pub fn extract_events(json: &Value) -> Vec<Event> {
    json.get("events")
        .and_then(|e| e.as_array())
        .map(|events| {
            events
                .iter()
                .filter_map(|event| {
                    let action = event.get("eventAction")?.as_str()?;
                    let date = event.get("eventDate")?.as_str()?;
                    Some(Event {
                        action: action.to_lowercase(),
                        date: date.to_string(),
                        actor: str_field(event, "eventActor"),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn extract_status(json: &Value) -> Vec<String> {
    json.get("status")
        .and_then(|s| s.as_array())
        .map(|statuses| {
            statuses
                .iter()
                .filter_map(|s| s.as_str())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn extract_nameservers(json: &Value) -> Vec<String> {
    json.get("nameservers")
        .and_then(|ns| ns.as_array())
        .map(|nameservers| {
            nameservers
                .iter()
                .filter_map(|ns| ns.get("ldhName").and_then(|n| n.as_str()))
                .map(|n| n.trim_end_matches('.').to_lowercase())
                .collect()
        })
        .unwrap_or_default()
}

fn extract_cidrs(json: &Value) -> Vec<String> {
    json.get("cidr0_cidrs")
        .and_then(|c| c.as_array())
        .map(|cidrs| {
            cidrs
                .iter()
                .filter_map(|cidr| {
                    let prefix = cidr
                        .get("v4prefix")
                        .or_else(|| cidr.get("v6prefix"))
                        .and_then(|p| p.as_str())?;
                    let length = cidr.get("length").and_then(|l| l.as_u64())?;
                    Some(format!("{}/{}", prefix, length))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn entity_roles(entity: &Value) -> Vec<String> {
    entity
        .get("roles")
        .and_then(|r| r.as_array())
        .map(|roles| {
            roles
                .iter()
                .filter_map(|r| r.as_str())
                .map(|r| r.to_lowercase())
                .collect()
        })
        .unwrap_or_default()
}

/// Flatten all entities, including nested ones, into contacts.
pub fn extract_contacts(json: &Value) -> Vec<Contact> {
    let mut contacts = Vec::new();
    collect_contacts(json, &mut contacts);
    contacts
}

fn collect_contacts(parent: &Value, contacts: &mut Vec<Contact>) {
    let Some(entities) = parent.get("entities").and_then(|e| e.as_array()) else {
        return;
    };

    for entity in entities {
        contacts.push(Contact {
            handle: str_field(entity, "handle"),
            roles: entity_roles(entity),
            name: vcard_text(entity, "fn"),
            organization: vcard_text(entity, "org"),
            email: vcard_text(entity, "email"),
            phone: vcard_text(entity, "tel").map(|t| t.trim_start_matches("tel:").to_string()),
            address: vcard_address(entity),
            kind: vcard_text(entity, "kind"),
        });
        collect_contacts(entity, contacts);
    }
}

/// Extract the sponsoring registrar, including its IANA id and abuse contact.
fn extract_registrar(json: &Value) -> Option<Registrar> {
    let entities = json.get("entities")?.as_array()?;
    let entity = entities
        .iter()
        .find(|e| entity_roles(e).iter().any(|r| r == "registrar"))?;

    let abuse = entity
        .get("entities")
        .and_then(|e| e.as_array())
        .and_then(|nested| {
            nested
                .iter()
                .find(|e| entity_roles(e).iter().any(|r| r == "abuse"))
        });

    Some(Registrar {
        name: vcard_text(entity, "fn").or_else(|| extract_entity_identifier(entity)),
        iana_id: extract_iana_id(entity),
        abuse_email: abuse.and_then(|a| vcard_text(a, "email")),
        abuse_phone: abuse
            .and_then(|a| vcard_text(a, "tel"))
            .map(|t| t.trim_start_matches("tel:").to_string()),
    })
}

fn extract_iana_id(entity: &Value) -> Option<String> {
    entity
        .get("publicIds")
        .and_then(|p| p.as_array())?
        .iter()
        .find(|id| {
            id.get("type")
                .and_then(|t| t.as_str())
                .map(|t| t.eq_ignore_ascii_case("IANA Registrar ID"))
                .unwrap_or(false)
        })
        .and_then(|id| id.get("identifier"))
        .and_then(|i| match i {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Entity identifier from handle, falling back to the (non-standard) `name` member.
fn extract_entity_identifier(entity: &Value) -> Option<String> {
    str_field(entity, "handle").or_else(|| str_field(entity, "name"))
}

/// Properties of an entity's jCard: `["vcard", [[name, params, type, value], ...]]`.
fn vcard_properties(entity: &Value) -> &[Value] {
    entity
        .get("vcardArray")
        .and_then(|v| v.as_array())
        .and_then(|a| a.get(1))
        .and_then(|a| a.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn vcard_property<'a>(entity: &'a Value, name: &str) -> Option<&'a [Value]> {
    vcard_properties(entity).iter().find_map(|item| {
        let item = item.as_array()?;
        let first = item.first()?.as_str()?;
        (item.len() >= 4 && first.eq_ignore_ascii_case(name)).then_some(item.as_slice())
    })
}

/// Text value of a jCard property; structured values are joined with ", ".
pub fn vcard_text(entity: &Value, name: &str) -> Option<String> {
    let property = vcard_property(entity, name)?;
    let text = flatten_value(&property[3]);
    (!text.is_empty()).then_some(text)
}

/// Postal address: the `label` parameter when given, else the structured parts.
fn vcard_address(entity: &Value) -> Option<String> {
    let property = vcard_property(entity, "adr")?;
    if let Some(label) = property[1].get("label").and_then(|l| l.as_str()) {
        let label = label.replace('\n', ", ");
        if !label.trim().is_empty() {
            return Some(label);
        }
    }
    let text = flatten_value(&property[3]);
    (!text.is_empty()).then_some(text)
}

fn flatten_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .map(flatten_value)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}
