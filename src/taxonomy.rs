use crate::schema::ServiceKey;
use std::str::FromStr;

/// Every label seen on complaint types, to-do types and payment types, mapped
/// to its service key. Labels are compared after [`normalize_label`].
pub const SERVICE_LABELS: &[(&str, ServiceKey)] = &[
    // OEC
    ("OEC", ServiceKey::Oec),
    ("Overseas Employment Certificate", ServiceKey::Oec),
    ("OEC Request", ServiceKey::Oec),
    ("OEC Renewal", ServiceKey::Oec),
    ("Client OEC Request", ServiceKey::Oec),
    ("OEC Complaint", ServiceKey::Oec),
    // OWWA
    ("OWWA", ServiceKey::Owwa),
    ("OWWA Registration", ServiceKey::Owwa),
    ("OWWA Membership", ServiceKey::Owwa),
    ("OWWA Renewal", ServiceKey::Owwa),
    // Lebanon
    ("TTL", ServiceKey::Ttl),
    ("Travel to Lebanon", ServiceKey::Ttl),
    ("Travel to Lebanon Visa", ServiceKey::Ttl),
    ("Tourist Visa to Lebanon", ServiceKey::Ttl),
    ("Travel to Lebanon - Single Entry", ServiceKey::TtlSingle),
    ("Tourist Visa to Lebanon - Single Entry", ServiceKey::TtlSingle),
    ("TTL Single Entry", ServiceKey::TtlSingle),
    ("Travel to Lebanon - Double Entry", ServiceKey::TtlDouble),
    ("Tourist Visa to Lebanon - Double Entry", ServiceKey::TtlDouble),
    ("TTL Double Entry", ServiceKey::TtlDouble),
    ("Travel to Lebanon - Multiple Entry", ServiceKey::TtlMultiple),
    ("Tourist Visa to Lebanon - Multiple Entry", ServiceKey::TtlMultiple),
    ("TTL Multiple Entry", ServiceKey::TtlMultiple),
    // Egypt
    ("TTE", ServiceKey::Tte),
    ("Travel to Egypt", ServiceKey::Tte),
    ("Travel to Egypt Visa", ServiceKey::Tte),
    ("Tourist Visa to Egypt", ServiceKey::Tte),
    ("Travel to Egypt - Single Entry", ServiceKey::TteSingle),
    ("Tourist Visa to Egypt - Single Entry", ServiceKey::TteSingle),
    ("TTE Single Entry", ServiceKey::TteSingle),
    ("Travel to Egypt - Double Entry", ServiceKey::TteDouble),
    ("Tourist Visa to Egypt - Double Entry", ServiceKey::TteDouble),
    ("TTE Double Entry", ServiceKey::TteDouble),
    ("Travel to Egypt - Multiple Entry", ServiceKey::TteMultiple),
    ("Tourist Visa to Egypt - Multiple Entry", ServiceKey::TteMultiple),
    ("TTE Multiple Entry", ServiceKey::TteMultiple),
    // Jordan
    ("TTJ", ServiceKey::Ttj),
    ("Travel to Jordan", ServiceKey::Ttj),
    ("Travel to Jordan Visa", ServiceKey::Ttj),
    ("Tourist Visa to Jordan", ServiceKey::Ttj),
    // Schengen / GCC
    ("Schengen", ServiceKey::Schengen),
    ("Schengen Visa", ServiceKey::Schengen),
    ("Travel to Schengen", ServiceKey::Schengen),
    ("GCC", ServiceKey::Gcc),
    ("GCC Visa", ServiceKey::Gcc),
    ("Travel to GCC", ServiceKey::Gcc),
    // Passports
    ("Ethiopian Passport Renewal", ServiceKey::EthiopianPp),
    ("Ethiopian PP Renewal", ServiceKey::EthiopianPp),
    ("Ethiopian Passport", ServiceKey::EthiopianPp),
    ("Filipina Passport Renewal", ServiceKey::FilipinaPp),
    ("Filipina PP Renewal", ServiceKey::FilipinaPp),
    ("Filipino Passport Renewal", ServiceKey::FilipinaPp),
    ("Philippine Passport Renewal", ServiceKey::FilipinaPp),
];

/// Lowercases, turns separators into spaces and collapses whitespace so that
/// "Travel_to_Lebanon – Single Entry" and "travel to lebanon single entry"
/// compare equal.
pub fn normalize_label(label: &str) -> String {
    label
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '_' | '-' | '–' | '—' | '/' | ':' | '(' | ')' => ' ',
            other => other,
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Maps a free-text service label to its service key. Canonical key names
/// ("ttlSingle", "ethiopianPP") are accepted as well as every label in
/// [`SERVICE_LABELS`]; anything else is `None`.
pub fn label_to_service_key(label: &str) -> Option<ServiceKey> {
    if let Ok(key) = ServiceKey::from_str(label) {
        return Some(key);
    }

    let normalized = normalize_label(label);
    if normalized.is_empty() {
        return None;
    }

    SERVICE_LABELS
        .iter()
        .find(|(known, _)| normalize_label(known) == normalized)
        .map(|(_, key)| *key)
}
