//! Privacy helpers: anonymization, input sanitization and hashing.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Top-level fields that identify a person or device.
const IDENTIFIER_FIELDS: &[&str] = &["userId", "user_id", "deviceId", "device_id"];

/// Strip identifiers and coarsen the location of a record.
///
/// `location.lat` / `location.lng` are rounded to two decimal places (about
/// 1 km); identifier fields are removed from the top level. Non-object values
/// are returned unchanged.
pub fn anonymize_data(record: &Value) -> Value {
    let mut anonymized = record.clone();

    if let Value::Object(map) = &mut anonymized {
        for field in IDENTIFIER_FIELDS {
            map.remove(*field);
        }

        if let Some(Value::Object(location)) = map.get_mut("location") {
            for axis in ["lat", "lng"] {
                if let Some(coord) = location.get(axis).and_then(Value::as_f64) {
                    location.insert(axis.to_string(), Value::from(round_to_hundredths(coord)));
                }
            }
        }
    }

    anonymized
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Remove markup and script vectors from free-form user input.
pub fn sanitize_input(input: &str) -> String {
    let without_brackets: String = input.chars().filter(|c| *c != '<' && *c != '>').collect();

    let mut cleaned = strip_case_insensitive(&without_brackets, "javascript:");
    cleaned = strip_event_handlers(&cleaned);
    cleaned.trim().to_string()
}

fn strip_case_insensitive(haystack: &str, needle: &str) -> String {
    let lower = haystack.to_ascii_lowercase();
    let mut out = String::with_capacity(haystack.len());
    let mut last = 0;
    for (idx, _) in lower.match_indices(needle) {
        out.push_str(&haystack[last..idx]);
        last = idx + needle.len();
    }
    out.push_str(&haystack[last..]);
    out
}

/// Drops `on<word>=` attribute prefixes such as `onclick=`.
fn strip_event_handlers(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < bytes.len() {
        let at_word_start = i == 0 || !bytes[i - 1].is_ascii_alphanumeric();
        if at_word_start
            && i + 2 < bytes.len()
            && bytes[i].eq_ignore_ascii_case(&b'o')
            && bytes[i + 1].eq_ignore_ascii_case(&b'n')
            && bytes[i + 2].is_ascii_alphabetic()
        {
            let mut j = i + 2;
            while j < bytes.len() && bytes[j].is_ascii_alphabetic() {
                j += 1;
            }
            let mut k = j;
            while k < bytes.len() && bytes[k] == b' ' {
                k += 1;
            }
            if k < bytes.len() && bytes[k] == b'=' {
                i = k + 1;
                continue;
            }
        }

        // Only ASCII bytes are inspected above, so char boundaries hold here.
        let ch = input[i..].chars().next().unwrap_or_default();
        out.push(ch);
        i += ch.len_utf8().max(1);
    }

    out
}

/// SHA-256 hex digest of `data`.
pub fn hash_data(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()).as_slice())
}
