//! Text wire format for both streams
//!
//! A log record is one block:
//!
//! ```text
//! [2026-10-16 09:12:44.120] CHECK | validate | ana@box:4121 | validate-4121-1760... | HEALTH: 21% (raw: 10, Δ+10)
//!   EVENT: Checking: file-exists
//!   DETAILS:
//!     result: true
//! ---
//! ```
//!
//! Optional `CONTEXT:` (full-context levels only) precedes `EVENT:`, and an
//! optional `SEMANTIC:` block follows `DETAILS:`. Inspection records use the
//! same shape with a four-field header and `CALL SITE:` / `EXPECTED:` /
//! `ACTUAL:` / `STATE:` sections. Every block is rendered into one `String`
//! so the writer can append it with a single write call.

use crate::record::{Details, InspectionRecord, LogRecord, SemanticMetadata};
use chrono::NaiveDateTime;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Timestamp layout shared by both streams (millisecond precision).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
/// Line that terminates every block.
pub const ENTRY_SEPARATOR: &str = "---";
/// Prefix the emitter puts in front of check names.
pub const CHECK_EVENT_PREFIX: &str = "Checking: ";

pub(crate) const HEADER_FIELD_SEPARATOR: &str = " | ";
pub(crate) const CONTEXT_HEADER: &str = "CONTEXT:";
pub(crate) const EVENT_HEADER: &str = "EVENT:";
pub(crate) const DETAILS_HEADER: &str = "DETAILS:";
pub(crate) const SEMANTIC_HEADER: &str = "SEMANTIC:";
pub(crate) const CALL_SITE_HEADER: &str = "CALL SITE:";
pub(crate) const EXPECTED_HEADER: &str = "EXPECTED:";
pub(crate) const ACTUAL_HEADER: &str = "ACTUAL:";
pub(crate) const STATE_HEADER: &str = "STATE:";
pub(crate) const MULTILINE_MARKER: &str = "|";

const SECTION_INDENT: &str = "  ";
const FIELD_INDENT: &str = "    ";
const BLOCK_INDENT: &str = "      ";
const BANNER_RULE: &str = "════════════════════════════════════════════════════════════════";

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), TIMESTAMP_FORMAT).ok()
}

/// Signed delta as written in the header (`+10`, `-3`, `0`).
pub fn format_delta(delta: i64) -> String {
    if delta > 0 {
        format!("+{}", delta)
    } else {
        delta.to_string()
    }
}

/// Render one log record as a complete block, separator and newline included.
pub fn format_log_record(record: &LogRecord) -> String {
    let mut out = String::with_capacity(256);
    let fields = [
        record.level.to_string(),
        single_line(&record.component),
        single_line(&record.identity),
        single_line(&record.context_id),
        format!(
            "HEALTH: {}% (raw: {}, Δ{})",
            record.normalized_health,
            record.raw_health,
            format_delta(record.health_impact)
        ),
    ];
    let _ = writeln!(
        out,
        "[{}] {}",
        format_timestamp(&record.timestamp),
        fields.join(HEADER_FIELD_SEPARATOR)
    );

    if let Some(context) = &record.context {
        let _ = writeln!(out, "{}{}", SECTION_INDENT, CONTEXT_HEADER);
        for (key, value) in context {
            let _ = writeln!(out, "{}{}: {}", FIELD_INDENT, encode_key(key), single_line(value));
        }
    }

    let _ = writeln!(out, "{}{} {}", SECTION_INDENT, EVENT_HEADER, single_line(&record.event));

    if !record.details.is_empty() {
        let _ = writeln!(out, "{}{}", SECTION_INDENT, DETAILS_HEADER);
        write_values(&mut out, &record.details);
    }

    if let Some(semantic) = record.semantic.as_ref().filter(|s| !s.is_empty()) {
        let _ = writeln!(out, "{}{}", SECTION_INDENT, SEMANTIC_HEADER);
        write_values(&mut out, &semantic_fields(semantic));
    }

    out.push_str(ENTRY_SEPARATOR);
    out.push('\n');
    out
}

/// Render one inspection record as a complete block.
pub fn format_inspection_record(record: &InspectionRecord) -> String {
    let mut out = String::with_capacity(192);
    let fields = [
        record.kind.to_string(),
        single_line(&record.component),
        single_line(&record.identity),
        single_line(&record.context_id),
    ];
    let _ = writeln!(
        out,
        "[{}] {}",
        format_timestamp(&record.timestamp),
        fields.join(HEADER_FIELD_SEPARATOR)
    );
    let _ = writeln!(out, "{}{} {}", SECTION_INDENT, EVENT_HEADER, single_line(&record.label));
    if let Some(call_site) = &record.call_site {
        let _ = writeln!(out, "{}{} {}", SECTION_INDENT, CALL_SITE_HEADER, call_site);
    }
    if let Some(expected) = &record.expected {
        let _ = writeln!(out, "{}{} {}", SECTION_INDENT, EXPECTED_HEADER, expected);
    }
    if let Some(actual) = &record.actual {
        let _ = writeln!(out, "{}{} {}", SECTION_INDENT, ACTUAL_HEADER, actual);
    }
    if !record.details.is_empty() {
        let _ = writeln!(out, "{}{}", SECTION_INDENT, STATE_HEADER);
        write_values(&mut out, &record.details);
    }
    out.push_str(ENTRY_SEPARATOR);
    out.push('\n');
    out
}

/// Session banner written once when an inspector is enabled.
pub fn format_session_banner(component: &str, context_id: &str, pid: u32, started: &NaiveDateTime) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "╔{}╗", BANNER_RULE);
    let _ = writeln!(out, "║ Pulse Inspection Session - {}", component);
    let _ = writeln!(out, "║ Context ID: {}", context_id);
    let _ = writeln!(out, "║ PID: {}", pid);
    let _ = writeln!(out, "║ Started: {}", started.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "╚{}╝", BANNER_RULE);
    out
}

/// Lines belonging to the session banner, which parsers skip.
pub fn is_banner_line(line: &str) -> bool {
    matches!(line.trim_start().chars().next(), Some('╔' | '║' | '╚'))
}

/// Encode a value for a `key: value` line.
///
/// Strings are written raw unless the raw text would read back as
/// something else; everything else is compact JSON.
pub fn encode_value(value: &Value) -> String {
    match value {
        Value::String(s) if !string_needs_quoting(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Inverse of [`encode_value`] for single-line values.
pub fn decode_value(text: &str) -> Value {
    let text = text.trim();
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn string_needs_quoting(s: &str) -> bool {
    s.is_empty()
        || s == MULTILINE_MARKER
        || s.trim() != s
        || serde_json::from_str::<Value>(s).is_ok()
}

fn write_values(out: &mut String, values: &Details) {
    for (key, value) in values {
        let key = encode_key(key);
        match value {
            Value::String(s) if s.contains('\n') => {
                let _ = writeln!(out, "{}{}: {}", FIELD_INDENT, key, MULTILINE_MARKER);
                for line in s.split('\n') {
                    let _ = writeln!(out, "{}{}", BLOCK_INDENT, line);
                }
            }
            other => {
                let _ = writeln!(out, "{}{}: {}", FIELD_INDENT, key, encode_value(other));
            }
        }
    }
}

fn semantic_fields(semantic: &SemanticMetadata) -> Details {
    let mut fields = BTreeMap::new();
    if let Some(v) = &semantic.operation_type {
        fields.insert("operation_type".to_string(), Value::String(v.to_string()));
    }
    if let Some(v) = &semantic.operation_subtype {
        fields.insert("operation_subtype".to_string(), Value::String(v.clone()));
    }
    if let Some(v) = &semantic.error_type {
        fields.insert("error_type".to_string(), Value::String(v.to_string()));
    }
    if !semantic.error_details.is_empty() {
        fields.insert("error_details".to_string(), details_object(&semantic.error_details));
    }
    if let Some(v) = &semantic.recovery_hint {
        fields.insert("recovery_hint".to_string(), Value::String(v.to_string()));
    }
    if let Some(v) = &semantic.recovery_strategy {
        fields.insert("recovery_strategy".to_string(), Value::String(v.clone()));
    }
    if !semantic.recovery_params.is_empty() {
        fields.insert("recovery_params".to_string(), details_object(&semantic.recovery_params));
    }
    fields
}

fn details_object(details: &Details) -> Value {
    Value::Object(details.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

/// Keys are written bare unless that would not read back, then as a JSON string.
pub(crate) fn encode_key(key: &str) -> String {
    let bare = !key.is_empty()
        && !key.contains(':')
        && !key.starts_with('"')
        && key.trim() == key
        && !key.chars().any(char::is_control);
    if bare {
        key.to_string()
    } else {
        Value::String(key.to_string()).to_string()
    }
}

/// Split a `key: value` line into the decoded key and the raw value text.
pub(crate) fn split_field(line: &str) -> Option<(String, &str)> {
    let line = line.trim();
    if !line.starts_with('"') {
        let (key, value) = line.split_once(':')?;
        return Some((key.trim().to_string(), value.trim()));
    }
    let mut stream = serde_json::Deserializer::from_str(line).into_iter::<String>();
    let key = stream.next()?.ok()?;
    let value = line[stream.byte_offset()..].trim_start().strip_prefix(':')?;
    Some((key, value.trim()))
}

/// Header fields and event labels must stay on one line.
fn single_line(text: &str) -> String {
    if text.contains('\n') || text.contains('\r') {
        text.replace(['\n', '\r'], " ")
    } else {
        text.to_string()
    }
}
