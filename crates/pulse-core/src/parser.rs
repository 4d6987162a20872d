//! Lenient reader for both streams
//!
//! Files are read whole and decoded lossily, so a file that another process
//! is still appending to parses up to whatever was flushed. Malformed lines
//! are counted and skipped; nothing here fails on content.

use crate::error::Result;
use crate::record::{Details, InspectionKind, InspectionRecord, Level, LogRecord, SemanticMetadata};
use crate::wire::{self, ENTRY_SEPARATOR};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

lazy_static! {
    static ref HEALTH_RE: Regex =
        Regex::new(r"HEALTH:\s*(-?\d+)%\s*\(raw:\s*(-?\d+),\s*Δ\s*([+-]?\d+)\)").unwrap();
}

/// Records recovered from one stream plus the number of lines that were skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome<T> {
    pub records: Vec<T>,
    pub errors: usize,
}

impl<T> Default for ParseOutcome<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            errors: 0,
        }
    }
}

impl<T> ParseOutcome<T> {
    /// Fold another outcome into this one, keeping record order.
    pub fn merge(&mut self, other: ParseOutcome<T>) {
        self.records.extend(other.records);
        self.errors += other.errors;
    }
}

/// Parse an emitter file.
///
/// Only an unreadable file is an error; content problems are counted in
/// [`ParseOutcome::errors`].
pub fn parse_log_file(path: &Path) -> Result<ParseOutcome<LogRecord>> {
    let text = read_lossy(path)?;
    let outcome = parse_log_str(&text);
    tracing::debug!(
        path = %path.display(),
        records = outcome.records.len(),
        errors = outcome.errors,
        "parsed log file"
    );
    Ok(outcome)
}

/// Parse an inspector file.
pub fn parse_debug_file(path: &Path) -> Result<ParseOutcome<InspectionRecord>> {
    let text = read_lossy(path)?;
    let outcome = parse_debug_str(&text);
    tracing::debug!(
        path = %path.display(),
        records = outcome.records.len(),
        errors = outcome.errors,
        "parsed debug file"
    );
    Ok(outcome)
}

const LOG_HEADER_FIELDS: usize = 5;
const DEBUG_HEADER_FIELDS: usize = 4;

pub fn parse_log_str(text: &str) -> ParseOutcome<LogRecord> {
    parse_blocks(text, LOG_HEADER_FIELDS, parse_log_block)
}

pub fn parse_debug_str(text: &str) -> ParseOutcome<InspectionRecord> {
    parse_blocks(text, DEBUG_HEADER_FIELDS, parse_debug_block)
}

fn read_lossy(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Header line plus its indented body lines.
struct RawBlock<'a> {
    header: &'a str,
    body: Vec<&'a str>,
}

fn parse_blocks<T>(text: &str, header_fields: usize, parse: fn(&RawBlock<'_>) -> Option<T>) -> ParseOutcome<T> {
    let (blocks, mut errors) = split_blocks(text, header_fields);
    let mut records = Vec::with_capacity(blocks.len());
    for block in &blocks {
        match parse(block) {
            Some(record) => records.push(record),
            None => errors += 1,
        }
    }
    ParseOutcome { records, errors }
}

fn split_blocks(text: &str, header_fields: usize) -> (Vec<RawBlock<'_>>, usize) {
    let mut blocks = Vec::new();
    let mut current: Option<RawBlock<'_>> = None;
    let mut errors = 0;

    for line in text.lines() {
        let trimmed = line.trim();
        if line.starts_with('[') && current.is_some() && split_header(line, header_fields).is_none() {
            // A torn line inside an entry does not end it.
            errors += 1;
        } else if line.starts_with('[') {
            // An unterminated previous block still counts if its header parses.
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            current = Some(RawBlock {
                header: line,
                body: Vec::new(),
            });
        } else if line.trim_end() == ENTRY_SEPARATOR {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
        } else if wire::is_banner_line(line) {
            continue;
        } else if let (Some(block), true) = (current.as_mut(), line.starts_with(char::is_whitespace)) {
            // Whitespace-only lines are kept: they can be blank lines of a multiline value.
            block.body.push(line);
        } else if trimmed.is_empty() {
            continue;
        } else {
            errors += 1;
        }
    }

    if let Some(block) = current {
        blocks.push(block);
    }
    (blocks, errors)
}

/// `[timestamp] LEVEL` prefix and the remaining `|`-separated fields.
fn split_header(header: &str, fields: usize) -> Option<(chrono::NaiveDateTime, Vec<&str>)> {
    let rest = header.strip_prefix('[')?;
    let (ts_text, rest) = rest.split_once(']')?;
    let timestamp = wire::parse_timestamp(ts_text)?;
    let parts: Vec<&str> = rest
        .splitn(fields, wire::HEADER_FIELD_SEPARATOR)
        .map(str::trim)
        .collect();
    if parts.len() < fields || parts.iter().take(fields - 1).any(|p| p.is_empty()) {
        return None;
    }
    Some((timestamp, parts))
}

fn parse_log_block(block: &RawBlock<'_>) -> Option<LogRecord> {
    let (timestamp, parts) = split_header(block.header, LOG_HEADER_FIELDS)?;
    let level: Level = parts[0].parse().ok()?;
    let caps = HEALTH_RE.captures(parts[4])?;
    let normalized_health = caps[1].parse().ok()?;
    let raw_health = caps[2].parse().ok()?;
    let health_impact = caps[3].trim_start_matches('+').parse().ok()?;

    let mut record = LogRecord {
        timestamp,
        level,
        component: parts[1].to_string(),
        identity: parts[2].to_string(),
        context_id: parts[3].to_string(),
        event: String::new(),
        raw_health,
        normalized_health,
        health_impact,
        context: None,
        details: Details::new(),
        semantic: None,
    };

    let mut reader = SectionReader::default();
    let mut section = LogSection::None;
    let mut context = BTreeMap::new();
    let mut semantic = Details::new();

    for line in &block.body {
        if reader.continue_block(line).is_some() {
            continue;
        }
        flush(&mut reader, section, &mut record.details, &mut semantic);

        if indent_of(line) <= 2 {
            let trimmed = line.trim();
            section = if trimmed == wire::CONTEXT_HEADER {
                LogSection::Context
            } else if trimmed == wire::DETAILS_HEADER {
                LogSection::Details
            } else if trimmed == wire::SEMANTIC_HEADER {
                LogSection::Semantic
            } else if let Some(event) = trimmed.strip_prefix(wire::EVENT_HEADER) {
                record.event = event.trim().to_string();
                LogSection::None
            } else {
                LogSection::Unknown
            };
            continue;
        }

        match section {
            LogSection::Context => {
                if let Some((key, value)) = wire::split_field(line) {
                    context.insert(key, value.to_string());
                }
            }
            LogSection::Details | LogSection::Semantic => reader.field(line),
            LogSection::None | LogSection::Unknown => {}
        }
    }
    flush(&mut reader, section, &mut record.details, &mut semantic);

    if !context.is_empty() {
        record.context = Some(context);
    }
    if !semantic.is_empty() {
        record.semantic = Some(semantic_from_fields(semantic));
    }
    Some(record)
}

/// Move completed fields into the map that owns the current section.
fn flush(reader: &mut SectionReader, section: LogSection, details: &mut Details, semantic: &mut Details) {
    match section {
        LogSection::Details => reader.finish_into(details),
        LogSection::Semantic => reader.finish_into(semantic),
        _ => reader.discard(),
    }
}

fn parse_debug_block(block: &RawBlock<'_>) -> Option<InspectionRecord> {
    let (timestamp, parts) = split_header(block.header, DEBUG_HEADER_FIELDS)?;
    let kind: InspectionKind = parts[0].parse().ok()?;
    if parts[3].is_empty() {
        return None;
    }

    let mut record = InspectionRecord {
        timestamp,
        kind,
        component: parts[1].to_string(),
        identity: parts[2].to_string(),
        context_id: parts[3].to_string(),
        label: String::new(),
        call_site: None,
        expected: None,
        actual: None,
        details: Details::new(),
    };

    let mut reader = SectionReader::default();
    let mut in_state = false;

    for line in &block.body {
        if reader.continue_block(line).is_some() {
            continue;
        }
        if in_state {
            reader.finish_into(&mut record.details);
        }

        if indent_of(line) <= 2 {
            let trimmed = line.trim();
            in_state = trimmed == wire::STATE_HEADER;
            if let Some(label) = trimmed.strip_prefix(wire::EVENT_HEADER) {
                record.label = label.trim().to_string();
            } else if let Some(site) = trimmed.strip_prefix(wire::CALL_SITE_HEADER) {
                record.call_site = Some(site.trim().to_string());
            } else if let Some(expected) = trimmed.strip_prefix(wire::EXPECTED_HEADER) {
                record.expected = Some(wire::decode_value(expected));
            } else if let Some(actual) = trimmed.strip_prefix(wire::ACTUAL_HEADER) {
                record.actual = Some(wire::decode_value(actual));
            }
            continue;
        }

        if in_state {
            reader.field(line);
        }
    }
    if in_state {
        reader.finish_into(&mut record.details);
    }
    Some(record)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogSection {
    None,
    Context,
    Details,
    Semantic,
    Unknown,
}

/// Accumulates `key: value` fields, including `key: |` multiline blocks.
#[derive(Default)]
struct SectionReader {
    fields: Details,
    pending: Option<(String, Vec<String>)>,
}

const BLOCK_INDENT_WIDTH: usize = 6;

impl SectionReader {
    /// Consume a continuation line of a pending multiline value.
    fn continue_block(&mut self, line: &str) -> Option<()> {
        let (_, lines) = self.pending.as_mut()?;
        if indent_of(line) >= BLOCK_INDENT_WIDTH {
            lines.push(line[BLOCK_INDENT_WIDTH..].to_string());
            return Some(());
        }
        self.close_pending();
        None
    }

    fn field(&mut self, line: &str) {
        self.close_pending();
        let Some((key, value)) = wire::split_field(line) else {
            return;
        };
        if value == wire::MULTILINE_MARKER {
            self.pending = Some((key, Vec::new()));
        } else {
            self.fields.insert(key, wire::decode_value(value));
        }
    }

    fn close_pending(&mut self) {
        if let Some((key, lines)) = self.pending.take() {
            self.fields.insert(key, Value::String(lines.join("\n")));
        }
    }

    fn finish_into(&mut self, target: &mut Details) {
        self.close_pending();
        target.append(&mut self.fields);
    }

    fn discard(&mut self) {
        self.pending = None;
        self.fields.clear();
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn semantic_from_fields(mut fields: Details) -> SemanticMetadata {
    let mut take_str = |key: &str| match fields.remove(key) {
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
        None => None,
    };
    let operation_type = take_str("operation_type").map(Into::into);
    let operation_subtype = take_str("operation_subtype");
    let error_type = take_str("error_type").map(Into::into);
    let recovery_hint = take_str("recovery_hint").map(Into::into);
    let recovery_strategy = take_str("recovery_strategy");

    SemanticMetadata {
        operation_type,
        operation_subtype,
        error_type,
        error_details: object_to_details(fields.remove("error_details")),
        recovery_hint,
        recovery_strategy,
        recovery_params: object_to_details(fields.remove("recovery_params")),
    }
}

fn object_to_details(value: Option<Value>) -> Details {
    match value {
        Some(Value::Object(map)) => map.into_iter().collect(),
        _ => Details::new(),
    }
}
