use crate::ledger::record::{AttributeMap, Record, RecordMap};
use crate::ledger::store::write_atomic;
use anyhow::Result;
use chrono::DateTime;
use chrono_tz::Tz;
use serde_json::Value;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

const HARDWARE_HEADER: &str = "--- Hardware Info ---";
const IP_DETAILS_HEADER: &str = "--- IP Details ---";
const NONE_MARKER: &str = "(none)";
const MISSING: &str = "-";
const ESCAPE: char = '\\';

#[derive(Debug, Clone)]
pub struct ReportStyle {
    pub banner: String,
    pub timezone: Tz,
}

impl Default for ReportStyle {
    fn default() -> Self {
        Self {
            banner: "Record".to_string(),
            timezone: chrono_tz::UTC,
        }
    }
}

/// One block read back from a rendered report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportBlock {
    pub key: String,
    pub email: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub hardware: Vec<(String, String)>,
    pub ip_details: Vec<(String, String)>,
}

impl ReportBlock {
    /// The block a record is expected to produce.
    pub fn expected_for(record: &Record) -> Self {
        Self {
            key: single_line(&record.key),
            email: record.email.as_deref().map(single_line),
            ip: record.ip.as_deref().map(single_line),
            user_agent: record.user_agent.as_deref().map(single_line),
            hardware: attribute_lines(&record.hardware),
            ip_details: attribute_lines(&record.ip_details),
        }
    }
}

/// Regenerate the whole report from the current mapping.
pub fn render(records: &RecordMap, style: &ReportStyle) -> String {
    let mut out = String::new();
    for (index, record) in records.values().enumerate() {
        render_block(&mut out, index + 1, record, style);
    }
    out
}

pub fn write_report(path: &Path, records: &RecordMap, style: &ReportStyle) -> Result<()> {
    write_atomic(path, render(records, style).as_bytes())
}

/// Rewrite the report only when its content differs from the store's
/// rendering. Returns whether a write happened.
pub fn sync_report(path: &Path, records: &RecordMap, style: &ReportStyle) -> Result<bool> {
    let rendered = render(records, style);
    if let Ok(existing) = fs::read_to_string(path) {
        if existing == rendered {
            return Ok(false);
        }
    }
    write_atomic(path, rendered.as_bytes())?;
    Ok(true)
}

fn render_block(out: &mut String, ordinal: usize, record: &Record, style: &ReportStyle) {
    let _ = writeln!(out, "==== {} {} ====", style.banner, ordinal);
    let _ = writeln!(
        out,
        "Timestamp : {}",
        human_timestamp(record.timestamp.as_deref(), style.timezone)
    );
    let _ = writeln!(out, "Key       : {}", escape_value(&single_line(&record.key)));
    let _ = writeln!(out, "Email     : {}", or_missing(record.email.as_deref()));
    let _ = writeln!(out, "IP        : {}", or_missing(record.ip.as_deref()));
    let _ = writeln!(out, "UserAgent : {}", or_missing(record.user_agent.as_deref()));
    render_section(out, HARDWARE_HEADER, &record.hardware);
    render_section(out, IP_DETAILS_HEADER, &record.ip_details);
    out.push('\n');
}

fn render_section(out: &mut String, header: &str, attrs: &AttributeMap) {
    let _ = writeln!(out, "{header}");
    if attrs.is_empty() {
        let _ = writeln!(out, "{NONE_MARKER}");
        return;
    }
    for (k, v) in attribute_lines(attrs) {
        let _ = writeln!(out, "{}: {v}", escape_key(&k));
    }
}

fn attribute_lines(attrs: &AttributeMap) -> Vec<(String, String)> {
    attrs
        .iter()
        .map(|(k, v)| (single_line(k), single_line(&scalar_text(v))))
        .collect()
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn human_timestamp(raw: Option<&str>, tz: Tz) -> String {
    let Some(raw) = raw else {
        return MISSING.to_string();
    };
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts
            .with_timezone(&tz)
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string(),
        Err(_) => single_line(raw),
    }
}

fn or_missing(value: Option<&str>) -> String {
    value
        .map(|v| escape_value(&single_line(v)))
        .unwrap_or_else(|| MISSING.to_string())
}

/// A header value that reads as the missing marker, or already starts with
/// the escape, gets one leading escape.
fn escape_value(value: &str) -> String {
    if value == MISSING || value.starts_with(ESCAPE) {
        format!("{ESCAPE}{value}")
    } else {
        value.to_string()
    }
}

fn unescape_value(value: &str) -> String {
    value.strip_prefix(ESCAPE).unwrap_or(value).to_string()
}

/// Attribute keys escape the escape char, every `:`, and a leading `=` so a
/// key can never end early or pass for a banner line.
fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for (i, c) in key.chars().enumerate() {
        if c == ESCAPE || c == ':' || (i == 0 && c == '=') {
            out.push(ESCAPE);
        }
        out.push(c);
    }
    out
}

/// Split `key: value` at the first unescaped separator.
fn split_attribute(line: &str) -> Option<(String, String)> {
    let mut key = String::new();
    let mut chars = line.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            ESCAPE => {
                if let Some((_, next)) = chars.next() {
                    key.push(next);
                }
            }
            ':' if line[i + 1..].starts_with(' ') => {
                return Some((key, line[i + 2..].to_string()));
            }
            _ => key.push(c),
        }
    }
    None
}

/// Control characters would break the block layout.
fn single_line(input: &str) -> String {
    input
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

#[derive(Clone, Copy)]
enum Section {
    Header,
    Hardware,
    IpDetails,
}

/// Read a rendered report back into blocks, in file order.
pub fn parse_blocks(text: &str) -> Vec<ReportBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<ReportBlock> = None;
    let mut section = Section::Header;

    for line in text.lines() {
        if line.starts_with("==== ") && line.ends_with(" ====") {
            if let Some(done) = current.take() {
                blocks.push(done);
            }
            current = Some(ReportBlock::default());
            section = Section::Header;
            continue;
        }
        let Some(block) = current.as_mut() else {
            continue;
        };
        if line == HARDWARE_HEADER {
            section = Section::Hardware;
            continue;
        }
        if line == IP_DETAILS_HEADER {
            section = Section::IpDetails;
            continue;
        }
        if line.is_empty() || line == NONE_MARKER {
            continue;
        }

        match section {
            Section::Header => {
                let Some((label, value)) = line.split_once(" : ") else {
                    continue;
                };
                let optional = (value != MISSING).then(|| unescape_value(value));
                match label.trim() {
                    "Key" => block.key = unescape_value(value),
                    "Email" => block.email = optional,
                    "IP" => block.ip = optional,
                    "UserAgent" => block.user_agent = optional,
                    _ => {}
                }
            }
            Section::Hardware | Section::IpDetails => {
                let Some(pair) = split_attribute(line) else {
                    continue;
                };
                if matches!(section, Section::Hardware) {
                    block.hardware.push(pair);
                } else {
                    block.ip_details.push(pair);
                }
            }
        }
    }
    if let Some(done) = current.take() {
        blocks.push(done);
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(key: &str) -> Record {
        let mut record = Record::empty(key);
        record.email = Some(format!("{key}@example.com"));
        record.ip = Some("192.0.2.10".into());
        record.user_agent = Some("Mozilla/5.0 (X11; Linux x86_64)".into());
        record.hardware.insert("cpu".into(), json!("x86"));
        record.hardware.insert("cores".into(), json!(8));
        record.ip_details.insert("city".into(), json!("Lisbon"));
        record.timestamp = Some("2026-05-04T10:11:12.000000Z".into());
        record
    }

    #[test]
    fn renders_one_block_per_record_with_fields() {
        let mut map = RecordMap::new();
        map.insert("d1".into(), record("d1"));
        map.insert("d2".into(), Record::empty("d2"));

        let text = render(&map, &ReportStyle::default());
        assert_eq!(text.matches("==== Record ").count(), 2);
        assert!(text.contains("Timestamp : 2026-05-04 10:11:12 UTC"));
        assert!(text.contains("Key       : d1"));
        assert!(text.contains("cores: 8"));
        assert!(text.contains("city: Lisbon"));
        assert!(text.contains("(none)"));
    }

    #[test]
    fn timestamps_follow_configured_timezone() {
        let mut map = RecordMap::new();
        map.insert("d1".into(), record("d1"));
        let style = ReportStyle {
            banner: "Client".into(),
            timezone: chrono_tz::Asia::Tokyo,
        };
        let text = render(&map, &style);
        assert!(text.starts_with("==== Client 1 ===="));
        assert!(text.contains("Timestamp : 2026-05-04 19:11:12 JST"));
    }

    #[test]
    fn unparseable_timestamp_is_rendered_verbatim() {
        let mut rec = Record::empty("d1");
        rec.timestamp = Some("yesterday".into());
        let mut map = RecordMap::new();
        map.insert("d1".into(), rec);
        assert!(render(&map, &ReportStyle::default()).contains("Timestamp : yesterday"));
    }

    #[test]
    fn parse_blocks_reads_back_expected_fields() {
        let mut map = RecordMap::new();
        map.insert("d1".into(), record("d1"));
        map.insert("d2".into(), Record::empty("d2"));

        let blocks = parse_blocks(&render(&map, &ReportStyle::default()));
        let expected: Vec<ReportBlock> = map.values().map(ReportBlock::expected_for).collect();
        assert_eq!(blocks, expected);
    }

    #[test]
    fn sync_report_only_writes_on_drift() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("report.txt");
        let mut map = RecordMap::new();
        map.insert("d1".into(), record("d1"));
        let style = ReportStyle::default();

        assert!(sync_report(&path, &map, &style).expect("first"));
        assert!(!sync_report(&path, &map, &style).expect("second"));

        fs::write(&path, "stale").expect("tamper");
        assert!(sync_report(&path, &map, &style).expect("third"));
        assert_eq!(fs::read_to_string(&path).expect("read"), render(&map, &style));
    }

    #[test]
    fn separators_and_markers_inside_values_read_back_intact() {
        let mut odd = Record::empty("d1");
        odd.email = Some("-".into());
        odd.user_agent = Some("\\agent".into());
        odd.hardware.insert("screen: primary".into(), json!("1920x1080"));
        odd.hardware.insert("path\\to:x".into(), json!("a: b"));
        odd.hardware.insert("==== Record 9 ====".into(), json!("x ===="));
        odd.hardware.insert(String::new(), json!(""));
        let mut dash = Record::empty("-");
        dash.ip_details.insert("-".into(), json!("-"));

        let mut map = RecordMap::new();
        map.insert("d1".into(), odd);
        map.insert("-".into(), dash);

        let text = render(&map, &ReportStyle::default());
        assert!(text.contains("Email     : \\-\n"));
        assert!(text.contains("screen\\: primary: 1920x1080\n"));

        let blocks = parse_blocks(&text);
        let expected: Vec<ReportBlock> = map.values().map(ReportBlock::expected_for).collect();
        assert_eq!(blocks, expected);
    }

    #[test]
    fn multiline_values_stay_on_one_line() {
        let mut rec = Record::empty("d1");
        rec.hardware.insert("note".into(), json!("line1\nline2"));
        let mut map = RecordMap::new();
        map.insert("d1".into(), rec.clone());

        let blocks = parse_blocks(&render(&map, &ReportStyle::default()));
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0], ReportBlock::expected_for(&rec));
    }
}
