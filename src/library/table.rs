use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::{PlayerError, Result};

use super::model::TrackRecord;

const WRAPPER_PREFIX: &str = "const musicData =";

/// Read the track table from disk.
pub fn load_table(path: &Path) -> Result<Vec<TrackRecord>> {
    let text = fs::read_to_string(path)?;
    parse_table(&text)
}

/// Parse a track table.
///
/// Accepts a bare JSON array or the `const musicData = [...];` script form written
/// by the analyzer. Rows that are not arrays are skipped; fields inside a row are
/// coerced one by one so a bad field only blanks that field.
pub fn parse_table(text: &str) -> Result<Vec<TrackRecord>> {
    let payload = json_payload(text)?;
    let value: Value = serde_json::from_str(payload)?;
    let Value::Array(rows) = value else {
        return Err(PlayerError::Table("top level is not an array".to_string()));
    };

    let mut records = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        match row {
            Value::Array(fields) => records.push(record_from_fields(fields)),
            other => log::warn!("track table row {i} skipped: expected array, got {other}"),
        }
    }
    Ok(records)
}

fn json_payload(text: &str) -> Result<&str> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix(WRAPPER_PREFIX)
        .unwrap_or(trimmed)
        .trim_start();
    if body.starts_with('[') {
        // The script form may end with `;` and an `export default musicData;` line.
        if let Some(end) = body.rfind(']') {
            return Ok(&body[..=end]);
        }
    }
    match (body.find('['), body.rfind(']')) {
        (Some(start), Some(end)) if start < end => Ok(&body[start..=end]),
        _ => Err(PlayerError::Table("no JSON array found".to_string())),
    }
}

fn record_from_fields(fields: &[Value]) -> TrackRecord {
    let field = |i: usize| fields.get(i).unwrap_or(&Value::Null);

    TrackRecord {
        file_reference: text_field(field(0)),
        artist: text_field(field(1)),
        title: text_field(field(2)),
        date: text_field(field(3)),
        genre: text_field(field(4)),
        nominal_duration: number_field(field(5)),
        details_markup: optional_text(field(6)),
        cover_image: optional_text(field(7)),
        amplitude: amplitude_field(field(8)),
        fingerprint: optional_text(field(9)),
    }
}

fn text_field(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn optional_text(v: &Value) -> Option<String> {
    let s = text_field(v);
    if s.trim().is_empty() { None } else { Some(s) }
}

fn number_field(v: &Value) -> f64 {
    let n = match v {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if n.is_finite() && n > 0.0 { n } else { 0.0 }
}

/// The amplitude column is normally a JSON string; a literal array is accepted too.
fn amplitude_field(v: &Value) -> Vec<f32> {
    let parsed;
    let array = match v {
        Value::Array(items) => items,
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => {
                parsed = items;
                &parsed
            }
            Ok(_) | Err(_) => {
                log::debug!("amplitude column is not a JSON array");
                return Vec::new();
            }
        },
        _ => return Vec::new(),
    };

    array
        .iter()
        .map(|item| {
            let a = item.as_f64().unwrap_or(0.0);
            if a.is_finite() { a.clamp(0.0, 1.0) as f32 } else { 0.0 }
        })
        .collect()
}
