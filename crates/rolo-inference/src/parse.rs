//! Parsing of backend output.
//!
//! Output may be wrapped in markdown code fences; those are removed before
//! parsing. Field values are normalized here so nothing downstream sees an
//! empty string or an out-of-range birthday.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value as JsonValue};
use tracing::warn;

use rolo_core::{
    is_valid_birthday_day, is_valid_birthday_month, ExtractedFields, RawFilter, RawQuerySpec,
    RawSort,
};

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"```(?:json|JSON)?[ \t]*\r?\n?").expect("code fence pattern is valid")
});

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Remove every markdown fence marker and trim.
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").trim().to_string()
}

/// Strip fences and parse as JSON.
pub fn parse_json(text: &str) -> std::result::Result<JsonValue, String> {
    let cleaned = strip_code_fences(text);
    if cleaned.is_empty() {
        return Err("empty response".to_string());
    }
    serde_json::from_str(&cleaned).map_err(|e| format!("invalid JSON: {}", e))
}

fn get<'a>(obj: &'a Map<String, JsonValue>, camel: &str, snake: &str) -> Option<&'a JsonValue> {
    obj.get(camel)
        .or_else(|| obj.get(snake))
        .filter(|v| !v.is_null())
}

fn text(obj: &Map<String, JsonValue>, camel: &str, snake: &str) -> Option<String> {
    let value = match get(obj, camel, snake)? {
        JsonValue::String(s) => s.trim().to_string(),
        JsonValue::Number(n) => n.to_string(),
        _ => return None,
    };
    (!value.is_empty()).then_some(value)
}

fn month_from_name(name: &str) -> Option<i64> {
    let name = name.trim().to_lowercase();
    if name.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|m| m.starts_with(&name))
        .map(|i| i as i64 + 1)
}

fn integer(value: &JsonValue, allow_month_name: bool) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        JsonValue::String(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| allow_month_name.then(|| month_from_name(s)).flatten()),
        _ => None,
    }
}

fn birthday_part(
    obj: &Map<String, JsonValue>,
    camel: &str,
    snake: &str,
    valid: fn(i32) -> bool,
) -> Option<i32> {
    let raw = get(obj, camel, snake)?;
    let parsed = integer(raw, camel == "birthdayMonth")
        .and_then(|v| i32::try_from(v).ok())
        .filter(|v| valid(*v));
    if parsed.is_none() {
        warn!(
            subsystem = "inference",
            component = "extractor",
            field = camel,
            value = %raw,
            "Dropping out-of-range birthday value"
        );
    }
    parsed
}

/// Build extracted fields from one JSON object. Returns `None` when the
/// value is not an object or has no usable name.
pub fn fields_from_value(value: &JsonValue) -> Option<ExtractedFields> {
    let obj = value.as_object()?;
    let name = text(obj, "name", "name")?;
    Some(ExtractedFields {
        name,
        company: text(obj, "company", "company"),
        role: text(obj, "role", "role"),
        email: text(obj, "email", "email"),
        phone: text(obj, "phone", "phone"),
        personal_details: text(obj, "personalDetails", "personal_details"),
        notes: text(obj, "notes", "notes"),
        source: text(obj, "source", "source"),
        birthday_month: birthday_part(obj, "birthdayMonth", "birthday_month", is_valid_birthday_month),
        birthday_day: birthday_part(obj, "birthdayDay", "birthday_day", is_valid_birthday_day),
        children: text(obj, "children", "children"),
    })
}

/// Interpret a translation result. The top level must be an object;
/// malformed filter entries are skipped and left for validation to report.
pub fn query_spec_from_value(value: &JsonValue) -> Option<RawQuerySpec> {
    let obj = value.as_object()?;

    let filters = obj
        .get("filters")
        .and_then(JsonValue::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let parsed = serde_json::from_value::<RawFilter>(entry.clone()).ok();
                    if parsed.is_none() {
                        warn!(
                            subsystem = "inference",
                            component = "extractor",
                            entry = %entry,
                            "Skipping malformed filter entry"
                        );
                    }
                    parsed
                })
                .collect()
        })
        .unwrap_or_default();

    let sort = obj
        .get("sort")
        .filter(|v| v.is_object())
        .and_then(|v| serde_json::from_value::<RawSort>(v.clone()).ok());

    let summary = obj
        .get("summary")
        .and_then(JsonValue::as_str)
        .map(str::to_string);

    Some(RawQuerySpec {
        filters,
        sort,
        summary,
    })
}
