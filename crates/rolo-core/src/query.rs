//! Structured query types for natural-language contact search.
//!
//! The completion backend emits a [`RawQuerySpec`] whose field and operator
//! names are free text. [`QueryFilter::from_raw`] checks each entry against
//! the declared field list and operator vocabulary; anything else is dropped
//! before a store ever sees it. The owner scope is not a field here at all,
//! so no translated filter can name it.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::models::ContactRecord;

// =============================================================================
// FIELDS
// =============================================================================

/// Storage type of a queryable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Timestamp,
}

/// Contact fields that a query may filter or sort on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactField {
    Name,
    Company,
    Role,
    Email,
    Phone,
    PersonalDetails,
    Notes,
    Source,
    BirthdayMonth,
    BirthdayDay,
    Children,
    CreatedAt,
    UpdatedAt,
}

impl ContactField {
    pub const ALL: [ContactField; 13] = [
        ContactField::Name,
        ContactField::Company,
        ContactField::Role,
        ContactField::Email,
        ContactField::Phone,
        ContactField::PersonalDetails,
        ContactField::Notes,
        ContactField::Source,
        ContactField::BirthdayMonth,
        ContactField::BirthdayDay,
        ContactField::Children,
        ContactField::CreatedAt,
        ContactField::UpdatedAt,
    ];

    /// Resolve a field name as the backend writes it (camelCase), also
    /// accepting the snake_case column name.
    pub fn from_name(name: &str) -> Option<Self> {
        let field = match name.trim() {
            "name" => ContactField::Name,
            "company" => ContactField::Company,
            "role" => ContactField::Role,
            "email" => ContactField::Email,
            "phone" => ContactField::Phone,
            "personalDetails" | "personal_details" => ContactField::PersonalDetails,
            "notes" => ContactField::Notes,
            "source" => ContactField::Source,
            "birthdayMonth" | "birthday_month" => ContactField::BirthdayMonth,
            "birthdayDay" | "birthday_day" => ContactField::BirthdayDay,
            "children" => ContactField::Children,
            "createdAt" | "created_at" => ContactField::CreatedAt,
            "updatedAt" | "updated_at" => ContactField::UpdatedAt,
            _ => return None,
        };
        Some(field)
    }

    /// Name used in prompts and query specs.
    pub fn query_name(self) -> &'static str {
        match self {
            ContactField::Name => "name",
            ContactField::Company => "company",
            ContactField::Role => "role",
            ContactField::Email => "email",
            ContactField::Phone => "phone",
            ContactField::PersonalDetails => "personalDetails",
            ContactField::Notes => "notes",
            ContactField::Source => "source",
            ContactField::BirthdayMonth => "birthdayMonth",
            ContactField::BirthdayDay => "birthdayDay",
            ContactField::Children => "children",
            ContactField::CreatedAt => "createdAt",
            ContactField::UpdatedAt => "updatedAt",
        }
    }

    /// Database column name.
    pub fn column(self) -> &'static str {
        match self {
            ContactField::Name => "name",
            ContactField::Company => "company",
            ContactField::Role => "role",
            ContactField::Email => "email",
            ContactField::Phone => "phone",
            ContactField::PersonalDetails => "personal_details",
            ContactField::Notes => "notes",
            ContactField::Source => "source",
            ContactField::BirthdayMonth => "birthday_month",
            ContactField::BirthdayDay => "birthday_day",
            ContactField::Children => "children",
            ContactField::CreatedAt => "created_at",
            ContactField::UpdatedAt => "updated_at",
        }
    }

    /// Human-readable label, used in change descriptions.
    pub fn label(self) -> &'static str {
        match self {
            ContactField::Name => "name",
            ContactField::Company => "company",
            ContactField::Role => "role",
            ContactField::Email => "email",
            ContactField::Phone => "phone",
            ContactField::PersonalDetails => "personal details",
            ContactField::Notes => "notes",
            ContactField::Source => "how you met",
            ContactField::BirthdayMonth => "birthday month",
            ContactField::BirthdayDay => "birthday day",
            ContactField::Children => "children",
            ContactField::CreatedAt => "created",
            ContactField::UpdatedAt => "updated",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            ContactField::BirthdayMonth | ContactField::BirthdayDay => FieldKind::Integer,
            ContactField::CreatedAt | ContactField::UpdatedAt => FieldKind::Timestamp,
            _ => FieldKind::Text,
        }
    }

    /// Read this field from a record.
    pub fn value_of(self, record: &ContactRecord) -> Option<FilterValue> {
        let text = |v: &Option<String>| v.clone().map(FilterValue::Text);
        match self {
            ContactField::Name => Some(FilterValue::Text(record.name.clone())),
            ContactField::Company => text(&record.company),
            ContactField::Role => text(&record.role),
            ContactField::Email => text(&record.email),
            ContactField::Phone => text(&record.phone),
            ContactField::PersonalDetails => text(&record.personal_details),
            ContactField::Notes => text(&record.notes),
            ContactField::Source => text(&record.source),
            ContactField::BirthdayMonth => record.birthday_month.map(|v| FilterValue::Integer(v as i64)),
            ContactField::BirthdayDay => record.birthday_day.map(|v| FilterValue::Integer(v as i64)),
            ContactField::Children => text(&record.children),
            ContactField::CreatedAt => Some(FilterValue::Timestamp(record.created_at)),
            ContactField::UpdatedAt => Some(FilterValue::Timestamp(record.updated_at)),
        }
    }
}

// =============================================================================
// OPERATORS AND VALUES
// =============================================================================

/// Fixed operator vocabulary offered to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    /// Case-insensitive LIKE; values without wildcards match as substrings.
    ILike,
    Gt,
    Lt,
    Gte,
    Lte,
    IsNull,
    IsNotNull,
}

impl FilterOp {
    pub fn from_name(name: &str) -> Option<Self> {
        let op = match name.trim() {
            "eq" => FilterOp::Eq,
            "ilike" => FilterOp::ILike,
            "gt" => FilterOp::Gt,
            "lt" => FilterOp::Lt,
            "gte" => FilterOp::Gte,
            "lte" => FilterOp::Lte,
            "isNull" => FilterOp::IsNull,
            "isNotNull" => FilterOp::IsNotNull,
            _ => return None,
        };
        Some(op)
    }

    pub fn name(self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::ILike => "ilike",
            FilterOp::Gt => "gt",
            FilterOp::Lt => "lt",
            FilterOp::Gte => "gte",
            FilterOp::Lte => "lte",
            FilterOp::IsNull => "isNull",
            FilterOp::IsNotNull => "isNotNull",
        }
    }

    pub fn needs_value(self) -> bool {
        !matches!(self, FilterOp::IsNull | FilterOp::IsNotNull)
    }
}

/// A typed filter operand.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Integer(i64),
    Timestamp(DateTime<Utc>),
}

impl FilterValue {
    /// Coerce a JSON value to the storage type of `kind`.
    pub fn coerce(value: &JsonValue, kind: FieldKind) -> Option<Self> {
        match kind {
            FieldKind::Text => match value {
                JsonValue::String(s) => Some(FilterValue::Text(s.clone())),
                JsonValue::Number(n) => Some(FilterValue::Text(n.to_string())),
                JsonValue::Bool(b) => Some(FilterValue::Text(b.to_string())),
                _ => None,
            },
            FieldKind::Integer => match value {
                JsonValue::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                    .map(FilterValue::Integer),
                JsonValue::String(s) => s.trim().parse::<i64>().ok().map(FilterValue::Integer),
                _ => None,
            },
            FieldKind::Timestamp => match value {
                JsonValue::String(s) => parse_timestamp(s).map(FilterValue::Timestamp),
                _ => None,
            },
        }
    }

    fn compare(&self, other: &FilterValue) -> Option<Ordering> {
        match (self, other) {
            (FilterValue::Text(a), FilterValue::Text(b)) => Some(a.cmp(b)),
            (FilterValue::Integer(a), FilterValue::Integer(b)) => Some(a.cmp(b)),
            (FilterValue::Timestamp(a), FilterValue::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Accept RFC 3339 timestamps and bare `YYYY-MM-DD` dates (midnight UTC).
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Turn an `ilike` operand into a LIKE pattern. Values with no wildcard are
/// treated as substrings.
pub fn like_pattern(value: &str) -> String {
    if value.contains('%') || value.contains('_') {
        value.to_string()
    } else {
        format!("%{}%", value)
    }
}

/// Case-insensitive SQL LIKE matching (`%` any run, `_` one character).
pub fn like_matches(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.to_lowercase().chars().collect();
    let t: Vec<char> = text.to_lowercase().chars().collect();

    // prev[j]: pattern[..i] matches text[..j]
    let mut prev = vec![false; t.len() + 1];
    prev[0] = true;
    for pc in &p {
        let mut cur = vec![false; t.len() + 1];
        if *pc == '%' {
            cur[0] = prev[0];
        }
        for j in 1..=t.len() {
            cur[j] = match pc {
                '%' => prev[j] || cur[j - 1],
                '_' => prev[j - 1],
                c => prev[j - 1] && *c == t[j - 1],
            };
        }
        prev = cur;
    }
    prev[t.len()]
}

// =============================================================================
// FILTERS AND SORT
// =============================================================================

/// A filter entry exactly as the backend produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFilter {
    pub field: String,
    pub op: String,
    #[serde(default)]
    pub value: Option<JsonValue>,
}

/// A sort entry exactly as the backend produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSort {
    pub field: String,
    #[serde(default)]
    pub direction: Option<String>,
}

/// Untrusted translation result from the completion backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawQuerySpec {
    #[serde(default)]
    pub filters: Vec<RawFilter>,
    #[serde(default)]
    pub sort: Option<RawSort>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// A validated filter over a declared field.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilter {
    pub field: ContactField,
    pub op: FilterOp,
    pub value: Option<FilterValue>,
}

impl QueryFilter {
    /// Validate a raw filter. Returns `None` for undeclared fields, unknown
    /// operators, and values that do not fit the field's type.
    pub fn from_raw(raw: &RawFilter) -> Option<Self> {
        let field = ContactField::from_name(&raw.field)?;
        let op = FilterOp::from_name(&raw.op)?;
        if !op.needs_value() {
            return Some(Self {
                field,
                op,
                value: None,
            });
        }
        let kind = field.kind();
        if op == FilterOp::ILike && kind != FieldKind::Text {
            return None;
        }
        let value = FilterValue::coerce(raw.value.as_ref()?, kind)?;
        let value = match (op, value) {
            (FilterOp::ILike, FilterValue::Text(s)) => FilterValue::Text(like_pattern(&s)),
            (_, v) => v,
        };
        Some(Self {
            field,
            op,
            value: Some(value),
        })
    }

    /// Evaluate against a record with SQL NULL semantics: any comparison with
    /// a missing value is false.
    pub fn matches(&self, record: &ContactRecord) -> bool {
        let actual = self.field.value_of(record);
        match self.op {
            FilterOp::IsNull => actual.is_none(),
            FilterOp::IsNotNull => actual.is_some(),
            FilterOp::ILike => match (actual, &self.value) {
                (Some(FilterValue::Text(text)), Some(FilterValue::Text(pattern))) => {
                    like_matches(pattern, &text)
                }
                _ => false,
            },
            op => {
                let (Some(actual), Some(expected)) = (actual, self.value.as_ref()) else {
                    return false;
                };
                let Some(ord) = actual.compare(expected) else {
                    return false;
                };
                match op {
                    FilterOp::Eq => ord == Ordering::Equal,
                    FilterOp::Gt => ord == Ordering::Greater,
                    FilterOp::Lt => ord == Ordering::Less,
                    FilterOp::Gte => ord != Ordering::Less,
                    FilterOp::Lte => ord != Ordering::Greater,
                    _ => false,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: ContactField,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    /// Most recently updated first.
    fn default() -> Self {
        Self {
            field: ContactField::UpdatedAt,
            direction: SortDirection::Desc,
        }
    }
}

impl SortSpec {
    pub fn from_raw(raw: &RawSort) -> Option<Self> {
        let field = ContactField::from_name(&raw.field)?;
        let direction = match raw.direction.as_deref().map(str::trim) {
            Some(d) if d.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        };
        Some(Self { field, direction })
    }

    /// Order two records the way PostgreSQL would: NULLs sort as larger than
    /// any value, so they come last ascending and first descending.
    pub fn compare(&self, a: &ContactRecord, b: &ContactRecord) -> Ordering {
        let ord = match (self.field.value_of(a), self.field.value_of(b)) {
            (Some(x), Some(y)) => x.compare(&y).unwrap_or(Ordering::Equal),
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        match self.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }
}

/// A validated natural-language query, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub filters: Vec<QueryFilter>,
    pub sort: Option<SortSpec>,
    pub summary: String,
    /// Raw filters rejected during validation, as `field op` strings.
    pub dropped: Vec<String>,
}

impl QuerySpec {
    pub fn effective_sort(&self) -> SortSpec {
        self.sort.unwrap_or_default()
    }
}
