//! Typed source properties and their conversion to plain JSON values.
//!
//! Source pages carry every field as a tagged object (`{"type": "select",
//! "select": {...}}`). [`extract_value`] flattens one of them into the scalar,
//! array or null a destination column expects.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One run of formatted text; only the plain rendering is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RichText {
    #[serde(default)]
    pub plain_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateValue {
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationRef {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonRef {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileUrl {
    pub url: Option<String>,
}

/// Uploaded (`file`) or linked (`external`) attachment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileObject {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub file: Option<FileUrl>,
    #[serde(default)]
    pub external: Option<FileUrl>,
}

impl FileObject {
    fn url(&self) -> Option<&str> {
        self.file
            .as_ref()
            .and_then(|f| f.url.as_deref())
            .or_else(|| self.external.as_ref().and_then(|f| f.url.as_deref()))
    }
}

/// Computed value of a `formula` property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormulaValue {
    String {
        #[serde(default)]
        string: Option<String>,
    },
    Number {
        #[serde(default)]
        number: Option<f64>,
    },
    Boolean {
        #[serde(default)]
        boolean: Option<bool>,
    },
    Date {
        #[serde(default)]
        date: Option<DateValue>,
    },
    #[serde(other)]
    Unknown,
}

/// Aggregated value of a `rollup` property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RollupValue {
    Number {
        #[serde(default)]
        number: Option<f64>,
    },
    Date {
        #[serde(default)]
        date: Option<DateValue>,
    },
    Array {
        #[serde(default, deserialize_with = "null_as_default")]
        array: Vec<TypedProperty>,
    },
    #[serde(other)]
    Unknown,
}

/// A source property, discriminated by its `type` tag.
///
/// Payloads are all optional: a `null` or missing payload deserializes to the
/// empty value of its variant instead of failing the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypedProperty {
    Title {
        #[serde(default, deserialize_with = "null_as_default")]
        title: Vec<RichText>,
    },
    RichText {
        #[serde(default, deserialize_with = "null_as_default")]
        rich_text: Vec<RichText>,
    },
    Number {
        #[serde(default)]
        number: Option<f64>,
    },
    Select {
        #[serde(default)]
        select: Option<SelectOption>,
    },
    MultiSelect {
        #[serde(default, deserialize_with = "null_as_default")]
        multi_select: Vec<SelectOption>,
    },
    Status {
        #[serde(default)]
        status: Option<SelectOption>,
    },
    Date {
        #[serde(default)]
        date: Option<DateValue>,
    },
    Checkbox {
        #[serde(default, deserialize_with = "null_as_default")]
        checkbox: bool,
    },
    Url {
        #[serde(default)]
        url: Option<String>,
    },
    Email {
        #[serde(default)]
        email: Option<String>,
    },
    PhoneNumber {
        #[serde(default)]
        phone_number: Option<String>,
    },
    Relation {
        #[serde(default, deserialize_with = "null_as_default")]
        relation: Vec<RelationRef>,
    },
    People {
        #[serde(default, deserialize_with = "null_as_default")]
        people: Vec<PersonRef>,
    },
    Formula {
        #[serde(default)]
        formula: Option<FormulaValue>,
    },
    Rollup {
        #[serde(default)]
        rollup: Option<RollupValue>,
    },
    Files {
        #[serde(default, deserialize_with = "null_as_default")]
        files: Vec<FileObject>,
    },
    #[serde(other)]
    Unknown,
}

impl TypedProperty {
    /// Convenience constructor for a single-run title.
    pub fn title(text: impl Into<String>) -> Self {
        Self::Title { title: vec![RichText { plain_text: text.into() }] }
    }

    /// Convenience constructor for a single-run rich text.
    pub fn rich_text(text: impl Into<String>) -> Self {
        Self::RichText { rich_text: vec![RichText { plain_text: text.into() }] }
    }

    pub fn number(value: f64) -> Self {
        Self::Number { number: Some(value) }
    }

    pub fn select(name: impl Into<String>) -> Self {
        Self::Select { select: Some(SelectOption { name: name.into() }) }
    }

    pub fn relation<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Relation { relation: ids.into_iter().map(|id| RelationRef { id: id.into() }).collect() }
    }

    /// Referenced page ids when this is a relation.
    pub fn relation_ids(&self) -> Option<impl Iterator<Item = &str>> {
        match self {
            Self::Relation { relation } => Some(relation.iter().map(|r| r.id.as_str())),
            _ => None,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn first_plain_text(runs: &[RichText]) -> Value {
    Value::String(runs.first().map(|r| r.plain_text.clone()).unwrap_or_default())
}

fn optional_string(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |s| Value::String(s.to_owned()))
}

fn date_start(date: Option<&DateValue>) -> Value {
    optional_string(date.and_then(|d| d.start.as_deref()))
}

/// Integral numbers are emitted as JSON integers so `1200` does not become `1200.0`.
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn number_value(number: Option<f64>) -> Value {
    match number {
        Some(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => Value::from(n as i64),
        Some(n) => serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number),
        None => Value::Null,
    }
}

/// Flatten a typed property into a plain JSON value.
///
/// Total over every variant: absence of data is `null`, `""` or `[]`, never an error.
#[must_use]
pub fn extract_value(property: &TypedProperty) -> Value {
    match property {
        TypedProperty::Title { title } => first_plain_text(title),
        TypedProperty::RichText { rich_text } => first_plain_text(rich_text),
        TypedProperty::Number { number } => number_value(*number),
        TypedProperty::Select { select } | TypedProperty::Status { status: select } => {
            optional_string(select.as_ref().map(|s| s.name.as_str()))
        },
        TypedProperty::MultiSelect { multi_select } => {
            multi_select.iter().map(|o| Value::String(o.name.clone())).collect()
        },
        TypedProperty::Date { date } => date_start(date.as_ref()),
        TypedProperty::Checkbox { checkbox } => Value::Bool(*checkbox),
        TypedProperty::Url { url } => optional_string(url.as_deref()),
        TypedProperty::Email { email } => optional_string(email.as_deref()),
        TypedProperty::PhoneNumber { phone_number } => optional_string(phone_number.as_deref()),
        TypedProperty::Relation { relation } => {
            relation.iter().map(|r| Value::String(r.id.clone())).collect()
        },
        TypedProperty::People { people } => {
            people.iter().map(|p| Value::String(p.id.clone())).collect()
        },
        TypedProperty::Files { files } => files
            .iter()
            .filter_map(FileObject::url)
            .map(|u| Value::String(u.to_owned()))
            .collect(),
        TypedProperty::Formula { formula } => match formula {
            Some(FormulaValue::String { string }) => optional_string(string.as_deref()),
            Some(FormulaValue::Number { number }) => number_value(*number),
            Some(FormulaValue::Boolean { boolean }) => boolean.map_or(Value::Null, Value::Bool),
            Some(FormulaValue::Date { date }) => date_start(date.as_ref()),
            Some(FormulaValue::Unknown) | None => Value::Null,
        },
        TypedProperty::Rollup { rollup } => match rollup {
            Some(RollupValue::Number { number }) => number_value(*number),
            Some(RollupValue::Date { date }) => date_start(date.as_ref()),
            Some(RollupValue::Array { array }) => {
                array.iter().map(extract_value).filter(|v| !v.is_null()).collect()
            },
            Some(RollupValue::Unknown) | None => Value::Null,
        },
        TypedProperty::Unknown => Value::Null,
    }
}

/// Normalize a source field name into a lower-snake-case column name.
///
/// Every character outside `[a-z0-9]` (after lowercasing) becomes `_`, runs
/// collapse and the ends are trimmed: `"Montant HT"` → `montant_ht`.
#[must_use]
pub fn normalize_field_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '_' };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('_').to_owned()
}
