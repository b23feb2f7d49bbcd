//! FHIR primitive datatypes and their lexical checks.
//!
//! Reference: <https://www.hl7.org/fhir/datatypes.html#primitive>

use std::fmt;
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use serde_json::Value;

static CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s]+( [^\s]+)*$").expect("Invalid code regex"));

static ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9\-\.]{1,64}$").expect("Invalid id regex"));

static OID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^urn:oid:[0-2](\.[1-9]\d*)+$").expect("Invalid oid regex"));

static DATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?[0-9]{4}(-(0[1-9]|1[0-2])(-(0[1-9]|[1-2][0-9]|3[0-1]))?)?$")
        .expect("Invalid date regex")
});

static DATETIME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^-?[0-9]{4}(-(0[1-9]|1[0-2])(-(0[1-9]|[1-2][0-9]|3[0-1])(T([01][0-9]|2[0-3]):[0-5][0-9]:[0-5][0-9](\.[0-9]+)?(Z|(\+|-)((0[0-9]|1[0-3]):[0-5][0-9]|14:00)))?)?)?$",
    )
    .expect("Invalid dateTime regex")
});

static INSTANT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[0-9]{4}-(0[1-9]|1[0-2])-(0[1-9]|[1-2][0-9]|3[0-1])T([01][0-9]|2[0-3]):[0-5][0-9]:[0-5][0-9](\.[0-9]+)?(Z|(\+|-)((0[0-9]|1[0-3]):[0-5][0-9]|14:00))$",
    )
    .expect("Invalid instant regex")
});

static TIME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]:[0-5][0-9](\.[0-9]+)?$").expect("Invalid time regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Integer,
    UnsignedInt,
    PositiveInt,
    Decimal,
    String,
    Markdown,
    Uri,
    Code,
    Id,
    Oid,
    Date,
    DateTime,
    Instant,
    Time,
    Base64Binary,
    Xhtml,
}

impl PrimitiveKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::UnsignedInt => "unsignedInt",
            Self::PositiveInt => "positiveInt",
            Self::Decimal => "decimal",
            Self::String => "string",
            Self::Markdown => "markdown",
            Self::Uri => "uri",
            Self::Code => "code",
            Self::Id => "id",
            Self::Oid => "oid",
            Self::Date => "date",
            Self::DateTime => "dateTime",
            Self::Instant => "instant",
            Self::Time => "time",
            Self::Base64Binary => "base64Binary",
            Self::Xhtml => "xhtml",
        }
    }

    /// Checks a JSON scalar against this primitive. The error is a short
    /// reason, without the field location.
    pub fn check(self, value: &Value) -> Result<(), String> {
        match self {
            Self::Boolean => value
                .is_boolean()
                .then_some(())
                .ok_or_else(|| self.expected(value)),
            Self::Integer => value
                .as_i64()
                .filter(|n| i32::try_from(*n).is_ok())
                .map(|_| ())
                .ok_or_else(|| self.expected(value)),
            Self::UnsignedInt => value
                .as_u64()
                .filter(|n| u32::try_from(*n).is_ok())
                .map(|_| ())
                .ok_or_else(|| self.expected(value)),
            Self::PositiveInt => value
                .as_u64()
                .filter(|n| *n >= 1 && u32::try_from(*n).is_ok())
                .map(|_| ())
                .ok_or_else(|| self.expected(value)),
            Self::Decimal => value
                .is_number()
                .then_some(())
                .ok_or_else(|| self.expected(value)),
            _ => {
                let s = value.as_str().ok_or_else(|| self.expected(value))?;
                self.check_str(s)
            }
        }
    }

    fn check_str(self, s: &str) -> Result<(), String> {
        let ok = match self {
            Self::String | Self::Markdown | Self::Xhtml => !s.trim().is_empty(),
            Self::Uri => !s.is_empty() && !s.chars().any(char::is_whitespace),
            Self::Code => CODE_REGEX.is_match(s),
            Self::Id => ID_REGEX.is_match(s),
            Self::Oid => OID_REGEX.is_match(s),
            Self::Date => DATE_REGEX.is_match(s),
            Self::DateTime => DATETIME_REGEX.is_match(s),
            Self::Instant => INSTANT_REGEX.is_match(s),
            Self::Time => TIME_REGEX.is_match(s),
            Self::Base64Binary => STANDARD.decode(s).is_ok(),
            Self::Boolean | Self::Integer | Self::UnsignedInt | Self::PositiveInt | Self::Decimal => {
                false
            }
        };
        if ok {
            Ok(())
        } else {
            Err(format!("'{s}' is not a valid {}", self.name()))
        }
    }

    fn expected(self, value: &Value) -> String {
        format!("expected {} but got {}", self.name(), json_type_name(value))
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
