use crate::error::{CoreError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime, UtcOffset};

/// Full-precision instant used for `meta.lastUpdated` and row timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FhirDateTime(pub OffsetDateTime);

impl FhirDateTime {
    pub fn new(datetime: OffsetDateTime) -> Self {
        Self(datetime)
    }

    pub fn inner(&self) -> &OffsetDateTime {
        &self.0
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    /// IMF-fixdate form used in `Last-Modified` headers.
    pub fn to_http_date(&self) -> Option<String> {
        let format = format_description!(
            "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
        );
        self.0.to_offset(UtcOffset::UTC).format(format).ok()
    }
}

impl fmt::Display for FhirDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = self.0.format(&Rfc3339).map_err(|_| fmt::Error)?;
        write!(f, "{formatted}")
    }
}

impl FromStr for FhirDateTime {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let datetime = OffsetDateTime::parse(s, &Rfc3339).map_err(|e| {
            CoreError::invalid_date_time(format!("Failed to parse FHIR DateTime '{s}': {e}"))
        })?;
        Ok(FhirDateTime(datetime))
    }
}

impl Serialize for FhirDateTime {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = self.0.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }
}

impl<'de> Deserialize<'de> for FhirDateTime {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FhirDateTime::from_str(&s).map_err(serde::de::Error::custom)
    }
}

pub fn now_utc() -> FhirDateTime {
    FhirDateTime(OffsetDateTime::now_utc())
}

/// Precision carried by a FHIR `date` / `dateTime` literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DatePrecision {
    Year,
    Month,
    Day,
    Instant,
}

/// A FHIR `date` or `dateTime` value with its original precision.
///
/// Partial values (`2020`, `2020-04`, `2020-04-12`) compare by the earliest
/// instant they cover, which is what `Period.start <= Period.end` needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialDateTime {
    pub precision: DatePrecision,
    start: OffsetDateTime,
}

impl PartialDateTime {
    /// Earliest instant covered by this value, in UTC.
    pub fn earliest(&self) -> OffsetDateTime {
        self.start
    }
}

impl FromStr for PartialDateTime {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CoreError::invalid_date_time(format!("'{s}' is not a FHIR date/dateTime"));

        if s.contains('T') {
            let dt = FhirDateTime::from_str(s)?;
            return Ok(Self {
                precision: DatePrecision::Instant,
                start: dt.0.to_offset(UtcOffset::UTC),
            });
        }

        let mut parts = s.split('-');
        let year: i32 = parts.next().and_then(|y| y.parse().ok()).ok_or_else(invalid)?;
        let month = parts.next().map(|m| m.parse::<u8>()).transpose().map_err(|_| invalid())?;
        let day = parts.next().map(|d| d.parse::<u8>()).transpose().map_err(|_| invalid())?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        let (precision, month, day) = match (month, day) {
            (None, _) => (DatePrecision::Year, 1, 1),
            (Some(m), None) => (DatePrecision::Month, m, 1),
            (Some(m), Some(d)) => (DatePrecision::Day, m, d),
        };
        let month = Month::try_from(month).map_err(|_| invalid())?;
        let date = Date::from_calendar_date(year, month, day).map_err(|_| invalid())?;

        Ok(Self {
            precision,
            start: date.midnight().assume_utc(),
        })
    }
}
