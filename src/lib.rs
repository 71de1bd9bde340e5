pub mod config;
pub mod editor;
pub mod notification;
pub mod service;

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_derive::{Deserialize, Serialize};
use serde_json;

pub use config::{ConfigError, ServiceConfig};
pub use editor::{DialogState, LicenseEditor};
pub use notification::{Notification, Notifier, Severity, TracingNotifier};
pub use service::{ErrorKind, LicenseService, ListPatch, SaveOutcome, ServiceError};

/// Identifier assigned by the server on the first successful create.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(untagged)]
pub enum LicenseId {
    Number(i64),
    Text(String),
}

impl fmt::Display for LicenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LicenseId::Number(n) => write!(f, "{}", n),
            LicenseId::Text(s) => f.write_str(s),
        }
    }
}

impl LicenseId {
    /// Whether the id marks a record the server already stored. Zero and the
    /// empty string do not, so a license carrying one is created, not updated.
    pub fn is_present(&self) -> bool {
        match self {
            LicenseId::Number(n) => *n != 0,
            LicenseId::Text(s) => !s.trim().is_empty(),
        }
    }
}

impl FromStr for LicenseId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<i64>()
            .map(LicenseId::Number)
            .unwrap_or_else(|_| LicenseId::Text(s.to_string())))
    }
}

impl From<i64> for LicenseId {
    fn from(value: i64) -> Self {
        LicenseId::Number(value)
    }
}

impl From<&str> for LicenseId {
    fn from(value: &str) -> Self {
        LicenseId::Text(value.to_string())
    }
}

const EXPIRY_DATE_KEY: &str = "expiryDate";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LicenseError {
    #[error("`{0}` is not a recognizable date")]
    InvalidExpiryDate(String),
}

/// A license record as exchanged with the server.
///
/// Fields the server sends beyond `id`, `name` and `expiryDate` are kept in
/// `extra` and sent back untouched. So is an `expiryDate` that cannot be read
/// as a date; the record still loads, with `expiry_date` left empty.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(from = "RawLicense")]
pub struct License {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<LicenseId>,
    pub name: String,
    #[serde(
        rename = "expiryDate",
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_expiry_date"
    )]
    pub expiry_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl License {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<LicenseId>) -> Self {
        self.id = Some(id.into()).filter(|id| !matches!(id, LicenseId::Text(s) if s.is_empty()));
        self
    }

    /// Sets the expiry date from user input in any accepted date format.
    pub fn with_expiry(mut self, input: &str) -> Result<Self, LicenseError> {
        self.set_expiry_date(Some(parse_expiry_date(input)?));
        Ok(self)
    }

    /// Replaces the expiry date, dropping any unreadable server value kept in
    /// `extra`. Assign through this rather than the field when loaded records
    /// may carry one, or the key is written twice.
    pub fn set_expiry_date(&mut self, date: Option<NaiveDate>) {
        self.extra.remove(EXPIRY_DATE_KEY);
        self.expiry_date = date;
    }

    /// Whether the name is present after trimming. Blank licenses are never sent.
    pub fn has_name(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

/// Normalizes a date or timestamp to the calendar date the server stores.
///
/// Timestamps carrying an offset are moved to UTC first, so
/// `2024-03-15T23:30:00-05:00` becomes `2024-03-16`. Naive timestamps are
/// read as UTC.
pub fn parse_expiry_date(input: &str) -> Result<NaiveDate, LicenseError> {
    let trimmed = input.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(timestamp.with_timezone(&Utc).date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(timestamp) = DateTime::parse_from_str(trimmed, format) {
            return Ok(timestamp.with_timezone(&Utc).date_naive());
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(timestamp.date());
        }
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc2822(trimmed) {
        return Ok(timestamp.with_timezone(&Utc).date_naive());
    }

    Err(LicenseError::InvalidExpiryDate(input.to_string()))
}

/// UTC calendar date of a millisecond Unix timestamp.
pub fn expiry_date_from_millis(millis: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(millis).map(|timestamp| timestamp.date_naive())
}

/// Position of the license carrying `id`, if it is in the list.
pub fn find_index_by_id(licenses: &[License], id: &LicenseId) -> Option<usize> {
    licenses
        .iter()
        .position(|license| license.id.as_ref() == Some(id))
}

fn serialize_expiry_date<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match date {
        Some(date) => serializer.collect_str(&date.format("%Y-%m-%d")),
        None => serializer.serialize_none(),
    }
}

#[derive(Deserialize)]
struct RawLicense {
    #[serde(default)]
    id: Option<LicenseId>,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "expiryDate", default)]
    expiry_date: serde_json::Value,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl From<RawLicense> for License {
    fn from(raw: RawLicense) -> Self {
        use serde_json::Value;

        let mut extra = raw.extra;
        let (expiry_date, unreadable) = match raw.expiry_date {
            Value::Null => (None, None),
            Value::String(s) if s.trim().is_empty() => (None, None),
            Value::String(s) => match parse_expiry_date(&s) {
                Ok(date) => (Some(date), None),
                Err(_) => (None, Some(Value::String(s))),
            },
            Value::Number(n) => match n.as_i64().and_then(expiry_date_from_millis) {
                Some(date) => (Some(date), None),
                None => (None, Some(Value::Number(n))),
            },
            other => (None, Some(other)),
        };
        if let Some(value) = unreadable {
            tracing::warn!(%value, "keeping unreadable expiryDate as is");
            extra.insert(EXPIRY_DATE_KEY.to_string(), value);
        }

        License {
            id: raw
                .id
                .filter(|id| !matches!(id, LicenseId::Text(text) if text.is_empty())),
            name: raw.name.unwrap_or_default(),
            expiry_date,
            extra,
        }
    }
}

/// One page of the license listing.
///
/// The listing endpoint may answer with a bare array or with an object that
/// keeps the records under `licenses`, `content` or `items`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(from = "RawLicensePage")]
pub struct LicensePage {
    pub licenses: Vec<License>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLicensePage {
    Bare(Vec<License>),
    Wrapped {
        #[serde(alias = "content", alias = "items")]
        licenses: Vec<License>,
        #[serde(default, alias = "totalElements")]
        total: Option<u64>,
    },
}

impl From<RawLicensePage> for LicensePage {
    fn from(raw: RawLicensePage) -> Self {
        match raw {
            RawLicensePage::Bare(licenses) => LicensePage {
                licenses,
                total: None,
            },
            RawLicensePage::Wrapped { licenses, total } => LicensePage { licenses, total },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use lazy_static::lazy_static;

    lazy_static! {
        static ref STORED_LICENSE: serde_json::Value = serde_json::json!({
            "id": 7,
            "name": "Acme Enterprise",
            "expiryDate": "2025-12-31T00:00:00Z",
            "seats": 25
        });
    }

    #[test]
    fn license_deserializes_and_keeps_unknown_fields() {
        let license: License =
            serde_json::from_value(STORED_LICENSE.clone()).expect("License should parse");

        assert_eq!(license.id, Some(LicenseId::Number(7)));
        assert_eq!(license.name, "Acme Enterprise");
        assert_eq!(
            license.expiry_date,
            NaiveDate::from_ymd_opt(2025, 12, 31)
        );
        assert_eq!(license.extra.get("seats"), Some(&serde_json::json!(25)));
    }

    #[test]
    fn license_serializes_expiry_as_calendar_date() {
        let license: License = serde_json::from_value(STORED_LICENSE.clone()).unwrap();

        let wire = serde_json::to_value(&license).unwrap();
        assert_eq!(
            wire,
            serde_json::json!({
                "id": 7,
                "name": "Acme Enterprise",
                "expiryDate": "2025-12-31",
                "seats": 25
            })
        );
    }

    #[test]
    fn new_license_omits_absent_fields() {
        let wire = serde_json::to_value(License::new("Trial")).unwrap();
        assert_eq!(wire, serde_json::json!({ "name": "Trial" }));
    }

    #[test]
    fn empty_expiry_and_empty_id_read_as_absent() {
        let license: License = serde_json::from_value(serde_json::json!({
            "id": "",
            "name": "Trial",
            "expiryDate": ""
        }))
        .unwrap();

        assert_eq!(license.id, None);
        assert_eq!(license.expiry_date, None);
    }

    #[test]
    fn text_ids_are_supported() {
        let license: License =
            serde_json::from_value(serde_json::json!({ "id": "lic-42", "name": "A" })).unwrap();
        assert_eq!(license.id, Some(LicenseId::from("lic-42")));
        assert_eq!(license.id.unwrap().to_string(), "lic-42");
    }

    #[test]
    fn ids_parse_from_text() {
        assert_eq!("17".parse::<LicenseId>(), Ok(LicenseId::Number(17)));
        assert_eq!("lic-17".parse::<LicenseId>(), Ok(LicenseId::from("lic-17")));
    }

    #[test]
    fn expiry_date_accepts_common_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();

        assert_eq!(parse_expiry_date("2024-03-15").unwrap(), expected);
        assert_eq!(parse_expiry_date("2024-03-15T10:00:00Z").unwrap(), expected);
        assert_eq!(parse_expiry_date("2024-03-15T10:00:00.250Z").unwrap(), expected);
        assert_eq!(parse_expiry_date("2024-03-15T10:00:00").unwrap(), expected);
        assert_eq!(parse_expiry_date(" 2024-03-15 ").unwrap(), expected);
    }

    #[test]
    fn expiry_date_with_offset_is_taken_in_utc() {
        assert_eq!(
            parse_expiry_date("2024-03-15T23:30:00-05:00").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 16).unwrap()
        );
        assert_eq!(
            parse_expiry_date("2024-03-15T01:00:00+02:00").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()
        );
    }

    #[test]
    fn unparsable_expiry_date_is_rejected() {
        let Err(error) = parse_expiry_date("next tuesday") else {
            panic!("An error was expected")
        };
        assert_eq!(
            error,
            LicenseError::InvalidExpiryDate("next tuesday".to_string())
        );
    }

    #[test]
    fn expiry_date_accepts_compact_offsets_and_epoch_millis() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();

        assert_eq!(
            parse_expiry_date("2024-03-15T10:00:00.000+0000").unwrap(),
            expected
        );
        assert_eq!(
            parse_expiry_date("2024-03-15T23:30:00-0500").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 16).unwrap()
        );
        assert_eq!(expiry_date_from_millis(1_710_496_800_000), Some(expected));

        let license: License = serde_json::from_value(serde_json::json!({
            "name": "A",
            "expiryDate": 1_710_496_800_000i64
        }))
        .unwrap();
        assert_eq!(license.expiry_date, Some(expected));
        assert!(license.extra.is_empty());
    }

    #[test]
    fn unreadable_server_expiry_is_kept_and_sent_back() {
        let mut license: License =
            serde_json::from_value(serde_json::json!({ "id": 3, "name": "A", "expiryDate": "soon" }))
                .expect("Record should still load");

        assert_eq!(license.expiry_date, None);
        assert_eq!(
            serde_json::to_value(&license).unwrap(),
            serde_json::json!({ "id": 3, "name": "A", "expiryDate": "soon" })
        );

        license.set_expiry_date(NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(
            serde_json::to_value(&license).unwrap(),
            serde_json::json!({ "id": 3, "name": "A", "expiryDate": "2025-01-01" })
        );
    }

    #[test]
    fn zero_and_empty_ids_are_not_present() {
        assert!(LicenseId::Number(7).is_present());
        assert!(LicenseId::from("lic-7").is_present());
        assert!(!LicenseId::Number(0).is_present());
        assert!(!LicenseId::from("").is_present());

        assert_eq!(License::new("A").with_id("").id, None);
        assert_eq!(License::new("A").with_id(0).id, Some(LicenseId::Number(0)));
    }

    #[test]
    fn has_name_ignores_whitespace() {
        assert!(License::new("Pro").has_name());
        assert!(!License::new("   \t").has_name());
        assert!(!License::default().has_name());
    }

    #[test]
    fn find_index_by_id_locates_records() {
        let licenses = vec![
            License::new("a").with_id(1),
            License::new("b").with_id(2),
            License::new("draft"),
        ];

        assert_eq!(find_index_by_id(&licenses, &LicenseId::Number(2)), Some(1));
        assert_eq!(find_index_by_id(&licenses, &LicenseId::Number(9)), None);
    }

    #[test]
    fn page_accepts_bare_array() {
        let page: LicensePage = serde_json::from_value(serde_json::json!([
            { "id": 1, "name": "a" },
            { "id": 2, "name": "b" }
        ]))
        .unwrap();

        assert_eq!(page.licenses.len(), 2);
        assert_eq!(page.total, None);
    }

    #[test]
    fn page_accepts_wrapped_shapes() {
        let spring: LicensePage = serde_json::from_value(serde_json::json!({
            "content": [{ "id": 1, "name": "a" }],
            "totalElements": 41,
            "number": 0
        }))
        .unwrap();
        assert_eq!(spring.licenses.len(), 1);
        assert_eq!(spring.total, Some(41));

        let plain: LicensePage = serde_json::from_value(serde_json::json!({
            "licenses": [{ "id": 1, "name": "a" }, { "id": 2, "name": "b" }]
        }))
        .unwrap();
        assert_eq!(plain.licenses.len(), 2);
        assert_eq!(plain.total, None);
    }
}
