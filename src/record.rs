// Canonical (RGBridge) records produced by translators
use crate::normalize::normalize_record;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

pub const HOTEL_CODE: &str = "HotelCode";
pub const INV_CODE: &str = "InvCode";
pub const RATE_PLAN_CODE: &str = "RatePlanCode";
pub const CURRENCY_CODE: &str = "CurrencyCode";

const AVAILABILITY_DEFAULTS: [(&str, &str); 3] = [
    (HOTEL_CODE, "UNKNOWN"),
    (INV_CODE, "DEFAULT"),
    (RATE_PLAN_CODE, "DEFAULT"),
];

const RATE_DEFAULTS: [(&str, &str); 4] = [
    (HOTEL_CODE, "UNKNOWN"),
    (INV_CODE, "DEFAULT"),
    (RATE_PLAN_CODE, "DEFAULT"),
    (CURRENCY_CODE, "USD"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Availability,
    Rate,
}

impl MessageKind {
    pub const ALL: [MessageKind; 2] = [MessageKind::Availability, MessageKind::Rate];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Availability => "availability",
            MessageKind::Rate => "rate",
        }
    }

    // Path segment appended to the internal API base URL
    pub fn endpoint_path(&self) -> &'static str {
        self.as_str()
    }

    pub fn schema_file(&self) -> &'static str {
        match self {
            MessageKind::Availability => "OTA_HotelAvailNotifRQ.xsd",
            MessageKind::Rate => "OTA_HotelRateAmountNotifRQ.xsd",
        }
    }

    // Mandatory canonical fields and the values used when a vendor omits them
    pub fn required_defaults(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            MessageKind::Availability => &AVAILABILITY_DEFAULTS,
            MessageKind::Rate => &RATE_DEFAULTS,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "availability" | "avail" => Ok(MessageKind::Availability),
            "rate" | "rates" => Ok(MessageKind::Rate),
            other => Err(format!("unknown message type '{}'", other)),
        }
    }
}

fn is_missing(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

// One canonical line (room type / rate plan / date range). Built once by a
// translator with the mandatory fields filled in, then read-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CanonicalRecord {
    fields: Map<String, Value>,
}

impl CanonicalRecord {
    pub fn new(kind: MessageKind, mut fields: Map<String, Value>) -> Self {
        for (field, fallback) in kind.required_defaults() {
            if fields.get(*field).map_or(true, is_missing) {
                fields.insert((*field).to_string(), Value::String((*fallback).to_string()));
            }
        }
        normalize_record(kind, &mut fields);
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    // Vendors sometimes send numeric hotel ids; those are printed as-is.
    pub fn hotel_code(&self) -> String {
        match self.fields.get(HOTEL_CODE) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => "UNKNOWN".to_string(),
            Some(other) => other.to_string(),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    // Deserialize the record into one of the typed builder inputs
    pub fn to_message<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.fields.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_availability_defaults_fill_missing_fields() {
        let record = CanonicalRecord::new(MessageKind::Availability, Map::new());
        assert_eq!(record.get_str(HOTEL_CODE), Some("UNKNOWN"));
        assert_eq!(record.get_str(INV_CODE), Some("DEFAULT"));
        assert_eq!(record.get_str(RATE_PLAN_CODE), Some("DEFAULT"));
        assert!(!record.contains(CURRENCY_CODE));
    }

    #[test]
    fn test_rate_defaults_include_currency() {
        let record = CanonicalRecord::new(
            MessageKind::Rate,
            fields(json!({"InvCode": "KING", "CurrencyCode": null})),
        );
        assert_eq!(record.get_str(INV_CODE), Some("KING"));
        assert_eq!(record.get_str(CURRENCY_CODE), Some("USD"));
        assert_eq!(record.len(), 4);
    }

    #[test]
    fn test_blank_required_fields_are_filled() {
        let record = CanonicalRecord::new(
            MessageKind::Rate,
            fields(json!({"HotelCode": "", "InvCode": "  ", "RatePlanCode": "BAR", "CurrencyCode": " "})),
        );
        assert_eq!(record.get_str(HOTEL_CODE), Some("UNKNOWN"));
        assert_eq!(record.get_str(INV_CODE), Some("DEFAULT"));
        assert_eq!(record.get_str(RATE_PLAN_CODE), Some("BAR"));
        assert_eq!(record.get_str(CURRENCY_CODE), Some("USD"));
    }

    #[test]
    fn test_records_are_normalized_on_construction() {
        let record = CanonicalRecord::new(
            MessageKind::Rate,
            fields(json!({
                "Start": "31/12/2025",
                "CurrencyCode": "gbp",
                "BaseByGuestAmts": [{"AmountAfterTax": 99.999}]
            })),
        );
        assert_eq!(record.get_str("Start"), Some("2025-12-31"));
        assert_eq!(record.get_str(CURRENCY_CODE), Some("GBP"));
        assert_eq!(record.get("BaseByGuestAmts"), Some(&json!([{"AmountAfterTax": 100.0}])));
    }

    #[test]
    fn test_resolved_values_are_not_overwritten() {
        let record = CanonicalRecord::new(
            MessageKind::Availability,
            fields(json!({"HotelCode": 1042, "Start": "2025-01-01"})),
        );
        assert_eq!(record.hotel_code(), "1042");
        assert_eq!(record.get_str("Start"), Some("2025-01-01"));
    }

    #[test]
    fn test_message_kind_parsing() {
        assert_eq!("Availability".parse::<MessageKind>(), Ok(MessageKind::Availability));
        assert_eq!("rates".parse::<MessageKind>(), Ok(MessageKind::Rate));
        assert!("inventory".parse::<MessageKind>().is_err());
        assert_eq!(MessageKind::Rate.schema_file(), "OTA_HotelRateAmountNotifRQ.xsd");
    }
}
