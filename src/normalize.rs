// Date and money normalization applied to canonical records
use crate::record::{MessageKind, CURRENCY_CODE};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Number, Value};
use tracing::debug;

pub const DEFAULT_CURRENCY: &str = "USD";

pub const KNOWN_CURRENCIES: [&str; 20] = [
    "USD", "EUR", "GBP", "CAD", "AUD", "JPY", "CHF", "CNY", "INR", "BRL", "MXN", "SGD", "HKD",
    "KRW", "SEK", "NOK", "DKK", "PLN", "CZK", "HUF",
];

const ZERO_DECIMAL_CURRENCIES: [&str; 2] = ["JPY", "KRW"];

// Tried in order, so an ambiguous "11/08/2025" reads day first.
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y", "%m-%d-%Y"];
const DATE_TIME_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%dT%H:%M:%S%.f",
];

const DATE_FIELDS: [&str; 2] = ["Start", "End"];
const AMOUNT_FIELDS: [&str; 2] = ["AmountBeforeTax", "AmountAfterTax"];

/// Parse the date formats PMS vendors send. Returns None when nothing matches.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .or_else(|| {
            DATE_TIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
                .map(|date_time| date_time.date())
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|date_time| date_time.date_naive())
        })
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn is_valid_currency_code(code: &str) -> bool {
    let code = code.trim().to_uppercase();
    KNOWN_CURRENCIES.contains(&code.as_str())
}

/// Upper-cased ISO 4217 code. Blank input, or anything that is not three
/// letters, becomes USD; well-formed codes outside the known set are kept.
pub fn normalize_currency_code(raw: &str) -> String {
    let code = raw.trim().to_uppercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        code
    } else {
        DEFAULT_CURRENCY.to_string()
    }
}

pub fn currency_precision(code: &str) -> u32 {
    if ZERO_DECIMAL_CURRENCIES.contains(&code.trim().to_uppercase().as_str()) {
        0
    } else {
        2
    }
}

// Works on the shortest decimal form of `amount` so 2.675 rounds to 2.68
// rather than to the binary neighbour below it.
pub fn round_currency(amount: f64, code: &str) -> f64 {
    let places = currency_precision(code) as usize;
    if !amount.is_finite() {
        return amount;
    }
    let repr = amount.abs().to_string();
    let (whole, fraction) = repr.split_once('.').unwrap_or((repr.as_str(), ""));
    if fraction.len() <= places {
        return amount;
    }

    let round_up = fraction.as_bytes()[places] >= b'5';
    let Ok(mut digits) = format!("{}{}", whole, &fraction[..places]).parse::<u128>() else {
        return amount;
    };
    if round_up {
        digits += 1;
    }

    let digits = format!("{:0>width$}", digits, width = places + 1);
    let (int_part, frac_part) = digits.split_at(digits.len() - places);
    let rounded: f64 = format!("{}.{}", int_part, frac_part)
        .trim_end_matches('.')
        .parse()
        .unwrap_or(amount.abs());
    if amount.is_sign_negative() {
        -rounded
    } else {
        rounded
    }
}

/// Parse an amount written with thousands separators, either "1,234.56" or
/// "1.234,56". Currency symbols and spaces are ignored.
pub fn parse_currency_amount(raw: &str) -> Option<f64> {
    let mut cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => {
            cleaned = cleaned.replace('.', "").replace(',', ".");
        }
        (Some(_), Some(_)) => cleaned = cleaned.replace(',', ""),
        (Some(_), None) => {
            let decimal_comma = matches!(
                cleaned.split_once(','),
                Some((_, tail)) if !tail.contains(',') && tail.len() <= 2
            );
            cleaned = if decimal_comma {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            };
        }
        _ => {}
    }
    cleaned.parse().ok()
}

fn normalize_dates(fields: &mut Map<String, Value>) {
    for field in DATE_FIELDS {
        let Some(Value::String(raw)) = fields.get(field) else {
            continue;
        };
        if let Some(date) = parse_date(raw) {
            let iso = format_date(date);
            if &iso != raw {
                debug!(field, from = %raw, to = %iso, "Normalized date");
            }
            fields.insert(field.to_string(), Value::String(iso));
        }
    }
}

fn normalize_currency_field(fields: &mut Map<String, Value>) -> Option<String> {
    let code = match fields.get(CURRENCY_CODE)? {
        Value::String(raw) => normalize_currency_code(raw),
        _ => return None,
    };
    fields.insert(CURRENCY_CODE.to_string(), Value::String(code.clone()));
    Some(code)
}

fn round_amount(value: &Value, currency: &str) -> Option<Value> {
    let amount = match value {
        Value::Number(number) if number.is_f64() => number.as_f64()?,
        Value::String(raw) => parse_currency_amount(raw)?,
        _ => return None,
    };
    Number::from_f64(round_currency(amount, currency)).map(Value::Number)
}

fn normalize_amounts(fields: &mut Map<String, Value>, names: &[&str], currency: &str) {
    for name in names {
        let Some(rounded) = fields.get(*name).and_then(|value| round_amount(value, currency))
        else {
            continue;
        };
        fields.insert(name.to_string(), rounded);
    }
}

fn objects_in<'a>(
    fields: &'a mut Map<String, Value>,
    list: &str,
) -> impl Iterator<Item = &'a mut Map<String, Value>> {
    fields
        .get_mut(list)
        .and_then(Value::as_array_mut)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object_mut)
}

/// Rewrite dates to ISO form, currency codes to upper case and amounts to
/// the precision of their currency.
pub fn normalize_record(kind: MessageKind, fields: &mut Map<String, Value>) {
    normalize_dates(fields);
    if let Some(Value::Object(control)) = fields.get_mut("StatusApplicationControl") {
        normalize_dates(control);
    }
    if kind != MessageKind::Rate {
        return;
    }

    let currency =
        normalize_currency_field(fields).unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
    for amount in objects_in(fields, "BaseByGuestAmts") {
        let own = normalize_currency_field(amount).unwrap_or_else(|| currency.clone());
        normalize_amounts(amount, &AMOUNT_FIELDS, &own);
    }
    for penalty in objects_in(fields, "CancelPolicies") {
        if let Some(Value::Object(percent)) = penalty.get_mut("AmountPercent") {
            let own = normalize_currency_field(percent).unwrap_or_else(|| currency.clone());
            normalize_amounts(percent, &["Amount"], &own);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case("2025-11-08", Some((2025, 11, 8)); "iso")]
    #[test_case(" 08/11/2025 ", Some((2025, 11, 8)); "day first slashes")]
    #[test_case("11/08/2025", Some((2025, 8, 11)); "ambiguous reads day first")]
    #[test_case("12/31/2025", Some((2025, 12, 31)); "month first slashes")]
    #[test_case("2025-11-08T10:30:00", Some((2025, 11, 8)); "date time")]
    #[test_case("2025-11-08T10:30:00Z", Some((2025, 11, 8)); "date time utc")]
    #[test_case("2025-11-08T23:30:00+02:00", Some((2025, 11, 8)); "date time with offset")]
    #[test_case("08-11-2025", Some((2025, 11, 8)); "day first dashes")]
    #[test_case("12-31-2025", Some((2025, 12, 31)); "month first dashes")]
    #[test_case("invalid-date", None; "invalid")]
    #[test_case("", None; "empty")]
    fn test_parse_date(raw: &str, expected: Option<(i32, u32, u32)>) {
        let expected = expected.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d));
        assert_eq!(parse_date(raw), expected);
    }

    #[test_case("usd", "USD"; "lower case")]
    #[test_case(" eur ", "EUR"; "padded")]
    #[test_case("thb", "THB"; "outside the known set")]
    #[test_case("", "USD"; "blank")]
    #[test_case("invalid", "USD"; "not a code")]
    fn test_normalize_currency_code(raw: &str, expected: &str) {
        assert_eq!(normalize_currency_code(raw), expected);
    }

    #[test]
    fn test_known_currencies() {
        assert!(is_valid_currency_code("usd"));
        assert!(is_valid_currency_code("EUR"));
        assert!(!is_valid_currency_code("INVALID"));
        assert!(!is_valid_currency_code(""));
    }

    #[test_case(2.675, "EUR", 2.68; "half up on decimal form")]
    #[test_case(120.5, "EUR", 120.5; "already exact")]
    #[test_case(99.994, "usd", 99.99; "rounds down")]
    #[test_case(-1.005, "EUR", -1.01; "negative")]
    #[test_case(1234.5, "JPY", 1235.0; "zero decimal currency")]
    #[test_case(0.499, "KRW", 0.0; "zero decimal rounds down")]
    fn test_round_currency(amount: f64, code: &str, expected: f64) {
        assert_eq!(round_currency(amount, code), expected);
    }

    #[test_case("1,234.56", Some(1234.56); "us separators")]
    #[test_case("1.234,56", Some(1234.56); "european separators")]
    #[test_case("€ 89,90", Some(89.9); "decimal comma")]
    #[test_case("1,234", Some(1234.0); "thousands comma")]
    #[test_case("$ 15", Some(15.0); "symbol")]
    #[test_case("n/a", None; "not an amount")]
    fn test_parse_currency_amount(raw: &str, expected: Option<f64>) {
        assert_eq!(parse_currency_amount(raw), expected);
    }

    #[test]
    fn test_normalize_rate_record() {
        let mut fields = json!({
            "Start": "08/11/2025",
            "End": "2025-11-09T00:00:00Z",
            "CurrencyCode": " eur",
            "BaseByGuestAmts": [
                {"AmountAfterTax": 120.456},
                {"AmountAfterTax": "1.099,995", "CurrencyCode": "jpy"},
                {"AmountAfterTax": 80}
            ],
            "CancelPolicies": [{"AmountPercent": {"Amount": 10.005}}]
        })
        .as_object()
        .cloned()
        .unwrap();

        normalize_record(MessageKind::Rate, &mut fields);

        assert_eq!(fields["Start"], json!("2025-11-08"));
        assert_eq!(fields["End"], json!("2025-11-09"));
        assert_eq!(fields["CurrencyCode"], json!("EUR"));
        assert_eq!(fields["BaseByGuestAmts"][0]["AmountAfterTax"], json!(120.46));
        assert_eq!(fields["BaseByGuestAmts"][1]["AmountAfterTax"], json!(1100.0));
        assert_eq!(fields["BaseByGuestAmts"][1]["CurrencyCode"], json!("JPY"));
        assert_eq!(fields["BaseByGuestAmts"][2]["AmountAfterTax"], json!(80));
        assert_eq!(fields["CancelPolicies"][0]["AmountPercent"]["Amount"], json!(10.01));
    }

    #[test]
    fn test_unparseable_values_are_left_alone() {
        let mut fields = json!({
            "Start": "next tuesday",
            "StatusApplicationControl": {"Start": "01/02/2025"},
            "CurrencyCode": "EUR"
        })
        .as_object()
        .cloned()
        .unwrap();

        normalize_record(MessageKind::Availability, &mut fields);

        assert_eq!(fields["Start"], json!("next tuesday"));
        assert_eq!(fields["StatusApplicationControl"]["Start"], json!("2025-02-01"));
        assert_eq!(fields["CurrencyCode"], json!("EUR"));
    }
}
