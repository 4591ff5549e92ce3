// OTA_HotelAvailNotifRQ / OTA_HotelRateAmountNotifRQ document assembly
use crate::los::LosPattern;
use crate::messages::{
    AmountPercent, AvailStatusMessage, BaseByGuestAmt, CancelPenalty, Deadline, GuaranteePolicy,
    LengthOfStay, MealsIncluded, RateAmountMessage, RestrictionStatus, StatusApplicationControl,
};
use crate::values::Scalar;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

pub const OTA_NAMESPACE: &str = "http://www.opentravel.org/OTA/2003/05";
pub const DEFAULT_TARGET: &str = "Production";
pub const AVAILABILITY_VERSION: &str = "1";
pub const RATE_VERSION: &str = "1.0";

static ECHO_SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("XML serialization error: {0}")]
    Serialization(String),
}

// Root attributes. Unset values are generated per document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOptions {
    pub timestamp: Option<String>,
    pub target: String,
    pub version: Option<String>,
    pub echo_token: Option<String>,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            timestamp: None,
            target: DEFAULT_TARGET.to_string(),
            version: None,
            echo_token: None,
        }
    }
}

impl DocumentOptions {
    fn timestamp(&self) -> String {
        self.timestamp
            .clone()
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    fn echo_token(&self) -> String {
        self.echo_token.clone().unwrap_or_else(next_echo_token)
    }

    fn version(&self, default: &str) -> String {
        self.version.clone().unwrap_or_else(|| default.to_string())
    }
}

// Epoch millis plus a process-wide counter, so two documents built in the
// same millisecond still differ.
pub fn next_echo_token() -> String {
    let sequence = ECHO_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}", Utc::now().timestamp_millis(), sequence)
}

pub fn build_availability_document(
    hotel_code: &str,
    messages: &[AvailStatusMessage],
    options: &DocumentOptions,
) -> Result<String, BuildError> {
    let document = XmlAvailNotif {
        xmlns: OTA_NAMESPACE,
        timestamp: options.timestamp(),
        target: options.target.clone(),
        version: options.version(AVAILABILITY_VERSION),
        echo_token: options.echo_token(),
        messages: XmlAvailStatusMessages {
            hotel_code: hotel_code.to_string(),
            messages: messages.iter().map(XmlAvailStatusMessage::from).collect(),
        },
    };
    quick_xml::se::to_string(&document).map_err(|e| BuildError::Serialization(e.to_string()))
}

pub fn build_rate_document(
    hotel_code: &str,
    messages: &[RateAmountMessage],
    options: &DocumentOptions,
) -> Result<String, BuildError> {
    let document = XmlRateAmountNotif {
        xmlns: OTA_NAMESPACE,
        timestamp: options.timestamp(),
        target: options.target.clone(),
        version: options.version(RATE_VERSION),
        echo_token: options.echo_token(),
        messages: XmlRateAmountMessages {
            hotel_code: hotel_code.to_string(),
            messages: messages.iter().map(XmlRateAmountMessage::from).collect(),
        },
    };
    quick_xml::se::to_string(&document).map_err(|e| BuildError::Serialization(e.to_string()))
}

// Blank text counts as absent so no empty attributes are written.
fn attr(value: &Option<Scalar>) -> Option<Scalar> {
    value.as_ref().filter(|v| !v.is_blank()).cloned()
}

// Flags print as xs:boolean whenever the value reads as one.
fn flag(value: &Option<Scalar>) -> Option<Scalar> {
    attr(value).map(|v| v.as_bool().map(Scalar::Bool).unwrap_or(v))
}

fn non_empty<T>(items: &Option<Vec<T>>) -> Option<&Vec<T>> {
    items.as_ref().filter(|items| !items.is_empty())
}

#[derive(Debug, Serialize)]
#[serde(rename = "OTA_HotelAvailNotifRQ")]
struct XmlAvailNotif {
    #[serde(rename = "@xmlns")]
    xmlns: &'static str,
    #[serde(rename = "@TimeStamp")]
    timestamp: String,
    #[serde(rename = "@Target")]
    target: String,
    #[serde(rename = "@Version")]
    version: String,
    #[serde(rename = "@EchoToken")]
    echo_token: String,
    #[serde(rename = "AvailStatusMessages")]
    messages: XmlAvailStatusMessages,
}

#[derive(Debug, Serialize)]
struct XmlAvailStatusMessages {
    #[serde(rename = "@HotelCode")]
    hotel_code: String,
    #[serde(rename = "AvailStatusMessage")]
    messages: Vec<XmlAvailStatusMessage>,
}

#[derive(Debug, Default, Serialize)]
struct XmlAvailStatusMessage {
    #[serde(rename = "@BookingLimit", skip_serializing_if = "Option::is_none")]
    booking_limit: Option<Scalar>,
    #[serde(rename = "@BookingLimitMessageType", skip_serializing_if = "Option::is_none")]
    booking_limit_message_type: Option<&'static str>,
    #[serde(rename = "StatusApplicationControl", skip_serializing_if = "Option::is_none")]
    status_application_control: Option<XmlAvailApplicationControl>,
    #[serde(rename = "LengthsOfStay", skip_serializing_if = "Option::is_none")]
    lengths_of_stay: Option<XmlLengthsOfStay>,
    #[serde(rename = "RestrictionStatus", skip_serializing_if = "Option::is_none")]
    restriction_status: Option<XmlRestrictionStatus>,
}

impl From<&AvailStatusMessage> for XmlAvailStatusMessage {
    fn from(message: &AvailStatusMessage) -> Self {
        let booking_limit = attr(&message.booking_limit);
        let booking_limit_message_type = booking_limit.as_ref().map(|_| "SetLimit");

        // An explicit StatusApplicationControl replaces the flat fields entirely,
        // unless every one of its values is blank
        let status_application_control = message
            .status_application_control
            .as_ref()
            .map(XmlAvailApplicationControl::from)
            .filter(|explicit| !explicit.is_empty())
            .or_else(|| {
                let [mon, tue, weds, thur, fri, sat, sun] = message.day_flags();
                let synthesized = XmlAvailApplicationControl {
                    start: attr(&message.start),
                    end: attr(&message.end),
                    inv_code: attr(&message.inv_code),
                    rate_plan_code: attr(&message.rate_plan_code),
                    mon: flag(&mon),
                    tue: flag(&tue),
                    weds: flag(&weds),
                    thur: flag(&thur),
                    fri: flag(&fri),
                    sat: flag(&sat),
                    sun: flag(&sun),
                };
                (!synthesized.is_empty()).then_some(synthesized)
            });

        let lengths_of_stay = non_empty(&message.lengths_of_stay).map(|stays| XmlLengthsOfStay {
            lengths: stays.iter().map(XmlLengthOfStay::from).collect(),
        });

        let restriction_status = message
            .restriction_status
            .as_ref()
            .filter(|status| !status.is_empty())
            .map(XmlRestrictionStatus::from);

        Self {
            booking_limit,
            booking_limit_message_type,
            status_application_control,
            lengths_of_stay,
            restriction_status,
        }
    }
}

#[derive(Debug, Default, Serialize)]
struct XmlAvailApplicationControl {
    #[serde(rename = "@Start", skip_serializing_if = "Option::is_none")]
    start: Option<Scalar>,
    #[serde(rename = "@End", skip_serializing_if = "Option::is_none")]
    end: Option<Scalar>,
    #[serde(rename = "@InvCode", skip_serializing_if = "Option::is_none")]
    inv_code: Option<Scalar>,
    #[serde(rename = "@RatePlanCode", skip_serializing_if = "Option::is_none")]
    rate_plan_code: Option<Scalar>,
    #[serde(rename = "@Mon", skip_serializing_if = "Option::is_none")]
    mon: Option<Scalar>,
    #[serde(rename = "@Tue", skip_serializing_if = "Option::is_none")]
    tue: Option<Scalar>,
    #[serde(rename = "@Weds", skip_serializing_if = "Option::is_none")]
    weds: Option<Scalar>,
    #[serde(rename = "@Thur", skip_serializing_if = "Option::is_none")]
    thur: Option<Scalar>,
    #[serde(rename = "@Fri", skip_serializing_if = "Option::is_none")]
    fri: Option<Scalar>,
    #[serde(rename = "@Sat", skip_serializing_if = "Option::is_none")]
    sat: Option<Scalar>,
    #[serde(rename = "@Sun", skip_serializing_if = "Option::is_none")]
    sun: Option<Scalar>,
}

impl XmlAvailApplicationControl {
    fn is_empty(&self) -> bool {
        [
            &self.start,
            &self.end,
            &self.inv_code,
            &self.rate_plan_code,
            &self.mon,
            &self.tue,
            &self.weds,
            &self.thur,
            &self.fri,
            &self.sat,
            &self.sun,
        ]
        .iter()
        .all(|v| v.is_none())
    }
}

impl From<&StatusApplicationControl> for XmlAvailApplicationControl {
    fn from(control: &StatusApplicationControl) -> Self {
        Self {
            start: attr(&control.start),
            end: attr(&control.end),
            inv_code: attr(&control.inv_code),
            rate_plan_code: attr(&control.rate_plan_code),
            mon: flag(&control.mon),
            tue: flag(&control.tue),
            weds: flag(&control.weds),
            thur: flag(&control.thur),
            fri: flag(&control.fri),
            sat: flag(&control.sat),
            sun: flag(&control.sun),
        }
    }
}

#[derive(Debug, Serialize)]
struct XmlLengthsOfStay {
    #[serde(rename = "LengthOfStay")]
    lengths: Vec<XmlLengthOfStay>,
}

#[derive(Debug, Serialize)]
struct XmlLengthOfStay {
    #[serde(rename = "@MinMaxMessageType", skip_serializing_if = "Option::is_none")]
    min_max_message_type: Option<Scalar>,
    #[serde(rename = "@Time", skip_serializing_if = "Option::is_none")]
    time: Option<Scalar>,
    #[serde(rename = "@TimeUnit", skip_serializing_if = "Option::is_none")]
    time_unit: Option<Scalar>,
    #[serde(rename = "LOS_Pattern", skip_serializing_if = "Option::is_none")]
    los_pattern: Option<XmlLosPattern>,
}

impl From<&LengthOfStay> for XmlLengthOfStay {
    fn from(stay: &LengthOfStay) -> Self {
        Self {
            min_max_message_type: attr(&stay.min_max_message_type),
            time: attr(&stay.time),
            time_unit: attr(&stay.time_unit),
            los_pattern: stay
                .los_pattern
                .as_ref()
                .filter(|pattern| !pattern.is_empty())
                .map(XmlLosPattern::from),
        }
    }
}

#[derive(Debug, Serialize)]
struct XmlLosPattern {
    #[serde(rename = "@FullPatternLOS")]
    full_pattern_los: String,
}

impl From<&LosPattern> for XmlLosPattern {
    fn from(pattern: &LosPattern) -> Self {
        Self {
            full_pattern_los: pattern.as_str().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct XmlRestrictionStatus {
    #[serde(rename = "@Status", skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,
    #[serde(rename = "@Restriction", skip_serializing_if = "Option::is_none")]
    restriction: Option<Scalar>,
}

impl From<&RestrictionStatus> for XmlRestrictionStatus {
    fn from(status: &RestrictionStatus) -> Self {
        Self {
            status: status.status.map(|kind| kind.as_str()),
            restriction: attr(&status.restriction),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename = "OTA_HotelRateAmountNotifRQ")]
struct XmlRateAmountNotif {
    #[serde(rename = "@xmlns")]
    xmlns: &'static str,
    #[serde(rename = "@TimeStamp")]
    timestamp: String,
    #[serde(rename = "@Target")]
    target: String,
    #[serde(rename = "@Version")]
    version: String,
    #[serde(rename = "@EchoToken")]
    echo_token: String,
    #[serde(rename = "RateAmountMessages")]
    messages: XmlRateAmountMessages,
}

#[derive(Debug, Serialize)]
struct XmlRateAmountMessages {
    #[serde(rename = "@HotelCode")]
    hotel_code: String,
    #[serde(rename = "RateAmountMessage")]
    messages: Vec<XmlRateAmountMessage>,
}

#[derive(Debug, Serialize)]
struct XmlRateAmountMessage {
    #[serde(rename = "StatusApplicationControl")]
    status_application_control: XmlRateApplicationControl,
    #[serde(rename = "Rates")]
    rates: XmlRates,
}

impl From<&RateAmountMessage> for XmlRateAmountMessage {
    fn from(message: &RateAmountMessage) -> Self {
        let rate = XmlRate {
            currency_code: attr(&message.currency_code),
            unit_multiplier: attr(&message.unit_multiplier),
            base_by_guest_amts: non_empty(&message.base_by_guest_amts).map(|amounts| {
                XmlBaseByGuestAmts {
                    amounts: amounts.iter().map(XmlBaseByGuestAmt::from).collect(),
                }
            }),
            guarantee_policies: non_empty(&message.guarantee_policies).map(|policies| {
                XmlGuaranteePolicies {
                    policies: policies.iter().map(XmlGuaranteePolicy::from).collect(),
                }
            }),
            cancel_policies: non_empty(&message.cancel_policies).map(|penalties| {
                XmlCancelPolicies {
                    penalties: penalties.iter().map(XmlCancelPenalty::from).collect(),
                }
            }),
            meals_included: message
                .meals_included
                .as_ref()
                .map(XmlMealsIncluded::from)
                .filter(|meals| !meals.is_empty()),
        };

        Self {
            status_application_control: XmlRateApplicationControl {
                inv_code: attr(&message.inv_code),
                rate_plan_code: attr(&message.rate_plan_code),
                start: attr(&message.start),
                end: attr(&message.end),
            },
            rates: XmlRates { rate },
        }
    }
}

#[derive(Debug, Serialize)]
struct XmlRateApplicationControl {
    #[serde(rename = "@InvCode", skip_serializing_if = "Option::is_none")]
    inv_code: Option<Scalar>,
    #[serde(rename = "@RatePlanCode", skip_serializing_if = "Option::is_none")]
    rate_plan_code: Option<Scalar>,
    #[serde(rename = "@Start", skip_serializing_if = "Option::is_none")]
    start: Option<Scalar>,
    #[serde(rename = "@End", skip_serializing_if = "Option::is_none")]
    end: Option<Scalar>,
}

#[derive(Debug, Serialize)]
struct XmlRates {
    #[serde(rename = "Rate")]
    rate: XmlRate,
}

#[derive(Debug, Serialize)]
struct XmlRate {
    #[serde(rename = "@CurrencyCode", skip_serializing_if = "Option::is_none")]
    currency_code: Option<Scalar>,
    #[serde(rename = "@UnitMultiplier", skip_serializing_if = "Option::is_none")]
    unit_multiplier: Option<Scalar>,
    #[serde(rename = "BaseByGuestAmts", skip_serializing_if = "Option::is_none")]
    base_by_guest_amts: Option<XmlBaseByGuestAmts>,
    #[serde(rename = "GuaranteePolicies", skip_serializing_if = "Option::is_none")]
    guarantee_policies: Option<XmlGuaranteePolicies>,
    #[serde(rename = "CancelPolicies", skip_serializing_if = "Option::is_none")]
    cancel_policies: Option<XmlCancelPolicies>,
    #[serde(rename = "MealsIncluded", skip_serializing_if = "Option::is_none")]
    meals_included: Option<XmlMealsIncluded>,
}

#[derive(Debug, Serialize)]
struct XmlBaseByGuestAmts {
    #[serde(rename = "BaseByGuestAmt")]
    amounts: Vec<XmlBaseByGuestAmt>,
}

#[derive(Debug, Serialize)]
struct XmlBaseByGuestAmt {
    #[serde(rename = "@AmountBeforeTax", skip_serializing_if = "Option::is_none")]
    amount_before_tax: Option<Scalar>,
    #[serde(rename = "@AmountAfterTax", skip_serializing_if = "Option::is_none")]
    amount_after_tax: Option<Scalar>,
    #[serde(rename = "@NumberOfGuests", skip_serializing_if = "Option::is_none")]
    number_of_guests: Option<Scalar>,
    #[serde(rename = "@AgeQualifyingCode", skip_serializing_if = "Option::is_none")]
    age_qualifying_code: Option<Scalar>,
    #[serde(rename = "@CurrencyCode", skip_serializing_if = "Option::is_none")]
    currency_code: Option<Scalar>,
}

impl From<&BaseByGuestAmt> for XmlBaseByGuestAmt {
    fn from(amount: &BaseByGuestAmt) -> Self {
        Self {
            amount_before_tax: attr(&amount.amount_before_tax),
            amount_after_tax: attr(&amount.amount_after_tax),
            number_of_guests: attr(&amount.number_of_guests),
            age_qualifying_code: attr(&amount.age_qualifying_code),
            currency_code: attr(&amount.currency_code),
        }
    }
}

#[derive(Debug, Serialize)]
struct XmlGuaranteePolicies {
    #[serde(rename = "GuaranteePolicy")]
    policies: Vec<XmlGuaranteePolicy>,
}

#[derive(Debug, Serialize)]
struct XmlGuaranteePolicy {
    #[serde(rename = "@GuaranteeCode", skip_serializing_if = "Option::is_none")]
    guarantee_code: Option<Scalar>,
    #[serde(rename = "@GuaranteeType", skip_serializing_if = "Option::is_none")]
    guarantee_type: Option<Scalar>,
    #[serde(rename = "@HoldTime", skip_serializing_if = "Option::is_none")]
    hold_time: Option<Scalar>,
}

impl From<&GuaranteePolicy> for XmlGuaranteePolicy {
    fn from(policy: &GuaranteePolicy) -> Self {
        Self {
            guarantee_code: attr(&policy.guarantee_code),
            guarantee_type: attr(&policy.guarantee_type),
            hold_time: attr(&policy.hold_time),
        }
    }
}

#[derive(Debug, Serialize)]
struct XmlCancelPolicies {
    #[serde(rename = "CancelPenalty")]
    penalties: Vec<XmlCancelPenalty>,
}

#[derive(Debug, Serialize)]
struct XmlCancelPenalty {
    #[serde(rename = "@NonRefundable", skip_serializing_if = "Option::is_none")]
    non_refundable: Option<Scalar>,
    #[serde(rename = "@PolicyCode", skip_serializing_if = "Option::is_none")]
    policy_code: Option<Scalar>,
    #[serde(rename = "Deadline", skip_serializing_if = "Option::is_none")]
    deadline: Option<XmlDeadline>,
    #[serde(rename = "AmountPercent", skip_serializing_if = "Option::is_none")]
    amount_percent: Option<XmlAmountPercent>,
    #[serde(rename = "PenaltyDescription", skip_serializing_if = "Option::is_none")]
    penalty_description: Option<XmlPenaltyDescription>,
}

impl From<&CancelPenalty> for XmlCancelPenalty {
    fn from(penalty: &CancelPenalty) -> Self {
        Self {
            non_refundable: flag(&penalty.non_refundable),
            policy_code: attr(&penalty.policy_code),
            deadline: penalty
                .deadline
                .as_ref()
                .map(XmlDeadline::from)
                .filter(|deadline| !deadline.is_empty()),
            amount_percent: penalty
                .amount_percent
                .as_ref()
                .map(XmlAmountPercent::from)
                .filter(|amount| !amount.is_empty()),
            penalty_description: penalty
                .penalty_description
                .as_ref()
                .and_then(|description| attr(&description.text))
                .map(|text| XmlPenaltyDescription {
                    text: text.to_string(),
                }),
        }
    }
}

#[derive(Debug, Serialize)]
struct XmlDeadline {
    #[serde(rename = "@AbsoluteDeadline", skip_serializing_if = "Option::is_none")]
    absolute_deadline: Option<Scalar>,
    #[serde(rename = "@OffsetTimeUnit", skip_serializing_if = "Option::is_none")]
    offset_time_unit: Option<Scalar>,
    #[serde(rename = "@OffsetUnitMultiplier", skip_serializing_if = "Option::is_none")]
    offset_unit_multiplier: Option<Scalar>,
    #[serde(rename = "@OffsetDropTime", skip_serializing_if = "Option::is_none")]
    offset_drop_time: Option<Scalar>,
}

impl XmlDeadline {
    fn is_empty(&self) -> bool {
        self.absolute_deadline.is_none()
            && self.offset_time_unit.is_none()
            && self.offset_unit_multiplier.is_none()
            && self.offset_drop_time.is_none()
    }
}

impl From<&Deadline> for XmlDeadline {
    fn from(deadline: &Deadline) -> Self {
        Self {
            absolute_deadline: attr(&deadline.absolute_deadline),
            offset_time_unit: attr(&deadline.offset_time_unit),
            offset_unit_multiplier: attr(&deadline.offset_unit_multiplier),
            offset_drop_time: attr(&deadline.offset_drop_time),
        }
    }
}

#[derive(Debug, Serialize)]
struct XmlAmountPercent {
    #[serde(rename = "@Percent", skip_serializing_if = "Option::is_none")]
    percent: Option<Scalar>,
    #[serde(rename = "@Amount", skip_serializing_if = "Option::is_none")]
    amount: Option<Scalar>,
    #[serde(rename = "@NmbrOfNights", skip_serializing_if = "Option::is_none")]
    nmbr_of_nights: Option<Scalar>,
    #[serde(rename = "@CurrencyCode", skip_serializing_if = "Option::is_none")]
    currency_code: Option<Scalar>,
    #[serde(rename = "@BasisType", skip_serializing_if = "Option::is_none")]
    basis_type: Option<Scalar>,
}

impl XmlAmountPercent {
    fn is_empty(&self) -> bool {
        self.percent.is_none()
            && self.amount.is_none()
            && self.nmbr_of_nights.is_none()
            && self.currency_code.is_none()
            && self.basis_type.is_none()
    }
}

impl From<&AmountPercent> for XmlAmountPercent {
    fn from(amount: &AmountPercent) -> Self {
        Self {
            percent: attr(&amount.percent),
            amount: attr(&amount.amount),
            nmbr_of_nights: attr(&amount.nmbr_of_nights),
            currency_code: attr(&amount.currency_code),
            basis_type: attr(&amount.basis_type),
        }
    }
}

#[derive(Debug, Serialize)]
struct XmlPenaltyDescription {
    #[serde(rename = "Text")]
    text: String,
}

#[derive(Debug, Serialize)]
struct XmlMealsIncluded {
    #[serde(rename = "@Breakfast", skip_serializing_if = "Option::is_none")]
    breakfast: Option<Scalar>,
    #[serde(rename = "@Lunch", skip_serializing_if = "Option::is_none")]
    lunch: Option<Scalar>,
    #[serde(rename = "@Dinner", skip_serializing_if = "Option::is_none")]
    dinner: Option<Scalar>,
    #[serde(rename = "@MealPlanIndicator", skip_serializing_if = "Option::is_none")]
    meal_plan_indicator: Option<Scalar>,
    #[serde(rename = "@MealPlanCodes", skip_serializing_if = "Option::is_none")]
    meal_plan_codes: Option<Scalar>,
}

impl XmlMealsIncluded {
    fn is_empty(&self) -> bool {
        self.breakfast.is_none()
            && self.lunch.is_none()
            && self.dinner.is_none()
            && self.meal_plan_indicator.is_none()
            && self.meal_plan_codes.is_none()
    }
}

impl From<&MealsIncluded> for XmlMealsIncluded {
    fn from(meals: &MealsIncluded) -> Self {
        Self {
            breakfast: flag(&meals.breakfast),
            lunch: flag(&meals.lunch),
            dinner: flag(&meals.dinner),
            meal_plan_indicator: flag(&meals.meal_plan_indicator),
            meal_plan_codes: attr(&meals.meal_plan_codes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::los::DayPattern;
    use crate::messages::RestrictionKind;

    fn fixed_options() -> DocumentOptions {
        DocumentOptions {
            timestamp: Some("2025-01-01T00:00:00Z".to_string()),
            echo_token: Some("42".to_string()),
            ..Default::default()
        }
    }

    fn avail_message() -> AvailStatusMessage {
        AvailStatusMessage {
            start: Some("2025-01-01".into()),
            end: Some("2025-01-07".into()),
            inv_code: Some("KING".into()),
            rate_plan_code: Some("RATE1".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_availability_root_attributes() {
        let result = build_availability_document("H1", &[avail_message()], &fixed_options());
        assert!(result.is_ok(), "Build failed: {:?}", result.err());
        let xml = result.unwrap();

        assert!(xml.starts_with("<OTA_HotelAvailNotifRQ"));
        assert!(xml.contains(r#"xmlns="http://www.opentravel.org/OTA/2003/05""#));
        assert!(xml.contains(r#"TimeStamp="2025-01-01T00:00:00Z""#));
        assert!(xml.contains(r#"Target="Production""#));
        assert!(xml.contains(r#"Version="1""#));
        assert!(xml.contains(r#"EchoToken="42""#));
        assert!(xml.contains(r#"<AvailStatusMessages HotelCode="H1">"#));
        assert!(xml.contains(
            r#"<StatusApplicationControl Start="2025-01-01" End="2025-01-07" InvCode="KING" RatePlanCode="RATE1"/>"#
        ));
    }

    #[test]
    fn test_booking_limit_adds_message_type() {
        let message = AvailStatusMessage {
            booking_limit: Some(Scalar::Int(5)),
            ..avail_message()
        };
        let xml = build_availability_document("H1", &[message], &fixed_options()).unwrap();
        assert!(xml.contains(r#"BookingLimit="5" BookingLimitMessageType="SetLimit""#));

        let xml = build_availability_document("H1", &[avail_message()], &fixed_options()).unwrap();
        assert!(!xml.contains("BookingLimit"));
    }

    #[test]
    fn test_day_flags_render_lowercase_booleans() {
        let message = AvailStatusMessage {
            mon: Some(Scalar::Bool(true)),
            weds: Some(Scalar::from("N")),
            sun: Some(Scalar::Bool(false)),
            ..avail_message()
        };
        let xml = build_availability_document("H1", &[message], &fixed_options()).unwrap();
        assert!(xml.contains(r#"Mon="true""#));
        assert!(xml.contains(r#"Weds="false""#));
        assert!(xml.contains(r#"Sun="false""#));
        assert!(!xml.contains("True"));
        assert!(!xml.contains("Tue="));
    }

    #[test]
    fn test_days_of_week_pattern_fills_day_flags() {
        let message = AvailStatusMessage {
            days_of_week: Some(DayPattern::from_binary("1000111")),
            ..avail_message()
        };
        let xml = build_availability_document("H1", &[message], &fixed_options()).unwrap();
        assert!(xml.contains(r#"Mon="true" Tue="false" Weds="false" Thur="false" Fri="true""#));
    }

    #[test]
    fn test_explicit_status_application_control_wins() {
        let message = AvailStatusMessage {
            status_application_control: Some(StatusApplicationControl {
                start: Some("2025-03-01".into()),
                inv_code: Some("SUITE".into()),
                tue: Some(Scalar::Bool(true)),
                ..Default::default()
            }),
            mon: Some(Scalar::Bool(false)),
            ..avail_message()
        };
        let xml = build_availability_document("H1", &[message], &fixed_options()).unwrap();
        assert!(xml.contains(r#"<StatusApplicationControl Start="2025-03-01" InvCode="SUITE" Tue="true"/>"#));
        assert!(!xml.contains("KING"));
        assert!(!xml.contains("Mon="));
    }

    fn shipped_schemas() -> crate::schema::SchemaCatalog {
        crate::schema::SchemaCatalog::new(
            std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(crate::schema::DEFAULT_SCHEMA_DIR),
        )
    }

    #[test]
    fn test_blank_status_application_control_falls_back_to_flat_fields() {
        let message = AvailStatusMessage {
            status_application_control: Some(StatusApplicationControl {
                start: Some("  ".into()),
                inv_code: Some("".into()),
                ..Default::default()
            }),
            mon: Some(Scalar::Bool(true)),
            ..avail_message()
        };
        let xml = build_availability_document("H1", &[message], &fixed_options()).unwrap();
        assert!(xml.contains(
            r#"<StatusApplicationControl Start="2025-01-01" End="2025-01-07" InvCode="KING" RatePlanCode="RATE1" Mon="true"/>"#
        ));
        assert_eq!(
            shipped_schemas().validate(crate::record::MessageKind::Availability, &xml),
            None
        );
    }

    #[test]
    fn test_lengths_of_stay_only_when_present() {
        let xml = build_availability_document("H1", &[avail_message()], &fixed_options()).unwrap();
        assert!(!xml.contains("LengthsOfStay"));

        let empty = AvailStatusMessage {
            lengths_of_stay: Some(Vec::new()),
            ..avail_message()
        };
        let xml = build_availability_document("H1", &[empty], &fixed_options()).unwrap();
        assert!(!xml.contains("LengthsOfStay"));

        let with_stays = AvailStatusMessage {
            lengths_of_stay: Some(vec![
                LengthOfStay {
                    min_max_message_type: Some("SetMinLOS".into()),
                    time: Some(Scalar::Int(2)),
                    time_unit: Some("Day".into()),
                    los_pattern: None,
                },
                LengthOfStay {
                    min_max_message_type: Some("FullPatternLOS".into()),
                    los_pattern: LosPattern::from_value(&serde_json::json!("1100111")),
                    ..Default::default()
                },
            ]),
            ..avail_message()
        };
        let xml = build_availability_document("H1", &[with_stays], &fixed_options()).unwrap();
        assert!(xml.contains("<LengthsOfStay>"));
        assert_eq!(xml.matches("<LengthOfStay ").count(), 2);
        assert!(xml.contains(r#"<LengthOfStay MinMaxMessageType="SetMinLOS" Time="2" TimeUnit="Day"/>"#));
        assert!(xml.contains(r#"<LOS_Pattern FullPatternLOS="1100111"/>"#));
    }

    #[test]
    fn test_restriction_status_and_message_order() {
        let first = AvailStatusMessage {
            restriction_status: Some(RestrictionStatus {
                status: Some(RestrictionKind::ClosedOnArrival),
                restriction: Some("Master".into()),
            }),
            ..avail_message()
        };
        let second = AvailStatusMessage {
            inv_code: Some("TWIN".into()),
            restriction_status: Some(RestrictionStatus::default()),
            ..avail_message()
        };
        let xml = build_availability_document("H1", &[first, second], &fixed_options()).unwrap();
        assert_eq!(xml.matches("<AvailStatusMessage>").count(), 2);
        assert_eq!(xml.matches("<RestrictionStatus ").count(), 1);
        assert!(xml.contains(r#"<RestrictionStatus Status="ClosedOnArrival" Restriction="Master"/>"#));
        let king = xml.find("KING").unwrap();
        let twin = xml.find("TWIN").unwrap();
        assert!(king < twin);
    }

    #[test]
    fn test_values_are_escaped() {
        let message = AvailStatusMessage {
            inv_code: Some("A&B <\"C\">".into()),
            ..avail_message()
        };
        let xml = build_availability_document("H&1", &[message], &fixed_options()).unwrap();
        assert!(xml.contains("HotelCode=\"H&amp;1\""));
        assert!(xml.contains("A&amp;B &lt;"));
        assert!(!xml.contains("<\"C\">"));
    }

    #[test]
    fn test_generated_echo_tokens_differ() {
        let options = DocumentOptions::default();
        let a = build_availability_document("H1", &[], &options).unwrap();
        let b = build_availability_document("H1", &[], &options).unwrap();
        let token = |xml: &str| xml.split("EchoToken=\"").nth(1).unwrap().split('"').next().unwrap().to_string();
        assert_ne!(token(&a), token(&b));
    }

    fn rate_message() -> RateAmountMessage {
        RateAmountMessage {
            inv_code: Some("KING".into()),
            rate_plan_code: Some("RATE1".into()),
            start: Some("2025-01-01".into()),
            end: Some("2025-01-07".into()),
            currency_code: Some("EUR".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_rate_document_skeleton() {
        let xml = build_rate_document("H1", &[rate_message()], &fixed_options()).unwrap();
        assert!(xml.starts_with("<OTA_HotelRateAmountNotifRQ"));
        assert!(xml.contains(r#"Version="1.0""#));
        assert!(xml.contains(r#"<RateAmountMessages HotelCode="H1">"#));
        assert!(xml.contains(
            r#"<StatusApplicationControl InvCode="KING" RatePlanCode="RATE1" Start="2025-01-01" End="2025-01-07"/>"#
        ));
        assert!(xml.contains(r#"<Rates><Rate CurrencyCode="EUR"/></Rates>"#));
    }

    #[test]
    fn test_rate_children_in_order() {
        let message = RateAmountMessage {
            base_by_guest_amts: Some(vec![BaseByGuestAmt {
                amount_after_tax: Some(Scalar::Float(120.5)),
                number_of_guests: Some(Scalar::Int(2)),
                ..Default::default()
            }]),
            guarantee_policies: Some(vec![GuaranteePolicy {
                guarantee_code: Some("GCC".into()),
                ..Default::default()
            }]),
            cancel_policies: Some(vec![CancelPenalty {
                non_refundable: Some(Scalar::Bool(false)),
                deadline: Some(Deadline {
                    offset_time_unit: Some("Day".into()),
                    offset_unit_multiplier: Some(Scalar::Int(2)),
                    ..Default::default()
                }),
                amount_percent: Some(AmountPercent {
                    percent: Some(Scalar::Int(100)),
                    ..Default::default()
                }),
                penalty_description: Some(crate::messages::PenaltyDescription {
                    text: Some("Full charge & no show".into()),
                }),
                ..Default::default()
            }]),
            meals_included: Some(MealsIncluded {
                breakfast: Some(Scalar::Bool(true)),
                ..Default::default()
            }),
            ..rate_message()
        };
        let xml = build_rate_document("H1", &[message], &fixed_options()).unwrap();

        let positions: Vec<usize> = [
            "<BaseByGuestAmts>",
            "<GuaranteePolicies>",
            "<CancelPolicies>",
            "<MealsIncluded",
        ]
        .iter()
        .map(|tag| xml.find(tag).unwrap_or_else(|| panic!("{} missing from {}", tag, xml)))
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        assert!(xml.contains(r#"<BaseByGuestAmt AmountAfterTax="120.5" NumberOfGuests="2"/>"#));
        assert!(xml.contains(r#"<CancelPenalty NonRefundable="false">"#));
        assert!(xml.contains(r#"<Deadline OffsetTimeUnit="Day" OffsetUnitMultiplier="2"/>"#));
        assert!(xml.contains(r#"<AmountPercent Percent="100"/>"#));
        assert!(xml.contains("<PenaltyDescription><Text>Full charge &amp; no show</Text></PenaltyDescription>"));
        assert!(xml.contains(r#"<MealsIncluded Breakfast="true"/>"#));
    }

    #[test]
    fn test_blank_nested_rate_structures_are_omitted() {
        let message = RateAmountMessage {
            cancel_policies: Some(vec![CancelPenalty {
                policy_code: Some("FLEX".into()),
                deadline: Some(Deadline {
                    offset_time_unit: Some(" ".into()),
                    ..Default::default()
                }),
                amount_percent: Some(AmountPercent::default()),
                penalty_description: Some(crate::messages::PenaltyDescription {
                    text: Some("".into()),
                }),
                ..Default::default()
            }]),
            meals_included: Some(MealsIncluded {
                meal_plan_codes: Some("  ".into()),
                ..Default::default()
            }),
            ..rate_message()
        };
        let xml = build_rate_document("H1", &[message], &fixed_options()).unwrap();

        assert!(xml.contains(r#"<CancelPolicies><CancelPenalty PolicyCode="FLEX"/></CancelPolicies>"#));
        for tag in ["<Deadline", "<AmountPercent", "<PenaltyDescription", "<MealsIncluded"] {
            assert!(!xml.contains(tag), "{} should be omitted from {}", tag, xml);
        }
        assert_eq!(
            shipped_schemas().validate(crate::record::MessageKind::Rate, &xml),
            None
        );
    }
}
