// Typed builder inputs read out of canonical records
//
// Field names follow the canonical (PascalCase) record keys. Every attribute
// is optional here: absent values are simply not rendered, and the schema
// check after building decides whether the document is acceptable.
use crate::los::{DayPattern, LosPattern};
use crate::record::CanonicalRecord;
use crate::values::Scalar;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct AvailStatusMessage {
    pub start: Option<Scalar>,
    pub end: Option<Scalar>,
    pub inv_code: Option<Scalar>,
    pub rate_plan_code: Option<Scalar>,
    pub booking_limit: Option<Scalar>,
    pub status_application_control: Option<StatusApplicationControl>,
    pub mon: Option<Scalar>,
    pub tue: Option<Scalar>,
    #[serde(alias = "Wed")]
    pub weds: Option<Scalar>,
    #[serde(alias = "Thu")]
    pub thur: Option<Scalar>,
    pub fri: Option<Scalar>,
    pub sat: Option<Scalar>,
    pub sun: Option<Scalar>,
    // Whole-week pattern; individual day fields win over it
    pub days_of_week: Option<DayPattern>,
    pub lengths_of_stay: Option<Vec<LengthOfStay>>,
    pub restriction_status: Option<RestrictionStatus>,
}

impl AvailStatusMessage {
    // Day flags Monday..Sunday after applying the DaysOfWeek fallback
    pub fn day_flags(&self) -> [Option<Scalar>; 7] {
        let explicit = [
            &self.mon, &self.tue, &self.weds, &self.thur, &self.fri, &self.sat, &self.sun,
        ];
        let pattern = self.days_of_week.map(|p| p.flags());
        let mut flags: [Option<Scalar>; 7] = Default::default();
        for (i, slot) in flags.iter_mut().enumerate() {
            *slot = explicit[i]
                .clone()
                .or_else(|| pattern.map(|p| Scalar::Bool(p[i])));
        }
        flags
    }
}

impl TryFrom<&CanonicalRecord> for AvailStatusMessage {
    type Error = serde_json::Error;

    fn try_from(record: &CanonicalRecord) -> Result<Self, Self::Error> {
        record.to_message()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct StatusApplicationControl {
    pub start: Option<Scalar>,
    pub end: Option<Scalar>,
    pub inv_code: Option<Scalar>,
    pub rate_plan_code: Option<Scalar>,
    pub mon: Option<Scalar>,
    pub tue: Option<Scalar>,
    #[serde(alias = "Wed")]
    pub weds: Option<Scalar>,
    #[serde(alias = "Thu")]
    pub thur: Option<Scalar>,
    pub fri: Option<Scalar>,
    pub sat: Option<Scalar>,
    pub sun: Option<Scalar>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct LengthOfStay {
    pub min_max_message_type: Option<Scalar>,
    pub time: Option<Scalar>,
    pub time_unit: Option<Scalar>,
    #[serde(rename = "LOS_Pattern")]
    pub los_pattern: Option<LosPattern>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestrictionKind {
    Close,
    ClosedOnArrival,
    ClosedOnDeparture,
}

impl RestrictionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestrictionKind::Close => "Close",
            RestrictionKind::ClosedOnArrival => "ClosedOnArrival",
            RestrictionKind::ClosedOnDeparture => "ClosedOnDeparture",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RestrictionStatus {
    pub status: Option<RestrictionKind>,
    pub restriction: Option<Scalar>,
}

impl RestrictionStatus {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.restriction.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RateAmountMessage {
    pub inv_code: Option<Scalar>,
    pub rate_plan_code: Option<Scalar>,
    pub start: Option<Scalar>,
    pub end: Option<Scalar>,
    pub currency_code: Option<Scalar>,
    pub unit_multiplier: Option<Scalar>,
    pub base_by_guest_amts: Option<Vec<BaseByGuestAmt>>,
    pub guarantee_policies: Option<Vec<GuaranteePolicy>>,
    pub cancel_policies: Option<Vec<CancelPenalty>>,
    pub meals_included: Option<MealsIncluded>,
}

impl TryFrom<&CanonicalRecord> for RateAmountMessage {
    type Error = serde_json::Error;

    fn try_from(record: &CanonicalRecord) -> Result<Self, Self::Error> {
        record.to_message()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct BaseByGuestAmt {
    pub amount_before_tax: Option<Scalar>,
    pub amount_after_tax: Option<Scalar>,
    pub number_of_guests: Option<Scalar>,
    pub age_qualifying_code: Option<Scalar>,
    pub currency_code: Option<Scalar>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct GuaranteePolicy {
    pub guarantee_code: Option<Scalar>,
    pub guarantee_type: Option<Scalar>,
    pub hold_time: Option<Scalar>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct CancelPenalty {
    pub non_refundable: Option<Scalar>,
    pub policy_code: Option<Scalar>,
    pub deadline: Option<Deadline>,
    pub amount_percent: Option<AmountPercent>,
    pub penalty_description: Option<PenaltyDescription>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Deadline {
    pub absolute_deadline: Option<Scalar>,
    pub offset_time_unit: Option<Scalar>,
    pub offset_unit_multiplier: Option<Scalar>,
    pub offset_drop_time: Option<Scalar>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct AmountPercent {
    pub percent: Option<Scalar>,
    pub amount: Option<Scalar>,
    pub nmbr_of_nights: Option<Scalar>,
    pub currency_code: Option<Scalar>,
    pub basis_type: Option<Scalar>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct PenaltyDescription {
    pub text: Option<Scalar>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct MealsIncluded {
    pub breakfast: Option<Scalar>,
    pub lunch: Option<Scalar>,
    pub dinner: Option<Scalar>,
    pub meal_plan_indicator: Option<Scalar>,
    pub meal_plan_codes: Option<Scalar>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MessageKind;
    use serde_json::{json, Value};

    fn record(kind: MessageKind, value: Value) -> CanonicalRecord {
        CanonicalRecord::new(kind, value.as_object().cloned().unwrap())
    }

    #[test]
    fn test_avail_message_from_record() {
        let record = record(
            MessageKind::Availability,
            json!({
                "Start": "2025-01-01",
                "End": "2025-01-07",
                "InvCode": "KING",
                "BookingLimit": 5,
                "Wed": true,
                "RestrictionStatus": {"Status": "Close"},
                "LengthsOfStay": [{"MinMaxMessageType": "SetMinLOS", "Time": 2}],
                "MinLOS": 2
            }),
        );
        let message = AvailStatusMessage::try_from(&record).unwrap();
        assert_eq!(message.booking_limit, Some(Scalar::Int(5)));
        assert_eq!(message.rate_plan_code, Some(Scalar::from("DEFAULT")));
        assert_eq!(message.weds, Some(Scalar::Bool(true)));
        assert_eq!(
            message.restriction_status.unwrap().status,
            Some(RestrictionKind::Close)
        );
        assert_eq!(message.lengths_of_stay.unwrap().len(), 1);
    }

    #[test]
    fn test_day_flags_prefer_explicit_days_over_pattern() {
        let message = AvailStatusMessage {
            mon: Some(Scalar::Bool(false)),
            days_of_week: Some(DayPattern::ALL_OPEN),
            ..Default::default()
        };
        let flags = message.day_flags();
        assert_eq!(flags[0], Some(Scalar::Bool(false)));
        assert_eq!(flags[6], Some(Scalar::Bool(true)));
    }

    #[test]
    fn test_unreadable_patterns_open_all_days() {
        let record = record(
            MessageKind::Availability,
            json!({
                "DaysOfWeek": "weekdays only",
                "LengthsOfStay": [
                    {"MinMaxMessageType": "FullPatternLOS", "LOS_Pattern": "whenever"},
                    {"MinMaxMessageType": "SetMinLOS", "Time": 2, "LOS_Pattern": ""}
                ]
            }),
        );
        let message = AvailStatusMessage::try_from(&record).unwrap();
        assert_eq!(message.days_of_week, Some(DayPattern::ALL_OPEN));
        let stays = message.lengths_of_stay.unwrap();
        assert_eq!(stays[0].los_pattern, Some(LosPattern::all_open()));
        assert!(stays[1].los_pattern.as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_restriction_status_is_an_error() {
        let record = record(
            MessageKind::Availability,
            json!({"RestrictionStatus": {"Status": "Maybe"}}),
        );
        assert!(AvailStatusMessage::try_from(&record).is_err());
    }

    #[test]
    fn test_rate_message_nested_policies() {
        let record = record(
            MessageKind::Rate,
            json!({
                "CancelPolicies": [{
                    "NonRefundable": false,
                    "Deadline": {"OffsetTimeUnit": "Day", "OffsetUnitMultiplier": 2},
                    "PenaltyDescription": {"Text": "Two days notice"}
                }],
                "MealsIncluded": {"Breakfast": true}
            }),
        );
        let message = RateAmountMessage::try_from(&record).unwrap();
        assert_eq!(message.currency_code, Some(Scalar::from("USD")));
        let penalty = &message.cancel_policies.unwrap()[0];
        assert_eq!(penalty.non_refundable, Some(Scalar::Bool(false)));
        assert_eq!(
            penalty.deadline.as_ref().unwrap().offset_unit_multiplier,
            Some(Scalar::Int(2))
        );
        assert_eq!(message.meals_included.unwrap().breakfast, Some(Scalar::Bool(true)));
    }
}
