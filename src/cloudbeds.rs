// Cloudbeds ARI updates: an envelope carrying an `Inventory` list, one
// canonical record per inventory line.
use crate::mapping::MappingLoader;
use crate::messages::RestrictionKind;
use crate::record::{CanonicalRecord, MessageKind};
use crate::registry::NewTranslator;
use crate::translator::{
    converted, map_fields, mapping_section, MappingCache, MessageFormat, TranslationError,
    Translator,
};
use crate::values::parse_boolean;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

const INVENTORY: &str = "Inventory";

// Checked in order; the first raised flag decides the status
const RESTRICTION_FLAGS: [(&str, RestrictionKind); 3] = [
    ("close", RestrictionKind::Close),
    ("closearr", RestrictionKind::ClosedOnArrival),
    ("closedep", RestrictionKind::ClosedOnDeparture),
];

// Canonical LOS fields and the MinMaxMessageType they become
const LOS_FIELDS: [(&str, &str); 2] = [("MinLOS", "SetMinLOS"), ("MaxLOS", "SetMaxLOS")];

// Per-occupancy amounts folded into BaseByGuestAmts:
// (canonical field, NumberOfGuests, AgeQualifyingCode)
const GUEST_AMOUNT_FIELDS: [(&str, Option<u32>, Option<u32>); 4] = [
    ("BaseRate", None, None),
    ("RdefSingle", Some(1), None),
    ("Adult3", Some(3), Some(10)),
    ("Child3", Some(3), Some(8)),
];

pub struct CloudbedsTranslator {
    pms_code: String,
    mappings: MappingCache,
}

impl CloudbedsTranslator {
    pub fn new(pms_code: &str, loader: Arc<MappingLoader>) -> Self {
        Self {
            pms_code: pms_code.to_string(),
            mappings: MappingCache::new(pms_code, loader),
        }
    }

    fn translate_lines(
        &self,
        payload: &Value,
        kind: MessageKind,
    ) -> Result<Vec<CanonicalRecord>, TranslationError> {
        let mapping = mapping_section(&self.mappings, kind)?;
        let field_map = mapping
            .section(kind)
            .ok_or_else(|| TranslationError::MissingSection {
                pms_code: self.pms_code.clone(),
                kind,
            })?;
        let lines = inventory(payload).ok_or_else(|| {
            TranslationError::InvalidPayload(format!("expected an '{}' list", INVENTORY))
        })?;

        let envelope = converted(&mapping, payload);
        let mut records = Vec::with_capacity(lines.len());
        for line in lines {
            let converted_line = converted(&mapping, line);
            let mut fields = map_fields(field_map, &[&converted_line, &envelope]);
            match kind {
                MessageKind::Availability => {
                    add_restriction_status(line, &mut fields);
                    add_lengths_of_stay(&mut fields);
                }
                MessageKind::Rate => fold_guest_amounts(&mut fields),
            }
            records.push(CanonicalRecord::new(kind, fields));
        }
        debug!(pms_code = %self.pms_code, message_type = %kind, lines = lines.len(), "Mapped inventory lines");
        Ok(records)
    }
}

impl NewTranslator for CloudbedsTranslator {
    fn new_translator(pms_code: &str, loader: Arc<MappingLoader>) -> Self {
        Self::new(pms_code, loader)
    }
}

impl Translator for CloudbedsTranslator {
    fn pms_code(&self) -> &str {
        &self.pms_code
    }

    fn supported_formats(&self) -> &[MessageFormat] {
        &[MessageFormat::Json]
    }

    fn mappings(&self) -> &MappingCache {
        &self.mappings
    }

    fn validate(&self, payload: &Value, _kind: MessageKind) -> bool {
        inventory(payload).is_some()
    }

    fn translate_availability(
        &self,
        payload: &Value,
    ) -> Result<Vec<CanonicalRecord>, TranslationError> {
        self.translate_lines(payload, MessageKind::Availability)
    }

    fn translate_rate(&self, payload: &Value) -> Result<Vec<CanonicalRecord>, TranslationError> {
        self.translate_lines(payload, MessageKind::Rate)
    }
}

fn inventory(payload: &Value) -> Option<&Vec<Value>> {
    payload.as_object()?.get(INVENTORY)?.as_array()
}

fn add_restriction_status(line: &Value, fields: &mut Map<String, Value>) {
    if fields.contains_key("RestrictionStatus") {
        return;
    }
    let raised = RESTRICTION_FLAGS.iter().find(|(flag, _)| {
        line.get(*flag)
            .and_then(parse_boolean)
            .unwrap_or(false)
    });
    if let Some((_, status)) = raised {
        fields.insert("RestrictionStatus".to_string(), json!({ "Status": status }));
    }
}

fn add_lengths_of_stay(fields: &mut Map<String, Value>) {
    if fields.contains_key("LengthsOfStay") {
        return;
    }
    let entries: Vec<Value> = LOS_FIELDS
        .iter()
        .filter_map(|(field, message_type)| {
            let time = fields.get(*field).filter(|v| !v.is_null())?;
            Some(json!({
                "MinMaxMessageType": message_type,
                "Time": time,
                "TimeUnit": "Day",
            }))
        })
        .collect();
    if !entries.is_empty() {
        fields.insert("LengthsOfStay".to_string(), Value::Array(entries));
    }
}

fn fold_guest_amounts(fields: &mut Map<String, Value>) {
    if fields.contains_key("BaseByGuestAmts") {
        return;
    }
    let mut amounts = Vec::new();
    for (field, guests, age_code) in GUEST_AMOUNT_FIELDS {
        let Some(amount) = fields.remove(field) else {
            continue;
        };
        if amount.is_null() {
            continue;
        }
        let mut entry = Map::new();
        entry.insert("AmountAfterTax".to_string(), amount);
        if let Some(guests) = guests {
            entry.insert("NumberOfGuests".to_string(), json!(guests));
        }
        if let Some(code) = age_code {
            entry.insert("AgeQualifyingCode".to_string(), json!(code));
        }
        amounts.push(Value::Object(entry));
    }
    if !amounts.is_empty() {
        fields.insert("BaseByGuestAmts".to_string(), Value::Array(amounts));
    }
}
