//! The `checklist_state` column: an ordered log of tagged strings.
//!
//! Check-in and check-out entries carry a JSON payload behind a prefix,
//! timer entries carry opaque text, and anything else is a free-text line
//! describing work done on the pet.

use std::collections::BTreeMap;

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use utoipa::ToSchema;

pub const CHECKIN_PREFIX: &str = "CHECKIN:";
pub const CHECKOUT_PREFIX: &str = "CHECKOUT:";
pub const TIMER_PREFIX: &str = "TIMER:";

const RESERVED_PREFIXES: [&str; 3] = [CHECKIN_PREFIX, CHECKOUT_PREFIX, TIMER_PREFIX];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct CheckPayload {
    pub timestamp: String,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub observations: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<String>,
}

impl CheckPayload {
    fn validate(&self) -> Result<(), ChecklistError> {
        if self.timestamp.trim().is_empty() {
            return Err(ChecklistError::MissingTimestamp);
        }
        DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|_| ChecklistError::InvalidTimestamp(self.timestamp.clone()))?;
        if self.photos.iter().any(|url| url.trim().is_empty()) {
            return Err(ChecklistError::EmptyPhotoUrl);
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChecklistEntry {
    CheckIn(CheckPayload),
    CheckOut(CheckPayload),
    Timer { value: String },
    Note { text: String },
}

#[derive(Debug, Error)]
pub enum ChecklistError {
    #[error("checklist payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("check-in/check-out timestamp is required")]
    MissingTimestamp,
    #[error("timestamp is not RFC 3339: {0}")]
    InvalidTimestamp(String),
    #[error("photo URLs must not be empty")]
    EmptyPhotoUrl,
    #[error("timer value must not be empty")]
    EmptyTimer,
    #[error("note text must not be empty")]
    EmptyNote,
    #[error("note text must not start with a reserved prefix")]
    ReservedPrefix,
}

impl ChecklistEntry {
    /// Reads one stored entry. Only the JSON of check-in/check-out entries can
    /// fail; content is not validated so historical rows stay readable.
    pub fn decode(raw: &str) -> Result<Self, ChecklistError> {
        if let Some(json) = raw.strip_prefix(CHECKIN_PREFIX) {
            return Ok(ChecklistEntry::CheckIn(serde_json::from_str(json)?));
        }
        if let Some(json) = raw.strip_prefix(CHECKOUT_PREFIX) {
            return Ok(ChecklistEntry::CheckOut(serde_json::from_str(json)?));
        }
        if let Some(value) = raw.strip_prefix(TIMER_PREFIX) {
            return Ok(ChecklistEntry::Timer {
                value: value.to_string(),
            });
        }
        Ok(ChecklistEntry::Note {
            text: raw.to_string(),
        })
    }

    /// Validates the entry and renders its stored form.
    pub fn encode(&self) -> Result<String, ChecklistError> {
        match self {
            ChecklistEntry::CheckIn(payload) => {
                payload.validate()?;
                Ok(format!("{CHECKIN_PREFIX}{}", serde_json::to_string(payload)?))
            }
            ChecklistEntry::CheckOut(payload) => {
                payload.validate()?;
                Ok(format!("{CHECKOUT_PREFIX}{}", serde_json::to_string(payload)?))
            }
            ChecklistEntry::Timer { value } => {
                if value.trim().is_empty() {
                    return Err(ChecklistError::EmptyTimer);
                }
                Ok(format!("{TIMER_PREFIX}{value}"))
            }
            ChecklistEntry::Note { text } => {
                if text.trim().is_empty() {
                    return Err(ChecklistError::EmptyNote);
                }
                if RESERVED_PREFIXES
                    .iter()
                    .any(|prefix| text.starts_with(prefix))
                {
                    return Err(ChecklistError::ReservedPrefix);
                }
                Ok(text.clone())
            }
        }
    }
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, ToSchema)]
pub struct ParsedChecklist {
    pub check_in: Option<CheckPayload>,
    pub check_out: Option<CheckPayload>,
    pub timers: Vec<String>,
    pub service_log: Vec<String>,
}

/// Splits a stored checklist into its structured parts.
///
/// Check-in/check-out entries with broken JSON are skipped. When an entry
/// kind repeats, the last one wins.
pub fn parse_checklist(entries: &[String]) -> ParsedChecklist {
    let mut parsed = ParsedChecklist::default();
    for raw in entries {
        match ChecklistEntry::decode(raw) {
            Ok(ChecklistEntry::CheckIn(payload)) => parsed.check_in = Some(payload),
            Ok(ChecklistEntry::CheckOut(payload)) => parsed.check_out = Some(payload),
            Ok(ChecklistEntry::Timer { value }) => parsed.timers.push(value),
            Ok(ChecklistEntry::Note { text }) => parsed.service_log.push(text),
            Err(err) => debug!("Skipping unreadable checklist entry: {}", err),
        }
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|entry| entry.to_string()).collect()
    }

    fn payload(timestamp: &str) -> CheckPayload {
        CheckPayload {
            timestamp: timestamp.to_string(),
            photos: vec![],
            observations: BTreeMap::new(),
            behavior: None,
            recommendations: None,
        }
    }

    #[test]
    fn test_check_in_with_photo() {
        let parsed = parse_checklist(&entries(&[
            r#"CHECKIN:{"timestamp":"2024-01-01T10:00:00Z","photos":["http://x/1.jpg"]}"#,
        ]));
        let check_in = parsed.check_in.unwrap();
        assert_eq!(check_in.timestamp, "2024-01-01T10:00:00Z");
        assert_eq!(check_in.photos.len(), 1);
        assert!(parsed.check_out.is_none());
    }

    #[test]
    fn test_full_log_is_split_by_kind() {
        let parsed = parse_checklist(&entries(&[
            r#"CHECKIN:{"timestamp":"2024-01-01T10:00:00Z","observations":{"coat":"matted","weight_kg":7.5}}"#,
            "Bath with hypoallergenic shampoo",
            "TIMER:bath=900",
            "Nail trim",
            r#"CHECKOUT:{"timestamp":"2024-01-01T11:30:00Z","behavior":"calm","recommendations":"brush weekly"}"#,
        ]));

        let check_in = parsed.check_in.unwrap();
        assert_eq!(check_in.observations["coat"], "matted");
        assert_eq!(check_in.observations["weight_kg"], 7.5);

        let check_out = parsed.check_out.unwrap();
        assert_eq!(check_out.behavior.as_deref(), Some("calm"));
        assert_eq!(check_out.recommendations.as_deref(), Some("brush weekly"));

        assert_eq!(parsed.timers, vec!["bath=900"]);
        assert_eq!(
            parsed.service_log,
            vec!["Bath with hypoallergenic shampoo", "Nail trim"]
        );
    }

    #[test]
    fn test_malformed_json_is_skipped() {
        let parsed = parse_checklist(&entries(&[
            "CHECKIN:{not json",
            r#"CHECKOUT:{"photos":[]}"#,
            "Brushing",
        ]));
        assert!(parsed.check_in.is_none());
        assert!(parsed.check_out.is_none());
        assert_eq!(parsed.service_log, vec!["Brushing"]);
    }

    #[test]
    fn test_last_check_in_wins() {
        let parsed = parse_checklist(&entries(&[
            r#"CHECKIN:{"timestamp":"2024-01-01T09:00:00Z"}"#,
            r#"CHECKIN:{"timestamp":"2024-01-01T09:05:00Z"}"#,
        ]));
        assert_eq!(parsed.check_in.unwrap().timestamp, "2024-01-01T09:05:00Z");
    }

    #[test]
    fn test_parsing_is_idempotent() {
        let raw = entries(&[
            r#"CHECKIN:{"timestamp":"2024-01-01T10:00:00Z","photos":["a","b"]}"#,
            "CHECKOUT:broken",
            "Haircut",
        ]);
        assert_eq!(parse_checklist(&raw), parse_checklist(&raw));
    }

    #[test]
    fn test_encoded_check_in_decodes_back() {
        let mut check_in = payload("2024-01-01T10:00:00Z");
        check_in.photos.push("http://x/1.jpg".into());
        let encoded = ChecklistEntry::CheckIn(check_in.clone()).encode().unwrap();
        assert!(encoded.starts_with(CHECKIN_PREFIX));
        assert_eq!(
            ChecklistEntry::decode(&encoded).unwrap(),
            ChecklistEntry::CheckIn(check_in)
        );
    }

    #[test]
    fn test_encode_rejects_bad_timestamp() {
        let err = ChecklistEntry::CheckOut(payload("yesterday")).encode().unwrap_err();
        assert!(matches!(err, ChecklistError::InvalidTimestamp(_)));

        let err = ChecklistEntry::CheckIn(payload("  ")).encode().unwrap_err();
        assert!(matches!(err, ChecklistError::MissingTimestamp));
    }

    #[test]
    fn test_encode_rejects_empty_photo_url() {
        let mut check_in = payload("2024-01-01T10:00:00Z");
        check_in.photos.push(" ".into());
        let err = ChecklistEntry::CheckIn(check_in).encode().unwrap_err();
        assert!(matches!(err, ChecklistError::EmptyPhotoUrl));
    }

    #[test]
    fn test_encode_rejects_notes_that_look_tagged() {
        let err = ChecklistEntry::Note {
            text: "CHECKIN:{}".into(),
        }
        .encode()
        .unwrap_err();
        assert!(matches!(err, ChecklistError::ReservedPrefix));

        let err = ChecklistEntry::Note { text: "".into() }.encode().unwrap_err();
        assert!(matches!(err, ChecklistError::EmptyNote));
    }

    #[test]
    fn test_request_body_uses_kind_tag() {
        let entry: ChecklistEntry =
            serde_json::from_str(r#"{"kind":"note","text":"Ear cleaning"}"#).unwrap();
        assert_eq!(entry.encode().unwrap(), "Ear cleaning");

        let entry: ChecklistEntry = serde_json::from_str(
            r#"{"kind":"check_in","timestamp":"2024-01-01T10:00:00+02:00"}"#,
        )
        .unwrap();
        assert!(matches!(entry, ChecklistEntry::CheckIn(_)));
    }
}
