//! Encoding and decoding of notification payloads.
//!
//! # Wire format
//! ```text
//! ["custom_json", {
//!     "required_auths": [],
//!     "required_posting_auths": ["<account>"],
//!     "id": "pp_<medium>_<reason>",          (legacy: "podping")
//!     "json": "{\"version\":\"1.1\",\"medium\":...,\"reason\":...,\"iris\":[...],...}"
//! }]
//! ```
//!
//! Block data is untrusted: any account may broadcast any `custom_json`, so
//! decoding validates every field and reports failures as values.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::blockchain::transaction::{CustomJsonOperation, CUSTOM_JSON};
use crate::events::NotificationEvent;
use crate::payload::types::{Medium, Payload, RawPayload, Reason, UrlField, LEGACY_VERSION};

/// Prefix of current notification operation ids.
pub const OPERATION_ID_PREFIX: &str = "pp_";

/// Operation id used by the first protocol version.
pub const LEGACY_OPERATION_ID: &str = "podping";

/// Operation type name in the appbase (object) wire form.
const CUSTOM_JSON_APPBASE: &str = "custom_json_operation";

/// Why an operation could not be turned into a notification.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Not a notification at all. Expected for almost every operation.
    #[error("not a notification operation")]
    Unrelated,

    #[error("malformed operation envelope: {0}")]
    Envelope(String),

    #[error("payload is not valid JSON: {0}")]
    Json(String),

    #[error("payload carries no URLs")]
    NoUrls,

    #[error("invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("{0}")]
    UnknownValue(String),

    #[error("operation has no posting account")]
    MissingAccount,

    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
}

impl CodecError {
    /// Whether the operation simply belongs to another application.
    pub fn is_unrelated(&self) -> bool {
        matches!(self, CodecError::Unrelated)
    }
}

/// Where in the chain an operation was found.
#[derive(Debug, Clone, Copy)]
pub struct OperationContext<'a> {
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
    pub transaction_id: Option<&'a str>,
    /// Position of the operation among all operations of the block.
    pub ordinal: u32,
}

/// Length of `s` once serialized as a JSON string, quotes included.
///
/// Mirrors serde_json's escaping: quote, backslash and control characters.
pub fn json_string_len(s: &str) -> usize {
    2 + s
        .chars()
        .map(|c| match c {
            '"' | '\\' | '\n' | '\r' | '\t' | '\u{08}' | '\u{0c}' => 2,
            c if (c as u32) < 0x20 => 6,
            c => c.len_utf8(),
        })
        .sum::<usize>()
}

/// Encoder/decoder for notification payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadCodec {
    max_payload_bytes: usize,
}

impl PayloadCodec {
    pub fn new(max_payload_bytes: usize) -> Self {
        Self { max_payload_bytes }
    }

    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    /// Operation id for a medium/reason pair, e.g. `pp_podcast_update`.
    pub fn operation_id(medium: Medium, reason: Reason) -> String {
        format!("{}{}_{}", OPERATION_ID_PREFIX, medium, reason)
    }

    /// Whether an operation id belongs to the notification schema.
    pub fn is_notification_id(id: &str) -> bool {
        id == LEGACY_OPERATION_ID
            || id
                .strip_prefix(OPERATION_ID_PREFIX)
                .is_some_and(|rest| rest.contains('_'))
    }

    /// Serialize a payload to its compact wire string.
    pub fn encode_payload(payload: &Payload) -> Result<String, CodecError> {
        serde_json::to_string(payload).map_err(|e| CodecError::Json(e.to_string()))
    }

    /// Wrap a payload in a `custom_json` envelope signed by `account`.
    pub fn encode(
        &self,
        account: &str,
        payload: &Payload,
    ) -> Result<CustomJsonOperation, CodecError> {
        let json = Self::encode_payload(payload)?;
        if json.len() > self.max_payload_bytes {
            return Err(CodecError::TooLarge {
                size: json.len(),
                limit: self.max_payload_bytes,
            });
        }

        Ok(CustomJsonOperation {
            required_auths: Vec::new(),
            required_posting_auths: vec![account.to_string()],
            id: Self::operation_id(payload.medium, payload.reason),
            json,
        })
    }

    /// Decode a raw block operation into a notification event.
    pub fn decode(
        &self,
        operation: &Value,
        ctx: &OperationContext<'_>,
    ) -> Result<NotificationEvent, CodecError> {
        let body = custom_json_body(operation).ok_or(CodecError::Unrelated)?;

        // Cheap id check first: most custom_json traffic belongs to other apps.
        let id = body.get("id").and_then(Value::as_str).ok_or(CodecError::Unrelated)?;
        if !Self::is_notification_id(id) {
            return Err(CodecError::Unrelated);
        }

        let envelope: CustomJsonOperation = serde_json::from_value(body.clone())
            .map_err(|e| CodecError::Envelope(e.to_string()))?;

        let account = envelope
            .required_posting_auths
            .first()
            .filter(|a| !a.is_empty())
            .cloned()
            .ok_or(CodecError::MissingAccount)?;

        let raw: RawPayload =
            serde_json::from_str(&envelope.json).map_err(|e| CodecError::Json(e.to_string()))?;

        // An empty `iris` falls back to `urls`.
        let urls = [raw.iris, raw.urls]
            .into_iter()
            .flatten()
            .map(UrlField::into_vec)
            .find(|urls| !urls.is_empty())
            .unwrap_or_default();
        if urls.is_empty() {
            return Err(CodecError::NoUrls);
        }
        if let Some(bad) = urls.iter().find(|url| Url::parse(url).is_err()) {
            return Err(CodecError::InvalidUrl(bad.clone()));
        }

        let (id_medium, id_reason) = split_operation_id(&envelope.id);
        let medium = match raw.medium.as_deref().or(id_medium) {
            Some(m) => m.parse::<Medium>().map_err(CodecError::UnknownValue)?,
            None => Medium::default(),
        };
        let reason = match raw.reason.as_deref().or(id_reason) {
            Some(r) => r.parse::<Reason>().map_err(CodecError::UnknownValue)?,
            None => Reason::default(),
        };

        let version = match raw.version {
            Some(Value::String(v)) => v,
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Null) | None => LEGACY_VERSION.to_string(),
            Some(other) => {
                return Err(CodecError::UnknownValue(format!("unknown version {}", other)))
            }
        };

        let transaction_id = ctx
            .transaction_id
            .ok_or_else(|| CodecError::Envelope("transaction id missing from block".into()))?;

        Ok(NotificationEvent {
            urls,
            account,
            reason,
            medium,
            version,
            transaction_id: transaction_id.to_string(),
            block_number: ctx.block_number,
            ordinal: ctx.ordinal,
            observed_at: ctx.timestamp,
        })
    }
}

/// Body of a `custom_json` operation in either condenser or appbase form.
fn custom_json_body(operation: &Value) -> Option<&Value> {
    match operation {
        Value::Array(parts) if parts.len() == 2 && parts[0] == CUSTOM_JSON => Some(&parts[1]),
        Value::Object(map)
            if map.get("type").and_then(Value::as_str) == Some(CUSTOM_JSON_APPBASE) =>
        {
            map.get("value")
        }
        _ => None,
    }
}

/// Medium and reason named by a `pp_<medium>_<reason>` id.
fn split_operation_id(id: &str) -> (Option<&str>, Option<&str>) {
    id.strip_prefix(OPERATION_ID_PREFIX)
        .and_then(|rest| rest.split_once('_'))
        .map_or((None, None), |(medium, reason)| (Some(medium), Some(reason)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::types::PAYLOAD_VERSION;
    use serde_json::json;

    fn ctx() -> OperationContext<'static> {
        OperationContext {
            block_number: 1000,
            timestamp: DateTime::from_timestamp(1_714_564_803, 0).unwrap(),
            transaction_id: Some("1f2e"),
            ordinal: 4,
        }
    }

    fn op(id: &str, payload: Value) -> Value {
        json!(["custom_json", {
            "required_auths": [],
            "required_posting_auths": ["podping.aaa"],
            "id": id,
            "json": payload.to_string(),
        }])
    }

    fn codec() -> PayloadCodec {
        PayloadCodec::new(8192)
    }

    #[test]
    fn test_notification_ids() {
        assert!(PayloadCodec::is_notification_id("pp_podcast_update"));
        assert!(PayloadCodec::is_notification_id("pp_video_liveEnd"));
        assert!(PayloadCodec::is_notification_id("podping"));
        assert!(!PayloadCodec::is_notification_id("pp_"));
        assert!(!PayloadCodec::is_notification_id("sm_market_rent"));
        assert!(!PayloadCodec::is_notification_id("notpodping"));
    }

    #[test]
    fn test_decode_v11() {
        let event = codec()
            .decode(
                &op("pp_music_live", json!({
                    "version": "1.1",
                    "medium": "music",
                    "reason": "live",
                    "iris": ["https://a.example/feed.xml", "https://b.example/feed.xml"],
                    "timestampNs": 1,
                    "sessionId": 2
                })),
                &ctx(),
            )
            .unwrap();

        assert_eq!(event.urls.len(), 2);
        assert_eq!(event.account, "podping.aaa");
        assert_eq!(event.medium, Medium::Music);
        assert_eq!(event.reason, Reason::Live);
        assert_eq!(event.version, "1.1");
        assert_eq!(event.transaction_id, "1f2e");
        assert_eq!((event.block_number, event.ordinal), (1000, 4));
    }

    #[test]
    fn test_decode_legacy() {
        let event = codec()
            .decode(
                &op("podping", json!({
                    "version": "1.0",
                    "num_urls": 1,
                    "reason": "feed_update",
                    "urls": "https://a.example/feed.xml"
                })),
                &ctx(),
            )
            .unwrap();

        assert_eq!(event.urls, vec!["https://a.example/feed.xml".to_string()]);
        assert_eq!(event.medium, Medium::Podcast);
        assert_eq!(event.reason, Reason::Update);
    }

    #[test]
    fn test_empty_iris_falls_back_to_urls() {
        let c = codec();
        for iris in [json!([]), json!("")] {
            let event = c
                .decode(
                    &op("pp_podcast_update", json!({
                        "iris": iris,
                        "urls": ["https://a.example/feed.xml"]
                    })),
                    &ctx(),
                )
                .unwrap();
            assert_eq!(event.urls, vec!["https://a.example/feed.xml".to_string()]);
        }

        let err = c
            .decode(&op("pp_podcast_update", json!({"iris": [], "urls": []})), &ctx())
            .unwrap_err();
        assert_eq!(err, CodecError::NoUrls);
    }

    #[test]
    fn test_medium_and_reason_fall_back_to_id() {
        let event = codec()
            .decode(&op("pp_blog_liveEnd", json!({"iris": ["https://a.example/"]})), &ctx())
            .unwrap();
        assert_eq!(event.medium, Medium::Blog);
        assert_eq!(event.reason, Reason::LiveEnd);
        assert_eq!(event.version, "1.0");
    }

    #[test]
    fn test_decode_rejections() {
        let c = codec();
        let cases = [
            (json!(["vote", {"voter": "a"}]), CodecError::Unrelated),
            (json!(["custom_json", {"id": "sm_sell", "json": "{}"}]), CodecError::Unrelated),
            (json!("garbage"), CodecError::Unrelated),
            (op("pp_podcast_update", json!({"iris": []})), CodecError::NoUrls),
            (
                op("pp_podcast_update", json!({"iris": ["not a url"]})),
                CodecError::InvalidUrl("not a url".into()),
            ),
            (
                op("pp_podcast_update", json!({"medium": "radio", "iris": ["https://a.example/"]})),
                CodecError::UnknownValue("unknown medium 'radio'".into()),
            ),
        ];
        for (operation, expected) in cases {
            assert_eq!(c.decode(&operation, &ctx()).unwrap_err(), expected);
        }

        let not_json = json!(["custom_json", {
            "required_posting_auths": ["a"], "id": "pp_podcast_update", "json": "{oops"
        }]);
        assert!(matches!(c.decode(&not_json, &ctx()), Err(CodecError::Json(_))));

        let no_account = json!(["custom_json", {
            "required_posting_auths": [], "id": "pp_podcast_update",
            "json": "{\"iris\":[\"https://a.example/\"]}"
        }]);
        assert_eq!(c.decode(&no_account, &ctx()).unwrap_err(), CodecError::MissingAccount);
    }

    #[test]
    fn test_decode_appbase_form() {
        let operation = json!({
            "type": "custom_json_operation",
            "value": {
                "required_auths": [],
                "required_posting_auths": ["podping.bbb"],
                "id": "pp_podcast_update",
                "json": "{\"iris\":[\"https://a.example/feed.xml\"]}"
            }
        });
        let event = codec().decode(&operation, &ctx()).unwrap();
        assert_eq!(event.account, "podping.bbb");
    }

    #[test]
    fn test_encode_round_trips_through_decode() {
        let payload = Payload {
            version: PAYLOAD_VERSION.into(),
            medium: Medium::Podcast,
            reason: Reason::Update,
            iris: vec!["https://a.example/feed.xml".into()],
            timestamp_ns: 42,
            session_id: 7,
        };
        let envelope = codec().encode("podping.test", &payload).unwrap();
        assert_eq!(envelope.id, "pp_podcast_update");
        assert_eq!(envelope.required_posting_auths, vec!["podping.test".to_string()]);

        let event = codec().decode(&envelope.to_operation(), &ctx()).unwrap();
        assert_eq!(event.urls, payload.iris);
        assert_eq!(event.account, "podping.test");
    }

    #[test]
    fn test_encode_enforces_limit() {
        let payload = Payload {
            version: PAYLOAD_VERSION.into(),
            medium: Medium::Podcast,
            reason: Reason::Update,
            iris: vec![format!("https://a.example/{}", "x".repeat(200))],
            timestamp_ns: 0,
            session_id: 0,
        };
        assert!(matches!(
            PayloadCodec::new(100).encode("a", &payload),
            Err(CodecError::TooLarge { limit: 100, .. })
        ));
    }

    #[test]
    fn test_json_string_len_matches_serde() {
        let samples = [
            "plain",
            "quote\"d",
            "back\\slash",
            "tab\tnew\nline",
            "bell\u{7}",
            "héllo ☃",
            "",
        ];
        for s in samples {
            assert_eq!(json_string_len(s), serde_json::to_string(s).unwrap().len(), "{:?}", s);
        }
    }
}
