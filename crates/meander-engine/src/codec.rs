//! Payload codecs, the context blob layout, and the service size caps.

use serde_json::Value;

/// Maximum workflow input size in bytes.
pub const INPUT_SIZE: usize = 32_768;

/// Maximum result payload size in bytes.
pub const RESULT_SIZE: usize = 32_768;

/// Maximum failure reason size in bytes.
pub const REASON_SIZE: usize = 256;

/// Maximum worker identity size in bytes.
pub const IDENTITY_SIZE: usize = 256;

/// Maximum number of tags on an execution.
pub const TAG_LIST_SIZE: usize = 5;

/// Accepted child policies, upper-case.
pub const CHILD_POLICIES: [&str; 3] = ["TERMINATE", "REQUEST_CANCEL", "ABANDON"];

/// Codec faults and invalid configuration values.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("failed to encode payload: {0}")]
    Encode(String),

    #[error("failed to decode payload: {0}")]
    Decode(String),

    #[error("malformed context blob")]
    MalformedContext,

    #[error("{field} must be a strictly positive number of seconds")]
    InvalidDuration { field: &'static str },

    #[error("invalid child policy: {0:?}")]
    InvalidChildPolicy(String),
}

/// Serializes the arguments of a proxy call, and decodes a workflow's own
/// input back into arguments.
pub trait InputCodec: Send + Sync {
    fn encode(&self, args: &[Value]) -> Result<String, CodecError>;
    fn decode(&self, raw: &str) -> Result<Vec<Value>, CodecError>;
}

/// Serializes a workflow result, and decodes an activity or sub-workflow
/// result payload.
pub trait ResultCodec: Send + Sync {
    fn encode(&self, value: &Value) -> Result<String, CodecError>;
    fn decode(&self, raw: &str) -> Result<Value, CodecError>;
}

/// The default codec: arguments travel as a JSON `[args, kwargs]` pair (the
/// kwargs member always an empty object here), results as plain JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl InputCodec for JsonCodec {
    fn encode(&self, args: &[Value]) -> Result<String, CodecError> {
        let payload = (args, serde_json::Map::new());
        serde_json::to_string(&payload).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, raw: &str) -> Result<Vec<Value>, CodecError> {
        let (args, _kwargs): (Vec<Value>, Value) =
            serde_json::from_str(raw).map_err(|e| CodecError::Decode(e.to_string()))?;
        Ok(args)
    }
}

impl ResultCodec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<String, CodecError> {
        serde_json::to_string(value).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, raw: &str) -> Result<Value, CodecError> {
        serde_json::from_str(raw).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

/// Truncate to at most `max` bytes, never splitting a character.
pub fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Keep the trailing `max` bytes, never splitting a character. Used for the
/// worker identity, where the most specific part is at the end.
pub fn truncate_bytes_tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

/// Length-prefixed concatenation: `"<n> <head><tail>"` where `n` is the byte
/// length of the head. The tail is opaque and may be absent.
pub fn concat(head: &str, tail: Option<&str>) -> String {
    match tail {
        Some(tail) => format!("{} {}{}", head.len(), head, tail),
        None => format!("{} {}", head.len(), head),
    }
}

/// Invert [`concat`]. An empty tail decodes as absent.
pub fn deconcat(blob: &str) -> Result<(String, Option<String>), CodecError> {
    let (length, rest) = blob.split_once(' ').ok_or(CodecError::MalformedContext)?;
    let length: usize = length.parse().map_err(|_| CodecError::MalformedContext)?;
    if length > rest.len() || !rest.is_char_boundary(length) {
        return Err(CodecError::MalformedContext);
    }
    let (head, tail) = rest.split_at(length);
    let tail = if tail.is_empty() {
        None
    } else {
        Some(tail.to_string())
    };
    Ok((head.to_string(), tail))
}

/// Encode a duration as a decimal-second string; `None` stays absent, zero is
/// rejected.
pub fn encode_duration(
    value: Option<u64>,
    field: &'static str,
) -> Result<Option<String>, CodecError> {
    match value {
        None => Ok(None),
        Some(0) => Err(CodecError::InvalidDuration { field }),
        Some(seconds) => Ok(Some(seconds.to_string())),
    }
}

/// Upper-case and validate a child policy.
pub fn normalize_child_policy(policy: Option<&str>) -> Result<Option<String>, CodecError> {
    match policy {
        None => Ok(None),
        Some(raw) => {
            let upper = raw.to_uppercase();
            if CHILD_POLICIES.contains(&upper.as_str()) {
                Ok(Some(upper))
            } else {
                Err(CodecError::InvalidChildPolicy(raw.to_string()))
            }
        }
    }
}

/// Deduplicate and cap a tag list at [`TAG_LIST_SIZE`] entries. Sorted so the
/// surviving subset is deterministic.
pub fn normalize_tags(tags: Option<&[String]>) -> Option<Vec<String>> {
    tags.map(|tags| {
        let mut unique: Vec<String> = tags.to_vec();
        unique.sort();
        unique.dedup();
        unique.truncate(TAG_LIST_SIZE);
        unique
    })
}

/// Default worker identity: `<fqdn>-<pid>`, trailing bytes kept when too long.
pub fn default_identity() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "localhost".to_string());
    let identity = format!("{}-{}", host, std::process::id());
    truncate_bytes_tail(&identity, IDENTITY_SIZE).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_json_codec_args_round_trip() {
        let codec = JsonCodec;
        let encoded = InputCodec::encode(&codec, &[json!(7)]).expect("encode");
        assert_eq!(encoded, "[[7],{}]");
        assert_eq!(InputCodec::decode(&codec, &encoded).expect("decode"), vec![json!(7)]);
    }

    #[test]
    fn test_json_codec_accepts_spaced_payloads() {
        // Payloads written by other client libraries may carry whitespace.
        let codec = JsonCodec;
        assert_eq!(
            InputCodec::decode(&codec, "[[7], {}]").expect("decode"),
            vec![json!(7)]
        );
        assert!(InputCodec::decode(&codec, "not json").is_err());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let s = "ab\u{00e9}cd"; // é is two bytes, starting at index 2
        assert_eq!(truncate_bytes(s, 3), "ab");
        assert_eq!(truncate_bytes(s, 4), "ab\u{00e9}");
        assert_eq!(truncate_bytes(s, 100), s);

        assert_eq!(truncate_bytes_tail(s, 2), "cd");
        assert_eq!(truncate_bytes_tail(s, 3), "cd");
        assert_eq!(truncate_bytes_tail(s, 4), "\u{00e9}cd");
    }

    #[test]
    fn test_concat_layout() {
        assert_eq!(concat("abc", Some("xyz")), "3 abcxyz");
        assert_eq!(concat("abc", None), "3 abc");
        assert_eq!(concat("", Some("t")), "0 t");
    }

    #[test]
    fn test_deconcat_rejects_garbage() {
        assert!(deconcat("").is_err());
        assert!(deconcat("nolength").is_err());
        assert!(deconcat("99 short").is_err());
    }

    #[test]
    fn test_duration_encoding() {
        assert_eq!(encode_duration(None, "f").expect("absent"), None);
        assert_eq!(
            encode_duration(Some(60), "f").expect("positive"),
            Some("60".to_string())
        );
        assert!(matches!(
            encode_duration(Some(0), "f"),
            Err(CodecError::InvalidDuration { field: "f" })
        ));
    }

    #[test]
    fn test_child_policy_normalization() {
        assert_eq!(
            normalize_child_policy(Some("terminate")).expect("valid"),
            Some("TERMINATE".to_string())
        );
        assert_eq!(normalize_child_policy(None).expect("absent"), None);
        assert!(normalize_child_policy(Some("KEEP")).is_err());
    }

    #[test]
    fn test_tag_normalization() {
        let tags = vec![
            "b".to_string(),
            "a".to_string(),
            "a".to_string(),
            "c".to_string(),
            "d".to_string(),
            "e".to_string(),
            "f".to_string(),
        ];
        let normalized = normalize_tags(Some(&tags)).expect("tags");
        assert_eq!(normalized.len(), TAG_LIST_SIZE);
        assert_eq!(normalized[0], "a");
        assert!(normalize_tags(None).is_none());
    }

    #[test]
    fn test_default_identity_is_bounded() {
        let identity = default_identity();
        assert!(!identity.is_empty());
        assert!(identity.len() <= IDENTITY_SIZE);
    }

    proptest! {
        #[test]
        fn prop_concat_round_trip(head in ".*", tail in proptest::option::of(".+")) {
            let blob = concat(&head, tail.as_deref());
            let (decoded_head, decoded_tail) = deconcat(&blob).expect("round trip");
            prop_assert_eq!(decoded_head, head);
            prop_assert_eq!(decoded_tail, tail);
        }

        #[test]
        fn prop_truncate_caps_bytes(s in ".*", max in 0usize..512) {
            let head = truncate_bytes(&s, max);
            prop_assert!(head.len() <= max);
            prop_assert!(s.starts_with(head));

            let tail = truncate_bytes_tail(&s, max);
            prop_assert!(tail.len() <= max);
            prop_assert!(s.ends_with(tail));
        }
    }
}
