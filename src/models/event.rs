//! Storage-creation event notifications, in the S3 notification wire format.
//!
//! Only the fields the worker reads are modelled; everything else in the
//! notification is ignored by serde.

use serde::{Deserialize, Serialize};

/// Envelope delivered by the event infrastructure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<StorageEventRecord>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageEventRecord {
    #[serde(rename = "eventName", default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct S3Object {
    /// Form-url-encoded object key, exactly as the notification carries it.
    pub key: String,
}

impl StorageEventRecord {
    pub fn bucket(&self) -> &str {
        &self.s3.bucket.name
    }

    /// Whether this record announces a new object. Records without an event
    /// name are treated as creations.
    pub fn is_object_created(&self) -> bool {
        self.event_name
            .as_deref()
            .is_none_or(|name| name.starts_with("ObjectCreated:"))
    }

    /// The object key with form-url encoding removed (`+` is a space).
    pub fn object_key(&self) -> String {
        decode_object_key(&self.s3.object.key)
    }
}

/// Undo the form-url encoding S3 applies to keys in notifications.
///
/// Notification keys never contain a raw `&` or `=`, so the whole key parses
/// as the name of a single form pair.
pub fn decode_object_key(raw: &str) -> String {
    url::form_urlencoded::parse(raw.as_bytes())
        .next()
        .map(|(name, _)| name.into_owned())
        .unwrap_or_default()
}

/// Result of one worker invocation, shaped like a function-as-a-service reply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InvocationResult {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl InvocationResult {
    pub fn success() -> Self {
        Self {
            status_code: 200,
            body: "Processed request successfully".into(),
        }
    }

    pub fn failure(err: &anyhow::Error) -> Self {
        Self {
            status_code: 500,
            body: format!("Error processing request: {err:#}"),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_notification_envelope() {
        let raw = r#"{
            "Records": [{
                "eventVersion": "2.1",
                "eventSource": "aws:s3",
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": { "name": "photo-splitter-uploads", "arn": "arn:aws:s3:::photo-splitter-uploads" },
                    "object": { "key": "original_my+cat%281%29.png", "size": 1024 }
                }
            }]
        }"#;

        let event: StorageEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.records.len(), 1);
        let record = &event.records[0];
        assert_eq!(record.bucket(), "photo-splitter-uploads");
        assert_eq!(record.object_key(), "original_my cat(1).png");
        assert_eq!(record.event_name.as_deref(), Some("ObjectCreated:Put"));
    }

    #[test]
    fn only_creation_records_count_as_created() {
        let record = |name: Option<&str>| StorageEventRecord {
            event_name: name.map(str::to_string),
            s3: S3Entity {
                bucket: S3Bucket { name: "uploads".into() },
                object: S3Object { key: "cat.png".into() },
            },
        };
        assert!(record(Some("ObjectCreated:Put")).is_object_created());
        assert!(record(Some("ObjectCreated:CompleteMultipartUpload")).is_object_created());
        assert!(record(None).is_object_created());
        assert!(!record(Some("ObjectRemoved:Delete")).is_object_created());
    }

    #[test]
    fn missing_records_is_empty() {
        let event: StorageEvent = serde_json::from_str("{}").unwrap();
        assert!(event.records.is_empty());
    }

    #[test]
    fn decodes_plain_and_nested_keys() {
        assert_eq!(decode_object_key("cat.png"), "cat.png");
        assert_eq!(decode_object_key("dir/a%2Bb.png"), "dir/a+b.png");
        assert_eq!(decode_object_key("x%26y%3Dz.png"), "x&y=z.png");
    }

    #[test]
    fn failure_body_is_prefixed() {
        let result = InvocationResult::failure(&anyhow::anyhow!("boom"));
        assert_eq!(result.status_code, 500);
        assert_eq!(result.body, "Error processing request: boom");
        assert!(!result.is_success());
    }
}
