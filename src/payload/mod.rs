//! Backend-shaped request bodies built from drafts.
//!
//! The sanitizer turns a [`Draft`](crate::draft::Draft) into a bounded
//! [`PostPayload`]: trimmed text, a guaranteed slug, filtered references,
//! stripped oversized media and a hard ceiling on the serialized size.

mod sanitizer;

pub use sanitizer::{PayloadSanitizer, PLACEHOLDER_IMAGE_ALT, PLACEHOLDER_IMAGE_URL};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::draft::{ContentBlock, DraftStatus, FeaturedImage, SeoMeta};

/// Whether a save creates a new remote resource or updates an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveMode {
    Create,
    Update,
}

impl std::fmt::Display for SaveMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveMode::Create => write!(f, "create"),
            SaveMode::Update => write!(f, "update"),
        }
    }
}

/// Reasons a payload is not built for this cycle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Draft has no meaningful content")]
    NothingToSave,

    #[error("Payload too large: {size} bytes exceeds {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PayloadError {
    fn from(err: serde_json::Error) -> Self {
        PayloadError::Serialization(err.to_string())
    }
}

/// Request body sent to the posts API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPayload {
    pub title: String,
    pub slug: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub excerpt: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<FeaturedImage>,
    #[serde(default)]
    pub blocks: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seo: Option<SeoMeta>,
    pub status: DraftStatus,
}

/// A sanitized payload ready for transmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPayload {
    /// The request body
    pub payload: PostPayload,
    /// Serialized JSON size in bytes
    pub size_bytes: usize,
    /// SHA-256 of the serialized body, hex encoded
    pub fingerprint: String,
    /// Number of media fields blanked because they were oversized
    pub stripped_media: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_error_display() {
        let err = PayloadError::TooLarge {
            size: 10,
            limit: 5,
        };
        assert_eq!(
            err.to_string(),
            "Payload too large: 10 bytes exceeds 5 bytes"
        );
    }

    #[test]
    fn test_payload_wire_shape() {
        let payload = PostPayload {
            title: "Hello".into(),
            slug: "hello".into(),
            content: "Body".into(),
            excerpt: String::new(),
            tags: vec![],
            categories: vec![],
            featured_image: None,
            blocks: vec![],
            seo: None,
            status: DraftStatus::Draft,
        };
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["slug"], "hello");
        assert_eq!(json["status"], "draft");
        assert!(json.get("featuredImage").is_none());
        assert!(json.get("excerpt").is_none());
        assert!(json.get("seo").is_none());
    }
}
