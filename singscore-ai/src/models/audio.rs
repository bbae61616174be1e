//! Audio inputs and storage references

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Uploaded audio owned by one pipeline run
#[derive(Debug, Clone)]
pub struct AudioBlob {
    /// Raw upload bytes
    pub bytes: Bytes,
    /// Content type reported by the client (e.g., "audio/mpeg")
    pub content_type: Option<String>,
    /// Original file extension, lowercase without the dot (format sniffing hint)
    pub extension: Option<String>,
}

impl AudioBlob {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: None,
            extension: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into().trim_start_matches('.').to_ascii_lowercase());
        self
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Where a stored reference came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageOrigin {
    /// Uploaded and signed against the live backend
    Stored,
    /// Synthesized because storage is unavailable; not fetchable
    Placeholder,
}

/// Fetchable reference to stored audio
///
/// Invariant: `expires_at >= created_at + ttl` at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAudioRef {
    pub url: String,
    pub expires_at: DateTime<Utc>,
    pub origin: StorageOrigin,
}

impl StoredAudioRef {
    /// True when the URL is synthetic and must not be sent to external services
    pub fn is_placeholder(&self) -> bool {
        self.origin == StorageOrigin::Placeholder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_is_normalized() {
        let blob = AudioBlob::new(vec![1u8, 2, 3]).with_extension(".MP3");
        assert_eq!(blob.extension.as_deref(), Some("mp3"));
        assert_eq!(blob.size(), 3);
    }
}
