//! Configuration resolution for singscore-ai
//!
//! Provides two-tier configuration resolution with ENV → TOML priority, on top
//! of compiled defaults. Credentials decide whether the live pipeline is
//! attempted at all; see [`Capabilities`].

use serde::Deserialize;
use singscore_common::config::{
    apply_env_override, is_usable_credential, load_or_default, resolve_config_path,
};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::models::ScoringStrategy;

/// Module name used for config file discovery (`singscore-ai.toml`)
pub const MODULE_NAME: &str = "singscore-ai";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "SINGSCORE_CONFIG";

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5730";

/// Top-level service configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind_address: Option<String>,
    pub storage: StorageConfig,
    pub transcription: TranscriptionConfig,
    pub analysis: AnalysisConfig,
}

/// Object storage settings (S3-compatible endpoint)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Endpoint URL, e.g. `https://oss-cn-hangzhou.aliyuncs.com`
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
    /// Object key prefix for uploads
    pub key_prefix: String,
    /// Lifetime of presigned read URLs
    pub url_ttl_secs: u64,
    /// Upload attempts before falling back to a placeholder URL
    pub upload_attempts: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            bucket: None,
            region: None,
            access_key_id: None,
            access_key_secret: None,
            key_prefix: "audios".to_string(),
            url_ttl_secs: 3600,
            upload_attempts: 2,
        }
    }
}

impl StorageConfig {
    /// Both keys present and neither is a placeholder
    pub fn has_credentials(&self) -> bool {
        is_usable_credential(self.access_key_id.as_deref())
            && is_usable_credential(self.access_key_secret.as_deref())
            && self.bucket.as_deref().is_some_and(|b| !b.trim().is_empty())
    }

    pub fn url_ttl(&self) -> Duration {
        Duration::from_secs(self.url_ttl_secs)
    }
}

/// Speech transcription service settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,
    /// Per-HTTP-call timeout, independent of the poll ceiling
    pub request_timeout_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://dashscope.aliyuncs.com".to_string(),
            model: "paraformer-v2".to_string(),
            poll_interval_secs: 3,
            max_poll_attempts: 30,
            request_timeout_secs: 30,
        }
    }
}

impl TranscriptionConfig {
    pub fn has_credentials(&self) -> bool {
        is_usable_credential(self.api_key.as_deref())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Pipeline tunables
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Audio beyond this many seconds is discarded before upload
    pub max_duration_secs: u32,
    pub scoring_strategy: ScoringStrategy,
    /// EventBus channel capacity
    pub event_capacity: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 45,
            scoring_strategy: ScoringStrategy::Weighted,
            event_capacity: 256,
        }
    }
}

impl ServiceConfig {
    /// Resolve and load configuration
    ///
    /// **Priority:** ENV → TOML → compiled defaults
    pub fn load(cli_path: Option<&Path>) -> Self {
        let path = resolve_config_path(cli_path, CONFIG_ENV_VAR, MODULE_NAME);
        let mut config: ServiceConfig = load_or_default(path.as_deref());
        config.apply_env_overrides();
        config.log_summary();
        config
    }

    /// Apply `SINGSCORE_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        apply_env_override(&mut self.bind_address, "SINGSCORE_BIND");
        apply_env_override(&mut self.storage.endpoint, "SINGSCORE_STORAGE_ENDPOINT");
        apply_env_override(&mut self.storage.bucket, "SINGSCORE_STORAGE_BUCKET");
        apply_env_override(&mut self.storage.region, "SINGSCORE_STORAGE_REGION");
        apply_env_override(&mut self.storage.access_key_id, "SINGSCORE_STORAGE_ACCESS_KEY_ID");
        apply_env_override(
            &mut self.storage.access_key_secret,
            "SINGSCORE_STORAGE_ACCESS_KEY_SECRET",
        );
        apply_env_override(&mut self.transcription.api_key, "SINGSCORE_ASR_API_KEY");

        let mut base_url = None;
        apply_env_override(&mut base_url, "SINGSCORE_ASR_BASE_URL");
        if let Some(url) = base_url {
            self.transcription.base_url = url;
        }
    }

    pub fn bind_address(&self) -> &str {
        self.bind_address.as_deref().unwrap_or(DEFAULT_BIND_ADDRESS)
    }

    fn log_summary(&self) {
        if self.storage.has_credentials() {
            info!(
                bucket = self.storage.bucket.as_deref().unwrap_or_default(),
                "Object storage credentials configured"
            );
        } else {
            warn!("Object storage credentials missing or placeholder; storage runs simulated");
        }

        if self.transcription.has_credentials() {
            info!(base_url = %self.transcription.base_url, "Transcription API key configured");
        } else {
            warn!("Transcription API key missing or placeholder; scoring runs simulated");
        }
    }
}

/// Startup-determined live-path availability
///
/// Resolved once during process initialization and never mutated; shared
/// read-only across requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Object storage reachable with valid credentials
    pub storage_live: bool,
    /// Transcription API key present and not a placeholder
    pub transcription_live: bool,
}

impl Capabilities {
    /// Whether the live path should be attempted at all
    pub fn live_path(&self) -> bool {
        self.storage_live && self.transcription_live
    }
}
