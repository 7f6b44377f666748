use crate::error::{Result, TesiraError};
use crate::types::BlockKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CHANGE_BUFFER: usize = 100;

/// Device configuration as loaded from JSON
///
/// ```json
/// {
///   "key": "dsp-1",
///   "blocks": [
///     { "kind": "aecInput", "instanceTag": "AEC1" },
///     { "kind": "voip", "instanceTag": "VoIP1" }
///   ],
///   "requestTimeoutMs": 5000
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    pub key: String,
    #[serde(default)]
    pub blocks: Vec<BlockConfig>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_change_buffer")]
    pub change_buffer: usize,
}

/// One top-level DSP block to expose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockConfig {
    pub kind: BlockKind,
    pub instance_tag: String,
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_change_buffer() -> usize {
    DEFAULT_CHANGE_BUFFER
}

impl DeviceConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            blocks: Vec::new(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            change_buffer: DEFAULT_CHANGE_BUFFER,
        }
    }

    pub fn with_block(mut self, kind: BlockKind, instance_tag: impl Into<String>) -> Self {
        self.blocks.push(BlockConfig {
            kind,
            instance_tag: instance_tag.into(),
        });
        self
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(TesiraError::InvalidConfig("Device key is empty".to_string()));
        }
        if self.request_timeout_ms == 0 {
            return Err(TesiraError::InvalidConfig(
                "requestTimeoutMs must be greater than zero".to_string(),
            ));
        }
        if self.change_buffer == 0 {
            return Err(TesiraError::InvalidConfig(
                "changeBuffer must be greater than zero".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for block in &self.blocks {
            if block.instance_tag.trim().is_empty() {
                return Err(TesiraError::InvalidConfig(format!(
                    "Empty instance tag for {:?} block",
                    block.kind
                )));
            }
            if !seen.insert(block.instance_tag.as_str()) {
                return Err(TesiraError::InvalidConfig(format!(
                    "Duplicate instance tag '{}'",
                    block.instance_tag
                )));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
