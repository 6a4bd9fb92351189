//! Configuration: pacing tunables plus the backend connection.
//!
//! Both halves have defaults, so an empty file is a valid configuration.
//!
//! ```toml
//! [pacing]
//! min_buffer_size = 10
//! chars_per_frame = 2
//! frame_interval = 20   # milliseconds
//!
//! [http]
//! base_url = "http://localhost:8000"
//! ```

use crate::error::{IngestError, Result};
use crate::ingest::HttpConfig;
use crate::pacing::PacingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding [`HttpConfig::base_url`].
pub const ENV_API_URL: &str = "TRICKLE_API_URL";

/// Environment variable providing [`HttpConfig::access_token`].
pub const ENV_ACCESS_TOKEN: &str = "TRICKLE_ACCESS_TOKEN";

/// Complete client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reveal pace.
    pub pacing: PacingConfig,
    /// Backend connection.
    pub http: HttpConfig,
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| IngestError::InvalidConfig(e.to_string()))
    }

    /// Read a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| IngestError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply [`ENV_API_URL`] and [`ENV_ACCESS_TOKEN`] if set.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.http.base_url = url;
        }
        if let Some(token) = lookup(ENV_ACCESS_TOKEN).filter(|v| !v.is_empty()) {
            self.http.access_token = Some(token);
        }
        self
    }
}

/// Durations expressed as integer milliseconds in config files.
pub(crate) mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[allow(clippy::cast_possible_truncation, clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
