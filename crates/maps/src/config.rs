use std::path::Path;
use std::time::Duration;

use foundation::LatLng;
use runtime::LoaderConfig;
use serde::{Deserialize, Serialize};

use crate::provider::{MapType, SurfaceOptions};

pub const DEFAULT_SETTLE_DELAY_MS: u64 = 100;
pub const DEFAULT_MOUNT_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid maps config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Timing of a single [`crate::MapBinding`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BindingConfig {
    /// Delay between the mount target being valid and the surface being
    /// created, so the display region can finish layout.
    pub settle_delay_ms: u64,
    /// How long to wait for a mount target once the capability is ready.
    pub mount_timeout_ms: u64,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            mount_timeout_ms: DEFAULT_MOUNT_TIMEOUT_MS,
        }
    }
}

impl BindingConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn mount_timeout(&self) -> Duration {
        Duration::from_millis(self.mount_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MapsConfig {
    pub loader: LoaderConfig,
    pub binding: BindingConfig,
    pub default_center: LatLng,
    pub default_zoom: u8,
    pub default_map_type: MapType,
}

impl Default for MapsConfig {
    fn default() -> Self {
        Self {
            loader: LoaderConfig::default(),
            binding: BindingConfig::default(),
            default_center: LatLng::new(0.0, 0.0),
            default_zoom: 2,
            default_map_type: MapType::Roadmap,
        }
    }
}

impl MapsConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Options for surfaces created without explicit ones.
    pub fn surface_options(&self) -> SurfaceOptions {
        SurfaceOptions {
            center: self.default_center,
            zoom: self.default_zoom,
            map_type: self.default_map_type,
        }
    }
}
