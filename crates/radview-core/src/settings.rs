use serde::{Deserialize, Serialize};

use crate::descriptor::Orientation;
use crate::error::ViewerError;

/// Session-wide defaults for the viewport engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    /// Prefix used when deriving volume ids from display-set uids.
    pub volume_loader_scheme: String,
    /// Background color applied when the caller does not supply one.
    pub default_background: [f32; 3],
    /// Orientation used by volume viewports without an explicit one.
    pub default_orientation: Orientation,
    /// Tool group assigned to viewports that do not name one.
    pub default_tool_group_id: String,
    /// Upper bound of the shared volume cache, in bytes.
    pub max_cache_bytes: u64,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            volume_loader_scheme: "cornerstoneStreamingImageVolume".to_string(),
            default_background: [0.0, 0.0, 0.0],
            default_orientation: Orientation::Acquisition,
            default_tool_group_id: "default".to_string(),
            max_cache_bytes: 3 * 1024 * 1024 * 1024, // 3 GiB
        }
    }
}

impl ViewerSettings {
    pub fn from_json(json: &str) -> Result<Self, ViewerError> {
        let settings: Self =
            serde_json::from_str(json).map_err(|e| ViewerError::Settings(e.to_string()))?;
        if settings.volume_loader_scheme.is_empty() {
            return Err(ViewerError::Settings(
                "volume_loader_scheme must not be empty".to_string(),
            ));
        }
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, ViewerError> {
        serde_json::to_string_pretty(self).map_err(|e| ViewerError::Settings(e.to_string()))
    }

    /// Deterministic volume id for a display set under this loader scheme.
    pub fn volume_id_for(&self, display_set_uid: &str) -> String {
        format!("{}:{}", self.volume_loader_scheme, display_set_uid)
    }
}
