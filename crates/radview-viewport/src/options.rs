use serde::{Deserialize, Serialize};

use radview_core::{
    InitialImageOptions, Orientation, SyncGroup, ViewerError, ViewerSettings, ViewportKind,
    ViewportOptions, ViewportPresentation,
};

/// Caller-facing viewport options; every field falls back to the slot's
/// current options or the session defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicViewportOptions {
    /// Requested engine id. A value different from the slot's current id
    /// renames the slot.
    pub viewport_id: Option<String>,
    pub viewport_kind: Option<ViewportKind>,
    pub tool_group_id: Option<String>,
    pub orientation: Option<Orientation>,
    pub background: Option<[f32; 3]>,
    pub sync_groups: Option<Vec<SyncGroup>>,
    pub initial_image_options: Option<InitialImageOptions>,
    /// Presentation to restore once the data is attached.
    pub presentation: Option<ViewportPresentation>,
}

impl PublicViewportOptions {
    pub fn with_viewport_id(mut self, viewport_id: &str) -> Self {
        self.viewport_id = Some(viewport_id.to_string());
        self
    }

    /// Merge into fully resolved options for data of kind `data_kind`.
    pub fn resolve(
        &self,
        data_kind: ViewportKind,
        current: &ViewportOptions,
        settings: &ViewerSettings,
    ) -> Result<ViewportOptions, ViewerError> {
        let viewport_kind = self.viewport_kind.unwrap_or(data_kind);
        if viewport_kind != data_kind {
            return Err(ViewerError::ViewportKindMismatch {
                data: data_kind,
                viewport: viewport_kind,
            });
        }

        let orientation = match viewport_kind {
            ViewportKind::Stack => None,
            ViewportKind::Volume => Some(
                self.orientation
                    .or(current.orientation)
                    .unwrap_or(settings.default_orientation),
            ),
        };

        let tool_group_id = self
            .tool_group_id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| Some(current.tool_group_id.clone()).filter(|id| !id.is_empty()))
            .unwrap_or_else(|| settings.default_tool_group_id.clone());

        Ok(ViewportOptions {
            viewport_kind,
            tool_group_id,
            orientation,
            background: self.background.unwrap_or(current.background),
            sync_groups: self
                .sync_groups
                .clone()
                .unwrap_or_else(|| current.sync_groups.clone()),
            initial_image_options: self
                .initial_image_options
                .or(current.initial_image_options),
        })
    }
}
