use thiserror::Error;

use crate::descriptor::ViewportKind;

/// Errors surfaced by the materializer and the viewport orchestrator.
///
/// The enum is `Clone` so a single construction failure can be handed to every
/// caller waiting on the same shared volume future.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewerError {
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Unknown viewport kind '{0}'")]
    UnknownViewportKind(String),

    #[error("Unknown orientation '{0}'")]
    UnknownOrientation(String),

    #[error("{data} data cannot be shown in a {viewport} viewport")]
    ViewportKindMismatch {
        data: ViewportKind,
        viewport: ViewportKind,
    },

    #[error("No handler registered for {0}")]
    MissingHandler(String),

    #[error("No display sets supplied")]
    NoDisplaySets,

    #[error("Slot {0} has no enabled viewport")]
    UnknownSlot(usize),

    #[error("Viewport '{0}' is not enabled")]
    UnknownViewport(String),

    #[error("Viewport id '{viewport_id}' is already held by slot {slot_index}")]
    ViewportIdInUse {
        viewport_id: String,
        slot_index: usize,
    },

    #[error("Could not schedule deferred viewport work: {0}")]
    Spawn(String),

    #[error("Data source failed for display set '{display_set_uid}': {message}")]
    DataSource {
        display_set_uid: String,
        message: String,
    },

    #[error("Display set '{0}' resolved to an empty image list")]
    EmptyImageIds(String),

    #[error("Display set '{0}' not found")]
    UnknownDisplaySet(String),

    #[error("Volume '{volume_id}' could not be constructed: {message}")]
    VolumeConstruction { volume_id: String, message: String },

    #[error("Rendering engine error: {0}")]
    RenderingEngine(String),

    #[error("Invalid settings: {0}")]
    Settings(String),
}

impl ViewerError {
    pub fn data_source(display_set_uid: &str, message: impl Into<String>) -> Self {
        Self::DataSource {
            display_set_uid: display_set_uid.to_string(),
            message: message.into(),
        }
    }

    pub fn engine(message: impl Into<String>) -> Self {
        Self::RenderingEngine(message.into())
    }
}
