use std::sync::Arc;

use crate::descriptor::ViewportKind;
use crate::volume::Volume;

/// Flat image stack for a stack viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct StackRenderData {
    pub study_instance_uid: String,
    pub display_set_instance_uid: String,
    pub image_ids: Arc<Vec<String>>,
    pub initial_image_index: Option<usize>,
}

/// One display set's contribution to a volume viewport.
///
/// Display sets with a custom loader resolve themselves and carry neither a
/// volume nor an image list.
#[derive(Debug, Clone)]
pub struct VolumeEntry {
    pub study_instance_uid: String,
    pub display_set_instance_uid: String,
    pub volume_id: String,
    pub volume: Option<Arc<dyn Volume>>,
    pub image_ids: Option<Arc<Vec<String>>>,
}

/// Ordered volume entries for a volume viewport.
#[derive(Debug, Clone, Default)]
pub struct VolumeRenderData {
    pub entries: Vec<VolumeEntry>,
}

impl VolumeRenderData {
    pub fn display_set_uids(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.display_set_instance_uid.clone())
            .collect()
    }

    /// Slice count of the first live volume, used for initial-slice presets.
    pub fn number_of_slices(&self) -> Option<usize> {
        self.entries
            .iter()
            .find_map(|e| e.volume.as_ref())
            .map(|v| v.number_of_slices())
    }
}

/// Render data handed to the orchestrator, tagged by target kind.
#[derive(Debug, Clone)]
pub enum ViewportData {
    Stack(StackRenderData),
    Volume(VolumeRenderData),
}

impl ViewportData {
    pub fn kind(&self) -> ViewportKind {
        match self {
            Self::Stack(_) => ViewportKind::Stack,
            Self::Volume(_) => ViewportKind::Volume,
        }
    }

    pub fn display_set_uids(&self) -> Vec<String> {
        match self {
            Self::Stack(stack) => vec![stack.display_set_instance_uid.clone()],
            Self::Volume(volume) => volume.display_set_uids(),
        }
    }
}
