use serde::{Deserialize, Serialize};

/// A segmentation known to the segmentation registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segmentation {
    pub id: String,
    pub label: String,
    /// Display set the segmentation was loaded from, if any.
    pub display_set_instance_uid: Option<String>,
    /// Frame of reference stamped on the segmentation at hydration time.
    pub frame_of_reference_uid: Option<String>,
    /// Volume the labelmap was built against.
    pub referenced_volume_id: Option<String>,
    /// Only hydrated segmentations are eligible for auto-attachment.
    pub is_hydrated: bool,
}

impl Segmentation {
    pub fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            display_set_instance_uid: None,
            frame_of_reference_uid: None,
            referenced_volume_id: None,
            is_hydrated: false,
        }
    }

    pub fn hydrated(mut self) -> Self {
        self.is_hydrated = true;
        self
    }

    pub fn with_frame_of_reference(mut self, frame_of_reference_uid: &str) -> Self {
        self.frame_of_reference_uid = Some(frame_of_reference_uid.to_string());
        self
    }

    pub fn with_referenced_volume(mut self, volume_id: &str) -> Self {
        self.referenced_volume_id = Some(volume_id.to_string());
        self
    }
}

/// A segmentation attached to a tool group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationRepresentation {
    pub segmentation_id: String,
    pub tool_group_id: String,
}
