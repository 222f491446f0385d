//! Ports to the collaborators the engine consumes but does not own.
//!
//! All ports are object safe and `Send + Sync` so the orchestrator can hold
//! them as `Arc<dyn ...>`.

use std::sync::Arc;

use crate::display_set::DisplaySet;
use crate::error::ViewerError;
use crate::segmentation::{Segmentation, SegmentationRepresentation};
use crate::volume::VolumeInput;

/// Resolves display sets to image ids. Must be deterministic per display set
/// within a session.
pub trait DataSource: Send + Sync {
    fn get_image_ids_for_display_set(
        &self,
        display_set: &DisplaySet,
    ) -> Result<Vec<String>, ViewerError>;
}

pub trait DisplaySetService: Send + Sync {
    fn get_display_set_by_uid(&self, display_set_uid: &str) -> Option<DisplaySet>;
    fn get_active_display_sets(&self) -> Vec<DisplaySet>;
}

pub trait SegmentationService: Send + Sync {
    /// Hydrated segmentations only.
    fn get_segmentations(&self) -> Vec<Segmentation>;
    fn add_segmentation_representation_to_tool_group(
        &self,
        tool_group_id: &str,
        segmentation_id: &str,
    );
    fn get_segmentation_representations_for_tool_group(
        &self,
        tool_group_id: &str,
    ) -> Vec<SegmentationRepresentation>;
    /// Ask the segmentation renderer to redraw everything in the tool group.
    fn refresh_rendering(&self, tool_group_id: &str);
}

/// A group of viewports sharing tool bindings and segmentation representations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolGroup {
    pub id: String,
}

pub trait ToolGroupService: Send + Sync {
    fn get_tool_group_for_viewport(&self, viewport_id: &str) -> Option<ToolGroup>;
}

/// Volume loading handed over to a hanging-protocol strategy.
#[derive(Debug, Clone)]
pub struct ImageLoadRequest {
    pub viewport_id: String,
    pub volume_inputs: Vec<VolumeInput>,
}

pub trait HangingProtocolService: Send + Sync {
    fn has_custom_image_load_strategy(&self) -> bool;
    fn custom_image_load_performed(&self) -> bool;
    /// Returns whether the strategy took ownership of the load.
    fn run_image_load_strategy(&self, request: ImageLoadRequest) -> bool;
}

/// Bundle of collaborator handles the orchestrator is built with.
#[derive(Clone)]
pub struct Services {
    pub display_sets: Arc<dyn DisplaySetService>,
    pub segmentations: Arc<dyn SegmentationService>,
    pub tool_groups: Arc<dyn ToolGroupService>,
    pub hanging_protocol: Arc<dyn HangingProtocolService>,
}
