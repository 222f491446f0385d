//! Auto-attachment of hydrated segmentations to viewports that share their
//! frame of reference.

use std::collections::HashSet;

use radview_cache::VolumeCache;
use radview_core::{DisplaySet, Segmentation, Services, ViewerSettings};

/// Result of one synchronization pass over a viewport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Tool group the pass ran against, if one was found.
    pub tool_group_id: Option<String>,
    /// Segmentations newly attached during this pass.
    pub attached: Vec<String>,
    /// Whether the viewport shows a segmentation display set itself.
    pub segmentation_viewport: bool,
}

/// Attach every eligible segmentation to the tool group of `viewport_id`.
///
/// A viewport that displays a segmentation only gets that segmentation
/// attached (when its reference volume is cached); the general
/// frame-of-reference pass is skipped for it. Missing collaborator data is
/// logged and skipped.
pub fn synchronize_segmentations(
    viewport_id: &str,
    display_set_uids: &[String],
    services: &Services,
    volumes: &VolumeCache,
    settings: &ViewerSettings,
) -> SyncOutcome {
    let mut outcome = SyncOutcome::default();

    let tool_group = match services.tool_groups.get_tool_group_for_viewport(viewport_id) {
        Some(tool_group) => tool_group,
        None => {
            log::warn!("No tool group for viewport {}, skipping segmentation sync", viewport_id);
            return outcome;
        }
    };
    outcome.tool_group_id = Some(tool_group.id.clone());

    let display_sets: Vec<DisplaySet> = display_set_uids
        .iter()
        .filter_map(|uid| {
            let display_set = services.display_sets.get_display_set_by_uid(uid);
            if display_set.is_none() {
                log::warn!("Display set {} bound to {} is unknown", uid, viewport_id);
            }
            display_set
        })
        .collect();

    let mut attached: HashSet<String> = services
        .segmentations
        .get_segmentation_representations_for_tool_group(&tool_group.id)
        .into_iter()
        .map(|r| r.segmentation_id)
        .collect();

    if let Some(segmentation_set) = display_sets.iter().find(|ds| ds.is_segmentation()) {
        outcome.segmentation_viewport = true;
        let segmentation_id = &segmentation_set.display_set_instance_uid;

        let reference_volume = segmentation_set
            .referenced_display_set_uid()
            .map(|uid| settings.volume_id_for(uid))
            .and_then(|volume_id| volumes.get_volume(&volume_id));
        if reference_volume.is_none() {
            log::warn!(
                "Reference volume for segmentation {} is not loaded, not attaching",
                segmentation_id
            );
            return outcome;
        }

        if attached.insert(segmentation_id.clone()) {
            services
                .segmentations
                .add_segmentation_representation_to_tool_group(&tool_group.id, segmentation_id);
            outcome.attached.push(segmentation_id.clone());
        }
        return outcome;
    }

    for segmentation in services.segmentations.get_segmentations() {
        if !segmentation.is_hydrated || attached.contains(&segmentation.id) {
            continue;
        }

        let frame_of_reference = match segmentation_frame_of_reference(&segmentation, volumes) {
            Some(frame_of_reference) => frame_of_reference,
            None => {
                log::warn!("Segmentation {} has no frame of reference", segmentation.id);
                continue;
            }
        };

        // First matching display set wins; one attachment per segmentation.
        let matches = display_sets
            .iter()
            .any(|ds| ds.frame_of_reference_uid() == Some(frame_of_reference.as_str()));
        if matches {
            log::info!(
                "Attaching segmentation {} to tool group {} (frame of reference {})",
                segmentation.id,
                tool_group.id,
                frame_of_reference
            );
            services
                .segmentations
                .add_segmentation_representation_to_tool_group(&tool_group.id, &segmentation.id);
            attached.insert(segmentation.id.clone());
            outcome.attached.push(segmentation.id);
        }
    }

    outcome
}

/// A segmentation's frame of reference: its own, else its reference volume's.
fn segmentation_frame_of_reference(
    segmentation: &Segmentation,
    volumes: &VolumeCache,
) -> Option<String> {
    if let Some(frame_of_reference) = &segmentation.frame_of_reference_uid {
        return Some(frame_of_reference.clone());
    }
    let volume = volumes.get_volume(segmentation.referenced_volume_id.as_deref()?)?;
    volume.frame_of_reference_uid().map(str::to_string)
}
