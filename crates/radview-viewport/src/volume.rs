use std::sync::Arc;

use radview_cache::VolumeCache;
use radview_core::{
    compute_initial_index, ImageLoadRequest, Services, ViewerError, ViewerSettings,
    ViewportDescriptor, ViewportPresentation, VolumeInput, VolumeRenderData,
};

use crate::engine::{EngineViewport, ViewportProperties};
use crate::segmentation_sync::{synchronize_segmentations, SyncOutcome};

/// How a volume setup finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeSetup {
    /// Volumes attached, segmentations synchronized, viewport rendered.
    Attached(SyncOutcome),
    /// A hanging-protocol load strategy took over loading.
    Delegated,
}

/// Volume inputs for every entry that carries a live volume. Entries built
/// through their own loader are skipped.
pub fn volume_inputs(data: &VolumeRenderData, descriptor: &ViewportDescriptor) -> Vec<VolumeInput> {
    let options = descriptor.display_set_options();
    data.entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            entry.volume.as_ref()?;
            let image_ids = entry.image_ids.clone()?;
            let display_set_options = options.get(index).cloned().unwrap_or_default();
            Some(VolumeInput::new(&entry.volume_id, image_ids, &display_set_options))
        })
        .collect()
}

/// Attach volume data to `viewport`, then synchronize segmentations and
/// render.
///
/// An error from the engine's volume attachment is returned before any
/// segmentation state is touched.
pub async fn setup_volume(
    viewport: Arc<dyn EngineViewport>,
    descriptor: &ViewportDescriptor,
    data: &VolumeRenderData,
    presentation: Option<&ViewportPresentation>,
    services: &Services,
    volumes: &VolumeCache,
    settings: &ViewerSettings,
) -> Result<VolumeSetup, ViewerError> {
    let viewport_id = descriptor.viewport_id().to_string();
    let inputs = volume_inputs(data, descriptor);

    let hanging_protocol = &services.hanging_protocol;
    if hanging_protocol.has_custom_image_load_strategy()
        && !hanging_protocol.custom_image_load_performed()
    {
        let request = ImageLoadRequest {
            viewport_id: viewport_id.clone(),
            volume_inputs: inputs.clone(),
        };
        if hanging_protocol.run_image_load_strategy(request) {
            log::info!("Volume loading for {} delegated to hanging protocol", viewport_id);
            return Ok(VolumeSetup::Delegated);
        }
        log::debug!("Hanging protocol declined loading {}, loading directly", viewport_id);
    }

    for entry in &data.entries {
        if let Some(volume) = &entry.volume {
            volume.load();
        }
    }

    log::debug!("Setting {} volumes on {}", inputs.len(), viewport_id);
    viewport.set_volumes(inputs).await?;

    let outcome = synchronize_segmentations(
        &viewport_id,
        &data.display_set_uids(),
        services,
        volumes,
        settings,
    );
    let tool_group_id = outcome
        .tool_group_id
        .clone()
        .unwrap_or_else(|| descriptor.viewport_options().tool_group_id.clone());
    services.segmentations.refresh_rendering(&tool_group_id);

    if let Some(index) = initial_volume_index(data, descriptor, presentation) {
        viewport.set_image_index(index);
    }
    if let Some(presentation) = presentation {
        if presentation.voi.is_some() {
            viewport.set_properties(ViewportProperties::resolve(
                &descriptor.first_display_set_options(),
                Some(presentation),
            ));
        }
        if let Some(camera) = presentation.camera {
            viewport.set_camera(camera);
        }
    }
    viewport.render();

    Ok(VolumeSetup::Attached(outcome))
}

/// Pending initial-slice jump for a volume viewport, if any was requested.
fn initial_volume_index(
    data: &VolumeRenderData,
    descriptor: &ViewportDescriptor,
    presentation: Option<&ViewportPresentation>,
) -> Option<usize> {
    let slices = data.number_of_slices()?;
    if let Some(index) = presentation.and_then(|p| p.image_index) {
        return Some(compute_initial_index(slices, Some(index), None));
    }
    let options = descriptor.viewport_options().initial_image_options?;
    Some(compute_initial_index(slices, options.index, options.preset))
}
