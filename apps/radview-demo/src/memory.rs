//! In-memory collaborators and a logging rendering engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{self, BoxFuture, FutureExt};

use radview_core::{
    Camera, DataSource, DisplaySet, DisplaySetService, HangingProtocolService, ImageLoadRequest,
    Segmentation, SegmentationRepresentation, SegmentationService, ToolGroup, ToolGroupService,
    ViewerError, ViewportKind, Volume, VolumeFactory, VolumeInput,
};
use radview_viewport::{EngineViewport, RenderingEngine, ViewportInput, ViewportProperties};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Volumes ──────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct MemoryVolume {
    volume_id: String,
    image_ids: Vec<String>,
    frame_of_reference_uid: Option<String>,
    streaming: AtomicBool,
}

impl Volume for MemoryVolume {
    fn volume_id(&self) -> &str {
        &self.volume_id
    }

    fn image_ids(&self) -> &[String] {
        &self.image_ids
    }

    fn frame_of_reference_uid(&self) -> Option<&str> {
        self.frame_of_reference_uid.as_deref()
    }

    fn number_of_slices(&self) -> usize {
        self.image_ids.len()
    }

    fn size_in_bytes(&self) -> u64 {
        self.image_ids.len() as u64 * 512 * 512 * 2
    }

    fn load(&self) {
        if !self.streaming.swap(true, Ordering::SeqCst) {
            log::info!("Streaming {} slices into {}", self.image_ids.len(), self.volume_id);
        }
    }
}

/// Builds volumes whose frame of reference is looked up by volume id.
#[derive(Default)]
pub struct MemoryVolumeFactory {
    frames_of_reference: Mutex<HashMap<String, String>>,
}

impl MemoryVolumeFactory {
    pub fn register(&self, volume_id: &str, frame_of_reference_uid: &str) {
        lock(&self.frames_of_reference)
            .insert(volume_id.to_string(), frame_of_reference_uid.to_string());
    }
}

impl VolumeFactory for MemoryVolumeFactory {
    fn create_volume(
        &self,
        volume_id: &str,
        image_ids: Arc<Vec<String>>,
    ) -> BoxFuture<'static, Result<Arc<dyn Volume>, ViewerError>> {
        let volume: Arc<dyn Volume> = Arc::new(MemoryVolume {
            volume_id: volume_id.to_string(),
            image_ids: image_ids.as_ref().clone(),
            frame_of_reference_uid: lock(&self.frames_of_reference).get(volume_id).cloned(),
            streaming: AtomicBool::new(false),
        });
        future::ready(Ok(volume)).boxed()
    }
}

// ── Services ─────────────────────────────────────────────────────────

/// Synthesizes `count` image ids per display set.
pub struct SyntheticDataSource {
    pub images_per_set: usize,
}

impl DataSource for SyntheticDataSource {
    fn get_image_ids_for_display_set(
        &self,
        display_set: &DisplaySet,
    ) -> Result<Vec<String>, ViewerError> {
        let uid = &display_set.display_set_instance_uid;
        Ok((0..self.images_per_set)
            .map(|n| format!("wadors:{}/{}", uid, n))
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryDisplaySets {
    sets: Mutex<Vec<DisplaySet>>,
}

impl MemoryDisplaySets {
    pub fn add(&self, display_set: DisplaySet) {
        lock(&self.sets).push(display_set);
    }
}

impl DisplaySetService for MemoryDisplaySets {
    fn get_display_set_by_uid(&self, display_set_uid: &str) -> Option<DisplaySet> {
        lock(&self.sets)
            .iter()
            .find(|ds| ds.display_set_instance_uid == display_set_uid)
            .cloned()
    }

    fn get_active_display_sets(&self) -> Vec<DisplaySet> {
        lock(&self.sets).clone()
    }
}

#[derive(Default)]
pub struct MemorySegmentations {
    segmentations: Mutex<Vec<Segmentation>>,
    representations: Mutex<Vec<SegmentationRepresentation>>,
}

impl MemorySegmentations {
    pub fn add(&self, segmentation: Segmentation) {
        lock(&self.segmentations).push(segmentation);
    }
}

impl SegmentationService for MemorySegmentations {
    fn get_segmentations(&self) -> Vec<Segmentation> {
        lock(&self.segmentations)
            .iter()
            .filter(|s| s.is_hydrated)
            .cloned()
            .collect()
    }

    fn add_segmentation_representation_to_tool_group(
        &self,
        tool_group_id: &str,
        segmentation_id: &str,
    ) {
        log::info!("Representing {} in tool group {}", segmentation_id, tool_group_id);
        lock(&self.representations).push(SegmentationRepresentation {
            segmentation_id: segmentation_id.to_string(),
            tool_group_id: tool_group_id.to_string(),
        });
    }

    fn get_segmentation_representations_for_tool_group(
        &self,
        tool_group_id: &str,
    ) -> Vec<SegmentationRepresentation> {
        lock(&self.representations)
            .iter()
            .filter(|r| r.tool_group_id == tool_group_id)
            .cloned()
            .collect()
    }

    fn refresh_rendering(&self, tool_group_id: &str) {
        log::debug!("Refreshing segmentation rendering for {}", tool_group_id);
    }
}

/// Every viewport belongs to the same tool group.
pub struct SingleToolGroup(pub String);

impl ToolGroupService for SingleToolGroup {
    fn get_tool_group_for_viewport(&self, _viewport_id: &str) -> Option<ToolGroup> {
        Some(ToolGroup { id: self.0.clone() })
    }
}

pub struct NoHangingProtocol;

impl HangingProtocolService for NoHangingProtocol {
    fn has_custom_image_load_strategy(&self) -> bool {
        false
    }

    fn custom_image_load_performed(&self) -> bool {
        false
    }

    fn run_image_load_strategy(&self, _request: ImageLoadRequest) -> bool {
        false
    }
}

// ── Engine ───────────────────────────────────────────────────────────

struct LoggingViewport {
    id: String,
    kind: ViewportKind,
    camera: Mutex<Camera>,
    image_index: Mutex<usize>,
}

impl EngineViewport for LoggingViewport {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ViewportKind {
        self.kind
    }

    fn set_stack(
        &self,
        image_ids: Arc<Vec<String>>,
        initial_index: usize,
    ) -> BoxFuture<'static, Result<(), ViewerError>> {
        log::info!(
            "[{}] stack of {} images, showing {}",
            self.id,
            image_ids.len(),
            initial_index
        );
        *lock(&self.image_index) = initial_index;
        future::ready(Ok(())).boxed()
    }

    fn set_volumes(&self, inputs: Vec<VolumeInput>) -> BoxFuture<'static, Result<(), ViewerError>> {
        for input in &inputs {
            log::info!("[{}] volume {}", self.id, input.volume_id);
        }
        *lock(&self.camera) = Camera::default();
        future::ready(Ok(())).boxed()
    }

    fn set_properties(&self, properties: ViewportProperties) {
        log::info!(
            "[{}] voi {:?} inverted {}",
            self.id,
            properties.voi_range,
            properties.invert
        );
    }

    fn set_image_index(&self, index: usize) {
        *lock(&self.image_index) = index;
    }

    fn current_image_index(&self) -> usize {
        *lock(&self.image_index)
    }

    fn get_camera(&self) -> Camera {
        *lock(&self.camera)
    }

    fn set_camera(&self, camera: Camera) {
        *lock(&self.camera) = camera;
    }

    fn render(&self) {
        log::debug!("[{}] render", self.id);
    }
}

/// Headless engine that only logs what it is asked to draw.
#[derive(Default)]
pub struct LoggingEngine {
    viewports: HashMap<String, Arc<LoggingViewport>>,
    destroyed: bool,
}

impl RenderingEngine for LoggingEngine {
    fn enable_element(&mut self, input: ViewportInput) -> Result<(), ViewerError> {
        log::info!(
            "Enabling {} viewport {} on surface {:?}",
            input.kind,
            input.viewport_id,
            input.element
        );
        self.viewports
            .entry(input.viewport_id.clone())
            .or_insert_with(|| {
                Arc::new(LoggingViewport {
                    id: input.viewport_id,
                    kind: input.kind,
                    camera: Mutex::new(Camera::default()),
                    image_index: Mutex::new(0),
                })
            });
        Ok(())
    }

    fn disable_element(&mut self, viewport_id: &str) {
        log::info!("Disabling viewport {}", viewport_id);
        self.viewports.remove(viewport_id);
    }

    fn get_viewport(&self, viewport_id: &str) -> Option<Arc<dyn EngineViewport>> {
        let viewport = self.viewports.get(viewport_id)?.clone();
        Some(viewport)
    }

    fn render(&self) {
        log::debug!("Rendering {} viewports", self.viewports.len());
    }

    fn render_viewports(&self, viewport_ids: &[String]) {
        log::debug!("Rendering {:?}", viewport_ids);
    }

    fn resize(&mut self, immediate: bool, keep_camera: bool) {
        log::debug!("Resize (immediate: {}, keep camera: {})", immediate, keep_camera);
    }

    fn destroy(&mut self) {
        self.viewports.clear();
        self.destroyed = true;
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}
