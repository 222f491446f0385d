//! In-memory engine and collaborators for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::channel::oneshot;
use futures::future::{self, BoxFuture, FutureExt, FutureObj};
use futures::task::{Spawn, SpawnError};

use radview_cache::{CachedVolume, DataMaterializer};
use radview_core::{
    Camera, DataSource, DisplaySet, DisplaySetService, HangingProtocolService, ImageLoadRequest,
    Segmentation, SegmentationRepresentation, SegmentationService, Services, ToolGroup,
    ToolGroupService, ViewerError, ViewerSettings, ViewportData, ViewportKind, Volume,
    VolumeFactory, VolumeInput,
};

use crate::engine::{EngineViewport, RenderingEngine, ViewportInput, ViewportProperties};
use crate::orchestrator::ViewportOrchestrator;

// ── Volumes ──────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct FakeVolume {
    volume_id: String,
    image_ids: Vec<String>,
    frame_of_reference_uid: Option<String>,
    slices: usize,
    loads: AtomicUsize,
}

impl FakeVolume {
    pub fn new(volume_id: &str, slices: usize) -> Self {
        Self {
            volume_id: volume_id.to_string(),
            image_ids: (0..slices).map(|n| format!("{}:{}", volume_id, n)).collect(),
            frame_of_reference_uid: None,
            slices,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn with_frame_of_reference(mut self, frame_of_reference_uid: &str) -> Self {
        self.frame_of_reference_uid = Some(frame_of_reference_uid.to_string());
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl Volume for FakeVolume {
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
        self.slices
    }

    fn size_in_bytes(&self) -> u64 {
        self.slices as u64 * 512 * 512 * 2
    }

    fn load(&self) {
        self.loads.fetch_add(1, Ordering::SeqCst);
    }
}

/// Builds one slice per image id, stamping the frame of reference registered
/// for the volume id.
#[derive(Default)]
pub struct FakeVolumeFactory {
    frames_of_reference: Mutex<HashMap<String, String>>,
    built: Mutex<Vec<Arc<FakeVolume>>>,
    calls: AtomicUsize,
}

impl FakeVolumeFactory {
    pub fn register(&self, volume_id: &str, frame_of_reference_uid: &str) {
        self.frames_of_reference
            .lock()
            .unwrap()
            .insert(volume_id.to_string(), frame_of_reference_uid.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Load requests seen by the most recent volume built for `volume_id`.
    pub fn loads(&self, volume_id: &str) -> usize {
        self.built
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|v| v.volume_id == volume_id)
            .map_or(0, |v| v.loads())
    }
}

impl VolumeFactory for FakeVolumeFactory {
    fn create_volume(
        &self,
        volume_id: &str,
        image_ids: Arc<Vec<String>>,
    ) -> BoxFuture<'static, Result<Arc<dyn Volume>, ViewerError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut volume = FakeVolume::new(volume_id, image_ids.len());
        volume.image_ids = image_ids.as_ref().clone();
        if let Some(frame_of_reference) = self.frames_of_reference.lock().unwrap().get(volume_id) {
            volume = volume.with_frame_of_reference(frame_of_reference);
        }
        let volume = Arc::new(volume);
        self.built.lock().unwrap().push(volume.clone());
        let volume: Arc<dyn Volume> = volume;
        future::ready(Ok(volume)).boxed()
    }
}

// ── Engine ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Enable(String),
    Disable(String),
    Destroy,
    Resize,
    Render,
    SetStack(String, usize),
    SetVolumes(String, Vec<String>),
    SetProperties(String, ViewportProperties),
    SetCamera(String),
    SetImageIndex(String, usize),
    RenderViewport(String),
}

#[derive(Debug, Default)]
pub struct EngineLog {
    pub calls: Vec<EngineCall>,
    pub engines_created: usize,
}

type SharedLog = Arc<Mutex<EngineLog>>;

/// While `hold` is set, `set_stack` stays pending until released.
#[derive(Clone, Default)]
pub struct StackGate {
    hold: Arc<AtomicBool>,
    releases: Arc<Mutex<Vec<oneshot::Sender<()>>>>,
}

impl StackGate {
    pub fn hold(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    /// Complete every pending `set_stack`.
    pub fn release(&self) {
        self.hold.store(false, Ordering::SeqCst);
        for release in self.releases.lock().unwrap().drain(..) {
            let _ = release.send(());
        }
    }

    fn pass(&self) -> BoxFuture<'static, Result<(), ViewerError>> {
        if !self.hold.load(Ordering::SeqCst) {
            return future::ready(Ok(())).boxed();
        }
        let (tx, rx) = oneshot::channel();
        self.releases.lock().unwrap().push(tx);
        async move {
            let _ = rx.await;
            Ok(())
        }
        .boxed()
    }
}

/// Spawner that queues tasks until `run_all` drives them.
#[derive(Clone, Default)]
pub struct QueueSpawner {
    queue: Arc<Mutex<Vec<FutureObj<'static, ()>>>>,
}

impl QueueSpawner {
    pub fn queued(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Run every queued task to completion on the calling thread.
    pub fn run_all(&self) -> usize {
        let tasks: Vec<_> = self.queue.lock().unwrap().drain(..).collect();
        let count = tasks.len();
        for task in tasks {
            futures::executor::block_on(task);
        }
        count
    }
}

impl Spawn for QueueSpawner {
    fn spawn_obj(&self, future: FutureObj<'static, ()>) -> Result<(), SpawnError> {
        self.queue.lock().unwrap().push(future);
        Ok(())
    }
}

fn record(log: &SharedLog, call: EngineCall) {
    log.lock().unwrap().calls.push(call);
}

#[derive(Debug)]
struct ViewState {
    camera: Camera,
    image_index: usize,
}

pub struct FakeEngineViewport {
    id: String,
    kind: ViewportKind,
    log: SharedLog,
    fail_set_volumes: Arc<AtomicBool>,
    stack_gate: StackGate,
    state: Mutex<ViewState>,
}

impl EngineViewport for FakeEngineViewport {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ViewportKind {
        self.kind
    }

    fn set_stack(
        &self,
        _image_ids: Arc<Vec<String>>,
        initial_index: usize,
    ) -> BoxFuture<'static, Result<(), ViewerError>> {
        record(&self.log, EngineCall::SetStack(self.id.clone(), initial_index));
        self.state.lock().unwrap().image_index = initial_index;
        self.stack_gate.pass()
    }

    fn set_volumes(&self, inputs: Vec<VolumeInput>) -> BoxFuture<'static, Result<(), ViewerError>> {
        let volume_ids = inputs.into_iter().map(|i| i.volume_id).collect();
        record(&self.log, EngineCall::SetVolumes(self.id.clone(), volume_ids));
        if self.fail_set_volumes.load(Ordering::SeqCst) {
            return future::ready(Err(ViewerError::engine("volume upload failed"))).boxed();
        }
        let mut state = self.state.lock().unwrap();
        state.camera = Camera::default();
        state.image_index = 0;
        future::ready(Ok(())).boxed()
    }

    fn set_properties(&self, properties: ViewportProperties) {
        record(&self.log, EngineCall::SetProperties(self.id.clone(), properties));
    }

    fn set_image_index(&self, index: usize) {
        record(&self.log, EngineCall::SetImageIndex(self.id.clone(), index));
        self.state.lock().unwrap().image_index = index;
    }

    fn current_image_index(&self) -> usize {
        self.state.lock().unwrap().image_index
    }

    fn get_camera(&self) -> Camera {
        self.state.lock().unwrap().camera
    }

    fn set_camera(&self, camera: Camera) {
        record(&self.log, EngineCall::SetCamera(self.id.clone()));
        self.state.lock().unwrap().camera = camera;
    }

    fn render(&self) {
        record(&self.log, EngineCall::RenderViewport(self.id.clone()));
    }
}

pub struct FakeEngine {
    log: SharedLog,
    fail_set_volumes: Arc<AtomicBool>,
    stack_gate: StackGate,
    viewports: HashMap<String, Arc<FakeEngineViewport>>,
    destroyed: bool,
}

impl RenderingEngine for FakeEngine {
    fn enable_element(&mut self, input: ViewportInput) -> Result<(), ViewerError> {
        record(&self.log, EngineCall::Enable(input.viewport_id.clone()));
        let reusable = self
            .viewports
            .get(&input.viewport_id)
            .is_some_and(|v| v.kind == input.kind);
        if !reusable {
            let viewport = FakeEngineViewport {
                id: input.viewport_id.clone(),
                kind: input.kind,
                log: self.log.clone(),
                fail_set_volumes: self.fail_set_volumes.clone(),
                stack_gate: self.stack_gate.clone(),
                state: Mutex::new(ViewState {
                    camera: Camera::default(),
                    image_index: 0,
                }),
            };
            self.viewports.insert(input.viewport_id, Arc::new(viewport));
        }
        Ok(())
    }

    fn disable_element(&mut self, viewport_id: &str) {
        record(&self.log, EngineCall::Disable(viewport_id.to_string()));
        self.viewports.remove(viewport_id);
    }

    fn get_viewport(&self, viewport_id: &str) -> Option<Arc<dyn EngineViewport>> {
        let viewport = self.viewports.get(viewport_id)?.clone();
        Some(viewport)
    }

    fn render(&self) {
        record(&self.log, EngineCall::Render);
    }

    fn render_viewports(&self, viewport_ids: &[String]) {
        for viewport_id in viewport_ids {
            record(&self.log, EngineCall::RenderViewport(viewport_id.clone()));
        }
    }

    fn resize(&mut self, _immediate: bool, _keep_camera: bool) {
        record(&self.log, EngineCall::Resize);
    }

    fn destroy(&mut self) {
        record(&self.log, EngineCall::Destroy);
        self.viewports.clear();
        self.destroyed = true;
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

// ── Collaborators ────────────────────────────────────────────────────

/// Returns `images_per_set` ids for every display set.
pub struct FakeDataSource {
    pub images_per_set: usize,
}

impl Default for FakeDataSource {
    fn default() -> Self {
        Self { images_per_set: 27 }
    }
}

impl DataSource for FakeDataSource {
    fn get_image_ids_for_display_set(
        &self,
        display_set: &DisplaySet,
    ) -> Result<Vec<String>, ViewerError> {
        let uid = &display_set.display_set_instance_uid;
        Ok((0..self.images_per_set)
            .map(|n| format!("imageId:{}:{}", uid, n))
            .collect())
    }
}

#[derive(Default)]
pub struct FakeDisplaySets {
    sets: Mutex<HashMap<String, DisplaySet>>,
}

impl FakeDisplaySets {
    pub fn insert(&self, display_set: DisplaySet) {
        self.sets
            .lock()
            .unwrap()
            .insert(display_set.display_set_instance_uid.clone(), display_set);
    }
}

impl DisplaySetService for FakeDisplaySets {
    fn get_display_set_by_uid(&self, display_set_uid: &str) -> Option<DisplaySet> {
        self.sets.lock().unwrap().get(display_set_uid).cloned()
    }

    fn get_active_display_sets(&self) -> Vec<DisplaySet> {
        self.sets.lock().unwrap().values().cloned().collect()
    }
}

#[derive(Default)]
pub struct FakeSegmentations {
    segmentations: Mutex<Vec<Segmentation>>,
    representations: Mutex<Vec<SegmentationRepresentation>>,
    add_calls: Mutex<HashMap<String, usize>>,
    get_calls: AtomicUsize,
    refreshes: Mutex<Vec<String>>,
}

impl FakeSegmentations {
    pub fn add(&self, segmentation: Segmentation) {
        self.segmentations.lock().unwrap().push(segmentation);
    }

    pub fn add_calls(&self, tool_group_id: &str) -> usize {
        self.add_calls
            .lock()
            .unwrap()
            .get(tool_group_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn representations(&self, tool_group_id: &str) -> Vec<String> {
        self.representations
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.tool_group_id == tool_group_id)
            .map(|r| r.segmentation_id.clone())
            .collect()
    }

    pub fn get_segmentations_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn refreshes(&self) -> Vec<String> {
        self.refreshes.lock().unwrap().clone()
    }
}

impl SegmentationService for FakeSegmentations {
    fn get_segmentations(&self) -> Vec<Segmentation> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.segmentations.lock().unwrap().clone()
    }

    fn add_segmentation_representation_to_tool_group(
        &self,
        tool_group_id: &str,
        segmentation_id: &str,
    ) {
        *self
            .add_calls
            .lock()
            .unwrap()
            .entry(tool_group_id.to_string())
            .or_insert(0) += 1;
        self.representations
            .lock()
            .unwrap()
            .push(SegmentationRepresentation {
                segmentation_id: segmentation_id.to_string(),
                tool_group_id: tool_group_id.to_string(),
            });
    }

    fn get_segmentation_representations_for_tool_group(
        &self,
        tool_group_id: &str,
    ) -> Vec<SegmentationRepresentation> {
        self.representations
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.tool_group_id == tool_group_id)
            .cloned()
            .collect()
    }

    fn refresh_rendering(&self, tool_group_id: &str) {
        self.refreshes.lock().unwrap().push(tool_group_id.to_string());
    }
}

#[derive(Default)]
pub struct FakeToolGroups {
    by_viewport: Mutex<HashMap<String, String>>,
}

impl FakeToolGroups {
    pub fn assign(&self, viewport_id: &str, tool_group_id: &str) {
        self.by_viewport
            .lock()
            .unwrap()
            .insert(viewport_id.to_string(), tool_group_id.to_string());
    }
}

impl ToolGroupService for FakeToolGroups {
    fn get_tool_group_for_viewport(&self, viewport_id: &str) -> Option<ToolGroup> {
        self.by_viewport
            .lock()
            .unwrap()
            .get(viewport_id)
            .map(|id| ToolGroup { id: id.clone() })
    }
}

/// Hanging protocol whose custom strategy, once enabled, takes over the first
/// load it is asked to run.
#[derive(Default)]
pub struct FakeHangingProtocol {
    custom: AtomicBool,
    performed: AtomicBool,
    runs: AtomicUsize,
}

impl FakeHangingProtocol {
    pub fn enable_custom_strategy(&self) {
        self.custom.store(true, Ordering::SeqCst);
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl HangingProtocolService for FakeHangingProtocol {
    fn has_custom_image_load_strategy(&self) -> bool {
        self.custom.load(Ordering::SeqCst)
    }

    fn custom_image_load_performed(&self) -> bool {
        self.performed.load(Ordering::SeqCst)
    }

    fn run_image_load_strategy(&self, _request: ImageLoadRequest) -> bool {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.performed.store(true, Ordering::SeqCst);
        true
    }
}

// ── Harness ──────────────────────────────────────────────────────────

pub struct Harness {
    pub settings: ViewerSettings,
    pub log: SharedLog,
    pub fail_set_volumes: Arc<AtomicBool>,
    pub stack_gate: StackGate,
    pub factory: Arc<FakeVolumeFactory>,
    pub data_source: Arc<FakeDataSource>,
    pub display_sets: Arc<FakeDisplaySets>,
    pub segmentations: Arc<FakeSegmentations>,
    pub tool_groups: Arc<FakeToolGroups>,
    pub hanging_protocol: Arc<FakeHangingProtocol>,
    pub materializer: Arc<DataMaterializer>,
}

impl Harness {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let settings = ViewerSettings::default();
        let factory = Arc::new(FakeVolumeFactory::default());
        let materializer = Arc::new(DataMaterializer::new(settings.clone(), factory.clone()));
        Self {
            settings,
            log: Arc::new(Mutex::new(EngineLog::default())),
            fail_set_volumes: Arc::new(AtomicBool::new(false)),
            stack_gate: StackGate::default(),
            factory,
            data_source: Arc::new(FakeDataSource::default()),
            display_sets: Arc::new(FakeDisplaySets::default()),
            segmentations: Arc::new(FakeSegmentations::default()),
            tool_groups: Arc::new(FakeToolGroups::default()),
            hanging_protocol: Arc::new(FakeHangingProtocol::default()),
            materializer,
        }
    }

    pub fn services(&self) -> Services {
        Services {
            display_sets: self.display_sets.clone(),
            segmentations: self.segmentations.clone(),
            tool_groups: self.tool_groups.clone(),
            hanging_protocol: self.hanging_protocol.clone(),
        }
    }

    pub fn orchestrator(&self) -> ViewportOrchestrator {
        let log = self.log.clone();
        let fail_set_volumes = self.fail_set_volumes.clone();
        let stack_gate = self.stack_gate.clone();
        let engine_factory = move || -> Box<dyn RenderingEngine> {
            log.lock().unwrap().engines_created += 1;
            Box::new(FakeEngine {
                log: log.clone(),
                fail_set_volumes: fail_set_volumes.clone(),
                stack_gate: stack_gate.clone(),
                viewports: HashMap::new(),
                destroyed: false,
            })
        };
        ViewportOrchestrator::new(
            self.settings.clone(),
            engine_factory,
            self.materializer.clone(),
            self.data_source.clone(),
            self.services(),
        )
    }

    pub fn add_image_set(&self, uid: &str, frame_of_reference_uid: &str) {
        self.display_sets.insert(
            DisplaySet::new(uid, "study", "CT").with_frame_of_reference(frame_of_reference_uid),
        );
        self.factory
            .register(&self.settings.volume_id_for(uid), frame_of_reference_uid);
    }

    pub fn add_segmentation_set(&self, uid: &str, referenced_uid: &str, frame_of_reference_uid: &str) {
        self.display_sets.insert(
            DisplaySet::new(uid, "study", "SEG")
                .as_segmentation_of(referenced_uid)
                .with_instance(&format!("{}.1", uid), Some(frame_of_reference_uid)),
        );
    }

    pub fn cache_volume(&self, volume: FakeVolume) {
        let volume_id = volume.volume_id.clone();
        let image_ids = Arc::new(volume.image_ids.clone());
        self.materializer.volume_cache().insert(
            &volume_id,
            CachedVolume {
                volume: Arc::new(volume),
                image_ids,
            },
        );
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.log.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.log.lock().unwrap().calls.clear();
    }

    pub fn engines_created(&self) -> usize {
        self.log.lock().unwrap().engines_created
    }

    fn lookup(&self, uids: &[&str]) -> Vec<DisplaySet> {
        uids.iter()
            .map(|uid| self.display_sets.get_display_set_by_uid(uid).unwrap())
            .collect()
    }

    pub async fn volume_data(&self, uids: &[&str]) -> ViewportData {
        self.materializer
            .create_viewport_data(
                &self.lookup(uids),
                ViewportKind::Volume,
                self.data_source.as_ref(),
                None,
            )
            .await
            .unwrap()
    }

    pub async fn stack_data(&self, uid: &str) -> ViewportData {
        self.materializer
            .create_viewport_data(
                &self.lookup(&[uid]),
                ViewportKind::Stack,
                self.data_source.as_ref(),
                None,
            )
            .await
            .unwrap()
    }
}
