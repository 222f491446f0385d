use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::future::AbortHandle;
use futures::task::Spawn;

use radview_cache::DataMaterializer;
use radview_core::{
    DataSource, DisplaySet, DisplaySetOptions, Services, SurfaceHandle, ViewerError,
    ViewerSettings, ViewportData, ViewportDescriptor, ViewportKind, ViewportOptions,
    ViewportPresentation, Voi,
};

use crate::engine::{EngineViewport, RenderingEngine, RenderingEngineFactory, ViewportInput};
use crate::events::{EventBus, EventKind, Listener, SubscriptionId, ViewportEvent};
use crate::options::PublicViewportOptions;
use crate::stack::setup_stack;
use crate::volume::{setup_volume, VolumeSetup};

/// Look a viewport up by engine id or by grid slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportLookup<'a> {
    Id(&'a str),
    Slot(usize),
}

/// Single owner of the rendering engine and of the per-slot viewport
/// descriptors.
///
/// Data-setting calls take `&mut self`, so two setups can never interleave on
/// the same orchestrator.
pub struct ViewportOrchestrator {
    settings: ViewerSettings,
    engine_factory: Box<dyn RenderingEngineFactory>,
    engine: Option<Box<dyn RenderingEngine>>,
    descriptors: BTreeMap<usize, ViewportDescriptor>,
    /// Last render data bound to each slot.
    viewport_data: HashMap<usize, ViewportData>,
    /// Display-set uids shown by each engine viewport.
    display_sets_by_viewport: HashMap<String, Vec<String>>,
    /// Latest windowing reported by the engine, per viewport.
    voi_state: HashMap<String, (Voi, bool)>,
    /// Deferred stack windowing, per slot.
    stack_tasks: HashMap<usize, AbortHandle>,
    /// Runs deferred stack work. Falls back to the ambient tokio runtime.
    spawner: Option<Arc<dyn Spawn + Send + Sync>>,
    events: EventBus,
    materializer: Arc<DataMaterializer>,
    data_source: Arc<dyn DataSource>,
    services: Services,
}

impl ViewportOrchestrator {
    pub fn new(
        settings: ViewerSettings,
        engine_factory: impl RenderingEngineFactory + 'static,
        materializer: Arc<DataMaterializer>,
        data_source: Arc<dyn DataSource>,
        services: Services,
    ) -> Self {
        Self {
            settings,
            engine_factory: Box::new(engine_factory),
            engine: None,
            descriptors: BTreeMap::new(),
            viewport_data: HashMap::new(),
            display_sets_by_viewport: HashMap::new(),
            voi_state: HashMap::new(),
            stack_tasks: HashMap::new(),
            spawner: None,
            events: EventBus::new(),
            materializer,
            data_source,
            services,
        }
    }

    pub fn with_spawner(mut self, spawner: impl Spawn + Send + Sync + 'static) -> Self {
        self.spawner = Some(Arc::new(spawner));
        self
    }

    pub fn settings(&self) -> &ViewerSettings {
        &self.settings
    }

    pub fn materializer(&self) -> &Arc<DataMaterializer> {
        &self.materializer
    }

    // ── Engine ───────────────────────────────────────────────────────

    /// The shared engine, created on first use or after it was destroyed.
    pub fn get_rendering_engine(&mut self) -> &mut dyn RenderingEngine {
        if self.engine.as_ref().map_or(true, |e| e.is_destroyed()) {
            log::info!("Creating rendering engine");
            self.engine = Some(self.engine_factory.create());
        }
        self.engine
            .get_or_insert_with(|| self.engine_factory.create())
            .as_mut()
    }

    fn live_engine(&self) -> Option<&dyn RenderingEngine> {
        self.engine.as_deref().filter(|e| !e.is_destroyed())
    }

    pub fn get_cornerstone_viewport(&self, viewport_id: &str) -> Option<Arc<dyn EngineViewport>> {
        self.live_engine()?.get_viewport(viewport_id)
    }

    pub fn resize(&mut self, immediate: bool, keep_camera: bool) {
        if let Some(engine) = self.engine.as_deref_mut().filter(|e| !e.is_destroyed()) {
            engine.resize(immediate, keep_camera);
        }
    }

    // ── Slot lifecycle ───────────────────────────────────────────────

    /// Create (or overwrite) the descriptor of `slot_index`.
    ///
    /// Whatever the slot showed before is released, even under the same id.
    /// Fails if another slot already holds `viewport_id`.
    pub fn enable_viewport(
        &mut self,
        slot_index: usize,
        viewport_id: &str,
        options: ViewportOptions,
        element: SurfaceHandle,
    ) -> Result<(), ViewerError> {
        self.ensure_id_free(viewport_id, slot_index)?;
        let previous_id = self
            .descriptors
            .get(&slot_index)
            .map(|d| d.viewport_id().to_string());
        if let Some(previous_id) = previous_id {
            self.release_viewport(slot_index, &previous_id);
        }

        log::debug!("Enabling slot {} as {}", slot_index, viewport_id);
        self.viewport_data.remove(&slot_index);
        self.descriptors.insert(
            slot_index,
            ViewportDescriptor::new(slot_index, viewport_id, element, options),
        );
        Ok(())
    }

    fn ensure_id_free(&self, viewport_id: &str, slot_index: usize) -> Result<(), ViewerError> {
        match self
            .descriptors
            .values()
            .find(|d| d.viewport_id() == viewport_id && d.slot_index() != slot_index)
        {
            Some(holder) => Err(ViewerError::ViewportIdInUse {
                viewport_id: viewport_id.to_string(),
                slot_index: holder.slot_index(),
            }),
            None => Ok(()),
        }
    }

    /// Bind `data` to the viewport in `slot_index`.
    ///
    /// A `viewport_id` in `public_options` that differs from the slot's
    /// current id disables the old engine viewport before the new one is
    /// enabled. Ids held by another slot are rejected before anything changes.
    pub async fn set_viewport_data(
        &mut self,
        slot_index: usize,
        data: ViewportData,
        public_options: PublicViewportOptions,
        display_set_options: Vec<DisplaySetOptions>,
    ) -> Result<(), ViewerError> {
        let descriptor = self
            .descriptors
            .get(&slot_index)
            .ok_or(ViewerError::UnknownSlot(slot_index))?;
        let current_id = descriptor.viewport_id().to_string();
        let options =
            public_options.resolve(data.kind(), descriptor.viewport_options(), &self.settings)?;
        let viewport_id = public_options
            .viewport_id
            .clone()
            .unwrap_or_else(|| current_id.clone());

        let renamed = viewport_id != current_id;
        if renamed {
            self.ensure_id_free(&viewport_id, slot_index)?;
            log::info!(
                "Slot {} moves from viewport {} to {}",
                slot_index,
                current_id,
                viewport_id
            );
            self.release_viewport(slot_index, &current_id);
        } else {
            self.abort_stack_task(slot_index);
        }

        let descriptor = self
            .descriptors
            .get_mut(&slot_index)
            .ok_or(ViewerError::UnknownSlot(slot_index))?;
        if renamed {
            descriptor.rename(&viewport_id);
        }
        descriptor.set_viewport_options(options.clone());
        descriptor.set_display_set_options(display_set_options);
        let descriptor = descriptor.clone();

        self.events.publish(&ViewportEvent::ViewportDataChanged {
            slot_index,
            viewport_id: viewport_id.clone(),
            data: data.clone(),
        });

        let input = ViewportInput {
            viewport_id: viewport_id.clone(),
            element: descriptor.element(),
            kind: options.viewport_kind,
            background: options.background,
            orientation: options.orientation,
        };
        let engine = self.get_rendering_engine();
        engine.enable_element(input)?;
        let viewport = engine.get_viewport(&viewport_id).ok_or_else(|| {
            ViewerError::MissingHandler(format!("engine viewport '{}'", viewport_id))
        })?;

        self.apply_data(&descriptor, viewport, &data, public_options.presentation.as_ref())
            .await
    }

    /// Re-apply data to an already enabled viewport, optionally keeping the
    /// camera where it was.
    pub async fn update_viewport(
        &mut self,
        slot_index: usize,
        data: ViewportData,
        keep_camera: bool,
    ) -> Result<(), ViewerError> {
        let descriptor = self
            .descriptors
            .get(&slot_index)
            .ok_or(ViewerError::UnknownSlot(slot_index))?
            .clone();
        let viewport = self
            .get_cornerstone_viewport(descriptor.viewport_id())
            .ok_or_else(|| ViewerError::UnknownViewport(descriptor.viewport_id().to_string()))?;
        if viewport.kind() != data.kind() {
            return Err(ViewerError::ViewportKindMismatch {
                data: data.kind(),
                viewport: viewport.kind(),
            });
        }

        let presentation = keep_camera.then(|| ViewportPresentation {
            camera: Some(viewport.get_camera()),
            ..Default::default()
        });

        self.abort_stack_task(slot_index);
        self.events.publish(&ViewportEvent::ViewportDataChanged {
            slot_index,
            viewport_id: descriptor.viewport_id().to_string(),
            data: data.clone(),
        });
        self.apply_data(&descriptor, viewport, &data, presentation.as_ref())
            .await
    }

    async fn apply_data(
        &mut self,
        descriptor: &ViewportDescriptor,
        viewport: Arc<dyn EngineViewport>,
        data: &ViewportData,
        presentation: Option<&ViewportPresentation>,
    ) -> Result<(), ViewerError> {
        let slot_index = descriptor.slot_index();
        self.viewport_data.insert(slot_index, data.clone());
        self.display_sets_by_viewport
            .insert(descriptor.viewport_id().to_string(), data.display_set_uids());

        match data {
            ViewportData::Stack(stack) => {
                let task = setup_stack(
                    viewport,
                    descriptor,
                    stack,
                    presentation,
                    self.spawner.as_deref(),
                )?;
                self.stack_tasks.insert(slot_index, task);
            }
            ViewportData::Volume(volume) => {
                let setup = setup_volume(
                    viewport,
                    descriptor,
                    volume,
                    presentation,
                    &self.services,
                    self.materializer.volume_cache(),
                    &self.settings,
                )
                .await?;
                if let VolumeSetup::Attached(outcome) = setup {
                    if !outcome.attached.is_empty() {
                        log::info!(
                            "Viewport {} picked up segmentations {:?}",
                            descriptor.viewport_id(),
                            outcome.attached
                        );
                    }
                }
            }
        }

        if let Some(descriptor) = self.descriptors.get_mut(&slot_index) {
            descriptor.mark_data_bound();
        }
        Ok(())
    }

    /// Tear down the viewport in `slot_index`. Unknown slots are ignored.
    pub fn disable_element(&mut self, slot_index: usize) {
        let descriptor = match self.descriptors.remove(&slot_index) {
            Some(descriptor) => descriptor,
            None => return,
        };
        log::debug!(
            "Disabling slot {} ({})",
            slot_index,
            descriptor.viewport_id()
        );
        self.release_viewport(slot_index, descriptor.viewport_id());
        self.viewport_data.remove(&slot_index);
    }

    /// Drop everything tied to `viewport_id`: the engine viewport, its
    /// subscriptions, tracking and any deferred stack work for the slot.
    fn release_viewport(&mut self, slot_index: usize, viewport_id: &str) {
        self.abort_stack_task(slot_index);
        if let Some(engine) = self.engine.as_deref_mut().filter(|e| !e.is_destroyed()) {
            engine.disable_element(viewport_id);
        }
        let dropped = self.events.drop_viewport(viewport_id);
        if dropped > 0 {
            log::debug!("Dropped {} subscriptions of {}", dropped, viewport_id);
        }
        self.display_sets_by_viewport.remove(viewport_id);
        self.voi_state.remove(viewport_id);
    }

    fn abort_stack_task(&mut self, slot_index: usize) {
        if let Some(task) = self.stack_tasks.remove(&slot_index) {
            task.abort();
        }
    }

    /// Detach observers, destroy the engine and purge every cache.
    pub fn destroy(&mut self) {
        log::info!("Destroying viewport orchestrator");
        self.events.clear();
        for (_, task) in self.stack_tasks.drain() {
            task.abort();
        }
        if let Some(mut engine) = self.engine.take() {
            engine.destroy();
        }
        self.descriptors.clear();
        self.viewport_data.clear();
        self.display_sets_by_viewport.clear();
        self.voi_state.clear();
        self.materializer.clear();
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn get_viewport_info(&self, lookup: ViewportLookup<'_>) -> Option<&ViewportDescriptor> {
        match lookup {
            ViewportLookup::Slot(slot_index) => self.descriptors.get(&slot_index),
            ViewportLookup::Id(viewport_id) => self
                .descriptors
                .values()
                .find(|d| d.viewport_id() == viewport_id),
        }
    }

    pub fn viewport_ids(&self) -> Vec<String> {
        self.descriptors
            .values()
            .map(|d| d.viewport_id().to_string())
            .collect()
    }

    pub fn get_display_set_uids_for_viewport(&self, viewport_id: &str) -> Option<&[String]> {
        self.display_sets_by_viewport
            .get(viewport_id)
            .map(Vec::as_slice)
    }

    /// Camera, windowing and slice currently shown in `viewport_id`.
    pub fn get_presentation(&self, viewport_id: &str) -> Option<ViewportPresentation> {
        let viewport = self.get_cornerstone_viewport(viewport_id)?;
        let descriptor = self.get_viewport_info(ViewportLookup::Id(viewport_id))?;
        let (voi, voi_inverted) = match self.voi_state.get(viewport_id) {
            Some(&(voi, inverted)) => (Some(voi), inverted),
            None => {
                let options = descriptor.first_display_set_options();
                (options.voi, options.voi_inverted)
            }
        };
        Some(ViewportPresentation {
            camera: Some(viewport.get_camera()),
            voi,
            voi_inverted,
            image_index: Some(viewport.current_image_index()),
        })
    }

    pub fn get_cache_size(&self) -> u64 {
        self.materializer.get_cache_size()
    }

    pub fn get_cache_free_space(&self) -> u64 {
        self.materializer.get_cache_free_space()
    }

    // ── Events ───────────────────────────────────────────────────────

    pub fn subscribe(&mut self, kind: EventKind, listener: Listener) -> SubscriptionId {
        self.events.subscribe(kind, listener)
    }

    /// Listen to events of one viewport. The subscription ends when the
    /// viewport is disabled or its slot is renamed.
    pub fn subscribe_viewport(
        &mut self,
        viewport_id: &str,
        kind: EventKind,
        listener: Listener,
    ) -> Result<SubscriptionId, ViewerError> {
        if self.get_viewport_info(ViewportLookup::Id(viewport_id)).is_none() {
            return Err(ViewerError::UnknownViewport(viewport_id.to_string()));
        }
        Ok(self.events.subscribe_viewport(viewport_id, kind, listener))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Entry point for engine adapters reporting camera and windowing changes.
    pub fn publish_viewport_event(&mut self, event: ViewportEvent) {
        if let ViewportEvent::VoiModified {
            viewport_id,
            voi,
            inverted,
        } = &event
        {
            self.voi_state.insert(viewport_id.clone(), (*voi, *inverted));
        }
        self.events.publish(&event);
    }

    // ── Invalidation ─────────────────────────────────────────────────

    /// Rebuild every viewport showing `display_set_uid` after its content
    /// changed. Volume viewports keep their camera; stack viewports get a
    /// freshly resolved stack. Returns the number of viewports refreshed.
    pub async fn invalidate_display_set(
        &mut self,
        display_set_uid: &str,
    ) -> Result<usize, ViewerError> {
        let mut affected: Vec<(usize, ViewportData)> = self
            .viewport_data
            .iter()
            .filter(|(_, data)| data.display_set_uids().iter().any(|u| u == display_set_uid))
            .map(|(slot, data)| (*slot, data.clone()))
            .collect();
        affected.sort_by_key(|(slot, _)| *slot);

        let mut volume_evicted = false;
        for (slot_index, data) in &affected {
            let refreshed = match data {
                ViewportData::Volume(_) if !volume_evicted => {
                    volume_evicted = true;
                    self.materializer
                        .invalidate_viewport_data(
                            data,
                            display_set_uid,
                            self.data_source.as_ref(),
                            self.services.display_sets.as_ref(),
                        )
                        .await?
                }
                ViewportData::Volume(volume) => {
                    let display_sets = self.lookup_display_sets(&volume.display_set_uids())?;
                    self.materializer
                        .create_viewport_data(
                            &display_sets,
                            ViewportKind::Volume,
                            self.data_source.as_ref(),
                            None,
                        )
                        .await?
                }
                ViewportData::Stack(stack) => {
                    self.materializer.forget_stack(display_set_uid);
                    let display_sets = self.lookup_display_sets(&[display_set_uid.to_string()])?;
                    self.materializer
                        .create_viewport_data(
                            &display_sets,
                            ViewportKind::Stack,
                            self.data_source.as_ref(),
                            stack.initial_image_index,
                        )
                        .await?
                }
            };
            self.update_viewport(*slot_index, refreshed, true).await?;
        }
        Ok(affected.len())
    }

    fn lookup_display_sets(&self, uids: &[String]) -> Result<Vec<DisplaySet>, ViewerError> {
        uids.iter()
            .map(|uid| {
                self.services
                    .display_sets
                    .get_display_set_by_uid(uid)
                    .ok_or_else(|| ViewerError::UnknownDisplaySet(uid.clone()))
            })
            .collect()
    }
}
