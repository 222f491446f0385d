use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use radview_core::{
    DataSource, DisplaySet, DisplaySetService, StackRenderData, ViewerError, ViewerSettings,
    ViewportData, ViewportKind, VolumeEntry, VolumeFactory, VolumeRenderData,
};

use crate::volume_cache::VolumeCache;

/// Converts display sets into stack or volume render data, memoizing per
/// display set so repeated requests reuse earlier work.
pub struct DataMaterializer {
    settings: ViewerSettings,
    volumes: Arc<VolumeCache>,
    factory: Arc<dyn VolumeFactory>,
    /// Stack image ids keyed by display-set uid.
    stack_image_ids: Mutex<HashMap<String, Arc<Vec<String>>>>,
}

impl DataMaterializer {
    pub fn new(settings: ViewerSettings, factory: Arc<dyn VolumeFactory>) -> Self {
        let volumes = Arc::new(VolumeCache::new(settings.max_cache_bytes));
        Self::with_cache(settings, volumes, factory)
    }

    pub fn with_cache(
        settings: ViewerSettings,
        volumes: Arc<VolumeCache>,
        factory: Arc<dyn VolumeFactory>,
    ) -> Self {
        Self {
            settings,
            volumes,
            factory,
            stack_image_ids: Mutex::new(HashMap::new()),
        }
    }

    pub fn volume_cache(&self) -> &Arc<VolumeCache> {
        &self.volumes
    }

    pub fn volume_id_for(&self, display_set_uid: &str) -> String {
        self.settings.volume_id_for(display_set_uid)
    }

    /// Build render data of `kind` for `display_sets`.
    ///
    /// Stacks only use the first display set. An explicit
    /// `initial_image_index` is attached to stack data as-is.
    pub async fn create_viewport_data(
        &self,
        display_sets: &[DisplaySet],
        kind: ViewportKind,
        data_source: &dyn DataSource,
        initial_image_index: Option<usize>,
    ) -> Result<ViewportData, ViewerError> {
        match kind {
            ViewportKind::Stack => {
                let display_set = display_sets.first().ok_or(ViewerError::NoDisplaySets)?;
                let stack = self.stack_data(display_set, data_source, initial_image_index)?;
                Ok(ViewportData::Stack(stack))
            }
            ViewportKind::Volume => {
                if display_sets.is_empty() {
                    return Err(ViewerError::NoDisplaySets);
                }
                let volume = self.volume_data(display_sets, data_source).await?;
                Ok(ViewportData::Volume(volume))
            }
        }
    }

    fn stack_data(
        &self,
        display_set: &DisplaySet,
        data_source: &dyn DataSource,
        initial_image_index: Option<usize>,
    ) -> Result<StackRenderData, ViewerError> {
        let uid = &display_set.display_set_instance_uid;
        let cached = self
            .stack_image_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(uid)
            .cloned();

        let image_ids = match cached {
            Some(image_ids) => image_ids,
            None => {
                let image_ids = Arc::new(resolve_image_ids(display_set, data_source)?);
                self.stack_image_ids
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entry(uid.clone())
                    .or_insert(image_ids)
                    .clone()
            }
        };

        Ok(StackRenderData {
            study_instance_uid: display_set.study_instance_uid.clone(),
            display_set_instance_uid: uid.clone(),
            image_ids,
            initial_image_index,
        })
    }

    async fn volume_data(
        &self,
        display_sets: &[DisplaySet],
        data_source: &dyn DataSource,
    ) -> Result<VolumeRenderData, ViewerError> {
        let mut entries = Vec::with_capacity(display_sets.len());

        for display_set in display_sets {
            let uid = &display_set.display_set_instance_uid;
            let volume_id = self.volume_id_for(uid);

            if let Some(loader) = &display_set.loader {
                // Derived display sets own their volume lifecycle.
                log::debug!("Display set {} resolves through its own loader", uid);
                loader.load().await?;
                entries.push(VolumeEntry {
                    study_instance_uid: display_set.study_instance_uid.clone(),
                    display_set_instance_uid: uid.clone(),
                    volume_id,
                    volume: None,
                    image_ids: None,
                });
                continue;
            }

            let cached = match self.volumes.get(&volume_id) {
                Some(cached) => cached,
                None => {
                    let image_ids = Arc::new(resolve_image_ids(display_set, data_source)?);
                    self.volumes
                        .get_or_create(&volume_id, image_ids, self.factory.as_ref())
                        .await?
                }
            };

            entries.push(VolumeEntry {
                study_instance_uid: display_set.study_instance_uid.clone(),
                display_set_instance_uid: uid.clone(),
                volume_id,
                volume: Some(cached.volume),
                image_ids: Some(cached.image_ids),
            });
        }

        Ok(VolumeRenderData { entries })
    }

    /// Rebuild volume data after `invalidated_uid` changed.
    ///
    /// Stack data cannot be invalidated; the viewport has to be rebuilt.
    pub async fn invalidate_viewport_data(
        &self,
        existing: &ViewportData,
        invalidated_uid: &str,
        data_source: &dyn DataSource,
        display_set_lookup: &dyn DisplaySetService,
    ) -> Result<ViewportData, ViewerError> {
        let volume = match existing {
            ViewportData::Stack(_) => {
                return Err(ViewerError::UnsupportedOperation(
                    "stack viewport data cannot be invalidated, rebuild the viewport".to_string(),
                ))
            }
            ViewportData::Volume(volume) => volume,
        };

        let volume_id = self.volume_id_for(invalidated_uid);
        log::info!("Invalidating {} for display set {}", volume_id, invalidated_uid);
        self.volumes.remove_volume(&volume_id);

        let display_sets = volume
            .entries
            .iter()
            .map(|entry| {
                display_set_lookup
                    .get_display_set_by_uid(&entry.display_set_instance_uid)
                    .ok_or_else(|| {
                        ViewerError::UnknownDisplaySet(entry.display_set_instance_uid.clone())
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.create_viewport_data(&display_sets, ViewportKind::Volume, data_source, None)
            .await
    }

    /// Drop the memoized stack image ids of one display set.
    pub fn forget_stack(&self, display_set_uid: &str) -> bool {
        self.stack_image_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(display_set_uid)
            .is_some()
    }

    pub fn get_cache_size(&self) -> u64 {
        self.volumes.size_in_bytes()
    }

    pub fn get_cache_free_space(&self) -> u64 {
        self.volumes.free_space()
    }

    /// Forget memoized stack ids and purge every cached volume.
    pub fn clear(&self) {
        self.stack_image_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.volumes.purge();
    }
}

fn resolve_image_ids(
    display_set: &DisplaySet,
    data_source: &dyn DataSource,
) -> Result<Vec<String>, ViewerError> {
    let image_ids = data_source.get_image_ids_for_display_set(display_set)?;
    if image_ids.is_empty() {
        return Err(ViewerError::EmptyImageIds(
            display_set.display_set_instance_uid.clone(),
        ));
    }
    Ok(image_ids)
}
