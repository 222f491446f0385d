//! In-memory collaborators for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt};

use radview_core::{
    DataSource, DisplaySet, DisplaySetLoader, DisplaySetService, ViewerError, Volume,
    VolumeFactory,
};

pub fn ids(values: &[&str]) -> Arc<Vec<String>> {
    Arc::new(values.iter().map(|v| v.to_string()).collect())
}

#[derive(Debug)]
pub struct FakeVolume {
    pub volume_id: String,
    pub image_ids: Vec<String>,
    pub slices: usize,
    pub bytes: u64,
    pub loads: AtomicUsize,
}

impl Volume for FakeVolume {
    fn volume_id(&self) -> &str {
        &self.volume_id
    }

    fn image_ids(&self) -> &[String] {
        &self.image_ids
    }

    fn frame_of_reference_uid(&self) -> Option<&str> {
        None
    }

    fn number_of_slices(&self) -> usize {
        self.slices
    }

    fn size_in_bytes(&self) -> u64 {
        self.bytes
    }

    fn load(&self) {
        self.loads.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeFactory {
    slices: usize,
    bytes: u64,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeFactory {
    pub fn new(slices: usize, bytes: u64) -> Self {
        Self {
            slices,
            bytes,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(0, 0)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl VolumeFactory for FakeFactory {
    fn create_volume(
        &self,
        volume_id: &str,
        image_ids: Arc<Vec<String>>,
    ) -> BoxFuture<'static, Result<Arc<dyn Volume>, ViewerError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let volume_id = volume_id.to_string();
        let (slices, bytes, fail) = (self.slices, self.bytes, self.fail);
        async move {
            // Suspend once so concurrent callers can observe the pending entry.
            tokio::task::yield_now().await;
            if fail {
                return Err(ViewerError::VolumeConstruction {
                    volume_id,
                    message: "decoder unavailable".to_string(),
                });
            }
            let volume: Arc<dyn Volume> = Arc::new(FakeVolume {
                volume_id,
                image_ids: image_ids.as_ref().clone(),
                slices,
                bytes,
                loads: AtomicUsize::new(0),
            });
            Ok(volume)
        }
        .boxed()
    }
}

/// Data source returning `imageId:<uid>:<n>` ids, counting lookups.
#[derive(Default)]
pub struct FakeDataSource {
    pub images_per_set: HashMap<String, usize>,
    pub failing: Vec<String>,
    lookups: AtomicUsize,
}

impl FakeDataSource {
    pub fn with_set(mut self, display_set_uid: &str, count: usize) -> Self {
        self.images_per_set.insert(display_set_uid.to_string(), count);
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl DataSource for FakeDataSource {
    fn get_image_ids_for_display_set(
        &self,
        display_set: &DisplaySet,
    ) -> Result<Vec<String>, ViewerError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let uid = &display_set.display_set_instance_uid;
        if self.failing.contains(uid) {
            return Err(ViewerError::data_source(uid, "network unreachable"));
        }
        let count = self.images_per_set.get(uid).copied().unwrap_or(0);
        Ok((0..count).map(|n| format!("imageId:{}:{}", uid, n)).collect())
    }
}

#[derive(Default)]
pub struct FakeDisplaySets {
    pub sets: Mutex<HashMap<String, DisplaySet>>,
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

#[derive(Debug, Default)]
pub struct CountingLoader {
    pub loads: AtomicUsize,
}

impl DisplaySetLoader for CountingLoader {
    fn load(&self) -> BoxFuture<'static, Result<(), ViewerError>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        async { Ok(()) }.boxed()
    }
}
