use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

use radview_core::{ViewerError, Volume, VolumeFactory};

type PendingVolume = Shared<BoxFuture<'static, Result<Arc<dyn Volume>, ViewerError>>>;

/// A constructed volume together with the image ids it was built from.
#[derive(Debug, Clone)]
pub struct CachedVolume {
    pub volume: Arc<dyn Volume>,
    pub image_ids: Arc<Vec<String>>,
}

#[derive(Default)]
struct CacheState {
    volumes: HashMap<String, CachedVolume>,
    pending: HashMap<String, PendingVolume>,
}

/// Process-wide volume cache keyed by volume id.
///
/// Holds at most one live volume per id. Concurrent requests for an id that is
/// still being constructed share the in-flight construction.
pub struct VolumeCache {
    max_bytes: u64,
    state: Mutex<CacheState>,
}

impl VolumeCache {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            state: Mutex::new(CacheState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, volume_id: &str) -> Option<CachedVolume> {
        self.lock().volumes.get(volume_id).cloned()
    }

    pub fn get_volume(&self, volume_id: &str) -> Option<Arc<dyn Volume>> {
        self.lock().volumes.get(volume_id).map(|c| c.volume.clone())
    }

    /// Return the cached volume for `volume_id`, joining an in-flight
    /// construction or starting one through `factory` on a miss.
    pub async fn get_or_create(
        &self,
        volume_id: &str,
        image_ids: Arc<Vec<String>>,
        factory: &dyn VolumeFactory,
    ) -> Result<CachedVolume, ViewerError> {
        let pending = {
            let mut state = self.lock();
            if let Some(cached) = state.volumes.get(volume_id) {
                log::debug!("Volume cache hit: {}", volume_id);
                return Ok(cached.clone());
            }
            match state.pending.get(volume_id) {
                Some(pending) => {
                    log::debug!("Joining in-flight construction of {}", volume_id);
                    pending.clone()
                }
                None => {
                    log::info!(
                        "Constructing volume {} from {} images",
                        volume_id,
                        image_ids.len()
                    );
                    let pending = factory
                        .create_volume(volume_id, image_ids.clone())
                        .shared();
                    state
                        .pending
                        .insert(volume_id.to_string(), pending.clone());
                    pending
                }
            }
        };

        let result = pending.clone().await;

        let mut state = self.lock();
        let owns_slot = state
            .pending
            .get(volume_id)
            .is_some_and(|p| p.ptr_eq(&pending));
        if owns_slot {
            state.pending.remove(volume_id);
        }

        let volume = result?;
        if let Some(cached) = state.volumes.get(volume_id) {
            return Ok(cached.clone());
        }
        let cached = CachedVolume { volume, image_ids };
        // A construction evicted while in flight is handed back but not cached.
        if owns_slot {
            state.volumes.insert(volume_id.to_string(), cached.clone());
            let size = Self::total_bytes(&state);
            if size > self.max_bytes {
                log::warn!(
                    "Volume cache over capacity: {} of {} bytes in use",
                    size,
                    self.max_bytes
                );
            }
        }
        Ok(cached)
    }

    /// Register a volume built outside the cache, e.g. by a derived display
    /// set's own loader. Replaces any previous entry for the id.
    pub fn insert(&self, volume_id: &str, cached: CachedVolume) {
        let mut state = self.lock();
        state.pending.remove(volume_id);
        state.volumes.insert(volume_id.to_string(), cached);
    }

    /// Evict a volume (and any in-flight construction for it).
    pub fn remove_volume(&self, volume_id: &str) -> bool {
        let mut state = self.lock();
        let pending = state.pending.remove(volume_id).is_some();
        state.volumes.remove(volume_id).is_some() || pending
    }

    pub fn purge(&self) {
        let mut state = self.lock();
        log::info!("Purging {} cached volumes", state.volumes.len());
        state.volumes.clear();
        state.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().volumes.is_empty()
    }

    fn total_bytes(state: &CacheState) -> u64 {
        state.volumes.values().map(|c| c.volume.size_in_bytes()).sum()
    }

    pub fn size_in_bytes(&self) -> u64 {
        Self::total_bytes(&self.lock())
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn free_space(&self) -> u64 {
        self.max_bytes.saturating_sub(self.size_in_bytes())
    }
}
