use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::descriptor::{BlendMode, DisplaySetOptions, Voi};
use crate::error::ViewerError;

/// An opaque, resampled 3D sample buffer owned by the volume cache.
pub trait Volume: fmt::Debug + Send + Sync {
    fn volume_id(&self) -> &str;
    fn image_ids(&self) -> &[String];
    fn frame_of_reference_uid(&self) -> Option<&str>;
    fn number_of_slices(&self) -> usize;
    fn size_in_bytes(&self) -> u64;
    /// Start streaming pixel data. Idempotent; returns immediately.
    fn load(&self);
}

/// Builds volumes from an ordered image-id list.
pub trait VolumeFactory: Send + Sync {
    fn create_volume(
        &self,
        volume_id: &str,
        image_ids: Arc<Vec<String>>,
    ) -> BoxFuture<'static, Result<Arc<dyn Volume>, ViewerError>>;
}

/// One entry of the engine's batched volume-setting call.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeInput {
    pub volume_id: String,
    pub image_ids: Arc<Vec<String>>,
    pub blend_mode: Option<BlendMode>,
    pub slab_thickness: Option<f64>,
    pub voi: Option<Voi>,
    pub voi_inverted: bool,
    pub colormap: Option<String>,
}

impl VolumeInput {
    pub fn new(volume_id: &str, image_ids: Arc<Vec<String>>, options: &DisplaySetOptions) -> Self {
        Self {
            volume_id: volume_id.to_string(),
            image_ids,
            blend_mode: options.blend_mode,
            slab_thickness: options.slab_thickness,
            voi: options.voi,
            voi_inverted: options.voi_inverted,
            colormap: options.colormap.clone(),
        }
    }
}
