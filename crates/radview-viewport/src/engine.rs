//! Port to the external rendering engine.
//!
//! The engine is stateful and shared by every viewport; the orchestrator is
//! its only owner. Engine viewports are handed out as `Arc<dyn EngineViewport>`
//! so asynchronous continuations can outlive the call that started them.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use radview_core::{
    Camera, DisplaySetOptions, Orientation, SurfaceHandle, ViewerError, ViewportKind,
    ViewportPresentation, Voi, VolumeInput,
};

/// Everything the engine needs to enable a viewport on a surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportInput {
    pub viewport_id: String,
    pub element: SurfaceHandle,
    pub kind: ViewportKind,
    pub background: [f32; 3],
    pub orientation: Option<Orientation>,
}

/// Display properties applied to a viewport after its data is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewportProperties {
    /// `(lower, upper)` intensity range.
    pub voi_range: Option<(f64, f64)>,
    pub invert: bool,
    pub colormap: Option<String>,
}

impl ViewportProperties {
    pub fn from_voi(voi: Option<Voi>, invert: bool, colormap: Option<String>) -> Self {
        Self {
            voi_range: voi.map(|v| v.to_range()),
            invert,
            colormap,
        }
    }

    /// Display-set options, overridden by a restored presentation's windowing.
    pub fn resolve(options: &DisplaySetOptions, presentation: Option<&ViewportPresentation>) -> Self {
        match presentation.and_then(|p| p.voi.map(|voi| (voi, p.voi_inverted))) {
            Some((voi, inverted)) => Self::from_voi(Some(voi), inverted, options.colormap.clone()),
            None => Self::from_voi(options.voi, options.voi_inverted, options.colormap.clone()),
        }
    }
}

pub trait EngineViewport: Send + Sync {
    fn id(&self) -> &str;
    fn kind(&self) -> ViewportKind;
    fn set_stack(
        &self,
        image_ids: Arc<Vec<String>>,
        initial_index: usize,
    ) -> BoxFuture<'static, Result<(), ViewerError>>;
    /// Batched volume attachment; resolves once every input is bound.
    fn set_volumes(&self, inputs: Vec<VolumeInput>) -> BoxFuture<'static, Result<(), ViewerError>>;
    fn set_properties(&self, properties: ViewportProperties);
    fn set_image_index(&self, index: usize);
    fn current_image_index(&self) -> usize;
    fn get_camera(&self) -> Camera;
    fn set_camera(&self, camera: Camera);
    fn render(&self);
}

pub trait RenderingEngine: Send + Sync {
    fn enable_element(&mut self, input: ViewportInput) -> Result<(), ViewerError>;
    fn disable_element(&mut self, viewport_id: &str);
    fn get_viewport(&self, viewport_id: &str) -> Option<Arc<dyn EngineViewport>>;
    fn render(&self);
    fn render_viewports(&self, viewport_ids: &[String]);
    fn resize(&mut self, immediate: bool, keep_camera: bool);
    fn destroy(&mut self);
    fn is_destroyed(&self) -> bool;
}

/// Creates the shared engine on first use and after a teardown.
pub trait RenderingEngineFactory: Send + Sync {
    fn create(&self) -> Box<dyn RenderingEngine>;
}

impl<F> RenderingEngineFactory for F
where
    F: Fn() -> Box<dyn RenderingEngine> + Send + Sync,
{
    fn create(&self) -> Box<dyn RenderingEngine> {
        self()
    }
}
