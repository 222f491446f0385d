//! # Radview Core
//!
//! Data model shared by the viewport engine: display sets, segmentations,
//! per-slot viewport descriptors, the stack/volume render data produced by
//! the materializer, and the collaborator ports (data source, display-set,
//! segmentation, tool-group and hanging-protocol services).
//!
//! Nothing in this crate talks to a rendering engine; it only describes what
//! should be rendered and who to ask for it.

pub mod camera;
pub mod descriptor;
pub mod display_set;
pub mod error;
pub mod render_data;
pub mod segmentation;
pub mod services;
pub mod settings;
pub mod slice;
pub mod volume;

pub use camera::{Camera, ViewportPresentation};
pub use descriptor::{
    BlendMode, DisplaySetOptions, InitialImageOptions, Orientation, SlotState, SurfaceHandle,
    SyncGroup, ViewportDescriptor, ViewportKind, ViewportOptions, Voi,
};
pub use display_set::{DisplaySet, DisplaySetKind, DisplaySetLoader, ImageMetadata};
pub use error::ViewerError;
pub use render_data::{StackRenderData, ViewportData, VolumeEntry, VolumeRenderData};
pub use segmentation::{Segmentation, SegmentationRepresentation};
pub use services::{
    DataSource, DisplaySetService, HangingProtocolService, ImageLoadRequest, SegmentationService,
    Services, ToolGroup, ToolGroupService,
};
pub use settings::ViewerSettings;
pub use slice::{compute_initial_index, SlicePreset};
pub use volume::{Volume, VolumeFactory, VolumeInput};
